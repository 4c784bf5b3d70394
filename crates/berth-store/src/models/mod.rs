//! Domain models for the records the state store persists.
//!
//! Each record kind lives in its own module:
//!
//! - [`task`]: run-once jobs and their state machine
//! - [`desired_lrp`]: the declared spec of a long-running process
//! - [`actual_lrp`]: a single replica's runtime presence record
//!
//! Validation follows one convention: a record collects the names of its
//! invalid fields and surfaces them as a single `InvalidRequest` error, so a
//! caller sees every problem at once.

pub mod actual_lrp;
pub mod desired_lrp;
pub mod modification_tag;
pub mod task;

pub use actual_lrp::{ActualLrp, ActualLrpInstanceKey, ActualLrpKey, ActualLrpState};
pub use desired_lrp::{DesiredLrp, DesiredLrpFilter, DesiredLrpUpdate, LrpDefinition};
pub use modification_tag::ModificationTag;
pub use task::{Task, TaskDefinition, TaskFilter, TaskState, TaskTransition, TASK_CANCELLED_REASON};

use berth_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// A name/value pair passed into a workload's environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
}

/// Turns a list of invalid field names into a validation result.
pub(crate) fn validation_result(invalid_fields: Vec<&'static str>) -> Result<()> {
    if invalid_fields.is_empty() {
        Ok(())
    } else {
        Err(Error::invalid_request(format!(
            "invalid fields: {}",
            invalid_fields.join(", ")
        )))
    }
}
