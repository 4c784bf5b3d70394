//! Run-once task records and their state machine.

use berth_core::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{validation_result, EnvironmentVariable, ModificationTag};

/// The failure reason recorded when a task is cancelled.
pub const TASK_CANCELLED_REASON: &str = "task was cancelled";

/// The state of a task.
///
/// A task only advances forward along
/// Pending → Running → Completed → Resolving; there are no backward
/// transitions. Cancel and fail short-circuit Pending straight to Completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Created and awaiting placement on a cell.
    Pending,
    /// Placed on a cell and executing.
    Running,
    /// Finished, successfully or not; result not yet collected.
    Completed,
    /// A client has claimed the result and will delete the record.
    Resolving,
}

impl TaskState {
    /// Returns the state reached by `transition`, or `None` when the
    /// transition is not legal from this state.
    ///
    /// This table is the single encoding of the task state machine; the
    /// store never checks states anywhere else.
    #[must_use]
    pub fn transition(self, transition: TaskTransition) -> Option<TaskState> {
        use TaskTransition::{Cancel, Complete, Delete, Fail, Resolve, Start};

        match (self, transition) {
            (Self::Pending, Start) => Some(Self::Running),
            (Self::Pending | Self::Running, Cancel | Fail) => Some(Self::Completed),
            (Self::Running, Complete) => Some(Self::Completed),
            (Self::Completed, Resolve) => Some(Self::Resolving),
            // Delete removes the record; the state itself does not change.
            (Self::Resolving, Delete) => Some(Self::Resolving),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Resolving => "Resolving",
        };
        write!(f, "{name}")
    }
}

/// An operation that moves a task through its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskTransition {
    /// A cell claims the task for execution.
    Start,
    /// A client abandons the task.
    Cancel,
    /// The system marks the task failed.
    Fail,
    /// The executing cell reports completion.
    Complete,
    /// A client claims the completed result.
    Resolve,
    /// A client removes the resolved record.
    Delete,
}

/// The work a task performs, opaque to the state store.
///
/// Validated for well-formedness on create but never interpreted: the cell
/// that runs the task owns the meaning of `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Root filesystem the task container starts from.
    pub root_fs: String,
    /// Memory limit in megabytes.
    pub memory_mb: i32,
    /// Disk limit in megabytes.
    pub disk_mb: i32,
    /// The action to execute, interpreted by the cell.
    pub action: serde_json::Value,
    /// Environment passed to the action.
    #[serde(default)]
    pub environment: Vec<EnvironmentVariable>,
}

impl TaskDefinition {
    /// Validates the definition.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` naming every invalid field.
    pub fn validate(&self) -> Result<()> {
        let mut invalid = Vec::new();

        if self.root_fs.is_empty() {
            invalid.push("root_fs");
        }
        if self.memory_mb < 0 {
            invalid.push("memory_mb");
        }
        if self.disk_mb < 0 {
            invalid.push("disk_mb");
        }
        if self.action.is_null() {
            invalid.push("action");
        }

        validation_result(invalid)
    }
}

/// A run-once job tracked by the state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Globally unique, immutable identifier.
    pub task_guid: String,
    /// The domain the task belongs to; immutable.
    pub domain: String,
    /// What to run.
    pub definition: TaskDefinition,
    /// Current lifecycle state.
    pub state: TaskState,
    /// The cell executing the task; empty until started.
    #[serde(default)]
    pub cell_id: String,
    /// The result payload, set on successful completion.
    #[serde(default)]
    pub result: String,
    /// Whether completion was a failure.
    #[serde(default)]
    pub failed: bool,
    /// Why the task failed, when `failed` is set.
    #[serde(default)]
    pub failure_reason: String,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last mutated.
    pub updated_at: DateTime<Utc>,
    /// When the task first reached Completed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub first_completed_at: Option<DateTime<Utc>>,
    /// Update identity.
    pub modification_tag: ModificationTag,
}

impl Task {
    /// Creates a new pending task.
    #[must_use]
    pub fn new(
        task_guid: impl Into<String>,
        domain: impl Into<String>,
        definition: TaskDefinition,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_guid: task_guid.into(),
            domain: domain.into(),
            definition,
            state: TaskState::Pending,
            cell_id: String::new(),
            result: String::new(),
            failed: false,
            failure_reason: String::new(),
            created_at: now,
            updated_at: now,
            first_completed_at: None,
            modification_tag: ModificationTag::fresh(),
        }
    }

    /// Validates the task record for creation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` naming every invalid field.
    pub fn validate(&self) -> Result<()> {
        let mut invalid = Vec::new();

        if self.task_guid.is_empty() {
            invalid.push("task_guid");
        }
        if self.domain.is_empty() {
            invalid.push("domain");
        }
        if let Err(e) = self.definition.validate() {
            tracing::debug!(error = %e, "invalid task definition");
            invalid.push("definition");
        }

        validation_result(invalid)
    }

    /// Records a completion: sets the terminal fields and bumps bookkeeping.
    ///
    /// The caller has already validated the transition; this only mutates.
    pub fn mark_completed(
        &mut self,
        failed: bool,
        failure_reason: impl Into<String>,
        result: impl Into<String>,
    ) {
        let now = Utc::now();
        self.state = TaskState::Completed;
        self.failed = failed;
        self.failure_reason = failure_reason.into();
        self.result = result.into();
        if self.first_completed_at.is_none() {
            self.first_completed_at = Some(now);
        }
        self.updated_at = now;
        self.modification_tag.increment();
    }

    /// Records a non-terminal mutation: bumps `updated_at` and the tag.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.modification_tag.increment();
    }
}

/// Restricts a task listing.
///
/// An unset or empty field places no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Only tasks in this domain.
    pub domain: Option<String>,
    /// Only tasks currently placed on this cell.
    pub cell_id: Option<String>,
}

impl TaskFilter {
    /// Returns true when the task passes the filter.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        let domain_ok = self
            .domain
            .as_deref()
            .is_none_or(|d| d.is_empty() || task.domain == d);
        let cell_ok = self
            .cell_id
            .as_deref()
            .is_none_or(|c| c.is_empty() || task.cell_id == c);
        domain_ok && cell_ok
    }
}
