//! Collaborator clients the state store drives side effects through.
//!
//! This module provides:
//!
//! - [`AuctioneerClient`]: requests placement auctions for unclaimed actuals
//! - [`CellClient`]: retires actual LRPs and cancels tasks on cells
//! - In-memory implementations for tests and the debug server ([`memory`])
//!
//! Both collaborators are best-effort from the store's point of view: the
//! persisted record is authoritative, and the external convergence loop
//! re-drives anything a failed RPC dropped. Cell operations are idempotent,
//! so redelivery is always safe.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use berth_core::Result;

use crate::models::{ActualLrpKey, DesiredLrp};

/// A request for the auctioneer to place replicas of one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LrpStartRequest {
    /// The process the replicas belong to.
    pub desired_lrp: DesiredLrp,
    /// The replica indices needing placement.
    pub indices: Vec<i32>,
}

impl LrpStartRequest {
    /// Creates a start request for the given replica indices.
    #[must_use]
    pub fn from_desired(desired_lrp: &DesiredLrp, indices: Vec<i32>) -> Self {
        Self {
            desired_lrp: desired_lrp.clone(),
            indices,
        }
    }
}

/// The external scheduler that assigns unclaimed actuals to cells.
#[async_trait]
pub trait AuctioneerClient: Send + Sync + 'static {
    /// Submits start requests for auction.
    ///
    /// Best-effort: the store logs failures and moves on.
    async fn request_lrp_auctions(&self, requests: &[LrpStartRequest]) -> Result<()>;
}

/// The worker nodes that run containers and report actual-LRP state.
#[async_trait]
pub trait CellClient: Send + Sync + 'static {
    /// Tells the owning cell to stop one replica.
    ///
    /// Idempotent: retiring a replica the cell no longer runs is a no-op.
    async fn retire_actual_lrp(&self, key: &ActualLrpKey) -> Result<()>;

    /// Tells a cell to stop executing a task.
    ///
    /// Idempotent: cancelling a task the cell no longer runs is a no-op.
    async fn cancel_task(&self, cell_id: &str, task_guid: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LrpDefinition;

    #[test]
    fn start_request_copies_the_record() {
        let desired = DesiredLrp::new(
            "p",
            "d",
            2,
            LrpDefinition {
                root_fs: "preloaded:trusty".into(),
                memory_mb: 128,
                disk_mb: 512,
                action: serde_json::json!({"run": {}}),
                ports: Vec::new(),
                environment: Vec::new(),
            },
        );

        let request = LrpStartRequest::from_desired(&desired, vec![0, 1]);
        assert_eq!(request.desired_lrp, desired);
        assert_eq!(request.indices, vec![0, 1]);
    }
}
