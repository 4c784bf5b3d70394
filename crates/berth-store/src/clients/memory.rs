//! In-memory collaborator clients for testing and development.
//!
//! This module provides recording implementations of [`AuctioneerClient`]
//! and [`CellClient`] suitable for tests and the debug server.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: nothing is scheduled or stopped
//! - **Single-process only**: recorded calls are not visible across
//!   process boundaries

use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;

use berth_core::{Error, Result};

use super::{AuctioneerClient, CellClient, LrpStartRequest};
use crate::models::ActualLrpKey;

/// Converts a lock poison error to a domain error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::unknown("client recording lock poisoned")
}

/// Recording auctioneer for tests.
///
/// Stores every submitted [`LrpStartRequest`]; tests inspect them with
/// [`MemoryAuctioneerClient::requests`] or drain them with
/// [`MemoryAuctioneerClient::take_requests`]. Can be made to fail to
/// exercise the best-effort paths.
#[derive(Debug, Default)]
pub struct MemoryAuctioneerClient {
    requests: Mutex<Vec<LrpStartRequest>>,
    fail: RwLock<bool>,
}

impl MemoryAuctioneerClient {
    /// Creates a new recording auctioneer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail (or succeed again).
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn set_failing(&self, failing: bool) -> Result<()> {
        *self.fail.write().map_err(poison_err)? = failing;
        Ok(())
    }

    /// Returns a copy of every recorded request.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn requests(&self) -> Result<Vec<LrpStartRequest>> {
        Ok(self.requests.lock().map_err(poison_err)?.clone())
    }

    /// Removes and returns every recorded request.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn take_requests(&self) -> Result<Vec<LrpStartRequest>> {
        Ok(self
            .requests
            .lock()
            .map_err(poison_err)?
            .drain(..)
            .collect())
    }
}

#[async_trait]
impl AuctioneerClient for MemoryAuctioneerClient {
    async fn request_lrp_auctions(&self, requests: &[LrpStartRequest]) -> Result<()> {
        if *self.fail.read().map_err(poison_err)? {
            return Err(Error::unknown("auctioneer unavailable"));
        }
        self.requests
            .lock()
            .map_err(poison_err)?
            .extend_from_slice(requests);
        Ok(())
    }
}

/// Recording cell client for tests.
///
/// Stores every retirement key and task cancellation; idempotent by
/// construction since recording the same call twice is harmless.
#[derive(Debug, Default)]
pub struct MemoryCellClient {
    retired: Mutex<Vec<ActualLrpKey>>,
    cancelled: Mutex<Vec<(String, String)>>,
    fail: RwLock<bool>,
}

impl MemoryCellClient {
    /// Creates a new recording cell client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail (or succeed again).
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn set_failing(&self, failing: bool) -> Result<()> {
        *self.fail.write().map_err(poison_err)? = failing;
        Ok(())
    }

    /// Returns every key retirement has been requested for.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn retired(&self) -> Result<Vec<ActualLrpKey>> {
        Ok(self.retired.lock().map_err(poison_err)?.clone())
    }

    /// Returns every `(cell_id, task_guid)` cancellation requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn cancelled(&self) -> Result<Vec<(String, String)>> {
        Ok(self.cancelled.lock().map_err(poison_err)?.clone())
    }
}

#[async_trait]
impl CellClient for MemoryCellClient {
    async fn retire_actual_lrp(&self, key: &ActualLrpKey) -> Result<()> {
        if *self.fail.read().map_err(poison_err)? {
            return Err(Error::unknown("cell unavailable"));
        }
        self.retired.lock().map_err(poison_err)?.push(key.clone());
        Ok(())
    }

    async fn cancel_task(&self, cell_id: &str, task_guid: &str) -> Result<()> {
        if *self.fail.read().map_err(poison_err)? {
            return Err(Error::unknown("cell unavailable"));
        }
        self.cancelled
            .lock()
            .map_err(poison_err)?
            .push((cell_id.to_string(), task_guid.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DesiredLrp, LrpDefinition};

    fn desired() -> DesiredLrp {
        DesiredLrp::new(
            "p",
            "d",
            1,
            LrpDefinition {
                root_fs: "preloaded:trusty".into(),
                memory_mb: 64,
                disk_mb: 64,
                action: serde_json::json!({"run": {}}),
                ports: Vec::new(),
                environment: Vec::new(),
            },
        )
    }

    #[tokio::test]
    async fn auctioneer_records_requests() {
        let client = MemoryAuctioneerClient::new();
        let request = LrpStartRequest::from_desired(&desired(), vec![0]);

        client
            .request_lrp_auctions(std::slice::from_ref(&request))
            .await
            .expect("should succeed");

        assert_eq!(client.requests().unwrap(), vec![request.clone()]);
        assert_eq!(client.take_requests().unwrap(), vec![request]);
        assert!(client.requests().unwrap().is_empty());
    }

    #[tokio::test]
    async fn auctioneer_failure_mode() {
        let client = MemoryAuctioneerClient::new();
        client.set_failing(true).unwrap();

        let request = LrpStartRequest::from_desired(&desired(), vec![0]);
        assert!(client.request_lrp_auctions(&[request]).await.is_err());
        assert!(client.requests().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cell_records_retirements_and_cancellations() {
        let client = MemoryCellClient::new();
        let key = ActualLrpKey::new("p", 0, "d");

        client.retire_actual_lrp(&key).await.expect("retire");
        client.retire_actual_lrp(&key).await.expect("retire again");
        client.cancel_task("cell-a", "t1").await.expect("cancel");

        assert_eq!(client.retired().unwrap(), vec![key.clone(), key]);
        assert_eq!(
            client.cancelled().unwrap(),
            vec![("cell-a".to_string(), "t1".to_string())]
        );
    }
}
