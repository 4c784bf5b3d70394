//! Placement orchestration for desired-LRP replica changes.
//!
//! When a desired LRP is created, grown, shrunk, or removed, this module
//! performs the fan-out work those transitions imply: creating unclaimed
//! actual records and requesting auctions for them, or retiring actuals
//! that fall outside the declared range.
//!
//! Everything here runs strictly after the desired record has been
//! persisted, and everything is best-effort: failures are logged and left
//! for the external convergence loop to reconcile. Idempotence comes from
//! the actual-LRP key uniqueness and the cell collaborator's idempotent
//! retirement, so overlapping updates cannot double-place a replica.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use berth_core::codec;
use berth_core::keys::ActualLrpRecordKey;
use berth_core::workpool::Throttler;
use berth_core::{Error, Result};

use crate::clients::{AuctioneerClient, CellClient, LrpStartRequest};
use crate::gateway::StoreGateway;
use crate::models::{ActualLrp, ActualLrpKey, DesiredLrp};

/// Concurrency cap for creating unclaimed actual records.
const CREATE_ACTUAL_MAX_WORKERS: usize = 100;

/// Concurrency cap for retirement fan-out to cells.
const RETIRE_ACTUAL_MAX_WORKERS: usize = 100;

/// Drives the side effects of replica-count transitions.
#[derive(Clone)]
pub struct Placement {
    gateway: StoreGateway,
    auctioneer: Arc<dyn AuctioneerClient>,
    cells: Arc<dyn CellClient>,
}

impl std::fmt::Debug for Placement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Placement")
            .field("gateway", &self.gateway)
            .field("auctioneer", &"<AuctioneerClient>")
            .field("cells", &"<CellClient>")
            .finish()
    }
}

impl Placement {
    /// Creates a placement orchestrator over the given collaborators.
    #[must_use]
    pub fn new(
        gateway: StoreGateway,
        auctioneer: Arc<dyn AuctioneerClient>,
        cells: Arc<dyn CellClient>,
    ) -> Self {
        Self {
            gateway,
            auctioneer,
            cells,
        }
    }

    /// Starts the replica indices `[lower, upper)` of `desired`.
    ///
    /// Creates an unclaimed actual record per index (records that already
    /// exist are skipped, not errors) and submits one auction request for
    /// the indices actually created. Never fails: emission problems are
    /// logged and left to convergence.
    pub async fn start_instance_range(&self, lower: i32, upper: i32, desired: &DesiredLrp) {
        tracing::debug!(
            process_guid = %desired.process_guid,
            lower,
            upper,
            "starting instance range"
        );

        let keys: Vec<ActualLrpKey> = (lower..upper)
            .map(|index| ActualLrpKey::new(&desired.process_guid, index, &desired.domain))
            .collect();

        let created = match self.create_unclaimed_actuals(keys).await {
            Ok(indices) => indices,
            Err(e) => {
                tracing::error!(
                    process_guid = %desired.process_guid,
                    error = %e,
                    "failed creating unclaimed actual LRPs"
                );
                return;
            }
        };

        let request = LrpStartRequest::from_desired(desired, created);
        if let Err(e) = self
            .auctioneer
            .request_lrp_auctions(std::slice::from_ref(&request))
            .await
        {
            tracing::error!(
                process_guid = %desired.process_guid,
                error = %e,
                "failed to request auction"
            );
        }
    }

    /// Stops the replica indices `[lower, upper)` of `desired`.
    ///
    /// Looks up the process's actual records and retires every one whose
    /// index falls in the range. Never fails: lookup or retirement problems
    /// are logged and left to convergence.
    pub async fn stop_instance_range(&self, lower: i32, upper: i32, desired: &DesiredLrp) {
        tracing::debug!(
            process_guid = %desired.process_guid,
            lower,
            upper,
            "stopping instance range"
        );

        let actuals = match instance_actuals(&self.gateway, &desired.process_guid).await {
            Ok(actuals) => actuals,
            Err(e) => {
                tracing::error!(
                    process_guid = %desired.process_guid,
                    error = %e,
                    "failed to get actual LRPs"
                );
                return;
            }
        };

        let keys: Vec<ActualLrpKey> = (lower..upper)
            .filter_map(|index| actuals.get(&index).map(|actual| actual.key.clone()))
            .collect();

        if let Err(e) = self.retire_actual_lrps(keys).await {
            tracing::error!(
                process_guid = %desired.process_guid,
                error = %e,
                "failed retiring actual LRPs"
            );
        }
    }

    /// Retires replicas: signals each owning cell, then removes the record.
    ///
    /// Each key is attempted independently with bounded concurrency. A
    /// failed cell signal leaves the record in place for convergence to
    /// retry; a missing record just means retirement already happened.
    ///
    /// # Errors
    ///
    /// Returns an error only if the fan-out pool cannot be constructed.
    pub async fn retire_actual_lrps(&self, keys: Vec<ActualLrpKey>) -> Result<()> {
        let throttler = Throttler::new(RETIRE_ACTUAL_MAX_WORKERS)?;

        let works = keys.into_iter().map(|key| {
            let gateway = self.gateway.clone();
            let cells = Arc::clone(&self.cells);
            async move {
                if let Err(e) = cells.retire_actual_lrp(&key).await {
                    tracing::warn!(
                        process_guid = %key.process_guid,
                        index = key.index,
                        error = %e,
                        "failed to signal cell for retirement"
                    );
                    return Ok(());
                }

                let record_key = ActualLrpRecordKey::index(&key.process_guid, key.index);
                match gateway.delete(record_key.as_ref(), false).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        tracing::debug!(
                            process_guid = %key.process_guid,
                            index = key.index,
                            "actual LRP already removed"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            process_guid = %key.process_guid,
                            index = key.index,
                            error = %e,
                            "failed to remove retired actual LRP"
                        );
                    }
                }
                Ok(())
            }
        });

        throttler.run(works).await
    }

    /// Creates unclaimed actual records and returns the indices created.
    ///
    /// Existing records are skipped; other failures are logged and skipped.
    async fn create_unclaimed_actuals(&self, keys: Vec<ActualLrpKey>) -> Result<Vec<i32>> {
        let throttler = Throttler::new(CREATE_ACTUAL_MAX_WORKERS)?;
        let created = Arc::new(Mutex::new(Vec::new()));

        let works = keys.into_iter().map(|key| {
            let gateway = self.gateway.clone();
            let created = Arc::clone(&created);
            async move {
                let record_key = ActualLrpRecordKey::index(&key.process_guid, key.index);
                let index = key.index;
                let actual = ActualLrp::unclaimed(key);

                match gateway.create(record_key.as_ref(), &actual).await {
                    Ok(()) => {
                        created
                            .lock()
                            .map_err(|_| Error::unknown("created-indices lock poisoned"))?
                            .push(index);
                    }
                    Err(Error::ResourceExists { .. }) => {
                        tracing::debug!(
                            process_guid = %actual.key.process_guid,
                            index,
                            "actual LRP already exists, skipping"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            process_guid = %actual.key.process_guid,
                            index,
                            error = %e,
                            "failed creating actual LRP"
                        );
                    }
                }
                Ok(())
            }
        });

        throttler.run(works).await?;

        let mut indices = created
            .lock()
            .map_err(|_| Error::unknown("created-indices lock poisoned"))?
            .clone();
        indices.sort_unstable();
        Ok(indices)
    }
}

/// Looks up a process's actual records, keyed by replica index.
///
/// # Errors
///
/// Any undecodable record collapses the lookup to `Unknown`: partial
/// replica sets would make range math silently wrong.
pub(crate) async fn instance_actuals(
    gateway: &StoreGateway,
    process_guid: &str,
) -> Result<BTreeMap<i32, ActualLrp>> {
    let prefix = ActualLrpRecordKey::process_dir(process_guid);
    let records = gateway.list_raw(prefix.as_ref()).await?;

    let mut actuals = BTreeMap::new();
    for record in records {
        let actual: ActualLrp = codec::decode(&record.value).map_err(|e| {
            tracing::error!(key = %record.key, error = %e, "failed to parse actual LRP record");
            Error::unknown(format!("cannot parse actual LRP for key {}", record.key))
        })?;
        actuals.insert(actual.key.index, actual);
    }

    Ok(actuals)
}
