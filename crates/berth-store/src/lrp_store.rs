//! The desired/actual LRP state machine.
//!
//! Owns the declared specs of long-running processes and the per-index
//! actual records that shadow them. Creating or resizing a desired LRP
//! computes the replica delta and hands the affected index range to
//! [`Placement`](crate::placement::Placement) only after the desired record
//! has been durably written.
//!
//! Unlike task mutations, a lost compare-and-swap on a desired-LRP update
//! is not retried here: the caller supplied a delta against a record that
//! no longer exists, so the store surfaces `DesiredLrpCannotBeUpdated` and
//! the caller re-reads and retries with fresh state.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use berth_core::codec;
use berth_core::keys::DesiredLrpRecordKey;
use berth_core::workpool::Throttler;
use berth_core::{Error, Result};

use crate::gateway::StoreGateway;
use crate::models::{ActualLrp, DesiredLrp, DesiredLrpFilter, DesiredLrpUpdate, ModificationTag};
use crate::placement::{instance_actuals, Placement};

/// Concurrency cap for deserializing desired-LRP listings.
const DESIRED_GETTER_MAX_WORKERS: usize = 50;

/// The authoritative store for long-running processes.
#[derive(Clone)]
pub struct LrpStore {
    gateway: StoreGateway,
    placement: Placement,
}

impl std::fmt::Debug for LrpStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LrpStore")
            .field("gateway", &self.gateway)
            .field("placement", &self.placement)
            .finish()
    }
}

impl LrpStore {
    /// Creates an LRP store over the given gateway and placement.
    #[must_use]
    pub fn new(gateway: StoreGateway, placement: Placement) -> Self {
        Self { gateway, placement }
    }

    /// Creates a new desired LRP and starts its full replica range.
    ///
    /// The record is persisted with a fresh modification tag (epoch assigned
    /// here, index 0) regardless of what the caller supplied.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` when validation fails; `ResourceExists` when the
    /// process guid is already taken.
    pub async fn desire_lrp(&self, mut lrp: DesiredLrp) -> Result<()> {
        lrp.validate()?;
        lrp.modification_tag = ModificationTag::fresh();

        let key = DesiredLrpRecordKey::process_guid(&lrp.process_guid);
        self.gateway.create(key.as_ref(), &lrp).await?;

        tracing::info!(
            process_guid = %lrp.process_guid,
            instances = lrp.instances,
            "desired LRP"
        );

        self.placement
            .start_instance_range(0, lrp.instances, &lrp)
            .await;
        Ok(())
    }

    /// Fetches one desired LRP.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` when no record with this process guid exists.
    pub async fn desired_lrp_by_process_guid(&self, process_guid: &str) -> Result<DesiredLrp> {
        let key = DesiredLrpRecordKey::process_guid(process_guid);
        let (lrp, _version) = self.gateway.fetch::<DesiredLrp>(key.as_ref()).await?;
        Ok(lrp)
    }

    /// Lists every desired LRP passing the filter.
    ///
    /// Deserialization fans out through the work pool; any undecodable
    /// record collapses the whole listing to `Unknown`; partial replica
    /// views would mislead schedulers.
    ///
    /// # Errors
    ///
    /// `Unknown` when a stored record cannot be decoded.
    pub async fn desired_lrps(&self, filter: &DesiredLrpFilter) -> Result<Vec<DesiredLrp>> {
        let records = self
            .gateway
            .list_raw(DesiredLrpRecordKey::dir().as_ref())
            .await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let throttler = Throttler::new(DESIRED_GETTER_MAX_WORKERS)?;
        let results = Arc::new(Mutex::new(Vec::new()));

        let works = records.into_iter().map(|record| {
            let results = Arc::clone(&results);
            let filter = filter.clone();
            async move {
                let lrp: DesiredLrp = codec::decode(&record.value).map_err(|e| {
                    tracing::error!(key = %record.key, error = %e, "failed to parse desired LRP record");
                    Error::unknown(format!("cannot parse desired LRP for key {}", record.key))
                })?;

                if filter.matches(&lrp) {
                    results
                        .lock()
                        .map_err(|_| Error::unknown("desired LRP listing lock poisoned"))?
                        .push(lrp);
                }
                Ok(())
            }
        });

        if let Err(e) = throttler.run(works).await {
            tracing::error!(error = %e, "failed deserializing desired LRP records");
            return Err(Error::unknown("failed deserializing desired LRP records"));
        }

        let lrps = {
            let mut guard = results
                .lock()
                .map_err(|_| Error::unknown("desired LRP listing lock poisoned"))?;
            std::mem::take(&mut *guard)
        };
        Ok(lrps)
    }

    /// Applies a partial update and reconciles the replica range.
    ///
    /// Runs one get → apply → compare-and-swap cycle. On success the
    /// modification tag index has advanced by exactly one and placement is
    /// invoked for the instance delta; the updated record is returned.
    ///
    /// # Errors
    ///
    /// `DesiredLrpCannotBeUpdated` when the record changed between the get
    /// and the swap (the caller re-reads and retries);
    /// `ResourceNotFound` when no record with this process guid exists;
    /// `InvalidRequest` when the update itself is invalid.
    pub async fn update_desired_lrp(
        &self,
        process_guid: &str,
        update: &DesiredLrpUpdate,
    ) -> Result<DesiredLrp> {
        update.validate()?;

        let key = DesiredLrpRecordKey::process_guid(process_guid);
        let (mut lrp, version) = self.gateway.fetch::<DesiredLrp>(key.as_ref()).await?;

        let existing_instances = lrp.instances;
        lrp.apply_update(update);
        lrp.modification_tag.increment();

        match self
            .gateway
            .compare_and_swap(key.as_ref(), &lrp, &version)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                tracing::warn!(process_guid, error = %e, "desired LRP update lost the race");
                return Err(Error::DesiredLrpCannotBeUpdated {
                    process_guid: process_guid.to_string(),
                });
            }
            Err(e) => return Err(e),
        }

        tracing::info!(
            process_guid,
            instances = lrp.instances,
            tag_index = lrp.modification_tag.index,
            "updated desired LRP"
        );

        let diff = lrp.instances - existing_instances;
        if diff > 0 {
            self.placement
                .start_instance_range(existing_instances, lrp.instances, &lrp)
                .await;
        } else if diff < 0 {
            self.placement
                .stop_instance_range(lrp.instances, existing_instances, &lrp)
                .await;
        }

        Ok(lrp)
    }

    /// Removes a desired LRP and retires its whole replica range.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` when no record with this process guid exists.
    pub async fn remove_desired_lrp(&self, process_guid: &str) -> Result<()> {
        let key = DesiredLrpRecordKey::process_guid(process_guid);
        let (lrp, _version) = self.gateway.fetch::<DesiredLrp>(key.as_ref()).await?;

        self.gateway.delete(key.as_ref(), true).await?;
        tracing::info!(process_guid, "removed desired LRP");

        self.placement
            .stop_instance_range(0, lrp.instances, &lrp)
            .await;
        Ok(())
    }

    /// Looks up a process's actual records, keyed by replica index.
    ///
    /// # Errors
    ///
    /// `Unknown` when a stored record cannot be decoded.
    pub async fn actual_lrps_by_process_guid(
        &self,
        process_guid: &str,
    ) -> Result<BTreeMap<i32, ActualLrp>> {
        instance_actuals(&self.gateway, process_guid).await
    }
}
