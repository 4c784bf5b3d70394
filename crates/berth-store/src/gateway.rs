//! Typed wrappers over the KV backend.
//!
//! `StoreGateway` is the single seam between the state machines and the KV:
//! it decodes records on the way out, encodes them on the way in, and maps
//! the backend's precondition outcomes into the domain error taxonomy:
//! a failed create becomes `ResourceExists`, a failed compare-and-swap
//! becomes `ResourceConflict`. The state machines never touch raw bytes or
//! `WriteResult` values.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use berth_core::codec;
use berth_core::kv::{KvBackend, KvRecord, WritePrecondition, WriteResult};
use berth_core::{Error, Result};

/// Typed KV access for the state machines.
#[derive(Clone)]
pub struct StoreGateway {
    kv: Arc<dyn KvBackend>,
}

impl std::fmt::Debug for StoreGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreGateway")
            .field("kv", &"<KvBackend>")
            .finish()
    }
}

impl StoreGateway {
    /// Creates a gateway over the given backend.
    #[must_use]
    pub fn new(kv: Arc<dyn KvBackend>) -> Self {
        Self { kv }
    }

    /// Fetches and decodes one record, returning its version token.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` when the key is absent; `InvalidRecord` when the
    /// stored bytes do not decode.
    pub async fn fetch<T: DeserializeOwned>(&self, key: &str) -> Result<(T, String)> {
        let record = self.kv.get(key).await?;
        let value = codec::decode(&record.value)?;
        Ok((value, record.version))
    }

    /// Lists the raw records under a prefix.
    ///
    /// Decoding is the caller's concern: listings fan out through the work
    /// pool rather than decoding serially here.
    pub async fn list_raw(&self, prefix: &str) -> Result<Vec<KvRecord>> {
        self.kv.list(prefix).await
    }

    /// Creates a record that must not already exist.
    ///
    /// # Errors
    ///
    /// `ResourceExists` when the key is already present.
    pub async fn create<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = codec::encode(value)?;
        match self
            .kv
            .put(key, bytes, WritePrecondition::DoesNotExist)
            .await?
        {
            WriteResult::Success { .. } => Ok(()),
            WriteResult::PreconditionFailed { .. } => Err(Error::resource_exists(key)),
        }
    }

    /// Replaces a record only if its version still matches `version`.
    ///
    /// # Errors
    ///
    /// `ResourceConflict` when the record changed since it was read.
    pub async fn compare_and_swap<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        version: &str,
    ) -> Result<()> {
        let bytes = codec::encode(value)?;
        match self
            .kv
            .put(
                key,
                bytes,
                WritePrecondition::MatchesVersion(version.to_string()),
            )
            .await?
        {
            WriteResult::Success { .. } => Ok(()),
            WriteResult::PreconditionFailed { current_version } => {
                Err(Error::resource_conflict(format!(
                    "{key}: expected version {version}, found {current_version}"
                )))
            }
        }
    }

    /// Deletes a record, or a whole subtree when `recursive` is set.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` when nothing matched.
    pub async fn delete(&self, key: &str, recursive: bool) -> Result<()> {
        self.kv.delete(key, recursive).await
    }
}
