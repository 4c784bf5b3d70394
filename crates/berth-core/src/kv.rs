//! Versioned key-value backend abstraction.
//!
//! This module defines the storage contract the state store persists through.
//! The contract assumes a linearizable KV with per-key version tokens:
//!
//! - Conditional writes with preconditions (create-if-absent, compare-and-swap)
//! - Reads that return the version token alongside the value
//! - Prefix listing and recursive delete
//!
//! ## Version tokens
//!
//! The version token is an opaque `String` so different backends can supply
//! their own notion of a modified index. Tokens are monotonic per key: a
//! successful write always produces a token distinct from every earlier one
//! for that key. Callers never interpret tokens, they only hand them back on
//! compare-and-swap.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// Precondition for conditional writes.
#[derive(Debug, Clone)]
pub enum WritePrecondition {
    /// Write only if the key does not exist.
    DoesNotExist,
    /// Write only if the key's version matches the given token.
    MatchesVersion(String),
    /// Write unconditionally.
    None,
}

/// Result of a conditional write.
///
/// A failed precondition is a normal result, never an error: the caller
/// decides whether it means "already exists" or "lost the race".
#[derive(Debug, Clone)]
pub enum WriteResult {
    /// Write succeeded, returns the new version token.
    Success {
        /// The key's version token after the write.
        version: String,
    },
    /// Precondition failed, returns the current version token.
    PreconditionFailed {
        /// The version that caused the precondition to fail, or `"0"` when
        /// the key does not exist.
        current_version: String,
    },
}

impl WriteResult {
    /// Returns true when the write was applied.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// A stored record: key, raw value, and its version token.
#[derive(Debug, Clone)]
pub struct KvRecord {
    /// The record's key.
    pub key: String,
    /// The stored bytes.
    pub value: Bytes,
    /// The record's current version token.
    pub version: String,
}

/// The key-value backend trait the state store persists through.
///
/// Required semantics: linearizable reads, monotonic per-key version tokens,
/// atomic compare-and-swap, recursive delete.
#[async_trait]
pub trait KvBackend: Send + Sync + 'static {
    /// Reads a record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceNotFound`] if the key is absent.
    async fn get(&self, key: &str) -> Result<KvRecord>;

    /// Lists all records under the given prefix.
    ///
    /// Returns an empty vec when no key matches. Results are returned in
    /// arbitrary order; callers requiring deterministic order sort them.
    async fn list(&self, prefix: &str) -> Result<Vec<KvRecord>>;

    /// Writes a record subject to a precondition.
    ///
    /// Returns [`WriteResult::PreconditionFailed`] when the precondition is
    /// not met; that is a normal result, not an error.
    async fn put(
        &self,
        key: &str,
        value: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult>;

    /// Deletes a record, or a whole subtree when `recursive` is set.
    ///
    /// A recursive delete of `key` removes `key` itself and every record
    /// under `key/`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceNotFound`] when nothing matched.
    async fn delete(&self, key: &str, recursive: bool) -> Result<()>;
}

/// In-memory KV backend for testing and the debug server.
///
/// Thread-safe via `RwLock`. Not suitable for production: single-process,
/// no persistence. Uses numeric versions internally (exposed as strings) to
/// simulate a modified-index-style token.
#[derive(Debug, Default)]
pub struct MemoryKv {
    records: Arc<RwLock<HashMap<String, StoredRecord>>>,
}

#[derive(Debug, Clone)]
struct StoredRecord {
    value: Bytes,
    version: u64,
}

impl MemoryKv {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_poisoned() -> Error {
    Error::unknown("kv lock poisoned")
}

#[async_trait]
impl KvBackend for MemoryKv {
    async fn get(&self, key: &str) -> Result<KvRecord> {
        let records = self.records.read().map_err(|_| lock_poisoned())?;

        records
            .get(key)
            .map(|r| KvRecord {
                key: key.to_string(),
                value: r.value.clone(),
                version: r.version.to_string(),
            })
            .ok_or_else(|| Error::resource_not_found(key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<KvRecord>> {
        let records = self.records.read().map_err(|_| lock_poisoned())?;

        Ok(records
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(key, r)| KvRecord {
                key: key.clone(),
                value: r.value.clone(),
                version: r.version.to_string(),
            })
            .collect())
    }

    async fn put(
        &self,
        key: &str,
        value: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let mut records = self.records.write().map_err(|_| lock_poisoned())?;

        let current = records.get(key);

        match precondition {
            WritePrecondition::DoesNotExist => {
                if let Some(r) = current {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: r.version.to_string(),
                    });
                }
            }
            WritePrecondition::MatchesVersion(expected) => {
                let expected_num: u64 = expected.parse().unwrap_or(0);
                match current {
                    Some(r) if r.version != expected_num => {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: r.version.to_string(),
                        });
                    }
                    None => {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: "0".to_string(),
                        });
                    }
                    _ => {}
                }
            }
            WritePrecondition::None => {}
        }

        let new_version = current.map_or(1, |r| r.version + 1);
        records.insert(
            key.to_string(),
            StoredRecord {
                value,
                version: new_version,
            },
        );
        drop(records);

        Ok(WriteResult::Success {
            version: new_version.to_string(),
        })
    }

    async fn delete(&self, key: &str, recursive: bool) -> Result<()> {
        let mut records = self.records.write().map_err(|_| lock_poisoned())?;

        if recursive {
            let subtree = format!("{key}/");
            let before = records.len();
            records.retain(|k, _| k != key && !k.starts_with(&subtree));
            if records.len() == before {
                return Err(Error::resource_not_found(key));
            }
        } else if records.remove(key).is_none() {
            return Err(Error::resource_not_found(key));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_returns_version() {
        let kv = MemoryKv::new();
        let data = Bytes::from("hello");

        let result = kv
            .put("test/record", data.clone(), WritePrecondition::None)
            .await
            .expect("put should succeed");
        assert!(matches!(result, WriteResult::Success { ref version } if version == "1"));

        let record = kv.get("test/record").await.expect("get should succeed");
        assert_eq!(record.value, data);
        assert_eq!(record.version, "1");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let kv = MemoryKv::new();
        let err = kv.get("absent").await.expect_err("should be missing");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn create_precondition_rejects_existing() {
        let kv = MemoryKv::new();

        let result = kv
            .put("rec", Bytes::from("a"), WritePrecondition::DoesNotExist)
            .await
            .expect("should succeed");
        assert!(result.is_success());

        let result = kv
            .put("rec", Bytes::from("b"), WritePrecondition::DoesNotExist)
            .await
            .expect("should succeed");
        assert!(matches!(result, WriteResult::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn cas_requires_matching_version() {
        let kv = MemoryKv::new();

        let result = kv
            .put("rec", Bytes::from("v1"), WritePrecondition::None)
            .await
            .expect("should succeed");
        let first_version = match result {
            WriteResult::Success { version } => version,
            WriteResult::PreconditionFailed { .. } => panic!("expected success"),
        };

        let result = kv
            .put(
                "rec",
                Bytes::from("v2"),
                WritePrecondition::MatchesVersion(first_version.clone()),
            )
            .await
            .expect("should succeed");
        assert!(result.is_success());

        // The token from before the second write is now stale.
        let result = kv
            .put(
                "rec",
                Bytes::from("v3"),
                WritePrecondition::MatchesVersion(first_version),
            )
            .await
            .expect("should succeed");
        assert!(matches!(result, WriteResult::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn cas_on_missing_key_fails_precondition() {
        let kv = MemoryKv::new();

        let result = kv
            .put(
                "absent",
                Bytes::from("x"),
                WritePrecondition::MatchesVersion("1".into()),
            )
            .await
            .expect("should succeed");
        assert!(matches!(
            result,
            WriteResult::PreconditionFailed { ref current_version } if current_version == "0"
        ));
    }

    #[tokio::test]
    async fn versions_are_monotonic() {
        let kv = MemoryKv::new();

        for expected in 1..=3u64 {
            let result = kv
                .put("rec", Bytes::from("x"), WritePrecondition::None)
                .await
                .expect("put should succeed");
            match result {
                WriteResult::Success { version } => {
                    assert_eq!(version, expected.to_string());
                }
                WriteResult::PreconditionFailed { .. } => panic!("expected success"),
            }
        }
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let kv = MemoryKv::new();

        for key in ["a/1", "a/2", "b/1"] {
            kv.put(key, Bytes::from("x"), WritePrecondition::None)
                .await
                .expect("put should succeed");
        }

        let under_a = kv.list("a/").await.expect("list should succeed");
        assert_eq!(under_a.len(), 2);

        let under_b = kv.list("b/").await.expect("list should succeed");
        assert_eq!(under_b.len(), 1);

        let none = kv.list("c/").await.expect("list should succeed");
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let kv = MemoryKv::new();

        kv.put("rec", Bytes::from("x"), WritePrecondition::None)
            .await
            .expect("put should succeed");
        kv.delete("rec", false).await.expect("delete should succeed");

        assert!(kv.get("rec").await.is_err());
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let kv = MemoryKv::new();
        let err = kv
            .delete("absent", false)
            .await
            .expect_err("should be missing");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn recursive_delete_removes_subtree() {
        let kv = MemoryKv::new();

        for key in ["p", "p/0", "p/1", "q/0"] {
            kv.put(key, Bytes::from("x"), WritePrecondition::None)
                .await
                .expect("put should succeed");
        }

        kv.delete("p", true).await.expect("delete should succeed");

        assert!(kv.get("p").await.is_err());
        assert!(kv.get("p/0").await.is_err());
        assert!(kv.get("p/1").await.is_err());
        assert!(kv.get("q/0").await.is_ok());
    }
}
