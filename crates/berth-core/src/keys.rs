//! Typed record keys for the persisted key layout.
//!
//! This module provides strongly-typed keys that encode the canonical path
//! of each record kind. Using key types instead of `&str` keeps the layout
//! in one place and makes a malformed path a type error at the call site.
//!
//! # Key Layout
//!
//! | Key Type | Path |
//! |----------|------|
//! | `TaskRecordKey` | `/v1/task/<task_guid>` |
//! | `DesiredLrpRecordKey` | `/v1/desired/<process_guid>` |
//! | `ActualLrpRecordKey` | `/v1/actual/<process_guid>/<index>` |
//!
//! # Example
//!
//! ```rust
//! use berth_core::keys::{ActualLrpRecordKey, DesiredLrpRecordKey};
//!
//! let desired = DesiredLrpRecordKey::process_guid("my-process");
//! let actual = ActualLrpRecordKey::index("my-process", 3);
//!
//! assert_eq!(desired.as_ref(), "/v1/desired/my-process");
//! assert_eq!(actual.as_ref(), "/v1/actual/my-process/3");
//! ```

/// A typed record key that encodes path structure.
///
/// All key types implement this trait to provide uniform access to the
/// underlying path string.
pub trait RecordKey: AsRef<str> {
    /// Returns the underlying path string.
    fn path(&self) -> &str {
        self.as_ref()
    }
}

// ============================================================================
// TaskRecordKey
// ============================================================================

/// A typed key for task records.
///
/// # Path Format
///
/// `/v1/task/<task_guid>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskRecordKey(String);

impl TaskRecordKey {
    /// The directory prefix under which all task records live.
    pub const ROOT: &'static str = "/v1/task";

    /// Creates the key for a single task record.
    #[must_use]
    pub fn guid(task_guid: &str) -> Self {
        Self(format!("{}/{task_guid}", Self::ROOT))
    }

    /// Creates the listing prefix for all task records.
    #[must_use]
    pub fn dir() -> Self {
        Self(format!("{}/", Self::ROOT))
    }
}

impl AsRef<str> for TaskRecordKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl RecordKey for TaskRecordKey {}

impl std::fmt::Display for TaskRecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// DesiredLrpRecordKey
// ============================================================================

/// A typed key for desired-LRP records.
///
/// # Path Format
///
/// `/v1/desired/<process_guid>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DesiredLrpRecordKey(String);

impl DesiredLrpRecordKey {
    /// The directory prefix under which all desired-LRP records live.
    pub const ROOT: &'static str = "/v1/desired";

    /// Creates the key for a single desired-LRP record.
    #[must_use]
    pub fn process_guid(process_guid: &str) -> Self {
        Self(format!("{}/{process_guid}", Self::ROOT))
    }

    /// Creates the listing prefix for all desired-LRP records.
    #[must_use]
    pub fn dir() -> Self {
        Self(format!("{}/", Self::ROOT))
    }
}

impl AsRef<str> for DesiredLrpRecordKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl RecordKey for DesiredLrpRecordKey {}

impl std::fmt::Display for DesiredLrpRecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ActualLrpRecordKey
// ============================================================================

/// A typed key for actual-LRP records.
///
/// One record exists per `(process_guid, index)` pair; records for a process
/// share the `/v1/actual/<process_guid>/` prefix so they can be listed and
/// deleted as a group.
///
/// # Path Format
///
/// `/v1/actual/<process_guid>/<index>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActualLrpRecordKey(String);

impl ActualLrpRecordKey {
    /// The directory prefix under which all actual-LRP records live.
    pub const ROOT: &'static str = "/v1/actual";

    /// Creates the key for a single actual-LRP record.
    #[must_use]
    pub fn index(process_guid: &str, index: i32) -> Self {
        Self(format!("{}/{process_guid}/{index}", Self::ROOT))
    }

    /// Creates the listing prefix for one process's actual-LRP records.
    #[must_use]
    pub fn process_dir(process_guid: &str) -> Self {
        Self(format!("{}/{process_guid}/", Self::ROOT))
    }
}

impl AsRef<str> for ActualLrpRecordKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl RecordKey for ActualLrpRecordKey {}

impl std::fmt::Display for ActualLrpRecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
