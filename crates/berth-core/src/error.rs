//! Error types and result aliases for berth.
//!
//! Every operation on the state store resolves to one of the kinds below.
//! The API layer maps kinds to HTTP statuses; the store crates surface them
//! directly to callers.

use std::fmt;

/// The result type used throughout berth.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in berth operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested record does not exist.
    #[error("resource not found: {resource}")]
    ResourceNotFound {
        /// The key or identifier that was looked up.
        resource: String,
    },

    /// A create was attempted for a record that already exists.
    #[error("resource already exists: {resource}")]
    ResourceExists {
        /// The key or identifier that collided.
        resource: String,
    },

    /// A compare-and-swap lost the race after all permitted retries.
    #[error("resource conflict: {message}")]
    ResourceConflict {
        /// Description of the conflicting write.
        message: String,
    },

    /// Validation failed on an input payload.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of what made the request invalid.
        message: String,
    },

    /// The operation is not legal from the record's current state.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// The record's current state.
        from: String,
        /// The state the operation would have produced.
        to: String,
    },

    /// A desired-LRP update lost its compare-and-swap.
    ///
    /// Surfaced instead of [`Error::ResourceConflict`] so callers know to
    /// re-read and retry the update themselves.
    #[error("desired LRP cannot be updated: {process_guid}")]
    DesiredLrpCannotBeUpdated {
        /// The process guid of the contested record.
        process_guid: String,
    },

    /// Stored bytes could not be decoded into a record.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Description of the decode failure.
        message: String,
    },

    /// Any other failure, including I/O against the KV backend.
    #[error("unknown error: {message}")]
    Unknown {
        /// Description of the failure.
        message: String,
    },
}

impl Error {
    /// Creates a new resource-not-found error.
    #[must_use]
    pub fn resource_not_found(resource: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            resource: resource.into(),
        }
    }

    /// Creates a new resource-exists error.
    #[must_use]
    pub fn resource_exists(resource: impl Into<String>) -> Self {
        Self::ResourceExists {
            resource: resource.into(),
        }
    }

    /// Creates a new resource-conflict error.
    #[must_use]
    pub fn resource_conflict(message: impl Into<String>) -> Self {
        Self::ResourceConflict {
            message: message.into(),
        }
    }

    /// Creates a new invalid-request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new invalid-state-transition error.
    #[must_use]
    pub fn invalid_state_transition(from: impl fmt::Display, to: impl fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Creates a new invalid-record error.
    #[must_use]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates a new unknown error.
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Returns true if this error is a resource conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ResourceConflict { .. })
    }

    /// Returns true if this error is a resource-not-found.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound { .. })
    }
}
