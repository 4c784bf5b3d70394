//! # berth-core
//!
//! Core abstractions for the berth control-plane state store.
//!
//! This crate provides the foundational types and traits used across all
//! berth components:
//!
//! - **Error Taxonomy**: The domain errors every store operation surfaces
//! - **KV Backend**: The abstract versioned key-value store the BBS persists to
//! - **Record Keys**: Strongly-typed keys for task and LRP records
//! - **Codec**: Serialization of entity records to stored bytes
//! - **Work Pool**: Bounded-concurrency fan-out for batch operations
//!
//! ## Crate Boundary
//!
//! `berth-core` is the **only** crate allowed to define shared primitives.
//! It knows nothing about tasks or LRPs beyond the shape of their record
//! keys; the domain state machines live in `berth-store`.
//!
//! ## Example
//!
//! ```rust
//! use berth_core::prelude::*;
//!
//! let key = TaskRecordKey::guid("some-task-guid");
//! assert_eq!(key.as_ref(), "/v1/task/some-task-guid");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod codec;
pub mod error;
pub mod keys;
pub mod kv;
pub mod observability;
pub mod workpool;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use berth_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::keys::{ActualLrpRecordKey, DesiredLrpRecordKey, RecordKey, TaskRecordKey};
    pub use crate::kv::{KvBackend, KvRecord, MemoryKv, WritePrecondition, WriteResult};
    pub use crate::workpool::Throttler;
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use keys::{ActualLrpRecordKey, DesiredLrpRecordKey, RecordKey, TaskRecordKey};
pub use kv::{KvBackend, KvRecord, MemoryKv, WritePrecondition, WriteResult};
pub use observability::{init_logging, LogFormat};
pub use workpool::Throttler;
