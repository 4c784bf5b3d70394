//! # berth-store
//!
//! The task and LRP state machines of the berth control-plane state store.
//!
//! This crate owns the formal lifecycle of the two workload kinds:
//!
//! - **Tasks**: run-once jobs walking Pending → Running → Completed →
//!   Resolving before deletion ([`TaskStore`])
//! - **Desired/Actual LRPs**: long-running processes with a declared replica
//!   count, reconciled into per-index actual records ([`LrpStore`])
//!
//! All persisted mutation is read-modify-compare-and-swap against the KV
//! backend from `berth-core`; correctness under concurrency derives from the
//! KV's linearizable CAS, never from in-process locks. Side effects (auction
//! requests to the auctioneer, retirement signals to cells) are dispatched
//! strictly after persistence succeeds and are best-effort: their failures
//! are logged, never propagated, because the external convergence loop is
//! the authoritative retry mechanism.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod clients;
pub mod gateway;
pub mod lrp_store;
pub mod models;
pub mod placement;
pub mod task_store;

pub use berth_core::{Error, Result};

pub use clients::{AuctioneerClient, CellClient, LrpStartRequest};
pub use gateway::StoreGateway;
pub use lrp_store::LrpStore;
pub use placement::Placement;
pub use task_store::TaskStore;
