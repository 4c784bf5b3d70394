//! # berth-api
//!
//! The HTTP surface of the berth control-plane state store.
//!
//! This crate is a thin adapter: every route validates the presence of its
//! identifiers, calls the corresponding `berth-store` operation, and maps
//! the domain error taxonomy onto HTTP statuses. No state logic lives here.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod routes;
pub mod server;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use server::{AppState, Server};
