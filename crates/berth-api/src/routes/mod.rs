//! Route modules for the API surface.

pub mod desired_lrps;
pub mod tasks;

use axum::Router;

use crate::server::AppState;

/// Builds the combined API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(tasks::router())
        .merge(desired_lrps::router())
}
