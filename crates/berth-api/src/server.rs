//! API server implementation.
//!
//! Provides health, ready, and API endpoints for the berth state store.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use berth_core::kv::KvBackend;
use berth_core::MemoryKv;
use berth_store::clients::memory::{MemoryAuctioneerClient, MemoryCellClient};
use berth_store::clients::{AuctioneerClient, CellClient};
use berth_store::{LrpStore, Placement, StoreGateway, TaskStore};

use crate::config::Config;
use crate::routes;

// ============================================================================
// Health and Ready Responses
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ReadyResponse {
    /// Service readiness status.
    pub ready: bool,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// The task state machine.
    pub task_store: TaskStore,
    /// The desired/actual LRP state machine.
    pub lrp_store: LrpStore,
}

impl AppState {
    /// Creates application state over the given backend and collaborators.
    #[must_use]
    pub fn new(
        config: Config,
        kv: Arc<dyn KvBackend>,
        auctioneer: Arc<dyn AuctioneerClient>,
        cells: Arc<dyn CellClient>,
    ) -> Self {
        let gateway = StoreGateway::new(kv);
        let placement = Placement::new(gateway.clone(), auctioneer, cells.clone());
        Self {
            config,
            task_store: TaskStore::new(gateway.clone(), cells),
            lrp_store: LrpStore::new(gateway, placement),
        }
    }

    /// Creates application state with the in-memory backend and recording
    /// collaborators (for testing and the debug server).
    #[must_use]
    pub fn with_memory_backend(config: Config) -> Self {
        Self::new(
            config,
            Arc::new(MemoryKv::new()),
            Arc::new(MemoryAuctioneerClient::new()),
            Arc::new(MemoryCellClient::new()),
        )
    }
}

// ============================================================================
// Server
// ============================================================================

/// The API server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Creates a server with the in-memory backend (debug mode).
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            state: AppState::with_memory_backend(config),
        }
    }

    /// Creates a server over pre-built application state.
    #[must_use]
    pub fn with_state(state: AppState) -> Self {
        Self { state }
    }

    /// Builds the full router, including health endpoints.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/healthz", get(healthz))
            .route("/readyz", get(readyz))
            .merge(routes::router())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Binds the configured address and serves until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error when the listener cannot bind or the server fails.
    pub async fn serve(self) -> std::io::Result<()> {
        let addr = self.state.config.listen_addr;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "berth API listening");
        axum::serve(listener, self.router()).await
    }
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn readyz() -> Json<ReadyResponse> {
    Json(ReadyResponse { ready: true })
}
