//! Desired-LRP API routes.
//!
//! ## Routes
//!
//! - `POST /v1/desired_lrps` - Desire a new LRP
//! - `GET /v1/desired_lrps` - List desired LRPs (`?domain=`)
//! - `GET /v1/desired_lrps/{process_guid}` - Fetch one desired LRP
//! - `PUT /v1/desired_lrps/{process_guid}` - Apply a partial update
//! - `DELETE /v1/desired_lrps/{process_guid}` - Remove and retire
//! - `GET /v1/desired_lrps/{process_guid}/actual_lrps` - The replica set

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::Instrument;

use berth_core::observability::lrp_span;
use berth_store::models::{
    ActualLrp, DesiredLrp, DesiredLrpFilter, DesiredLrpUpdate, LrpDefinition,
};

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// Builds the desired-LRP routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/desired_lrps", get(list_desired_lrps).post(desire_lrp))
        .route(
            "/v1/desired_lrps/{process_guid}",
            get(desired_lrp_by_process_guid)
                .put(update_desired_lrp)
                .delete(remove_desired_lrp),
        )
        .route(
            "/v1/desired_lrps/{process_guid}/actual_lrps",
            get(actual_lrps_by_process_guid),
        )
}

/// Request body for `POST /v1/desired_lrps`.
#[derive(Debug, Clone, Deserialize)]
pub struct DesireLrpRequest {
    /// Unique process identifier.
    pub process_guid: String,
    /// The domain the process belongs to.
    pub domain: String,
    /// Declared replica count.
    pub instances: i32,
    /// What each instance runs.
    pub definition: LrpDefinition,
    /// Free-form operator note.
    #[serde(default)]
    pub annotation: String,
    /// Routing data, opaque to the store.
    #[serde(default)]
    pub routes: Option<serde_json::Value>,
}

/// Query parameters for `GET /v1/desired_lrps`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListDesiredLrpsQuery {
    /// Only processes in this domain.
    pub domain: Option<String>,
}

fn require(field: &str, value: &str) -> ApiResult<()> {
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(())
}

async fn desire_lrp(
    State(state): State<AppState>,
    Json(body): Json<DesireLrpRequest>,
) -> ApiResult<StatusCode> {
    require("process_guid", &body.process_guid)?;
    require("domain", &body.domain)?;

    let mut lrp = DesiredLrp::new(
        body.process_guid.clone(),
        body.domain,
        body.instances,
        body.definition,
    );
    lrp.annotation = body.annotation;
    lrp.routes = body.routes;

    state
        .lrp_store
        .desire_lrp(lrp)
        .instrument(lrp_span("desire-lrp", &body.process_guid))
        .await?;
    Ok(StatusCode::CREATED)
}

async fn list_desired_lrps(
    State(state): State<AppState>,
    Query(query): Query<ListDesiredLrpsQuery>,
) -> ApiResult<Json<Vec<DesiredLrp>>> {
    let filter = DesiredLrpFilter {
        domain: query.domain,
    };
    let lrps = state.lrp_store.desired_lrps(&filter).await?;
    Ok(Json(lrps))
}

async fn desired_lrp_by_process_guid(
    State(state): State<AppState>,
    Path(process_guid): Path<String>,
) -> ApiResult<Json<DesiredLrp>> {
    let lrp = state
        .lrp_store
        .desired_lrp_by_process_guid(&process_guid)
        .await?;
    Ok(Json(lrp))
}

async fn update_desired_lrp(
    State(state): State<AppState>,
    Path(process_guid): Path<String>,
    Json(update): Json<DesiredLrpUpdate>,
) -> ApiResult<Json<DesiredLrp>> {
    let lrp = state
        .lrp_store
        .update_desired_lrp(&process_guid, &update)
        .instrument(lrp_span("update-desired-lrp", &process_guid))
        .await?;
    Ok(Json(lrp))
}

async fn remove_desired_lrp(
    State(state): State<AppState>,
    Path(process_guid): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .lrp_store
        .remove_desired_lrp(&process_guid)
        .instrument(lrp_span("remove-desired-lrp", &process_guid))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn actual_lrps_by_process_guid(
    State(state): State<AppState>,
    Path(process_guid): Path<String>,
) -> ApiResult<Json<Vec<ActualLrp>>> {
    let actuals = state
        .lrp_store
        .actual_lrps_by_process_guid(&process_guid)
        .await?;
    Ok(Json(actuals.into_values().collect()))
}
