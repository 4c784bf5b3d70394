//! Task API routes.
//!
//! ## Routes
//!
//! - `POST /v1/tasks` - Desire a new task
//! - `GET /v1/tasks` - List tasks (`?domain=`, `?cell_id=`)
//! - `GET /v1/tasks/{task_guid}` - Fetch one task
//! - `POST /v1/tasks/{task_guid}/start` - Cell claims the task
//! - `POST /v1/tasks/{task_guid}/cancel` - Abandon the task
//! - `POST /v1/tasks/{task_guid}/fail` - Mark the task failed
//! - `POST /v1/tasks/{task_guid}/complete` - Cell reports the outcome
//! - `POST /v1/tasks/{task_guid}/resolving` - Claim the result
//! - `DELETE /v1/tasks/{task_guid}` - Remove the resolved record

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use berth_core::observability::task_span;
use berth_store::models::{Task, TaskDefinition, TaskFilter};

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// Builds the task routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/tasks", post(desire_task).get(list_tasks))
        .route(
            "/v1/tasks/{task_guid}",
            get(task_by_guid).delete(delete_task),
        )
        .route("/v1/tasks/{task_guid}/start", post(start_task))
        .route("/v1/tasks/{task_guid}/cancel", post(cancel_task))
        .route("/v1/tasks/{task_guid}/fail", post(fail_task))
        .route("/v1/tasks/{task_guid}/complete", post(complete_task))
        .route("/v1/tasks/{task_guid}/resolving", post(resolving_task))
}

/// Request body for `POST /v1/tasks`.
#[derive(Debug, Clone, Deserialize)]
pub struct DesireTaskRequest {
    /// Globally unique task identifier.
    pub task_guid: String,
    /// The domain the task belongs to.
    pub domain: String,
    /// What to run.
    pub definition: TaskDefinition,
}

/// Query parameters for `GET /v1/tasks`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListTasksQuery {
    /// Only tasks in this domain.
    pub domain: Option<String>,
    /// Only tasks placed on this cell.
    pub cell_id: Option<String>,
}

/// Request body for `POST /v1/tasks/{task_guid}/start`.
#[derive(Debug, Clone, Deserialize)]
pub struct StartTaskRequest {
    /// The cell claiming the task.
    pub cell_id: String,
}

/// Response body for `POST /v1/tasks/{task_guid}/start`.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct StartTaskResponse {
    /// Whether the caller should start execution.
    pub should_start: bool,
}

/// Request body for `POST /v1/tasks/{task_guid}/fail`.
#[derive(Debug, Clone, Deserialize)]
pub struct FailTaskRequest {
    /// Why the task failed.
    pub failure_reason: String,
}

/// Request body for `POST /v1/tasks/{task_guid}/complete`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteTaskRequest {
    /// The cell reporting the outcome; must own the task.
    pub cell_id: String,
    /// Whether the task failed.
    #[serde(default)]
    pub failed: bool,
    /// Why the task failed, when `failed` is set.
    #[serde(default)]
    pub failure_reason: String,
    /// The result payload of a successful task.
    #[serde(default)]
    pub result: String,
}

fn require(field: &str, value: &str) -> ApiResult<()> {
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(())
}

async fn desire_task(
    State(state): State<AppState>,
    Json(body): Json<DesireTaskRequest>,
) -> ApiResult<StatusCode> {
    require("task_guid", &body.task_guid)?;
    require("domain", &body.domain)?;

    state
        .task_store
        .desire_task(&body.task_guid, &body.domain, body.definition)
        .instrument(task_span("desire-task", &body.task_guid))
        .await?;
    Ok(StatusCode::CREATED)
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    let filter = TaskFilter {
        domain: query.domain,
        cell_id: query.cell_id,
    };
    let tasks = state.task_store.tasks(&filter).await?;
    Ok(Json(tasks))
}

async fn task_by_guid(
    State(state): State<AppState>,
    Path(task_guid): Path<String>,
) -> ApiResult<Json<Task>> {
    let task = state.task_store.task_by_guid(&task_guid).await?;
    Ok(Json(task))
}

async fn start_task(
    State(state): State<AppState>,
    Path(task_guid): Path<String>,
    Json(body): Json<StartTaskRequest>,
) -> ApiResult<Json<StartTaskResponse>> {
    require("cell_id", &body.cell_id)?;

    let should_start = state
        .task_store
        .start_task(&task_guid, &body.cell_id)
        .instrument(task_span("start-task", &task_guid))
        .await?;
    Ok(Json(StartTaskResponse { should_start }))
}

async fn cancel_task(
    State(state): State<AppState>,
    Path(task_guid): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .task_store
        .cancel_task(&task_guid)
        .instrument(task_span("cancel-task", &task_guid))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn fail_task(
    State(state): State<AppState>,
    Path(task_guid): Path<String>,
    Json(body): Json<FailTaskRequest>,
) -> ApiResult<StatusCode> {
    state
        .task_store
        .fail_task(&task_guid, &body.failure_reason)
        .instrument(task_span("fail-task", &task_guid))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn complete_task(
    State(state): State<AppState>,
    Path(task_guid): Path<String>,
    Json(body): Json<CompleteTaskRequest>,
) -> ApiResult<StatusCode> {
    require("cell_id", &body.cell_id)?;

    state
        .task_store
        .complete_task(
            &task_guid,
            &body.cell_id,
            body.failed,
            &body.failure_reason,
            &body.result,
        )
        .instrument(task_span("complete-task", &task_guid))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn resolving_task(
    State(state): State<AppState>,
    Path(task_guid): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .task_store
        .resolving_task(&task_guid)
        .instrument(task_span("resolving-task", &task_guid))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_task(
    State(state): State<AppState>,
    Path(task_guid): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .task_store
        .delete_task(&task_guid)
        .instrument(task_span("delete-task", &task_guid))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
