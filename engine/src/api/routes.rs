//! Request handlers

use super::{ApiError, AppState};
use crate::conductor::{CommandOutcome, GenerationError, PipelineError};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sdk::types::{ActionRequest, Project, StatusReport, Task};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub command: String,
}

#[derive(Debug, Deserialize)]
pub struct MemoryQuery {
    pub limit: Option<usize>,
}

const DEFAULT_MEMORY_LIMIT: usize = 20;
const MAX_MEMORY_LIMIT: usize = 200;

pub async fn root() -> Json<Value> {
    Json(json!({ "status": "LifeOS backend running" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}

pub async fn execute(
    State(state): State<AppState>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;

    match state.conductor.submit(&request.command).await {
        Ok(CommandOutcome::Executed(execution)) => Ok(Json(execution).into_response()),
        Ok(CommandOutcome::Queued(entry)) => Ok((
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "queued",
                "message": "AI generation is not configured yet; the command will run once it is",
                "id": entry.id,
            })),
        )
            .into_response()),
        Err(PipelineError::EmptyCommand) => Err(ApiError::bad_request("command must not be empty")),
        Err(PipelineError::Invalid(e)) => {
            Err(ApiError::new(StatusCode::BAD_GATEWAY, e.to_string()).with("raw", e.raw()))
        }
        Err(PipelineError::Generation(e)) => Ok(Json(degraded_execution(&e)).into_response()),
    }
}

/// Body returned when the model cannot be reached: nothing ran, the
/// score is neutral and the insight says why.
pub fn degraded_execution(error: &GenerationError) -> Value {
    json!({
        "error": "AI generation unavailable",
        "insight": error.insight(),
        "intent": "unknown",
        "actions": [],
        "result": [],
        "score": StatusReport::NEUTRAL_SCORE,
    })
}

pub async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.conductor.store().list_tasks().await?))
}

pub async fn toggle_task(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Task>, ApiError> {
    let Path(id) = id?;
    state
        .conductor
        .store()
        .toggle_task(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Task not found"))
}

pub async fn list_projects(
    State(state): State<AppState>,
) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.conductor.store().list_projects().await?))
}

pub async fn toggle_project(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Project>, ApiError> {
    let Path(id) = id?;
    state
        .conductor
        .store()
        .toggle_project(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Project not found"))
}

pub async fn ingest(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(payload) = payload?;
    let Value::Object(metrics) = payload else {
        return Err(ApiError::bad_request(
            "expected a JSON object of metric names to values",
        ));
    };

    let updated = state.conductor.ingest(metrics).await?;
    Ok(Json(json!({ "status": "ok", "updated": updated })))
}

pub async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.conductor.status().await)
}

pub async fn execute_action(
    State(state): State<AppState>,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let outcome = state.conductor.execute_action(request).await;
    Ok(Json(json!(outcome)))
}

pub async fn queue(State(state): State<AppState>) -> Json<Value> {
    let queue = state.conductor.queue();
    Json(json!({
        "pending": queue.pending().await,
        "dead_letters": queue.dead_letters().await,
    }))
}

pub async fn memory(
    State(state): State<AppState>,
    query: Result<Query<MemoryQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_MEMORY_LIMIT)
        .clamp(1, MAX_MEMORY_LIMIT);

    let records = state.conductor.recent_memory(limit).await?;
    Ok(Json(json!({
        "count": records.len(),
        "memory": records,
    })))
}
