use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use mimir_core::errors::AipError;
use mimir_scheduler::{JobLogEntry, ScheduledJob};
use serde::Deserialize;

use crate::error::ApiError;
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub pipeline_id: String,
    pub cron: String,
}

/// `POST /scheduler/jobs`
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ScheduledJob>>), ApiError> {
    let id = request.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let job = state
        .scheduler
        .add_job(id, request.name, request.pipeline_id, request.cron)
        .await
        .map_err(AipError::from)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(job))))
}

/// `GET /scheduler/jobs`
pub async fn list(State(state): State<AppState>) -> Json<ApiResponse<Vec<ScheduledJob>>> {
    Json(ApiResponse::success(state.scheduler.list().await))
}

/// `GET /scheduler/jobs/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ScheduledJob>>, ApiError> {
    let job = state.scheduler.get(&id).await.map_err(AipError::from)?;
    Ok(Json(ApiResponse::success(job)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobRequest {
    pub cron: String,
}

/// `PUT /scheduler/jobs/{id}`: updates the job's cron expression. Renaming
/// or re-pointing a job at a different pipeline is not supported; delete
/// and recreate instead, matching the store's "config replace is a new
/// revision" convention.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateJobRequest>,
) -> Result<Json<ApiResponse<ScheduledJob>>, ApiError> {
    let job = state.scheduler.update_cron(&id, request.cron).await.map_err(AipError::from)?;
    Ok(Json(ApiResponse::success(job)))
}

/// `DELETE /scheduler/jobs/{id}`
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.scheduler.remove_job(&id).await.map_err(AipError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /scheduler/jobs/{id}/enable`
pub async fn enable(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.scheduler.enable(&id).await.map_err(AipError::from)?;
    Ok(StatusCode::OK)
}

/// `POST /scheduler/jobs/{id}/disable`
pub async fn disable(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.scheduler.disable(&id).await.map_err(AipError::from)?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_log_limit")]
    pub limit: usize,
}

fn default_log_limit() -> usize {
    20
}

/// `GET /scheduler/jobs/{id}/logs`
pub async fn logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<ApiResponse<Vec<JobLogEntry>>>, ApiError> {
    let entries = state.scheduler.logs(&id, query.limit).await.map_err(AipError::from)?;
    Ok(Json(ApiResponse::success(entries)))
}
