use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use mimir_core::cancel::CancelToken;
use mimir_core::context::Ctx;
use mimir_core::errors::AipError;
use mimir_core::pipeline::{ExecutionRecord, PipelineConfig};
use mimir_store::{ListFilter, PipelineDef, ValidationReport, VersionEntry};
use serde::Deserialize;
use std::collections::HashSet;

use crate::error::ApiError;
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub struct CreatePipelineRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: HashSet<String>,
    pub config: PipelineConfig,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// `POST /pipelines`
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreatePipelineRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PipelineDef>>), ApiError> {
    let def = state
        .store
        .create(request.name, request.description, request.tags, request.config, request.created_by)
        .await
        .map_err(AipError::from)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(def))))
}

#[derive(Debug, Deserialize, Default)]
pub struct ListPipelinesQuery {
    pub name: Option<String>,
    pub tag: Option<String>,
    pub enabled: Option<bool>,
}

/// `GET /pipelines`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListPipelinesQuery>,
) -> Json<ApiResponse<Vec<PipelineDef>>> {
    let filter = ListFilter {
        name: query.name,
        enabled: query.enabled,
        tag: query.tag,
    };
    Json(ApiResponse::success(state.store.list(&filter).await))
}

/// `GET /pipelines/{id}`
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<ApiResponse<PipelineDef>>, ApiError> {
    let def = state.store.get(&id).await.map_err(AipError::from)?;
    Ok(Json(ApiResponse::success(def)))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePipelineRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<HashSet<String>>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub config: Option<PipelineConfig>,
}

/// `PUT /pipelines/{id}`: updates metadata fields and/or the step config.
/// Both halves bump the stored version; a request touching both performs
/// two successive revisions rather than inventing a combined one, keeping
/// the store's single-purpose update methods untouched.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdatePipelineRequest>,
) -> Result<Json<ApiResponse<PipelineDef>>, ApiError> {
    let mut def = state
        .store
        .update_metadata(&id, request.description, request.tags, request.enabled)
        .await
        .map_err(AipError::from)?;

    if let Some(config) = request.config {
        def = state.store.update_config(&id, config).await.map_err(AipError::from)?;
    }
    Ok(Json(ApiResponse::success(def)))
}

/// `DELETE /pipelines/{id}`
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    if !state.scheduler.list().await.iter().all(|job| job.pipeline_id != id) {
        return Err(AipError::new(mimir_core::errors::ErrorKind::InUse, format!("pipeline '{id}' has scheduled jobs")).into());
    }
    state.store.delete(&id).await.map_err(AipError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ClonePipelineRequest {
    pub new_name: String,
}

/// `POST /pipelines/{id}/clone`
pub async fn clone(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ClonePipelineRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PipelineDef>>), ApiError> {
    let def = state.store.clone_as(&id, request.new_name).await.map_err(AipError::from)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(def))))
}

/// `POST /pipelines/{id}/validate`
pub async fn validate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ValidationReport>>, ApiError> {
    let report = state.store.validate(&id, &state.registry).await.map_err(AipError::from)?;
    Ok(Json(ApiResponse::success(report)))
}

/// `GET /pipelines/{id}/history`
pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<VersionEntry>>>, ApiError> {
    let entries = state.store.history(&id).await.map_err(AipError::from)?;
    Ok(Json(ApiResponse::success(entries)))
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub pipeline_id: Option<String>,
    #[serde(default)]
    pub config: Option<PipelineConfig>,
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

/// `POST /pipelines/execute`: synchronous one-shot execution, either of a
/// stored pipeline (`pipeline_id`) or an inline `config` never persisted.
pub async fn execute(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<ApiResponse<ExecutionRecord>>, ApiError> {
    let config = match (request.pipeline_id, request.config) {
        (Some(id), _) => state.store.get(&id).await.map_err(AipError::from)?.config,
        (None, Some(config)) => config,
        (None, None) => {
            return Err(AipError::validation("request must include 'pipeline_id' or 'config'").into());
        }
    };

    let ctx = Ctx::new();
    for (key, value) in request.context {
        ctx.set(key, value);
    }

    let record = state.engine.run(&config, &ctx, &CancelToken::new()).await.map_err(ApiError::from)?;
    Ok(Json(ApiResponse::success(record)))
}
