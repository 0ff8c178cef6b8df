use axum::extract::{Path, State};
use axum::response::Json;
use mimir_core::errors::AipError;
use serde::Serialize;

use crate::error::ApiError;
use crate::{ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub struct PluginSummary {
    pub reference: String,
}

/// `GET /plugins`: every registered plugin reference.
pub async fn list_all(State(state): State<AppState>) -> Json<ApiResponse<Vec<PluginSummary>>> {
    let plugins = state.registry.list().into_iter().map(|reference| PluginSummary { reference }).collect();
    Json(ApiResponse::success(plugins))
}

/// `GET /plugins/{type}`: references registered under one plugin type.
pub async fn list_by_type(
    State(state): State<AppState>,
    Path(plugin_type): Path<String>,
) -> Json<ApiResponse<Vec<PluginSummary>>> {
    let plugins = state
        .registry
        .list_by_type(&plugin_type)
        .into_iter()
        .map(|plugin| PluginSummary { reference: plugin.name().to_string() })
        .collect();
    Json(ApiResponse::success(plugins))
}

#[derive(Debug, Serialize)]
pub struct PluginDetail {
    pub reference: String,
    pub plugin_type: String,
    pub name: String,
}

/// `GET /plugins/{type}/{name}`: describe a single plugin.
pub async fn describe(
    State(state): State<AppState>,
    Path((plugin_type, name)): Path<(String, String)>,
) -> Result<Json<ApiResponse<PluginDetail>>, ApiError> {
    let reference = format!("{plugin_type}.{name}");
    let plugin = state.registry.get(&reference).map_err(AipError::from)?;
    Ok(Json(ApiResponse::success(PluginDetail {
        reference: plugin.name().to_string(),
        plugin_type,
        name,
    })))
}
