use axum::extract::State;
use axum::response::Json;
use mimir_mcp::{ToolDescriptor, ToolExecuteRequest, ToolExecuteResponse};

use crate::AppState;

/// `GET /mcp/tools`
pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolDescriptor>> {
    Json(state.mcp.list_tools())
}

/// `POST /mcp/tools/execute`
pub async fn execute_tool(
    State(state): State<AppState>,
    Json(request): Json<ToolExecuteRequest>,
) -> Json<ToolExecuteResponse> {
    Json(state.mcp.execute(request).await)
}
