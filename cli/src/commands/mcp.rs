//! MCP tool command implementations

use crate::cli::{McpCommands, OutputFormat};
use crate::client::MimirClient;
use crate::output;
use mimir_core::errors::AipError;
use mimir_mcp::{ToolDescriptor, ToolExecuteRequest, ToolExecuteResponse};
use serde_json::Value as JsonValue;

fn load_input(path: &std::path::Path) -> Result<JsonValue, AipError> {
    let text = std::fs::read_to_string(path).map_err(|e| AipError::validation(format!("failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&text).map_err(|e| AipError::validation(format!("failed to parse {}: {e}", path.display())))
}

pub async fn handle(command: McpCommands, client: &MimirClient, format: &OutputFormat) -> Result<(), AipError> {
    match command {
        McpCommands::Tools => {
            let response = client.get_root("/mcp/tools").await?;
            let tools: Vec<ToolDescriptor> = client.unwrap_plain(response).await?;
            output::display_tools(&tools, format)
        }
        McpCommands::Execute { tool_name, input_file } => {
            let input = input_file.as_deref().map(load_input).transpose()?.unwrap_or(JsonValue::Null);
            let request = ToolExecuteRequest { tool_name, input };
            let response = client.post_root("/mcp/tools/execute", &request).await?;
            let result: ToolExecuteResponse = client.unwrap_plain(response).await?;
            let value = serde_json::to_value(&result).map_err(|e| AipError::internal(format!("failed to render tool result: {e}")))?;
            output::display_json(&value, format)?;
            if !result.success {
                return Err(AipError::internal("tool execution reported failure"));
            }
            Ok(())
        }
    }
}
