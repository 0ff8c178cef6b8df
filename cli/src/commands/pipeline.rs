//! Pipeline command implementations

use crate::cli::{OutputFormat, PipelineCommands};
use crate::client::MimirClient;
use crate::output;
use mimir_core::errors::AipError;
use mimir_core::pipeline::{ExecutionRecord, PipelineConfig};
use mimir_store::{PipelineDef, ValidationReport, VersionEntry};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::path::Path;

fn load_config(path: &Path) -> Result<PipelineConfig, AipError> {
    let text = std::fs::read_to_string(path).map_err(|e| AipError::validation(format!("failed to read {}: {e}", path.display())))?;
    serde_yaml::from_str(&text).map_err(|e| AipError::validation(format!("failed to parse {}: {e}", path.display())))
}

fn load_context(path: &Path) -> Result<serde_json::Map<String, JsonValue>, AipError> {
    let text = std::fs::read_to_string(path).map_err(|e| AipError::validation(format!("failed to read {}: {e}", path.display())))?;
    match serde_json::from_str::<JsonValue>(&text).map_err(|e| AipError::validation(format!("failed to parse {}: {e}", path.display())))? {
        JsonValue::Object(map) => Ok(map),
        _ => Err(AipError::validation("context file must hold a JSON object")),
    }
}

#[derive(Serialize)]
struct CreateRequest {
    name: String,
    description: Option<String>,
    tags: HashSet<String>,
    config: PipelineConfig,
    created_by: Option<String>,
}

#[derive(Serialize)]
struct UpdateRequest {
    description: Option<String>,
    tags: Option<HashSet<String>>,
    enabled: Option<bool>,
    config: Option<PipelineConfig>,
}

#[derive(Serialize)]
struct CloneRequest {
    new_name: String,
}

#[derive(Serialize)]
struct ExecuteRequest {
    pipeline_id: Option<String>,
    config: Option<PipelineConfig>,
    context: serde_json::Map<String, JsonValue>,
}

pub async fn handle(command: PipelineCommands, client: &MimirClient, format: &OutputFormat) -> Result<(), AipError> {
    match command {
        PipelineCommands::Create { name, description, tags, config_file, created_by } => {
            let config = load_config(&config_file)?;
            let request = CreateRequest { name, description, tags: tags.into_iter().collect(), config, created_by };
            let response = client.post("/pipelines", &request).await?;
            let def: PipelineDef = client.unwrap_envelope(response).await?;
            output::display_pipeline(&def, format)
        }
        PipelineCommands::List { name, tag, enabled } => {
            let mut path = "/pipelines".to_string();
            let mut query = Vec::new();
            if let Some(name) = name {
                query.push(format!("name={name}"));
            }
            if let Some(tag) = tag {
                query.push(format!("tag={tag}"));
            }
            if let Some(enabled) = enabled {
                query.push(format!("enabled={enabled}"));
            }
            if !query.is_empty() {
                path.push('?');
                path.push_str(&query.join("&"));
            }
            let response = client.get(&path).await?;
            let defs: Vec<PipelineDef> = client.unwrap_envelope(response).await?;
            output::display_pipelines(&defs, format)
        }
        PipelineCommands::Get { id } => {
            let response = client.get(&format!("/pipelines/{id}")).await?;
            let def: PipelineDef = client.unwrap_envelope(response).await?;
            output::display_pipeline(&def, format)
        }
        PipelineCommands::Update { id, description, tags, enabled, config_file } => {
            let config = config_file.map(|path| load_config(&path)).transpose()?;
            let request = UpdateRequest { description, tags: tags.map(|t| t.into_iter().collect()), enabled, config };
            let response = client.put(&format!("/pipelines/{id}"), &request).await?;
            let def: PipelineDef = client.unwrap_envelope(response).await?;
            output::display_pipeline(&def, format)
        }
        PipelineCommands::Delete { id } => {
            let response = client.delete(&format!("/pipelines/{id}")).await?;
            client.unwrap_empty(response).await?;
            println!("pipeline '{id}' deleted");
            Ok(())
        }
        PipelineCommands::Clone { id, new_name } => {
            let request = CloneRequest { new_name };
            let response = client.post(&format!("/pipelines/{id}/clone"), &request).await?;
            let def: PipelineDef = client.unwrap_envelope(response).await?;
            output::display_pipeline(&def, format)
        }
        PipelineCommands::Validate { id } => {
            let response = client.post(&format!("/pipelines/{id}/validate"), &serde_json::json!({})).await?;
            let report: ValidationReport = client.unwrap_envelope(response).await?;
            let result = output::display_validation(&report, format);
            if !report.valid {
                return Err(AipError::validation("pipeline failed validation"));
            }
            result
        }
        PipelineCommands::History { id } => {
            let response = client.get(&format!("/pipelines/{id}/history")).await?;
            let entries: Vec<VersionEntry> = client.unwrap_envelope(response).await?;
            output::display_history(&entries, format)
        }
        PipelineCommands::Execute { pipeline_id, config_file, context_file } => {
            let config = config_file.as_deref().map(load_config).transpose()?;
            let context = context_file.as_deref().map(load_context).transpose()?.unwrap_or_default();
            if pipeline_id.is_none() && config.is_none() {
                return Err(AipError::validation("execute requires --pipeline-id or --config-file"));
            }
            let request = ExecuteRequest { pipeline_id, config, context };
            let response = client.post("/pipelines/execute", &request).await?;
            let record: ExecutionRecord = client.unwrap_envelope(response).await?;
            let value = serde_json::to_value(&record).map_err(|e| AipError::internal(format!("failed to render execution record: {e}")))?;
            output::display_json(&value, format)?;
            if record.status != mimir_core::pipeline::RunStatus::Succeeded {
                return Err(AipError::internal(format!("run {} ended in status {:?}", record.run_id, record.status)));
            }
            Ok(())
        }
    }
}
