//! MCP tool adapter (C9): projects every registered plugin, plus a fixed
//! set of high-level operations, to LLM agents as JSON-RPC-style tools.
//!
//! Grounded on the pack's `casparian_mcp` crate's job-first, typed tool
//! descriptor shape, adapted from stdio JSON-RPC framing to the spec's
//! plain HTTP JSON envelope (`{tool_name, input}` / `{success, result|error,
//! duration_ms}`) since streaming/stdio transport is out of scope here.

mod error;
pub mod external;

pub use error::McpError;
pub use external::{ExternalToolBackend, NullExternalToolBackend};

use chrono::Utc;
use mimir_core::cancel::CancelToken;
use mimir_core::context::Ctx;
use mimir_core::pipeline::{Engine, PipelineConfig, RunStatus, StepConfig};
use mimir_core::registry::{parse_plugin_ref, Registry};
use mimir_queue::JobQueue;
use mimir_scheduler::Scheduler;
use mimir_store::{ListFilter, Store};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// One discoverable tool: either a registered plugin or a fixed high-level
/// operation, with a JSON schema describing its expected input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: JsonValue,
}

/// `POST /mcp/tools/execute` request body. `arguments` is accepted as an
/// alias for `input` since both spellings appear in the spec's text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecuteRequest {
    pub tool_name: String,
    #[serde(default, alias = "arguments")]
    pub input: JsonValue,
}

/// `POST /mcp/tools/execute` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecuteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonValue>,
    pub duration_ms: u64,
}

/// The 14 high-level operations enumerated in spec §4.9, beyond the
/// per-plugin tools derived from the registry.
const HIGH_LEVEL_TOOLS: &[&str] = &[
    "create_pipeline",
    "execute_pipeline",
    "schedule_pipeline",
    "list_pipelines",
    "get_pipeline_status",
    "extract_ontology",
    "list_ontologies",
    "recommend_models",
    "create_twin",
    "get_twin_status",
    "simulate_scenario",
    "detect_anomalies",
    "create_alert",
    "list_alerts",
];

/// Binds the registry, engine, store, scheduler, and job queue together as
/// the tool surface an MCP client talks to. Cheaply cloneable.
#[derive(Clone)]
pub struct McpAdapter {
    registry: Arc<Registry>,
    engine: Arc<Engine>,
    store: Arc<Store>,
    scheduler: Arc<Scheduler>,
    queue: Arc<JobQueue>,
    external: Arc<dyn ExternalToolBackend>,
}

impl McpAdapter {
    pub fn new(
        registry: Arc<Registry>,
        engine: Arc<Engine>,
        store: Arc<Store>,
        scheduler: Arc<Scheduler>,
        queue: Arc<JobQueue>,
        external: Arc<dyn ExternalToolBackend>,
    ) -> Self {
        Self {
            registry,
            engine,
            store,
            scheduler,
            queue,
            external,
        }
    }

    /// `GET /mcp/tools`: every registered plugin plus the fixed high-level
    /// operation set, each with an input schema.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        let mut tools: Vec<ToolDescriptor> = self
            .registry
            .list()
            .into_iter()
            .map(|reference| ToolDescriptor {
                name: reference.clone(),
                description: format!("Plugin tool for '{reference}'"),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "step_config": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "config": {"type": "object"},
                                "output": {"type": "string"}
                            },
                            "required": ["name"]
                        },
                        "context": {"type": "object"}
                    },
                    "required": ["step_config"]
                }),
            })
            .collect();

        tools.extend(HIGH_LEVEL_TOOLS.iter().map(|name| ToolDescriptor {
            name: name.to_string(),
            description: format!("High-level operation '{name}'"),
            input_schema: high_level_schema(name),
        }));

        tools
    }

    /// `POST /mcp/tools/execute`: dispatch by prefix, per spec §4.9.
    pub async fn execute(&self, request: ToolExecuteRequest) -> ToolExecuteResponse {
        let started = Instant::now();
        let outcome = if parse_plugin_ref(&request.tool_name).is_ok() && self.registry.contains(&request.tool_name) {
            self.execute_plugin_tool(&request.tool_name, request.input).await
        } else if HIGH_LEVEL_TOOLS.contains(&request.tool_name.as_str()) {
            self.execute_high_level_tool(&request.tool_name, request.input).await
        } else {
            Err(McpError::UnknownTool(request.tool_name.clone()))
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(result) => ToolExecuteResponse {
                success: true,
                result: Some(result),
                error: None,
                duration_ms,
            },
            Err(e) => {
                let aip_err: mimir_core::errors::AipError = e.into();
                ToolExecuteResponse {
                    success: false,
                    result: None,
                    error: Some(json!({"kind": aip_err.kind, "message": aip_err.message})),
                    duration_ms,
                }
            }
        }
    }

    async fn execute_plugin_tool(&self, tool_name: &str, input: JsonValue) -> Result<JsonValue, McpError> {
        let step_config_raw = input
            .get("step_config")
            .cloned()
            .ok_or_else(|| McpError::InvalidInput("missing 'step_config'".to_string()))?;
        let step_name = step_config_raw
            .get("name")
            .and_then(JsonValue::as_str)
            .unwrap_or("mcp-step")
            .to_string();
        let config = step_config_raw.get("config").cloned().unwrap_or(JsonValue::Null);
        let output = step_config_raw
            .get("output")
            .and_then(JsonValue::as_str)
            .map(str::to_string);

        let global_ctx = Ctx::new();
        if let Some(context) = input.get("context").and_then(JsonValue::as_object) {
            for (key, value) in context {
                global_ctx.set(key.clone(), value.clone());
            }
        }
        let existing_keys: HashSet<String> = global_ctx.keys().into_iter().collect();

        let pipeline = PipelineConfig {
            id: format!("mcp-{}", Uuid::new_v4()),
            description: None,
            steps: vec![StepConfig {
                name: step_name,
                plugin: tool_name.to_string(),
                config,
                output: output.clone(),
                continue_on_error: false,
            }],
        };

        let record = self
            .engine
            .run(&pipeline, &global_ctx, &CancelToken::new())
            .await
            .map_err(McpError::Engine)?;

        if record.status != RunStatus::Succeeded {
            let message = record
                .steps
                .first()
                .and_then(|s| s.error.clone())
                .unwrap_or_else(|| "tool execution failed".to_string());
            return Err(McpError::UpstreamFailed(message));
        }

        let result = match &output {
            Some(key) => {
                let value = global_ctx.get(key).map(|v| v.to_json()).unwrap_or(JsonValue::Null);
                json!({ key.clone(): value })
            }
            None => {
                let mut obj = serde_json::Map::new();
                for key in global_ctx.keys() {
                    if existing_keys.contains(&key) {
                        continue;
                    }
                    if let Some(value) = global_ctx.get(&key) {
                        obj.insert(key, value.to_json());
                    }
                }
                JsonValue::Object(obj)
            }
        };
        Ok(result)
    }

    async fn execute_high_level_tool(&self, tool_name: &str, input: JsonValue) -> Result<JsonValue, McpError> {
        match tool_name {
            "create_pipeline" => self.tool_create_pipeline(input).await,
            "execute_pipeline" => self.tool_execute_pipeline(input).await,
            "schedule_pipeline" => self.tool_schedule_pipeline(input).await,
            "list_pipelines" => self.tool_list_pipelines(input).await,
            "get_pipeline_status" => self.tool_get_pipeline_status(input).await,
            "extract_ontology" => self.external.extract_ontology(input).await,
            "list_ontologies" => self.external.list_ontologies(input).await,
            "recommend_models" => self.external.recommend_models(input).await,
            "create_twin" => self.external.create_twin(input).await,
            "get_twin_status" => self.external.get_twin_status(input).await,
            "simulate_scenario" => self.external.simulate_scenario(input).await,
            "detect_anomalies" => self.external.detect_anomalies(input).await,
            "create_alert" => self.external.create_alert(input).await,
            "list_alerts" => self.external.list_alerts(input).await,
            other => Err(McpError::UnknownTool(other.to_string())),
        }
    }

    async fn tool_create_pipeline(&self, input: JsonValue) -> Result<JsonValue, McpError> {
        let name = input
            .get("name")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| McpError::InvalidInput("missing 'name'".to_string()))?
            .to_string();
        let config: PipelineConfig = serde_json::from_value(
            input
                .get("config")
                .cloned()
                .ok_or_else(|| McpError::InvalidInput("missing 'config'".to_string()))?,
        )
        .map_err(|e| McpError::InvalidInput(e.to_string()))?;

        let def = self.store.create(name, None, HashSet::new(), config, None).await?;
        Ok(json!({ "id": def.id, "version": def.metadata.version }))
    }

    async fn tool_execute_pipeline(&self, input: JsonValue) -> Result<JsonValue, McpError> {
        let pipeline_id = input
            .get("pipeline_id")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| McpError::InvalidInput("missing 'pipeline_id'".to_string()))?;
        let def = self.store.get(pipeline_id).await?;

        let ctx = Ctx::new();
        if let Some(context) = input.get("context").and_then(JsonValue::as_object) {
            for (key, value) in context {
                ctx.set(key.clone(), value.clone());
            }
        }

        let record = self.engine.run(&def.config, &ctx, &CancelToken::new()).await.map_err(McpError::Engine)?;
        Ok(json!({
            "run_id": record.run_id,
            "status": record.status,
            "finished_at": record.finished_at,
        }))
    }

    async fn tool_schedule_pipeline(&self, input: JsonValue) -> Result<JsonValue, McpError> {
        let pipeline_id = input
            .get("pipeline_id")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| McpError::InvalidInput("missing 'pipeline_id'".to_string()))?;
        let cron_expr = input
            .get("cron")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| McpError::InvalidInput("missing 'cron'".to_string()))?;
        let job_id = input
            .get("job_id")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let name = input.get("name").and_then(JsonValue::as_str).unwrap_or(&job_id).to_string();

        let job = self.scheduler.add_job(job_id, name, pipeline_id, cron_expr).await?;
        Ok(serde_json::to_value(job).expect("ScheduledJob is always serializable"))
    }

    async fn tool_list_pipelines(&self, _input: JsonValue) -> Result<JsonValue, McpError> {
        let defs = self.store.list(&ListFilter::default()).await;
        Ok(serde_json::to_value(defs).expect("PipelineDef list is always serializable"))
    }

    async fn tool_get_pipeline_status(&self, input: JsonValue) -> Result<JsonValue, McpError> {
        let job_id_str = input
            .get("job_id")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| McpError::InvalidInput("missing 'job_id'".to_string()))?;
        let job_id = Uuid::parse_str(job_id_str).map_err(|e| McpError::InvalidInput(e.to_string()))?;
        let status = self.queue.status(job_id).await?;
        let result = self.queue.result(job_id).await?;
        Ok(json!({ "status": status, "result": result, "checked_at": Utc::now() }))
    }
}

fn high_level_schema(tool: &str) -> JsonValue {
    match tool {
        "create_pipeline" => json!({
            "type": "object",
            "properties": {"name": {"type": "string"}, "config": {"type": "object"}},
            "required": ["name", "config"]
        }),
        "execute_pipeline" => json!({
            "type": "object",
            "properties": {"pipeline_id": {"type": "string"}, "context": {"type": "object"}},
            "required": ["pipeline_id"]
        }),
        "schedule_pipeline" => json!({
            "type": "object",
            "properties": {
                "pipeline_id": {"type": "string"},
                "cron": {"type": "string"},
                "name": {"type": "string"}
            },
            "required": ["pipeline_id", "cron"]
        }),
        "list_pipelines" => json!({"type": "object", "properties": {}}),
        "get_pipeline_status" => json!({
            "type": "object",
            "properties": {"job_id": {"type": "string"}},
            "required": ["job_id"]
        }),
        _ => json!({"type": "object", "properties": {}, "description": "external subsystem tool; see §6.3"}),
    }
}
