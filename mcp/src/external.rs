//! Contract for the high-level tools that reach outside the core's
//! authority — ontology extraction, ML model recommendation, digital-twin
//! simulation, anomaly detection, alerting. Per §6.3 these subsystems are
//! out of scope for this crate; `ExternalToolBackend` is the narrow
//! `(tool_input) -> tool_output` mapping the MCP adapter dispatches to,
//! so discovery and dispatch are fully testable without a real
//! implementation wired in.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::McpError;

/// Implemented by whatever process wires in the ontology/ML/twin/anomaly/
/// alert subsystems. Every method receives the tool's raw JSON input and
/// returns raw JSON output; the adapter does no interpretation of either.
#[async_trait]
pub trait ExternalToolBackend: Send + Sync {
    async fn extract_ontology(&self, input: JsonValue) -> Result<JsonValue, McpError> {
        let _ = input;
        Err(not_wired("extract_ontology"))
    }

    async fn list_ontologies(&self, input: JsonValue) -> Result<JsonValue, McpError> {
        let _ = input;
        Err(not_wired("list_ontologies"))
    }

    async fn recommend_models(&self, input: JsonValue) -> Result<JsonValue, McpError> {
        let _ = input;
        Err(not_wired("recommend_models"))
    }

    async fn create_twin(&self, input: JsonValue) -> Result<JsonValue, McpError> {
        let _ = input;
        Err(not_wired("create_twin"))
    }

    async fn get_twin_status(&self, input: JsonValue) -> Result<JsonValue, McpError> {
        let _ = input;
        Err(not_wired("get_twin_status"))
    }

    async fn simulate_scenario(&self, input: JsonValue) -> Result<JsonValue, McpError> {
        let _ = input;
        Err(not_wired("simulate_scenario"))
    }

    async fn detect_anomalies(&self, input: JsonValue) -> Result<JsonValue, McpError> {
        let _ = input;
        Err(not_wired("detect_anomalies"))
    }

    async fn create_alert(&self, input: JsonValue) -> Result<JsonValue, McpError> {
        let _ = input;
        Err(not_wired("create_alert"))
    }

    async fn list_alerts(&self, input: JsonValue) -> Result<JsonValue, McpError> {
        let _ = input;
        Err(not_wired("list_alerts"))
    }
}

fn not_wired(tool: &str) -> McpError {
    McpError::UpstreamFailed(format!("'{tool}' has no backend wired into this process"))
}

/// Default backend: every high-level external tool reports `UpstreamFailed`.
/// A real deployment swaps this for an implementation that calls the
/// ontology/ML/twin/anomaly/alert subsystems; dispatch logic here never
/// changes.
#[derive(Default)]
pub struct NullExternalToolBackend;

impl ExternalToolBackend for NullExternalToolBackend {}
