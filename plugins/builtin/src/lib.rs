//! Demonstration plugins bundled with Mimir AIP.
//!
//! These implement the four-operation plugin contract (`mimir_core::Plugin`)
//! against no external dependency, so they can drive the engine's own test
//! suite and serve as a template for a real `Input`/`Data_Processing`/`AI`/
//! `Output` plugin crate. Naming follows the spec's `<Type>.<name>` plugin
//! reference convention: `Input.literal`, `Data_Processing.echo`,
//! `Data_Processing.upper`, `Data_Processing.fail`.

use async_trait::async_trait;
use mimir_core::cancel::CancelToken;
use mimir_core::context::Ctx;
use mimir_core::errors::PluginError;
use mimir_core::plugin::Plugin;
use mimir_core::registry::Registry;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;

/// Injects a single literal value into the context under a configured key.
///
/// Config: `{"key": string, "value": any}`.
pub struct LiteralPlugin;

#[async_trait]
impl Plugin for LiteralPlugin {
    fn name(&self) -> &str {
        "Input.literal"
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), PluginError> {
        require_string_field(config, "key")
    }

    async fn execute(
        &self,
        ctx: &Ctx,
        config: &JsonValue,
        _global_ctx: &Ctx,
        _cancel: &CancelToken,
    ) -> Result<(), PluginError> {
        let key = config
            .get("key")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| PluginError::ConfigInvalid(vec!["missing 'key'".to_string()]))?;
        let value = config.get("value").cloned().unwrap_or(JsonValue::Null);
        ctx.set(key.to_string(), value);
        Ok(())
    }
}

/// Writes every key in its config object directly into the context,
/// unmodified. The simplest possible plugin; used throughout the engine's
/// and this workspace's own tests as a stand-in for a real `Input`/
/// `Data_Processing` source.
///
/// Config: any JSON object; each field is copied into the context verbatim.
pub struct EchoPlugin;

#[async_trait]
impl Plugin for EchoPlugin {
    fn name(&self) -> &str {
        "Data_Processing.echo"
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), PluginError> {
        if !config.is_object() && !config.is_null() {
            return Err(PluginError::ConfigInvalid(vec!["config must be an object".to_string()]));
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &Ctx,
        config: &JsonValue,
        _global_ctx: &Ctx,
        _cancel: &CancelToken,
    ) -> Result<(), PluginError> {
        if let Some(obj) = config.as_object() {
            for (key, value) in obj {
                ctx.set(key.clone(), value.clone());
            }
        }
        Ok(())
    }
}

/// Reads a string-valued context key and writes its uppercased form under a
/// configured key.
///
/// Config: `{"input": "<context key>", "output_key": "<context key>"}`.
pub struct UpperPlugin;

#[async_trait]
impl Plugin for UpperPlugin {
    fn name(&self) -> &str {
        "Data_Processing.upper"
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), PluginError> {
        require_string_field(config, "input")?;
        require_string_field(config, "output_key")
    }

    async fn execute(
        &self,
        ctx: &Ctx,
        config: &JsonValue,
        global_ctx: &Ctx,
        _cancel: &CancelToken,
    ) -> Result<(), PluginError> {
        let input_key = config.get("input").and_then(JsonValue::as_str).unwrap_or_default();
        let output_key = config.get("output_key").and_then(JsonValue::as_str).unwrap_or_default();

        let value = global_ctx
            .get(input_key)
            .ok_or_else(|| PluginError::Upstream(format!("context key '{input_key}' not set")))?;
        let text = match value.to_json() {
            JsonValue::String(s) => s,
            other => other.to_string(),
        };
        ctx.set(output_key.to_string(), text.to_uppercase());
        Ok(())
    }
}

/// Always fails, for exercising the engine's failure and
/// `continue_on_error` paths.
///
/// Config: `{"message": string}` (optional, defaults to `"boom"`).
pub struct FailPlugin;

#[async_trait]
impl Plugin for FailPlugin {
    fn name(&self) -> &str {
        "Data_Processing.fail"
    }

    async fn execute(
        &self,
        _ctx: &Ctx,
        config: &JsonValue,
        _global_ctx: &Ctx,
        _cancel: &CancelToken,
    ) -> Result<(), PluginError> {
        let message = config.get("message").and_then(JsonValue::as_str).unwrap_or("boom");
        Err(PluginError::Upstream(message.to_string()))
    }
}

fn require_string_field(config: &JsonValue, field: &str) -> Result<(), PluginError> {
    match config.get(field).and_then(JsonValue::as_str) {
        Some(s) if !s.is_empty() => Ok(()),
        _ => Err(PluginError::ConfigInvalid(vec![format!("missing or empty '{field}'")])),
    }
}

/// Register every builtin demonstration plugin into `registry`. Intended to
/// be called once from a process's composition root (`http::bootstrap`,
/// `cli`'s equivalent, or a test harness), mirroring the spec's "no runtime
/// reflection inside the core" design note: new plugin categories are new
/// instances registered here, never changes to the engine itself.
pub fn register_all(registry: &Registry) -> Result<(), mimir_core::errors::RegistryError> {
    registry.register(Arc::new(LiteralPlugin))?;
    registry.register(Arc::new(EchoPlugin))?;
    registry.register(Arc::new(UpperPlugin))?;
    registry.register(Arc::new(FailPlugin))?;
    debug!("registered builtin demonstration plugins");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimir_core::pipeline::{Engine, PipelineConfig, RunStatus, StepConfig};
    use mimir_core::{Ctx, EventBus};

    fn step(name: &str, plugin: &str, config: JsonValue) -> StepConfig {
        StepConfig {
            name: name.to_string(),
            plugin: plugin.to_string(),
            config,
            output: None,
            continue_on_error: false,
        }
    }

    #[tokio::test]
    async fn echo_then_upper_threads_context_forward() {
        let registry = Registry::new();
        register_all(&registry).unwrap();
        let engine = Engine::new(Arc::new(registry), EventBus::new());

        let pipeline = PipelineConfig {
            id: "seed-1".to_string(),
            description: None,
            steps: vec![
                step("echo", "Data_Processing.echo", serde_json::json!({"raw": "hi"})),
                step(
                    "upper",
                    "Data_Processing.upper",
                    serde_json::json!({"input": "raw", "output_key": "out"}),
                ),
            ],
        };

        let ctx = Ctx::new();
        let record = engine.run(&pipeline, &ctx, &CancelToken::new()).await.unwrap();
        assert_eq!(record.status, RunStatus::Succeeded);
        assert_eq!(ctx.get("raw").unwrap().to_json(), serde_json::json!("hi"));
        assert_eq!(ctx.get("out").unwrap().to_json(), serde_json::json!("HI"));
    }

    #[tokio::test]
    async fn upper_fails_on_missing_input_key() {
        let registry = Registry::new();
        register_all(&registry).unwrap();
        let engine = Engine::new(Arc::new(registry), EventBus::new());

        let pipeline = PipelineConfig {
            id: "seed-1b".to_string(),
            description: None,
            steps: vec![step(
                "upper",
                "Data_Processing.upper",
                serde_json::json!({"input": "missing", "output_key": "out"}),
            )],
        };

        let record = engine.run(&pipeline, &Ctx::new(), &CancelToken::new()).await.unwrap();
        assert_eq!(record.status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn literal_plugin_writes_configured_key() {
        let registry = Registry::new();
        register_all(&registry).unwrap();
        let engine = Engine::new(Arc::new(registry), EventBus::new());

        let pipeline = PipelineConfig {
            id: "seed-literal".to_string(),
            description: None,
            steps: vec![step(
                "lit",
                "Input.literal",
                serde_json::json!({"key": "greeting", "value": "hello"}),
            )],
        };

        let ctx = Ctx::new();
        engine.run(&pipeline, &ctx, &CancelToken::new()).await.unwrap();
        assert_eq!(ctx.get("greeting").unwrap().to_json(), serde_json::json!("hello"));
    }

    #[test]
    fn register_all_is_idempotent_free_of_conflicts() {
        let registry = Registry::new();
        register_all(&registry).unwrap();
        assert_eq!(registry.types().len(), 2);
    }
}
