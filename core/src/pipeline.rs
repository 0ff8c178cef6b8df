//! The pipeline execution engine (C4): runs an ordered list of steps against
//! a shared context, publishing lifecycle events as it goes.
//!
//! Generalized from a fixed three-stage (pre/operation/post) request
//! pipeline into an engine that executes an arbitrary, user-defined,
//! ordered list of steps, each naming a plugin by `<type>.<name>` reference.

use crate::cancel::CancelToken;
use crate::context::{Ctx, Value};
use crate::errors::{AipError, EngineError, ErrorKind};
use crate::event::{Event, EventBus};
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

fn default_false() -> bool {
    false
}

/// Configuration for a single pipeline step, matching the wire schema in
/// §6.2 of the pipeline definition format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub name: String,
    pub plugin: String,
    #[serde(default)]
    pub config: serde_json::Value,
    /// Where the step's result is stored in the context; absent means the
    /// step's output keys are merged directly into the top level.
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default = "default_false")]
    pub continue_on_error: bool,
}

/// Configuration for an entire pipeline: an ordered list of steps.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<StepConfig>,
}

/// Overall status of a run, per the state machine in spec §4.4:
/// `Created → Validating → Running → {Succeeded, Failed, Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// Outcome of a single step within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: String,
    pub plugin: String,
    pub succeeded: bool,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub duration_ms: u64,
}

/// The full record of one pipeline run, returned by the engine and persisted
/// by callers that want run history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub run_id: Uuid,
    pub pipeline_id: String,
    pub status: RunStatus,
    pub steps: Vec<StepOutcome>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Executes pipelines against a plugin registry, forking a local context per
/// step and folding successful output back into the run's global context.
pub struct Engine {
    registry: Arc<Registry>,
    bus: EventBus,
}

impl Engine {
    pub fn new(registry: Arc<Registry>, bus: EventBus) -> Self {
        Self { registry, bus }
    }

    /// Pre-flight: validate every `StepConfig` by calling the plugin's
    /// `validate_config`. Fails fast with `PrecheckFailed` before any
    /// side-effecting step runs.
    pub fn precheck(&self, pipeline: &PipelineConfig) -> Result<(), EngineError> {
        for step in &pipeline.steps {
            let plugin = self.registry.get(&step.plugin).map_err(|e| EngineError::PluginMissing {
                step: step.name.clone(),
                reason: e.to_string(),
            })?;
            plugin
                .validate_config(&step.config)
                .map_err(|e| EngineError::PrecheckFailed {
                    step: step.name.clone(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }

    /// Run a pipeline to completion (or until cancelled / halted by a
    /// failing step), returning the full execution record.
    pub async fn run(
        &self,
        pipeline: &PipelineConfig,
        global_ctx: &Ctx,
        cancel: &CancelToken,
    ) -> Result<ExecutionRecord, AipError> {
        self.precheck(pipeline)?;

        let run_id = Uuid::new_v4();
        let started_at = chrono::Utc::now();
        self.bus
            .publish(Event::RunStarted {
                run_id,
                pipeline_id: pipeline.id.clone(),
            })
            .await;

        let mut outcomes = Vec::with_capacity(pipeline.steps.len());
        let mut run_status = RunStatus::Succeeded;

        for step in &pipeline.steps {
            if cancel.is_cancelled() {
                info!(run_id = %run_id, "run cancelled before step '{}'", step.name);
                run_status = RunStatus::Cancelled;
                self.bus.publish(Event::RunCancelled { run_id }).await;
                break;
            }

            let outcome = self.run_step(step, global_ctx, cancel, run_id).await;
            let failed = !outcome.succeeded;
            outcomes.push(outcome);

            if failed {
                run_status = RunStatus::Failed;
                if !step.continue_on_error {
                    break;
                }
                warn!(run_id = %run_id, step = %step.name, "step failed, continuing per continue_on_error");
            }
        }

        let finished_at = chrono::Utc::now();
        self.bus
            .publish(Event::RunCompleted {
                run_id,
                status: format!("{run_status:?}"),
            })
            .await;

        Ok(ExecutionRecord {
            run_id,
            pipeline_id: pipeline.id.clone(),
            status: run_status,
            steps: outcomes,
            started_at,
            finished_at: Some(finished_at),
        })
    }

    async fn run_step(
        &self,
        step: &StepConfig,
        global_ctx: &Ctx,
        cancel: &CancelToken,
        run_id: Uuid,
    ) -> StepOutcome {
        debug!(run_id = %run_id, step = %step.name, plugin = %step.plugin, "starting step");
        self.bus
            .publish(Event::StepStarted {
                run_id,
                step: step.name.clone(),
            })
            .await;

        let started = Instant::now();
        let local_ctx = global_ctx.fork();

        let result = match self.registry.get(&step.plugin) {
            Ok(plugin) => plugin.execute(&local_ctx, &step.config, global_ctx, cancel).await,
            Err(e) => Err(crate::errors::PluginError::Internal(e.to_string())),
        };

        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                self.merge_step_output(step, global_ctx, &local_ctx);
                self.bus
                    .publish(Event::StepCompleted {
                        run_id,
                        step: step.name.clone(),
                    })
                    .await;
                StepOutcome {
                    step: step.name.clone(),
                    plugin: step.plugin.clone(),
                    succeeded: true,
                    error: None,
                    error_kind: None,
                    duration_ms,
                }
            }
            Err(e) => {
                error!(run_id = %run_id, step = %step.name, error = %e, "step failed");
                let aip_err: AipError = e.into();
                self.bus
                    .publish(Event::StepFailed {
                        run_id,
                        step: step.name.clone(),
                        message: aip_err.message.clone(),
                    })
                    .await;
                StepOutcome {
                    step: step.name.clone(),
                    plugin: step.plugin.clone(),
                    succeeded: false,
                    error: Some(aip_err.message),
                    error_kind: Some(aip_err.kind),
                    duration_ms,
                }
            }
        }
    }

    /// Fold a step's local output back into the run's global context. When
    /// `output` names a key, the step's entries are nested under it;
    /// otherwise they're merged at the top level, later steps overwriting
    /// earlier keys of the same name (spec §4.4 step 3).
    fn merge_step_output(&self, step: &StepConfig, global_ctx: &Ctx, local_ctx: &Ctx) {
        match &step.output {
            Some(output_key) => {
                let mut nested = HashMap::new();
                for key in local_ctx.keys() {
                    if let Some(value) = local_ctx.get(&key) {
                        nested.insert(key, value);
                    }
                }
                global_ctx.set(output_key.clone(), Value::Nested(nested));
            }
            None => global_ctx.merge(local_ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::test_support::{EchoPlugin, FailPlugin};

    fn engine_with(registry: Registry) -> Engine {
        Engine::new(Arc::new(registry), EventBus::new())
    }

    fn step(name: &str, plugin: &str, config: serde_json::Value) -> StepConfig {
        StepConfig {
            name: name.to_string(),
            plugin: plugin.to_string(),
            config,
            output: None,
            continue_on_error: false,
        }
    }

    #[tokio::test]
    async fn sequential_steps_merge_context_forward() {
        let registry = Registry::new();
        registry.register(Arc::new(EchoPlugin)).unwrap();
        let engine = engine_with(registry);

        let pipeline = PipelineConfig {
            id: "p1".to_string(),
            description: None,
            steps: vec![step("s1", "Test.echo", serde_json::json!({"greeting": "hi"}))],
        };

        let ctx = Ctx::new();
        let record = engine.run(&pipeline, &ctx, &CancelToken::new()).await.unwrap();
        assert_eq!(record.status, RunStatus::Succeeded);
        assert_eq!(ctx.get("greeting"), Some(Value::Scalar(serde_json::json!("hi"))));
    }

    #[tokio::test]
    async fn output_key_nests_step_result() {
        let registry = Registry::new();
        registry.register(Arc::new(EchoPlugin)).unwrap();
        let engine = engine_with(registry);

        let mut s = step("s1", "Test.echo", serde_json::json!({"greeting": "hi"}));
        s.output = Some("s1_result".to_string());
        let pipeline = PipelineConfig {
            id: "p1b".to_string(),
            description: None,
            steps: vec![s],
        };

        let ctx = Ctx::new();
        engine.run(&pipeline, &ctx, &CancelToken::new()).await.unwrap();
        assert!(ctx.get("greeting").is_none());
        match ctx.get("s1_result") {
            Some(Value::Nested(map)) => {
                assert_eq!(map.get("greeting"), Some(&Value::Scalar(serde_json::json!("hi"))));
            }
            other => panic!("expected nested output, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failing_step_halts_by_default() {
        let registry = Registry::new();
        registry.register(Arc::new(FailPlugin)).unwrap();
        registry.register(Arc::new(EchoPlugin)).unwrap();
        let engine = engine_with(registry);

        let pipeline = PipelineConfig {
            id: "p2".to_string(),
            description: None,
            steps: vec![
                step("s1", "Test.fail", serde_json::Value::Null),
                step("s2", "Test.echo", serde_json::json!({"reached": true})),
            ],
        };

        let ctx = Ctx::new();
        let record = engine.run(&pipeline, &ctx, &CancelToken::new()).await.unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.steps.len(), 1);
        assert_eq!(record.steps[0].error_kind, Some(ErrorKind::UpstreamFailed));
        assert!(ctx.get("reached").is_none());
    }

    #[tokio::test]
    async fn continue_on_error_runs_remaining_steps() {
        let registry = Registry::new();
        registry.register(Arc::new(FailPlugin)).unwrap();
        registry.register(Arc::new(EchoPlugin)).unwrap();
        let engine = engine_with(registry);

        let mut failing = step("s1", "Test.fail", serde_json::Value::Null);
        failing.continue_on_error = true;

        let pipeline = PipelineConfig {
            id: "p3".to_string(),
            description: None,
            steps: vec![failing, step("s2", "Test.echo", serde_json::json!({"reached": true}))],
        };

        let ctx = Ctx::new();
        let record = engine.run(&pipeline, &ctx, &CancelToken::new()).await.unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.steps.len(), 2);
        assert_eq!(ctx.get("reached"), Some(Value::Scalar(serde_json::json!(true))));
    }

    #[tokio::test]
    async fn precheck_rejects_unregistered_plugin() {
        let registry = Registry::new();
        let engine = engine_with(registry);
        let pipeline = PipelineConfig {
            id: "p4".to_string(),
            description: None,
            steps: vec![step("s1", "Data_Processing.missing", serde_json::Value::Null)],
        };
        let err = engine.precheck(&pipeline).unwrap_err();
        assert!(matches!(err, EngineError::PluginMissing { .. }));
    }

    #[tokio::test]
    async fn cancelled_before_start_skips_all_steps() {
        let registry = Registry::new();
        registry.register(Arc::new(EchoPlugin)).unwrap();
        let engine = engine_with(registry);
        let pipeline = PipelineConfig {
            id: "p5".to_string(),
            description: None,
            steps: vec![step("s1", "Test.echo", serde_json::Value::Null)],
        };
        let cancel = CancelToken::new();
        cancel.cancel();
        let record = engine.run(&pipeline, &Ctx::new(), &cancel).await.unwrap();
        assert_eq!(record.status, RunStatus::Cancelled);
        assert!(record.steps.is_empty());
    }
}
