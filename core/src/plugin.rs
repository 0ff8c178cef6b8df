//! The plugin contract every pipeline step executes against.

use crate::cancel::CancelToken;
use crate::context::Ctx;
use crate::errors::PluginError;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Declares the four-operation contract every plugin implements, generalized
/// from the fixed pre/operation/post pipeline stages this crate started
/// from into an arbitrary user-ordered step contract.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Fully qualified name, e.g. `"Data_Processing.echo"`.
    fn name(&self) -> &str;

    /// Validate step configuration before a run starts. Returning errors
    /// here lets the engine fail a run during precheck instead of mid-step.
    fn validate_config(&self, _config: &JsonValue) -> Result<(), PluginError> {
        Ok(())
    }

    /// Run the step. `ctx` is the step's local working context; `global_ctx`
    /// is the run's accumulated context at the time this step started.
    async fn execute(
        &self,
        ctx: &Ctx,
        config: &JsonValue,
        global_ctx: &Ctx,
        cancel: &CancelToken,
    ) -> Result<(), PluginError>;

    /// Best-effort cleanup after a run finishes, regardless of outcome.
    async fn teardown(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A plugin whose behavior is controlled entirely by its config, used
    /// across the engine's own unit tests.
    pub struct EchoPlugin;

    #[async_trait]
    impl Plugin for EchoPlugin {
        fn name(&self) -> &str {
            "Test.echo"
        }

        async fn execute(
            &self,
            ctx: &Ctx,
            config: &JsonValue,
            _global_ctx: &Ctx,
            _cancel: &CancelToken,
        ) -> Result<(), PluginError> {
            if let Some(obj) = config.as_object() {
                for (k, v) in obj {
                    ctx.set(k.clone(), v.clone());
                }
            }
            Ok(())
        }
    }

    pub struct FailPlugin;

    #[async_trait]
    impl Plugin for FailPlugin {
        fn name(&self) -> &str {
            "Test.fail"
        }

        async fn execute(
            &self,
            _ctx: &Ctx,
            _config: &JsonValue,
            _global_ctx: &Ctx,
            _cancel: &CancelToken,
        ) -> Result<(), PluginError> {
            Err(PluginError::Upstream("deliberate test failure".to_string()))
        }
    }
}
