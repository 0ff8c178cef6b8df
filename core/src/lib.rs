//! # Mimir AIP core
//!
//! Plugin context, registry, contract, pipeline execution engine, and event
//! bus — the substrate every adapter and surface in the workspace builds on.

pub mod cancel;
pub mod context;
pub mod errors;
pub mod event;
pub mod pipeline;
pub mod plugin;
pub mod registry;

pub use cancel::CancelToken;
pub use context::{Ctx, Value};
pub use errors::{AipError, AipResult, EngineError, ErrorKind, PluginError, RegistryError};
pub use event::{Event, EventBus, Handler};
pub use pipeline::{Engine, ExecutionRecord, PipelineConfig, RunStatus, StepConfig, StepOutcome};
pub use plugin::Plugin;
pub use registry::{parse_plugin_ref, Registry};

/// Convenient single import for crates that consume the engine.
pub mod prelude {
    pub use crate::cancel::CancelToken;
    pub use crate::context::{Ctx, Value};
    pub use crate::errors::*;
    pub use crate::event::*;
    pub use crate::pipeline::*;
    pub use crate::plugin::Plugin;
    pub use crate::registry::{parse_plugin_ref, Registry};
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use uuid::Uuid;
}
