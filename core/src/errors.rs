//! Error taxonomy shared across the pipeline core

use serde::Serialize;
use thiserror::Error;

/// Cross-cutting error classification. The HTTP surface maps each kind to a
/// status code mechanically; nothing else should inspect error message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationFailed,
    NameConflict,
    DuplicatePlugin,
    DuplicateId,
    NotFound,
    InUse,
    PluginMissing,
    PrecheckFailed,
    StepFailed,
    UpstreamFailed,
    Cancelled,
    Timeout,
    QueueFull,
    Internal,
}

/// Common error currency between the engine, store, scheduler, queue and the
/// HTTP layer. Analogous to `CoreError` in the request-pipeline this crate
/// was generalized from, but flattened to a single tagged struct instead of
/// a per-subsystem enum tree.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{kind:?}: {message}")]
pub struct AipError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AipError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationFailed, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

/// Errors returned from the four plugin contract operations.
#[derive(Debug, Error, Clone)]
pub enum PluginError {
    #[error("invalid config: {0:?}")]
    ConfigInvalid(Vec<String>),

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<PluginError> for AipError {
    fn from(e: PluginError) -> Self {
        let kind = match &e {
            PluginError::ConfigInvalid(_) => ErrorKind::ValidationFailed,
            PluginError::Upstream(_) => ErrorKind::UpstreamFailed,
            PluginError::Timeout => ErrorKind::Timeout,
            PluginError::Cancelled => ErrorKind::Cancelled,
            PluginError::Internal(_) => ErrorKind::Internal,
        };
        AipError::new(kind, e.to_string())
    }
}

/// Errors raised by the plugin registry.
#[derive(Debug, Error, Clone)]
pub enum RegistryError {
    #[error("plugin already registered: {0}.{1}")]
    DuplicatePlugin(String, String),

    #[error("plugin not found: {0}.{1}")]
    NotFound(String, String),

    #[error("malformed plugin reference: {0}")]
    MalformedRef(String),
}

impl From<RegistryError> for AipError {
    fn from(e: RegistryError) -> Self {
        let kind = match &e {
            RegistryError::DuplicatePlugin(..) => ErrorKind::DuplicatePlugin,
            RegistryError::NotFound(..) => ErrorKind::PluginMissing,
            RegistryError::MalformedRef(_) => ErrorKind::ValidationFailed,
        };
        AipError::new(kind, e.to_string())
    }
}

/// Errors raised by the pipeline engine while executing a run.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("step '{step}' references an unregistered plugin: {reason}")]
    PluginMissing { step: String, reason: String },

    #[error("step '{step}' failed precheck: {reason}")]
    PrecheckFailed { step: String, reason: String },

    #[error("step '{step}' failed: {kind:?}: {cause}")]
    StepFailed {
        step: String,
        kind: ErrorKind,
        cause: String,
    },

    #[error("run was cancelled")]
    Cancelled,
}

impl From<EngineError> for AipError {
    fn from(e: EngineError) -> Self {
        let kind = match &e {
            EngineError::PluginMissing { .. } => ErrorKind::PluginMissing,
            EngineError::PrecheckFailed { .. } => ErrorKind::PrecheckFailed,
            EngineError::StepFailed { kind, .. } => *kind,
            EngineError::Cancelled => ErrorKind::Cancelled,
        };
        AipError::new(kind, e.to_string())
    }
}

pub type AipResult<T> = Result<T, AipError>;
