use mimir_core::errors::{AipError, ErrorKind};
use thiserror::Error;

/// Errors raised by the MCP tool adapter.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid tool input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] mimir_store::StoreError),

    #[error(transparent)]
    Scheduler(#[from] mimir_scheduler::SchedulerError),

    #[error(transparent)]
    Queue(#[from] mimir_queue::QueueError),

    #[error(transparent)]
    Engine(#[from] AipError),

    #[error("upstream subsystem failed: {0}")]
    UpstreamFailed(String),
}

impl From<McpError> for AipError {
    fn from(e: McpError) -> Self {
        match e {
            McpError::UnknownTool(_) => AipError::new(ErrorKind::NotFound, e.to_string()),
            McpError::InvalidInput(_) => AipError::new(ErrorKind::ValidationFailed, e.to_string()),
            McpError::Store(inner) => inner.into(),
            McpError::Scheduler(inner) => inner.into(),
            McpError::Queue(inner) => inner.into(),
            McpError::Engine(inner) => inner,
            McpError::UpstreamFailed(_) => AipError::new(ErrorKind::UpstreamFailed, e.to_string()),
        }
    }
}
