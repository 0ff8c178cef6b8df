use mimir_core::errors::{AipError, ErrorKind};
use thiserror::Error;

/// Errors raised by the job queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is full (max {max})")]
    Full { max: usize },

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("pipeline not found: {0}")]
    PipelineMissing(String),

    #[error("wait for job result timed out")]
    WaitTimeout,
}

impl From<QueueError> for AipError {
    fn from(e: QueueError) -> Self {
        let kind = match &e {
            QueueError::Full { .. } => ErrorKind::QueueFull,
            QueueError::NotFound(_) => ErrorKind::NotFound,
            QueueError::PipelineMissing(_) => ErrorKind::NotFound,
            QueueError::WaitTimeout => ErrorKind::Timeout,
        };
        AipError::new(kind, e.to_string())
    }
}
