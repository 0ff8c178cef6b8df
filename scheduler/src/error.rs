use mimir_core::errors::{AipError, ErrorKind};
use thiserror::Error;

/// Errors raised by the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    #[error("pipeline not found: {0}")]
    PipelineMissing(String),

    #[error("scheduled job id already in use: {0}")]
    DuplicateId(String),

    #[error("scheduled job not found: {0}")]
    NotFound(String),
}

impl From<SchedulerError> for AipError {
    fn from(e: SchedulerError) -> Self {
        let kind = match &e {
            SchedulerError::InvalidCron(_) => ErrorKind::ValidationFailed,
            SchedulerError::PipelineMissing(_) => ErrorKind::NotFound,
            SchedulerError::DuplicateId(_) => ErrorKind::DuplicateId,
            SchedulerError::NotFound(_) => ErrorKind::NotFound,
        };
        AipError::new(kind, e.to_string())
    }
}
