use mimir_core::errors::{AipError, ErrorKind};
use thiserror::Error;

/// Errors raised by the pipeline store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("pipeline name already in use: {0}")]
    NameConflict(String),

    #[error("pipeline not found: {0}")]
    NotFound(String),

    #[error("pipeline is referenced by a scheduled job: {0}")]
    InUse(String),

    #[error("invalid pipeline definition: {0}")]
    Invalid(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<StoreError> for AipError {
    fn from(e: StoreError) -> Self {
        let kind = match &e {
            StoreError::NameConflict(_) => ErrorKind::NameConflict,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::InUse(_) => ErrorKind::InUse,
            StoreError::Invalid(_) => ErrorKind::ValidationFailed,
            StoreError::Serialization(_) | StoreError::Io(_) => ErrorKind::Internal,
        };
        AipError::new(kind, e.to_string())
    }
}
