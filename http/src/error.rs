//! Mechanical mapping from `ErrorKind` to HTTP status, per spec §6.1/§7.
//! Nothing here inspects error message text; only `kind` drives the status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use mimir_core::errors::{AipError, ErrorKind};

use crate::ApiResponse;

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
        ErrorKind::NameConflict | ErrorKind::DuplicatePlugin | ErrorKind::DuplicateId | ErrorKind::InUse => {
            StatusCode::CONFLICT
        }
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::PluginMissing | ErrorKind::PrecheckFailed => StatusCode::BAD_REQUEST,
        ErrorKind::StepFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::UpstreamFailed => StatusCode::BAD_GATEWAY,
        ErrorKind::Cancelled => StatusCode::GONE,
        ErrorKind::Timeout => StatusCode::REQUEST_TIMEOUT,
        ErrorKind::QueueFull => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Wraps `AipError` so handlers can `.map_err(ApiError)?` and return it
/// directly; axum's `IntoResponse` then does the status/body mapping.
#[derive(Debug)]
pub struct ApiError(pub AipError);

impl From<AipError> for ApiError {
    fn from(e: AipError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind);
        tracing::warn!(kind = ?self.0.kind, message = %self.0.message, "request failed");
        (status, Json(ApiResponse::<()>::error(self.0.message))).into_response()
    }
}
