use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use peercode_core::error::CoreError;

use crate::response::ErrorBody;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for registry errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce `{ "status": "error", ... }` bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `peercode_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Missing or malformed request body.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            // Lookups that miss are an expected outcome, reported in-band
            // with HTTP 200 and the code the caller asked about.
            AppError::Core(CoreError::NotFound { code, message }) => {
                (StatusCode::OK, ErrorBody::new(Some(code), message))
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorBody::new(None, msg))
            }
            AppError::Core(CoreError::Conflict(msg)) => {
                tracing::error!(error = %msg, "Session code space exhausted");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody::new(None, "No free session code available"),
                )
            }
            AppError::Core(CoreError::StoreUnavailable(msg)) => {
                tracing::error!(error = %msg, "Session store unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody::new(None, "Session store unavailable"),
                )
            }
            AppError::Core(CoreError::Internal(msg)) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new(None, "An internal error occurred"),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}
