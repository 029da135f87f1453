//! Shared response envelope pieces.
//!
//! Every JSON body carries a top-level `status` of `"ok"` or `"error"`.
//! Success payloads are defined next to their handlers; the error body is
//! built here so [`crate::error::AppError`] renders every failure the same
//! way.

use serde::Serialize;

/// `status` value for successful responses.
pub const STATUS_OK: &str = "ok";

/// `status` value for failed responses.
pub const STATUS_ERROR: &str = "error";

/// Body of every `{ "status": "error", ... }` response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    /// The session code the request referred to, when there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR,
            code,
            message: message.into(),
        }
    }
}

/// Plain `{ "status": "ok" }` body.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self { status: STATUS_OK }
    }
}
