//! Handlers for the `/session` resource.
//!
//! Each handler validates its body, stamps the request with the current
//! time, and makes exactly one registry call.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use peercode_core::error::CoreError;
use peercode_core::report::render_report;
use peercode_core::session::{normalize_code, Session};
use peercode_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::extract::{QueryParams, ValidatedJson};
use crate::response::{StatusResponse, STATUS_OK};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /session/create`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    /// Opaque address payload; stored verbatim.
    #[validate(length(min = 1, max = 255))]
    pub host_ip: String,
}

/// Request body for keepalive, close, and join.
#[derive(Debug, Deserialize, Validate)]
pub struct CodeRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
}

/// Returned by create and keepalive.
#[derive(Debug, Serialize)]
pub struct SessionExpiryResponse {
    pub status: &'static str,
    pub code: String,
    pub expires: Timestamp,
}

/// Returned by join.
#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub status: &'static str,
    pub code: String,
    pub ip: String,
}

/// Returned by `GET /session/list?format=json`.
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub status: &'static str,
    pub active: Vec<Session>,
    pub expired: Vec<Session>,
}

/// Output format for the list endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListFormat {
    #[default]
    Text,
    Json,
}

/// Query parameters for the list endpoint.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub format: ListFormat,
}

/// Report misses against the code as the caller typed it.
fn echo_requested_code(err: CoreError, requested: &str) -> AppError {
    match err {
        CoreError::NotFound { message, .. } => AppError::Core(CoreError::NotFound {
            code: requested.to_string(),
            message,
        }),
        other => AppError::Core(other),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /session/create
pub async fn create(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<CreateSessionRequest>,
) -> AppResult<Json<SessionExpiryResponse>> {
    let created = state.registry.create(&input.host_ip, Utc::now()).await?;

    Ok(Json(SessionExpiryResponse {
        status: STATUS_OK,
        code: created.code,
        expires: created.expires_at,
    }))
}

/// POST /session/keepalive
pub async fn keepalive(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<CodeRequest>,
) -> AppResult<Json<SessionExpiryResponse>> {
    let code = normalize_code(&input.code);
    let expires = state
        .registry
        .keepalive(&code, Utc::now())
        .await
        .map_err(|e| echo_requested_code(e, &input.code))?;

    Ok(Json(SessionExpiryResponse {
        status: STATUS_OK,
        code,
        expires,
    }))
}

/// POST /session/close
pub async fn close(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<CodeRequest>,
) -> AppResult<Json<StatusResponse>> {
    let code = normalize_code(&input.code);
    state
        .registry
        .close(&code)
        .await
        .map_err(|e| echo_requested_code(e, &input.code))?;
    Ok(Json(StatusResponse::ok()))
}

/// POST /session/join
pub async fn join(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<CodeRequest>,
) -> AppResult<Json<JoinResponse>> {
    let code = normalize_code(&input.code);
    let ip = state
        .registry
        .join(&code, Utc::now())
        .await
        .map_err(|e| echo_requested_code(e, &input.code))?;

    Ok(Json(JoinResponse {
        status: STATUS_OK,
        code,
        ip,
    }))
}

/// GET /session/list
///
/// Plain-text report by default; `?format=json` returns the same partition
/// as structured data.
pub async fn list(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ListQuery>,
) -> AppResult<Response> {
    let partition = state.registry.list(Utc::now()).await?;

    if params.format == ListFormat::Json {
        Ok(Json(SessionListResponse {
            status: STATUS_OK,
            active: partition.active,
            expired: partition.expired,
        })
        .into_response())
    } else {
        Ok(render_report(&partition).into_response())
    }
}
