//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping workspace errors to appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use insight_core::error::InsightError;
use insight_workspace::WorkspaceError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "busy").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - rejected input.
    BadRequest(String),
    /// 401 Unauthorized - no identity or workspace session supplied.
    Unauthorized(String),
    /// 404 Not Found - report or activity does not exist.
    NotFound(String),
    /// 409 Conflict - operation not valid in the current state.
    Conflict(String),
    /// 409 Conflict - the database has not been analyzed yet.
    NotReady(String),
    /// 409 Conflict - a single-flight operation is already running.
    Busy(String),
    /// 502 Bad Gateway - an external collaborator failed.
    BadGateway(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::NotReady(msg) => (StatusCode::CONFLICT, "not_ready", msg),
            ApiError::Busy(msg) => (StatusCode::CONFLICT, "busy", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "collaborator_error", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<WorkspaceError> for ApiError {
    fn from(err: WorkspaceError) -> Self {
        let message = err.to_string();
        match err {
            WorkspaceError::Validation(_) => ApiError::BadRequest(message),
            WorkspaceError::Busy { .. } => ApiError::Busy(message),
            WorkspaceError::NotReady => ApiError::NotReady(message),
            WorkspaceError::ReportNotOpen(_)
            | WorkspaceError::ReportNotFound(_)
            | WorkspaceError::ActivityNotFound(_) => ApiError::NotFound(message),
            WorkspaceError::ReportAlreadyAttached(_) | WorkspaceError::InvalidTransition { .. } => {
                ApiError::Conflict(message)
            }
            WorkspaceError::Collaborator(_) => ApiError::BadGateway(message),
        }
    }
}

impl From<InsightError> for ApiError {
    fn from(err: InsightError) -> Self {
        match &err {
            InsightError::Config(msg) => ApiError::BadRequest(msg.clone()),
            InsightError::Backend(msg) => ApiError::BadGateway(msg.clone()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
