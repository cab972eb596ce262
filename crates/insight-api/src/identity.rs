//! Workspace resolution from trusted proxy headers.
//!
//! The authenticating reverse proxy supplies `X-Forwarded-Email` (and
//! optionally `X-Forwarded-User`). Without it, a client may still work in
//! an anonymous workspace named by `X-Workspace-Session`; nothing is
//! persisted for those.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use insight_core::types::Identity;

use crate::error::ApiError;
use crate::registry::WorkspaceKey;
use crate::state::AppState;

pub const EMAIL_HEADER: &str = "x-forwarded-email";
pub const USER_HEADER: &str = "x-forwarded-user";
pub const SESSION_HEADER: &str = "x-workspace-session";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|s| Some(s.trim()).filter(|s| !s.is_empty()))
            .map_err(|_| ApiError::Unauthorized(format!("Invalid {} header encoding", name))),
    }
}

/// Resolve the workspace key and identity for a request.
pub fn resolve(headers: &HeaderMap) -> Result<(WorkspaceKey, Option<Identity>), ApiError> {
    if let Some(email) = header_value(headers, EMAIL_HEADER)? {
        let display_name = header_value(headers, USER_HEADER)?.unwrap_or(email);
        let identity = Identity::new(email, display_name);
        return Ok((WorkspaceKey::User(email.to_string()), Some(identity)));
    }
    if let Some(session) = header_value(headers, SESSION_HEADER)? {
        return Ok((WorkspaceKey::Anonymous(session.to_string()), None));
    }
    Err(ApiError::Unauthorized(
        "Missing X-Forwarded-Email or X-Workspace-Session header".to_string(),
    ))
}

/// Middleware that attaches the caller's workspace to the request.
///
/// Returns 401 when neither an identity nor a workspace session is given.
pub async fn require_workspace(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let (key, identity) = match resolve(req.headers()) {
        Ok(resolved) => resolved,
        Err(e) => return e.into_response(),
    };
    let handle = state.registry.get_or_open(key, identity).await;
    req.extensions_mut().insert(handle);
    next.run(req).await
}
