//! Route handler functions for all API endpoints.
//!
//! Each handler receives the caller's workspace from the request
//! extensions (see [`crate::identity`]), drives its controller, and returns
//! JSON responses.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use insight_core::types::{
    Activity, ConnectionConfig, Identity, ProbeResult, Report, ReportId,
};
use insight_workspace::{ConnectionState, TurnOutcome, View, ViewFlags, WorkspaceSnapshot};

use crate::error::ApiError;
use crate::registry::WorkspaceHandle;
use crate::state::AppState;

type Workspace = Extension<Arc<WorkspaceHandle>>;

const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub workspaces: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionResponse {
    pub state: ConnectionState,
    /// Current connection settings with any password masked.
    pub config: Option<ConnectionConfig>,
    pub identity: Option<Identity>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportsResponse {
    pub reports: Vec<Report>,
    pub active_report_id: Option<ReportId>,
}

#[derive(Debug, Serialize)]
pub struct ActivitiesResponse {
    pub activities: Vec<Activity>,
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub view: View,
}

/// Mask the password of a URL-shaped connection string.
pub fn redact_connection_string(connection_string: &str) -> String {
    match url::Url::parse(connection_string) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("****")).is_err() {
                return "****".to_string();
            }
            parsed.to_string()
        }
        _ => connection_string.to_string(),
    }
}

fn connection_response(handle: &WorkspaceHandle) -> ConnectionResponse {
    let controller = &handle.controller;
    ConnectionResponse {
        state: controller.connection_state(),
        config: controller
            .connection()
            .config()
            .map(|c| ConnectionConfig::new(redact_connection_string(&c.connection_string))),
        identity: controller.identity().cloned(),
    }
}

// =============================================================================
// Health and workspace
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        workspaces: state.registry.len() as u64,
    })
}

/// GET /workspace - full workspace snapshot.
pub async fn get_workspace(Extension(handle): Workspace) -> Json<WorkspaceSnapshot> {
    Json(handle.controller.snapshot())
}

// =============================================================================
// Connection
// =============================================================================

/// GET /connection - connection state and settings.
pub async fn get_connection(Extension(handle): Workspace) -> Json<ConnectionResponse> {
    Json(connection_response(&handle))
}

/// POST /connection/configure - edit settings without saving.
pub async fn configure(
    Extension(handle): Workspace,
    Json(config): Json<ConnectionConfig>,
) -> Result<Json<ConnectionResponse>, ApiError> {
    handle.controller.configure(config)?;
    Ok(Json(connection_response(&handle)))
}

/// POST /connection/test - probe a connection without changing state.
pub async fn test_connection(
    Extension(handle): Workspace,
    Json(config): Json<ConnectionConfig>,
) -> Result<Json<ProbeResult>, ApiError> {
    let result = handle.controller.test_connection(&config).await?;
    Ok(Json(result))
}

/// PUT /connection - persist settings and start an analysis.
pub async fn save_connection(
    Extension(handle): Workspace,
    Json(config): Json<ConnectionConfig>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = handle.controller.save_connection(config).await?;
    info!(workspace = %handle.key, "Connection saved, analysis started");
    handle.spawn_analysis(ticket);
    Ok((StatusCode::ACCEPTED, Json(connection_response(&handle))))
}

/// POST /connection/analyze - re-run the analysis of a saved connection.
pub async fn analyze(Extension(handle): Workspace) -> Result<impl IntoResponse, ApiError> {
    let ticket = handle.controller.begin_analysis()?;
    handle.spawn_analysis(ticket);
    Ok((StatusCode::ACCEPTED, Json(connection_response(&handle))))
}

// =============================================================================
// Chat
// =============================================================================

/// POST /chat/messages - send a message and wait for the report.
pub async fn send_message(
    Extension(handle): Workspace,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<TurnOutcome>, ApiError> {
    let outcome = handle.send(req.message).await?;
    if let TurnOutcome::Failed { reason } = &outcome {
        warn!(workspace = %handle.key, reason = %reason, "Chat turn failed");
    }
    Ok(Json(outcome))
}

/// POST /chat/new - start a fresh conversation.
pub async fn new_chat(Extension(handle): Workspace) -> Json<WorkspaceSnapshot> {
    handle.controller.new_chat();
    Json(handle.controller.snapshot())
}

// =============================================================================
// Activities
// =============================================================================

/// GET /activities - activity log, most recent first.
pub async fn list_activities(Extension(handle): Workspace) -> Json<ActivitiesResponse> {
    Json(ActivitiesResponse {
        activities: handle.controller.activities(),
    })
}

/// POST /activities/{id}/select - resume a past conversation.
pub async fn select_activity(
    Extension(handle): Workspace,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkspaceSnapshot>, ApiError> {
    handle.controller.select_activity(id)?;
    Ok(Json(handle.controller.snapshot()))
}

// =============================================================================
// Reports
// =============================================================================

/// GET /reports - open reports in tab order.
pub async fn list_reports(Extension(handle): Workspace) -> Json<ReportsResponse> {
    let (reports, active_report_id) = handle.controller.open_reports();
    Json(ReportsResponse {
        reports,
        active_report_id,
    })
}

/// GET /reports/{id} - any report generated in this workspace.
pub async fn get_report(
    Extension(handle): Workspace,
    Path(id): Path<String>,
) -> Result<Json<Report>, ApiError> {
    let report = handle.controller.report(&ReportId::new(id))?;
    Ok(Json(report))
}

/// POST /reports/{id}/activate - focus an open report tab.
pub async fn activate_report(
    Extension(handle): Workspace,
    Path(id): Path<String>,
) -> Result<Json<ReportsResponse>, ApiError> {
    handle.controller.activate_report(&ReportId::new(id))?;
    Ok(list_reports(Extension(handle)).await)
}

/// DELETE /reports/{id} - close a report tab.
pub async fn close_report(
    Extension(handle): Workspace,
    Path(id): Path<String>,
) -> Result<Json<ReportsResponse>, ApiError> {
    handle.controller.close_report(&ReportId::new(id))?;
    Ok(list_reports(Extension(handle)).await)
}

// =============================================================================
// View
// =============================================================================

/// POST /view/overview
pub async fn show_overview(Extension(handle): Workspace) -> Json<ViewResponse> {
    Json(ViewResponse {
        view: handle.controller.show_overview(),
    })
}

/// POST /view/chat
pub async fn show_chat(Extension(handle): Workspace) -> Json<ViewResponse> {
    Json(ViewResponse {
        view: handle.controller.show_chat(),
    })
}

/// PUT /view/flags - replace the sidebar/canvas/dialog flags.
pub async fn update_flags(
    Extension(handle): Workspace,
    Json(flags): Json<ViewFlags>,
) -> Json<ViewFlags> {
    handle.controller.set_flags(flags);
    Json(handle.controller.flags())
}

// =============================================================================
// Events
// =============================================================================

/// GET /events - SSE stream of this workspace's events.
pub async fn events(
    Extension(handle): Workspace,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send> {
    let rx = handle.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().event(event.event_name()).data(data)))
        }
        // Lagged receivers skip what they missed
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(SSE_KEEP_ALIVE))
}
