//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression,
//! and all endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use insight_core::config::InsightConfig;
use insight_core::error::{InsightError, Result};

use crate::handlers;
use crate::identity::{self, EMAIL_HEADER, SESSION_HEADER, USER_HEADER};
use crate::state::AppState;

const BODY_LIMIT_BYTES: usize = 64 * 1024;

fn cors_layer(config: &InsightConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .api
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(EMAIL_HEADER),
            HeaderName::from_static(USER_HEADER),
            HeaderName::from_static(SESSION_HEADER),
        ])
}

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    // Routes that do not need a workspace.
    let public_routes = Router::new().route("/health", get(handlers::health));

    let workspace_routes = Router::new()
        .route("/workspace", get(handlers::get_workspace))
        .route(
            "/connection",
            get(handlers::get_connection).put(handlers::save_connection),
        )
        .route("/connection/configure", post(handlers::configure))
        .route("/connection/test", post(handlers::test_connection))
        .route("/connection/analyze", post(handlers::analyze))
        .route("/chat/messages", post(handlers::send_message))
        .route("/chat/new", post(handlers::new_chat))
        .route("/activities", get(handlers::list_activities))
        .route("/activities/{id}/select", post(handlers::select_activity))
        .route("/reports", get(handlers::list_reports))
        .route(
            "/reports/{id}",
            get(handlers::get_report).delete(handlers::close_report),
        )
        .route("/reports/{id}/activate", post(handlers::activate_report))
        .route("/view/overview", post(handlers::show_overview))
        .route("/view/chat", post(handlers::show_chat))
        .route("/view/flags", put(handlers::update_flags))
        .route("/events", get(handlers::events))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            identity::require_workspace,
        ));

    public_routes
        .merge(workspace_routes)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
pub async fn start_server(config: &InsightConfig, state: AppState) -> Result<()> {
    let addr = format!("{}:{}", config.general.bind_address, config.general.port);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| InsightError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    let sweeper = state
        .registry
        .spawn_sweeper(config.api.sweep_interval(), config.api.idle_workspace_ttl());
    let router = create_router(state);

    let served = axum::serve(listener, router)
        .await
        .map_err(|e| InsightError::Api(format!("Server error: {}", e)));
    sweeper.abort();
    served
}
