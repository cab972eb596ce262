//! Application state shared across all route handlers.
//!
//! AppState holds the server configuration and the workspace registry.
//! It is passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use insight_core::config::InsightConfig;
use insight_workspace::{Collaborators, WorkspaceSettings};

use crate::registry::WorkspaceRegistry;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<InsightConfig>,
    /// Live workspaces by identity.
    pub registry: Arc<WorkspaceRegistry>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState wiring `collaborators` into every workspace.
    pub fn new(config: InsightConfig, collaborators: Collaborators) -> Self {
        let settings = WorkspaceSettings::from_config(&config);
        Self {
            config: Arc::new(config),
            registry: Arc::new(WorkspaceRegistry::new(collaborators, settings)),
            start_time: Instant::now(),
        }
    }
}
