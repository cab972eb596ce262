//! Ports to the external systems the workspace depends on.
//!
//! The core only sees these traits; concrete adapters (HTTP user store,
//! connection probe, analysis and report engines) live outside this crate
//! so a real inference engine can be substituted without touching the
//! state machines.

use std::sync::Arc;

use async_trait::async_trait;

use insight_core::types::{
    ConnectionConfig, DatabaseSummary, Identity, ProbeResult, Report,
};

use crate::error::CollaboratorError;

/// Per-user persistence of the connection configuration.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetch the stored configuration, or `None` when nothing is stored.
    async fn load_connection_config(
        &self,
        identity: &Identity,
    ) -> Result<Option<ConnectionConfig>, CollaboratorError>;

    async fn save_connection_config(
        &self,
        identity: &Identity,
        config: &ConnectionConfig,
    ) -> Result<(), CollaboratorError>;

    /// Make sure the store knows about this user. Stores without a user
    /// registry accept everyone.
    async fn sync_user(&self, _identity: &Identity) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Side-effect-free reachability check for a connection.
#[async_trait]
pub trait ConnectionProbe: Send + Sync {
    async fn test_connection(&self, config: &ConnectionConfig) -> ProbeResult;
}

/// Produces a [`DatabaseSummary`] for a configured connection.
#[async_trait]
pub trait DatabaseAnalyzer: Send + Sync {
    async fn analyze_database(
        &self,
        config: &ConnectionConfig,
    ) -> Result<DatabaseSummary, CollaboratorError>;
}

/// Turns a natural-language request into a report.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate_report(
        &self,
        user_text: &str,
        summary: &DatabaseSummary,
    ) -> Result<Report, CollaboratorError>;
}

/// The full set of collaborators a workspace is wired with.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ConfigStore>,
    pub probe: Arc<dyn ConnectionProbe>,
    pub analyzer: Arc<dyn DatabaseAnalyzer>,
    pub generator: Arc<dyn ReportGenerator>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
