//! Database connection lifecycle with validated transitions.
//!
//! Enforces the allowed transitions for the workspace's connection:
//! - Unconfigured | Configuring | Ready | Failed -> Configuring (configure)
//! - Configuring | Ready | Failed -> Analyzing (begin analysis)
//! - Analyzing -> Ready (analysis succeeded)
//! - Analyzing -> Failed (analysis failed)
//! - Configuring -> Failed (persisting the configuration failed)
//!
//! At most one analysis is in flight; a second request while `Analyzing`
//! is rejected as busy rather than queued. The same holds for a save that
//! is still persisting: `configure`, `save` and analysis all return busy
//! until it settles, so the analyzed configuration is always the one that
//! was persisted.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use insight_core::types::{ConnectionConfig, DatabaseSummary, Identity, ProbeResult};

use crate::collaborators::{Collaborators, ConfigStore, ConnectionProbe, DatabaseAnalyzer};
use crate::error::WorkspaceError;

/// Observable state of the database connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ConnectionState {
    /// No configuration has been supplied.
    Unconfigured,
    /// A configuration is held provisionally, not yet analyzed.
    Configuring,
    /// A connection test is running against the provisional configuration.
    Testing,
    /// The analysis collaborator is working on the configuration.
    Analyzing,
    /// Analysis finished; the summary is complete.
    Ready(Arc<DatabaseSummary>),
    /// The last persistence or analysis attempt failed.
    Failed(String),
}

impl ConnectionState {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Unconfigured => "Unconfigured",
            ConnectionState::Configuring => "Configuring",
            ConnectionState::Testing => "Testing",
            ConnectionState::Analyzing => "Analyzing",
            ConnectionState::Ready(_) => "Ready",
            ConnectionState::Failed(_) => "Failed",
        }
    }

    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, target),
            (Unconfigured | Configuring | Ready(_) | Failed(_), Configuring)
                | (Configuring | Ready(_) | Failed(_), Analyzing)
                | (Analyzing, Ready(_))
                | (Analyzing, Failed(_))
                | (Configuring, Failed(_))
        )
    }

    pub fn summary(&self) -> Option<&Arc<DatabaseSummary>> {
        match self {
            ConnectionState::Ready(summary) => Some(summary),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Proof that the lifecycle entered `Analyzing`; consumed by
/// [`ConnectionLifecycle::run_analysis`].
#[derive(Debug)]
#[must_use = "an analysis ticket does nothing until passed to run_analysis"]
pub struct AnalysisTicket {
    config: ConnectionConfig,
}

impl AnalysisTicket {
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

#[derive(Debug)]
struct Inner {
    state: ConnectionState,
    config: Option<ConnectionConfig>,
    probes_in_flight: usize,
    saving: bool,
}

impl Inner {
    fn ensure_idle(&self) -> Result<(), WorkspaceError> {
        if self.saving {
            return Err(WorkspaceError::Busy { operation: "save" });
        }
        if self.state == ConnectionState::Analyzing {
            return Err(WorkspaceError::Busy {
                operation: "analysis",
            });
        }
        Ok(())
    }

    fn enter_analysis(
        &mut self,
        config: ConnectionConfig,
    ) -> Result<AnalysisTicket, WorkspaceError> {
        self.transition(ConnectionState::Analyzing)?;
        Ok(AnalysisTicket { config })
    }

    fn transition(&mut self, target: ConnectionState) -> Result<(), WorkspaceError> {
        if self.state.can_transition_to(&target) {
            debug!("Connection state: {} -> {}", self.state, target);
            self.state = target;
            Ok(())
        } else {
            Err(WorkspaceError::InvalidTransition {
                from: self.state.name(),
                to: target.name(),
            })
        }
    }
}

/// Owns the connection state for one workspace, independent of any
/// conversation.
pub struct ConnectionLifecycle {
    identity: Option<Identity>,
    inner: Mutex<Inner>,
    store: Arc<dyn ConfigStore>,
    probe: Arc<dyn ConnectionProbe>,
    analyzer: Arc<dyn DatabaseAnalyzer>,
    probe_timeout: Duration,
}

impl fmt::Debug for ConnectionLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionLifecycle")
            .field("identity", &self.identity)
            .field("inner", &self.inner)
            .field("probe_timeout", &self.probe_timeout)
            .finish_non_exhaustive()
    }
}

impl ConnectionLifecycle {
    /// Create an `Unconfigured` lifecycle without consulting the store.
    pub fn new(
        identity: Option<Identity>,
        collaborators: &Collaborators,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            identity,
            inner: Mutex::new(Inner {
                state: ConnectionState::Unconfigured,
                config: None,
                probes_in_flight: 0,
                saving: false,
            }),
            store: Arc::clone(&collaborators.store),
            probe: Arc::clone(&collaborators.probe),
            analyzer: Arc::clone(&collaborators.analyzer),
            probe_timeout,
        }
    }

    /// Resolve the initial state for a session.
    ///
    /// A stored configuration puts the lifecycle straight into `Analyzing`
    /// and the returned ticket must be run by the caller. Without an
    /// identity or a stored configuration the lifecycle stays
    /// `Unconfigured`.
    pub async fn load(
        identity: Option<Identity>,
        collaborators: &Collaborators,
        probe_timeout: Duration,
    ) -> (Self, Option<AnalysisTicket>) {
        let lifecycle = Self::new(identity, collaborators, probe_timeout);
        let Some(identity) = lifecycle.identity.clone() else {
            debug!("No identity; connection starts unconfigured without persistence");
            return (lifecycle, None);
        };

        if let Err(e) = lifecycle.store.sync_user(&identity).await {
            warn!(user = %identity.email, error = %e, "Failed to sync user with store");
        }

        match lifecycle.store.load_connection_config(&identity).await {
            Ok(Some(config)) if config.is_complete() => {
                {
                    let mut inner = lifecycle.lock();
                    inner.config = Some(config);
                    inner.state = ConnectionState::Configuring;
                }
                info!(user = %identity.email, "Stored connection found; starting analysis");
                match lifecycle.begin_analysis() {
                    Ok(ticket) => (lifecycle, Some(ticket)),
                    Err(e) => {
                        warn!(error = %e, "Could not start analysis of stored connection");
                        (lifecycle, None)
                    }
                }
            }
            Ok(_) => {
                debug!(user = %identity.email, "No stored connection");
                (lifecycle, None)
            }
            Err(e) => {
                warn!(user = %identity.email, error = %e, "Failed to load stored connection");
                (lifecycle, None)
            }
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Current state. Reports `Testing` while a probe runs against a
    /// provisional configuration.
    pub fn state(&self) -> ConnectionState {
        let inner = self.lock();
        if inner.probes_in_flight > 0 && inner.state == ConnectionState::Configuring {
            ConnectionState::Testing
        } else {
            inner.state.clone()
        }
    }

    pub fn config(&self) -> Option<ConnectionConfig> {
        self.lock().config.clone()
    }

    pub fn summary(&self) -> Option<Arc<DatabaseSummary>> {
        self.lock().state.summary().cloned()
    }

    pub fn is_analyzing(&self) -> bool {
        self.lock().state == ConnectionState::Analyzing
    }

    /// Whether a save is still waiting on the config store.
    pub fn is_saving(&self) -> bool {
        self.lock().saving
    }

    /// Hold `config` provisionally. Replaces any earlier provisional
    /// configuration.
    pub fn configure(&self, config: ConnectionConfig) -> Result<(), WorkspaceError> {
        validate(&config)?;
        let mut inner = self.lock();
        inner.ensure_idle()?;
        inner.transition(ConnectionState::Configuring)?;
        inner.config = Some(config);
        Ok(())
    }

    /// Probe `config` without changing the lifecycle.
    pub async fn test(&self, config: &ConnectionConfig) -> Result<ProbeResult, WorkspaceError> {
        validate(config)?;
        let _guard = ProbeGuard::enter(&self.inner);
        let result =
            match tokio::time::timeout(self.probe_timeout, self.probe.test_connection(config))
                .await
            {
                Ok(result) => result,
                Err(_) => ProbeResult::failed(format!(
                    "connection test timed out after {} ms",
                    self.probe_timeout.as_millis()
                )),
            };
        debug!(success = result.success, "Connection test finished");
        Ok(result)
    }

    /// Persist `config` and enter `Analyzing`.
    ///
    /// Requires `Configuring`. Without an identity nothing is persisted. A
    /// persistence failure moves the lifecycle to `Failed`. Only one save
    /// runs at a time and the returned ticket always carries `config`.
    pub async fn save(&self, config: ConnectionConfig) -> Result<AnalysisTicket, WorkspaceError> {
        validate(&config)?;
        let in_flight = {
            let mut inner = self.lock();
            inner.ensure_idle()?;
            if inner.state != ConnectionState::Configuring {
                return Err(WorkspaceError::InvalidTransition {
                    from: inner.state.name(),
                    to: ConnectionState::Analyzing.name(),
                });
            }
            inner.config = Some(config.clone());
            SaveGuard::enter(&self.inner, &mut inner)
        };

        if let Some(identity) = &self.identity {
            if let Err(e) = self.store.save_connection_config(identity, &config).await {
                warn!(user = %identity.email, error = %e, "Failed to persist connection");
                let mut inner = self.lock();
                in_flight.settle(&mut inner);
                inner.transition(ConnectionState::Failed(e.to_string()))?;
                return Err(e.into());
            }
            info!(user = %identity.email, "Connection configuration saved");
        }

        let mut inner = self.lock();
        in_flight.settle(&mut inner);
        inner.enter_analysis(config)
    }

    /// Enter `Analyzing` for the current configuration.
    pub fn begin_analysis(&self) -> Result<AnalysisTicket, WorkspaceError> {
        let mut inner = self.lock();
        inner.ensure_idle()?;
        let config = inner
            .config
            .clone()
            .ok_or_else(|| WorkspaceError::validation("no database connection configured"))?;
        inner.enter_analysis(config)
    }

    /// Run the analysis collaborator and apply its result atomically.
    ///
    /// A success replaces any earlier summary wholesale.
    pub async fn run_analysis(
        &self,
        ticket: AnalysisTicket,
    ) -> Result<Arc<DatabaseSummary>, WorkspaceError> {
        let mut in_flight = AnalysisGuard {
            inner: &self.inner,
            settled: false,
        };
        let result = self.analyzer.analyze_database(&ticket.config).await;

        let mut inner = self.lock();
        in_flight.settled = true;
        match result {
            Ok(summary) => {
                let summary = Arc::new(summary);
                inner.transition(ConnectionState::Ready(Arc::clone(&summary)))?;
                info!(
                    tables = summary.stats.table_count,
                    rows = summary.stats.row_count,
                    "Database analysis complete"
                );
                Ok(summary)
            }
            Err(e) => {
                warn!(error = %e, "Database analysis failed");
                inner.transition(ConnectionState::Failed(e.to_string()))?;
                Err(e.into())
            }
        }
    }

    /// Begin and run an analysis of the current configuration.
    pub async fn analyze(&self) -> Result<Arc<DatabaseSummary>, WorkspaceError> {
        let ticket = self.begin_analysis()?;
        self.run_analysis(ticket).await
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate(config: &ConnectionConfig) -> Result<(), WorkspaceError> {
    if config.is_complete() {
        Ok(())
    } else {
        Err(WorkspaceError::validation("connection string is required"))
    }
}

struct ProbeGuard<'a> {
    inner: &'a Mutex<Inner>,
}

impl<'a> ProbeGuard<'a> {
    fn enter(inner: &'a Mutex<Inner>) -> Self {
        inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .probes_in_flight += 1;
        Self { inner }
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
    }
}

/// Clears the in-flight save flag, including when the save future is
/// dropped while the store is still working.
struct SaveGuard<'a> {
    inner: &'a Mutex<Inner>,
    settled: bool,
}

impl<'a> SaveGuard<'a> {
    fn enter(lock: &'a Mutex<Inner>, inner: &mut Inner) -> Self {
        inner.saving = true;
        Self {
            inner: lock,
            settled: false,
        }
    }

    fn settle(mut self, inner: &mut Inner) {
        inner.saving = false;
        self.settled = true;
    }
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.saving = false;
        debug!("Connection save dropped before completion");
    }
}

/// Moves a dropped, unfinished analysis to `Failed` so the lifecycle never
/// stays `Analyzing` forever.
struct AnalysisGuard<'a> {
    inner: &'a Mutex<Inner>,
    settled: bool,
}

impl Drop for AnalysisGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.state == ConnectionState::Analyzing {
            warn!("Analysis dropped before completion");
            inner.state = ConnectionState::Failed("analysis was abandoned".to_string());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
