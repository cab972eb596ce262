//! Top-level coordinator for one user's workspace.
//!
//! Composes the connection lifecycle, report store, activity log and
//! conversation session, and derives the presented view from their
//! combined state. Collaborator calls never run with the workspace lock
//! held, so read-only actions (switching report tabs, reading the
//! transcript) stay available while an analysis or a turn is in flight.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use insight_core::config::InsightConfig;
use insight_core::types::{
    Activity, ConnectionConfig, DatabaseSummary, Identity, Message, ProbeResult, Report, ReportId,
};

use crate::activity::ActivityLog;
use crate::collaborators::{Collaborators, ReportGenerator};
use crate::connection::{AnalysisTicket, ConnectionLifecycle, ConnectionState};
use crate::error::WorkspaceError;
use crate::reports::ReportStore;
use crate::session::{ConversationSession, TurnOutcome};

/// Which main panel the user asked for once the database is ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewToggle {
    #[default]
    Chat,
    Overview,
}

/// Ephemeral presentation flags. Not persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewFlags {
    pub sidebar_open: bool,
    pub canvas_expanded: bool,
    pub config_dialog_open: bool,
}

impl ViewFlags {
    fn collapse(&mut self) {
        self.sidebar_open = false;
        self.canvas_expanded = false;
    }
}

/// The top-level view presented to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    Setup { dialog_open: bool },
    Analyzing,
    Overview { summary: Arc<DatabaseSummary> },
    Chat { pending: bool },
}

/// Derive the presented view. `Analyzing` wins over any toggle.
pub fn present(
    state: &ConnectionState,
    pending: bool,
    toggle: ViewToggle,
    dialog_open: bool,
) -> View {
    match state {
        ConnectionState::Unconfigured
        | ConnectionState::Configuring
        | ConnectionState::Testing
        | ConnectionState::Failed(_) => View::Setup { dialog_open },
        ConnectionState::Analyzing => View::Analyzing,
        ConnectionState::Ready(summary) => match toggle {
            ViewToggle::Overview => View::Overview {
                summary: Arc::clone(summary),
            },
            ViewToggle::Chat => View::Chat { pending },
        },
    }
}

/// Per-workspace settings taken from the server configuration.
#[derive(Debug, Clone)]
pub struct WorkspaceSettings {
    pub greeting: String,
    pub new_chat_greeting: String,
    pub max_message_length: usize,
    pub probe_timeout: Duration,
}

impl WorkspaceSettings {
    pub fn from_config(config: &InsightConfig) -> Self {
        Self {
            greeting: config.chat.greeting.clone(),
            new_chat_greeting: config.chat.new_chat_greeting.clone(),
            max_message_length: config.chat.max_message_length,
            probe_timeout: config.connection.probe_timeout(),
        }
    }
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self::from_config(&InsightConfig::default())
    }
}

/// Serializable picture of the whole workspace.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSnapshot {
    pub view: View,
    pub connection: ConnectionState,
    pub transcript: Vec<Message>,
    pub open_reports: Vec<Report>,
    pub active_report_id: Option<ReportId>,
    pub activities: Vec<Activity>,
    pub current_activity_id: Option<Uuid>,
    pub pending: bool,
    pub toggle: ViewToggle,
    pub flags: ViewFlags,
}

#[derive(Debug)]
struct WorkspaceState {
    session: ConversationSession,
    reports: ReportStore,
    activities: ActivityLog,
    toggle: ViewToggle,
    flags: ViewFlags,
}

pub struct WorkspaceController {
    connection: ConnectionLifecycle,
    state: Mutex<WorkspaceState>,
    generator: Arc<dyn ReportGenerator>,
    settings: WorkspaceSettings,
}

impl std::fmt::Debug for WorkspaceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceController")
            .field("connection", &self.connection)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl WorkspaceController {
    /// Open a workspace for `identity`.
    ///
    /// When a stored configuration exists the returned ticket must be run
    /// with [`run_analysis`](Self::run_analysis).
    pub async fn open(
        identity: Option<Identity>,
        collaborators: Collaborators,
        settings: WorkspaceSettings,
    ) -> (Self, Option<AnalysisTicket>) {
        let has_identity = identity.is_some();
        let (connection, ticket) =
            ConnectionLifecycle::load(identity, &collaborators, settings.probe_timeout).await;

        let flags = ViewFlags {
            config_dialog_open: has_identity && ticket.is_none(),
            ..ViewFlags::default()
        };
        let controller = Self {
            connection,
            state: Mutex::new(WorkspaceState {
                session: ConversationSession::new(&settings.greeting, settings.max_message_length),
                reports: ReportStore::new(),
                activities: ActivityLog::new(),
                toggle: ViewToggle::Chat,
                flags,
            }),
            generator: collaborators.generator,
            settings,
        };
        (controller, ticket)
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.connection.identity()
    }

    pub fn connection(&self) -> &ConnectionLifecycle {
        &self.connection
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn view(&self) -> View {
        let connection = self.connection.state();
        let state = self.lock();
        present(
            &connection,
            state.session.is_pending(),
            state.toggle,
            state.flags.config_dialog_open,
        )
    }

    // -------------------------------------------------------------------------
    // Connection
    // -------------------------------------------------------------------------

    pub fn configure(&self, config: ConnectionConfig) -> Result<(), WorkspaceError> {
        self.connection.configure(config)
    }

    pub async fn test_connection(
        &self,
        config: &ConnectionConfig,
    ) -> Result<ProbeResult, WorkspaceError> {
        self.connection.test(config).await
    }

    /// Configure, persist, and enter `Analyzing`. Closes the configuration
    /// dialog on success.
    pub async fn save_connection(
        &self,
        config: ConnectionConfig,
    ) -> Result<AnalysisTicket, WorkspaceError> {
        self.connection.configure(config.clone())?;
        let ticket = self.connection.save(config).await?;
        self.lock().flags.config_dialog_open = false;
        Ok(ticket)
    }

    pub fn begin_analysis(&self) -> Result<AnalysisTicket, WorkspaceError> {
        self.connection.begin_analysis()
    }

    /// Run an analysis; a success lands the user on the overview.
    pub async fn run_analysis(
        &self,
        ticket: AnalysisTicket,
    ) -> Result<Arc<DatabaseSummary>, WorkspaceError> {
        let summary = self.connection.run_analysis(ticket).await?;
        self.lock().toggle = ViewToggle::Overview;
        Ok(summary)
    }

    pub async fn analyze(&self) -> Result<Arc<DatabaseSummary>, WorkspaceError> {
        let ticket = self.begin_analysis()?;
        self.run_analysis(ticket).await
    }

    // -------------------------------------------------------------------------
    // Conversation
    // -------------------------------------------------------------------------

    /// Send a chat message and wait for its report. An accepted message
    /// brings the conversation to the front.
    pub async fn send(&self, text: &str) -> Result<TurnOutcome, WorkspaceError> {
        let summary = self.connection.summary().ok_or(WorkspaceError::NotReady)?;
        let turn = {
            let mut state = self.lock();
            let turn = state.session.begin_send(text)?;
            state.toggle = ViewToggle::Chat;
            turn
        };

        let mut guard = TurnGuard {
            state: &self.state,
            epoch: turn.epoch(),
            settled: false,
        };
        let result = self.generator.generate_report(turn.text(), &summary).await;

        let mut state = self.lock();
        guard.settled = true;
        let WorkspaceState {
            session,
            reports,
            activities,
            flags,
            ..
        } = &mut *state;
        let outcome = session.finish_send(turn, result, reports, activities)?;
        if outcome != TurnOutcome::Discarded {
            flags.collapse();
        }
        Ok(outcome)
    }

    pub fn new_chat(&self) {
        let mut state = self.lock();
        state.session.start(&self.settings.new_chat_greeting);
        state.reports.clear_open();
        state.toggle = ViewToggle::Chat;
        state.flags.collapse();
        debug!("New chat started");
    }

    pub fn select_activity(&self, activity_id: Uuid) -> Result<(), WorkspaceError> {
        let mut state = self.lock();
        let activity = state
            .activities
            .find(activity_id)
            .cloned()
            .ok_or(WorkspaceError::ActivityNotFound(activity_id))?;
        let WorkspaceState {
            session, reports, ..
        } = &mut *state;
        session.resume_from(&activity, reports)?;
        state.toggle = ViewToggle::Chat;
        state.flags.collapse();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // View
    // -------------------------------------------------------------------------

    /// Switch to the overview. Without a summary this is a no-op.
    pub fn show_overview(&self) -> View {
        if self.connection.summary().is_some() {
            self.lock().toggle = ViewToggle::Overview;
        }
        self.view()
    }

    pub fn show_chat(&self) -> View {
        self.lock().toggle = ViewToggle::Chat;
        self.view()
    }

    pub fn flags(&self) -> ViewFlags {
        self.lock().flags
    }

    pub fn set_flags(&self, flags: ViewFlags) {
        self.lock().flags = flags;
    }

    // -------------------------------------------------------------------------
    // Reports and activities
    // -------------------------------------------------------------------------

    pub fn activate_report(&self, id: &ReportId) -> Result<(), WorkspaceError> {
        self.lock().reports.activate(id)
    }

    pub fn close_report(&self, id: &ReportId) -> Result<(), WorkspaceError> {
        self.lock().reports.close(id)
    }

    /// Look up any report generated in this workspace, open or not.
    pub fn report(&self, id: &ReportId) -> Result<Report, WorkspaceError> {
        self.lock()
            .reports
            .get(id)
            .cloned()
            .ok_or_else(|| WorkspaceError::ReportNotFound(id.clone()))
    }

    /// Open reports in tab order and the active id.
    pub fn open_reports(&self) -> (Vec<Report>, Option<ReportId>) {
        let state = self.lock();
        (
            state.reports.open_reports().cloned().collect(),
            state.reports.active_id().cloned(),
        )
    }

    pub fn activities(&self) -> Vec<Activity> {
        self.lock().activities.entries().cloned().collect()
    }

    pub fn transcript(&self) -> Vec<Message> {
        self.lock().session.transcript().to_vec()
    }

    pub fn is_pending(&self) -> bool {
        self.lock().session.is_pending()
    }

    /// Whether a chat turn, a save or an analysis is still in flight.
    pub fn is_busy(&self) -> bool {
        self.is_pending() || self.connection.is_analyzing() || self.connection.is_saving()
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        let connection = self.connection.state();
        let state = self.lock();
        let view = present(
            &connection,
            state.session.is_pending(),
            state.toggle,
            state.flags.config_dialog_open,
        );
        WorkspaceSnapshot {
            view,
            connection,
            transcript: state.session.transcript().to_vec(),
            open_reports: state.reports.open_reports().cloned().collect(),
            active_report_id: state.reports.active_id().cloned(),
            activities: state.activities.entries().cloned().collect(),
            current_activity_id: state.session.activity_id(),
            pending: state.session.is_pending(),
            toggle: state.toggle,
            flags: state.flags,
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorkspaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Frees the session's pending slot if a `send` future is dropped before
/// the generator answers.
struct TurnGuard<'a> {
    state: &'a Mutex<WorkspaceState>,
    epoch: u64,
    settled: bool,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!("Chat turn dropped before completion");
            self.state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .session
                .abandon(self.epoch);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
