//! Conversational analytics workspace.
//!
//! Tracks the database connection lifecycle, turns chat messages into
//! report artifacts, and manages the tabbed report canvas linked to a
//! history of activities. External systems are reached only through the
//! ports in [`collaborators`].

pub mod activity;
pub mod collaborators;
pub mod connection;
pub mod controller;
pub mod error;
pub mod reports;
pub mod session;

#[cfg(test)]
mod test_support;

pub use activity::ActivityLog;
pub use collaborators::{
    Collaborators, ConfigStore, ConnectionProbe, DatabaseAnalyzer, ReportGenerator,
};
pub use connection::{AnalysisTicket, ConnectionLifecycle, ConnectionState};
pub use controller::{
    present, View, ViewFlags, ViewToggle, WorkspaceController, WorkspaceSettings,
    WorkspaceSnapshot,
};
pub use error::{CollaboratorError, WorkspaceError};
pub use reports::ReportStore;
pub use session::{ConversationSession, PendingTurn, TurnOutcome, REPORT_ACKNOWLEDGEMENT};
