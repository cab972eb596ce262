//! Error types for the workspace core.

use std::time::Duration;

use insight_core::error::InsightError;
use insight_core::types::ReportId;
use uuid::Uuid;

/// Failures reported by an external collaborator (user store, analysis
/// engine, report engine).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("persistence failed: {0}")]
    Persistence(String),
    #[error("analysis failed: {0}")]
    Analysis(String),
    #[error("report generation failed: {0}")]
    Generation(String),
    #[error("collaborator timed out after {0:?}")]
    Timeout(Duration),
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Errors from workspace operations.
///
/// None of these are fatal: each leaves the workspace in a stable state from
/// which a later user action can recover.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkspaceError {
    /// Rejected input; no state was changed.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A single-flight operation is already outstanding.
    #[error("{operation} already in progress")]
    Busy { operation: &'static str },
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    #[error("database is not ready")]
    NotReady,
    #[error("report not open: {0}")]
    ReportNotOpen(ReportId),
    #[error("report not found: {0}")]
    ReportNotFound(ReportId),
    #[error("activity not found: {0}")]
    ActivityNotFound(Uuid),
    #[error("activity {0} already has a report attached")]
    ReportAlreadyAttached(Uuid),
    #[error("invalid connection transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

impl WorkspaceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        WorkspaceError::Validation(msg.into())
    }

    /// Whether this is a concurrency rejection rather than a failure.
    pub fn is_busy(&self) -> bool {
        matches!(self, WorkspaceError::Busy { .. })
    }
}

impl From<WorkspaceError> for InsightError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::Collaborator(e) => InsightError::Backend(e.to_string()),
            other => InsightError::Api(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_error_display() {
        let err = WorkspaceError::validation("message cannot be empty");
        assert_eq!(err.to_string(), "validation failed: message cannot be empty");

        let err = WorkspaceError::Busy {
            operation: "analysis",
        };
        assert_eq!(err.to_string(), "analysis already in progress");

        let err = WorkspaceError::NotReady;
        assert_eq!(err.to_string(), "database is not ready");

        let err = WorkspaceError::ReportNotOpen(ReportId::new("r9"));
        assert_eq!(err.to_string(), "report not open: r9");

        let err = WorkspaceError::InvalidTransition {
            from: "Unconfigured",
            to: "Analyzing",
        };
        assert_eq!(
            err.to_string(),
            "invalid connection transition: Unconfigured -> Analyzing"
        );
    }

    #[test]
    fn test_collaborator_error_is_transparent() {
        let err: WorkspaceError = CollaboratorError::Analysis("schema locked".into()).into();
        assert_eq!(err.to_string(), "analysis failed: schema locked");
        assert!(!err.is_busy());
    }

    #[test]
    fn test_busy_is_distinct_from_collaborator_failure() {
        let busy = WorkspaceError::Busy { operation: "send" };
        let failed: WorkspaceError = CollaboratorError::Generation("boom".into()).into();
        assert!(busy.is_busy());
        assert!(!failed.is_busy());
    }

    #[test]
    fn test_timeout_display() {
        let err = CollaboratorError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "collaborator timed out after 5s");
    }

    #[test]
    fn test_into_insight_error() {
        let err: InsightError = WorkspaceError::from(CollaboratorError::Persistence(
            "503".into(),
        ))
        .into();
        assert!(matches!(err, InsightError::Backend(_)));

        let err: InsightError = WorkspaceError::NotReady.into();
        assert!(matches!(err, InsightError::Api(_)));
    }
}
