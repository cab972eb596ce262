use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ReportId;

/// Events a workspace emits when a long-running operation settles.
///
/// Broadcast to the workspace's SSE subscribers so the dashboard can refresh
/// without polling while an analysis or chat turn is in flight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum WorkspaceEvent {
    /// Database analysis finished and the summary is available.
    AnalysisCompleted {
        table_count: u64,
        row_count: u64,
        timestamp: DateTime<Utc>,
    },

    /// Database analysis failed; the connection is now `Failed`.
    AnalysisFailed {
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A chat turn produced a report.
    TurnCompleted {
        report_id: ReportId,
        activity_id: Uuid,
        created_activity: bool,
        timestamp: DateTime<Utc>,
    },

    /// A chat turn failed; an error reply was added to the transcript.
    TurnFailed {
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl WorkspaceEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            WorkspaceEvent::AnalysisCompleted { timestamp, .. }
            | WorkspaceEvent::AnalysisFailed { timestamp, .. }
            | WorkspaceEvent::TurnCompleted { timestamp, .. }
            | WorkspaceEvent::TurnFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Name used as the SSE `event:` field.
    pub fn event_name(&self) -> &'static str {
        match self {
            WorkspaceEvent::AnalysisCompleted { .. } => "analysis_completed",
            WorkspaceEvent::AnalysisFailed { .. } => "analysis_failed",
            WorkspaceEvent::TurnCompleted { .. } => "turn_completed",
            WorkspaceEvent::TurnFailed { .. } => "turn_failed",
        }
    }
}
