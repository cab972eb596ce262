//! Append-only history of conversation threads.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use insight_core::types::{Activity, ReportId};

use crate::error::WorkspaceError;

/// Activities in insertion order. There is no delete.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    entries: Vec<Activity>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new activity. The title is trimmed and must not be empty.
    pub fn record(
        &mut self,
        title: &str,
        report_id: Option<ReportId>,
    ) -> Result<Activity, WorkspaceError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(WorkspaceError::validation("activity title cannot be empty"));
        }
        let activity = Activity {
            id: Uuid::new_v4(),
            title: title.to_string(),
            created_at: Utc::now(),
            report_id,
        };
        debug!(activity = %activity.id, "Activity recorded");
        self.entries.push(activity.clone());
        Ok(activity)
    }

    /// Link a report to an activity. Allowed once per activity.
    pub fn attach_report(
        &mut self,
        activity_id: Uuid,
        report_id: ReportId,
    ) -> Result<(), WorkspaceError> {
        let activity = self
            .entries
            .iter_mut()
            .find(|a| a.id == activity_id)
            .ok_or(WorkspaceError::ActivityNotFound(activity_id))?;
        if activity.report_id.is_some() {
            return Err(WorkspaceError::ReportAlreadyAttached(activity_id));
        }
        activity.report_id = Some(report_id);
        Ok(())
    }

    pub fn find(&self, activity_id: Uuid) -> Option<&Activity> {
        self.entries.iter().find(|a| a.id == activity_id)
    }

    /// Most recent first.
    pub fn entries(&self) -> impl Iterator<Item = &Activity> {
        self.entries.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
