//! A single chat thread: transcript, pending turn, and attribution of the
//! generated report to an activity.

use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use insight_core::types::{Activity, Message, Report, ReportId};

use crate::activity::ActivityLog;
use crate::error::{CollaboratorError, WorkspaceError};
use crate::reports::ReportStore;

/// Assistant reply appended after a report is generated.
pub const REPORT_ACKNOWLEDGEMENT: &str = "I have generated the report based on your query. \
     The results are displayed in the canvas on the right.";

/// A turn accepted by [`ConversationSession::begin_send`] whose report is
/// still being generated.
#[derive(Debug)]
pub struct PendingTurn {
    epoch: u64,
    text: String,
    started: Instant,
}

impl PendingTurn {
    /// The trimmed user message.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// A report was opened and attributed to `activity_id`.
    Completed {
        report_id: ReportId,
        activity_id: Uuid,
        created_activity: bool,
    },
    /// The generator failed; an error reply was appended.
    Failed { reason: String },
    /// The session moved on before the turn finished; the result was
    /// dropped.
    Discarded,
}

#[derive(Debug, Clone)]
pub struct ConversationSession {
    transcript: Vec<Message>,
    activity_id: Option<Uuid>,
    pending: Option<u64>,
    next_epoch: u64,
    archive: HashMap<Uuid, Vec<Message>>,
    max_message_length: usize,
}

impl ConversationSession {
    pub fn new(greeting: &str, max_message_length: usize) -> Self {
        Self {
            transcript: vec![Message::assistant(greeting)],
            activity_id: None,
            pending: None,
            next_epoch: 0,
            archive: HashMap::new(),
            max_message_length,
        }
    }

    /// Reset to a fresh thread with a single greeting. The next turn
    /// creates a new activity.
    pub fn start(&mut self, greeting: &str) {
        self.detach();
        self.transcript = vec![Message::assistant(greeting)];
        self.activity_id = None;
    }

    /// Continue an existing activity and bring its report forward.
    pub fn resume_from(
        &mut self,
        activity: &Activity,
        reports: &mut ReportStore,
    ) -> Result<(), WorkspaceError> {
        if let Some(report_id) = &activity.report_id {
            if reports.get(report_id).is_none() {
                return Err(WorkspaceError::ReportNotFound(report_id.clone()));
            }
        }

        if self.activity_id != Some(activity.id) {
            self.detach();
            if let Some(transcript) = self.archive.get(&activity.id) {
                self.transcript = transcript.clone();
            }
            self.activity_id = Some(activity.id);
        }

        if let Some(report_id) = &activity.report_id {
            reports.reopen(report_id)?;
        }
        debug!(activity = %activity.id, "Resumed activity");
        Ok(())
    }

    /// Validate and record the user message, then mark the session pending.
    pub fn begin_send(&mut self, text: &str) -> Result<PendingTurn, WorkspaceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(WorkspaceError::validation("message cannot be empty"));
        }
        if text.chars().count() > self.max_message_length {
            return Err(WorkspaceError::validation(format!(
                "message exceeds {} characters",
                self.max_message_length
            )));
        }
        if self.pending.is_some() {
            return Err(WorkspaceError::Busy { operation: "send" });
        }

        self.transcript.push(Message::user(text));
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        self.pending = Some(epoch);
        Ok(PendingTurn {
            epoch,
            text: text.to_string(),
            started: Instant::now(),
        })
    }

    /// Apply the generator's result for `turn`.
    ///
    /// On success exactly one of two things happens: a new activity is
    /// recorded, or the session's existing activity is used.
    pub fn finish_send(
        &mut self,
        turn: PendingTurn,
        result: Result<Report, CollaboratorError>,
        reports: &mut ReportStore,
        activities: &mut ActivityLog,
    ) -> Result<TurnOutcome, WorkspaceError> {
        if self.pending != Some(turn.epoch) {
            debug!("Dropping result of a detached turn");
            return Ok(TurnOutcome::Discarded);
        }
        self.pending = None;
        let elapsed_ms = u64::try_from(turn.started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Report generation failed");
                self.transcript.push(
                    Message::assistant(format!("Sorry, I couldn't generate that report: {}", e))
                        .with_execution_time(elapsed_ms),
                );
                return Ok(TurnOutcome::Failed {
                    reason: e.to_string(),
                });
            }
        };

        let report_id = report.id.clone();
        let (activity_id, created_activity) = match self.activity_id {
            Some(id) => {
                let activity = activities
                    .find(id)
                    .ok_or(WorkspaceError::ActivityNotFound(id))?;
                if activity.report_id.is_none() {
                    activities.attach_report(id, report_id.clone())?;
                }
                (id, false)
            }
            None => {
                let activity = activities.record(&turn.text, Some(report_id.clone()))?;
                self.activity_id = Some(activity.id);
                (activity.id, true)
            }
        };

        reports.open(report);
        self.transcript
            .push(Message::assistant(REPORT_ACKNOWLEDGEMENT).with_execution_time(elapsed_ms));
        debug!(report = %report_id, activity = %activity_id, created_activity, "Turn completed");

        Ok(TurnOutcome::Completed {
            report_id,
            activity_id,
            created_activity,
        })
    }

    /// Release the pending slot of a turn whose result will never arrive.
    pub(crate) fn abandon(&mut self, epoch: u64) {
        if self.pending == Some(epoch) {
            warn!("Pending turn abandoned before completion");
            self.pending = None;
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn activity_id(&self) -> Option<Uuid> {
        self.activity_id
    }

    fn detach(&mut self) {
        if let Some(id) = self.activity_id {
            self.archive.insert(id, self.transcript.clone());
        }
        if self.pending.take().is_some() {
            debug!("Detached pending turn");
        }
    }
}
