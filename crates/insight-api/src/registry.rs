//! One workspace per identity, opened lazily on first request.
//!
//! Anonymous workspaces are dropped once they sit idle; a later request
//! with the same session header opens a fresh one.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{broadcast, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use insight_core::events::WorkspaceEvent;
use insight_core::types::Identity;
use insight_workspace::{
    AnalysisTicket, Collaborators, TurnOutcome, WorkspaceController, WorkspaceError,
    WorkspaceSettings,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Key a workspace is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkspaceKey {
    /// Authenticated user, by email.
    User(String),
    /// Anonymous browser session; nothing is persisted.
    Anonymous(String),
}

impl fmt::Display for WorkspaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkspaceKey::User(email) => write!(f, "user:{}", email),
            WorkspaceKey::Anonymous(session) => write!(f, "anon:{}", session),
        }
    }
}

/// A live workspace and its event channel.
pub struct WorkspaceHandle {
    pub key: WorkspaceKey,
    pub controller: WorkspaceController,
    events: broadcast::Sender<WorkspaceEvent>,
    last_access: Mutex<Instant>,
}

impl WorkspaceHandle {
    fn new(key: WorkspaceKey, controller: WorkspaceController) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            key,
            controller,
            events,
            last_access: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self
            .last_access
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_access
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    /// Idle for at least `max_idle` with nothing holding or watching it.
    fn is_evictable(self: &Arc<Self>, max_idle: Duration) -> bool {
        Arc::strong_count(self) == 1
            && self.events.receiver_count() == 0
            && !self.controller.is_busy()
            && self.idle_for() >= max_idle
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.events.subscribe()
    }

    pub fn publish(&self, event: WorkspaceEvent) {
        debug!(workspace = %self.key, event = event.event_name(), "Publishing event");
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Run an analysis in the background and publish its outcome.
    pub fn spawn_analysis(self: &Arc<Self>, ticket: AnalysisTicket) -> JoinHandle<()> {
        let handle = Arc::clone(self);
        tokio::spawn(async move {
            let event = match handle.controller.run_analysis(ticket).await {
                Ok(summary) => WorkspaceEvent::AnalysisCompleted {
                    table_count: summary.stats.table_count,
                    row_count: summary.stats.row_count,
                    timestamp: Utc::now(),
                },
                Err(e) => WorkspaceEvent::AnalysisFailed {
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                },
            };
            handle.publish(event);
        })
    }

    /// Run a chat turn to completion on its own task so a dropped request
    /// cannot strand it, then publish its outcome.
    pub async fn send(self: &Arc<Self>, text: String) -> Result<TurnOutcome, WorkspaceError> {
        let handle = Arc::clone(self);
        let task = tokio::spawn(async move {
            let outcome = handle.controller.send(&text).await?;
            match &outcome {
                TurnOutcome::Completed {
                    report_id,
                    activity_id,
                    created_activity,
                } => handle.publish(WorkspaceEvent::TurnCompleted {
                    report_id: report_id.clone(),
                    activity_id: *activity_id,
                    created_activity: *created_activity,
                    timestamp: Utc::now(),
                }),
                TurnOutcome::Failed { reason } => handle.publish(WorkspaceEvent::TurnFailed {
                    reason: reason.clone(),
                    timestamp: Utc::now(),
                }),
                TurnOutcome::Discarded => {}
            }
            Ok::<_, WorkspaceError>(outcome)
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                warn!(workspace = %self.key, error = %e, "Chat turn task failed");
                Ok(TurnOutcome::Failed {
                    reason: "chat turn was interrupted".to_string(),
                })
            }
        }
    }
}

type Slot = Arc<OnceCell<Arc<WorkspaceHandle>>>;

/// Opens and caches workspaces by key.
pub struct WorkspaceRegistry {
    workspaces: Mutex<HashMap<WorkspaceKey, Slot>>,
    collaborators: Collaborators,
    settings: WorkspaceSettings,
}

impl WorkspaceRegistry {
    pub fn new(collaborators: Collaborators, settings: WorkspaceSettings) -> Self {
        Self {
            workspaces: Mutex::new(HashMap::new()),
            collaborators,
            settings,
        }
    }

    /// Return the workspace for `key`, opening it on first use.
    ///
    /// Concurrent first requests for the same key open it once. A stored
    /// connection found while opening is analyzed in the background.
    pub async fn get_or_open(
        &self,
        key: WorkspaceKey,
        identity: Option<Identity>,
    ) -> Arc<WorkspaceHandle> {
        let slot: Slot = {
            let mut workspaces = self
                .workspaces
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(workspaces.entry(key.clone()).or_default())
        };

        let handle = slot
            .get_or_init(|| async {
                let (controller, ticket) = WorkspaceController::open(
                    identity,
                    self.collaborators.clone(),
                    self.settings.clone(),
                )
                .await;
                info!(workspace = %key, "Workspace opened");
                let handle = Arc::new(WorkspaceHandle::new(key.clone(), controller));
                if let Some(ticket) = ticket {
                    handle.spawn_analysis(ticket);
                }
                handle
            })
            .await;
        handle.touch();
        Arc::clone(handle)
    }

    /// Drop anonymous workspaces idle for at least `max_idle`. Returns the
    /// number removed.
    ///
    /// A workspace held by a request, a background task or an event stream
    /// is kept. Authenticated workspaces are never evicted.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut workspaces = self
            .workspaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = workspaces.len();
        workspaces.retain(|key, slot| {
            if !matches!(key, WorkspaceKey::Anonymous(_)) || Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.get() {
                Some(handle) if handle.is_evictable(max_idle) => {
                    debug!(
                        workspace = %key,
                        idle_secs = handle.idle_for().as_secs(),
                        "Evicting idle workspace"
                    );
                    false
                }
                Some(_) => true,
                // Opening was abandoned before it finished
                None => false,
            }
        });
        before - workspaces.len()
    }

    /// Periodically evict idle workspaces until the registry is dropped.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        every: Duration,
        max_idle: Duration,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            info!(
                every_secs = every.as_secs(),
                max_idle_secs = max_idle.as_secs(),
                "Idle workspace sweeper started"
            );
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(registry) = weak.upgrade() else {
                    break;
                };
                let evicted = registry.evict_idle(max_idle);
                if evicted > 0 {
                    info!(evicted, remaining = registry.len(), "Evicted idle workspaces");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.workspaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
