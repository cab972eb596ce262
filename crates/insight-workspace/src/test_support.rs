//! Scripted collaborator doubles shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use insight_core::types::{
    ColumnDescriptor, ConnectionConfig, DatabaseStats, DatabaseSummary, Identity, ProbeResult,
    Report, ReportBody, ReportId, TableData, TableDescriptor,
};

use crate::collaborators::{
    Collaborators, ConfigStore, ConnectionProbe, DatabaseAnalyzer, ReportGenerator,
};
use crate::error::CollaboratorError;

pub fn sample_summary() -> DatabaseSummary {
    let table = |name: &str, rows: u64, cols: &[&str]| TableDescriptor {
        name: name.to_string(),
        row_count: rows,
        description: format!("{} table", name),
        columns: cols
            .iter()
            .map(|c| ColumnDescriptor::new(*c, "text"))
            .collect(),
    };
    let tables = vec![
        table("users", 1234, &["id", "email", "name", "created_at"]),
        table("orders", 15234, &["id", "user_id", "total", "status", "created_at"]),
        table("products", 567, &["id", "name", "price", "stock"]),
    ];
    DatabaseSummary {
        stats: DatabaseStats::from_tables(&tables, "2.4 GB"),
        tables,
        insights: vec!["Orders grew steadily".to_string()],
        suggested_queries: vec!["Show me total revenue by month".to_string()],
    }
}

pub fn sample_report(id: &str) -> Report {
    Report {
        id: ReportId::new(id),
        title: format!("Report {}", id),
        body: ReportBody::Table(TableData {
            columns: vec!["Product".to_string(), "Revenue".to_string()],
            rows: vec![vec!["Product A".to_string(), "$45,230".to_string()]],
        }),
        insights: vec![],
    }
}

pub fn collaborators(
    store: MemoryStore,
    probe: StaticProbe,
    analyzer: ScriptedAnalyzer,
) -> Collaborators {
    collaborators_with(store, probe, analyzer, ScriptedGenerator::new())
}

pub fn collaborators_with(
    store: MemoryStore,
    probe: StaticProbe,
    analyzer: ScriptedAnalyzer,
    generator: ScriptedGenerator,
) -> Collaborators {
    Collaborators {
        store: Arc::new(store),
        probe: Arc::new(probe),
        analyzer: Arc::new(analyzer),
        generator: Arc::new(generator),
    }
}

async fn pass_gate(gate: &Option<Semaphore>) -> Result<(), CollaboratorError> {
    if let Some(gate) = gate {
        gate.acquire()
            .await
            .map_err(|_| CollaboratorError::Unavailable("gate closed".to_string()))?
            .forget();
    }
    Ok(())
}

// =============================================================================
// Config store
// =============================================================================

#[derive(Default)]
struct MemoryStoreInner {
    configs: Mutex<HashMap<String, ConnectionConfig>>,
    synced: Mutex<Vec<String>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
    save_gate: Option<Semaphore>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(self, email: &str, config: ConnectionConfig) -> Self {
        self.inner
            .configs
            .lock()
            .unwrap()
            .insert(email.to_string(), config);
        self
    }

    pub fn failing_saves(self) -> Self {
        self.inner.fail_saves.store(true, Ordering::SeqCst);
        self
    }

    /// Every save waits for a [`release_save`](Self::release_save) permit.
    pub fn gated_saves() -> Self {
        Self {
            inner: Arc::new(MemoryStoreInner {
                save_gate: Some(Semaphore::new(0)),
                ..Default::default()
            }),
        }
    }

    pub fn release_save(&self) {
        if let Some(gate) = &self.inner.save_gate {
            gate.add_permits(1);
        }
    }

    pub fn failing_loads(self) -> Self {
        self.inner.fail_loads.store(true, Ordering::SeqCst);
        self
    }

    pub fn stored(&self, email: &str) -> Option<ConnectionConfig> {
        self.inner.configs.lock().unwrap().get(email).cloned()
    }

    pub fn save_count(&self) -> usize {
        self.inner.saves.load(Ordering::SeqCst)
    }

    pub fn synced_users(&self) -> Vec<String> {
        self.inner.synced.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn load_connection_config(
        &self,
        identity: &Identity,
    ) -> Result<Option<ConnectionConfig>, CollaboratorError> {
        if self.inner.fail_loads.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Persistence("store offline".to_string()));
        }
        Ok(self.stored(&identity.email))
    }

    async fn save_connection_config(
        &self,
        identity: &Identity,
        config: &ConnectionConfig,
    ) -> Result<(), CollaboratorError> {
        if self.inner.fail_saves.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Persistence("store offline".to_string()));
        }
        pass_gate(&self.inner.save_gate).await?;
        self.inner.saves.fetch_add(1, Ordering::SeqCst);
        self.inner
            .configs
            .lock()
            .unwrap()
            .insert(identity.email.clone(), config.clone());
        Ok(())
    }

    async fn sync_user(&self, identity: &Identity) -> Result<(), CollaboratorError> {
        self.inner
            .synced
            .lock()
            .unwrap()
            .push(identity.email.clone());
        Ok(())
    }
}

// =============================================================================
// Probe
// =============================================================================

pub struct StaticProbe {
    result: ProbeResult,
    delay: Option<Duration>,
}

impl StaticProbe {
    pub fn ok() -> Self {
        Self {
            result: ProbeResult::ok("Connection successful!"),
            delay: None,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            result: ProbeResult::ok("Connection successful!"),
            delay: Some(delay),
        }
    }
}

#[async_trait]
impl ConnectionProbe for StaticProbe {
    async fn test_connection(&self, _config: &ConnectionConfig) -> ProbeResult {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}

// =============================================================================
// Analyzer
// =============================================================================

#[derive(Default)]
struct AnalyzerInner {
    results: Mutex<VecDeque<Result<DatabaseSummary, CollaboratorError>>>,
    calls: AtomicUsize,
    gate: Option<Semaphore>,
}

/// Returns queued results in order, then [`sample_summary`].
#[derive(Clone, Default)]
pub struct ScriptedAnalyzer {
    inner: Arc<AnalyzerInner>,
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call waits for a [`release`](Self::release) permit.
    pub fn gated() -> Self {
        Self {
            inner: Arc::new(AnalyzerInner {
                gate: Some(Semaphore::new(0)),
                ..Default::default()
            }),
        }
    }

    pub fn push_result(&self, result: Result<DatabaseSummary, CollaboratorError>) {
        self.inner.results.lock().unwrap().push_back(result);
    }

    pub fn release(&self) {
        if let Some(gate) = &self.inner.gate {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseAnalyzer for ScriptedAnalyzer {
    async fn analyze_database(
        &self,
        _config: &ConnectionConfig,
    ) -> Result<DatabaseSummary, CollaboratorError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        pass_gate(&self.inner.gate).await?;
        let next = self.inner.results.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(sample_summary()))
    }
}

// =============================================================================
// Report generator
// =============================================================================

#[derive(Default)]
struct GeneratorInner {
    results: Mutex<VecDeque<Result<Report, CollaboratorError>>>,
    requests: Mutex<Vec<String>>,
    gate: Option<Semaphore>,
}

/// Returns queued results in order, then a table report with id
/// `report-{n}`.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    inner: Arc<GeneratorInner>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            inner: Arc::new(GeneratorInner {
                gate: Some(Semaphore::new(0)),
                ..Default::default()
            }),
        }
    }

    pub fn push_result(&self, result: Result<Report, CollaboratorError>) {
        self.inner.results.lock().unwrap().push_back(result);
    }

    pub fn release(&self) {
        if let Some(gate) = &self.inner.gate {
            gate.add_permits(1);
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.inner.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportGenerator for ScriptedGenerator {
    async fn generate_report(
        &self,
        user_text: &str,
        _summary: &DatabaseSummary,
    ) -> Result<Report, CollaboratorError> {
        let n = {
            let mut requests = self.inner.requests.lock().unwrap();
            requests.push(user_text.to_string());
            requests.len()
        };
        pass_gate(&self.inner.gate).await?;
        let next = self.inner.results.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(sample_report(&format!("report-{}", n))))
    }
}
