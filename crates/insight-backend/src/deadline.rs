use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use insight_core::types::{ConnectionConfig, DatabaseSummary, Report};
use insight_workspace::{CollaboratorError, DatabaseAnalyzer, ReportGenerator};

/// Bounds an engine collaborator with a timeout. Expiry surfaces as
/// [`CollaboratorError::Timeout`], so the workspace treats it like any
/// other collaborator failure.
#[derive(Debug, Clone)]
pub struct Deadline<T> {
    inner: T,
    limit: Duration,
}

impl<T> Deadline<T> {
    pub fn new(inner: T, limit: Duration) -> Self {
        Self { inner, limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

#[async_trait]
impl<T: DatabaseAnalyzer> DatabaseAnalyzer for Deadline<T> {
    async fn analyze_database(
        &self,
        config: &ConnectionConfig,
    ) -> Result<DatabaseSummary, CollaboratorError> {
        match tokio::time::timeout(self.limit, self.inner.analyze_database(config)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(limit = ?self.limit, "Database analysis timed out");
                Err(CollaboratorError::Timeout(self.limit))
            }
        }
    }
}

#[async_trait]
impl<T: ReportGenerator> ReportGenerator for Deadline<T> {
    async fn generate_report(
        &self,
        user_text: &str,
        summary: &DatabaseSummary,
    ) -> Result<Report, CollaboratorError> {
        match tokio::time::timeout(self.limit, self.inner.generate_report(user_text, summary)).await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(limit = ?self.limit, "Report generation timed out");
                Err(CollaboratorError::Timeout(self.limit))
            }
        }
    }
}
