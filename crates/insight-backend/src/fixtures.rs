//! Built-in stand-in for the analysis and report engines.
//!
//! Returns a fixed three-table schema and a sample product report, with
//! optional simulated latency. Swap in a real engine by implementing the
//! workspace ports.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use insight_core::types::{
    ColumnDescriptor, ConnectionConfig, DatabaseStats, DatabaseSummary, Report, ReportBody,
    ReportId, TableData, TableDescriptor,
};
use insight_workspace::{CollaboratorError, DatabaseAnalyzer, ReportGenerator};

const DATABASE_SIZE: &str = "2.4 GB";

const SUGGESTED_QUERIES: [&str; 4] = [
    "Show me total revenue by month",
    "What are the top 10 best-selling products?",
    "How many new users signed up this week?",
    "Show me order trends over the last quarter",
];

fn table(name: &str, row_count: u64, description: &str, columns: &[(&str, &str)]) -> TableDescriptor {
    TableDescriptor {
        name: name.to_string(),
        row_count,
        description: description.to_string(),
        columns: columns
            .iter()
            .map(|(name, ty)| ColumnDescriptor::new(*name, *ty))
            .collect(),
    }
}

fn fixture_tables() -> Vec<TableDescriptor> {
    vec![
        table(
            "users",
            1234,
            "User accounts and profile information",
            &[
                ("id", "uuid"),
                ("email", "varchar"),
                ("name", "varchar"),
                ("created_at", "timestamp"),
            ],
        ),
        table(
            "orders",
            15234,
            "Customer orders and transactions",
            &[
                ("id", "uuid"),
                ("user_id", "uuid"),
                ("total", "decimal"),
                ("status", "varchar"),
                ("created_at", "timestamp"),
            ],
        ),
        table(
            "products",
            567,
            "Product catalog and inventory",
            &[
                ("id", "uuid"),
                ("name", "varchar"),
                ("price", "decimal"),
                ("stock", "integer"),
            ],
        ),
    ]
}

/// Format with thousands separators: `17035` -> `"17,035"`.
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn summarize(tables: Vec<TableDescriptor>) -> DatabaseSummary {
    let stats = DatabaseStats::from_tables(&tables, DATABASE_SIZE);
    let mut insights = vec![format!(
        "Your database contains {} tables with a total of {} rows",
        stats.table_count,
        group_thousands(stats.row_count)
    )];
    if let Some(largest) = tables.iter().max_by_key(|t| t.row_count) {
        insights.push(format!(
            "The largest table is \"{}\" with {} rows",
            largest.name,
            group_thousands(largest.row_count)
        ));
    }
    insights.push("Database is well-structured with proper foreign key relationships".to_string());

    DatabaseSummary {
        stats,
        tables,
        insights,
        suggested_queries: SUGGESTED_QUERIES.iter().map(|q| q.to_string()).collect(),
    }
}

async fn simulate(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixtureAnalyzer {
    delay: Duration,
}

impl FixtureAnalyzer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl DatabaseAnalyzer for FixtureAnalyzer {
    async fn analyze_database(
        &self,
        _config: &ConnectionConfig,
    ) -> Result<DatabaseSummary, CollaboratorError> {
        simulate(self.delay).await;
        let summary = summarize(fixture_tables());
        debug!(tables = summary.stats.table_count, "Fixture analysis produced");
        Ok(summary)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixtureReportGenerator {
    delay: Duration,
}

impl FixtureReportGenerator {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

fn sales_table() -> TableData {
    let row = |cells: [&str; 4]| cells.iter().map(|c| c.to_string()).collect::<Vec<_>>();
    TableData {
        columns: row(["Product", "Revenue", "Units Sold", "Growth"]),
        rows: vec![
            row(["Product A", "$45,230", "1,234", "+12%"]),
            row(["Product B", "$38,920", "987", "+8%"]),
            row(["Product C", "$52,100", "1,456", "+15%"]),
            row(["Product D", "$29,840", "745", "-3%"]),
        ],
    }
}

#[async_trait]
impl ReportGenerator for FixtureReportGenerator {
    async fn generate_report(
        &self,
        user_text: &str,
        _summary: &DatabaseSummary,
    ) -> Result<Report, CollaboratorError> {
        simulate(self.delay).await;
        let id = ReportId::generate();
        let (title, body) = if user_text.to_lowercase().contains("chart") {
            (
                "Sales Chart",
                ReportBody::Chart {
                    image_ref: format!("chart://{}", id),
                    data: Some(sales_table()),
                },
            )
        } else {
            ("Sales Analysis Report", ReportBody::Table(sales_table()))
        };

        Ok(Report {
            id,
            title: title.to_string(),
            body,
            insights: vec![
                "Product C shows highest growth at 15%".to_string(),
                "Overall revenue up 8% compared to previous period".to_string(),
                "Product D requires attention due to negative growth".to_string(),
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::types::ReportKind;

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(567), "567");
        assert_eq!(group_thousands(1234), "1,234");
        assert_eq!(group_thousands(17035), "17,035");
        assert_eq!(group_thousands(1_000_000), "1,000,000");
    }

    #[tokio::test]
    async fn test_fixture_summary() {
        let summary = FixtureAnalyzer::default()
            .analyze_database(&ConnectionConfig::new("postgresql://h/db"))
            .await
            .unwrap();
        assert_eq!(summary.stats.table_count, 3);
        assert_eq!(summary.stats.row_count, 17_035);
        assert_eq!(summary.stats.column_count, 13);
        assert_eq!(summary.stats.size, "2.4 GB");
        assert_eq!(summary.table("orders").map(|t| t.columns.len()), Some(5));
        assert_eq!(summary.suggested_queries.len(), 4);
        assert_eq!(
            summary.insights[0],
            "Your database contains 3 tables with a total of 17,035 rows"
        );
        assert_eq!(
            summary.insights[1],
            "The largest table is \"orders\" with 15,234 rows"
        );
    }

    #[tokio::test]
    async fn test_chart_request_yields_chart() {
        let summary = summarize(fixture_tables());
        let report = FixtureReportGenerator::default()
            .generate_report("Show me a chart of sales", &summary)
            .await
            .unwrap();
        assert_eq!(report.kind(), ReportKind::Chart);
        assert_eq!(report.title, "Sales Chart");
        assert_eq!(report.insights.len(), 3);
    }

    #[tokio::test]
    async fn test_other_request_yields_table_with_unique_ids() {
        let summary = summarize(fixture_tables());
        let generator = FixtureReportGenerator::default();
        let a = generator.generate_report("Top products", &summary).await.unwrap();
        let b = generator.generate_report("Top products", &summary).await.unwrap();
        assert_eq!(a.kind(), ReportKind::Table);
        assert_eq!(a.title, "Sales Analysis Report");
        assert_ne!(a.id, b.id);
        match a.body {
            ReportBody::Table(data) => {
                assert_eq!(data.columns.len(), 4);
                assert_eq!(data.rows.len(), 4);
                assert_eq!(data.rows[2][0], "Product C");
            }
            other => panic!("expected table body, got {:?}", other),
        }
    }
}
