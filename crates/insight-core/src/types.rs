//! Domain types shared across the Insight crates.
//!
//! These mirror the entities a workspace manipulates: the database
//! connection configuration, the analysis summary produced for it, the
//! generated reports shown on the canvas, and the activity/message records
//! that make up a conversation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Identity
// =============================================================================

/// An authenticated user as supplied by the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub email: String,
    pub display_name: String,
}

impl Identity {
    pub fn new(email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: display_name.into(),
        }
    }
}

// =============================================================================
// Connection
// =============================================================================

/// Connection settings for the user's database.
///
/// Replaced wholesale on update; never partially mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub connection_string: String,
}

impl ConnectionConfig {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
        }
    }

    /// Whether the required connection string field is present.
    pub fn is_complete(&self) -> bool {
        !self.connection_string.trim().is_empty()
    }
}

/// Outcome of a side-effect-free connection probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub success: bool,
    pub message: String,
}

impl ProbeResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

// =============================================================================
// Database summary
// =============================================================================

/// Aggregate statistics for an analyzed database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub table_count: u64,
    pub row_count: u64,
    pub column_count: u64,
    /// Human-readable on-disk size, e.g. "2.4 GB".
    pub size: String,
}

impl DatabaseStats {
    /// Derive counts from a set of table descriptors.
    pub fn from_tables(tables: &[TableDescriptor], size: impl Into<String>) -> Self {
        Self {
            table_count: tables.len() as u64,
            row_count: tables.iter().map(|t| t.row_count).sum(),
            column_count: tables.iter().map(|t| t.columns.len() as u64).sum(),
            size: size.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub row_count: u64,
    pub description: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDescriptor>,
}

/// Read-only snapshot produced by the analysis collaborator.
///
/// Always applied atomically: a workspace either has no summary or a
/// complete one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSummary {
    pub stats: DatabaseStats,
    pub tables: Vec<TableDescriptor>,
    pub insights: Vec<String>,
    pub suggested_queries: Vec<String>,
}

impl DatabaseSummary {
    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.name == name)
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Opaque report identifier. Only uniqueness is guaranteed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReportId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Chart,
    Table,
    Text,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Chart => write!(f, "chart"),
            ReportKind::Table => write!(f, "table"),
            ReportKind::Text => write!(f, "text"),
        }
    }
}

/// Tabular data: a header row plus string cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Kind-specific report content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum ReportBody {
    Chart {
        image_ref: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<TableData>,
    },
    Table(TableData),
    Text {
        body: String,
    },
}

/// A generated artifact shown in the workspace canvas. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub title: String,
    #[serde(flatten)]
    pub body: ReportBody,
    #[serde(default)]
    pub insights: Vec<String>,
}

impl Report {
    pub fn kind(&self) -> ReportKind {
        match self.body {
            ReportBody::Chart { .. } => ReportKind::Chart,
            ReportBody::Table(_) => ReportKind::Table,
            ReportBody::Text { .. } => ReportKind::Text,
        }
    }
}

// =============================================================================
// Activities and messages
// =============================================================================

/// One recorded conversation thread, optionally linked to a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<ReportId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    pub execution_time_ms: u64,
}

/// A single transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            metadata: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            metadata: None,
        }
    }

    pub fn with_execution_time(mut self, execution_time_ms: u64) -> Self {
        self.metadata = Some(MessageMetadata { execution_time_ms });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tables() -> Vec<TableDescriptor> {
        vec![
            TableDescriptor {
                name: "users".into(),
                row_count: 1234,
                description: "User accounts".into(),
                columns: vec![
                    ColumnDescriptor::new("id", "uuid"),
                    ColumnDescriptor::new("email", "varchar"),
                ],
            },
            TableDescriptor {
                name: "orders".into(),
                row_count: 15234,
                description: "Orders".into(),
                columns: vec![ColumnDescriptor::new("id", "uuid")],
            },
        ]
    }

    #[test]
    fn test_stats_from_tables() {
        let stats = DatabaseStats::from_tables(&sample_tables(), "1 MB");
        assert_eq!(stats.table_count, 2);
        assert_eq!(stats.row_count, 16468);
        assert_eq!(stats.column_count, 3);
        assert_eq!(stats.size, "1 MB");
    }

    #[test]
    fn test_stats_from_no_tables() {
        let stats = DatabaseStats::from_tables(&[], "0 B");
        assert_eq!(stats.table_count, 0);
        assert_eq!(stats.row_count, 0);
    }

    #[test]
    fn test_summary_table_lookup() {
        let tables = sample_tables();
        let summary = DatabaseSummary {
            stats: DatabaseStats::from_tables(&tables, "1 MB"),
            tables,
            insights: vec![],
            suggested_queries: vec![],
        };
        assert_eq!(summary.table("orders").map(|t| t.row_count), Some(15234));
        assert!(summary.table("missing").is_none());
    }

    #[test]
    fn test_connection_config_completeness() {
        assert!(ConnectionConfig::new("postgresql://u:p@h/db").is_complete());
        assert!(!ConnectionConfig::new("").is_complete());
        assert!(!ConnectionConfig::new("   \n").is_complete());
    }

    #[test]
    fn test_connection_config_json_shape() {
        let json = serde_json::to_value(ConnectionConfig::new("postgresql://h/db")).unwrap();
        assert_eq!(json["connectionString"], "postgresql://h/db");
    }

    #[test]
    fn test_column_type_field_name() {
        let json = serde_json::to_value(ColumnDescriptor::new("id", "uuid")).unwrap();
        assert_eq!(json["type"], "uuid");
        assert!(json.get("data_type").is_none());
    }

    #[test]
    fn test_report_json_shape_table() {
        let report = Report {
            id: ReportId::new("r1"),
            title: "Sales".into(),
            body: ReportBody::Table(TableData {
                columns: vec!["Product".into()],
                rows: vec![vec!["A".into()]],
            }),
            insights: vec!["up".into()],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["id"], "r1");
        assert_eq!(json["kind"], "table");
        assert_eq!(json["payload"]["columns"][0], "Product");
        assert_eq!(json["insights"][0], "up");
        assert_eq!(report.kind(), ReportKind::Table);
    }

    #[test]
    fn test_report_parses_chart_from_json() {
        let json = r#"{
            "id": "r2",
            "title": "Sales Chart",
            "kind": "chart",
            "payload": { "image_ref": "chart://r2" }
        }"#;
        let report: Report = serde_json::from_str(json).unwrap();
        assert_eq!(report.kind(), ReportKind::Chart);
        assert!(report.insights.is_empty());
        match report.body {
            ReportBody::Chart { image_ref, data } => {
                assert_eq!(image_ref, "chart://r2");
                assert!(data.is_none());
            }
            other => panic!("expected chart body, got {:?}", other),
        }
    }

    #[test]
    fn test_report_kind_display() {
        assert_eq!(ReportKind::Chart.to_string(), "chart");
        assert_eq!(ReportKind::Table.to_string(), "table");
        assert_eq!(ReportKind::Text.to_string(), "text");
    }

    #[test]
    fn test_report_id_generate_is_unique() {
        let a = ReportId::generate();
        let b = ReportId::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn test_message_constructors() {
        let m = Message::user("hi");
        assert_eq!(m.role, Role::User);
        assert!(m.metadata.is_none());

        let m = Message::assistant("done").with_execution_time(42);
        assert_eq!(m.role, Role::Assistant);
        assert_eq!(m.metadata.map(|md| md.execution_time_ms), Some(42));
    }

    #[test]
    fn test_activity_omits_missing_report_id() {
        let activity = Activity {
            id: Uuid::new_v4(),
            title: "Show sales".into(),
            created_at: Utc::now(),
            report_id: None,
        };
        let json = serde_json::to_value(&activity).unwrap();
        assert!(json.get("reportId").is_none());
        assert_eq!(json["title"], "Show sales");
    }
}
