use thiserror::Error;

/// Top-level error type for the Insight system.
///
/// Subsystem crates define their own error types for domain failures; this
/// type covers configuration, I/O, and process-level concerns that cross
/// crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InsightError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<toml::de::Error> for InsightError {
    fn from(err: toml::de::Error) -> Self {
        InsightError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for InsightError {
    fn from(err: toml::ser::Error) -> Self {
        InsightError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for InsightError {
    fn from(err: serde_json::Error) -> Self {
        InsightError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Insight operations.
pub type Result<T> = std::result::Result<T, InsightError>;
