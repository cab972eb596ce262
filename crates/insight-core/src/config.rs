use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{InsightError, Result};

/// Top-level configuration for the Insight server.
///
/// Loaded from `~/.insight/config.toml` by default. Each section corresponds
/// to a bounded context or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsightConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl InsightConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: InsightConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values that would make the server unusable.
    pub fn validate(&self) -> Result<()> {
        if self.backend.timeout_secs == 0 {
            return Err(InsightError::Config(
                "backend.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.connection.probe_timeout_ms == 0 {
            return Err(InsightError::Config(
                "connection.probe_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.connection.analysis_timeout_secs == 0 {
            return Err(InsightError::Config(
                "connection.analysis_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.chat.report_timeout_secs == 0 {
            return Err(InsightError::Config(
                "chat.report_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.chat.max_message_length == 0 {
            return Err(InsightError::Config(
                "chat.max_message_length must be greater than zero".to_string(),
            ));
        }
        if self.api.idle_workspace_secs == 0 {
            return Err(InsightError::Config(
                "api.idle_workspace_secs must be greater than zero".to_string(),
            ));
        }
        if self.api.sweep_interval_secs == 0 {
            return Err(InsightError::Config(
                "api.sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// General server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Address the HTTP server binds to.
    pub bind_address: String,
    /// HTTP server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bind_address: "127.0.0.1".to_string(),
            port: 5050,
        }
    }
}

/// External user store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the user CRUD service. When unset, connection
    /// configs are kept in memory for the life of the process.
    pub user_store_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            user_store_url: None,
            timeout_secs: 10,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Database connection lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Upper bound for a connection test, in milliseconds.
    pub probe_timeout_ms: u64,
    /// Upper bound for a database analysis, in seconds.
    pub analysis_timeout_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 5000,
            analysis_timeout_secs: 120,
        }
    }
}

impl ConnectionSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs)
    }
}

/// Conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Assistant message shown when a workspace is first opened.
    pub greeting: String,
    /// Assistant message shown after starting a new chat.
    pub new_chat_greeting: String,
    /// Maximum user message length in characters.
    pub max_message_length: usize,
    /// Upper bound for a report generation, in seconds.
    pub report_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            greeting: "Hello! I can help you generate reports and insights from your database. \
                       Try asking something like \"Show me sales trends for last quarter\"."
                .to_string(),
            new_chat_greeting: "Hello! Let's start a new conversation. You can ask me anything \
                                like 'Show me monthly revenue trends'"
                .to_string(),
            max_message_length: 2000,
            report_timeout_secs: 60,
        }
    }
}

impl ChatConfig {
    pub fn report_timeout(&self) -> Duration {
        Duration::from_secs(self.report_timeout_secs)
    }
}

/// Built-in fixture engine settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Simulated analysis latency in milliseconds.
    pub analysis_delay_ms: u64,
    /// Simulated report generation latency in milliseconds.
    pub report_delay_ms: u64,
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Origins allowed by CORS (the dashboard frontend).
    pub allowed_origins: Vec<String>,
    /// Anonymous workspaces untouched for this long are dropped, in seconds.
    pub idle_workspace_secs: u64,
    /// How often idle workspaces are swept, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            idle_workspace_secs: 1800,
            sweep_interval_secs: 60,
        }
    }
}

impl ApiConfig {
    pub fn idle_workspace_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_workspace_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = InsightConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.bind_address, "127.0.0.1");
        assert_eq!(config.general.port, 5050);
        assert!(config.backend.user_store_url.is_none());
        assert_eq!(config.backend.timeout_secs, 10);
        assert_eq!(config.connection.probe_timeout_ms, 5000);
        assert_eq!(config.connection.analysis_timeout_secs, 120);
        assert_eq!(config.chat.max_message_length, 2000);
        assert!(config.chat.greeting.starts_with("Hello!"));
        assert_eq!(config.engine.analysis_delay_ms, 0);
        assert_eq!(config.api.allowed_origins.len(), 2);
        assert_eq!(config.api.idle_workspace_ttl(), Duration::from_secs(1800));
        assert_eq!(config.api.sweep_interval(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"
port = 8080

[backend]
user_store_url = "http://localhost:5000"
timeout_secs = 3

[connection]
probe_timeout_ms = 250

[chat]
greeting = "Hi"
max_message_length = 500

[engine]
analysis_delay_ms = 3000
report_delay_ms = 1500
"#;
        let file = create_temp_config(content);
        let config = InsightConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.port, 8080);
        assert_eq!(
            config.backend.user_store_url.as_deref(),
            Some("http://localhost:5000")
        );
        assert_eq!(config.backend.timeout_secs, 3);
        assert_eq!(config.connection.probe_timeout(), Duration::from_millis(250));
        // Unspecified keys in a present section keep defaults
        assert_eq!(config.connection.analysis_timeout_secs, 120);
        assert_eq!(config.chat.greeting, "Hi");
        assert_eq!(config.chat.max_message_length, 500);
        assert_eq!(config.engine.analysis_delay_ms, 3000);
        assert_eq!(config.engine.report_delay_ms, 1500);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[general]\nlog_level = \"warn\"\n");
        let config = InsightConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.port, 5050);
        assert_eq!(config.chat.report_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = InsightConfig::load(file.path()).unwrap();
        assert_eq!(config.general.port, 5050);
        assert_eq!(config.connection.analysis_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(InsightConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_rejects_zero_timeout() {
        let file = create_temp_config("[connection]\nprobe_timeout_ms = 0\n");
        let err = InsightConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, InsightError::Config(_)));
        assert!(err.to_string().contains("probe_timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_zero_message_length() {
        let mut config = InsightConfig::default();
        config.chat.max_message_length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_idle_workspace_settings() {
        let file = create_temp_config("[api]\nidle_workspace_secs = 90\n");
        let config = InsightConfig::load(file.path()).unwrap();
        assert_eq!(config.api.idle_workspace_ttl(), Duration::from_secs(90));
        assert_eq!(config.api.sweep_interval(), Duration::from_secs(60));

        let file = create_temp_config("[api]\nsweep_interval_secs = 0\n");
        let err = InsightConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("sweep_interval_secs"));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = InsightConfig::load_or_default(Path::new("/nonexistent/insight.toml"));
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_load_or_default_invalid_values() {
        let file = create_temp_config("[backend]\ntimeout_secs = 0\n");
        let config = InsightConfig::load_or_default(file.path());
        assert_eq!(config.backend.timeout_secs, 10);
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = InsightConfig::default();
        config.backend.user_store_url = Some("http://store:5000".to_string());
        config.save(&path).unwrap();

        assert!(path.exists());
        let reloaded = InsightConfig::load(&path).unwrap();
        assert_eq!(
            reloaded.backend.user_store_url.as_deref(),
            Some("http://store:5000")
        );
        assert_eq!(reloaded.chat.greeting, config.chat.greeting);
    }
}
