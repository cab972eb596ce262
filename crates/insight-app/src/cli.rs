//! CLI argument definitions for the Insight server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 5050;

/// Insight: ask questions of your database in plain language.
#[derive(Parser, Debug)]
#[command(name = "insight", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Address the API server binds to.
    #[arg(long = "bind")]
    pub bind: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Base URL of the user store service.
    #[arg(long = "user-store-url")]
    pub user_store_url: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > INSIGHT_CONFIG env var > ~/.insight/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("INSIGHT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > INSIGHT_PORT env var > config file value > 5050.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        self.resolve_port_with(std::env::var("INSIGHT_PORT").ok(), config_port)
    }

    fn resolve_port_with(&self, env_port: Option<String>, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Some(p) = env_port.and_then(|val| val.parse::<u16>().ok()) {
            return p;
        }
        if config_port != 0 {
            return config_port;
        }
        DEFAULT_PORT
    }

    /// Resolve the bind address. Returns `None` if not overridden.
    pub fn resolve_bind(&self) -> Option<String> {
        self.bind.clone()
    }

    /// Resolve the log level. Returns `None` if not overridden.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }

    /// Resolve the user store URL. Returns `None` if not overridden.
    pub fn resolve_user_store_url(&self) -> Option<String> {
        self.user_store_url.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".insight").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".insight").join("config.toml");
    }
    PathBuf::from("config.toml")
}
