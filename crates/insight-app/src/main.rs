//! Insight application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing
//! 3. Wire the collaborators (user store, probe, analysis engine)
//! 4. Start the axum REST API server

mod cli;

use std::sync::Arc;

use clap::Parser;

use insight_api::routes;
use insight_api::state::AppState;
use insight_backend::{
    Deadline, FixtureAnalyzer, FixtureReportGenerator, HttpUserStore, InMemoryConfigStore,
    TcpProbe,
};
use insight_core::config::InsightConfig;
use insight_workspace::{Collaborators, ConfigStore};

use crate::cli::CliArgs;

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

/// Apply command-line and environment overrides on top of the file config.
fn apply_overrides(config: &mut InsightConfig, args: &CliArgs) {
    config.general.port = args.resolve_port(config.general.port);
    if let Some(bind) = args.resolve_bind() {
        config.general.bind_address = bind;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    if let Some(url) = args.resolve_user_store_url() {
        config.backend.user_store_url = Some(url);
    }
}

fn build_collaborators(
    config: &InsightConfig,
) -> Result<Collaborators, insight_core::error::InsightError> {
    let store: Arc<dyn ConfigStore> = match &config.backend.user_store_url {
        Some(url) => {
            let store = HttpUserStore::new(url, config.backend.timeout())?;
            tracing::info!(url = %store.base_url(), "Using HTTP user store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("No user store configured; connection settings are kept in memory");
            Arc::new(InMemoryConfigStore::new())
        }
    };

    let analyzer = FixtureAnalyzer::new(std::time::Duration::from_millis(
        config.engine.analysis_delay_ms,
    ));
    let generator = FixtureReportGenerator::new(std::time::Duration::from_millis(
        config.engine.report_delay_ms,
    ));

    Ok(Collaborators {
        store,
        probe: Arc::new(TcpProbe::new()),
        analyzer: Arc::new(Deadline::new(
            analyzer,
            config.connection.analysis_timeout(),
        )),
        generator: Arc::new(Deadline::new(generator, config.chat.report_timeout())),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = InsightConfig::load_or_default(&config_file);
    apply_overrides(&mut config, &args);

    init_tracing(&config.general.log_level);
    tracing::info!("Starting Insight v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    let collaborators = build_collaborators(&config)?;
    let state = AppState::new(config.clone(), collaborators);

    if let Err(e) = routes::start_server(&config, state).await {
        tracing::error!(error = %e, "API server stopped");
        return Err(e.into());
    }

    Ok(())
}
