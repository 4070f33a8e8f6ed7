use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sigil_core::EventBus;
use sigil_server::{
    cli::Cli,
    config::ServerConfig,
    registry::ConnectionRegistry,
    routes::{self, AppState},
};

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let config = Arc::new(ServerConfig::from_cli(&cli)?);
    let storage = config.build_storage().await?;

    let state = AppState {
        storage,
        registry: Arc::new(ConnectionRegistry::new()),
        bus: Arc::new(EventBus::new()),
        config,
    };

    routes::serve(state).await
}
