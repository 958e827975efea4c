use anyhow::Context;
use dotenvy::dotenv;
use tokio::io::{stdin, stdout, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mafia_engine::bridge;
use mafia_engine::models::config::EngineConfig;
use mafia_engine::state::AppState;

fn init_logger() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mafia_engine=info"));
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv_result = dotenv();
    init_logger();
    if let Err(e) = dotenv_result {
        warn!("no .env loaded: {}", e);
    }

    let config = EngineConfig::from_env();
    info!(?config, "starting mafia engine");

    let state = AppState::new(config).context("failed to open the snapshot directory")?;
    let restored = state
        .restore()
        .await
        .context("failed to restore sessions")?;
    if restored > 0 {
        info!(restored, "resumed running sessions");
    }

    bridge::run(state, BufReader::new(stdin()), stdout())
        .await
        .context("stdio bridge failed")?;
    info!("input closed, shutting down");
    Ok(())
}
