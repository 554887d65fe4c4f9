#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod config;
mod external;
mod services;

use config::Cli;
use services::Services;

/// Tracing target for server startup and shutdown.
pub const TRACING_TARGET_STARTUP: &str = "kbase::startup";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::init();
    cli.init_tracing();

    let services = Services::init(&cli).await?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to listen for shutdown signal: {e}"))?;
    tracing::info!(target: TRACING_TARGET_STARTUP, "Shutdown signal received");

    services.shutdown().await;
    Ok(())
}
