//! Entrypoint.

use clap::Parser;
use config::{Opts, PollerConfig};
use dotenvy::dotenv;
use poller::PollingManager;
use tracing::info;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    if let Ok(custom_env_file) = std::env::var("ENV_FILE") {
        dotenvy::from_filename(custom_env_file)?;
    } else {
        // Try the default .env file, and ignore if it doesn't exist.
        dotenv().ok();
    }

    let opts = Opts::parse();
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
    info!("🔭 kumascope agent starting...");

    if let Err(msg) = config::validate_endpoint(&opts.metrics_url) {
        eyre::bail!("invalid metrics endpoint: {msg}");
    }

    let config = PollerConfig::from_opts(&opts);
    if !config.is_configured() {
        info!("no metrics endpoint configured; polling will wait for setup");
    }

    let manager = PollingManager::with_http(config);

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, stopping poller");
    manager.stop();
    Ok(())
}
