//! SpendWatch exporter
//!
//! Takes no arguments; everything is configured through the environment.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use spendwatch::exporter::{Exporter, IntervalScheduler};
use spendwatch::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // A .env file may carry the log level too, so read it first
    let dotenv = dotenvy::dotenv();

    // Initialize logging: RUST_LOG, then LOG_LEVEL, then info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stdout)
        .init();

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    // Load configuration
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    run(&config).await;

    ExitCode::SUCCESS
}

fn load_config() -> anyhow::Result<Config> {
    Config::from_env().context("environment does not describe a usable exporter")
}

async fn run(config: &Config) {
    info!(
        "Starting SpendWatch for key '{}' (credentials: {}, interval: {}s)",
        config.exporter.key_name, config.credentials.mode, config.exporter.poll_interval_secs
    );
    info!(
        "Database: {}:{}/{}, folder: {}",
        config.database.host, config.database.port, config.database.name, config.cloud.folder_id
    );

    let exporter = Exporter::from_config(config);
    let mut scheduler =
        IntervalScheduler::new(Duration::from_secs(config.exporter.poll_interval_secs));

    exporter.run(&mut scheduler).await;
}
