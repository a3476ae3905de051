//! fame-collector - Feedback collector for the content production loop
//!
//! Each run sweeps every active published item, samples its current
//! metrics into the observation log, and promotes items to ANALYZED once
//! they have enough samples. Intended for cron; `--watch` keeps it running
//! on the configured cadence instead.

use anyhow::Result;
use clap::Parser;
use fame_collector::{run_sweep, YouTubeStatsClient};
use fame_common::config::{resolve_api_key, resolve_database_path, API_KEY_ENV_VAR};
use fame_common::db::init::init_database;
use fame_common::params::Params;
use fame_common::store::ItemStore;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "fame-collector", about = "Sample performance metrics for published items")]
struct Args {
    /// Database file (falls back to FAME_DB, then the config file)
    #[arg(long)]
    database: Option<String>,

    /// Metrics API key (falls back to the database setting)
    #[arg(long, env = API_KEY_ENV_VAR)]
    api_key: Option<String>,

    /// Keep sweeping on the configured cadence instead of exiting
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting fame-collector v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let db_path = resolve_database_path(args.database.as_deref());
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path).await?;
    let params = Params::load(&pool).await?;

    let api_key = match args.api_key {
        Some(key) if !key.trim().is_empty() => key,
        _ => resolve_api_key(&pool).await?,
    };
    let source = YouTubeStatsClient::new(api_key, Duration::from_millis(params.metrics_timeout_ms))?;
    let store = ItemStore::new(pool);

    if args.watch {
        let cadence = Duration::from_secs(params.collector_interval_secs);
        info!("Watch mode: sweeping every {}s", cadence.as_secs());
        loop {
            run_sweep(&store, &params, &source).await?;
            tokio::time::sleep(cadence).await;
        }
    }

    run_sweep(&store, &params, &source).await?;
    Ok(())
}
