//! fame-brain - Decision engine for the content production loop
//!
//! Each run makes one decision: pick the next content profile under the
//! exploit/explore policy and create a PENDING item for it. Intended to be
//! triggered by cron or by hand; runs to completion and exits.

use anyhow::Result;
use clap::Parser;
use fame_brain::decide;
use fame_common::config::resolve_database_path;
use fame_common::db::init::init_database;
use fame_common::params::Params;
use fame_common::policy::EpsilonGreedy;
use fame_common::registry::Registry;
use fame_common::store::ItemStore;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "fame-brain", about = "Decide the next content profile to produce")]
struct Args {
    /// Database file (falls back to FAME_DB, then the config file)
    #[arg(long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting fame-brain v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let db_path = resolve_database_path(args.database.as_deref());
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path).await?;
    let params = Params::load(&pool).await?;
    let registry = Registry::load(&pool).await?;
    info!(
        "Registry enumerates {} profiles; exploit probability {}",
        registry.len(),
        params.exploit_probability
    );

    let store = ItemStore::new(pool);
    let strategy = EpsilonGreedy::new(params.exploit_probability);
    let mut rng = rand::thread_rng();

    let (_, item) = decide(&store, &registry, &params, &strategy, &mut rng).await?;
    info!("Decision complete: item '{}' is PENDING", item.key);

    Ok(())
}
