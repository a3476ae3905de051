//! fame-ctl - Collaborator surface for producers and publishers
//!
//! The production and publishing processes themselves are outside the
//! loop's core; this tool is how they (or a human) record their outcomes
//! as guarded lifecycle transitions. Re-running a confirmation is safe:
//! already-reached states report as no-ops, out-of-order requests are
//! rejected and change nothing.

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use fame_common::config::resolve_database_path;
use fame_common::db::init::init_database;
use fame_common::lifecycle::Step;
use fame_common::params::Params;
use fame_common::store::ItemStore;
use fame_common::velocity::item_velocity;
use fame_common::{Error, ItemStatus, Transition};

#[derive(Parser, Debug)]
#[command(name = "fame-ctl", about = "Record producer/publisher outcomes for items")]
struct Args {
    /// Database file (falls back to FAME_DB, then the config file)
    #[arg(long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Claim a PENDING item for production (at most one claimer wins)
    Claim { key: String },

    /// Report successful production with its generation artifacts
    Created {
        key: String,
        #[arg(long)]
        script: String,
        #[arg(long)]
        prompt: String,
    },

    /// Confirm publication with the hosting-site content id
    Uploaded {
        key: String,
        #[arg(long)]
        external_id: String,
        /// Publication time as unix seconds (defaults to now)
        #[arg(long)]
        published_at: Option<i64>,
    },

    /// Show one item with its observations and velocity
    Show { key: String },

    /// List items, optionally filtered by status; flags stuck CREATING items
    List {
        #[arg(long)]
        status: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();
    let db_path = resolve_database_path(args.database.as_deref());
    let pool = init_database(&db_path).await?;
    let params = Params::load(&pool).await?;
    let store = ItemStore::new(pool);

    match args.command {
        Command::Claim { key } => match store.transition(&key, &Transition::Claim).await? {
            Step::Advance(_) => println!("{key}: claimed"),
            Step::AlreadyThere => println!("{key}: already claimed by another producer"),
        },

        Command::Created {
            key,
            script,
            prompt,
        } => report(
            &key,
            store
                .transition(&key, &Transition::Created { script, prompt })
                .await?,
        ),

        Command::Uploaded {
            key,
            external_id,
            published_at,
        } => report(
            &key,
            store
                .transition(
                    &key,
                    &Transition::Uploaded {
                        external_id,
                        published_at: published_at.unwrap_or_else(|| Utc::now().timestamp()),
                    },
                )
                .await?,
        ),

        Command::Show { key } => {
            let item = store.require_item(&key).await?;
            println!("key:          {}", item.key);
            println!("status:       {}", item.status);
            println!("profile:      {}", item.profile);
            println!("external id:  {}", item.external_id.as_deref().unwrap_or("-"));
            println!(
                "published at: {}",
                item.published_at
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );

            let observations = store.observations(&key).await?;
            println!("observations: {}", observations.len());
            for o in &observations {
                println!(
                    "  {}  views {:>8}  likes {:>6}  comments {:>5}",
                    o.observed_at, o.views, o.likes, o.comments
                );
            }
            match item_velocity(&observations, params.weights()) {
                Ok(velocity) => println!("velocity:     {velocity:.4}"),
                Err(Error::InsufficientData) => println!("velocity:     (insufficient data)"),
                Err(Error::DegenerateWindow) => println!("velocity:     (degenerate window)"),
                Err(e) => return Err(e.into()),
            }
        }

        Command::List { status } => {
            let items = match status.as_deref() {
                Some(raw) => store.items_with_status(raw.parse::<ItemStatus>()?).await?,
                None => {
                    let mut all = Vec::new();
                    for status in [
                        ItemStatus::Pending,
                        ItemStatus::Creating,
                        ItemStatus::Created,
                        ItemStatus::Uploaded,
                        ItemStatus::Analyzed,
                    ] {
                        all.extend(store.items_with_status(status).await?);
                    }
                    all.sort_by(|a, b| a.key.cmp(&b.key));
                    all
                }
            };

            for item in &items {
                println!("{}  {:<9}  {}", item.key, item.status, item.profile);
            }
            println!("{} item(s)", items.len());

            // Stuck producers need a human; the core never auto-retries them
            let stuck = store.stuck_creating(params.stuck_creating_secs).await?;
            if !stuck.is_empty() {
                println!();
                println!(
                    "warning: {} item(s) stuck in CREATING for over {}s:",
                    stuck.len(),
                    params.stuck_creating_secs
                );
                for item in &stuck {
                    println!("  {}  {}", item.key, item.profile);
                }
            }
        }
    }

    Ok(())
}

fn report(key: &str, step: Step) {
    match step {
        Step::Advance(status) => println!("{key}: now {status}"),
        Step::AlreadyThere => println!("{key}: already confirmed (no change)"),
    }
}
