//! Operator-tunable parameters
//!
//! All tunables live in the `settings` table (see `db::init` for defaults)
//! and load into one plain struct at startup. Each binary runs to
//! completion per invocation, so a snapshot at startup is enough; there is
//! no live reload.

use crate::db::init::get_setting;
use crate::velocity::Weights;
use crate::Result;
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::warn;

/// Snapshot of the operator configuration surface
#[derive(Debug, Clone)]
pub struct Params {
    /// Exploit share of the exploit/explore split, in [0, 1]
    pub exploit_probability: f64,
    /// Engagement weight for like deltas (w_l > 1)
    pub weight_likes: f64,
    /// Engagement weight for comment deltas (w_c > w_l)
    pub weight_comments: f64,
    /// Observations required before UPLOADED promotes to ANALYZED
    pub min_observations: u32,
    /// Bounded timeout for one metrics fetch
    pub metrics_timeout_ms: u64,
    /// Collector cadence for `--watch` mode
    pub collector_interval_secs: u64,
    /// Collector only samples items published within this window
    pub active_window_secs: i64,
    /// CREATING items older than this are flagged for manual intervention
    pub stuck_creating_secs: i64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            exploit_probability: 0.8,
            weight_likes: 5.0,
            weight_comments: 10.0,
            min_observations: 2,
            metrics_timeout_ms: 15_000,
            collector_interval_secs: 3600,
            active_window_secs: 604_800,
            stuck_creating_secs: 86_400,
        }
    }
}

impl Params {
    /// Load the snapshot from the settings table
    ///
    /// Unparseable values fall back to the compiled default with a warning
    /// rather than aborting the run.
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            exploit_probability: load_parsed(pool, "exploit_probability", defaults.exploit_probability)
                .await?
                .clamp(0.0, 1.0),
            weight_likes: load_parsed(pool, "weight_likes", defaults.weight_likes).await?,
            weight_comments: load_parsed(pool, "weight_comments", defaults.weight_comments).await?,
            min_observations: load_parsed(pool, "min_observations", defaults.min_observations)
                .await?
                .max(1),
            metrics_timeout_ms: load_parsed(pool, "metrics_timeout_ms", defaults.metrics_timeout_ms)
                .await?,
            collector_interval_secs: load_parsed(
                pool,
                "collector_interval_secs",
                defaults.collector_interval_secs,
            )
            .await?,
            active_window_secs: load_parsed(pool, "active_window_secs", defaults.active_window_secs)
                .await?,
            stuck_creating_secs: load_parsed(
                pool,
                "stuck_creating_secs",
                defaults.stuck_creating_secs,
            )
            .await?,
        })
    }

    /// Engagement weights for the velocity engine
    pub fn weights(&self) -> Weights {
        Weights {
            likes: self.weight_likes,
            comments: self.weight_comments,
        }
    }
}

async fn load_parsed<T: FromStr + Copy>(pool: &SqlitePool, key: &str, default: T) -> Result<T> {
    match get_setting(pool, key).await? {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!("Setting '{}' has unparseable value '{}', using default", key, raw);
                Ok(default)
            }
        },
        None => Ok(default),
    }
}
