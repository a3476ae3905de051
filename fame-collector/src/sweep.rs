//! One collection sweep over the active items
//!
//! Fetch first, then write: the metrics call happens outside any store
//! transaction, and each item's append is its own short transaction, so a
//! slow or failing fetch never holds a lock and never poisons the batch.

use crate::metrics::MetricsSource;
use chrono::Utc;
use fame_common::db::models::Observation;
use fame_common::params::Params;
use fame_common::store::ItemStore;
use fame_common::{ItemStatus, Result, Transition};
use tracing::{info, warn};

/// What one sweep accomplished
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepReport {
    /// Active items considered
    pub checked: usize,
    /// Observations appended
    pub sampled: usize,
    /// Items skipped after a per-item failure
    pub skipped: usize,
    /// UPLOADED items promoted to ANALYZED
    pub promoted: usize,
}

/// Sample every active item once and promote the ones with enough history
///
/// Per-item failures (metrics source unavailable, guard rejection) are
/// logged and skipped; observations already appended for other items stay
/// committed. Only a store failure on the initial item listing aborts the
/// sweep.
pub async fn run_sweep(
    store: &ItemStore,
    params: &Params,
    source: &dyn MetricsSource,
) -> Result<SweepReport> {
    let now = Utc::now().timestamp();
    let items = store.active_items(params.active_window_secs, now).await?;

    let mut report = SweepReport {
        checked: items.len(),
        ..SweepReport::default()
    };
    if items.is_empty() {
        info!("No active items to check");
        return Ok(report);
    }

    info!("Checking stats for {} items", items.len());
    for item in items {
        let Some(external_id) = item.external_id.as_deref() else {
            // The schema forbids this for UPLOADED/ANALYZED rows
            warn!("Skipping item '{}': no external id", item.key);
            report.skipped += 1;
            continue;
        };

        let stats = match source.fetch(external_id).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Skipping item '{}': {e}", item.key);
                report.skipped += 1;
                continue;
            }
        };

        // Lower counts than the last sample are recorded as-is; the
        // velocity engine clamps deltas instead of rejecting corrections
        let observation = Observation {
            observed_at: Utc::now().timestamp(),
            views: stats.views,
            likes: stats.likes,
            comments: stats.comments,
        };
        if let Err(e) = store.append_observation(&item.key, observation).await {
            warn!("Skipping item '{}': {e}", item.key);
            report.skipped += 1;
            continue;
        }
        report.sampled += 1;

        if item.status == ItemStatus::Uploaded {
            match promote_if_ready(store, params, &item.key).await {
                Ok(true) => report.promoted += 1,
                Ok(false) => {}
                Err(e) => warn!("Could not promote item '{}': {e}", item.key),
            }
        }
    }

    info!(
        "Sweep complete: {} checked, {} sampled, {} skipped, {} promoted",
        report.checked, report.sampled, report.skipped, report.promoted
    );
    Ok(report)
}

/// Promote UPLOADED -> ANALYZED once enough samples exist
async fn promote_if_ready(store: &ItemStore, params: &Params, key: &str) -> Result<bool> {
    let count = store.observation_count(key).await?;
    if count < params.min_observations {
        return Ok(false);
    }
    store.transition(key, &Transition::Analyzed).await?;
    info!("Item '{key}' promoted to ANALYZED after {count} observations");
    Ok(true)
}
