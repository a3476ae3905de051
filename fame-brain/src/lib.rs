//! Decision engine
//!
//! One invocation reads the current per-profile velocity scores, runs the
//! exploit/explore policy, and persists exactly one new PENDING item for
//! the selected profile. Producers pick the item up through fame-ctl.

use fame_common::db::models::Item;
use fame_common::params::Params;
use fame_common::policy::{Choice, SelectionStrategy};
use fame_common::registry::Registry;
use fame_common::store::ItemStore;
use fame_common::Result;
use rand::RngCore;
use tracing::info;

/// Select the next profile and create its PENDING item
///
/// A store failure aborts the decision (there is nothing sensible to decide
/// without the store); the caller reports it and the scheduler retries the
/// whole invocation.
pub async fn decide<S: SelectionStrategy>(
    store: &ItemStore,
    registry: &Registry,
    params: &Params,
    strategy: &S,
    rng: &mut dyn RngCore,
) -> Result<(Choice, Item)> {
    let stats = store.profile_stats(registry, params.weights()).await?;
    let choice = strategy.select(&stats, rng)?;
    let item = store.create_item(choice.profile()).await?;

    match &choice {
        Choice::Exploit(profile) => {
            let velocity = stats
                .iter()
                .find(|s| &s.profile == profile)
                .and_then(|s| s.velocity)
                .unwrap_or(0.0);
            info!(
                "Exploit: created item '{}' for best profile {} (velocity {:.4})",
                item.key, profile, velocity
            );
        }
        Choice::Explore(profile) => {
            info!("Explore: created item '{}' for profile {}", item.key, profile);
        }
    }

    Ok((choice, item))
}
