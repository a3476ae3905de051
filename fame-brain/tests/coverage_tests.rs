//! Cold-start coverage behavior of the decision engine
//!
//! Starting from an empty store, each decision followed by a full lifecycle
//! must reach every enumerated profile before exploitation takes over,
//! regardless of the exploit probability.

use fame_brain::decide;
use fame_common::db::init::{create_items_table, create_observations_table, create_settings_table};
use fame_common::db::models::Observation;
use fame_common::params::Params;
use fame_common::policy::{Choice, EpsilonGreedy};
use fame_common::registry::Registry;
use fame_common::store::ItemStore;
use fame_common::Transition;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::SqlitePool;
use std::collections::HashSet;

async fn test_store() -> ItemStore {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .unwrap();
    create_items_table(&pool).await.unwrap();
    create_observations_table(&pool).await.unwrap();
    create_settings_table(&pool).await.unwrap();
    ItemStore::new(pool)
}

/// Drive an item PENDING -> ANALYZED with two observations an hour apart,
/// so the profile ends up with a defined velocity
async fn complete_lifecycle(store: &ItemStore, key: &str, sequence: u32) {
    store.transition(key, &Transition::Claim).await.unwrap();
    store
        .transition(
            key,
            &Transition::Created {
                script: "story".into(),
                prompt: "hook".into(),
            },
        )
        .await
        .unwrap();
    store
        .transition(
            key,
            &Transition::Uploaded {
                external_id: format!("X{sequence}"),
                published_at: 1_700_000_000 + i64::from(sequence),
            },
        )
        .await
        .unwrap();
    store
        .append_observation(
            key,
            Observation {
                observed_at: 1_700_000_100 + i64::from(sequence),
                views: 100,
                likes: 5,
                comments: 1,
            },
        )
        .await
        .unwrap();
    store
        .append_observation(
            key,
            Observation {
                observed_at: 1_700_003_700 + i64::from(sequence),
                views: 400,
                likes: 15,
                comments: 2,
            },
        )
        .await
        .unwrap();
    store.transition(key, &Transition::Analyzed).await.unwrap();
}

#[tokio::test]
async fn test_every_profile_is_selected_within_n_invocations() {
    let store = test_store().await;
    let registry = Registry::new(
        vec!["creepy".into(), "lifehack".into()],
        vec!["voiceA".into()],
        vec!["anime".into(), "photoreal".into()],
    )
    .unwrap();
    let params = Params::default();

    // Even a pure-exploit setting cannot skip the coverage phase
    let strategy = EpsilonGreedy::new(1.0);
    let mut rng = StdRng::seed_from_u64(42);

    let mut selected = HashSet::new();
    for round in 0..registry.len() as u32 {
        let (choice, item) = decide(&store, &registry, &params, &strategy, &mut rng)
            .await
            .unwrap();
        assert!(
            matches!(choice, Choice::Explore(_)),
            "coverage gap must force the explore branch"
        );
        assert!(
            selected.insert(choice.profile().clone()),
            "an uncovered profile was revisited before the set was exhausted"
        );
        complete_lifecycle(&store, &item.key, round).await;
    }

    assert_eq!(selected.len(), registry.len(), "every profile selected once");

    // Coverage satisfied: the next decision exploits
    let (choice, _) = decide(&store, &registry, &params, &strategy, &mut rng)
        .await
        .unwrap();
    assert!(matches!(choice, Choice::Exploit(_)));
}

#[tokio::test]
async fn test_each_invocation_creates_exactly_one_pending_item() {
    let store = test_store().await;
    let registry = Registry::new(
        vec!["creepy".into()],
        vec!["voiceA".into()],
        vec!["anime".into()],
    )
    .unwrap();
    let params = Params::default();
    let strategy = EpsilonGreedy::new(0.8);
    let mut rng = StdRng::seed_from_u64(1);

    for expected in 1..=3usize {
        let (_, item) = decide(&store, &registry, &params, &strategy, &mut rng)
            .await
            .unwrap();
        assert_eq!(item.status, fame_common::ItemStatus::Pending);
        let pending = store
            .items_with_status(fame_common::ItemStatus::Pending)
            .await
            .unwrap();
        assert_eq!(pending.len(), expected);
    }
}
