//! Item and observation store
//!
//! The database is the only shared resource between the brain, the
//! collector, and fame-ctl; this narrow repository centralizes the
//! concurrency discipline (atomic key generation, guarded transitions,
//! ordered observation appends) so no component duplicates it.
//!
//! Every mutation runs in one short transaction; callers never hold a
//! transaction across a network call.

use crate::db::models::{Item, Observation};
use crate::lifecycle::{self, ItemStatus, Step, Transition};
use crate::policy::ProfileStats;
use crate::registry::{ContentProfile, Registry};
use crate::velocity::{self, Weights};
use crate::{Error, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::collections::HashMap;

/// Bounded retries for time-derived key generation
const KEY_ATTEMPTS: u32 = 5;

/// Repository over the shared SQLite database
#[derive(Debug, Clone)]
pub struct ItemStore {
    pool: SqlitePool,
}

impl ItemStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new PENDING item with a freshly generated unique key
    ///
    /// Keys are time-derived tokens (`v_<unix microseconds>`); the primary
    /// key arbitrates concurrent invocations, and a unique violation
    /// regenerates the key rather than overwriting. `KeyCollision` only
    /// surfaces after the retries are exhausted.
    pub async fn create_item(&self, profile: &ContentProfile) -> Result<Item> {
        for _ in 0..KEY_ATTEMPTS {
            let key = format!("v_{}", Utc::now().timestamp_micros());
            let inserted = sqlx::query(
                r#"
                INSERT INTO items (key, status, category, voice, visual_style)
                VALUES (?, 'PENDING', ?, ?, ?)
                "#,
            )
            .bind(&key)
            .bind(&profile.category)
            .bind(&profile.voice)
            .bind(&profile.visual_style)
            .execute(&self.pool)
            .await;

            match inserted {
                Ok(_) => {
                    return Ok(Item {
                        key,
                        external_id: None,
                        status: ItemStatus::Pending,
                        profile: profile.clone(),
                        published_at: None,
                        script: None,
                        prompt: None,
                    })
                }
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::KeyCollision {
            attempts: KEY_ATTEMPTS,
        })
    }

    /// Load one item by key
    pub async fn item(&self, key: &str) -> Result<Option<Item>> {
        let row = sqlx::query(&format!("{ITEM_COLUMNS} WHERE key = ?"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| item_from_row(&r)).transpose()
    }

    /// Load one item by key, failing if it does not exist
    pub async fn require_item(&self, key: &str) -> Result<Item> {
        self.item(key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("item '{key}'")))
    }

    /// All items in a given status, oldest first
    pub async fn items_with_status(&self, status: ItemStatus) -> Result<Vec<Item>> {
        let rows = sqlx::query(&format!("{ITEM_COLUMNS} WHERE status = ? ORDER BY key"))
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(item_from_row).collect()
    }

    /// UPLOADED/ANALYZED items published within the active window
    ///
    /// These are the items the feedback collector samples; older items stay
    /// in the history but are no longer polled.
    pub async fn active_items(&self, window_secs: i64, now: i64) -> Result<Vec<Item>> {
        let rows = sqlx::query(&format!(
            "{ITEM_COLUMNS} WHERE status IN ('UPLOADED', 'ANALYZED') AND published_at > ? ORDER BY key"
        ))
        .bind(now - window_secs)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    /// CREATING items whose last update is older than the threshold
    ///
    /// Candidates for manual intervention, never auto-retried.
    pub async fn stuck_creating(&self, threshold_secs: i64) -> Result<Vec<Item>> {
        let rows = sqlx::query(&format!(
            "{ITEM_COLUMNS} WHERE status = 'CREATING' \
             AND CAST(strftime('%s', updated_at) AS INTEGER) <= strftime('%s', 'now') - ? \
             ORDER BY key"
        ))
        .bind(threshold_secs)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    /// Apply a lifecycle transition under a short transaction
    ///
    /// Guards run against the status read in the same transaction; an
    /// out-of-order request fails with `InvalidTransition` and changes
    /// nothing, and re-confirming the current state is a no-op (`Step::
    /// AlreadyThere`) so the caller can distinguish a fresh advance from a
    /// retry — the producer claim relies on that for its at-most-once
    /// guarantee.
    pub async fn transition(&self, key: &str, request: &Transition) -> Result<Step> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> = sqlx::query_scalar("SELECT status FROM items WHERE key = ?")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;
        let current: ItemStatus = current
            .ok_or_else(|| Error::NotFound(format!("item '{key}'")))?
            .parse()?;

        let step = lifecycle::apply(key, current, request)?;
        let next = match step {
            Step::AlreadyThere => {
                tx.commit().await?;
                return Ok(step);
            }
            Step::Advance(next) => next,
        };

        // UPLOADED -> ANALYZED additionally requires a recorded observation
        if matches!(request, Transition::Analyzed) {
            let samples: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM observations WHERE item_key = ?")
                    .bind(key)
                    .fetch_one(&mut *tx)
                    .await?;
            if samples == 0 {
                return Err(Error::InvalidTransition {
                    key: key.to_string(),
                    from: current,
                    to: next,
                });
            }
        }

        let updated = match request {
            Transition::Claim | Transition::Analyzed => {
                sqlx::query(
                    "UPDATE items SET status = ?, updated_at = CURRENT_TIMESTAMP \
                     WHERE key = ? AND status = ?",
                )
                .bind(next.as_str())
                .bind(key)
                .bind(current.as_str())
                .execute(&mut *tx)
                .await?
            }
            Transition::Created { script, prompt } => {
                sqlx::query(
                    "UPDATE items SET status = ?, script = ?, prompt = ?, \
                     updated_at = CURRENT_TIMESTAMP WHERE key = ? AND status = ?",
                )
                .bind(next.as_str())
                .bind(script)
                .bind(prompt)
                .bind(key)
                .bind(current.as_str())
                .execute(&mut *tx)
                .await?
            }
            Transition::Uploaded {
                external_id,
                published_at,
            } => {
                sqlx::query(
                    "UPDATE items SET status = ?, external_id = ?, published_at = ?, \
                     updated_at = CURRENT_TIMESTAMP WHERE key = ? AND status = ?",
                )
                .bind(next.as_str())
                .bind(external_id)
                .bind(published_at)
                .bind(key)
                .bind(current.as_str())
                .execute(&mut *tx)
                .await?
            }
        };

        if updated.rows_affected() == 0 {
            // Lost a race with a concurrent writer; caller re-checks and retries
            return Err(Error::InvalidTransition {
                key: key.to_string(),
                from: current,
                to: next,
            });
        }

        tx.commit().await?;
        Ok(step)
    }

    /// Append one performance sample for an item
    ///
    /// Only UPLOADED/ANALYZED items can be observed, and `observed_at` must
    /// not regress (the velocity engine depends on append order). Metric
    /// counts lower than the previous sample are recorded as-is; the
    /// velocity engine clamps deltas instead.
    pub async fn append_observation(&self, key: &str, observation: Observation) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let status: Option<String> = sqlx::query_scalar("SELECT status FROM items WHERE key = ?")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;
        let status: ItemStatus = status
            .ok_or_else(|| Error::NotFound(format!("item '{key}'")))?
            .parse()?;

        if !status.is_observable() {
            return Err(Error::InvalidInput(format!(
                "item '{key}' is {status}; observations require an uploaded item"
            )));
        }

        let last: Option<i64> =
            sqlx::query_scalar("SELECT MAX(observed_at) FROM observations WHERE item_key = ?")
                .bind(key)
                .fetch_one(&mut *tx)
                .await?;
        if let Some(last) = last {
            if observation.observed_at < last {
                return Err(Error::InvalidInput(format!(
                    "observation for item '{key}' at {} is older than the last sample at {last}",
                    observation.observed_at
                )));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO observations (item_key, observed_at, views, likes, comments)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(key)
        .bind(observation.observed_at)
        .bind(observation.views)
        .bind(observation.likes)
        .bind(observation.comments)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// All observations for an item, ordered by observation time
    pub async fn observations(&self, key: &str) -> Result<Vec<Observation>> {
        let rows = sqlx::query(
            "SELECT observed_at, views, likes, comments FROM observations \
             WHERE item_key = ? ORDER BY observed_at, id",
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Observation {
                observed_at: row.get("observed_at"),
                views: row.get("views"),
                likes: row.get("likes"),
                comments: row.get("comments"),
            })
            .collect())
    }

    /// Number of samples recorded for an item
    pub async fn observation_count(&self, key: &str) -> Result<u32> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM observations WHERE item_key = ?")
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u32)
    }

    /// Per-profile selection inputs for every enumerated profile
    ///
    /// `items_produced` counts all statuses; the velocity mean only covers
    /// UPLOADED/ANALYZED items with a defined velocity, and is `None` for
    /// profiles with no scorable item yet.
    pub async fn profile_stats(
        &self,
        registry: &Registry,
        weights: Weights,
    ) -> Result<Vec<ProfileStats>> {
        let rows = sqlx::query("SELECT key, status, category, voice, visual_style FROM items")
            .fetch_all(&self.pool)
            .await?;

        let mut by_profile: HashMap<ContentProfile, Vec<(String, ItemStatus)>> = HashMap::new();
        for row in &rows {
            let profile = ContentProfile::new(
                row.get::<String, _>("category").as_str(),
                row.get::<String, _>("voice").as_str(),
                row.get::<String, _>("visual_style").as_str(),
            );
            let status: ItemStatus = row.get::<String, _>("status").parse()?;
            by_profile
                .entry(profile)
                .or_default()
                .push((row.get("key"), status));
        }

        let mut stats = Vec::with_capacity(registry.len());
        for profile in registry.profiles() {
            let items = by_profile.remove(&profile).unwrap_or_default();
            let items_produced = items.len() as u64;
            let analyzed_items = items
                .iter()
                .filter(|(_, status)| *status == ItemStatus::Analyzed)
                .count() as u64;

            let mut sequences = Vec::new();
            for (key, status) in &items {
                if status.is_observable() {
                    sequences.push(self.observations(key).await?);
                }
            }
            let velocity = velocity::profile_velocity(
                sequences.iter().map(|s| s.as_slice()),
                weights,
            );

            stats.push(ProfileStats {
                profile,
                velocity,
                items_produced,
                analyzed_items,
            });
        }

        Ok(stats)
    }
}

const ITEM_COLUMNS: &str = "SELECT key, external_id, status, category, voice, visual_style, \
                            published_at, script, prompt FROM items";

fn item_from_row(row: &SqliteRow) -> Result<Item> {
    Ok(Item {
        key: row.get("key"),
        external_id: row.get("external_id"),
        status: row.get::<String, _>("status").parse()?,
        profile: ContentProfile::new(
            row.get::<String, _>("category").as_str(),
            row.get::<String, _>("voice").as_str(),
            row.get::<String, _>("visual_style").as_str(),
        ),
        published_at: row.get("published_at"),
        script: row.get("script"),
        prompt: row.get("prompt"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::{create_items_table, create_observations_table, create_settings_table};

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

    fn profile() -> ContentProfile {
        ContentProfile::new("creepy", "voiceA", "anime")
    }

    fn obs(observed_at: i64, views: i64) -> Observation {
        Observation {
            observed_at,
            views,
            likes: 0,
            comments: 0,
        }
    }

    async fn drive_to_uploaded(store: &ItemStore, key: &str, external_id: &str) {
        store.transition(key, &Transition::Claim).await.unwrap();
        store
            .transition(
                key,
                &Transition::Created {
                    script: "a story".into(),
                    prompt: "a hook".into(),
                },
            )
            .await
            .unwrap();
        store
            .transition(
                key,
                &Transition::Uploaded {
                    external_id: external_id.into(),
                    published_at: 1_700_000_000,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_item_round_trip() {
        let store = test_store().await;
        let item = store.create_item(&profile()).await.unwrap();

        assert!(item.key.starts_with("v_"));
        assert_eq!(item.status, ItemStatus::Pending);
        assert!(item.external_id.is_none());

        let loaded = store.require_item(&item.key).await.unwrap();
        assert_eq!(loaded.key, item.key);
        assert_eq!(loaded.profile, profile());
        assert_eq!(loaded.status, ItemStatus::Pending);
    }

    #[tokio::test]
    async fn test_generated_keys_are_unique() {
        let store = test_store().await;
        let mut keys = std::collections::HashSet::new();
        for _ in 0..20 {
            let item = store.create_item(&profile()).await.unwrap();
            assert!(keys.insert(item.key), "duplicate key generated");
        }
    }

    #[tokio::test]
    async fn test_full_lifecycle_persists_fields() {
        let store = test_store().await;
        let item = store.create_item(&profile()).await.unwrap();

        drive_to_uploaded(&store, &item.key, "X1").await;

        let uploaded = store.require_item(&item.key).await.unwrap();
        assert_eq!(uploaded.status, ItemStatus::Uploaded);
        assert_eq!(uploaded.external_id.as_deref(), Some("X1"));
        assert_eq!(uploaded.published_at, Some(1_700_000_000));
        assert_eq!(uploaded.script.as_deref(), Some("a story"));
        assert_eq!(uploaded.prompt.as_deref(), Some("a hook"));

        store
            .append_observation(&item.key, obs(1_700_000_100, 10))
            .await
            .unwrap();
        store
            .transition(&item.key, &Transition::Analyzed)
            .await
            .unwrap();
        let analyzed = store.require_item(&item.key).await.unwrap();
        assert_eq!(analyzed.status, ItemStatus::Analyzed);
    }

    #[tokio::test]
    async fn test_external_id_absent_until_upload() {
        let store = test_store().await;
        let item = store.create_item(&profile()).await.unwrap();

        store.transition(&item.key, &Transition::Claim).await.unwrap();
        let claimed = store.require_item(&item.key).await.unwrap();
        assert!(claimed.external_id.is_none());
        assert!(claimed.published_at.is_none());
    }

    #[tokio::test]
    async fn test_second_claim_is_a_noop_not_a_second_owner() {
        let store = test_store().await;
        let item = store.create_item(&profile()).await.unwrap();

        let first = store.transition(&item.key, &Transition::Claim).await.unwrap();
        assert_eq!(first, Step::Advance(ItemStatus::Creating));

        let second = store.transition(&item.key, &Transition::Claim).await.unwrap();
        assert_eq!(second, Step::AlreadyThere);
    }

    #[tokio::test]
    async fn test_out_of_order_transition_leaves_state_unchanged() {
        let store = test_store().await;
        let item = store.create_item(&profile()).await.unwrap();

        let err = store
            .transition(
                &item.key,
                &Transition::Uploaded {
                    external_id: "X1".into(),
                    published_at: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));

        let unchanged = store.require_item(&item.key).await.unwrap();
        assert_eq!(unchanged.status, ItemStatus::Pending);
        assert!(unchanged.external_id.is_none());
    }

    #[tokio::test]
    async fn test_analyzed_requires_an_observation() {
        let store = test_store().await;
        let item = store.create_item(&profile()).await.unwrap();
        drive_to_uploaded(&store, &item.key, "X1").await;

        let err = store
            .transition(&item.key, &Transition::Analyzed)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(
            store.require_item(&item.key).await.unwrap().status,
            ItemStatus::Uploaded
        );
    }

    #[tokio::test]
    async fn test_observations_require_an_uploaded_item() {
        let store = test_store().await;
        let item = store.create_item(&profile()).await.unwrap();

        let err = store
            .append_observation(&item.key, obs(100, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = store.append_observation("v_missing", obs(100, 10)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_observed_at_must_not_regress() {
        let store = test_store().await;
        let item = store.create_item(&profile()).await.unwrap();
        drive_to_uploaded(&store, &item.key, "X1").await;

        store.append_observation(&item.key, obs(200, 10)).await.unwrap();
        // Equal timestamps are tolerated (same-second retry), regression is not
        store.append_observation(&item.key, obs(200, 11)).await.unwrap();
        let err = store
            .append_observation(&item.key, obs(100, 12))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let stored = store.observations(&item.key).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.windows(2).all(|w| w[0].observed_at <= w[1].observed_at));
    }

    #[tokio::test]
    async fn test_profile_stats_counts_and_velocity() {
        let store = test_store().await;
        let registry = Registry::new(
            vec!["creepy".into(), "lifehack".into()],
            vec!["voiceA".into()],
            vec!["anime".into()],
        )
        .unwrap();

        // One scorable item for creepy, nothing for lifehack
        let item = store.create_item(&profile()).await.unwrap();
        drive_to_uploaded(&store, &item.key, "X1").await;
        store.append_observation(&item.key, obs(0, 0)).await.unwrap();
        store.append_observation(&item.key, obs(100, 100)).await.unwrap();
        // A second pending item for creepy raises its production count only
        store.create_item(&profile()).await.unwrap();

        let stats = store
            .profile_stats(&registry, Weights::default())
            .await
            .unwrap();
        assert_eq!(stats.len(), 2);

        let creepy = stats.iter().find(|s| s.profile.category == "creepy").unwrap();
        assert_eq!(creepy.items_produced, 2);
        assert_eq!(creepy.analyzed_items, 0, "uploaded item is scorable but not analyzed");
        assert!((creepy.velocity.unwrap() - 1.0).abs() < 1e-12);

        let lifehack = stats.iter().find(|s| s.profile.category == "lifehack").unwrap();
        assert_eq!(lifehack.items_produced, 0);
        assert_eq!(lifehack.analyzed_items, 0);
        assert_eq!(lifehack.velocity, None);
    }

    #[tokio::test]
    async fn test_active_items_window() {
        let store = test_store().await;
        let now = 1_700_100_000;

        let fresh = store.create_item(&profile()).await.unwrap();
        drive_to_uploaded(&store, &fresh.key, "X1").await; // published_at = 1_700_000_000

        let stale = store.create_item(&profile()).await.unwrap();
        store.transition(&stale.key, &Transition::Claim).await.unwrap();
        store
            .transition(
                &stale.key,
                &Transition::Created {
                    script: "s".into(),
                    prompt: "p".into(),
                },
            )
            .await
            .unwrap();
        store
            .transition(
                &stale.key,
                &Transition::Uploaded {
                    external_id: "X2".into(),
                    published_at: now - 1_000_000,
                },
            )
            .await
            .unwrap();

        let active = store.active_items(604_800, now).await.unwrap();
        let keys: Vec<&str> = active.iter().map(|i| i.key.as_str()).collect();
        assert!(keys.contains(&fresh.key.as_str()));
        assert!(!keys.contains(&stale.key.as_str()));
    }
}
