//! Database initialization
//!
//! Creates the shared SQLite database on first run and brings existing
//! databases up to date. All binaries call this at startup; every statement
//! is idempotent so concurrent first-runs are safe.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{info, warn};

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL mode: the brain, collector, and fame-ctl are independent processes
    // writing to the same database file
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    // Serialize concurrent writers with a bounded wait instead of failing fast
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_items_table(&pool).await?;
    create_observations_table(&pool).await?;
    create_settings_table(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create the items table
///
/// One row per produced/producible artifact. Rows are never deleted;
/// append-only history feeds the velocity engine.
pub async fn create_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            key TEXT PRIMARY KEY,
            external_id TEXT,
            status TEXT NOT NULL CHECK (status IN ('PENDING', 'CREATING', 'CREATED', 'UPLOADED', 'ANALYZED')),
            category TEXT NOT NULL,
            voice TEXT NOT NULL,
            visual_style TEXT NOT NULL,
            published_at INTEGER,
            script TEXT,
            prompt TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK ((external_id IS NULL) = (status IN ('PENDING', 'CREATING', 'CREATED'))),
            CHECK ((published_at IS NULL) = (external_id IS NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_status ON items(status)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_items_profile ON items(category, voice, visual_style)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the observations table
///
/// Append-only performance log, many rows per item, ordered by observed_at.
pub async fn create_observations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_key TEXT NOT NULL REFERENCES items(key),
            observed_at INTEGER NOT NULL,
            views INTEGER NOT NULL,
            likes INTEGER NOT NULL,
            comments INTEGER NOT NULL,
            CHECK (views >= 0),
            CHECK (likes >= 0),
            CHECK (comments >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_observations_item ON observations(item_key, observed_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores the operator configuration surface as key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// Ensures every tunable exists; NULL values are reset to defaults.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Selection policy
    ensure_setting(pool, "exploit_probability", "0.8").await?;

    // Velocity engagement weights (a comment signals more than a like,
    // a like more than a view)
    ensure_setting(pool, "weight_likes", "5.0").await?;
    ensure_setting(pool, "weight_comments", "10.0").await?;

    // Feedback collector
    ensure_setting(pool, "min_observations", "2").await?;
    ensure_setting(pool, "metrics_timeout_ms", "15000").await?;
    ensure_setting(pool, "collector_interval_secs", "3600").await?;
    ensure_setting(pool, "active_window_secs", "604800").await?; // 7 days

    // Lifecycle housekeeping
    ensure_setting(pool, "stuck_creating_secs", "86400").await?; // 1 day

    // Content profile dimensions (JSON string arrays)
    ensure_setting(
        pool,
        "categories",
        r#"["creepy pasta", "weird history fact", "shocking science fact", "uplifting personal story", "mind-bending puzzle"]"#,
    )
    .await?;
    ensure_setting(
        pool,
        "voices",
        r#"["en_US-kss-low", "en_US-ljspeech-medium", "en_US-vctk-low"]"#,
    )
    .await?;
    ensure_setting(
        pool,
        "visual_styles",
        r#"["photorealistic", "digital painting", "dark fantasy", "anime", "pixel art", "cinematic"]"#,
    )
    .await?;

    // Metrics source credential (empty = fall back to environment)
    ensure_setting(pool, "youtube_api_key", "").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?)")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if !exists {
        // INSERT OR IGNORE tolerates concurrent initialization races
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(default_value)
            .execute(pool)
            .await?;
        return Ok(());
    }

    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if value.is_none() {
        sqlx::query("UPDATE settings SET value = ?, updated_at = CURRENT_TIMESTAMP WHERE key = ?")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;
        warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}

/// Write a setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Read a setting value
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(value.flatten())
}
