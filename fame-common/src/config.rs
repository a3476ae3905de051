//! Configuration loading and database path resolution

use crate::db::init::get_setting;
use crate::{Error, Result};
use sqlx::SqlitePool;
use std::path::PathBuf;
use tracing::info;

/// Environment variable naming the database file
pub const DB_ENV_VAR: &str = "FAME_DB";

/// Environment variable carrying the metrics source API key
pub const API_KEY_ENV_VAR: &str = "FAME_YOUTUBE_API_KEY";

/// Resolve the database path, in priority order:
/// 1. Command-line argument (highest priority)
/// 2. `FAME_DB` environment variable
/// 3. TOML config file (`database` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_database_path(cli_arg: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(DB_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = find_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(database) = config.get("database").and_then(|v| v.as_str()) {
                    return PathBuf::from(database);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_database_path()
}

/// Locate the platform config file (`<config dir>/fameloop/config.toml`)
fn find_config_file() -> Result<PathBuf> {
    let path = dirs::config_dir()
        .map(|d| d.join("fameloop").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {}", path.display())))
    }
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("fameloop"))
        .unwrap_or_else(|| PathBuf::from("./fameloop_data"))
        .join("fameloop.db")
}

/// Resolve the metrics source API key
///
/// **Priority:** Database (`youtube_api_key` setting) → environment.
/// The database tier is authoritative so operators can rotate the key with
/// `fame-ctl` without touching the collector's environment.
pub async fn resolve_api_key(pool: &SqlitePool) -> Result<String> {
    if let Some(key) = get_setting(pool, "youtube_api_key").await? {
        if !key.trim().is_empty() {
            info!("Metrics API key loaded from database");
            return Ok(key);
        }
    }

    if let Ok(key) = std::env::var(API_KEY_ENV_VAR) {
        if !key.trim().is_empty() {
            info!("Metrics API key loaded from environment variable");
            return Ok(key);
        }
    }

    Err(Error::Config(format!(
        "Metrics API key not configured. Set the 'youtube_api_key' setting \
         or export {API_KEY_ENV_VAR}."
    )))
}
