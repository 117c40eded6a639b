//! Settings database operations
//!
//! Key-value accessors for the `settings` table. Values are stored as TEXT
//! and parsed on read, so a hand-edited database with a bad value surfaces
//! as a configuration error instead of a silent default.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::{Error, Result};

/// Setting keys
pub mod keys {
    pub const CREDIT_PRICE_CENTS: &str = "credit_price_cents";
    pub const ARTIST_SIGNUP_CREDITS: &str = "artist_signup_credits";
    pub const DEFAULT_MAX_UNLOCKS: &str = "default_max_unlocks";
    pub const SESSION_TIMEOUT_SECONDS: &str = "session_timeout_seconds";
    pub const DB_BUSY_TIMEOUT_MS: &str = "db_busy_timeout_ms";
    pub const DB_MAX_LOCK_WAIT_MS: &str = "db_max_lock_wait_ms";
}

/// Default value of every setting, created on startup when missing
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    (keys::CREDIT_PRICE_CENTS, "200"),
    (keys::ARTIST_SIGNUP_CREDITS, "3"),
    (keys::DEFAULT_MAX_UNLOCKS, "3"),
    (keys::SESSION_TIMEOUT_SECONDS, "2592000"), // 30 days
    (keys::DB_BUSY_TIMEOUT_MS, "5000"),
    (keys::DB_MAX_LOCK_WAIT_MS, "5000"),
];

/// Read and parse a setting; `None` when the key is absent or NULL
pub async fn get_setting<T>(db: &SqlitePool, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match row.and_then(|(value,)| value) {
        Some(value) => {
            let parsed = value.parse::<T>().map_err(|e| {
                Error::Config(format!("Parse setting '{}' failed: {}", key, e))
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Insert or overwrite a setting
pub async fn set_setting<T>(db: &SqlitePool, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    // INSERT OR IGNORE tolerates two processes initializing the same database
    let inserted = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?
        .rows_affected();

    if inserted > 0 {
        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let repaired = sqlx::query("UPDATE settings SET value = ? WHERE key = ? AND value IS NULL")
        .bind(default_value)
        .bind(key)
        .execute(pool)
        .await?
        .rows_affected();

    if repaired > 0 {
        warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}

fn default_for(key: &str) -> i64 {
    DEFAULT_SETTINGS
        .iter()
        .find(|(k, _)| *k == key)
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0)
}

async fn get_i64(db: &SqlitePool, key: &str) -> Result<i64> {
    Ok(get_setting::<i64>(db, key)
        .await?
        .unwrap_or_else(|| default_for(key)))
}

/// Current price of one credit, in cents
pub async fn get_credit_price_cents(db: &SqlitePool) -> Result<i64> {
    get_i64(db, keys::CREDIT_PRICE_CENTS).await
}

/// Update the price of one credit
pub async fn set_credit_price_cents(db: &SqlitePool, cents: i64) -> Result<()> {
    if cents < 0 {
        return Err(Error::InvalidInput(
            "Credit price cannot be negative".to_string(),
        ));
    }
    set_setting(db, keys::CREDIT_PRICE_CENTS, cents).await
}

/// Credits granted to a newly registered artist
pub async fn get_artist_signup_credits(db: &SqlitePool) -> Result<i64> {
    get_i64(db, keys::ARTIST_SIGNUP_CREDITS).await
}

/// Unlock cap applied when a client does not choose one
pub async fn get_default_max_unlocks(db: &SqlitePool) -> Result<i64> {
    get_i64(db, keys::DEFAULT_MAX_UNLOCKS).await
}

/// Session lifetime in seconds
pub async fn get_session_timeout_seconds(db: &SqlitePool) -> Result<i64> {
    get_i64(db, keys::SESSION_TIMEOUT_SECONDS).await
}

/// Upper bound on retrying a transaction that hit lock contention
pub async fn get_max_lock_wait_ms(db: &SqlitePool) -> Result<u64> {
    Ok(get_i64(db, keys::DB_MAX_LOCK_WAIT_MS).await?.max(0) as u64)
}
