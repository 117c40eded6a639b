//! Database initialization
//!
//! Creates the database on first run, applies the schema and fills in
//! default settings. Every step is idempotent, so
//! the server calls [`init_database`] on every start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::settings::{ensure_setting, get_setting, keys, DEFAULT_SETTINGS};

/// Busy timeout applied before the settings table can be read
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut pool = connect_pool(db_path, DEFAULT_BUSY_TIMEOUT_MS).await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_settings_table(&pool).await?;
    create_users_table(&pool).await?;
    create_sessions_table(&pool).await?;
    create_requests_table(&pool).await?;
    create_unlocks_table(&pool).await?;
    create_transactions_table(&pool).await?;

    init_default_settings(&pool).await?;

    let timeout_ms: u64 = get_setting(&pool, keys::DB_BUSY_TIMEOUT_MS)
        .await?
        .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS);

    // busy_timeout is per connection, so a changed value needs a fresh pool
    if timeout_ms != DEFAULT_BUSY_TIMEOUT_MS {
        pool.close().await;
        pool = connect_pool(db_path, timeout_ms).await?;
    }

    info!("Database busy timeout set to {} ms", timeout_ms);

    Ok(pool)
}

/// Open a pool whose every connection runs with WAL, foreign keys and the
/// given busy timeout
async fn connect_pool(db_path: &Path, busy_timeout_ms: u64) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(16)
        .min_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create the settings table
///
/// Stores system configuration key-value pairs.
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

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('client', 'artist', 'admin')),
            phone TEXT,
            credits INTEGER NOT NULL DEFAULT 0 CHECK (credits >= 0),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the requests table
///
/// CHECK constraints mirror the unlock guards (count never above the cap).
pub async fn create_requests_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS requests (
            guid TEXT PRIMARY KEY,
            client_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            genre TEXT NOT NULL,
            event_date TEXT,
            budget INTEGER CHECK (budget IS NULL OR budget >= 0),
            max_unlocks INTEGER NOT NULL CHECK (max_unlocks >= 1),
            unlock_count INTEGER NOT NULL DEFAULT 0
                CHECK (unlock_count >= 0 AND unlock_count <= max_unlocks),
            status TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'closed')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_requests_client ON requests(client_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_requests_status ON requests(status, created_at)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_unlocks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS unlocks (
            artist_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            request_id TEXT NOT NULL REFERENCES requests(guid) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            PRIMARY KEY (artist_id, request_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_unlocks_request ON unlocks(request_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_transactions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            user_name TEXT NOT NULL,
            credits INTEGER NOT NULL CHECK (credits > 0),
            unit_price_cents INTEGER NOT NULL CHECK (unit_price_cents >= 0),
            total_cents INTEGER NOT NULL CHECK (total_cents >= 0),
            invoice_number TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Initialize or repair default settings
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    for (key, default_value) in DEFAULT_SETTINGS {
        ensure_setting(pool, key, default_value).await?;
    }

    info!("Default settings initialized");
    Ok(())
}
