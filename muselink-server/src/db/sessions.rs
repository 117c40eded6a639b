//! Session persistence
//!
//! Rows are keyed by the SHA-256 digest of the bearer token; the token
//! itself never reaches the database.

use chrono::{DateTime, Utc};
use muselink_common::models::User;
use muselink_common::{time, Result};
use sqlx::SqliteExecutor;
use uuid::Uuid;

pub async fn insert_session(
    db: impl SqliteExecutor<'_>,
    token_hash: &str,
    user_id: Uuid,
    created_at: &DateTime<Utc>,
    expires_at: &DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(token_hash)
    .bind(user_id.to_string())
    .bind(time::to_db(created_at))
    .bind(time::to_db(expires_at))
    .execute(db)
    .await?;

    Ok(())
}

/// Owner of a live session; `None` for unknown or expired tokens
pub async fn find_session_user_id(
    db: impl SqliteExecutor<'_>,
    token_hash: &str,
    now: &DateTime<Utc>,
) -> Result<Option<Uuid>> {
    let user_id: Option<String> =
        sqlx::query_scalar("SELECT user_id FROM sessions WHERE token_hash = ? AND expires_at > ?")
            .bind(token_hash)
            .bind(time::to_db(now))
            .fetch_optional(db)
            .await?;

    user_id.as_deref().map(super::parse_guid).transpose()
}

/// Resolve a session straight to its user
pub async fn find_session_user(
    db: &sqlx::SqlitePool,
    token_hash: &str,
    now: &DateTime<Utc>,
) -> Result<Option<User>> {
    match find_session_user_id(db, token_hash, now).await? {
        Some(user_id) => super::users::find_by_id(db, user_id).await,
        None => Ok(None),
    }
}

/// Returns true when a session was removed
pub async fn delete_session(db: impl SqliteExecutor<'_>, token_hash: &str) -> Result<bool> {
    let deleted = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(token_hash)
        .execute(db)
        .await?
        .rows_affected();

    Ok(deleted > 0)
}

/// Drop every expired session; returns the number removed
pub async fn purge_expired(db: impl SqliteExecutor<'_>, now: &DateTime<Utc>) -> Result<u64> {
    let purged = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(time::to_db(now))
        .execute(db)
        .await?
        .rows_affected();

    Ok(purged)
}
