//! Unlock records: one row per (artist, request) pair

use chrono::{DateTime, Utc};
use muselink_common::models::{Contact, MusicRequest};
use muselink_common::{time, Error, Result};
use sqlx::{Row, SqliteExecutor};
use uuid::Uuid;

use super::requests::row_to_request;

/// An unlocked request together with the contact it revealed
#[derive(Debug, Clone)]
pub struct UnlockedRequest {
    pub request: MusicRequest,
    pub contact: Contact,
    pub unlocked_at: DateTime<Utc>,
}

pub async fn exists(db: impl SqliteExecutor<'_>, artist_id: Uuid, request_id: Uuid) -> Result<bool> {
    let found: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM unlocks WHERE artist_id = ? AND request_id = ?)",
    )
    .bind(artist_id.to_string())
    .bind(request_id.to_string())
    .fetch_one(db)
    .await?;

    Ok(found)
}

/// Record an unlock
///
/// The primary key rejects a second row for the same pair; that surfaces
/// as `Conflict`.
pub async fn insert_unlock(
    db: impl SqliteExecutor<'_>,
    artist_id: Uuid,
    request_id: Uuid,
    now: &DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query("INSERT INTO unlocks (artist_id, request_id, created_at) VALUES (?, ?, ?)")
        .bind(artist_id.to_string())
        .bind(request_id.to_string())
        .bind(time::to_db(now))
        .execute(db)
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            let err = Error::from(e);
            if err.is_unique_violation() {
                Err(Error::Conflict("Request already unlocked".to_string()))
            } else {
                Err(err)
            }
        }
    }
}

/// Requests an artist has unlocked, newest unlock first
pub async fn list_for_artist(
    db: impl SqliteExecutor<'_>,
    artist_id: Uuid,
) -> Result<Vec<UnlockedRequest>> {
    let rows = sqlx::query(
        r#"
        SELECT r.guid, r.client_id, r.title, r.description, r.genre, r.event_date, r.budget,
               r.max_unlocks, r.unlock_count, r.status, r.created_at, r.updated_at,
               c.name AS contact_name, c.email AS contact_email, c.phone AS contact_phone,
               u.created_at AS unlocked_at
        FROM unlocks u
        JOIN requests r ON r.guid = u.request_id
        JOIN users c ON c.guid = r.client_id
        WHERE u.artist_id = ?
        ORDER BY u.created_at DESC, u.rowid DESC
        "#,
    )
    .bind(artist_id.to_string())
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|row| {
            let unlocked_at: String = row.get("unlocked_at");
            Ok(UnlockedRequest {
                request: row_to_request(row)?,
                contact: Contact {
                    name: row.get("contact_name"),
                    email: row.get("contact_email"),
                    phone: row.get("contact_phone"),
                },
                unlocked_at: time::from_db(&unlocked_at)?,
            })
        })
        .collect()
}

pub async fn count(db: impl SqliteExecutor<'_>) -> Result<i64> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM unlocks")
        .fetch_one(db)
        .await?;
    Ok(total)
}
