//! Request persistence
//!
//! `status` is always written together with the counters it derives from.
//! The guarded [`take_slot`] update is the only place `unlock_count` grows.

use chrono::{DateTime, NaiveDate, Utc};
use muselink_common::models::{Genre, MusicRequest, RequestStatus};
use muselink_common::{time, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};
use uuid::Uuid;

use super::parse_guid;

const REQUEST_COLUMNS: &str = "guid, client_id, title, description, genre, event_date, budget, \
     max_unlocks, unlock_count, status, created_at, updated_at";

/// Sort order for open-request listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

impl std::str::FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            other => Err(Error::InvalidInput(format!(
                "Unknown sort '{}', expected newest or oldest",
                other
            ))),
        }
    }
}

/// Filter for listing open requests
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub genre: Option<Genre>,
    /// Case-insensitive substring of the title
    pub search: Option<String>,
    pub sort: SortOrder,
}

pub(crate) fn row_to_request(row: &SqliteRow) -> Result<MusicRequest> {
    let guid: String = row.get("guid");
    let client_id: String = row.get("client_id");
    let genre: String = row.get("genre");
    let event_date: Option<String> = row.get("event_date");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    let event_date = event_date
        .map(|d| {
            NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                .map_err(|e| Error::Internal(format!("Corrupt event_date '{}': {}", d, e)))
        })
        .transpose()?;

    Ok(MusicRequest {
        id: parse_guid(&guid)?,
        client_id: parse_guid(&client_id)?,
        title: row.get("title"),
        description: row.get("description"),
        genre: genre.parse()?,
        event_date,
        budget: row.get("budget"),
        max_unlocks: row.get("max_unlocks"),
        unlock_count: row.get("unlock_count"),
        status: status.parse()?,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
    })
}

pub async fn insert_request(db: impl SqliteExecutor<'_>, request: &MusicRequest) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO requests (guid, client_id, title, description, genre, event_date, budget,
                              max_unlocks, unlock_count, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(request.id.to_string())
    .bind(request.client_id.to_string())
    .bind(&request.title)
    .bind(&request.description)
    .bind(request.genre.as_str())
    .bind(request.event_date.map(|d| d.format("%Y-%m-%d").to_string()))
    .bind(request.budget)
    .bind(request.max_unlocks)
    .bind(request.unlock_count)
    .bind(request.status.as_str())
    .bind(time::to_db(&request.created_at))
    .bind(time::to_db(&request.updated_at))
    .execute(db)
    .await?;

    Ok(())
}

pub async fn find_by_id(db: impl SqliteExecutor<'_>, id: Uuid) -> Result<Option<MusicRequest>> {
    let row = sqlx::query(&format!("SELECT {} FROM requests WHERE guid = ?", REQUEST_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;

    row.as_ref().map(row_to_request).transpose()
}

/// Overwrite the editable fields of a request
///
/// Guarded on `unlock_count <= max_unlocks` so a concurrent unlock cannot
/// leave the row above its new cap; returns false when the guard failed.
pub async fn update_request(db: impl SqliteExecutor<'_>, request: &MusicRequest) -> Result<bool> {
    let updated = sqlx::query(
        r#"
        UPDATE requests
        SET title = ?, description = ?, genre = ?, event_date = ?, budget = ?, max_unlocks = ?,
            status = CASE WHEN unlock_count >= ? THEN 'closed' ELSE 'open' END,
            updated_at = ?
        WHERE guid = ? AND unlock_count <= ?
        "#,
    )
    .bind(&request.title)
    .bind(&request.description)
    .bind(request.genre.as_str())
    .bind(request.event_date.map(|d| d.format("%Y-%m-%d").to_string()))
    .bind(request.budget)
    .bind(request.max_unlocks)
    .bind(request.max_unlocks)
    .bind(time::to_db(&request.updated_at))
    .bind(request.id.to_string())
    .bind(request.max_unlocks)
    .execute(db)
    .await?
    .rows_affected();

    Ok(updated > 0)
}

/// Delete a request that nobody has unlocked; returns false otherwise
pub async fn delete_unlocked_free(db: impl SqliteExecutor<'_>, id: Uuid) -> Result<bool> {
    let deleted = sqlx::query("DELETE FROM requests WHERE guid = ? AND unlock_count = 0")
        .bind(id.to_string())
        .execute(db)
        .await?
        .rows_affected();

    Ok(deleted > 0)
}

/// Claim one unlock slot
///
/// Guarded on `unlock_count < max_unlocks`. Closes the request when the
/// slot taken was the last one. Returns the new `(unlock_count, status)`,
/// or `None` when the cap was already reached.
pub async fn take_slot(
    db: impl SqliteExecutor<'_>,
    id: Uuid,
    now: &DateTime<Utc>,
) -> Result<Option<(i64, RequestStatus)>> {
    let row = sqlx::query(
        r#"
        UPDATE requests
        SET unlock_count = unlock_count + 1,
            status = CASE WHEN unlock_count + 1 >= max_unlocks THEN 'closed' ELSE 'open' END,
            updated_at = ?
        WHERE guid = ? AND unlock_count < max_unlocks
        RETURNING unlock_count, status
        "#,
    )
    .bind(time::to_db(now))
    .bind(id.to_string())
    .fetch_optional(db)
    .await?;

    match row {
        Some(row) => {
            let status: String = row.get("status");
            Ok(Some((row.get("unlock_count"), status.parse()?)))
        }
        None => Ok(None),
    }
}

/// Open requests matching a filter
pub async fn list_open(
    db: impl SqliteExecutor<'_>,
    filter: &RequestFilter,
) -> Result<Vec<MusicRequest>> {
    let order = match filter.sort {
        SortOrder::Newest => "DESC",
        SortOrder::Oldest => "ASC",
    };

    let sql = format!(
        r#"
        SELECT {cols} FROM requests
        WHERE status = 'open'
          AND (?1 IS NULL OR genre = ?1)
          AND (?2 IS NULL OR instr(lower(title), lower(?2)) > 0)
        ORDER BY created_at {order}, rowid {order}
        "#,
        cols = REQUEST_COLUMNS,
        order = order
    );

    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let rows = sqlx::query(&sql)
        .bind(filter.genre.map(|g| g.as_str()))
        .bind(search)
        .fetch_all(db)
        .await?;

    rows.iter().map(row_to_request).collect()
}

/// A client's own requests, newest first
pub async fn list_by_client(
    db: impl SqliteExecutor<'_>,
    client_id: Uuid,
) -> Result<Vec<MusicRequest>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM requests WHERE client_id = ? ORDER BY created_at DESC, rowid DESC",
        REQUEST_COLUMNS
    ))
    .bind(client_id.to_string())
    .fetch_all(db)
    .await?;

    rows.iter().map(row_to_request).collect()
}

/// Every request, newest first
pub async fn list_all(db: impl SqliteExecutor<'_>) -> Result<Vec<MusicRequest>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM requests ORDER BY created_at DESC, rowid DESC",
        REQUEST_COLUMNS
    ))
    .fetch_all(db)
    .await?;

    rows.iter().map(row_to_request).collect()
}

/// `(total, open)` request counts
pub async fn count(db: impl SqliteExecutor<'_>) -> Result<(i64, i64)> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total, COALESCE(SUM(status = 'open'), 0) AS open FROM requests",
    )
    .fetch_one(db)
    .await?;

    Ok((row.get("total"), row.get("open")))
}
