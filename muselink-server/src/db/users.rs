//! User account persistence

use chrono::{DateTime, Utc};
use muselink_common::models::{Contact, Role, User};
use muselink_common::{time, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};
use uuid::Uuid;

use super::parse_guid;

const USER_COLUMNS: &str = "guid, name, email, role, phone, credits, created_at";

fn row_to_user(row: &SqliteRow) -> Result<User> {
    let guid: String = row.get("guid");
    let role: String = row.get("role");
    let created_at: String = row.get("created_at");

    Ok(User {
        id: parse_guid(&guid)?,
        name: row.get("name"),
        email: row.get("email"),
        role: role.parse()?,
        phone: row.get("phone"),
        credits: row.get("credits"),
        created_at: time::from_db(&created_at)?,
    })
}

/// Insert a new account
///
/// A duplicate email (case-insensitive) is reported as `Conflict`.
pub async fn insert_user(
    db: impl SqliteExecutor<'_>,
    user: &User,
    password_hash: &str,
) -> Result<()> {
    let created_at = time::to_db(&user.created_at);

    let result = sqlx::query(
        r#"
        INSERT INTO users (guid, name, email, password_hash, role, phone, credits, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id.to_string())
    .bind(&user.name)
    .bind(&user.email)
    .bind(password_hash)
    .bind(user.role.as_str())
    .bind(&user.phone)
    .bind(user.credits)
    .bind(&created_at)
    .bind(&created_at)
    .execute(db)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            let err = Error::from(e);
            if err.is_unique_violation() {
                Err(Error::Conflict(format!("Email already registered: {}", user.email)))
            } else {
                Err(err)
            }
        }
    }
}

/// Load a user by id
pub async fn find_by_id(db: impl SqliteExecutor<'_>, id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE guid = ?", USER_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;

    row.as_ref().map(row_to_user).transpose()
}

/// Load a user and their stored password hash by email
pub async fn find_credentials(
    db: impl SqliteExecutor<'_>,
    email: &str,
) -> Result<Option<(User, String)>> {
    let row = sqlx::query(&format!(
        "SELECT {}, password_hash FROM users WHERE email = ?",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(db)
    .await?;

    match row {
        Some(row) => {
            let user = row_to_user(&row)?;
            let hash: String = row.get("password_hash");
            Ok(Some((user, hash)))
        }
        None => Ok(None),
    }
}

/// All users, oldest first
pub async fn list_all(db: impl SqliteExecutor<'_>) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM users ORDER BY created_at ASC, rowid ASC",
        USER_COLUMNS
    ))
    .fetch_all(db)
    .await?;

    rows.iter().map(row_to_user).collect()
}

/// Current credit balance
pub async fn get_credits(db: impl SqliteExecutor<'_>, id: Uuid) -> Result<Option<i64>> {
    let credits: Option<i64> = sqlx::query_scalar("SELECT credits FROM users WHERE guid = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;

    Ok(credits)
}

/// Take one credit from an artist's balance
///
/// Guarded on `credits > 0`; returns the new balance, or `None` when the
/// guard matched no row.
pub async fn spend_credit(
    db: impl SqliteExecutor<'_>,
    id: Uuid,
    now: &DateTime<Utc>,
) -> Result<Option<i64>> {
    let balance: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE users SET credits = credits - 1, updated_at = ?
        WHERE guid = ? AND role = 'artist' AND credits > 0
        RETURNING credits
        "#,
    )
    .bind(time::to_db(now))
    .bind(id.to_string())
    .fetch_optional(db)
    .await?;

    Ok(balance)
}

/// Add purchased credits; returns the new balance
pub async fn add_credits(
    db: impl SqliteExecutor<'_>,
    id: Uuid,
    amount: i64,
    now: &DateTime<Utc>,
) -> Result<Option<i64>> {
    let balance: Option<i64> = sqlx::query_scalar(
        "UPDATE users SET credits = credits + ?, updated_at = ? WHERE guid = ? RETURNING credits",
    )
    .bind(amount)
    .bind(time::to_db(now))
    .bind(id.to_string())
    .fetch_optional(db)
    .await?;

    Ok(balance)
}

/// Contact fields of a user
pub async fn find_contact(db: impl SqliteExecutor<'_>, id: Uuid) -> Result<Option<Contact>> {
    let row = sqlx::query("SELECT name, email, phone FROM users WHERE guid = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;

    Ok(row.map(|row| Contact {
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
    }))
}

/// Number of accounts holding a role
pub async fn count_by_role(db: impl SqliteExecutor<'_>, role: Role) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?")
        .bind(role.as_str())
        .fetch_one(db)
        .await?;

    Ok(count)
}

/// Sum of all artist balances
pub async fn sum_artist_credits(db: impl SqliteExecutor<'_>) -> Result<i64> {
    let total: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(credits), 0) FROM users WHERE role = 'artist'")
            .fetch_one(db)
            .await?;

    Ok(total)
}
