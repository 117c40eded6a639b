//! Credit purchase records

use muselink_common::models::Transaction;
use muselink_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};
use uuid::Uuid;

use super::parse_guid;

const TRANSACTION_COLUMNS: &str =
    "guid, user_id, user_name, credits, unit_price_cents, total_cents, invoice_number, created_at";

fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
    let guid: String = row.get("guid");
    let user_id: String = row.get("user_id");
    let created_at: String = row.get("created_at");

    Ok(Transaction {
        id: parse_guid(&guid)?,
        user_id: parse_guid(&user_id)?,
        user_name: row.get("user_name"),
        credits: row.get("credits"),
        unit_price_cents: row.get("unit_price_cents"),
        total_cents: row.get("total_cents"),
        invoice_number: row.get("invoice_number"),
        created_at: time::from_db(&created_at)?,
    })
}

pub async fn insert_transaction(db: impl SqliteExecutor<'_>, tx: &Transaction) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO transactions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        TRANSACTION_COLUMNS
    ))
    .bind(tx.id.to_string())
    .bind(tx.user_id.to_string())
    .bind(&tx.user_name)
    .bind(tx.credits)
    .bind(tx.unit_price_cents)
    .bind(tx.total_cents)
    .bind(&tx.invoice_number)
    .bind(time::to_db(&tx.created_at))
    .execute(db)
    .await?;

    Ok(())
}

/// One user's purchases, newest first
pub async fn list_for_user(db: impl SqliteExecutor<'_>, user_id: Uuid) -> Result<Vec<Transaction>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM transactions WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
        TRANSACTION_COLUMNS
    ))
    .bind(user_id.to_string())
    .fetch_all(db)
    .await?;

    rows.iter().map(row_to_transaction).collect()
}

/// Every purchase, newest first
pub async fn list_all(db: impl SqliteExecutor<'_>) -> Result<Vec<Transaction>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM transactions ORDER BY created_at DESC, rowid DESC",
        TRANSACTION_COLUMNS
    ))
    .fetch_all(db)
    .await?;

    rows.iter().map(row_to_transaction).collect()
}

/// `(count, revenue in cents)` over all purchases
pub async fn totals(db: impl SqliteExecutor<'_>) -> Result<(i64, i64)> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total, COALESCE(SUM(total_cents), 0) AS revenue FROM transactions",
    )
    .fetch_one(db)
    .await?;

    Ok((row.get("total"), row.get("revenue")))
}
