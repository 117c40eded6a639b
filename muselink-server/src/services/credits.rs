//! Credit purchases
//!
//! Payment capture happens outside this service; a purchase here records
//! the sale and credits the artist's balance.

use chrono::{DateTime, Utc};
use muselink_common::db::settings;
use muselink_common::models::{Role, Transaction, User};
use muselink_common::retry::retry_on_lock;
use muselink_common::{time, Error, Result};
use rand::Rng;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::require_role;
use crate::db::{transactions, users};

/// Largest number of credits bought in one purchase
pub const MAX_PURCHASE_CREDITS: i64 = 1000;

/// Purchase result: the recorded sale and the artist's new balance
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseReceipt {
    pub transaction: Transaction,
    pub credits: i64,
}

/// Current unit price
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CreditPrice {
    pub credit_price_cents: i64,
}

/// `INV-<last 6 digits of unix ms>-<0..999>`
fn invoice_number(now: &DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().rem_euclid(1_000_000);
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("INV-{:06}-{}", millis, suffix)
}

pub async fn credit_price(db: &SqlitePool) -> Result<CreditPrice> {
    Ok(CreditPrice {
        credit_price_cents: settings::get_credit_price_cents(db).await?,
    })
}

/// Buy `amount` credits at the price in effect now
pub async fn purchase(db: &SqlitePool, artist: &User, amount: i64) -> Result<PurchaseReceipt> {
    require_role(artist, &[Role::Artist], "buy credits")?;

    if !(1..=MAX_PURCHASE_CREDITS).contains(&amount) {
        return Err(Error::InvalidInput(format!(
            "Credits must be between 1 and {}",
            MAX_PURCHASE_CREDITS
        )));
    }

    let unit_price_cents = settings::get_credit_price_cents(db).await?;
    let total_cents = amount
        .checked_mul(unit_price_cents)
        .ok_or_else(|| Error::InvalidInput("Purchase total is too large".to_string()))?;

    let max_wait_ms = settings::get_max_lock_wait_ms(db).await?;
    let receipt = retry_on_lock("purchase", max_wait_ms, || async move {
        let now = time::now();
        let mut tx = db.begin().await?;

        let credits = users::add_credits(&mut *tx, artist.id, amount, &now)
            .await?
            .ok_or_else(|| Error::NotFound(format!("User {}", artist.id)))?;

        let transaction = Transaction {
            id: Uuid::new_v4(),
            user_id: artist.id,
            user_name: artist.name.clone(),
            credits: amount,
            unit_price_cents,
            total_cents,
            invoice_number: invoice_number(&now),
            created_at: now,
        };
        transactions::insert_transaction(&mut *tx, &transaction).await?;
        tx.commit().await?;

        Ok(PurchaseReceipt {
            transaction,
            credits,
        })
    })
    .await?;

    info!(
        artist_id = %artist.id,
        credits = amount,
        total_cents,
        invoice = %receipt.transaction.invoice_number,
        "Credits purchased"
    );

    Ok(receipt)
}

/// The caller's own purchases, newest first
pub async fn list_transactions(db: &SqlitePool, user: &User) -> Result<Vec<Transaction>> {
    transactions::list_for_user(db, user.id).await
}
