//! Admin operations: pricing, statistics and data export

use chrono::{DateTime, Utc};
use muselink_common::db::settings;
use muselink_common::models::{MusicRequest, Role, SystemConfig, Transaction, User};
use muselink_common::{time, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use super::require_role;
use crate::db::{requests, transactions, unlocks, users};

/// Aggregate marketplace figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub revenue_cents: i64,
    pub clients: i64,
    pub artists: i64,
    pub requests: i64,
    pub open_requests: i64,
    pub unlocks: i64,
    pub transactions: i64,
    pub credits_in_circulation: i64,
}

/// Full data snapshot
#[derive(Debug, Clone, Serialize)]
pub struct Export {
    pub exported_at: DateTime<Utc>,
    pub config: SystemConfig,
    pub users: Vec<User>,
    pub requests: Vec<MusicRequest>,
    pub transactions: Vec<Transaction>,
}

fn require_admin(user: &User) -> Result<()> {
    require_role(user, &[Role::Admin], "use admin operations")
}

pub async fn get_config(db: &SqlitePool, admin: &User) -> Result<SystemConfig> {
    require_admin(admin)?;
    Ok(SystemConfig {
        credit_price_cents: settings::get_credit_price_cents(db).await?,
    })
}

/// Change the credit price; applies to the next purchase
pub async fn set_credit_price(db: &SqlitePool, admin: &User, cents: i64) -> Result<SystemConfig> {
    require_admin(admin)?;
    settings::set_credit_price_cents(db, cents).await?;
    info!(admin_id = %admin.id, credit_price_cents = cents, "Credit price updated");

    Ok(SystemConfig {
        credit_price_cents: cents,
    })
}

pub async fn stats(db: &SqlitePool, admin: &User) -> Result<Stats> {
    require_admin(admin)?;

    let (transaction_count, revenue_cents) = transactions::totals(db).await?;
    let (request_count, open_requests) = requests::count(db).await?;

    Ok(Stats {
        revenue_cents,
        clients: users::count_by_role(db, Role::Client).await?,
        artists: users::count_by_role(db, Role::Artist).await?,
        requests: request_count,
        open_requests,
        unlocks: unlocks::count(db).await?,
        transactions: transaction_count,
        credits_in_circulation: users::sum_artist_credits(db).await?,
    })
}

pub async fn list_users(db: &SqlitePool, admin: &User) -> Result<Vec<User>> {
    require_admin(admin)?;
    users::list_all(db).await
}

pub async fn list_transactions(db: &SqlitePool, admin: &User) -> Result<Vec<Transaction>> {
    require_admin(admin)?;
    transactions::list_all(db).await
}

pub async fn export(db: &SqlitePool, admin: &User) -> Result<Export> {
    require_admin(admin)?;

    let export = Export {
        exported_at: time::now(),
        config: SystemConfig {
            credit_price_cents: settings::get_credit_price_cents(db).await?,
        },
        users: users::list_all(db).await?,
        requests: requests::list_all(db).await?,
        transactions: transactions::list_all(db).await?,
    };

    info!(
        admin_id = %admin.id,
        users = export.users.len(),
        requests = export.requests.len(),
        transactions = export.transactions.len(),
        "Data exported"
    );
    Ok(export)
}
