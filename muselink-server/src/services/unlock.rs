//! Contact unlocks
//!
//! An artist spends one credit to reveal the contact details behind a
//! request. The check-and-mutate sequence runs in one SQLite transaction:
//!
//! 1. Already unlocked by this artist: return the contact, charge nothing
//! 2. `credits > 0` guarded decrement, else `InsufficientCredits`
//! 3. `unlock_count < max_unlocks` guarded increment, else `Conflict`
//! 4. Insert the (artist, request) row
//!
//! Any guard that matches no row aborts the transaction, so a rejected
//! unlock leaves no trace. Two artists racing for the last slot both read
//! the same snapshot; the loser's write fails with "database is locked"
//! and the retry re-runs the whole sequence against fresh state.

use chrono::{DateTime, Utc};
use muselink_common::db::settings;
use muselink_common::models::{Contact, RequestStatus, Role, User};
use muselink_common::retry::retry_on_lock;
use muselink_common::{time, Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use super::require_role;
use super::requests::RequestView;
use crate::db::{requests, unlocks, users};

/// Result of an unlock call
#[derive(Debug, Clone, Serialize)]
pub struct UnlockOutcome {
    pub request_id: Uuid,
    pub contact: Contact,
    /// Artist balance after the call
    pub credits: i64,
    /// True when the artist had already paid for this request
    pub already_unlocked: bool,
    pub unlock_count: i64,
    pub max_unlocks: i64,
    pub status: RequestStatus,
}

/// An unlocked request as listed for its artist
#[derive(Debug, Clone, Serialize)]
pub struct UnlockedView {
    #[serde(flatten)]
    pub request: RequestView,
    pub contact: Contact,
    pub unlocked_at: DateTime<Utc>,
}

/// Spend one credit to reveal the contact behind `request_id`
pub async fn unlock(db: &SqlitePool, artist: &User, request_id: Uuid) -> Result<UnlockOutcome> {
    require_role(artist, &[Role::Artist], "unlock requests")?;

    let max_wait_ms = settings::get_max_lock_wait_ms(db).await?;
    let outcome = retry_on_lock("unlock", max_wait_ms, || {
        try_unlock(db, artist.id, request_id)
    })
    .await?;

    if outcome.already_unlocked {
        debug!(artist_id = %artist.id, request_id = %request_id, "Request already unlocked");
    } else {
        info!(
            artist_id = %artist.id,
            request_id = %request_id,
            credits = outcome.credits,
            unlock_count = outcome.unlock_count,
            "Request unlocked"
        );
    }

    Ok(outcome)
}

/// One attempt; dropping `tx` on an early return rolls everything back
async fn try_unlock(db: &SqlitePool, artist_id: Uuid, request_id: Uuid) -> Result<UnlockOutcome> {
    let mut tx = db.begin().await?;

    let request = requests::find_by_id(&mut *tx, request_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Request {}", request_id)))?;

    let contact = users::find_contact(&mut *tx, request.client_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Request {} has no client", request_id)))?;

    if unlocks::exists(&mut *tx, artist_id, request_id).await? {
        let credits = users::get_credits(&mut *tx, artist_id).await?.unwrap_or(0);
        tx.commit().await?;

        return Ok(UnlockOutcome {
            request_id,
            contact,
            credits,
            already_unlocked: true,
            unlock_count: request.unlock_count,
            max_unlocks: request.max_unlocks,
            status: request.status,
        });
    }

    let now = time::now();

    let Some(credits) = users::spend_credit(&mut *tx, artist_id, &now).await? else {
        let balance = users::get_credits(&mut *tx, artist_id).await?.unwrap_or(0);
        return Err(Error::InsufficientCredits { balance });
    };

    let Some((unlock_count, status)) = requests::take_slot(&mut *tx, request_id, &now).await?
    else {
        return Err(Error::Conflict(format!(
            "Request {} has reached its unlock limit",
            request_id
        )));
    };

    unlocks::insert_unlock(&mut *tx, artist_id, request_id, &now).await?;
    tx.commit().await?;

    Ok(UnlockOutcome {
        request_id,
        contact,
        credits,
        already_unlocked: false,
        unlock_count,
        max_unlocks: request.max_unlocks,
        status,
    })
}

/// Requests this artist has unlocked, newest unlock first
pub async fn list_unlocked(db: &SqlitePool, artist: &User) -> Result<Vec<UnlockedView>> {
    require_role(artist, &[Role::Artist], "list unlocked requests")?;

    let rows = unlocks::list_for_artist(db, artist.id).await?;
    Ok(rows
        .into_iter()
        .map(|row| UnlockedView {
            request: row.request.into(),
            contact: row.contact,
            unlocked_at: row.unlocked_at,
        })
        .collect())
}
