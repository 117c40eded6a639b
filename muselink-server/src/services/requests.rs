//! Client requests: create, edit, delete and browse
//!
//! Contact details never travel with a request. Artists get them only
//! through the unlock service.

use muselink_common::db::settings;
use muselink_common::models::{Genre, MusicRequest, RequestStatus, Role, User};
use muselink_common::{time, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::require_role;
use crate::db::requests::{self as store, RequestFilter};

/// Upper bound a client may choose for `max_unlocks`
pub const MAX_UNLOCKS_LIMIT: i64 = 50;

/// Editable request fields
///
/// On update every field replaces the stored one, except `max_unlocks`
/// which keeps its current value when omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestFields {
    pub title: String,
    pub description: String,
    pub genre: Genre,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub budget: Option<i64>,
    #[serde(default)]
    pub max_unlocks: Option<i64>,
}

/// A request as shown to callers
#[derive(Debug, Clone, Serialize)]
pub struct RequestView {
    #[serde(flatten)]
    pub request: MusicRequest,
    pub remaining_unlocks: i64,
}

impl From<MusicRequest> for RequestView {
    fn from(request: MusicRequest) -> Self {
        Self {
            remaining_unlocks: request.remaining_unlocks(),
            request,
        }
    }
}

/// Fields after validation
struct Validated {
    title: String,
    description: String,
    genre: Genre,
    event_date: Option<chrono::NaiveDate>,
    budget: Option<i64>,
    max_unlocks: Option<i64>,
}

fn validate(fields: RequestFields) -> Result<Validated> {
    let title = fields.title.trim().to_string();
    let description = fields.description.trim().to_string();

    if title.is_empty() {
        return Err(Error::InvalidInput("Title is required".to_string()));
    }
    if description.is_empty() {
        return Err(Error::InvalidInput("Description is required".to_string()));
    }
    if let Some(budget) = fields.budget {
        if budget < 0 {
            return Err(Error::InvalidInput("Budget cannot be negative".to_string()));
        }
    }
    if let Some(max) = fields.max_unlocks {
        if !(1..=MAX_UNLOCKS_LIMIT).contains(&max) {
            return Err(Error::InvalidInput(format!(
                "max_unlocks must be between 1 and {}",
                MAX_UNLOCKS_LIMIT
            )));
        }
    }

    let event_date = fields
        .event_date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(time::parse_date)
        .transpose()?;

    Ok(Validated {
        title,
        description,
        genre: fields.genre,
        event_date,
        budget: fields.budget,
        max_unlocks: fields.max_unlocks,
    })
}

/// Load a request the caller owns
async fn load_owned(db: &SqlitePool, client: &User, id: Uuid) -> Result<MusicRequest> {
    let request = store::find_by_id(db, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Request {}", id)))?;

    if request.client_id != client.id {
        return Err(Error::Forbidden(
            "Only the owner may change this request".to_string(),
        ));
    }
    Ok(request)
}

pub async fn create(db: &SqlitePool, client: &User, fields: RequestFields) -> Result<RequestView> {
    require_role(client, &[Role::Client], "post requests")?;
    let fields = validate(fields)?;

    let max_unlocks = match fields.max_unlocks {
        Some(max) => max,
        None => settings::get_default_max_unlocks(db)
            .await?
            .clamp(1, MAX_UNLOCKS_LIMIT),
    };

    let now = time::now();
    let request = MusicRequest {
        id: Uuid::new_v4(),
        client_id: client.id,
        title: fields.title,
        description: fields.description,
        genre: fields.genre,
        event_date: fields.event_date,
        budget: fields.budget,
        max_unlocks,
        unlock_count: 0,
        status: RequestStatus::Open,
        created_at: now,
        updated_at: now,
    };

    store::insert_request(db, &request).await?;
    info!(request_id = %request.id, client_id = %client.id, "Request created");

    Ok(request.into())
}

pub async fn update(
    db: &SqlitePool,
    client: &User,
    id: Uuid,
    fields: RequestFields,
) -> Result<RequestView> {
    require_role(client, &[Role::Client], "edit requests")?;
    let fields = validate(fields)?;
    let current = load_owned(db, client, id).await?;

    let max_unlocks = fields.max_unlocks.unwrap_or(current.max_unlocks);
    if max_unlocks < current.unlock_count {
        return Err(Error::Conflict(format!(
            "max_unlocks cannot drop below the {} unlocks already made",
            current.unlock_count
        )));
    }

    let updated = MusicRequest {
        title: fields.title,
        description: fields.description,
        genre: fields.genre,
        event_date: fields.event_date,
        budget: fields.budget,
        max_unlocks,
        updated_at: time::now(),
        ..current
    };

    let stored = store_update(db, &updated).await?;

    info!(request_id = %id, "Request updated");
    Ok(stored.into())
}

/// Write an edit and read back the stored row
///
/// The row may have changed since it was loaded: a missing row means it was
/// deleted, anything else means an unlock pushed the count above the new cap.
async fn store_update(db: &SqlitePool, updated: &MusicRequest) -> Result<MusicRequest> {
    let written = store::update_request(db, updated).await?;

    match store::find_by_id(db, updated.id).await? {
        None => Err(Error::NotFound(format!("Request {}", updated.id))),
        Some(stored) if written => Ok(stored),
        Some(stored) => Err(Error::Conflict(format!(
            "max_unlocks cannot drop below the {} unlocks already made",
            stored.unlock_count
        ))),
    }
}

pub async fn delete(db: &SqlitePool, client: &User, id: Uuid) -> Result<()> {
    require_role(client, &[Role::Client], "delete requests")?;
    load_owned(db, client, id).await?;

    if !store::delete_unlocked_free(db, id).await? {
        return Err(Error::Conflict(
            "A request that artists have unlocked cannot be deleted".to_string(),
        ));
    }

    info!(request_id = %id, "Request deleted");
    Ok(())
}

/// Open requests for artists and admins
pub async fn list_open(
    db: &SqlitePool,
    caller: &User,
    filter: &RequestFilter,
) -> Result<Vec<RequestView>> {
    require_role(caller, &[Role::Artist, Role::Admin], "browse open requests")?;
    let requests = store::list_open(db, filter).await?;
    Ok(requests.into_iter().map(RequestView::from).collect())
}

pub async fn list_for_client(db: &SqlitePool, client: &User) -> Result<Vec<RequestView>> {
    require_role(client, &[Role::Client], "list own requests")?;
    let requests = store::list_by_client(db, client.id).await?;
    Ok(requests.into_iter().map(RequestView::from).collect())
}

pub async fn get(db: &SqlitePool, id: Uuid) -> Result<RequestView> {
    store::find_by_id(db, id)
        .await?
        .map(RequestView::from)
        .ok_or_else(|| Error::NotFound(format!("Request {}", id)))
}
