//! Request endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::AuthUser;
use crate::db::requests::{RequestFilter, SortOrder};
use crate::services::requests::{self, RequestFields, RequestView};
use crate::{ApiResult, AppState};

/// Query parameters for GET /api/requests
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub genre: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> muselink_common::Result<RequestFilter> {
        let genre = self
            .genre
            .filter(|g| !g.is_empty())
            .map(|g| g.parse())
            .transpose()?;
        let sort = match self.sort.as_deref() {
            None | Some("") => SortOrder::default(),
            Some(s) => s.parse()?,
        };

        Ok(RequestFilter {
            genre,
            search: self.search,
            sort,
        })
    }
}

/// GET /api/requests?genre=&search=&sort=newest|oldest
pub async fn list_open(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<RequestView>>> {
    let Query(query) = query?;
    let filter = query.into_filter()?;
    Ok(Json(requests::list_open(&state.db, &auth.user, &filter).await?))
}

/// POST /api/requests
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<RequestFields>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RequestView>)> {
    let Json(fields) = payload?;
    let view = requests::create(&state.db, &auth.user, fields).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/requests/mine
pub async fn list_mine(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<Vec<RequestView>>> {
    Ok(Json(requests::list_for_client(&state.db, &auth.user).await?))
}

/// GET /api/requests/:id
pub async fn get_one(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<RequestView>> {
    let Path(id) = path?;
    Ok(Json(requests::get(&state.db, id).await?))
}

/// PUT /api/requests/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<RequestFields>, JsonRejection>,
) -> ApiResult<Json<RequestView>> {
    let Path(id) = path?;
    let Json(fields) = payload?;
    Ok(Json(requests::update(&state.db, &auth.user, id, fields).await?))
}

/// DELETE /api/requests/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    requests::delete(&state.db, &auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
