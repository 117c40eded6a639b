//! Account endpoints: register, login, logout, me

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use muselink_common::models::User;
use serde::Deserialize;

use super::AuthUser;
use crate::services::accounts::{self, Registration, SessionGrant};
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/register
///
/// **Request:** `{"name", "email", "password", "role": "client"|"artist", "phone"?}`
/// **Response:** 201 with `{"token", "expires_at", "user"}`
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Registration>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SessionGrant>)> {
    let Json(registration) = payload?;
    let grant = accounts::register(&state.db, registration).await?;
    Ok((StatusCode::CREATED, Json(grant)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<SessionGrant>> {
    let Json(body) = payload?;
    let grant = accounts::login(&state.db, &body.email, &body.password).await?;
    Ok(Json(grant))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<StatusCode> {
    accounts::logout(&state.db, &auth.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<User>> {
    Ok(Json(accounts::me(&state.db, auth.user.id).await?))
}
