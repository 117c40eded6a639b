//! Admin endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use muselink_common::models::{SystemConfig, Transaction, User};

use super::AuthUser;
use crate::services::admin::{self, Export, Stats};
use crate::{ApiResult, AppState};

/// GET /api/admin/config
pub async fn get_config(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<SystemConfig>> {
    Ok(Json(admin::get_config(&state.db, &auth.user).await?))
}

/// PUT /api/admin/config
///
/// **Request:** `{"credit_price_cents": 250}`
pub async fn update_config(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<SystemConfig>, JsonRejection>,
) -> ApiResult<Json<SystemConfig>> {
    let Json(config) = payload?;
    let updated = admin::set_credit_price(&state.db, &auth.user, config.credit_price_cents).await?;
    Ok(Json(updated))
}

/// GET /api/admin/stats
pub async fn stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<Stats>> {
    Ok(Json(admin::stats(&state.db, &auth.user).await?))
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(admin::list_users(&state.db, &auth.user).await?))
}

/// GET /api/admin/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<Vec<Transaction>>> {
    Ok(Json(admin::list_transactions(&state.db, &auth.user).await?))
}

/// GET /api/admin/export
pub async fn export(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<Export>> {
    Ok(Json(admin::export(&state.db, &auth.user).await?))
}
