//! Credit endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use muselink_common::models::Transaction;
use serde::Deserialize;

use super::AuthUser;
use crate::services::credits::{self, CreditPrice, PurchaseReceipt};
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub credits: i64,
}

/// GET /api/credits/price
pub async fn get_price(State(state): State<AppState>) -> ApiResult<Json<CreditPrice>> {
    Ok(Json(credits::credit_price(&state.db).await?))
}

/// POST /api/credits/purchase
///
/// **Request:** `{"credits": 10}`
/// **Response:** 201 with `{"transaction", "credits"}` (new balance)
pub async fn purchase(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<PurchaseRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PurchaseReceipt>)> {
    let Json(body) = payload?;
    let receipt = credits::purchase(&state.db, &auth.user, body.credits).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /api/credits/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<Vec<Transaction>>> {
    Ok(Json(credits::list_transactions(&state.db, &auth.user).await?))
}
