//! Unlock endpoints

use axum::{
    extract::{rejection::PathRejection, Path, State},
    Extension, Json,
};
use uuid::Uuid;

use super::AuthUser;
use crate::services::unlock::{self, UnlockOutcome, UnlockedView};
use crate::{ApiResult, AppState};

/// POST /api/requests/:id/unlock
///
/// **Response:** `{"request_id", "contact", "credits", "already_unlocked", ...}`
///
/// **Errors:**
/// - 402 Insufficient credits
/// - 403 Caller is not an artist
/// - 404 Unknown request
/// - 409 Unlock cap reached
pub async fn unlock_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<UnlockOutcome>> {
    let Path(id) = path?;
    Ok(Json(unlock::unlock(&state.db, &auth.user, id).await?))
}

/// GET /api/unlocks
pub async fn list_unlocked(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<Vec<UnlockedView>>> {
    Ok(Json(unlock::list_unlocked(&state.db, &auth.user).await?))
}
