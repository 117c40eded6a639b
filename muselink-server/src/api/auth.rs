//! Session authentication middleware
//!
//! Resolves `Authorization: Bearer <token>` to a user and stores it as an
//! [`AuthUser`] request extension. Applied to protected routes only;
//! `/health`, register and login do not use it.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use muselink_common::auth::parse_bearer;
use muselink_common::models::User;
use tracing::debug;

use crate::services::accounts;
use crate::{ApiError, AppState};

/// The authenticated caller, inserted by [`auth_middleware`]
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    /// Raw bearer token, kept so logout can end this exact session
    pub token: String,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let token = parse_bearer(header)
        .ok_or_else(|| ApiError::Unauthorized("Malformed bearer token".to_string()))?
        .to_string();

    let user = accounts::authenticate(&state.db, &token).await?;
    debug!(user_id = %user.id, role = %user.role, "Authenticated request");

    request.extensions_mut().insert(AuthUser { user, token });
    Ok(next.run(request).await)
}
