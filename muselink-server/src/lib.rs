//! muselink-server library: HTTP service for the MuseLink marketplace
//!
//! Clients post requests, artists spend credits to unlock the contact
//! details behind them, and an admin sets the credit price.

use axum::Router;
use sqlx::SqlitePool;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Server start time
    pub startup_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            startup_time: Instant::now(),
        }
    }
}

/// Build application router
///
/// `/health`, register and login are public. Every other route runs
/// behind the session middleware.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Protected routes (require a session)
    let protected = Router::new()
        .route("/api/auth/logout", post(api::accounts::logout))
        .route("/api/auth/me", get(api::accounts::me))
        .route(
            "/api/requests",
            get(api::requests::list_open).post(api::requests::create),
        )
        .route("/api/requests/mine", get(api::requests::list_mine))
        .route(
            "/api/requests/:id",
            get(api::requests::get_one)
                .put(api::requests::update)
                .delete(api::requests::delete),
        )
        .route("/api/requests/:id/unlock", post(api::unlocks::unlock_request))
        .route("/api/unlocks", get(api::unlocks::list_unlocked))
        .route("/api/credits/price", get(api::credits::get_price))
        .route("/api/credits/purchase", post(api::credits::purchase))
        .route("/api/credits/transactions", get(api::credits::list_transactions))
        .route(
            "/api/admin/config",
            get(api::admin::get_config).put(api::admin::update_config),
        )
        .route("/api/admin/stats", get(api::admin::stats))
        .route("/api/admin/users", get(api::admin::list_users))
        .route("/api/admin/transactions", get(api::admin::list_transactions))
        .route("/api/admin/export", get(api::admin::export))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .route("/api/auth/register", post(api::accounts::register))
        .route("/api/auth/login", post(api::accounts::login))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        // Browser front ends on other origins authenticate with bearer tokens
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
