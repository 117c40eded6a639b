//! HTTP API handlers for MuseLink

pub mod accounts;
pub mod admin;
pub mod auth;
pub mod credits;
pub mod health;
pub mod requests;
pub mod unlocks;

pub use auth::{auth_middleware, AuthUser};
pub use health::health_routes;
