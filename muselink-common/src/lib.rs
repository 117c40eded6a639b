//! # MuseLink Common Library
//!
//! Shared code for the MuseLink server and its tests:
//! - Error taxonomy
//! - Configuration loading
//! - Database initialization and settings
//! - Domain models
//! - Credential helpers
//! - Lock-contention retry

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod retry;
pub mod time;

pub use error::{Error, Result};
