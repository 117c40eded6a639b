//! Persistence operations
//!
//! Every function takes a generic SQLite executor, so the same query runs
//! against the pool or inside an open transaction (`&mut *tx`).

pub mod requests;
pub mod sessions;
pub mod transactions;
pub mod unlocks;
pub mod users;

use muselink_common::{Error, Result};
use uuid::Uuid;

/// Parse a stored GUID column
pub(crate) fn parse_guid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Corrupt guid '{}': {}", value, e)))
}
