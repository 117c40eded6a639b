//! Business services
//!
//! Services own the marketplace rules: role checks, ownership, validation
//! and the transactions that move credits. Handlers stay thin.

pub mod accounts;
pub mod admin;
pub mod credits;
pub mod requests;
pub mod unlock;

use muselink_common::models::{Role, User};
use muselink_common::{Error, Result};

/// Fail with `Forbidden` unless the caller holds one of `roles`
pub(crate) fn require_role(user: &User, roles: &[Role], action: &str) -> Result<()> {
    if roles.contains(&user.role) {
        Ok(())
    } else {
        Err(Error::Forbidden(format!(
            "Role '{}' may not {}",
            user.role, action
        )))
    }
}
