//! Common error types for MuseLink

use thiserror::Error;

/// Common result type for MuseLink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the MuseLink crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// State conflict (duplicate email, cap reached, request already unlocked by others)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing, unknown or expired credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated caller lacks the role or ownership required
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Artist balance cannot cover the operation
    #[error("Insufficient credits: balance is {balance}")]
    InsufficientCredits { balance: i64 },

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for SQLite lock contention that is worth retrying
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Error::Database(db_err) => {
                let msg = db_err.to_string();
                msg.contains("database is locked") || msg.contains("database table is locked")
            }
            _ => false,
        }
    }

    /// True when the error is a UNIQUE constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}
