//! Storage error types.
//!
//! Used by repository implementations and callers of storage APIs. Raw `sqlx` errors are classified
//! on conversion so callers can tell lock contention (retryable) from constraint failures.

use courier_core::CourierError;
use thiserror::Error;

/// Errors that can occur when using storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
    #[error("Database busy: {0}")]
    Busy(String),
    #[error("Constraint violated: {0}")]
    Constraint(String),
}

// SQLite primary and extended result codes, as reported by `DatabaseError::code`.
const SQLITE_BUSY: &[&str] = &["5", "261", "517", "773"];
const SQLITE_LOCKED: &[&str] = &["6", "262"];
const SQLITE_UNIQUE: &[&str] = &["1555", "2067"];
const SQLITE_CONSTRAINT: &[&str] = &["19", "275", "787", "1299", "1811"];

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
                let code = code.as_str();
                if SQLITE_BUSY.contains(&code) || SQLITE_LOCKED.contains(&code) {
                    StorageError::Busy(db.message().to_string())
                } else if SQLITE_UNIQUE.contains(&code) {
                    StorageError::AlreadyExists(db.message().to_string())
                } else if SQLITE_CONSTRAINT.contains(&code) {
                    StorageError::Constraint(db.message().to_string())
                } else {
                    StorageError::Database(err.to_string())
                }
            }
            sqlx::Error::RowNotFound => StorageError::NotFound(err.to_string()),
            sqlx::Error::PoolTimedOut => StorageError::Busy(err.to_string()),
            _ => StorageError::Database(err.to_string()),
        }
    }
}

impl From<StorageError> for CourierError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Database(m) => CourierError::Storage(m),
            StorageError::NotFound(m) => CourierError::NotFound(m),
            StorageError::AlreadyExists(m) => CourierError::AlreadyExists(m),
            StorageError::InvalidReference(m) => CourierError::InvalidReference(m),
            StorageError::Busy(m) => CourierError::Busy(m),
            StorageError::Constraint(m) => CourierError::InvalidReference(m),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
