//! Storage errors and SQLite error classification

use rusqlite::ErrorCode;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No connection available after {0:?}")]
    PoolExhausted(Duration),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Invalid pool configuration: {0}")]
    InvalidPool(&'static str),

    #[error("Lock poisoned: {0}")]
    Poisoned(&'static str),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// How a failed statement affects the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The session itself is unusable; abort the run
    Connection,
    /// A constraint rejected the row's values
    Constraint,
    /// Malformed statement or missing object
    Schema,
}

/// Classify a rusqlite error by its SQLite result code
pub fn classify(err: &rusqlite::Error) -> ErrorClass {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => match e.code {
            ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::PermissionDenied
            | ErrorCode::SystemIoFailure
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::OutOfMemory
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::DiskFull
            | ErrorCode::ReadOnly
            | ErrorCode::FileLockingProtocolFailed
            | ErrorCode::InternalMalfunction => ErrorClass::Connection,
            ErrorCode::ConstraintViolation | ErrorCode::TypeMismatch | ErrorCode::TooBig => {
                ErrorClass::Constraint
            }
            _ => ErrorClass::Schema,
        },
        rusqlite::Error::InvalidPath(_) => ErrorClass::Connection,
        rusqlite::Error::ToSqlConversionFailure(_)
        | rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => ErrorClass::Constraint,
        _ => ErrorClass::Schema,
    }
}

/// True when the error means the session is gone
pub fn is_fatal(err: &rusqlite::Error) -> bool {
    classify(err) == ErrorClass::Connection
}

/// Shorten an error message for logs and reports
pub fn truncate_message(message: &str, max: usize) -> String {
    if message.len() <= max {
        return message.to_string();
    }
    let cut = (0..=max)
        .rev()
        .find(|i| message.is_char_boundary(*i))
        .unwrap_or(0);
    format!("{}...", &message[..cut])
}
