//! Error types for the storage layer

use thiserror::Error;

/// Result type for store operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a [`FrontierStore`](super::FrontierStore) implementation
#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLite rejected a query or write
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A lock guarding shared store state was poisoned by a panicking writer
    #[error("Store lock poisoned: {0}")]
    LockPoisoned(&'static str),

    /// A record could not be built or decoded
    #[error("Invalid record field '{field}': {reason}")]
    InvalidRecord { field: String, reason: String },

    /// Filesystem error while opening the store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Create an invalid record error
    pub fn invalid_record(field: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidRecord {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if retrying the whole request may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            Self::Io(_) => true,
            Self::Sqlite(_) | Self::LockPoisoned(_) | Self::InvalidRecord { .. } => false,
        }
    }
}
