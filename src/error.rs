//! Unified error handling for the websch crate
//!
//! Domain errors stay typed inside their modules ([`FrontierError`],
//! [`StorageError`], [`ConfigError`]); [`Error`] wraps them for callers that
//! cross module boundaries.
//!
//! - [`WebschErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum
//!
//! ```rust,ignore
//! use websch::error::{Error, WebschErrorTrait};
//!
//! fn handle(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!(category = ?err.category(), "Retrying: {}", err.describe());
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::frontier::{FrontierError, ParseModeError};
pub use crate::storage::StorageError;

/// Common trait for all websch error types
pub trait WebschErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Operator-facing description, prefixed with the category
    fn describe(&self) -> String {
        format!("{}: {}", self.category().label(), self)
    }

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Unknown fetchers, invalid request selectors
    Request,
    /// Storage and I/O errors
    Storage,
    /// Serialization errors
    Parsing,
    /// Configuration and validation errors
    Config,
    Other,
}

impl ErrorCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Request => "request error",
            Self::Storage => "storage error",
            Self::Parsing => "parsing error",
            Self::Config => "configuration error",
            Self::Other => "error",
        }
    }
}

impl WebschErrorTrait for StorageError {
    fn is_recoverable(&self) -> bool {
        StorageError::is_recoverable(self)
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}

impl WebschErrorTrait for FrontierError {
    fn is_recoverable(&self) -> bool {
        FrontierError::is_recoverable(self)
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::FetcherNotFound { .. } => ErrorCategory::Request,
            Self::Storage(_) => ErrorCategory::Storage,
        }
    }
}

impl WebschErrorTrait for ConfigError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Config
    }
}

/// Unified error type for the websch crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Frontier error: {0}")]
    Frontier(#[from] FrontierError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Unknown partition or priority name
    #[error("Invalid selector: {0}")]
    Selector(#[from] ParseModeError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl WebschErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Frontier(e) => e.is_recoverable(),
            Self::Storage(e) => e.is_recoverable(),
            Self::Config(_) | Self::Selector(_) => false,
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Frontier(e) => e.category(),
            Self::Storage(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
            Self::Selector(_) => ErrorCategory::Request,
            Self::Json(_) => ErrorCategory::Parsing,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Sqlite(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontier_not_found_category() {
        let err: Error = FrontierError::fetcher_not_found("f9").into();
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), ErrorCategory::Request);
        assert!(err.describe().starts_with("request error"));
    }

    #[test]
    fn test_storage_errors_are_recoverable() {
        let err: Error = StorageError::LockPoisoned("store").into();
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), ErrorCategory::Storage);

        let err: Error = io::Error::new(io::ErrorKind::Other, "disk").into();
        assert!(err.is_recoverable());
        assert_eq!(err.category(), ErrorCategory::Storage);

        let err: Error = FrontierError::Storage(StorageError::LockPoisoned("x")).into();
        assert!(err.is_recoverable());
        assert_eq!(err.category(), ErrorCategory::Storage);
    }

    #[test]
    fn test_config_error_conversion() {
        let err: Error = ConfigError::invalid("hash_buckets", "zero").into();
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(err.to_string().contains("hash_buckets"));
    }

    #[test]
    fn test_selector_error() {
        let parse = "bogus".parse::<crate::frontier::PartitionMode>().unwrap_err();
        let err: Error = parse.into();
        assert_eq!(err.category(), ErrorCategory::Request);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(err.category(), ErrorCategory::Parsing);
    }

    #[test]
    fn test_other_with_source() {
        let err = Error::with_source("while seeding", io::Error::new(io::ErrorKind::Other, "x"));
        assert_eq!(err.to_string(), "while seeding");
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(Error::other("plain").category(), ErrorCategory::Other);
    }
}
