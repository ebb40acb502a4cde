//! Error types for the frontier engine

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for frontier operations
pub type FrontierResult<T> = Result<T, FrontierError>;

/// Errors surfaced to the caller of the frontier engine
#[derive(Error, Debug)]
pub enum FrontierError {
    /// The requesting fetcher is not registered; the request had no side effects
    #[error("Fetcher not found: {fetcher_id}")]
    FetcherNotFound { fetcher_id: String },

    /// The store is unreachable or rejected a query/write
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl FrontierError {
    /// Create a fetcher not found error
    pub fn fetcher_not_found(fetcher_id: impl Into<String>) -> Self {
        Self::FetcherNotFound {
            fetcher_id: fetcher_id.into(),
        }
    }

    /// Whether the caller may retry the whole request.
    ///
    /// Retrying is safe: re-recording a lease the fetcher already holds is a no-op.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::FetcherNotFound { .. } => false,
            Self::Storage(_) => true,
        }
    }
}

/// Unknown partition or priority selector
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} '{value}'. Valid options: {}", .valid.join(", "))]
pub struct ParseModeError {
    pub kind: &'static str,
    pub value: String,
    pub valid: &'static [&'static str],
}

impl ParseModeError {
    pub fn new(kind: &'static str, value: impl Into<String>, valid: &'static [&'static str]) -> Self {
        Self {
            kind,
            value: value.into(),
            valid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_not_found_error() {
        let err = FrontierError::fetcher_not_found("abc");
        assert!(err.to_string().contains("abc"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_storage_error_is_recoverable() {
        let err: FrontierError = StorageError::LockPoisoned("test").into();
        assert!(matches!(err, FrontierError::Storage(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_parse_mode_error_lists_options() {
        let err = ParseModeError::new("partition mode", "geo", &["none", "tld"]);
        assert_eq!(
            err.to_string(),
            "Unknown partition mode 'geo'. Valid options: none, tld"
        );
    }
}
