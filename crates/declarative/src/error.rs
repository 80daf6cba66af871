//! Error types for resource stores and plan execution.
//!
//! Errors are categorized so the executor and callers can decide whether
//! an operation is worth retrying.

use thiserror::Error;

/// Categories of store errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Store temporarily unavailable (transient, retryable)
    Transient,
    /// Resource does not exist
    NotFound,
    /// Resource already exists
    Conflict,
    /// Operation was cancelled before completion
    Cancelled,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Transient => "Store temporarily unavailable",
            Self::NotFound => "Resource not found",
            Self::Conflict => "Resource already exists",
            Self::Cancelled => "Operation cancelled",
            Self::Other => "Unexpected error",
        }
    }
}

/// Errors that can occur while reading or writing a resource store.
#[derive(Debug, Error)]
pub enum Error {
    /// The store could not be reached or failed transiently
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Details from the failed store operation
        message: String,
    },

    /// No resource with the given key
    #[error("resource not found: {key}")]
    NotFound {
        /// Display form of the missing key
        key: String,
    },

    /// A resource with the given key already exists
    #[error("resource already exists: {key}")]
    AlreadyExists {
        /// Display form of the conflicting key
        key: String,
    },

    /// Execution stopped by a cancel token
    #[error("cancelled after {applied} operation(s)")]
    Cancelled {
        /// Operations applied before cancellation was observed
        applied: usize,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Unavailable { .. } => ErrorCategory::Transient,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::AlreadyExists { .. } => ErrorCategory::Conflict,
            Error::Cancelled { .. } => ErrorCategory::Cancelled,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Shorthand for a transient store failure.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Error::Unavailable {
            message: message.into(),
        }
    }
}

/// Result type for store and execution operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Transient.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::Conflict.is_retryable());
        assert!(!ErrorCategory::Cancelled.is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            Error::unavailable("connection reset").category(),
            ErrorCategory::Transient
        );
        assert_eq!(
            Error::NotFound { key: "a".into() }.category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            Error::AlreadyExists { key: "a".into() }.category(),
            ErrorCategory::Conflict
        );
        assert!(!Error::Other("boom".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = Error::Cancelled { applied: 3 };
        assert_eq!(err.to_string(), "cancelled after 3 operation(s)");
    }
}
