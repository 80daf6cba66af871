//! Error types for link configuration derivation and reconciliation

use thiserror::Error;

/// A device entry that could not be expanded into link declarations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("device {device}: {source}")]
pub struct DeviceError {
    /// Interface name of the offending entry
    pub device: String,
    pub source: linkspec::Error,
}

/// Errors that can occur while deriving or publishing link declarations
#[derive(Error, Debug)]
pub enum Error {
    /// Reading configuration or publishing declarations failed
    #[error(transparent)]
    Store(#[from] declarative::Error),

    /// Kernel command line parameter is present but malformed
    #[error("invalid kernel parameter {param}={value:?}: {reason}")]
    Cmdline {
        param: &'static str,
        value: String,
        reason: String,
    },

    /// One machine configuration device entry was rejected
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Some store operations of a pass kept failing after retries
    #[error("{failed} link operation(s) failed to apply")]
    Incomplete { failed: usize },

    /// A previous pass panicked while holding the reconcile lock
    #[error("reconcile lock poisoned")]
    Poisoned,
}

impl Error {
    /// Whether running the whole pass again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Store(e) => e.is_retryable(),
            Error::Incomplete { .. } => true,
            Error::Cmdline { .. } | Error::Device(_) | Error::Poisoned => false,
        }
    }

    /// Whether the error came from a cancel token.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Store(declarative::Error::Cancelled { .. }))
    }
}

/// Result type for link configuration operations
pub type Result<T> = std::result::Result<T, Error>;
