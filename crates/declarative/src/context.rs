//! Execution context and provider traits
//!
//! These traits allow the declarative crate to be used without
//! depending on specific implementations of progress reporting, prompts, etc.

use crate::error::Result;
use crate::types::ApplyResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when starting a batch of operations of one kind
    fn on_batch_start(&mut self, count: usize, operation: &str);

    /// Called when starting a single operation
    fn on_resource_start(&mut self, id: &str, description: &str);

    /// Called when an operation completes
    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult);

    /// Called when a batch completes
    fn on_batch_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// Returns `true` if the user confirmed, `false` otherwise.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _count: usize, _operation: &str) {}
    fn on_resource_start(&mut self, _id: &str, _description: &str) {}
    fn on_resource_complete(&mut self, _id: &str, _result: &ApplyResult) {}
    fn on_batch_complete(&mut self) {}
}

/// Progress callback that logs each completed operation
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_batch_start(&mut self, count: usize, operation: &str) {
        log::debug!("{} {} resource(s)", operation, count);
    }

    fn on_resource_start(&mut self, id: &str, description: &str) {
        log::trace!("applying {}: {}", id, description);
    }

    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
        match result {
            ApplyResult::Created => log::info!("created {}", id),
            ApplyResult::Modified => log::info!("updated {}", id),
            ApplyResult::Removed => log::info!("destroyed {}", id),
            ApplyResult::NoChange => log::debug!("{} already converged", id),
            ApplyResult::Skipped { reason } => log::debug!("skipped {}: {}", id, reason),
            ApplyResult::Failed { error } => log::error!("failed to apply {}: {}", id, error),
        }
    }

    fn on_batch_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Shared cancellation flag
///
/// Checked by the executor before every store operation, so a cancelled
/// run stops between operations and never in the middle of one.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; visible to every clone of this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
