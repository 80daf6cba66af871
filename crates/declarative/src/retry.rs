//! Bounded retry of store calls that fail with a transient error.

use crate::error::{Error, Result};
use crate::types::RetryConfig;
use std::thread;
use std::time::Duration;

/// Notified before each retry sleep.
pub trait RetryCallback {
    /// `attempt` is the 1-based number of the attempt that just failed.
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay: Duration);
}

/// Logs every retry at warn level.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay: Duration) {
        log::warn!("store call failed ({attempt}/{max_attempts}): {error}; next try in {delay:?}");
    }
}

/// Run `operation` until it succeeds, fails permanently, or runs out of
/// attempts.
///
/// Only errors whose [`Error::is_retryable`] holds are retried. The last
/// error is returned once `config.max_attempts` is spent; a config with
/// zero attempts still runs the operation once.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let err = match operation() {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        attempt += 1;
        if !err.is_retryable() || attempt >= max_attempts {
            return Err(err);
        }

        let delay = config.delay_for_attempt(attempt - 1);
        if let Some(cb) = callback {
            cb.on_retry(attempt, max_attempts, &err, delay);
        }
        thread::sleep(delay);
    }
}
