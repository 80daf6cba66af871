//! Outcome counters and execution knobs

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happened to one planned operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// The store already held the desired value
    NoChange,
    Created,
    Modified,
    Removed,
    /// Retries exhausted or a permanent store error
    Failed { error: String },
    /// Not attempted (dry run or declined)
    Skipped { reason: String },
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Per-outcome counts of one execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ExecuteSummary {
    /// Store writes that actually happened
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Every operation accounted for, whatever its outcome
    pub fn total(&self) -> usize {
        self.total_changes() + self.skipped + self.failed + self.no_change
    }

    pub fn add_result(&mut self, result: &ApplyResult) {
        let counter = match result {
            ApplyResult::NoChange => &mut self.no_change,
            ApplyResult::Created => &mut self.created,
            ApplyResult::Modified => &mut self.modified,
            ApplyResult::Removed => &mut self.removed,
            ApplyResult::Failed { .. } => &mut self.failed,
            ApplyResult::Skipped { .. } => &mut self.skipped,
        };
        *counter += 1;
    }
}

/// Backoff policy for transient store failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Attempts per call, the first one included
    pub max_attempts: u32,
    /// Sleep after the first failure
    pub base_delay: Duration,
    /// Growth of the sleep per further failure
    pub backoff_factor: f64,
    /// Upper bound for any single sleep
    pub max_delay: Duration,
}

const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(100), 2.0)
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Sleep before retrying after failure number `attempt` (0-based),
    /// capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// How a plan is applied
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Count the operations but never touch the store
    pub dry_run: bool,
    /// Worker threads per batch; 1 applies sequentially
    pub jobs: usize,
    /// Applied to each store call on its own
    pub retry: RetryConfig,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 1,
            retry: RetryConfig::default(),
        }
    }
}
