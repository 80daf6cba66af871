//! The link config controller: derive, diff, publish.
//!
//! Each pass recomputes the desired declarations from scratch, diffs them
//! against what the link store holds for the owned layers, and applies the
//! difference. Nothing survives between passes except what is in the
//! stores, so a pass is safe to repeat at any time.

use crate::cmdline::Cmdline;
use crate::error::{Error, Result};
use crate::expand::{Derivation, Warning};
use crate::machine::{MACHINE_CONFIG_ID, MachineConfig};
use crate::sources::{derive, is_owned};
use declarative::{
    AutoConfirm, CancelToken, ConfirmCallback, ExecuteOptions, ExecuteSummary, ExecutionPlan,
    LogCallback, LogProgress, ProgressCallback, ResourceStore, WatchEvent, execute, with_retry,
};
use linkspec::{LinkSpec, NAMESPACE};
use std::sync::Mutex;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

/// How often an idle loop checks its cancel token.
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// What one reconciliation pass did.
#[derive(Debug, Default)]
pub struct PassReport {
    pub summary: ExecuteSummary,
    pub warnings: Vec<Warning>,
    /// Rejected inputs; their declarations are absent from the store
    pub errors: Vec<Error>,
}

impl PassReport {
    pub fn is_clean(&self) -> bool {
        self.summary.is_success() && self.warnings.is_empty() && self.errors.is_empty()
    }

    /// Fail when store operations were left unapplied.
    pub fn check(&self) -> Result<()> {
        if self.summary.failed > 0 {
            return Err(Error::Incomplete {
                failed: self.summary.failed,
            });
        }
        Ok(())
    }
}

/// Keeps the published link declarations equal to what the kernel command
/// line and the machine configuration ask for.
pub struct LinkConfigController<C, L> {
    cmdline: Option<Cmdline>,
    config_store: C,
    link_store: L,
    options: ExecuteOptions,
    pass: Mutex<()>,
}

impl<C, L> LinkConfigController<C, L>
where
    C: ResourceStore<MachineConfig>,
    L: ResourceStore<LinkSpec>,
{
    /// The command line is read once at startup and never changes.
    pub fn new(cmdline: Option<Cmdline>, config_store: C, link_store: L) -> Self {
        Self {
            cmdline,
            config_store,
            link_store,
            options: ExecuteOptions::default(),
            pass: Mutex::new(()),
        }
    }

    pub fn with_options(mut self, options: ExecuteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ExecuteOptions {
        &self.options
    }

    pub fn config_store(&self) -> &C {
        &self.config_store
    }

    pub fn link_store(&self) -> &L {
        &self.link_store
    }

    /// Subscribe to machine configuration changes.
    pub fn watch(&self) -> Result<Receiver<WatchEvent<String>>> {
        Ok(self.config_store.watch()?)
    }

    /// Desired declarations for the current inputs.
    pub fn desired(&self) -> Result<Derivation> {
        let key = MACHINE_CONFIG_ID.to_string();
        let config = with_retry(&self.options.retry, Some(&LogCallback), || {
            self.config_store.get(&key)
        })?;
        Ok(derive(self.cmdline.as_ref(), config.as_ref()))
    }

    /// Declarations currently published in the owned layers.
    pub fn published(&self) -> Result<Vec<LinkSpec>> {
        let links = with_retry(&self.options.retry, Some(&LogCallback), || {
            self.link_store.list(NAMESPACE)
        })?;
        Ok(links.into_iter().filter(is_owned).collect())
    }

    /// Operations the next pass would apply, without applying them.
    pub fn plan(&self) -> Result<ExecutionPlan<LinkSpec>> {
        let desired = self.desired()?;
        Ok(ExecutionPlan::between(&self.published()?, &desired.links))
    }

    /// Run one pass, logging each operation.
    pub fn reconcile(&self, cancel: &CancelToken) -> Result<PassReport> {
        self.reconcile_with(cancel, &mut LogProgress, &mut AutoConfirm)
    }

    /// Run one pass with caller-supplied progress and confirmation.
    ///
    /// Passes are serialized: a second caller blocks until the first is
    /// done. Bad inputs end up in the report, store failures in the error.
    pub fn reconcile_with<P, F>(
        &self,
        cancel: &CancelToken,
        progress: &mut P,
        confirm: &mut F,
    ) -> Result<PassReport>
    where
        P: ProgressCallback,
        F: ConfirmCallback,
    {
        let _pass = self.pass.lock().map_err(|_| Error::Poisoned)?;
        let started = Instant::now();
        log::debug!("link config pass started");

        let derivation = self.desired()?;
        for warning in &derivation.warnings {
            log::warn!("{warning}");
        }
        for error in &derivation.errors {
            log::error!("{error}");
        }

        let plan = ExecutionPlan::between(&self.published()?, &derivation.links);
        let summary = execute(
            &plan,
            &self.link_store,
            &self.options,
            cancel,
            progress,
            confirm,
        )?;

        log::debug!(
            "link config pass finished in {:?}: {} created, {} updated, {} destroyed, {} failed",
            started.elapsed(),
            summary.created,
            summary.modified,
            summary.removed,
            summary.failed
        );

        Ok(PassReport {
            summary,
            warnings: derivation.warnings,
            errors: derivation.errors,
        })
    }

    /// Reconcile until `events` closes or `cancel` fires.
    ///
    /// Runs one pass up front, then one per notification; notifications
    /// queued while a pass runs are coalesced into the next one. Failed
    /// passes are retried with backoff, then left for the next
    /// notification.
    pub fn run<T>(&self, events: &Receiver<T>, cancel: &CancelToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            self.pass_with_backoff(cancel)?;

            loop {
                if cancel.is_cancelled() {
                    log::debug!("link config loop cancelled");
                    return Ok(());
                }
                match events.recv_timeout(CANCEL_POLL) {
                    Ok(_) => {
                        let coalesced = events.try_iter().count();
                        if coalesced > 0 {
                            log::debug!("coalesced {coalesced} queued notification(s)");
                        }
                        break;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        log::info!("notification channel closed, stopping link config loop");
                        return Ok(());
                    }
                }
            }
        }
    }

    fn pass_with_backoff(&self, cancel: &CancelToken) -> Result<()> {
        let retry = &self.options.retry;
        let attempts = retry.max_attempts.max(1);

        for attempt in 0..attempts {
            let err = match self.reconcile(cancel).and_then(|report| report.check()) {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            if err.is_cancelled() {
                return Ok(());
            }
            if matches!(err, Error::Poisoned) {
                return Err(err);
            }
            if !err.is_retryable() || attempt + 1 >= attempts {
                log::error!("link config pass failed: {err}");
                return Ok(());
            }

            let delay = retry.delay_for_attempt(attempt);
            log::warn!(
                "link config pass failed (attempt {}/{}): {err}, retrying in {delay:?}",
                attempt + 1,
                attempts
            );
            sleep_unless_cancelled(delay, cancel);
        }
        Ok(())
    }
}

fn sleep_unless_cancelled(delay: Duration, cancel: &CancelToken) {
    let deadline = Instant::now() + delay;
    while !cancel.is_cancelled() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep((deadline - now).min(CANCEL_POLL));
    }
}
