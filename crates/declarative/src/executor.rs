//! Execution engine - applies a plan to a store with retries and parallelism

use crate::context::{CancelToken, ConfirmCallback, ProgressCallback};
use crate::diff::ResourceDiff;
use crate::error::{Error, Result};
use crate::planner::ExecutionPlan;
use crate::resource::Resource;
use crate::retry::{LogCallback, with_retry};
use crate::store::ResourceStore;
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary};
use rayon::prelude::*;

/// Execute a plan against a store with the given options and callbacks
///
/// Batches are applied in order (creates, updates, destroys). Every store
/// call is retried independently on transient failure and is the unit of
/// atomicity: when `cancel` fires, execution stops before the next
/// operation and returns `Error::Cancelled` with the number of operations
/// already applied.
///
/// Operations that keep failing are counted in `ExecuteSummary::failed`
/// rather than aborting the remaining operations.
pub fn execute<R, S, P, C>(
    plan: &ExecutionPlan<R>,
    store: &S,
    opts: &ExecuteOptions,
    cancel: &CancelToken,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    R: Resource,
    S: ResourceStore<R> + ?Sized,
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let total = plan.total_operations();
    if total == 0 {
        return Ok(ExecuteSummary::default());
    }

    if opts.dry_run {
        return Ok(ExecuteSummary {
            skipped: total,
            ..Default::default()
        });
    }

    if !confirm.confirm("Apply changes?")? {
        return Ok(ExecuteSummary {
            skipped: total,
            ..Default::default()
        });
    }

    let mut summary = ExecuteSummary::default();

    for (operation, batch) in [
        ("create", &plan.creates),
        ("update", &plan.updates),
        ("destroy", &plan.destroys),
    ] {
        if batch.is_empty() {
            continue;
        }

        progress.on_batch_start(batch.len(), operation);
        let results = execute_batch(batch, store, opts, cancel, progress);
        for result in &results {
            summary.add_result(result);
        }
        progress.on_batch_complete();

        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                applied: summary.total_changes(),
            });
        }
    }

    Ok(summary)
}

/// Execute a batch of operations
fn execute_batch<R, S, P>(
    batch: &[ResourceDiff<R>],
    store: &S,
    opts: &ExecuteOptions,
    cancel: &CancelToken,
    progress: &mut P,
) -> Vec<ApplyResult>
where
    R: Resource,
    S: ResourceStore<R> + ?Sized,
    P: ProgressCallback,
{
    if opts.jobs <= 1 || batch.len() == 1 {
        let mut results = Vec::with_capacity(batch.len());
        for diff in batch {
            if cancel.is_cancelled() {
                break;
            }
            let id = diff.key().to_string();
            progress.on_resource_start(&id, &diff.description());
            let result = apply_diff(diff, store, opts);
            progress.on_resource_complete(&id, &result);
            results.push(result);
        }
        results
    } else {
        execute_parallel(batch, store, opts, cancel, progress)
    }
}

/// Execute operations in parallel using rayon
///
/// Operations within one batch touch distinct keys, so they are independent.
fn execute_parallel<R, S, P>(
    batch: &[ResourceDiff<R>],
    store: &S,
    opts: &ExecuteOptions,
    cancel: &CancelToken,
    progress: &mut P,
) -> Vec<ApplyResult>
where
    R: Resource,
    S: ResourceStore<R> + ?Sized,
    P: ProgressCallback,
{
    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs)
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            log::warn!("Failed to create thread pool ({}), applying sequentially", e);
            let sequential = ExecuteOptions {
                jobs: 1,
                ..opts.clone()
            };
            return execute_batch(batch, store, &sequential, cancel, progress);
        }
    };

    // The progress callback is not shared across threads; report afterwards.
    let results: Vec<(String, ApplyResult)> = pool.install(|| {
        batch
            .par_iter()
            .map(|diff| {
                let id = diff.key().to_string();
                if cancel.is_cancelled() {
                    return (
                        id,
                        ApplyResult::Skipped {
                            reason: "cancelled".to_string(),
                        },
                    );
                }
                (id, apply_diff(diff, store, opts))
            })
            .collect()
    });

    for (id, result) in &results {
        progress.on_resource_complete(id, result);
    }

    results.into_iter().map(|(_, r)| r).collect()
}

/// Apply a single operation, retrying transient failures
fn apply_diff<R, S>(diff: &ResourceDiff<R>, store: &S, opts: &ExecuteOptions) -> ApplyResult
where
    R: Resource,
    S: ResourceStore<R> + ?Sized,
{
    match with_retry(&opts.retry, Some(&LogCallback), || apply_once(diff, store)) {
        Ok(result) => result,
        Err(e) => ApplyResult::Failed {
            error: e.to_string(),
        },
    }
}

/// Apply one operation, converging races with concurrent writers
///
/// A create that finds the key taken becomes an update, an update that
/// finds it missing becomes a create, and destroying a missing resource
/// is already converged.
fn apply_once<R, S>(diff: &ResourceDiff<R>, store: &S) -> Result<ApplyResult>
where
    R: Resource,
    S: ResourceStore<R> + ?Sized,
{
    match diff {
        ResourceDiff::Create(resource) => match store.create(resource.clone()) {
            Ok(()) => Ok(ApplyResult::Created),
            Err(Error::AlreadyExists { .. }) => {
                store.update(resource.clone())?;
                Ok(ApplyResult::Modified)
            }
            Err(e) => Err(e),
        },
        ResourceDiff::Update { to, .. } => match store.update(to.clone()) {
            Ok(()) => Ok(ApplyResult::Modified),
            Err(Error::NotFound { .. }) => {
                store.create(to.clone())?;
                Ok(ApplyResult::Created)
            }
            Err(e) => Err(e),
        },
        ResourceDiff::Destroy(resource) => match store.destroy(&resource.key()) {
            Ok(()) => Ok(ApplyResult::Removed),
            Err(Error::NotFound { .. }) => Ok(ApplyResult::NoChange),
            Err(e) => Err(e),
        },
    }
}

/// Simple execution without callbacks or cancellation
pub fn execute_simple<R, S>(
    plan: &ExecutionPlan<R>,
    store: &S,
    opts: &ExecuteOptions,
) -> Result<ExecuteSummary>
where
    R: Resource,
    S: ResourceStore<R> + ?Sized,
{
    use crate::context::{AutoConfirm, NoProgress};

    execute(
        plan,
        store,
        opts,
        &CancelToken::new(),
        &mut NoProgress,
        &mut AutoConfirm,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoConfirm, AutoDecline, NoProgress};
    use crate::store::tests::{Item, item};
    use crate::store::{MemoryStore, WatchEvent};
    use crate::types::RetryConfig;
    use std::sync::Mutex;
    use std::sync::mpsc::Receiver;
    use std::time::Duration;

    fn fast_options() -> ExecuteOptions {
        ExecuteOptions {
            retry: RetryConfig {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                backoff_factor: 1.0,
                max_delay: Duration::from_millis(5),
            },
            ..Default::default()
        }
    }

    /// Store wrapper failing the first N mutating calls with a transient error
    struct FlakyStore {
        inner: MemoryStore<Item>,
        failures_left: Mutex<u32>,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                inner: MemoryStore::new(),
                failures_left: Mutex::new(failures),
            }
        }

        fn maybe_fail(&self) -> Result<()> {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(Error::unavailable("connection reset"));
            }
            Ok(())
        }
    }

    impl ResourceStore<Item> for FlakyStore {
        fn list(&self, namespace: &str) -> Result<Vec<Item>> {
            self.inner.list(namespace)
        }
        fn get(&self, key: &String) -> Result<Option<Item>> {
            self.inner.get(key)
        }
        fn create(&self, resource: Item) -> Result<()> {
            self.maybe_fail()?;
            self.inner.create(resource)
        }
        fn update(&self, resource: Item) -> Result<()> {
            self.maybe_fail()?;
            self.inner.update(resource)
        }
        fn destroy(&self, key: &String) -> Result<()> {
            self.maybe_fail()?;
            self.inner.destroy(key)
        }
        fn watch(&self) -> Result<Receiver<WatchEvent<String>>> {
            self.inner.watch()
        }
    }

    #[test]
    fn test_execute_empty_plan() {
        let store: MemoryStore<Item> = MemoryStore::new();
        let plan = ExecutionPlan::new();

        let summary = execute_simple(&plan, &store, &fast_options()).unwrap();
        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn test_execute_converges_store() {
        let store: MemoryStore<Item> = MemoryStore::new();
        store.create(item("a", 1)).unwrap();
        store.create(item("b", 2)).unwrap();

        let desired = vec![item("b", 3), item("c", 4)];
        let plan = ExecutionPlan::between(&store.list("test").unwrap(), &desired);
        let summary = execute_simple(&plan, &store, &fast_options()).unwrap();

        assert_eq!(summary.created, 1);
        assert_eq!(summary.modified, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(store.list("test").unwrap(), desired);

        let again = ExecutionPlan::between(&store.list("test").unwrap(), &desired);
        assert!(again.is_empty());
    }

    #[test]
    fn test_execute_parallel_jobs() {
        let store: MemoryStore<Item> = MemoryStore::new();
        let desired: Vec<_> = ["a", "b", "c", "d", "e"]
            .into_iter()
            .map(|id| item(id, 1))
            .collect();

        let plan = ExecutionPlan::between(&[], &desired);
        let opts = ExecuteOptions {
            jobs: 4,
            ..fast_options()
        };
        let summary = execute_simple(&plan, &store, &opts).unwrap();

        assert_eq!(summary.created, 5);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_execute_dry_run_changes_nothing() {
        let store: MemoryStore<Item> = MemoryStore::new();
        let plan = ExecutionPlan::between(&[], &[item("a", 1)]);
        let opts = ExecuteOptions {
            dry_run: true,
            ..fast_options()
        };

        let summary = execute_simple(&plan, &store, &opts).unwrap();
        assert_eq!(summary.skipped, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_execute_declined() {
        let store: MemoryStore<Item> = MemoryStore::new();
        let plan = ExecutionPlan::between(&[], &[item("a", 1)]);

        let summary = execute(
            &plan,
            &store,
            &fast_options(),
            &CancelToken::new(),
            &mut NoProgress,
            &mut AutoDecline,
        )
        .unwrap();

        assert_eq!(summary.skipped, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_execute_retries_transient_failures() {
        let store = FlakyStore::new(2);
        let plan = ExecutionPlan::between(&[], &[item("a", 1)]);

        let summary = execute_simple(&plan, &store, &fast_options()).unwrap();
        assert_eq!(summary.created, 1);
        assert!(store.inner.get(&"a".to_string()).unwrap().is_some());
    }

    #[test]
    fn test_execute_counts_exhausted_retries_as_failed() {
        let store = FlakyStore::new(10);
        let plan = ExecutionPlan::between(&[], &[item("a", 1)]);

        let summary = execute_simple(&plan, &store, &fast_options()).unwrap();
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_execute_converges_concurrent_writers() {
        let store: MemoryStore<Item> = MemoryStore::new();
        // Published snapshot is stale: "a" exists, "b" is already gone.
        store.create(item("a", 0)).unwrap();
        let plan = ExecutionPlan::from_diffs(vec![
            ResourceDiff::Create(item("a", 1)),
            ResourceDiff::Destroy(item("b", 2)),
        ]);

        let summary = execute_simple(&plan, &store, &fast_options()).unwrap();

        assert_eq!(summary.modified, 1);
        assert_eq!(summary.no_change, 1);
        assert_eq!(store.get(&"a".to_string()).unwrap(), Some(item("a", 1)));
    }

    #[test]
    fn test_execute_cancelled_before_start() {
        let store: MemoryStore<Item> = MemoryStore::new();
        let plan = ExecutionPlan::between(&[], &[item("a", 1), item("b", 2)]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = execute(
            &plan,
            &store,
            &fast_options(),
            &cancel,
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap_err();

        assert!(matches!(err, Error::Cancelled { applied: 0 }));
        assert!(store.is_empty());
    }
}
