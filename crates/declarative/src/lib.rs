//! # Declarative
//!
//! A framework for publishing declarative resources and keeping them
//! converged.
//!
//! A controller derives the full desired set of resources from its inputs,
//! diffs it against what is currently published in a store, and applies the
//! resulting create/update/destroy operations. Running the same derivation
//! twice yields an empty plan the second time.
//!
//! ## Core Concepts
//!
//! - **Resource**: A keyed desired-state record compared by value
//! - **ResourceStore**: Repository of published resources (list, get,
//!   create, update, destroy, watch)
//! - **ResourceDiff**: One operation needed to converge the store
//! - **ExecutionPlan**: Diffs grouped into ordered batches
//! - **Executor**: Applies a plan with retries, parallelism and cancellation
//!
//! ## Example
//!
//! ```
//! use declarative::{
//!     ExecuteOptions, ExecutionPlan, MemoryStore, Resource, ResourceStore, execute_simple,
//! };
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Route {
//!     dest: String,
//!     gateway: String,
//! }
//!
//! impl Resource for Route {
//!     type Key = String;
//!     fn key(&self) -> String { self.dest.clone() }
//!     fn namespace(&self) -> &str { "network-config" }
//!     fn resource_type() -> &'static str { "RouteSpec" }
//! }
//!
//! let store: MemoryStore<Route> = MemoryStore::new();
//! let desired = vec![Route { dest: "0.0.0.0/0".into(), gateway: "10.0.0.1".into() }];
//!
//! let published = store.list("network-config")?;
//! let plan = ExecutionPlan::between(&published, &desired);
//! let summary = execute_simple(&plan, &store, &ExecuteOptions::default())?;
//! assert_eq!(summary.created, 1);
//! # Ok::<(), declarative::Error>(())
//! ```
//!
//! ## Provider Traits
//!
//! - [`ResourceStore`]: Where resources are published
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on
//! specific storage backends or UI frameworks.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod planner;
pub mod resource;
pub mod retry;
pub mod store;
pub mod types;

// Re-export main types at crate root
pub use context::{
    AutoConfirm, AutoDecline, CancelToken, ConfirmCallback, LogProgress, NoProgress,
    ProgressCallback,
};
pub use diff::{DiffSummary, ResourceDiff, compute_diffs};
pub use error::{Error, ErrorCategory, Result};
pub use executor::{execute, execute_simple};
pub use planner::ExecutionPlan;
pub use resource::Resource;
pub use retry::{LogCallback, RetryCallback, with_retry};
pub use store::{MemoryStore, ResourceStore, WatchEvent};
pub use types::{ApplyResult, ExecuteOptions, ExecuteSummary, RetryConfig};
