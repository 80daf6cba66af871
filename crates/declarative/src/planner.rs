//! Execution planner - groups diffs into ordered operation batches

use crate::diff::{DiffSummary, ResourceDiff, compute_diffs};
use crate::resource::Resource;

/// An execution plan with operations grouped by kind
///
/// Batches run in field order: creates, then updates, then destroys.
pub struct ExecutionPlan<R: Resource> {
    /// Resources to publish
    pub creates: Vec<ResourceDiff<R>>,
    /// Resources to replace
    pub updates: Vec<ResourceDiff<R>>,
    /// Resources to remove
    pub destroys: Vec<ResourceDiff<R>>,
}

impl<R: Resource> ExecutionPlan<R> {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self {
            creates: Vec::new(),
            updates: Vec::new(),
            destroys: Vec::new(),
        }
    }

    /// Build a plan from a list of diffs
    pub fn from_diffs(diffs: Vec<ResourceDiff<R>>) -> Self {
        let mut plan = Self::new();
        for diff in diffs {
            plan.add(diff);
        }
        plan
    }

    /// Build a plan that converges `published` to `desired`
    pub fn between(published: &[R], desired: &[R]) -> Self {
        Self::from_diffs(compute_diffs(published, desired))
    }

    /// Add a diff to the matching batch
    pub fn add(&mut self, diff: ResourceDiff<R>) {
        match diff {
            ResourceDiff::Create(_) => self.creates.push(diff),
            ResourceDiff::Update { .. } => self.updates.push(diff),
            ResourceDiff::Destroy(_) => self.destroys.push(diff),
        }
    }

    /// All operations in execution order
    pub fn operations(&self) -> impl Iterator<Item = &ResourceDiff<R>> {
        self.creates
            .iter()
            .chain(self.updates.iter())
            .chain(self.destroys.iter())
    }

    /// Filter plan to only include operations matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&ResourceDiff<R>) -> bool,
    {
        Self {
            creates: self.creates.into_iter().filter(|d| predicate(d)).collect(),
            updates: self.updates.into_iter().filter(|d| predicate(d)).collect(),
            destroys: self.destroys.into_iter().filter(|d| predicate(d)).collect(),
        }
    }

    /// Filter plan to only include operations matching a target pattern
    ///
    /// Target format: "prefix" or "prefix/name", matched against the
    /// display form of resource keys.
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (prefix, name) = parse_target(t);
                self.filter(|d| matches_filter(&d.key().to_string(), &prefix, name.as_deref()))
            }
        }
    }

    /// Counts per operation kind
    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            additions: self.creates.len(),
            removals: self.destroys.len(),
            modifications: self.updates.len(),
        }
    }

    /// Total number of operations in the plan
    pub fn total_operations(&self) -> usize {
        self.creates.len() + self.updates.len() + self.destroys.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.total_operations() == 0
    }
}

impl<R: Resource> Default for ExecutionPlan<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a target string like "configuration/eth0" into (prefix, name)
fn parse_target(target: &str) -> (String, Option<String>) {
    match target.split_once('/') {
        Some((prefix, name)) => (prefix.to_string(), Some(name.to_string())),
        None => (target.to_string(), None),
    }
}

/// Check if a key matches the filter criteria
fn matches_filter(key: &str, prefix: &str, name: Option<&str>) -> bool {
    let (key_prefix, key_name) = key.split_once('/').unwrap_or(("", key));

    if key_prefix != prefix {
        return false;
    }

    if let Some(n) = name
        && key_name != n
    {
        return false;
    }

    true
}
