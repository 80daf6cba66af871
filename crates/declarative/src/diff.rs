//! Diff computation between published and desired resources

use crate::resource::Resource;
use std::collections::BTreeMap;

/// One operation needed to converge the published set to the desired set
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceDiff<R: Resource> {
    /// Desired but not published
    Create(R),
    /// Published with different contents
    Update { from: R, to: R },
    /// Published but no longer desired
    Destroy(R),
}

impl<R: Resource> ResourceDiff<R> {
    /// Key of the resource this diff applies to
    pub fn key(&self) -> R::Key {
        match self {
            Self::Create(r) | Self::Destroy(r) => r.key(),
            Self::Update { to, .. } => to.key(),
        }
    }

    /// Human-readable description of the affected resource
    pub fn description(&self) -> String {
        match self {
            Self::Create(r) | Self::Destroy(r) => r.description(),
            Self::Update { to, .. } => to.description(),
        }
    }

    /// Operation name used in logs and progress reports
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update { .. } => "update",
            Self::Destroy(_) => "destroy",
        }
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        matches!(self, Self::Create(_))
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        matches!(self, Self::Destroy(_))
    }

    /// Check if this diff represents a modification
    pub fn is_modification(&self) -> bool {
        matches!(self, Self::Update { .. })
    }
}

/// Compute the operations that turn `published` into `desired`
///
/// Resources are matched by key. Pairs that compare equal produce no
/// operation, so diffing a set against itself is empty. When `desired`
/// holds the same key twice the later entry wins. The result is ordered
/// by key.
pub fn compute_diffs<R: Resource>(published: &[R], desired: &[R]) -> Vec<ResourceDiff<R>> {
    let mut current: BTreeMap<R::Key, &R> = published.iter().map(|r| (r.key(), r)).collect();
    let wanted: BTreeMap<R::Key, &R> = desired.iter().map(|r| (r.key(), r)).collect();

    let mut diffs = Vec::new();
    for (key, want) in &wanted {
        match current.remove(key) {
            None => diffs.push(ResourceDiff::Create((*want).clone())),
            Some(have) if have != *want => diffs.push(ResourceDiff::Update {
                from: have.clone(),
                to: (*want).clone(),
            }),
            Some(_) => {}
        }
    }

    diffs.extend(
        current
            .into_values()
            .map(|stale| ResourceDiff::Destroy(stale.clone())),
    );
    diffs.sort_by_key(|d| d.key());
    diffs
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Number of resources to create
    pub additions: usize,
    /// Number of resources to destroy
    pub removals: usize,
    /// Number of resources to update
    pub modifications: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs<R: Resource>(diffs: &[ResourceDiff<R>]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            match diff {
                ResourceDiff::Create(_) => summary.additions += 1,
                ResourceDiff::Destroy(_) => summary.removals += 1,
                ResourceDiff::Update { .. } => summary.modifications += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::item;

    #[test]
    fn test_identical_sets_have_no_diff() {
        let set = vec![item("a", 1), item("b", 2)];
        assert!(compute_diffs(&set, &set).is_empty());
    }

    #[test]
    fn test_create_update_destroy() {
        let published = vec![item("a", 1), item("b", 2), item("c", 3)];
        let desired = vec![item("d", 4), item("b", 20), item("a", 1)];

        let diffs = compute_diffs(&published, &desired);

        assert_eq!(
            diffs,
            vec![
                ResourceDiff::Update {
                    from: item("b", 2),
                    to: item("b", 20),
                },
                ResourceDiff::Destroy(item("c", 3)),
                ResourceDiff::Create(item("d", 4)),
            ]
        );

        let summary = DiffSummary::from_diffs(&diffs);
        assert_eq!(summary.additions, 1);
        assert_eq!(summary.modifications, 1);
        assert_eq!(summary.removals, 1);
        assert!(summary.has_changes());
    }

    #[test]
    fn test_duplicate_desired_last_wins() {
        let desired = vec![item("a", 1), item("a", 2)];
        let diffs = compute_diffs(&[], &desired);

        assert_eq!(diffs, vec![ResourceDiff::Create(item("a", 2))]);
    }

    #[test]
    fn test_empty_desired_destroys_everything() {
        let published = vec![item("a", 1), item("b", 2)];
        let diffs = compute_diffs(&published, &[]);

        assert!(diffs.iter().all(ResourceDiff::is_removal));
        assert_eq!(diffs.len(), 2);
    }
}
