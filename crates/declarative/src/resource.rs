//! Resource trait for declarative state management
//!
//! A Resource is a desired-state record published into a store. Resources
//! are compared by value: two resources with the same key but different
//! contents mean the published copy must be updated.

use std::fmt;

/// Core trait for declarative resources
///
/// Every resource in the system implements this trait, which provides:
/// - Identity (key, namespace, type)
/// - A human-readable description for diffs and logs
///
/// Equality (`PartialEq`) decides whether a published resource is stale.
///
/// # Example
///
/// ```
/// use declarative::Resource;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Hostname {
///     name: String,
/// }
///
/// impl Resource for Hostname {
///     type Key = String;
///
///     fn key(&self) -> String {
///         "hostname".to_string()
///     }
///
///     fn namespace(&self) -> &str {
///         "network-config"
///     }
///
///     fn resource_type() -> &'static str {
///         "HostnameSpec"
///     }
///
///     fn description(&self) -> String {
///         format!("hostname {}", self.name)
///     }
/// }
/// ```
pub trait Resource: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Identity of the resource within its namespace
    ///
    /// This should be stable and uniquely identify the resource. The
    /// `Display` form is used in logs and error messages.
    type Key: Ord + Clone + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Unique key for this resource
    fn key(&self) -> Self::Key;

    /// Namespace the resource is published into
    fn namespace(&self) -> &str;

    /// Resource type category, used for grouping and filtering
    fn resource_type() -> &'static str;

    /// Human-readable description of what this resource declares
    fn description(&self) -> String {
        format!("{} {}", Self::resource_type(), self.key())
    }
}
