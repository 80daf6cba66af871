//! # Linkspec
//!
//! Desired-state declarations for network links.
//!
//! A [`LinkSpec`] says what one configuration layer wants a named link to
//! look like: whether it is up, whether software creates it, its link-layer
//! type, and kind-specific settings for VLANs, bonds, dummies and WireGuard
//! tunnels. Declarations are keyed by `(layer, name)` so several layers can
//! speak about the same device; a later merge stage resolves them by
//! [`ConfigLayer`] precedence.
//!
//! ```
//! use linkspec::{ConfigLayer, LinkKind, LinkSpec, VlanSpec};
//!
//! let vlan = LinkSpec::logical(
//!     "eth0.24",
//!     ConfigLayer::MachineConfiguration,
//!     LinkKind::Vlan(VlanSpec::new(24, "eth0")?),
//! );
//! assert_eq!(vlan.key().to_string(), "configuration/eth0.24");
//! assert_eq!(vlan.parent_name(), Some("eth0"));
//! # Ok::<(), linkspec::Error>(())
//! ```

pub mod error;
pub mod spec;
pub mod types;

pub use error::{Error, Result};
pub use spec::{
    BondMasterSpec, BondSlave, DanglingReference, LinkKey, LinkKind, LinkSpec, MAX_NAME_LEN,
    NAMESPACE, Relation, VlanSpec, WireguardPeer, WireguardSpec, dangling_references,
    parse_prefix, validate_name,
};
pub use types::{BondMode, BondXmitHashPolicy, ConfigLayer, LacpRate, LinkType, VlanProtocol};
