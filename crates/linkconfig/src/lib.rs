//! # Linkconfig
//!
//! Derives the network link declarations of a node from its configuration
//! sources and keeps the published set in step with them.
//!
//! Three sources feed the desired set:
//!
//! - **Default**: always the loopback device
//! - **Kernel command line**: the device named by `ip=`, if any
//! - **Machine configuration**: every non-ignored device entry, expanded
//!   into its base link, VLAN sub-interfaces and bond slaves
//!
//! [`LinkConfigController`] recomputes that set on every pass and converges
//! a [`declarative::ResourceStore`] of [`linkspec::LinkSpec`]s to it,
//! creating, updating and destroying declarations as needed.
//!
//! ```
//! use declarative::{CancelToken, MemoryStore, ResourceStore};
//! use linkconfig::{Cmdline, Device, LinkConfigController, MachineConfig};
//! use linkspec::LinkSpec;
//!
//! let configs: MemoryStore<MachineConfig> = MemoryStore::new();
//! let links: MemoryStore<LinkSpec> = MemoryStore::new();
//! configs.put(MachineConfig::new(vec![Device::named("eth0")]))?;
//!
//! let controller = LinkConfigController::new(Some(Cmdline::parse("ip=dhcp")), configs, links);
//! let report = controller.reconcile(&CancelToken::new())?;
//! assert_eq!(report.summary.created, 2); // lo and eth0
//! assert!(controller.plan()?.is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cmdline;
pub mod controller;
pub mod error;
pub mod expand;
pub mod machine;
pub mod sources;

pub use cmdline::{Autoconf, Cmdline, CmdlineNetworking, cmdline_links};
pub use controller::{LinkConfigController, PassReport};
pub use error::{DeviceError, Error, Result};
pub use expand::{Derivation, Warning, configuration_links, expand_devices};
pub use machine::{
    Bond, CONFIG_NAMESPACE, Device, MACHINE_CONFIG_ID, MachineConfig, NetworkConfig, Vlan,
    Wireguard, WireguardPeer,
};
pub use sources::{OWNED_LAYERS, default_links, derive, is_owned};
