//! Machine configuration document (network section).
//!
//! Only the fields that shape link declarations are modeled. Addressing
//! fields (`cidr`) are carried so documents round-trip, but nothing here
//! interprets them.

use declarative::Resource;
use serde::{Deserialize, Serialize};

/// Namespace the machine configuration is published in.
pub const CONFIG_NAMESPACE: &str = "config";

/// Id of the active machine configuration document.
pub const MACHINE_CONFIG_ID: &str = "v1alpha1";

/// The machine configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub network: NetworkConfig,
}

impl MachineConfig {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            network: NetworkConfig { devices },
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.network.devices
    }
}

impl Resource for MachineConfig {
    type Key = String;

    fn key(&self) -> String {
        MACHINE_CONFIG_ID.to_string()
    }

    fn namespace(&self) -> &str {
        CONFIG_NAMESPACE
    }

    fn resource_type() -> &'static str {
        "MachineConfig"
    }

    fn description(&self) -> String {
        format!(
            "machine config {} ({} devices)",
            MACHINE_CONFIG_ID,
            self.network.devices.len()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub devices: Vec<Device>,
}

/// One network device entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    pub interface: String,
    /// Leave the device entirely unmanaged
    pub ignore: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vlans: Vec<Vlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bond: Option<Bond>,
    pub dummy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wireguard: Option<Wireguard>,
}

impl Device {
    /// A plain device entry with no kind markers.
    pub fn named(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Vlan {
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Bond {
    /// Slave interface names, in slave order
    pub interfaces: Vec<String>,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lacp_rate: Option<String>,
    pub mii_mon: u32,
    pub up_delay: u32,
    pub down_delay: u32,
    /// Defaults to true when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_carrier: Option<bool>,
}

#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Wireguard {
    pub private_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firewall_mark: Option<u32>,
    pub peers: Vec<WireguardPeer>,
}

// Keep private keys out of logs.
impl std::fmt::Debug for Wireguard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wireguard")
            .field("private_key", &"<redacted>")
            .field("listen_port", &self.listen_port)
            .field("firewall_mark", &self.firewall_mark)
            .field("peers", &self.peers)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WireguardPeer {
    pub public_key: String,
    /// `host:port`
    pub endpoint: String,
    pub allowed_ips: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_keepalive_interval: Option<u16>,
}
