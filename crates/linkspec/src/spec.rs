//! Link declarations and their kind-specific settings.

use crate::error::{Error, Result};
use crate::types::{BondMode, BondXmitHashPolicy, ConfigLayer, LacpRate, LinkType, VlanProtocol};
use declarative::Resource;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Namespace link declarations are published into.
pub const NAMESPACE: &str = "network-config";

/// Linux limit on interface names (IFNAMSIZ - 1).
pub const MAX_NAME_LEN: usize = 15;

/// Identity of a declaration: unique per (layer, name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkKey {
    pub layer: ConfigLayer,
    pub name: String,
}

impl LinkKey {
    pub fn new(layer: ConfigLayer, name: impl Into<String>) -> Self {
        Self {
            layer,
            name: name.into(),
        }
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.layer, self.name)
    }
}

/// VLAN sub-interface stacked on a parent link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanSpec {
    /// 802.1Q VLAN id
    pub vid: u16,
    pub protocol: VlanProtocol,
    /// Link the VLAN is stacked on
    pub parent: String,
}

impl VlanSpec {
    /// Build an 802.1Q VLAN, checking the id range.
    pub fn new(vid: u32, parent: impl Into<String>) -> Result<Self> {
        let vid = u16::try_from(vid)
            .ok()
            .filter(|v| (1..=4094).contains(v))
            .ok_or(Error::InvalidVlanId(vid))?;
        Ok(Self {
            vid,
            protocol: VlanProtocol::Ieee8021Q,
            parent: parent.into(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=4094).contains(&self.vid) {
            return Err(Error::InvalidVlanId(u32::from(self.vid)));
        }
        validate_name(&self.parent)
    }
}

/// Bond master settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondMasterSpec {
    pub mode: BondMode,
    pub hash_policy: Option<BondXmitHashPolicy>,
    pub lacp_rate: Option<LacpRate>,
    /// MII link monitoring interval, milliseconds
    pub mii_mon: u32,
    pub up_delay: u32,
    pub down_delay: u32,
    /// Use carrier state rather than MII ioctls for failover detection
    pub use_carrier: bool,
}

impl BondMasterSpec {
    /// Build a bond with defaults from the mode's configuration name.
    pub fn from_mode_name(mode: &str) -> Result<Self> {
        Ok(Self {
            mode: mode.parse()?,
            ..Self::default()
        })
    }
}

impl Default for BondMasterSpec {
    fn default() -> Self {
        Self {
            mode: BondMode::default(),
            hash_policy: None,
            lacp_rate: None,
            mii_mon: 0,
            up_delay: 0,
            down_delay: 0,
            use_carrier: true,
        }
    }
}

/// Membership of a link in a bond.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondSlave {
    pub master_name: String,
    /// Position in the bond's slave list
    pub slave_index: u32,
}

/// WireGuard tunnel settings.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireguardSpec {
    pub private_key: String,
    pub listen_port: Option<u16>,
    pub firewall_mark: Option<u32>,
    pub peers: Vec<WireguardPeer>,
}

// Declarations end up in logs, the key must not
impl fmt::Debug for WireguardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireguardSpec")
            .field("private_key", &"<redacted>")
            .field("listen_port", &self.listen_port)
            .field("firewall_mark", &self.firewall_mark)
            .field("peers", &self.peers)
            .finish()
    }
}

impl WireguardSpec {
    pub fn validate(&self) -> Result<()> {
        validate_key(&self.private_key, "private")?;
        self.peers.iter().try_for_each(WireguardPeer::validate)
    }
}

/// One WireGuard peer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireguardPeer {
    pub public_key: String,
    /// `host:port`, empty for peers that only connect in
    pub endpoint: String,
    /// Keepalive interval in seconds
    pub persistent_keepalive_interval: Option<u16>,
    pub allowed_ips: Vec<IpNet>,
}

impl WireguardPeer {
    /// Build a peer from configuration strings, parsing allowed IPs in order.
    pub fn parse(public_key: &str, endpoint: &str, allowed_ips: &[String]) -> Result<Self> {
        let peer = Self {
            public_key: public_key.to_string(),
            endpoint: endpoint.to_string(),
            persistent_keepalive_interval: None,
            allowed_ips: allowed_ips
                .iter()
                .map(|prefix| parse_prefix(prefix))
                .collect::<Result<_>>()?,
        };
        peer.validate()?;
        Ok(peer)
    }

    pub fn validate(&self) -> Result<()> {
        validate_key(&self.public_key, "public")?;
        validate_endpoint(&self.endpoint)
    }
}

/// Kind of link and its kind-specific settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum LinkKind {
    /// Pre-existing device (NIC, loopback)
    Physical,
    Vlan(VlanSpec),
    Bond(BondMasterSpec),
    Dummy,
    Wireguard(WireguardSpec),
}

impl LinkKind {
    /// rtnetlink kind string; empty for physical devices.
    pub fn name(&self) -> &'static str {
        match self {
            LinkKind::Physical => "",
            LinkKind::Vlan(_) => "vlan",
            LinkKind::Bond(_) => "bond",
            LinkKind::Dummy => "dummy",
            LinkKind::Wireguard(_) => "wireguard",
        }
    }

    /// Whether links of this kind are created by software.
    pub fn is_logical(&self) -> bool {
        !matches!(self, LinkKind::Physical)
    }
}

/// Desired state of one network link as declared by one configuration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub name: String,
    pub layer: ConfigLayer,
    /// Created by software rather than pre-existing
    pub logical: bool,
    /// Requested administrative state
    pub up: bool,
    pub mtu: Option<u32>,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    pub kind: LinkKind,
    pub bond_slave: Option<BondSlave>,
}

impl LinkSpec {
    /// A physical Ethernet link, administratively up.
    pub fn physical(name: impl Into<String>, layer: ConfigLayer) -> Self {
        Self {
            name: name.into(),
            layer,
            logical: false,
            up: true,
            mtu: None,
            link_type: LinkType::Ether,
            kind: LinkKind::Physical,
            bond_slave: None,
        }
    }

    /// The loopback device, always up.
    pub fn loopback() -> Self {
        Self {
            link_type: LinkType::Loopback,
            ..Self::physical("lo", ConfigLayer::Default)
        }
    }

    /// A software link of the given kind, administratively up.
    pub fn logical(name: impl Into<String>, layer: ConfigLayer, kind: LinkKind) -> Self {
        let link_type = match kind {
            LinkKind::Wireguard(_) => LinkType::None,
            _ => LinkType::Ether,
        };
        Self {
            logical: true,
            link_type,
            kind,
            ..Self::physical(name, layer)
        }
    }

    pub fn key(&self) -> LinkKey {
        LinkKey::new(self.layer, self.name.clone())
    }

    /// Link this VLAN is stacked on.
    pub fn parent_name(&self) -> Option<&str> {
        match &self.kind {
            LinkKind::Vlan(vlan) => Some(&vlan.parent),
            _ => None,
        }
    }

    /// Bond this link is enslaved to.
    pub fn master_name(&self) -> Option<&str> {
        self.bond_slave.as_ref().map(|s| s.master_name.as_str())
    }

    /// Enslave the link to a bond: forced down and non-logical.
    pub fn enslave(&mut self, master_name: impl Into<String>, slave_index: u32) {
        self.up = false;
        self.logical = false;
        self.bond_slave = Some(BondSlave {
            master_name: master_name.into(),
            slave_index,
        });
    }

    pub fn vlan(&self) -> Option<&VlanSpec> {
        match &self.kind {
            LinkKind::Vlan(vlan) => Some(vlan),
            _ => None,
        }
    }

    pub fn bond_master(&self) -> Option<&BondMasterSpec> {
        match &self.kind {
            LinkKind::Bond(bond) => Some(bond),
            _ => None,
        }
    }

    pub fn wireguard(&self) -> Option<&WireguardSpec> {
        match &self.kind {
            LinkKind::Wireguard(wg) => Some(wg),
            _ => None,
        }
    }

    /// Check the name and the kind-specific settings.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if let Some(slave) = &self.bond_slave {
            validate_name(&slave.master_name)?;
        }
        match &self.kind {
            LinkKind::Physical | LinkKind::Dummy | LinkKind::Bond(_) => Ok(()),
            LinkKind::Vlan(vlan) => vlan.validate(),
            LinkKind::Wireguard(wg) => wg.validate(),
        }
    }
}

impl Resource for LinkSpec {
    type Key = LinkKey;

    fn key(&self) -> LinkKey {
        LinkSpec::key(self)
    }

    fn namespace(&self) -> &str {
        NAMESPACE
    }

    fn resource_type() -> &'static str {
        "LinkSpec"
    }

    fn description(&self) -> String {
        let state = if self.up { "up" } else { "down" };
        let kind = match self.kind.name() {
            "" => "physical",
            other => other,
        };
        let mut desc = format!("{} {} link {}", state, kind, self.name);
        if let Some(parent) = self.parent_name() {
            desc.push_str(&format!(" on {parent}"));
        }
        if let Some(master) = self.master_name() {
            desc.push_str(&format!(" in {master}"));
        }
        desc
    }
}

/// Which reference of a declaration failed to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Parent,
    Master,
}

/// A parent or master reference with no matching declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub link: LinkKey,
    pub relation: Relation,
    pub target: String,
}

/// Find parent/master references that do not resolve within `links`.
///
/// References resolve only against declarations of the same layer.
pub fn dangling_references(links: &[LinkSpec]) -> Vec<DanglingReference> {
    let known: std::collections::HashSet<LinkKey> = links.iter().map(LinkSpec::key).collect();

    let mut dangling = Vec::new();
    for link in links {
        let references = [
            (Relation::Parent, link.parent_name()),
            (Relation::Master, link.master_name()),
        ];
        for (relation, target) in references {
            if let Some(target) = target
                && !known.contains(&LinkKey::new(link.layer, target))
            {
                dangling.push(DanglingReference {
                    link: link.key(),
                    relation,
                    target: target.to_string(),
                });
            }
        }
    }
    dangling
}

/// Check that a name is usable as a Linux interface name.
pub fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "empty"
    } else if name.len() > MAX_NAME_LEN {
        "longer than 15 bytes"
    } else if name == "." || name == ".." {
        "reserved"
    } else if name
        .chars()
        .any(|c| c.is_whitespace() || c == '/' || c == ':')
    {
        "contains whitespace, '/' or ':'"
    } else {
        return Ok(());
    };

    Err(Error::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Keys are checked for syntax only (standard base64 alphabet); decoding
/// and length checks belong to whoever programs the tunnel.
fn validate_key(key: &str, role: &'static str) -> Result<()> {
    let body = key.trim_end_matches('=');
    let padding = key.len() - body.len();

    let valid = !body.is_empty()
        && padding <= 2
        && body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/');

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidKey { role })
    }
}

/// Accepts `host:port`, `ipv4:port` and `[ipv6]:port`.
fn validate_endpoint(endpoint: &str) -> Result<()> {
    if endpoint.is_empty() {
        return Ok(());
    }

    let invalid = |reason| Error::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let (host, port) = endpoint.rsplit_once(':').ok_or(invalid("missing port"))?;
    match port.parse::<u16>() {
        Ok(p) if p != 0 => {}
        _ => return Err(invalid("port is not a number in 1-65535")),
    }

    if let Some(inner) = host.strip_prefix('[') {
        let addr = inner
            .strip_suffix(']')
            .ok_or(invalid("unterminated IPv6 bracket"))?;
        addr.parse::<Ipv6Addr>()
            .map_err(|_| invalid("invalid IPv6 address"))?;
        return Ok(());
    }

    // IPv6 needs brackets, otherwise the port boundary is ambiguous
    if host.contains(':') {
        return Err(invalid("IPv6 address must be in brackets"));
    }
    if host.parse::<Ipv4Addr>().is_ok() {
        return Ok(());
    }

    let hostname_ok = !host.is_empty()
        && host
            .split('.')
            .all(|label| {
                !label.is_empty()
                    && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            });
    if hostname_ok {
        Ok(())
    } else {
        Err(invalid("invalid host"))
    }
}

/// Parse a CIDR prefix such as `10.2.3.0/24`.
pub fn parse_prefix(prefix: &str) -> Result<IpNet> {
    prefix.parse().map_err(|e: ipnet::AddrParseError| Error::InvalidPrefix {
        prefix: prefix.to_string(),
        reason: e.to_string(),
    })
}
