//! Link-layer enumerations shared by link declarations.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Origin of a link declaration.
///
/// Layers are ordered by precedence: a later stage merging same-named links
/// from several layers lets the higher layer win. Only `Default`, `Cmdline`
/// and `MachineConfiguration` are produced by the link config controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigLayer {
    /// Built-in defaults (loopback)
    Default,
    /// Kernel command line
    Cmdline,
    /// Cloud / platform metadata
    Platform,
    /// Runtime operators (e.g. DHCP)
    Operator,
    /// Machine configuration document
    #[serde(rename = "configuration")]
    MachineConfiguration,
}

impl ConfigLayer {
    /// Every layer, lowest precedence first.
    pub const ALL: [ConfigLayer; 5] = [
        ConfigLayer::Default,
        ConfigLayer::Cmdline,
        ConfigLayer::Platform,
        ConfigLayer::Operator,
        ConfigLayer::MachineConfiguration,
    ];

    /// Short name used in resource ids (`configuration/eth0`).
    pub fn name(&self) -> &'static str {
        match self {
            ConfigLayer::Default => "default",
            ConfigLayer::Cmdline => "cmdline",
            ConfigLayer::Platform => "platform",
            ConfigLayer::Operator => "operator",
            ConfigLayer::MachineConfiguration => "configuration",
        }
    }

    /// Parse a layer from its short name.
    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|layer| layer.name() == s)
    }
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigLayer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| Error::UnknownLayer(s.to_string()))
    }
}

/// Hardware/link-layer type (ARPHRD_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    /// Ethernet framing
    #[default]
    Ether,
    /// Loopback device
    Loopback,
    /// No link-layer header (layer 3 tunnels)
    None,
}

impl LinkType {
    /// Kernel ARPHRD value.
    pub fn arphrd(&self) -> u16 {
        match self {
            LinkType::Ether => 1,
            LinkType::Loopback => 772,
            LinkType::None => 0xfffe,
        }
    }
}

/// VLAN tagging protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VlanProtocol {
    /// IEEE 802.1Q (customer tag)
    #[default]
    #[serde(rename = "802.1q")]
    Ieee8021Q,
    /// IEEE 802.1ad (service tag, QinQ)
    #[serde(rename = "802.1ad")]
    Ieee8021AD,
}

impl VlanProtocol {
    /// Ethertype carried in the tag.
    pub fn ethertype(&self) -> u16 {
        match self {
            VlanProtocol::Ieee8021Q => 0x8100,
            VlanProtocol::Ieee8021AD => 0x88a8,
        }
    }
}

impl fmt::Display for VlanProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VlanProtocol::Ieee8021Q => f.write_str("802.1q"),
            VlanProtocol::Ieee8021AD => f.write_str("802.1ad"),
        }
    }
}

/// Linux bonding mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BondMode {
    #[default]
    #[serde(rename = "balance-rr")]
    RoundRobin,
    #[serde(rename = "active-backup")]
    ActiveBackup,
    #[serde(rename = "balance-xor")]
    Xor,
    #[serde(rename = "broadcast")]
    Broadcast,
    /// IEEE 802.3ad dynamic link aggregation
    #[serde(rename = "802.3ad")]
    Lacp,
    #[serde(rename = "balance-tlb")]
    Tlb,
    #[serde(rename = "balance-alb")]
    Alb,
}

impl BondMode {
    const ALL: [BondMode; 7] = [
        BondMode::RoundRobin,
        BondMode::ActiveBackup,
        BondMode::Xor,
        BondMode::Broadcast,
        BondMode::Lacp,
        BondMode::Tlb,
        BondMode::Alb,
    ];

    /// Name used in configuration and sysfs.
    pub fn name(&self) -> &'static str {
        match self {
            BondMode::RoundRobin => "balance-rr",
            BondMode::ActiveBackup => "active-backup",
            BondMode::Xor => "balance-xor",
            BondMode::Broadcast => "broadcast",
            BondMode::Lacp => "802.3ad",
            BondMode::Tlb => "balance-tlb",
            BondMode::Alb => "balance-alb",
        }
    }

    /// Kernel numeric mode (IFLA_BOND_MODE).
    pub fn value(&self) -> u8 {
        match self {
            BondMode::RoundRobin => 0,
            BondMode::ActiveBackup => 1,
            BondMode::Xor => 2,
            BondMode::Broadcast => 3,
            BondMode::Lacp => 4,
            BondMode::Tlb => 5,
            BondMode::Alb => 6,
        }
    }
}

impl fmt::Display for BondMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BondMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| Error::UnknownBondMode(s.to_string()))
    }
}

/// Bond transmit hash policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BondXmitHashPolicy {
    #[serde(rename = "layer2")]
    Layer2,
    #[serde(rename = "layer3+4")]
    Layer34,
    #[serde(rename = "layer2+3")]
    Layer23,
    #[serde(rename = "encap2+3")]
    Encap23,
    #[serde(rename = "encap3+4")]
    Encap34,
}

impl BondXmitHashPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            BondXmitHashPolicy::Layer2 => "layer2",
            BondXmitHashPolicy::Layer34 => "layer3+4",
            BondXmitHashPolicy::Layer23 => "layer2+3",
            BondXmitHashPolicy::Encap23 => "encap2+3",
            BondXmitHashPolicy::Encap34 => "encap3+4",
        }
    }
}

impl FromStr for BondXmitHashPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "layer2" => Ok(BondXmitHashPolicy::Layer2),
            "layer3+4" => Ok(BondXmitHashPolicy::Layer34),
            "layer2+3" => Ok(BondXmitHashPolicy::Layer23),
            "encap2+3" => Ok(BondXmitHashPolicy::Encap23),
            "encap3+4" => Ok(BondXmitHashPolicy::Encap34),
            _ => Err(Error::UnknownHashPolicy(s.to_string())),
        }
    }
}

/// LACPDU transmission rate for 802.3ad bonds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LacpRate {
    Slow,
    Fast,
}

impl FromStr for LacpRate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "slow" => Ok(LacpRate::Slow),
            "fast" => Ok(LacpRate::Fast),
            _ => Err(Error::UnknownLacpRate(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_names() {
        assert_eq!(ConfigLayer::MachineConfiguration.to_string(), "configuration");
        assert_eq!(
            "cmdline".parse::<ConfigLayer>().unwrap(),
            ConfigLayer::Cmdline
        );
        assert!(matches!(
            "kernel".parse::<ConfigLayer>(),
            Err(Error::UnknownLayer(_))
        ));
    }

    #[test]
    fn test_layer_precedence() {
        assert!(ConfigLayer::Default < ConfigLayer::Cmdline);
        assert!(ConfigLayer::Cmdline < ConfigLayer::MachineConfiguration);
        assert_eq!(ConfigLayer::ALL.iter().max(), Some(&ConfigLayer::MachineConfiguration));
    }

    #[test]
    fn test_bond_mode_decoding() {
        assert_eq!("balance-xor".parse::<BondMode>().unwrap(), BondMode::Xor);
        assert_eq!("802.3ad".parse::<BondMode>().unwrap(), BondMode::Lacp);
        assert_eq!(BondMode::Xor.value(), 2);
        assert_eq!(
            "balance-foo".parse::<BondMode>(),
            Err(Error::UnknownBondMode("balance-foo".to_string()))
        );
    }

    #[test]
    fn test_bond_mode_names_parse_back() {
        for mode in BondMode::ALL {
            assert_eq!(mode.name().parse::<BondMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_hash_policy_and_lacp_rate() {
        assert_eq!(
            "layer3+4".parse::<BondXmitHashPolicy>().unwrap(),
            BondXmitHashPolicy::Layer34
        );
        assert!("layer5".parse::<BondXmitHashPolicy>().is_err());
        assert_eq!("fast".parse::<LacpRate>().unwrap(), LacpRate::Fast);
        assert!("medium".parse::<LacpRate>().is_err());
    }

    #[test]
    fn test_link_type_and_protocol_values() {
        assert_eq!(LinkType::Ether.arphrd(), 1);
        assert_eq!(LinkType::None.arphrd(), 65534);
        assert_eq!(VlanProtocol::default().ethertype(), 0x8100);
        assert_eq!(VlanProtocol::Ieee8021AD.to_string(), "802.1ad");
    }
}
