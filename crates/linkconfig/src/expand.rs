//! Expansion of machine configuration devices into link declarations.
//!
//! Each device entry yields its base link plus any VLAN sub-interfaces.
//! Bond slave claims are collected on the way and applied once every entry
//! has been expanded, so a slave is down and points at its bond whatever
//! order the entries come in.

use crate::error::{DeviceError, Error};
use crate::machine::{Bond, Device, MachineConfig, Wireguard};
use linkspec::{
    BondMasterSpec, ConfigLayer, LinkKind, LinkSpec, VlanSpec, WireguardPeer, WireguardSpec,
};
use std::collections::HashMap;
use std::fmt;

const LAYER: ConfigLayer = ConfigLayer::MachineConfiguration;

/// Contradictory but recoverable configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Two entries produced the same link name; the later one was kept
    DuplicateLink { layer: ConfigLayer, name: String },
    /// A slave listed by more than one bond; the later bond was kept
    MultipleMasters {
        slave: String,
        previous: String,
        master: String,
    },
    /// A bond listed a software link as a slave; the claim was dropped
    LogicalSlave {
        slave: String,
        kind: &'static str,
        master: String,
    },
    /// A device carrying several kind markers
    ConflictingKinds {
        device: String,
        chosen: &'static str,
        ignored: Vec<&'static str>,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::DuplicateLink { layer, name } => {
                write!(f, "link {layer}/{name} declared more than once, keeping the last")
            }
            Warning::MultipleMasters {
                slave,
                previous,
                master,
            } => write!(
                f,
                "{slave} is a slave of both {previous} and {master}, keeping {master}"
            ),
            Warning::LogicalSlave {
                slave,
                kind,
                master,
            } => write!(
                f,
                "{master} lists {slave} as a slave but it is a {kind} link, leaving it out"
            ),
            Warning::ConflictingKinds {
                device,
                chosen,
                ignored,
            } => write!(
                f,
                "device {device} is configured as {chosen} and {}, treating it as {chosen}",
                ignored.join(", ")
            ),
        }
    }
}

/// Outcome of one derivation: the declarations plus everything that went
/// wrong along the way.
#[derive(Debug, Default)]
pub struct Derivation {
    pub links: Vec<LinkSpec>,
    pub warnings: Vec<Warning>,
    pub errors: Vec<Error>,
}

impl Derivation {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }

    /// Append another derivation's results.
    pub fn merge(&mut self, other: Derivation) {
        self.links.extend(other.links);
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }
}

/// Declarations collected in emission order, unique by name.
#[derive(Default)]
struct LinkSet {
    links: Vec<LinkSpec>,
    index: HashMap<String, usize>,
}

impl LinkSet {
    fn insert(&mut self, link: LinkSpec, warnings: &mut Vec<Warning>) {
        if let Some(&i) = self.index.get(&link.name) {
            log::debug!("replacing earlier declaration of {}", link.name);
            warnings.push(Warning::DuplicateLink {
                layer: link.layer,
                name: link.name.clone(),
            });
            self.links[i] = link;
        } else {
            self.index.insert(link.name.clone(), self.links.len());
            self.links.push(link);
        }
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut LinkSpec> {
        let i = *self.index.get(name)?;
        self.links.get_mut(i)
    }
}

struct SlaveClaim {
    slave: String,
    master: String,
    index: u32,
}

/// Expand the devices of a machine configuration.
///
/// `None` (no configuration yet) yields nothing.
pub fn configuration_links(config: Option<&MachineConfig>) -> Derivation {
    config.map_or_else(Derivation::default, |c| expand_devices(c.devices()))
}

/// Expand device entries, in order, into link declarations.
///
/// Ignored entries contribute nothing. An entry that fails validation
/// contributes nothing either (no base link, no VLANs, no slave claims) and
/// is reported in `errors`; the other entries are still expanded.
pub fn expand_devices(devices: &[Device]) -> Derivation {
    let mut set = LinkSet::default();
    let mut warnings = Vec::new();
    let mut errors = Vec::new();
    let mut claims = Vec::new();

    for device in devices {
        if device.ignore {
            log::debug!("skipping ignored device {}", device.interface);
            continue;
        }

        let (kind, ignored) = select_kind(device);
        if !ignored.is_empty() {
            warnings.push(Warning::ConflictingKinds {
                device: device.interface.clone(),
                chosen: kind.name(),
                ignored,
            });
        }

        match expand_device(device, kind) {
            Ok(expansion) => {
                for link in expansion.links {
                    set.insert(link, &mut warnings);
                }
                claims.extend(expansion.claims);
            }
            Err(source) => errors.push(Error::Device(DeviceError {
                device: device.interface.clone(),
                source,
            })),
        }
    }

    apply_claims(&mut set, claims, &mut warnings);

    debug_assert!(linkspec::dangling_references(&set.links).is_empty());

    Derivation {
        links: set.links,
        warnings,
        errors,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Physical,
    Wireguard,
    Bond,
    Dummy,
}

impl Kind {
    fn name(self) -> &'static str {
        match self {
            Kind::Physical => "physical",
            Kind::Wireguard => "wireguard",
            Kind::Bond => "bond",
            Kind::Dummy => "dummy",
        }
    }
}

/// Kind markers by precedence: WireGuard, then bond, then dummy.
fn select_kind(device: &Device) -> (Kind, Vec<&'static str>) {
    let markers: Vec<Kind> = [
        (device.wireguard.is_some(), Kind::Wireguard),
        (device.bond.is_some(), Kind::Bond),
        (device.dummy, Kind::Dummy),
    ]
    .into_iter()
    .filter_map(|(present, kind)| present.then_some(kind))
    .collect();

    match markers.split_first() {
        Some((&chosen, rest)) => (chosen, rest.iter().map(|k| k.name()).collect()),
        None => (Kind::Physical, Vec::new()),
    }
}

struct Expansion {
    links: Vec<LinkSpec>,
    claims: Vec<SlaveClaim>,
}

fn expand_device(device: &Device, kind: Kind) -> linkspec::Result<Expansion> {
    let name = device.interface.as_str();
    let mut claims = Vec::new();

    let mut base = match (kind, &device.bond, &device.wireguard) {
        (Kind::Wireguard, _, Some(wg)) => {
            LinkSpec::logical(name, LAYER, LinkKind::Wireguard(wireguard_spec(wg)?))
        }
        (Kind::Bond, Some(bond), _) => {
            for (index, slave) in bond.interfaces.iter().enumerate() {
                linkspec::validate_name(slave)?;
                if slave == name {
                    return Err(linkspec::Error::SelfEnslaved(name.to_string()));
                }
                claims.push(SlaveClaim {
                    slave: slave.clone(),
                    master: name.to_string(),
                    index: index as u32,
                });
            }
            LinkSpec::logical(name, LAYER, LinkKind::Bond(bond_spec(bond)?))
        }
        (Kind::Dummy, _, _) => LinkSpec::logical(name, LAYER, LinkKind::Dummy),
        _ => LinkSpec::physical(name, LAYER),
    };
    base.mtu = device.mtu;

    let mut links = vec![base];
    for vlan in &device.vlans {
        let spec = VlanSpec::new(vlan.id, name)?;
        links.push(LinkSpec::logical(
            format!("{name}.{}", spec.vid),
            LAYER,
            LinkKind::Vlan(spec),
        ));
    }

    for link in &links {
        link.validate()?;
    }

    Ok(Expansion { links, claims })
}

fn bond_spec(bond: &Bond) -> linkspec::Result<BondMasterSpec> {
    Ok(BondMasterSpec {
        mode: bond.mode.parse()?,
        hash_policy: bond.hash_policy.as_deref().map(str::parse).transpose()?,
        lacp_rate: bond.lacp_rate.as_deref().map(str::parse).transpose()?,
        mii_mon: bond.mii_mon,
        up_delay: bond.up_delay,
        down_delay: bond.down_delay,
        use_carrier: bond.use_carrier.unwrap_or(true),
    })
}

fn wireguard_spec(wg: &Wireguard) -> linkspec::Result<WireguardSpec> {
    let peers = wg
        .peers
        .iter()
        .map(|peer| {
            let mut spec =
                WireguardPeer::parse(&peer.public_key, &peer.endpoint, &peer.allowed_ips)?;
            spec.persistent_keepalive_interval = peer.persistent_keepalive_interval;
            Ok(spec)
        })
        .collect::<linkspec::Result<_>>()?;

    Ok(WireguardSpec {
        private_key: wg.private_key.clone(),
        listen_port: wg.listen_port,
        firewall_mark: wg.firewall_mark,
        peers,
    })
}

/// Enslave every claimed link, creating a physical declaration for slaves
/// nothing else declared. Only physical links can be slaves.
fn apply_claims(set: &mut LinkSet, claims: Vec<SlaveClaim>, warnings: &mut Vec<Warning>) {
    let mut masters: HashMap<String, String> = HashMap::new();

    for claim in claims {
        if let Some(link) = set.get_mut(&claim.slave)
            && link.kind.is_logical()
        {
            warnings.push(Warning::LogicalSlave {
                kind: link.kind.name(),
                slave: claim.slave,
                master: claim.master,
            });
            continue;
        }

        if let Some(previous) = masters.insert(claim.slave.clone(), claim.master.clone())
            && previous != claim.master
        {
            warnings.push(Warning::MultipleMasters {
                slave: claim.slave.clone(),
                previous,
                master: claim.master.clone(),
            });
        }

        if set.get_mut(&claim.slave).is_none() {
            set.insert(LinkSpec::physical(&claim.slave, LAYER), warnings);
        }
        if let Some(link) = set.get_mut(&claim.slave) {
            link.enslave(claim.master, claim.index);
        }
    }
}
