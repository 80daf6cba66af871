#![allow(dead_code)]

use declarative::{ExecuteOptions, MemoryStore, ResourceStore, RetryConfig};
use linkconfig::{
    Bond, Cmdline, Device, LinkConfigController, MachineConfig, Vlan, Wireguard, WireguardPeer,
};
use linkspec::{LinkKey, LinkSpec, NAMESPACE};
use std::time::Duration;

pub type Controller = LinkConfigController<MemoryStore<MachineConfig>, MemoryStore<LinkSpec>>;

pub fn controller(cmdline: Option<&str>) -> Controller {
    LinkConfigController::new(cmdline.map(Cmdline::parse), MemoryStore::new(), MemoryStore::new())
        .with_options(ExecuteOptions {
            retry: RetryConfig::new(3, Duration::from_millis(1), 2.0),
            ..ExecuteOptions::default()
        })
}

/// eth0 with two VLANs, eth1, an ignored and a plain eth2, eth3, a bond
/// over eth2/eth3, a dummy and a WireGuard tunnel.
pub fn machine_config() -> MachineConfig {
    MachineConfig::new(vec![
        Device {
            cidr: Some("192.168.0.24/28".into()),
            vlans: vec![
                Vlan {
                    id: 24,
                    cidr: Some("10.0.0.1/8".into()),
                },
                Vlan {
                    id: 48,
                    cidr: Some("10.0.0.2/8".into()),
                },
            ],
            ..Device::named("eth0")
        },
        Device {
            cidr: Some("192.168.0.25/28".into()),
            ..Device::named("eth1")
        },
        Device {
            ignore: true,
            ..Device::named("eth2")
        },
        Device::named("eth2"),
        Device::named("eth3"),
        Device {
            bond: Some(Bond {
                interfaces: vec!["eth2".into(), "eth3".into()],
                mode: "balance-xor".into(),
                ..Bond::default()
            }),
            ..Device::named("bond0")
        },
        Device {
            dummy: true,
            ..Device::named("dummy0")
        },
        Device {
            wireguard: Some(Wireguard {
                private_key: "ABC".into(),
                peers: vec![WireguardPeer {
                    public_key: "DEF".into(),
                    endpoint: "10.0.0.1:3000".into(),
                    allowed_ips: vec!["10.2.3.0/24".into(), "10.2.4.0/24".into()],
                    persistent_keepalive_interval: None,
                }],
                ..Wireguard::default()
            }),
            ..Device::named("wireguard0")
        },
    ])
}

/// Published keys, sorted, in `layer/name` form.
pub fn published_ids(store: &MemoryStore<LinkSpec>) -> Vec<String> {
    let mut ids: Vec<String> = store
        .list(NAMESPACE)
        .unwrap()
        .iter()
        .map(|l| l.key().to_string())
        .collect();
    ids.sort();
    ids
}

pub fn link(store: &MemoryStore<LinkSpec>, id: &str) -> LinkSpec {
    let (layer, name) = id.split_once('/').unwrap();
    store
        .get(&LinkKey::new(layer.parse().unwrap(), name))
        .unwrap()
        .unwrap_or_else(|| panic!("{id} is not published"))
}
