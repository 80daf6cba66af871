mod common;

use common::{controller, link, machine_config, published_ids};
use declarative::{CancelToken, ResourceStore};
use linkconfig::{Device, Error, MachineConfig, Vlan};
use linkspec::{
    BondMode, ConfigLayer, LinkKind, LinkSpec, LinkType, VlanProtocol, dangling_references,
};

#[test]
fn test_loopback_only_without_inputs() {
    let ctrl = controller(None);
    ctrl.reconcile(&CancelToken::new()).unwrap();

    assert_eq!(published_ids(ctrl.link_store()), vec!["default/lo"]);

    let lo = link(ctrl.link_store(), "default/lo");
    assert_eq!(lo.name, "lo");
    assert!(lo.up);
    assert!(!lo.logical);
    assert_eq!(lo.layer, ConfigLayer::Default);
}

#[test]
fn test_cmdline_device() {
    let ctrl = controller(Some(
        "console=ttyS0 ip=172.20.0.2::172.20.0.1:255.255.255.0::eth1::::: quiet",
    ));
    ctrl.reconcile(&CancelToken::new()).unwrap();

    assert_eq!(
        published_ids(ctrl.link_store()),
        vec!["cmdline/eth1", "default/lo"]
    );

    let eth1 = link(ctrl.link_store(), "cmdline/eth1");
    assert!(eth1.up);
    assert!(!eth1.logical);
    assert_eq!(eth1.layer, ConfigLayer::Cmdline);
}

#[test]
fn test_malformed_cmdline_is_reported() {
    let ctrl = controller(Some("ip=172.20.0.2:::::eth1:bogus"));
    let report = ctrl.reconcile(&CancelToken::new()).unwrap();

    assert!(matches!(report.errors.as_slice(), [Error::Cmdline { .. }]));
    assert_eq!(published_ids(ctrl.link_store()), vec!["default/lo"]);
}

#[test]
fn test_machine_configuration() {
    let ctrl = controller(None);
    ctrl.config_store().put(machine_config()).unwrap();

    let report = ctrl.reconcile(&CancelToken::new()).unwrap();
    assert!(report.is_clean(), "{report:?}");

    assert_eq!(
        published_ids(ctrl.link_store()),
        vec![
            "configuration/bond0",
            "configuration/dummy0",
            "configuration/eth0",
            "configuration/eth0.24",
            "configuration/eth0.48",
            "configuration/eth1",
            "configuration/eth2",
            "configuration/eth3",
            "configuration/wireguard0",
            "default/lo",
        ]
    );

    let links = ctrl.published().unwrap();
    assert!(dangling_references(&links).is_empty());

    for name in ["eth0", "eth1"] {
        let l = link(ctrl.link_store(), &format!("configuration/{name}"));
        assert!(l.up);
        assert!(!l.logical);
        assert_eq!(l.layer, ConfigLayer::MachineConfiguration);
    }

    for vid in [24u16, 48] {
        let vlan = link(ctrl.link_store(), &format!("configuration/eth0.{vid}"));
        assert!(vlan.up);
        assert!(vlan.logical);
        assert_eq!(vlan.link_type, LinkType::Ether);
        assert_eq!(vlan.kind.name(), "vlan");
        assert_eq!(vlan.parent_name(), Some("eth0"));
        let spec = vlan.vlan().unwrap();
        assert_eq!(spec.protocol, VlanProtocol::Ieee8021Q);
        assert_eq!(spec.vid, vid);
    }

    for name in ["eth2", "eth3"] {
        let slave = link(ctrl.link_store(), &format!("configuration/{name}"));
        assert!(!slave.up);
        assert!(!slave.logical);
        assert_eq!(slave.master_name(), Some("bond0"));
    }

    let bond0 = link(ctrl.link_store(), "configuration/bond0");
    assert!(bond0.up);
    assert!(bond0.logical);
    assert_eq!(bond0.link_type, LinkType::Ether);
    let master = bond0.bond_master().unwrap();
    assert_eq!(master.mode, BondMode::Xor);
    assert!(master.use_carrier);

    let dummy0 = link(ctrl.link_store(), "configuration/dummy0");
    assert!(dummy0.up);
    assert!(dummy0.logical);
    assert_eq!(dummy0.kind, LinkKind::Dummy);

    let wg0 = link(ctrl.link_store(), "configuration/wireguard0");
    assert!(wg0.up);
    assert!(wg0.logical);
    assert_eq!(wg0.link_type, LinkType::None);
    let wg = wg0.wireguard().unwrap();
    assert_eq!(wg.private_key, "ABC");
    assert_eq!(wg.peers.len(), 1);
    assert_eq!(wg.peers[0].public_key, "DEF");
    assert_eq!(wg.peers[0].endpoint, "10.0.0.1:3000");
    assert_eq!(
        wg.peers[0].allowed_ips,
        vec!["10.2.3.0/24".parse().unwrap(), "10.2.4.0/24".parse().unwrap()]
    );
}

#[test]
fn test_second_pass_is_a_no_op() {
    let ctrl = controller(Some("ip=172.20.0.2::172.20.0.1:255.255.255.0::eth1:::::"));
    ctrl.config_store().put(machine_config()).unwrap();

    let first = ctrl.reconcile(&CancelToken::new()).unwrap();
    assert_eq!(first.summary.created, 11);

    assert!(ctrl.plan().unwrap().is_empty());
    let second = ctrl.reconcile(&CancelToken::new()).unwrap();
    assert_eq!(second.summary.total_changes(), 0);
}

#[test]
fn test_ignored_device_with_children() {
    let ctrl = controller(None);
    ctrl.config_store()
        .put(MachineConfig::new(vec![Device {
            ignore: true,
            vlans: vec![Vlan { id: 10, cidr: None }],
            ..Device::named("eth5")
        }]))
        .unwrap();

    ctrl.reconcile(&CancelToken::new()).unwrap();
    assert_eq!(published_ids(ctrl.link_store()), vec!["default/lo"]);
}

#[test]
fn test_removed_device_and_dependents_are_destroyed() {
    let ctrl = controller(None);
    ctrl.config_store().put(machine_config()).unwrap();
    ctrl.reconcile(&CancelToken::new()).unwrap();

    // Drop eth0 (and its VLANs) and the bond (releasing eth2/eth3)
    let mut config = machine_config();
    config
        .network
        .devices
        .retain(|d| d.interface != "eth0" && d.interface != "bond0");
    ctrl.config_store().put(config).unwrap();

    let report = ctrl.reconcile(&CancelToken::new()).unwrap();
    assert_eq!(report.summary.removed, 4);
    assert_eq!(report.summary.modified, 2);

    let ids = published_ids(ctrl.link_store());
    for gone in [
        "configuration/eth0",
        "configuration/eth0.24",
        "configuration/eth0.48",
        "configuration/bond0",
    ] {
        assert!(!ids.contains(&gone.to_string()), "{gone} still published");
    }

    let eth2 = link(ctrl.link_store(), "configuration/eth2");
    assert!(eth2.up);
    assert_eq!(eth2.master_name(), None);
}

#[test]
fn test_deleted_config_keeps_only_other_layers() {
    let ctrl = controller(Some("ip=:::::eth1:::::"));
    ctrl.config_store().put(machine_config()).unwrap();
    ctrl.reconcile(&CancelToken::new()).unwrap();

    ctrl.config_store()
        .destroy(&linkconfig::MACHINE_CONFIG_ID.to_string())
        .unwrap();
    ctrl.reconcile(&CancelToken::new()).unwrap();

    assert_eq!(
        published_ids(ctrl.link_store()),
        vec!["cmdline/eth1", "default/lo"]
    );
}

#[test]
fn test_tampered_declaration_is_restored() {
    let ctrl = controller(None);
    ctrl.config_store().put(machine_config()).unwrap();
    ctrl.reconcile(&CancelToken::new()).unwrap();

    let mut eth2 = link(ctrl.link_store(), "configuration/eth2");
    eth2.up = true;
    eth2.bond_slave = None;
    ctrl.link_store().update(eth2).unwrap();
    ctrl.link_store()
        .destroy(&LinkSpec::loopback().key())
        .unwrap();

    let report = ctrl.reconcile(&CancelToken::new()).unwrap();
    assert_eq!(report.summary.created, 1);
    assert_eq!(report.summary.modified, 1);

    let eth2 = link(ctrl.link_store(), "configuration/eth2");
    assert!(!eth2.up);
    assert_eq!(eth2.master_name(), Some("bond0"));
}

#[test]
fn test_bad_entry_publishes_the_rest() {
    let ctrl = controller(None);
    let mut config = machine_config();
    config.network.devices[5].bond.as_mut().unwrap().mode = "balance-foo".into();
    ctrl.config_store().put(config).unwrap();

    let report = ctrl.reconcile(&CancelToken::new()).unwrap();
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].to_string().contains("bond0"));

    let ids = published_ids(ctrl.link_store());
    assert!(!ids.contains(&"configuration/bond0".to_string()));

    // Without the bond, eth2 and eth3 are plain devices again
    let eth3 = link(ctrl.link_store(), "configuration/eth3");
    assert!(eth3.up);
    assert_eq!(eth3.master_name(), None);
    assert!(ids.contains(&"configuration/wireguard0".to_string()));
}
