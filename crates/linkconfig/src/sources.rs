//! The three link sources and their combination.

use crate::cmdline::{Cmdline, cmdline_links};
use crate::expand::{Derivation, configuration_links};
use crate::machine::MachineConfig;
use linkspec::{ConfigLayer, LinkSpec};

/// Layers whose declarations this controller produces and owns.
pub const OWNED_LAYERS: [ConfigLayer; 3] = [
    ConfigLayer::Default,
    ConfigLayer::Cmdline,
    ConfigLayer::MachineConfiguration,
];

/// Whether a declaration belongs to a layer this controller manages.
pub fn is_owned(link: &LinkSpec) -> bool {
    OWNED_LAYERS.contains(&link.layer)
}

/// Built-in declarations: the loopback device.
pub fn default_links() -> Vec<LinkSpec> {
    vec![LinkSpec::loopback()]
}

/// Derive the full desired set from every source.
///
/// A malformed kernel `ip=` parameter or a bad device entry is reported in
/// `errors` without affecting declarations from the other sources.
pub fn derive(cmdline: Option<&Cmdline>, config: Option<&MachineConfig>) -> Derivation {
    let mut derivation = Derivation {
        links: default_links(),
        ..Derivation::default()
    };

    match cmdline_links(cmdline) {
        Ok(links) => derivation.links.extend(links),
        Err(e) => derivation.errors.push(e),
    }

    derivation.merge(configuration_links(config));
    derivation
}
