//! Kernel command line parsing and the boot-parameter link source.
//!
//! Only the `ip=` parameter matters here. It follows the kernel's
//! nfsroot format:
//!
//! ```text
//! ip=<client-ip>:<server-ip>:<gw-ip>:<netmask>:<hostname>:<device>:<autoconf>:<dns0>:<dns1>:<ntp0>
//! ```
//!
//! or a single autoconf keyword such as `ip=dhcp`.

use crate::error::{Error, Result};
use linkspec::{ConfigLayer, LinkSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Kernel parameter carrying network boot settings.
pub const IP_PARAM: &str = "ip";

const IP_FIELDS: usize = 10;

/// Tokenized kernel command line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cmdline {
    params: Vec<(String, String)>,
}

impl Cmdline {
    /// Split a command line into `key=value` parameters.
    ///
    /// Whitespace separates parameters unless inside double quotes; the
    /// quotes themselves are dropped. Bare flags get an empty value.
    pub fn parse(raw: &str) -> Self {
        let mut params = Vec::new();
        let mut token = String::new();
        let mut quoted = false;

        for c in raw.chars() {
            match c {
                '"' => quoted = !quoted,
                c if c.is_whitespace() && !quoted => {
                    push_param(&mut params, &mut token);
                }
                c => token.push(c),
            }
        }
        push_param(&mut params, &mut token);

        Self { params }
    }

    /// Value of the first occurrence of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parsed `ip=` settings, `None` when the parameter is absent.
    pub fn networking(&self) -> Result<Option<CmdlineNetworking>> {
        self.get(IP_PARAM).map(CmdlineNetworking::parse).transpose()
    }
}

fn push_param(params: &mut Vec<(String, String)>, token: &mut String) {
    if token.is_empty() {
        return;
    }
    let param = std::mem::take(token);
    match param.split_once('=') {
        Some((key, value)) => params.push((key.to_string(), value.to_string())),
        None => params.push((param, String::new())),
    }
}

impl FromStr for Cmdline {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Autoconfiguration protocol requested by `ip=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Autoconf {
    /// `off` / `none`: static configuration only
    Off,
    /// `on` / `any`: any protocol the kernel supports
    Any,
    Dhcp,
    Bootp,
    Rarp,
    /// `both`: BOOTP or RARP
    Both,
    Dhcp6,
    Auto6,
}

impl Autoconf {
    pub fn name(&self) -> &'static str {
        match self {
            Autoconf::Off => "off",
            Autoconf::Any => "any",
            Autoconf::Dhcp => "dhcp",
            Autoconf::Bootp => "bootp",
            Autoconf::Rarp => "rarp",
            Autoconf::Both => "both",
            Autoconf::Dhcp6 => "dhcp6",
            Autoconf::Auto6 => "auto6",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "off" | "none" => Some(Autoconf::Off),
            "on" | "any" => Some(Autoconf::Any),
            "dhcp" => Some(Autoconf::Dhcp),
            "bootp" => Some(Autoconf::Bootp),
            "rarp" => Some(Autoconf::Rarp),
            "both" => Some(Autoconf::Both),
            "dhcp6" => Some(Autoconf::Dhcp6),
            "auto6" => Some(Autoconf::Auto6),
            _ => None,
        }
    }
}

impl fmt::Display for Autoconf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Settings carried by the `ip=` kernel parameter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CmdlineNetworking {
    pub address: Option<IpAddr>,
    pub server: Option<IpAddr>,
    pub gateway: Option<IpAddr>,
    pub netmask: Option<IpAddr>,
    pub hostname: Option<String>,
    /// Interface the settings apply to
    pub device: Option<String>,
    pub autoconf: Option<Autoconf>,
    pub dns: Vec<IpAddr>,
    pub ntp: Option<IpAddr>,
}

impl CmdlineNetworking {
    /// Parse the value of an `ip=` parameter.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = |reason: String| Error::Cmdline {
            param: IP_PARAM,
            value: value.to_string(),
            reason,
        };

        // Bare `ip=` carries no settings
        if value.is_empty() {
            return Ok(Self::default());
        }

        let fields = split_fields(value);

        // A lone field is a keyword when it names one, else the client address
        if let [keyword] = fields.as_slice()
            && let Some(autoconf) = Autoconf::from_name(keyword)
        {
            return Ok(Self {
                autoconf: Some(autoconf),
                ..Self::default()
            });
        }

        if let Some(extra) = fields.iter().skip(IP_FIELDS).find(|f| !f.is_empty()) {
            return Err(invalid(format!("unexpected trailing field {extra:?}")));
        }

        let field = |i: usize| fields.get(i).copied().filter(|f| !f.is_empty());
        let ip = |i: usize, what: &str| -> Result<Option<IpAddr>> {
            field(i)
                .map(|f| {
                    let bare = f.trim_start_matches('[').trim_end_matches(']');
                    bare.parse::<IpAddr>()
                        .map_err(|_| invalid(format!("{what} {f:?} is not an IP address")))
                })
                .transpose()
        };

        let device = field(5)
            .map(|name| {
                linkspec::validate_name(name)
                    .map(|()| name.to_string())
                    .map_err(|e| invalid(e.to_string()))
            })
            .transpose()?;

        let autoconf = field(6)
            .map(|keyword| {
                Autoconf::from_name(keyword)
                    .ok_or_else(|| invalid(format!("unknown autoconf keyword {keyword:?}")))
            })
            .transpose()?;

        let dns = [ip(7, "dns server")?, ip(8, "dns server")?]
            .into_iter()
            .flatten()
            .collect();

        Ok(Self {
            address: ip(0, "client address")?,
            server: ip(1, "server address")?,
            gateway: ip(2, "gateway")?,
            netmask: ip(3, "netmask")?,
            hostname: field(4).map(str::to_string),
            device,
            autoconf,
            dns,
            ntp: ip(9, "ntp server")?,
        })
    }
}

/// Split on `:` outside of `[...]` so bracketed IPv6 addresses survive.
fn split_fields(value: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut bracketed = false;

    for (i, c) in value.char_indices() {
        match c {
            '[' => bracketed = true,
            ']' => bracketed = false,
            ':' if !bracketed => {
                fields.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    fields.push(&value[start..]);
    fields
}

/// Link declarations requested on the kernel command line.
///
/// At most one physical link, named by the `ip=` device field. An absent
/// command line, an absent `ip=` parameter, or one that names no device
/// yield nothing; a malformed `ip=` is an error.
pub fn cmdline_links(cmdline: Option<&Cmdline>) -> Result<Vec<LinkSpec>> {
    let networking = match cmdline {
        Some(cmdline) => cmdline.networking()?,
        None => None,
    };

    Ok(networking
        .and_then(|n| n.device)
        .map(|device| LinkSpec::physical(device, ConfigLayer::Cmdline))
        .into_iter()
        .collect())
}
