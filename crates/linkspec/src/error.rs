//! Error types for link declaration validation

use thiserror::Error;

/// Errors that can occur while building or validating a link declaration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Interface name is not usable as a Linux link name
    #[error("invalid interface name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// VLAN id outside the 802.1Q tagging range
    #[error("VLAN id {0} outside the valid range 1-4094")]
    InvalidVlanId(u32),

    /// Bond mode name not recognized
    #[error("unknown bond mode {0:?}")]
    UnknownBondMode(String),

    /// Bond transmit hash policy name not recognized
    #[error("unknown bond hash policy {0:?}")]
    UnknownHashPolicy(String),

    /// LACP rate name not recognized
    #[error("unknown LACP rate {0:?}")]
    UnknownLacpRate(String),

    /// Bond listing itself among its slaves
    #[error("bond {0:?} lists itself as a slave")]
    SelfEnslaved(String),

    /// Configuration layer name not recognized
    #[error("unknown configuration layer {0:?}")]
    UnknownLayer(String),

    /// WireGuard key is not base64 (the key itself is never included)
    #[error("invalid WireGuard {role} key")]
    InvalidKey { role: &'static str },

    /// WireGuard peer endpoint is not host:port
    #[error("invalid WireGuard endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        endpoint: String,
        reason: &'static str,
    },

    /// Allowed IP is not a CIDR prefix
    #[error("invalid IP prefix {prefix:?}: {reason}")]
    InvalidPrefix { prefix: String, reason: String },
}

/// Result type for link model operations
pub type Result<T> = std::result::Result<T, Error>;
