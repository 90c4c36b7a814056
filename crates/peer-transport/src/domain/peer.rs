//! Peer records as exchanged with the external registry.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

/// Liveness state kept by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum PeerState {
    #[default]
    Unknown,
    Active,
    /// Banned until the given unix time (seconds).
    Banned { until: u64 },
}

/// A remote node.
///
/// Identity is `(ip, port)`; `address` is an explicit `host:port` that takes
/// precedence when building URLs (used for directly addressed delegates).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    #[serde(with = "dotted_ip")]
    pub ip: u32,
    pub port: u16,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub state: PeerState,
    /// Side chain this peer serves, if it announced one.
    #[serde(default)]
    pub chain: Option<String>,
}

impl Peer {
    pub fn new(ip: u32, port: u16) -> Self {
        Self {
            ip,
            port,
            address: None,
            os: None,
            version: None,
            state: PeerState::Unknown,
            chain: None,
        }
    }

    /// A peer known only by an explicit `host:port` address.
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Self::new(0, 0)
        }
    }

    /// True when the peer can be addressed in the registry by `(ip, port)`.
    pub fn has_endpoint(&self) -> bool {
        self.ip != 0 && self.port != 0
    }

    /// `http://host:port` for this peer.
    pub fn base_url(&self) -> String {
        match &self.address {
            Some(address) => format!("http://{address}"),
            None => format!("http://{}:{}", Ipv4Addr::from(self.ip), self.port),
        }
    }

    /// Human readable `ip:port` (or address) for logs.
    pub fn label(&self) -> String {
        match &self.address {
            Some(address) => address.clone(),
            None => format!("{}:{}", Ipv4Addr::from(self.ip), self.port),
        }
    }
}

/// Constraints for picking peers from the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerSelector {
    pub limit: usize,
    /// Only peers serving this side chain.
    pub chain: Option<String>,
}

impl PeerSelector {
    pub fn any(limit: usize) -> Self {
        Self { limit, chain: None }
    }

    pub fn for_chain(limit: usize, chain: impl Into<String>) -> Self {
        Self {
            limit,
            chain: Some(chain.into()),
        }
    }
}

/// Integer encoding of an IPv4 address as used by the registry.
///
/// IPv4-mapped IPv6 addresses are unwrapped; other IPv6 addresses have no
/// integer form.
pub fn ip_to_u32(ip: IpAddr) -> Option<u32> {
    match ip {
        IpAddr::V4(v4) => Some(u32::from(v4)),
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(u32::from),
    }
}

mod dotted_ip {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::Ipv4Addr;

    pub fn serialize<S: Serializer>(ip: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&Ipv4Addr::from(*ip))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse::<Ipv4Addr>()
            .map(u32::from)
            .map_err(serde::de::Error::custom)
    }
}
