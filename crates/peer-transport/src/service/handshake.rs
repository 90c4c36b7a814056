//! Inbound handshake: header checks and registration of participating peers.

use std::net::IpAddr;
use tracing::{debug, info, warn};

use super::PeerTransport;
use crate::domain::headers::check_inbound;
use crate::domain::{ip_to_u32, HeaderSet, InboundIdentity, Peer, PeerState, TransportError};

/// Origin of an inbound request, attached to it once the handshake passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemotePeer {
    pub ip: Option<IpAddr>,
    /// The `port` header, when it is in range.
    pub port: Option<u16>,
}

impl RemotePeer {
    /// `(ip, port)` as the registry knows it, if the origin has both.
    pub fn endpoint(&self) -> Option<(u32, u16)> {
        Some((self.ip.and_then(ip_to_u32)?, self.port?))
    }

    pub fn label(&self) -> String {
        match (self.ip, self.port) {
            (Some(ip), Some(port)) => format!("{ip}:{port}"),
            (Some(ip), None) => ip.to_string(),
            _ => "unknown".to_string(),
        }
    }
}

impl PeerTransport {
    /// Validate the protocol headers of an inbound request.
    ///
    /// A request that carries a `version` and a valid `port` comes from a
    /// participating peer: it must run a compatible version and is upserted
    /// into the registry as active, tagged with `chain` when the body named
    /// one. Requests without a `version` are served anonymously.
    pub async fn handshake(
        &self,
        remote_ip: Option<IpAddr>,
        headers: &HeaderSet,
        chain: Option<String>,
    ) -> Result<RemotePeer, TransportError> {
        let ip = remote_ip.ok_or(TransportError::WrongHeaderData)?;
        let identity = check_inbound(headers, self.headers())?;
        let remote = RemotePeer {
            ip: Some(ip),
            port: headers.valid_port(),
        };

        let InboundIdentity::Peer { version, os, port } = identity else {
            return Ok(remote);
        };
        let Some(port) = port else {
            return Ok(remote);
        };

        let registry = &self.deps().registry;
        if !registry.is_compatible(&version) {
            debug!(peer = %remote.label(), %version, "Rejecting incompatible peer");
            return Err(TransportError::IncompatibleVersion);
        }

        let Some(ip) = ip_to_u32(ip) else {
            debug!(peer = %remote.label(), "Peer has no IPv4 form, not registering");
            return Ok(remote);
        };
        let peer = Peer {
            os,
            version: Some(version),
            state: PeerState::Active,
            chain,
            ..Peer::new(ip, port)
        };
        if let Err(e) = registry.update(peer).await {
            warn!(peer = %remote.label(), error = %e, "Failed to update peer");
        }
        Ok(remote)
    }

    /// Ban the origin of a malformed push, when it identified itself.
    pub(crate) async fn ban_origin(&self, origin: &RemotePeer) {
        let Some((ip, port)) = origin.endpoint() else {
            return;
        };
        let duration = self.config().peers.malformed_ban;
        match self.deps().registry.ban(ip, port, duration).await {
            Ok(()) => info!(
                peer = %origin.label(),
                ban_secs = duration.as_secs(),
                "Banned peer for malformed payload"
            ),
            Err(e) => warn!(peer = %origin.label(), error = %e, "Failed to ban peer"),
        }
    }
}
