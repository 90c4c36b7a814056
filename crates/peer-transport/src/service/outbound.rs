//! Single-peer requests with reputation feedback.

use shared_types::BlockVotes;
use tracing::{debug, info, warn};

use super::PeerTransport;
use crate::domain::headers::check_response;
use crate::domain::{
    FailureKind, OutboundError, Peer, PeerRequestError, PeerSelector, PeerState, RequestFailure,
};
use crate::ports::{OutboundRequest, PeerReply, RawResponse, RequestSpec};

impl PeerTransport {
    /// Send one request to `peer`.
    ///
    /// Failures feed back into the registry: an unreachable peer is removed,
    /// any other failure bans it unless `spec.allow_ban` is off. A successful
    /// response with valid protocol headers refreshes the peer when its
    /// version is compatible and removes it otherwise.
    pub async fn get_from_peer(
        &self,
        peer: &Peer,
        spec: RequestSpec,
    ) -> Result<PeerReply, PeerRequestError> {
        let request = self.resolve(peer, &spec);
        let method = request.method.as_str();
        let url = request.url.clone();

        let (failure, body) = match self.deps().http.execute(request).await {
            Ok(response) if response.status == 200 => {
                self.refresh_from_response(peer, &response).await;
                return Ok(PeerReply {
                    body: response.body,
                    peer: peer.clone(),
                });
            }
            Ok(response) => (RequestFailure::status(response.status), Some(response.body)),
            Err(failure) => (failure, None),
        };

        debug!(peer = %peer.label(), method, %url, error = %failure, "Request failed");
        self.penalize(peer, failure.kind, spec.allow_ban, method, &url)
            .await;
        Err(PeerRequestError {
            peer: peer.clone(),
            failure,
            body,
        })
    }

    /// One request to a single randomly chosen peer. An empty or failing
    /// registry triggers a reset of the peer pool.
    pub async fn get_from_random_peer(
        &self,
        mut selector: PeerSelector,
        spec: RequestSpec,
    ) -> Result<PeerReply, OutboundError> {
        selector.limit = 1;
        let peers = match self.deps().registry.list(&selector).await {
            Ok(peers) => peers,
            Err(e) => {
                warn!(error = %e, "Failed to list peers");
                self.reset_registry().await;
                return Err(e.into());
            }
        };
        let Some(peer) = peers.into_iter().next() else {
            self.reset_registry().await;
            return Err(OutboundError::NoPeers);
        };
        Ok(self.get_from_peer(&peer, spec).await?)
    }

    /// Push a vote set to the delegate at `address`. Fire and forget.
    pub async fn send_votes(&self, votes: &BlockVotes, address: &str) {
        let payload = match serde_json::to_value(votes) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode votes");
                return;
            }
        };
        let peer = Peer::with_address(address);
        match self.get_from_peer(&peer, RequestSpec::post("/votes", payload)).await {
            Ok(_) => debug!(%address, height = votes.height, "Votes sent"),
            Err(e) => debug!(%address, error = %e, "Failed to send votes"),
        }
    }

    fn resolve(&self, peer: &Peer, spec: &RequestSpec) -> OutboundRequest {
        let mut headers: Vec<(String, String)> = self
            .headers()
            .pairs()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        for (name, value) in &spec.headers {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }
        OutboundRequest {
            url: format!("{}{}", peer.base_url(), spec.target.path()),
            method: spec.method,
            headers,
            timeout: self.config().peers.request_timeout,
            payload: spec.payload.clone(),
        }
    }

    async fn penalize(&self, peer: &Peer, kind: FailureKind, allow_ban: bool, method: &str, url: &str) {
        if !peer.has_endpoint() {
            return;
        }
        let registry = &self.deps().registry;
        if kind.is_unreachable() {
            match registry.remove(peer.ip, peer.port).await {
                Ok(()) => info!(peer = %peer.label(), method, %url, "Removed unreachable peer"),
                Err(e) => warn!(peer = %peer.label(), error = %e, "Failed to remove peer"),
            }
        } else if allow_ban {
            let duration = self.config().peers.failure_ban;
            match registry.ban(peer.ip, peer.port, duration).await {
                Ok(()) => info!(
                    peer = %peer.label(),
                    method,
                    %url,
                    ban_secs = duration.as_secs(),
                    "Banned peer"
                ),
                Err(e) => warn!(peer = %peer.label(), error = %e, "Failed to ban peer"),
            }
        }
    }

    async fn refresh_from_response(&self, peer: &Peer, response: &RawResponse) {
        let Some(remote) = check_response(&response.protocol_headers()) else {
            return;
        };
        if !peer.has_endpoint() {
            return;
        }
        let registry = &self.deps().registry;
        if registry.is_compatible(&remote.version) {
            let refreshed = Peer {
                os: remote.os,
                version: Some(remote.version),
                state: PeerState::Active,
                chain: peer.chain.clone(),
                ..Peer::new(peer.ip, remote.port)
            };
            if let Err(e) = registry.update(refreshed).await {
                warn!(peer = %peer.label(), error = %e, "Failed to update peer");
            }
        } else {
            debug!(peer = %peer.label(), version = %remote.version, "Removing incompatible peer");
            if let Err(e) = registry.remove(peer.ip, remote.port).await {
                warn!(peer = %peer.label(), error = %e, "Failed to remove peer");
            }
        }
    }

    async fn reset_registry(&self) {
        if let Err(e) = self.deps().registry.reset().await {
            warn!(error = %e, "Failed to reset peer pool");
        }
    }
}
