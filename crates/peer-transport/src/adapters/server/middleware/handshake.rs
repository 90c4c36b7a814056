//! Handshake guard: protocol header validation and peer registration.
//!
//! Buffers the body so the announced side-chain tag can be read before the
//! handler runs, then hands the request on with a
//! [`RemotePeer`](crate::service::RemotePeer) extension.

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::Request,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::debug;

use crate::domain::{HeaderSet, TransportError};
use crate::service::PeerTransport;

#[derive(Clone)]
pub struct HandshakeLayer {
    transport: PeerTransport,
}

impl HandshakeLayer {
    pub fn new(transport: PeerTransport) -> Self {
        Self { transport }
    }
}

impl<S> Layer<S> for HandshakeLayer {
    type Service = HandshakeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HandshakeService {
            inner,
            transport: self.transport.clone(),
        }
    }
}

#[derive(Clone)]
pub struct HandshakeService<S> {
    inner: S,
    transport: PeerTransport,
}

impl<S> Service<Request<Body>> for HandshakeService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let transport = self.transport.clone();

        Box::pin(async move {
            let remote_ip = remote_ip(&req);
            let headers = HeaderSet::from_pairs(
                req.headers()
                    .iter()
                    .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?))),
            );

            let (parts, body) = req.into_parts();
            let limit = transport.config().http.max_body_bytes;
            let bytes = match to_bytes(body, limit).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(error = %e, "Failed to read request body");
                    return Ok(TransportError::BodyTooLarge.into_response());
                }
            };

            match transport.handshake(remote_ip, &headers, chain_tag(&bytes)).await {
                Ok(remote) => {
                    let mut req = Request::from_parts(parts, Body::from(bytes));
                    req.extensions_mut().insert(remote);
                    inner.call(req).await
                }
                Err(e) => {
                    debug!(ip = ?remote_ip, error = %e, "Handshake rejected");
                    Ok(e.into_response())
                }
            }
        })
    }
}

/// First `X-Forwarded-For` entry, else the socket peer address.
fn remote_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());
    forwarded.or_else(|| {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

/// `chain` field of a JSON body, if any.
fn chain_tag(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    let body: Value = serde_json::from_slice(bytes).ok()?;
    body.get("chain")?.as_str().map(str::to_string)
}
