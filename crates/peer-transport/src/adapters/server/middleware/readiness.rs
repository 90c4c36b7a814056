//! Refuses peer calls until the node has loaded and finished syncing.

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::domain::TransportError;
use crate::service::PeerTransport;

#[derive(Clone)]
pub struct ReadinessLayer {
    transport: PeerTransport,
}

impl ReadinessLayer {
    pub fn new(transport: PeerTransport) -> Self {
        Self { transport }
    }
}

impl<S> Layer<S> for ReadinessLayer {
    type Service = ReadinessService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ReadinessService {
            inner,
            transport: self.transport.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ReadinessService<S> {
    inner: S,
    transport: PeerTransport,
}

impl<S> Service<Request<Body>> for ReadinessService<S>
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
        if !self.transport.is_ready() {
            return Box::pin(async { Ok(TransportError::Loading.into_response()) });
        }
        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}
