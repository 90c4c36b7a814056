//! Stamps the node's protocol identity on every response.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    response::Response,
};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::warn;

use crate::domain::ProtocolHeaders;

#[derive(Clone)]
pub struct ProtocolHeadersLayer {
    headers: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl ProtocolHeadersLayer {
    pub fn new(local: &ProtocolHeaders) -> Self {
        let headers = local
            .pairs()
            .into_iter()
            .filter_map(|(name, value)| match HeaderValue::from_str(&value) {
                Ok(value) => Some((HeaderName::from_static(name), value)),
                Err(_) => {
                    warn!(header = name, "Protocol header value is not a valid header");
                    None
                }
            })
            .collect();
        Self {
            headers: Arc::new(headers),
        }
    }
}

impl<S> Layer<S> for ProtocolHeadersLayer {
    type Service = ProtocolHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ProtocolHeadersService {
            inner,
            headers: Arc::clone(&self.headers),
        }
    }
}

#[derive(Clone)]
pub struct ProtocolHeadersService<S> {
    inner: S,
    headers: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl<S> Service<Request<Body>> for ProtocolHeadersService<S>
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
        let headers = Arc::clone(&self.headers);

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            for (name, value) in headers.iter() {
                response.headers_mut().insert(name.clone(), value.clone());
            }
            Ok(response)
        })
    }
}
