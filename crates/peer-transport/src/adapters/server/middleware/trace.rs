//! One `peer_request` span per inbound call, closed with status and latency.

use axum::{body::Body, http::Request, response::Response};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{debug, field, info_span, warn, Instrument, Span};

use crate::domain::headers::{HEADER_PORT, HEADER_VERSION};

#[derive(Clone, Copy, Default)]
pub struct PeerSpanLayer;

impl<S> Layer<S> for PeerSpanLayer {
    type Service = PeerSpan<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PeerSpan { inner }
    }
}

#[derive(Clone)]
pub struct PeerSpan<S> {
    inner: S,
}

fn header<'a>(req: &'a Request<Body>, name: &str) -> &'a str {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
}

impl<S> Service<Request<Body>> for PeerSpan<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let span = info_span!(
            "peer_request",
            http.method = %req.method(),
            http.target = %req.uri().path(),
            peer.version = %header(&req, HEADER_VERSION),
            peer.port = %header(&req, HEADER_PORT),
            http.status_code = field::Empty,
        );
        let started = Instant::now();
        let mut inner = self.inner.clone();

        Box::pin(
            async move {
                let result = inner.call(req).await;
                if let Ok(response) = &result {
                    let status = response.status();
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    Span::current().record("http.status_code", status.as_u16());
                    if status.is_server_error() {
                        warn!(elapsed_ms, "Peer request failed");
                    } else {
                        debug!(elapsed_ms, "Peer request served");
                    }
                }
                result
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::convert::Infallible;
    use tower::{service_fn, ServiceExt};

    #[tokio::test]
    async fn test_response_passes_through() {
        let service = PeerSpanLayer.layer(service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(
                Response::builder()
                    .status(StatusCode::ACCEPTED)
                    .body(Body::empty())
                    .unwrap(),
            )
        }));
        let req = Request::builder()
            .uri("/peer/height")
            .header(HEADER_VERSION, "1.0.0")
            .body(Body::empty())
            .unwrap();

        let response = service.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
