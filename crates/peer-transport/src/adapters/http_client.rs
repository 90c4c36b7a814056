//! `reqwest` implementation of [`HttpExchange`].

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error as _;
use std::io;
use std::time::Duration;

use crate::domain::{FailureKind, RequestFailure};
use crate::ports::{HttpExchange, OutboundRequest, RawResponse, RequestMethod};

/// Pooled keep-alive HTTP client.
#[derive(Clone)]
pub struct ReqwestExchange {
    client: reqwest::Client,
}

impl ReqwestExchange {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Only timeouts and refused connections count as unreachable. DNS, TLS and
/// routing failures during connect fall through to `Other`.
fn classify(error: &reqwest::Error) -> FailureKind {
    if error.is_timeout() {
        return FailureKind::Timeout;
    }
    if !error.is_connect() {
        return FailureKind::Other;
    }
    match io_kind(error) {
        Some(io::ErrorKind::ConnectionRefused) => FailureKind::ConnectionRefused,
        Some(io::ErrorKind::TimedOut) => FailureKind::Timeout,
        _ => FailureKind::Other,
    }
}

fn io_kind(error: &reqwest::Error) -> Option<io::ErrorKind> {
    let mut source = error.source();
    while let Some(inner) = source {
        if let Some(io_error) = inner.downcast_ref::<io::Error>() {
            return Some(io_error.kind());
        }
        source = inner.source();
    }
    None
}

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[async_trait]
impl HttpExchange for ReqwestExchange {
    async fn execute(&self, request: OutboundRequest) -> Result<RawResponse, RequestFailure> {
        let mut builder = match request.method {
            RequestMethod::Get => self.client.get(&request.url),
            RequestMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = builder.timeout(request.timeout);
        if let Some(payload) = &request.payload {
            builder = builder.json(payload);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RequestFailure::new(classify(&e), e.to_string()))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RequestFailure::new(classify(&e), e.to_string()))?;

        Ok(RawResponse {
            status,
            headers,
            body: parse_body(&bytes),
        })
    }
}
