//! Wire form of handler errors.
//!
//! Peers expect HTTP 200 with `{success: false, error}` for protocol-level
//! failures; only the loading guard, unknown endpoints and oversized bodies
//! use other statuses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::TransportError;

impl TransportError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Loading => StatusCode::SERVICE_UNAVAILABLE,
            Self::EndpointNotFound => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::OK,
        }
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "error": self.to_string(),
        });
        if let Self::NetworkMismatch { expected, received } = &self {
            body["expected"] = json!(expected);
            body["received"] = json!(received);
        }
        (self.status_code(), Json(body)).into_response()
    }
}
