//! Error types for the entity gateway
//!
//! Provides unified error handling using thiserror. Errors are `Clone` so a
//! single failed network call can be handed to every coalesced caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Gateway Error Enum ==
/// Unified error type for the gateway, its transport and the proxy surface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("Network failure: {0}")]
    Network(String),

    /// Backend reported 404
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend rejected the request with a 4xx status
    #[error("Validation failed ({status}): {message}")]
    Validation { status: u16, message: String },

    /// Backend is rate limiting or temporarily unavailable (429/503)
    #[error("Server busy ({status}): {message}")]
    ServerBusy { status: u16, message: String },

    /// Backend failed with any other 5xx status
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Response body does not match the requested type
    #[error("Decode error: {0}")]
    Decode(String),

    /// Malformed input at the proxy surface
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Fetch task failed outside the backend call
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Maps a non-success backend status and body text to an error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => GatewayError::NotFound(message),
            429 | 503 => GatewayError::ServerBusy { status, message },
            400..=499 => GatewayError::Validation { status, message },
            _ => GatewayError::Server { status, message },
        }
    }

    /// True for failures the transport layer may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::ServerBusy { .. })
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return GatewayError::from_status(status.as_u16(), err.to_string());
        }
        GatewayError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Decode(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Network(_) => StatusCode::BAD_GATEWAY,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Validation { status, .. }
            | GatewayError::ServerBusy { status, .. }
            | GatewayError::Server { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            GatewayError::Decode(_) => StatusCode::BAD_GATEWAY,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the gateway.
pub type Result<T> = std::result::Result<T, GatewayError>;
