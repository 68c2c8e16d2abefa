//! Error types for the gateway crate.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by the remote compute service or the transport to it.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request could not be sent or the response could not be read.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// No response within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The service answered with an error status.
    #[error("{status} {reason}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Service status name, e.g. `PERMISSION_DENIED`.
        reason: String,
        /// Service error message.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// Client configuration or credentials are unusable.
    #[error("gateway configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Whether the service reported that the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::Api { status: 404, .. })
            || matches!(self, GatewayError::Api { reason, .. } if reason == "NOT_FOUND")
    }

    /// Whether the service refused access to the object.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, GatewayError::Api { status: 403, .. })
            || matches!(self, GatewayError::Api { reason, .. } if reason == "PERMISSION_DENIED")
    }

    /// Short label used for metrics.
    pub fn status_label(&self) -> String {
        match self {
            GatewayError::Http(_) => "transport".to_string(),
            GatewayError::Timeout(_) => "timeout".to_string(),
            GatewayError::Api { status, .. } => status.to_string(),
            GatewayError::Decode(_) => "decode".to_string(),
            GatewayError::Config(_) => "config".to_string(),
        }
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
