//! Error types for completion gateway operations

use thiserror::Error;

/// Errors that can occur during a gateway round trip
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// Upstream answered with a non-success status
    #[error("{body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Raw response body as returned by the API
        body: String,
    },

    /// Connection issues, DNS failures, reset streams
    #[error("Network error: {message}")]
    Network { message: String },

    /// Request took longer than the client timeout
    #[error("Request timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Missing or rejected API key
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// 200 response whose payload lacks the expected reply
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    /// Gateway could not be built from configuration
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl GatewayError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn timeout(seconds: u64) -> Self {
        Self::Timeout { seconds }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True when the upstream call succeeded but the payload was unusable.
    ///
    /// These surface as internal errors rather than gateway failures.
    pub fn is_malformed(&self) -> bool {
        matches!(self, GatewayError::MalformedResponse { .. })
    }

    /// HTTP status reported by upstream, if any
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse {
            message: err.to_string(),
        }
    }
}
