//! Errors reported by the conversation layer
//!
//! Every variant is returned synchronously to the caller of `handle_turn`.
//! Nothing here is retried internally.

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::session::StoreError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    /// Missing or empty session id. No state was touched.
    #[error("{message}")]
    InvalidInput { message: String },

    /// The session sat idle past the TTL and has been removed
    #[error("Session expired, please start a new conversation.")]
    SessionExpired { session_id: String },

    /// Upstream returned a non-success status or the transport failed.
    /// The user turn stays in the session.
    #[error("Upstream API error: {detail}")]
    GatewayFailure { detail: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ChatError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn session_expired(session_id: impl Into<String>) -> Self {
        Self::SessionExpired {
            session_id: session_id.into(),
        }
    }

    pub fn gateway_failure(detail: impl Into<String>) -> Self {
        Self::GatewayFailure {
            detail: detail.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether sending another turn with the same session id can succeed
    pub fn is_retryable_with_same_id(&self) -> bool {
        match self {
            ChatError::InvalidInput { .. } => false,
            ChatError::SessionExpired { .. } => false,
            ChatError::GatewayFailure { .. } => true,
            ChatError::Internal { .. } => true,
        }
    }

    /// Returns the error severity level for logging
    pub fn severity(&self) -> tracing::Level {
        match self {
            ChatError::InvalidInput { .. } => tracing::Level::INFO,
            ChatError::SessionExpired { .. } => tracing::Level::INFO,
            ChatError::GatewayFailure { .. } => tracing::Level::WARN,
            ChatError::Internal { .. } => tracing::Level::ERROR,
        }
    }
}

impl From<GatewayError> for ChatError {
    fn from(err: GatewayError) -> Self {
        if err.is_malformed() {
            ChatError::internal(err.to_string())
        } else {
            ChatError::gateway_failure(err.to_string())
        }
    }
}

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SessionNotFound { .. } => {
                ChatError::internal("Session was deleted while the turn was in progress")
            }
            StoreError::InvalidTurn { .. } => ChatError::internal(err.to_string()),
        }
    }
}
