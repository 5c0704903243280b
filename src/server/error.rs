//! HTTP mapping for conversation errors

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::conversation::ChatError;

/// Body of every non-success response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
        }
    }
}

impl ChatError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatError::InvalidInput { .. } | ChatError::SessionExpired { .. } => {
                StatusCode::BAD_REQUEST
            }
            ChatError::GatewayFailure { .. } | ChatError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let message = match &self {
            ChatError::GatewayFailure { detail } => format!("Groq API Error: {}", detail),
            other => other.to_string(),
        };

        (self.status_code(), Json(ErrorBody::new(message))).into_response()
    }
}
