//! HTTP API routes.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::conversation::ChatError;
use crate::gateway::Usage;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub status: &'static str,
    pub message: String,
    pub usage: Usage,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: &'static str,
}

pub async fn health_check() -> impl IntoResponse {
    Json(StatusResponse {
        status: "healthy",
        message: "SolveMate AI backend is running",
    })
}

pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatError> {
    let Json(request) = body.map_err(|rejection| {
        debug!(error = %rejection, "Rejected chat request body");
        ChatError::invalid_input(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let session_id = request.session_id.unwrap_or_default();
    let message = request.message.unwrap_or_default();

    let reply = state
        .manager
        .handle_turn(&session_id, &message)
        .await
        .inspect_err(|e| {
            if e.severity() == tracing::Level::ERROR {
                error!(session_id = %session_id, error = %e, "Chat turn failed");
            }
        })?;

    Ok(Json(ChatResponse {
        status: "success",
        message: reply.reply,
        usage: reply.usage,
    }))
}

pub async fn delete_chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    state.manager.delete_session(&session_id).await;
    Json(StatusResponse {
        status: "success",
        message: "Chat session deleted successfully",
    })
}
