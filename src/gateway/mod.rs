//! Completion gateway for solvemate
//!
//! The gateway sends an ordered transcript to an upstream chat-completion
//! endpoint and returns the assistant's reply.
//!
//! # Architecture
//!
//! - `CompletionGateway` trait defines the single round trip the conversation
//!   layer depends on
//! - `GroqGateway` talks to Groq's OpenAI-compatible API over HTTP
//! - `MockGateway` is a scriptable stand-in for tests
//!
//! # Example
//!
//! ```rust
//! use solvemate::gateway::{CompletionGateway, DecodingParams};
//! use solvemate::session::Turn;
//!
//! async fn example(gateway: &dyn CompletionGateway) {
//!     let messages = vec![
//!         Turn::system("You are a helpful tutor"),
//!         Turn::user("What is 2+2?"),
//!     ];
//!
//!     let completion = gateway
//!         .send("llama-3.3-70b-versatile", &messages, &DecodingParams::default())
//!         .await
//!         .unwrap();
//!     println!("Reply: {}", completion.reply);
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::session::Turn;

pub mod error;
pub mod groq;
pub mod mock;

pub use error::GatewayError;
pub use groq::{GroqConfig, GroqGateway};
pub use mock::MockGateway;

/// Sampling parameters sent with every request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecodingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_completion_tokens: u32,
}

impl Default for DecodingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            max_completion_tokens: 500,
        }
    }
}

/// Token accounting reported by the upstream API.
///
/// Fields the API adds beyond the three counters (timings, cache stats) are
/// kept in `extra` and passed through to clients untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Usage {
    pub fn with_tokens(prompt: u32, completion: u32) -> Self {
        Self {
            prompt_tokens: Some(prompt),
            completion_tokens: Some(completion),
            total_tokens: Some(prompt + completion),
            extra: serde_json::Map::new(),
        }
    }
}

/// One successful round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub reply: String,
    #[serde(default)]
    pub usage: Usage,
}

impl Completion {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            usage: Usage::default(),
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }
}

/// Upstream chat-completion endpoint.
///
/// Implementations perform exactly one request per call. Retries and backoff
/// are not the caller's concern and are not expected here either.
#[async_trait::async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn send(
        &self,
        model: &str,
        messages: &[Turn],
        params: &DecodingParams,
    ) -> Result<Completion, GatewayError>;

    /// Used for logging and identification
    fn gateway_name(&self) -> &'static str;
}
