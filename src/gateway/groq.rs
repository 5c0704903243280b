//! Groq chat-completion gateway
//!
//! Groq exposes an OpenAI-compatible `chat/completions` endpoint. This module
//! serialises the session transcript into that format, performs a single
//! POST, and maps the outcome onto `Completion` or `GatewayError`.
//!
//! No retry or backoff happens here: a failed call is reported to the caller
//! immediately. The only time policy is the HTTP client timeout.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::gateway::{Completion, CompletionGateway, DecodingParams, GatewayError, Usage};
use crate::session::Turn;

pub const DEFAULT_GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Connection settings for Groq
#[derive(Debug, Clone, PartialEq)]
pub struct GroqConfig {
    pub api_key: String,
    /// Full URL of the chat-completions endpoint
    pub api_url: String,
    pub timeout_seconds: u64,
}

impl GroqConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_GROQ_API_URL.to_string(),
            timeout_seconds: 30,
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.api_key.trim().is_empty() {
            return Err(GatewayError::auth(
                "Groq API key is required (set GROQ_API_KEY)",
            ));
        }
        if self.api_url.is_empty() {
            return Err(GatewayError::config("Groq API URL cannot be empty"));
        }
        if self.timeout_seconds == 0 {
            return Err(GatewayError::config("Request timeout must be at least 1 second"));
        }
        Ok(())
    }
}

/// Request body for `chat/completions`
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    temperature: f32,
    max_completion_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GroqGateway {
    api_key: String,
    api_url: String,
    timeout_seconds: u64,
    client: Client,
}

impl GroqGateway {
    pub fn new(config: GroqConfig) -> Result<Self, GatewayError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| GatewayError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key: config.api_key,
            api_url: config.api_url,
            timeout_seconds: config.timeout_seconds,
            client,
        })
    }

    fn build_request<'a>(
        model: &'a str,
        messages: &'a [Turn],
        params: &DecodingParams,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model,
            messages,
            temperature: params.temperature,
            max_completion_tokens: params.max_completion_tokens,
            top_p: params.top_p,
            stream: false,
        }
    }

    fn parse_response(response: ChatResponse) -> Result<Completion, GatewayError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::malformed("No response choices returned"))?;

        let reply = choice
            .message
            .content
            .ok_or_else(|| GatewayError::malformed("Response message has no content"))?;

        Ok(Completion {
            reply,
            usage: response.usage.unwrap_or_default(),
        })
    }

    fn map_transport_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::timeout(self.timeout_seconds)
        } else if e.is_connect() {
            GatewayError::network(format!("Connection failed: {}", e))
        } else {
            GatewayError::network(format!("Request failed: {}", e))
        }
    }
}

#[async_trait::async_trait]
impl CompletionGateway for GroqGateway {
    async fn send(
        &self,
        model: &str,
        messages: &[Turn],
        params: &DecodingParams,
    ) -> Result<Completion, GatewayError> {
        info!(
            model = model,
            message_count = messages.len(),
            "Sending chat request to groq"
        );

        let request = Self::build_request(model, messages, params);
        debug!(url = %self.api_url, "Built request (headers omitted for security)");

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Request failed");
                self.map_transport_error(e)
            })?;

        let status = response.status();
        debug!(status = %status, "Received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Groq returned an error status");
            return Err(GatewayError::status(status.as_u16(), body));
        }

        let body = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| GatewayError::malformed(format!("Failed to parse response: {}", e)))?;

        let completion = Self::parse_response(body)?;

        info!(
            reply_length = completion.reply.len(),
            prompt_tokens = ?completion.usage.prompt_tokens,
            completion_tokens = ?completion.usage.completion_tokens,
            "Received response from groq"
        );

        Ok(completion)
    }

    fn gateway_name(&self) -> &'static str {
        "groq"
    }
}
