use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::gateway::groq::DEFAULT_GROQ_API_URL;
use crate::gateway::{DecodingParams, GroqConfig};
use crate::session::cleanup::DEFAULT_SWEEP_INTERVAL_SECS;
use crate::session::SessionSettings;

/// 12 hours
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60 * 12;

pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are SolveMate AI, a helpful educational assistant designed to help students with their homework.
Your approach should be:
1. Guide students to understand concepts rather than just providing answers
2. Use clear explanations with examples
3. Break down complex problems into simpler steps
4. Encourage critical thinking
5. Provide helpful resources when appropriate
Never solve the homework directly - instead, help students learn how to solve it themselves.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groq_api_key: Option<String>,

    pub api_url: String,

    pub model: String,

    pub system_prompt: String,

    pub session_ttl_secs: u64,

    pub sweep_interval_secs: u64,

    pub temperature: f32,

    pub top_p: f32,

    pub max_completion_tokens: u32,

    pub request_timeout_secs: u64,

    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        let params = DecodingParams::default();
        Self {
            groq_api_key: None,
            api_url: DEFAULT_GROQ_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            temperature: params.temperature,
            top_p: params.top_p,
            max_completion_tokens: params.max_completion_tokens,
            request_timeout_secs: 30,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

/// What gets logged instead of the raw config
#[derive(Debug, Clone, PartialEq)]
pub struct SafeConfigSummary {
    pub api_key_configured: bool,
    pub model: String,
    pub session_ttl_secs: u64,
    pub bind_addr: String,
}

impl Config {
    pub fn decoding_params(&self) -> DecodingParams {
        DecodingParams {
            temperature: self.temperature,
            top_p: self.top_p,
            max_completion_tokens: self.max_completion_tokens,
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings::new(
            Duration::from_secs(self.session_ttl_secs),
            self.system_prompt.clone(),
        )
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Groq connection settings. The API key may still be empty here;
    /// `GroqGateway::new` rejects that.
    pub fn groq_config(&self) -> GroqConfig {
        GroqConfig::new(self.groq_api_key.clone().unwrap_or_default())
            .with_api_url(self.api_url.clone())
            .with_timeout(self.request_timeout_secs)
    }

    pub fn get_safe_summary(&self) -> SafeConfigSummary {
        SafeConfigSummary {
            api_key_configured: self
                .groq_api_key
                .as_ref()
                .map(|k| !k.is_empty())
                .unwrap_or(false),
            model: self.model.clone(),
            session_ttl_secs: self.session_ttl_secs,
            bind_addr: self.bind_addr.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.session_ttl_secs == 0 {
            return Err("session_ttl_secs must be greater than 0".to_string());
        }
        if self.sweep_interval_secs == 0 {
            return Err("sweep_interval_secs must be greater than 0".to_string());
        }
        if self.model.trim().is_empty() {
            return Err("model cannot be empty".to_string());
        }
        if self.system_prompt.trim().is_empty() {
            return Err("system_prompt cannot be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!("temperature {} is outside 0.0..=2.0", self.temperature));
        }
        if !(0.0..=1.0).contains(&self.top_p) || self.top_p == 0.0 {
            return Err(format!("top_p {} is outside (0.0, 1.0]", self.top_p));
        }
        if self.max_completion_tokens == 0 {
            return Err("max_completion_tokens must be greater than 0".to_string());
        }
        Ok(())
    }
}
