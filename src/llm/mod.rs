//! Generative-text provider clients
//!
//! A [`TextGenerator`] sends one fully-formed prompt to a provider and
//! returns the raw text of the answer. Clients never retry or parse; the
//! [`extract`] module layers fence stripping, validation and retries on top.

pub mod extract;
pub mod gemini;
pub mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub use extract::{clean_json_string, generate_safe_json, AttemptError, ExtractError};
pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

/// Maximum number of response-body characters kept in provider errors
const ERROR_BODY_LIMIT: usize = 300;

/// Provider failure (network, quota, auth, malformed envelope)
#[derive(Error, Debug)]
pub enum LlmError {
    /// HTTP transport error
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the provider
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Provider answered with no text
    #[error("provider returned an empty response")]
    EmptyResponse,

    /// Client misconfiguration
    #[error("invalid provider configuration: {0}")]
    Config(String),
}

impl LlmError {
    /// Build a status error, keeping only the head of the body
    pub(crate) fn status(status: reqwest::StatusCode, body: &str) -> Self {
        Self::Status {
            status: status.as_u16(),
            body: crate::utils::short_message(body, ERROR_BODY_LIMIT),
        }
    }
}

/// Single-call free-text generation
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send `prompt` and return the raw model output
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Provider/model label for logs
    fn describe(&self) -> String;
}

/// Supported providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Ollama,
    Gemini,
}

impl LlmProvider {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "gemini" | "google" => Some(Self::Gemini),
            _ => None,
        }
    }

    fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Self::Ollama => "qwen2.5:7b",
            Self::Gemini => "gemini-1.5-pro",
        }
    }
}

/// Configuration for LLM clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider backend
    pub provider: LlmProvider,

    /// Provider base URL
    pub endpoint: String,

    /// Model name to use
    pub model: String,

    /// API key (required for Gemini)
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature for generation (0.0 - 1.0)
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::for_provider(LlmProvider::default())
    }
}

impl LlmConfig {
    /// Defaults for a given provider
    pub fn for_provider(provider: LlmProvider) -> Self {
        Self {
            provider,
            endpoint: provider.default_endpoint().to_string(),
            model: provider.default_model().to_string(),
            api_key: None,
            timeout_secs: 180,
            max_tokens: 8192,
            temperature: 0.7,
        }
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        let provider = std::env::var("APUNTES_LLM_PROVIDER")
            .ok()
            .and_then(|s| LlmProvider::parse(&s))
            .unwrap_or_default();
        let defaults = Self::for_provider(provider);

        let endpoint_var = match provider {
            LlmProvider::Ollama => "OLLAMA_ENDPOINT",
            LlmProvider::Gemini => "GEMINI_ENDPOINT",
        };

        Self {
            provider,
            endpoint: std::env::var("APUNTES_LLM_ENDPOINT")
                .or_else(|_| std::env::var(endpoint_var))
                .unwrap_or(defaults.endpoint),
            model: std::env::var("APUNTES_LLM_MODEL").unwrap_or(defaults.model),
            api_key: std::env::var("APUNTES_LLM_API_KEY")
                .or_else(|_| std::env::var("GEMINI_API_KEY"))
                .ok(),
            timeout_secs: std::env::var("APUNTES_LLM_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            max_tokens: std::env::var("APUNTES_LLM_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_tokens),
            temperature: std::env::var("APUNTES_LLM_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.temperature),
        }
    }

    /// Check provider-specific requirements
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.endpoint.trim().is_empty() {
            return Err(LlmError::Config("endpoint is empty".to_string()));
        }

        if self.provider == LlmProvider::Gemini
            && self.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(LlmError::Config(
                "GEMINI_API_KEY is required for the gemini provider".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(LlmError::Config(format!(
                "temperature {} out of range",
                self.temperature
            )));
        }

        Ok(())
    }
}

/// Build the configured provider client
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>, LlmError> {
    config.validate()?;

    let client: Arc<dyn TextGenerator> = match config.provider {
        LlmProvider::Ollama => Arc::new(OllamaClient::with_config(config.clone())?),
        LlmProvider::Gemini => Arc::new(GeminiClient::with_config(config.clone())?),
    };

    tracing::info!(client = %client.describe(), "LLM client ready");
    Ok(client)
}
