//! LLM provider clients for gavel.
//!
//! Implements the [`gavel_core::llm::LlmClient`] contract for OpenAI,
//! Anthropic and Gemini. All clients share the retry/backoff policy in
//! [`retry`] and one `reqwest::Client` each, built once with the configured
//! timeout.

mod anthropic;
mod gemini;
mod mock;
mod openai;
mod retry;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use mock::MockLlmClient;
pub use openai::OpenAiClient;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use gavel_core::llm::LlmClient;

/// Default number of additional attempts after the first request.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Recognized chat providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Gemini,
}

impl LlmProvider {
    /// Model applied when the caller does not specify one.
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "gpt-4",
            LlmProvider::Anthropic => "claude-3-opus-20240229",
            LlmProvider::Gemini => "gemini-1.5-pro",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Gemini => "gemini",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "anthropic" => Ok(LlmProvider::Anthropic),
            "gemini" => Ok(LlmProvider::Gemini),
            other => Err(BuildError::UnknownProvider(other.to_string())),
        }
    }
}

/// Configuration for building a provider client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: String,
    pub model: Option<String>,
    pub max_retries: u32,
    pub timeout: Duration,
    /// Override the provider endpoint, for tests and proxies.
    pub base_url: Option<String>,
}

impl LlmConfig {
    pub fn new(provider: LlmProvider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: None,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            base_url: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub(crate) fn resolved_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }
}

/// Errors that can occur when building an LLM client.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unknown LLM provider: '{0}'. Supported: openai, anthropic, gemini")]
    UnknownProvider(String),
    #[error("missing API key for provider {0}")]
    MissingApiKey(&'static str),
    #[error("http client error: {0}")]
    Http(String),
}

/// Create an LLM client for the provider named in the configuration.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, BuildError> {
    debug!(provider = config.provider.name(), model = %config.resolved_model(), "building LLM client");
    if config.api_key.trim().is_empty() {
        return Err(BuildError::MissingApiKey(config.provider.name()));
    }
    match config.provider {
        LlmProvider::OpenAi => Ok(Arc::new(OpenAiClient::new(config)?)),
        LlmProvider::Anthropic => Ok(Arc::new(AnthropicClient::new(config)?)),
        LlmProvider::Gemini => Ok(Arc::new(GeminiClient::new(config)?)),
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, BuildError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BuildError::Http(e.to_string()))
}
