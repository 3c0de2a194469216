//! Environment configuration.
//!
//! Every recognized variable is read once at startup; validation errors name
//! the offending variable. `from_lookup` takes the variable source as a
//! closure so tests never mutate process environment.

use std::time::Duration;

use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PIPELINE_TIMEOUT_MS: u64 = 600_000;

/// Configuration loading errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// One of `openai`, `anthropic`, `gemini`.
    pub llm_provider: String,
    /// API key for the chosen provider.
    pub llm_api_key: String,
    /// Optional model override.
    pub llm_model: Option<String>,
    pub search_enabled: bool,
    /// One of `tavily`, `google`, `duckduckgo`.
    pub search_provider: Option<String>,
    pub search_api_key: Option<String>,
    /// Postgres connection string, or the literal `memory` for the
    /// in-process repository.
    pub database_url: String,
    pub port: u16,
    pub pipeline_timeout: Duration,
}

/// Load configuration from the process environment.
pub fn load() -> Result<AppConfig, ConfigError> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Load configuration from an arbitrary variable source.
pub fn from_lookup<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let llm_provider = get("LLM_PROVIDER")
        .ok_or(ConfigError::Missing("LLM_PROVIDER"))?
        .to_ascii_lowercase();
    let llm_api_key = match llm_provider.as_str() {
        "openai" => get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?,
        "anthropic" => get("ANTHROPIC_API_KEY").ok_or(ConfigError::Missing("ANTHROPIC_API_KEY"))?,
        "gemini" => get("GEMINI_API_KEY").ok_or(ConfigError::Missing("GEMINI_API_KEY"))?,
        other => {
            return Err(ConfigError::Invalid(format!(
                "LLM_PROVIDER must be 'openai', 'anthropic' or 'gemini', got '{other}'"
            )));
        }
    };

    let search_enabled = match get("SEARCH_ENABLED") {
        None => false,
        Some(raw) => parse_bool("SEARCH_ENABLED", &raw)?,
    };
    let search_provider = get("SEARCH_PROVIDER").map(|v| v.to_ascii_lowercase());
    if let Some(provider) = &search_provider {
        if !matches!(provider.as_str(), "tavily" | "google" | "duckduckgo") {
            return Err(ConfigError::Invalid(format!(
                "SEARCH_PROVIDER must be 'tavily', 'google' or 'duckduckgo', got '{provider}'"
            )));
        }
    }
    if search_enabled && search_provider.is_none() {
        return Err(ConfigError::Invalid(
            "SEARCH_PROVIDER is required when SEARCH_ENABLED is true".to_string(),
        ));
    }
    let search_api_key = match search_provider.as_deref() {
        Some("tavily") => get("TAVILY_API_KEY"),
        Some("google") => get("GOOGLE_SEARCH_API_KEY"),
        _ => None,
    };

    let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

    let port = match get("PORT") {
        None => DEFAULT_PORT,
        Some(raw) => raw
            .parse::<u16>()
            .map_err(|_| ConfigError::Invalid(format!("PORT must be an integer, got '{raw}'")))?,
    };

    let pipeline_timeout_ms = match get("PIPELINE_TIMEOUT_MS") {
        None => DEFAULT_PIPELINE_TIMEOUT_MS,
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            ConfigError::Invalid(format!("PIPELINE_TIMEOUT_MS must be an integer, got '{raw}'"))
        })?,
    };

    Ok(AppConfig {
        llm_provider,
        llm_api_key,
        llm_model: get("LLM_MODEL"),
        search_enabled,
        search_provider,
        search_api_key,
        database_url,
        port,
        pipeline_timeout: Duration::from_millis(pipeline_timeout_ms),
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::Invalid(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}
