//! Web-search provider clients for gavel.
//!
//! Implements the [`gavel_core::search::SearchClient`] contract for Tavily,
//! Google Custom Search and the DuckDuckGo Instant Answer API. Search is
//! best-effort: the pipeline proceeds without context when a provider fails.

mod duckduckgo;
mod google;
mod tavily;

pub use duckduckgo::DuckDuckGoClient;
pub use google::GoogleClient;
pub use tavily::TavilyClient;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use gavel_core::search::SearchClient;

/// Default number of results requested per query.
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Recognized search providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchProvider {
    Tavily,
    Google,
    DuckDuckGo,
}

impl FromStr for SearchProvider {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tavily" => Ok(SearchProvider::Tavily),
            "google" => Ok(SearchProvider::Google),
            "duckduckgo" => Ok(SearchProvider::DuckDuckGo),
            other => Err(BuildError::UnknownProvider(other.to_string())),
        }
    }
}

/// Configuration for building a search client. `provider: None` is the
/// "none" sentinel: the factory returns no client and the pipeline skips
/// search entirely.
#[derive(Debug, Clone, Default)]
pub struct SearchConfig {
    pub provider: Option<SearchProvider>,
    pub api_key: Option<String>,
    pub max_results: usize,
    pub timeout: Option<Duration>,
}

impl SearchConfig {
    fn resolved_max_results(&self) -> usize {
        if self.max_results == 0 {
            DEFAULT_MAX_RESULTS
        } else {
            self.max_results
        }
    }

    fn resolved_timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }
}

/// Errors that can occur when building a search client.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unsupported search provider: {0}")]
    UnknownProvider(String),
    #[error("{0} is required for the {1} provider")]
    MissingApiKey(&'static str, &'static str),
    #[error("http client error: {0}")]
    Http(String),
}

/// Create a search client, or `None` when no provider is configured.
pub fn create_client(config: &SearchConfig) -> Result<Option<Arc<dyn SearchClient>>, BuildError> {
    let Some(provider) = config.provider else {
        return Ok(None);
    };
    debug!(?provider, "building search client");
    let http = build_http_client(config.resolved_timeout())?;
    let max_results = config.resolved_max_results();
    match provider {
        SearchProvider::Tavily => {
            let api_key = require_key(config, "TAVILY_API_KEY", "tavily")?;
            Ok(Some(Arc::new(TavilyClient::new(api_key, max_results, http))))
        }
        SearchProvider::Google => {
            let api_key = require_key(config, "GOOGLE_SEARCH_API_KEY", "google")?;
            Ok(Some(Arc::new(GoogleClient::new(api_key, max_results, http))))
        }
        SearchProvider::DuckDuckGo => {
            Ok(Some(Arc::new(DuckDuckGoClient::new(max_results, http))))
        }
    }
}

fn require_key(
    config: &SearchConfig,
    var: &'static str,
    provider: &'static str,
) -> Result<String, BuildError> {
    config
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or(BuildError::MissingApiKey(var, provider))
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, BuildError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BuildError::Http(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_sentinel_builds_no_client() {
        let config = SearchConfig::default();
        assert!(create_client(&config).expect("factory").is_none());
    }

    #[test]
    fn test_tavily_requires_api_key() {
        let config = SearchConfig {
            provider: Some(SearchProvider::Tavily),
            ..SearchConfig::default()
        };
        assert!(matches!(
            create_client(&config),
            Err(BuildError::MissingApiKey("TAVILY_API_KEY", "tavily"))
        ));
    }

    #[test]
    fn test_duckduckgo_needs_no_key() {
        let config = SearchConfig {
            provider: Some(SearchProvider::DuckDuckGo),
            ..SearchConfig::default()
        };
        assert!(create_client(&config).expect("factory").is_some());
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!(
            "tavily".parse::<SearchProvider>().unwrap(),
            SearchProvider::Tavily
        );
        assert_eq!(
            "DuckDuckGo".parse::<SearchProvider>().unwrap(),
            SearchProvider::DuckDuckGo
        );
        assert!(matches!(
            "bing".parse::<SearchProvider>(),
            Err(BuildError::UnknownProvider(_))
        ));
    }
}
