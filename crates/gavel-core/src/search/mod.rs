//! Provider-agnostic web-search gateway contract.

use std::fmt::Write;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::{ContextError, RequestContext};

/// Search gateway failure kinds. Search is best-effort: the orchestrator
/// logs these and proceeds without web context.
#[derive(Debug, Error, Clone)]
pub enum SearchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("search provider error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("request timeout")]
    Timeout,
    #[error("request cancelled")]
    Cancelled,
}

impl From<ContextError> for SearchError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::DeadlineExceeded => SearchError::Timeout,
            ContextError::Cancelled => SearchError::Cancelled,
        }
    }
}

/// Uniform query/result contract over web-search providers.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(
        &self,
        ctx: &RequestContext,
        query: &str,
        max_results: usize,
    ) -> Result<SearchResults, SearchError>;
}

/// A single search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// Ordered result set for one query. Zero results is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub results: Vec<SearchResult>,
}

impl SearchResults {
    /// Serialize the results into a prompt fragment: a header naming the
    /// query, a numbered list of hits, and a terminator instructing the LLM
    /// to treat the content as up-to-date context.
    pub fn format_for_prompt(&self) -> String {
        if self.results.is_empty() {
            return String::new();
        }

        let mut out = String::new();
        let _ = writeln!(out, "## Web Search Results for: {}\n", self.query);
        for (index, result) in self.results.iter().enumerate() {
            let _ = writeln!(out, "### [{}] {}", index + 1, result.title);
            let _ = writeln!(out, "URL: {}", result.url);
            let _ = writeln!(out, "Content: {}\n", result.content);
        }
        out.push_str("---\n");
        out.push_str(
            "Use the above search results to provide accurate, up-to-date information in your response.\n",
        );
        out
    }
}
