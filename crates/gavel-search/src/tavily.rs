//! Tavily Search API client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use gavel_core::context::RequestContext;
use gavel_core::search::{SearchClient, SearchError, SearchResult, SearchResults};

const TAVILY_API_URL: &str = "https://api.tavily.com/search";

pub struct TavilyClient {
    api_key: String,
    max_results: usize,
    http: reqwest::Client,
}

impl TavilyClient {
    pub fn new(api_key: String, max_results: usize, http: reqwest::Client) -> Self {
        Self {
            api_key,
            max_results,
            http,
        }
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

fn convert(response: TavilyResponse, query: &str) -> SearchResults {
    SearchResults {
        query: query.to_string(),
        results: response
            .results
            .into_iter()
            .map(|r| SearchResult {
                title: r.title,
                url: r.url,
                content: r.content,
            })
            .collect(),
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    async fn search(
        &self,
        ctx: &RequestContext,
        query: &str,
        max_results: usize,
    ) -> Result<SearchResults, SearchError> {
        let max_results = if max_results == 0 {
            self.max_results
        } else {
            max_results
        };
        let body = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results,
            search_depth: "advanced",
            include_answer: false,
            include_raw_content: false,
        };

        let send = self.http.post(TAVILY_API_URL).json(&body).send();
        let response = ctx
            .guard(send)
            .await?
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = ctx.guard(response.text()).await?.unwrap_or_default();
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: TavilyResponse = ctx
            .guard(response.json())
            .await?
            .map_err(|e| SearchError::Decode(e.to_string()))?;
        Ok(convert(parsed, query))
    }
}
