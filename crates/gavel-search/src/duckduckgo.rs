//! DuckDuckGo Instant Answer API client.
//!
//! The Instant Answer API returns an abstract plus related topics rather
//! than classic ranked hits; the abstract (when present) becomes the first
//! result.

use async_trait::async_trait;
use serde::Deserialize;

use gavel_core::context::RequestContext;
use gavel_core::search::{SearchClient, SearchError, SearchResult, SearchResults};

const DUCKDUCKGO_API_URL: &str = "https://api.duckduckgo.com/";
const USER_AGENT: &str = "gavel/1.0";

pub struct DuckDuckGoClient {
    max_results: usize,
    http: reqwest::Client,
}

impl DuckDuckGoClient {
    pub fn new(max_results: usize, http: reqwest::Client) -> Self {
        Self { max_results, http }
    }
}

#[derive(Debug, Deserialize)]
struct InstantAnswerResponse {
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractSource", default)]
    abstract_source: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
struct RelatedTopic {
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(rename = "FirstURL", default)]
    first_url: String,
}

/// Topic text arrives as "Title - Description".
fn extract_title(text: &str) -> String {
    text.split_once(" - ")
        .map(|(title, _)| title.trim().to_string())
        .unwrap_or_else(|| text.to_string())
}

fn convert(response: InstantAnswerResponse, query: &str, max_results: usize) -> SearchResults {
    let mut results = Vec::new();

    if !response.abstract_text.is_empty() {
        results.push(SearchResult {
            title: response.abstract_source,
            url: response.abstract_url,
            content: response.abstract_text,
        });
    }

    for topic in response.related_topics {
        if results.len() >= max_results {
            break;
        }
        if !topic.text.is_empty() && !topic.first_url.is_empty() {
            results.push(SearchResult {
                title: extract_title(&topic.text),
                url: topic.first_url,
                content: topic.text,
            });
        }
    }

    SearchResults {
        query: query.to_string(),
        results,
    }
}

#[async_trait]
impl SearchClient for DuckDuckGoClient {
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

        let send = self
            .http
            .get(DUCKDUCKGO_API_URL)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send();
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

        let parsed: InstantAnswerResponse = ctx
            .guard(response.json())
            .await?
            .map_err(|e| SearchError::Decode(e.to_string()))?;
        Ok(convert(parsed, query, max_results))
    }
}
