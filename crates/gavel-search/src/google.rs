//! Google Custom Search API client.

use async_trait::async_trait;
use serde::Deserialize;

use gavel_core::context::RequestContext;
use gavel_core::search::{SearchClient, SearchError, SearchResult, SearchResults};

const GOOGLE_API_URL: &str = "https://www.googleapis.com/customsearch/v1";

pub struct GoogleClient {
    api_key: String,
    /// Custom Search Engine id, appended as `cx` when set.
    cse_id: Option<String>,
    max_results: usize,
    http: reqwest::Client,
}

impl GoogleClient {
    pub fn new(api_key: String, max_results: usize, http: reqwest::Client) -> Self {
        Self {
            api_key,
            cse_id: None,
            max_results,
            http,
        }
    }

    pub fn with_cse_id(mut self, cse_id: impl Into<String>) -> Self {
        self.cse_id = Some(cse_id.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<GoogleItem>,
}

#[derive(Debug, Deserialize)]
struct GoogleItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

fn convert(response: GoogleResponse, query: &str) -> SearchResults {
    SearchResults {
        query: query.to_string(),
        results: response
            .items
            .into_iter()
            .map(|item| SearchResult {
                title: item.title,
                url: item.link,
                content: item.snippet,
            })
            .collect(),
    }
}

#[async_trait]
impl SearchClient for GoogleClient {
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

        let mut request = self.http.get(GOOGLE_API_URL).query(&[
            ("key", self.api_key.as_str()),
            ("q", query),
            ("num", &max_results.to_string()),
        ]);
        if let Some(cse_id) = &self.cse_id {
            request = request.query(&[("cx", cse_id.as_str())]);
        }

        let response = ctx
            .guard(request.send())
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

        let parsed: GoogleResponse = ctx
            .guard(response.json())
            .await?
            .map_err(|e| SearchError::Decode(e.to_string()))?;
        Ok(convert(parsed, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_maps_link_and_snippet() {
        let response: GoogleResponse = serde_json::from_str(
            r#"{"items": [{"title": "Rust", "link": "https://rust-lang.org", "snippet": "A language"}]}"#,
        )
        .unwrap();
        let results = convert(response, "rust");
        assert_eq!(results.results[0].url, "https://rust-lang.org");
        assert_eq!(results.results[0].content, "A language");
    }

    #[test]
    fn test_no_items_is_empty_set() {
        let response: GoogleResponse = serde_json::from_str("{}").unwrap();
        assert!(convert(response, "q").results.is_empty());
    }
}
