//! Gemini generateContent client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use gavel_core::context::RequestContext;
use gavel_core::llm::{LlmClient, LlmError};

use crate::retry::{classify_transport, with_backoff};
use crate::{build_http_client, BuildError, LlmConfig};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    model: String,
    api_key: String,
    endpoint: String,
    max_retries: u32,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, BuildError> {
        Ok(Self {
            model: config.resolved_model(),
            api_key: config.api_key.clone(),
            endpoint: config
                .base_url
                .clone()
                .unwrap_or_else(|| GEMINI_API_URL.to_string()),
            max_retries: config.max_retries,
            http: build_http_client(config.timeout)?,
        })
    }

    fn build_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        )
    }

    async fn request_once(
        &self,
        ctx: &RequestContext,
        body: &GenerateRequest,
    ) -> Result<String, LlmError> {
        let send = self.http.post(self.build_url()).json(body).send();
        let response = ctx.guard(send).await?.map_err(classify_transport)?;

        let status = response.status();
        if status.as_u16() == 429 {
            debug!("gemini: rate limited");
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let message = ctx.guard(response.text()).await?.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = ctx
            .guard(response.json())
            .await?
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        if let Some(error) = parsed.error {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error.message,
            });
        }
        parsed
            .candidates
            .and_then(|candidates| candidates.into_iter().next())
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or(LlmError::EmptyChoices)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, ctx: &RequestContext, prompt: &str) -> Result<String, LlmError> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };
        with_backoff(ctx, self.max_retries, || self.request_once(ctx, &body)).await
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LlmProvider;

    #[test]
    fn test_build_url_embeds_model_and_key() {
        let config = LlmConfig::new(LlmProvider::Gemini, "test-key").with_model("gemini-1.5-flash");
        let client = GeminiClient::new(&config).unwrap();
        let url = client.build_url();
        assert!(url.contains("gemini-1.5-flash:generateContent"));
        assert!(url.contains("key=test-key"));
        assert!(url.starts_with(GEMINI_API_URL));
    }

    #[test]
    fn test_candidate_text_extraction_shape() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "OK"}]}}]}"#,
        )
        .unwrap();
        let text = parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text);
        assert_eq!(text.as_deref(), Some("OK"));
    }
}
