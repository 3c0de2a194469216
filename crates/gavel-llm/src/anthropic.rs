//! Anthropic messages-API client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use gavel_core::context::RequestContext;
use gavel_core::llm::{LlmClient, LlmError};

use crate::retry::{classify_transport, with_backoff};
use crate::{build_http_client, BuildError, LlmConfig};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

pub struct AnthropicClient {
    model: String,
    api_key: String,
    url: String,
    max_retries: u32,
    http: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(config: &LlmConfig) -> Result<Self, BuildError> {
        Ok(Self {
            model: config.resolved_model(),
            api_key: config.api_key.clone(),
            url: config
                .base_url
                .clone()
                .unwrap_or_else(|| ANTHROPIC_API_URL.to_string()),
            max_retries: config.max_retries,
            http: build_http_client(config.timeout)?,
        })
    }

    async fn request_once(
        &self,
        ctx: &RequestContext,
        body: &MessagesRequest,
    ) -> Result<String, LlmError> {
        let send = self
            .http
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send();
        let response = ctx.guard(send).await?.map_err(classify_transport)?;

        let status = response.status();
        if status.as_u16() == 429 {
            debug!("anthropic: rate limited");
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let message = ctx.guard(response.text()).await?.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = ctx
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
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or(LlmError::EmptyChoices)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, ctx: &RequestContext, prompt: &str) -> Result<String, LlmError> {
        let body = MessagesRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: MAX_TOKENS,
        };
        with_backoff(ctx, self.max_retries, || self.request_once(ctx, &body)).await
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: String,
}
