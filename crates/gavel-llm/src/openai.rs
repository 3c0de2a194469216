//! OpenAI chat-completions client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use gavel_core::context::RequestContext;
use gavel_core::llm::{LlmClient, LlmError};

use crate::retry::{classify_transport, with_backoff};
use crate::{build_http_client, BuildError, LlmConfig};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiClient {
    model: String,
    api_key: String,
    url: String,
    max_retries: u32,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, BuildError> {
        Ok(Self {
            model: config.resolved_model(),
            api_key: config.api_key.clone(),
            url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_API_URL.to_string()),
            max_retries: config.max_retries,
            http: build_http_client(config.timeout)?,
        })
    }

    async fn request_once(
        &self,
        ctx: &RequestContext,
        body: &ChatRequest,
    ) -> Result<String, LlmError> {
        let send = self.http.post(&self.url).bearer_auth(&self.api_key).json(body).send();
        let response = ctx.guard(send).await?.map_err(classify_transport)?;

        let status = response.status();
        if status.as_u16() == 429 {
            debug!("openai: rate limited");
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let message = ctx
                .guard(response.text())
                .await?
                .unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = ctx
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
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(LlmError::EmptyChoices)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, ctx: &RequestContext, prompt: &str) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };
        with_backoff(ctx, self.max_retries, || self.request_once(ctx, &body)).await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LlmProvider;

    #[test]
    fn test_default_model_and_url() {
        let client = OpenAiClient::new(&LlmConfig::new(LlmProvider::OpenAi, "key")).unwrap();
        assert_eq!(client.model, "gpt-4");
        assert_eq!(client.url, OPENAI_API_URL);
    }

    #[test]
    fn test_base_url_override() {
        let mut config = LlmConfig::new(LlmProvider::OpenAi, "key");
        config.base_url = Some("http://127.0.0.1:9999/v1/chat/completions".to_string());
        let client = OpenAiClient::new(&config).unwrap();
        assert!(client.url.starts_with("http://127.0.0.1:9999"));
    }

    #[test]
    fn test_empty_choices_response_parses() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(parsed.choices.is_empty());
        assert!(parsed.error.is_none());
    }
}
