//! Provider-agnostic LLM gateway contract.
//!
//! Implementations differ only in request encoding, authentication and
//! response shape; the outward contract is a single text completion plus a
//! JSON-extracting convenience used by every stage.

mod extract;

pub use extract::extract_json;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::context::{ContextError, RequestContext};

/// LLM gateway failure kinds.
#[derive(Debug, Error, Clone)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rate limited")]
    RateLimited,
    #[error("request timeout")]
    Timeout,
    #[error("provider error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("no completion choices in response")]
    EmptyChoices,
    #[error("invalid JSON in response: {0}")]
    InvalidJson(String),
    #[error("request cancelled")]
    Cancelled,
}

impl LlmError {
    /// Transient failures worth another attempt within the retry budget.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::Transport(_) | LlmError::RateLimited | LlmError::Timeout
        )
    }
}

impl From<ContextError> for LlmError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::DeadlineExceeded => LlmError::Timeout,
            ContextError::Cancelled => LlmError::Cancelled,
        }
    }
}

/// Single request/response text completion with no structural expectations.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, ctx: &RequestContext, prompt: &str) -> Result<String, LlmError>;
}

#[async_trait]
impl LlmClient for std::sync::Arc<dyn LlmClient> {
    async fn complete(&self, ctx: &RequestContext, prompt: &str) -> Result<String, LlmError> {
        (**self).complete(ctx, prompt).await
    }
}

/// Perform a completion, extract the JSON payload from the free-form
/// response, and parse it into the caller's target shape.
///
/// Unknown fields are ignored by serde; whether required fields are present
/// and meaningful is the stage layer's concern.
pub async fn complete_json<T: DeserializeOwned>(
    client: &dyn LlmClient,
    ctx: &RequestContext,
    prompt: &str,
) -> Result<T, LlmError> {
    let response = client.complete(ctx, prompt).await?;
    debug!(response_len = response.len(), "llm completion received");
    let payload = extract_json(&response)
        .ok_or_else(|| LlmError::InvalidJson("no valid JSON found in response".to_string()))?;
    serde_json::from_str(&payload).map_err(|e| LlmError::InvalidJson(e.to_string()))
}
