//! Scripted in-memory client for tests and examples.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use gavel_core::context::RequestContext;
use gavel_core::llm::{LlmClient, LlmError};

/// Returns scripted outcomes in order; an exhausted script yields
/// [`LlmError::EmptyChoices`]. Observes the request context like a real
/// client so cancellation tests behave identically.
#[derive(Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: AtomicUsize,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::new();
        for response in responses {
            client.push_response(response);
        }
        client
    }

    pub fn push_response(&self, response: impl Into<String>) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(Ok(response.into()));
    }

    pub fn push_error(&self, error: LlmError) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(Err(error));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, ctx: &RequestContext, _prompt: &str) -> Result<String, LlmError> {
        ctx.check()?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyChoices))
    }
}
