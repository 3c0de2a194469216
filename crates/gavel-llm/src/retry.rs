//! Shared retry loop: exponential backoff over transient failures, with the
//! caller's deadline dominating both in-flight requests and backoff sleeps.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use gavel_core::context::RequestContext;
use gavel_core::llm::LlmError;

/// Sleep before attempt `n >= 1`: `2^n` seconds.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

/// Run `call` up to `max_retries` additional times on retryable errors
/// (rate-limit, provider timeout, transport). Non-retryable errors fail
/// immediately; cancellation and the deadline are observed before sleeping.
pub(crate) async fn with_backoff<T, F, Fut>(
    ctx: &RequestContext,
    max_retries: u32,
    mut call: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    ctx.check()?;
    let mut last_error = None;
    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            warn!(
                attempt,
                delay_secs = delay.as_secs(),
                "retrying LLM request after transient error"
            );
            ctx.sleep(delay).await?;
        }
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => last_error = Some(err),
            Err(err) => return Err(err),
        }
    }
    Err(last_error.unwrap_or_else(|| LlmError::Transport("max retries exceeded".to_string())))
}

/// Map a reqwest failure onto the gateway taxonomy.
pub(crate) fn classify_transport(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Transport(err.to_string())
    }
}
