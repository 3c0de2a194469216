//! Request-scoped deadline and cancellation handle.
//!
//! A `RequestContext` is created at the edge of the system, bound to the
//! pipeline deadline by the orchestrator, and threaded through every
//! suspending call. Gateways observe it before sleeping between retries and
//! while a request is in flight.

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a context-guarded operation was interrupted.
///
/// Ordering matters: an elapsed deadline is reported ahead of cancellation so
/// callers classify a timed-out request as a timeout even when the caller
/// also cancelled.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("cancelled")]
    Cancelled,
}

/// Cheap cloneable handle carrying a deadline and a cancellation flag.
#[derive(Debug, Clone)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context with no deadline and no cancellation.
    pub fn background() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Derive a child context whose deadline is the sooner of the parent's
    /// and `now + timeout`. Cancelling the parent cancels the child.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now().checked_add(timeout);
        let deadline = match (self.deadline, candidate) {
            (Some(parent), Some(child)) => Some(parent.min(child)),
            (parent, child) => parent.or(child),
        };
        Self {
            cancel: self.cancel.child_token(),
            deadline,
        }
    }

    /// Flag the context as cancelled. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Report the current interruption state, deadline first.
    pub fn check(&self) -> Result<(), ContextError> {
        if self.deadline_exceeded() {
            return Err(ContextError::DeadlineExceeded);
        }
        if self.is_cancelled() {
            return Err(ContextError::Cancelled);
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the deadline elapses or the context
    /// is cancelled first.
    pub async fn guard<T>(&self, fut: impl Future<Output = T>) -> Result<T, ContextError> {
        self.check()?;
        let deadline_elapsed = async {
            match self.deadline {
                Some(deadline) => {
                    tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
                }
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = deadline_elapsed => Err(ContextError::DeadlineExceeded),
            _ = self.cancel.cancelled() => Err(ContextError::Cancelled),
            out = fut => Ok(out),
        }
    }

    /// Sleep observing deadline and cancellation. Used for retry backoff.
    pub async fn sleep(&self, duration: Duration) -> Result<(), ContextError> {
        self.guard(tokio::time::sleep(duration)).await
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_context_is_unbounded() {
        let ctx = RequestContext::background();
        assert!(ctx.check().is_ok());
        assert!(ctx.remaining().is_none());
        assert!(!ctx.deadline_exceeded());
    }

    #[test]
    fn test_cancel_is_observed() {
        let ctx = RequestContext::background();
        ctx.cancel();
        assert_eq!(ctx.check(), Err(ContextError::Cancelled));
    }

    #[test]
    fn test_deadline_dominates_cancellation() {
        let ctx = RequestContext::with_timeout(Duration::ZERO);
        ctx.cancel();
        assert_eq!(ctx.check(), Err(ContextError::DeadlineExceeded));
    }

    #[test]
    fn test_child_deadline_never_extends_parent() {
        let parent = RequestContext::with_timeout(Duration::from_millis(10));
        let child = parent.child_with_timeout(Duration::from_secs(3600));
        assert!(child.remaining().expect("bounded") <= Duration::from_millis(10));
    }

    #[test]
    fn test_parent_cancel_propagates_to_child() {
        let parent = RequestContext::background();
        let child = parent.child_with_timeout(Duration::from_secs(60));
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_guard_interrupts_on_deadline() {
        tokio_test::block_on(async {
            let ctx = RequestContext::with_timeout(Duration::from_millis(5));
            let out = ctx.guard(tokio::time::sleep(Duration::from_secs(5))).await;
            assert_eq!(out, Err(ContextError::DeadlineExceeded));
        });
    }

    #[test]
    fn test_guard_returns_value_within_deadline() {
        tokio_test::block_on(async {
            let ctx = RequestContext::with_timeout(Duration::from_secs(5));
            let out = ctx.guard(async { 42 }).await;
            assert_eq!(out, Ok(42));
        });
    }

    #[test]
    fn test_sleep_observes_cancellation() {
        tokio_test::block_on(async {
            let ctx = RequestContext::background();
            ctx.cancel();
            let out = ctx.sleep(Duration::from_secs(5)).await;
            assert_eq!(out, Err(ContextError::Cancelled));
        });
    }
}
