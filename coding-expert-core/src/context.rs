//! Per-request cancellation and deadline propagation

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context-bound operation stopped before completing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation token plus absolute deadline, threaded through every LLM call,
/// tool execution and backoff sleep of one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Instant,
}

impl RequestContext {
    pub fn new(budget: Duration) -> Self {
        Self::with_token(CancellationToken::new(), budget)
    }

    pub fn with_token(token: CancellationToken, budget: Duration) -> Self {
        Self {
            token,
            deadline: Instant::now() + budget,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The first reason this context can no longer do work, if any
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            Err(Interrupted::Cancelled)
        } else if self.is_expired() {
            Err(Interrupted::DeadlineExceeded)
        } else {
            Ok(())
        }
    }

    /// Derived context whose deadline is the sooner of the parent's and `now + cap`.
    /// Cancelling the parent cancels the child, not the other way around.
    pub fn child(&self, cap: Duration) -> Self {
        let capped = Instant::now() + cap;
        Self {
            token: self.token.child_token(),
            deadline: self.deadline.min(capped),
        }
    }

    /// Fresh budget for finalization work after this context ran out.
    /// Still observes cancellation of the request itself.
    pub fn grace(&self, budget: Duration) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: Instant::now() + budget,
        }
    }

    /// Run `fut` until it completes, the token fires or the deadline passes
    pub async fn run<F, T>(&self, fut: F) -> Result<T, Interrupted>
    where
        F: Future<Output = T>,
    {
        if self.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Interrupted::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(Interrupted::DeadlineExceeded),
            value = fut => Ok(value),
        }
    }

    /// Sleep for `duration` unless interrupted first
    pub async fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        self.run(tokio::time::sleep(duration)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn run_stops_at_deadline() {
        let ctx = RequestContext::new(Duration::from_millis(50));
        let result = ctx.run(tokio::time::sleep(Duration::from_secs(5))).await;
        assert_eq!(result, Err(Interrupted::DeadlineExceeded));
    }

    #[tokio::test]
    async fn cancellation_wins_over_pending_work() {
        let ctx = RequestContext::new(Duration::from_secs(30));
        ctx.token().cancel();
        let result = ctx.run(async { 7 }).await;
        assert_eq!(result, Err(Interrupted::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn child_deadline_never_exceeds_parent() {
        let parent = RequestContext::new(Duration::from_secs(2));
        let child = parent.child(Duration::from_secs(30));
        assert!(child.deadline() <= parent.deadline());

        let short = parent.child(Duration::from_millis(100));
        assert!(short.deadline() < parent.deadline());
    }

    #[tokio::test]
    async fn cancelling_parent_cancels_child_and_grace() {
        let parent = RequestContext::new(Duration::from_secs(2));
        let child = parent.child(Duration::from_secs(1));
        let grace = parent.grace(Duration::from_secs(1));
        parent.token().cancel();
        assert!(child.is_cancelled());
        assert!(grace.is_cancelled());
    }
}
