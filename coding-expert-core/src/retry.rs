//! Exponential backoff with jitter, driven by an injectable clock

use crate::context::{Interrupted, RequestContext};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::time::Duration;

/// Retry configuration for LLM and tool calls
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Fractional jitter applied to every delay, `0.2` means ±20%
    pub jitter: f64,
    /// Sum of all delays never exceeds this
    pub max_total_wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::llm_default(3)
    }
}

impl RetryConfig {
    /// Jittered exponential backoff for rate limits and provider timeouts
    pub fn llm_default(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            backoff_multiplier: 2.0,
            jitter: 0.2,
            max_total_wait: Duration::from_secs(20),
        }
    }

    /// Tool schedule: 100ms, then 400ms
    pub fn tool_default(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
            backoff_multiplier: 4.0,
            jitter: 0.0,
            max_total_wait: Duration::from_secs(2),
        }
    }

    /// Never retry
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::tool_default(0)
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.clone(), StdRng::from_entropy())
    }

    /// Reproducible jitter sequence
    pub fn backoff_seeded(&self, seed: u64) -> Backoff {
        Backoff::new(self.clone(), StdRng::seed_from_u64(seed))
    }
}

/// Iterator over `(retry_number, delay)` pairs.
///
/// Retry numbers start at 1. The iterator ends after `max_retries` items or once the
/// accumulated wait would pass `max_total_wait`; the final delay is shortened to fit.
#[derive(Debug)]
pub struct Backoff {
    config: RetryConfig,
    attempt: u32,
    waited: Duration,
    rng: StdRng,
}

impl Backoff {
    fn new(config: RetryConfig, rng: StdRng) -> Self {
        Self {
            config,
            attempt: 0,
            waited: Duration::ZERO,
            rng,
        }
    }

    pub fn total_waited(&self) -> Duration {
        self.waited
    }

    /// Count a wait longer than the scheduled delay against `max_total_wait`
    fn absorb(&mut self, extra: Duration) {
        self.waited += extra;
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let factor = self.config.backoff_multiplier.max(1.0).powi(exponent);
        let secs = self.config.initial_delay.as_secs_f64() * factor;
        let capped = secs.min(self.config.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }
}

impl Iterator for Backoff {
    type Item = (u32, Duration);

    fn next(&mut self) -> Option<Self::Item> {
        if self.attempt >= self.config.max_retries {
            return None;
        }
        let remaining = self.config.max_total_wait.saturating_sub(self.waited);
        if remaining.is_zero() {
            return None;
        }
        self.attempt += 1;

        let mut delay = self.base_delay(self.attempt);
        if self.config.jitter > 0.0 {
            let spread = self.config.jitter.min(1.0);
            let factor = 1.0 + self.rng.gen_range(-spread..=spread);
            delay = Duration::from_secs_f64(delay.as_secs_f64() * factor);
        }
        let delay = delay.min(remaining);
        self.waited += delay;
        Some((self.attempt, delay))
    }
}

/// Time source for retry sleeps
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer (pausable in tests)
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Terminal result of [`with_retry`]
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// The operation failed permanently or ran out of retries
    Failed { error: E, attempts: u32 },
    /// The request was cancelled or ran out of time while backing off
    Interrupted { last_error: E, reason: Interrupted },
}

/// Run `op` until it succeeds, fails permanently or the backoff schedule runs out.
///
/// `op` receives the 1-based attempt number. Backoff sleeps go through `clock` and are
/// bounded by `ctx`.
pub async fn with_retry<T, E, F, Fut, P>(
    ctx: &RequestContext,
    clock: &dyn Clock,
    backoff: Backoff,
    is_transient: P,
    op: F,
) -> Result<(T, u32), RetryFailure<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    with_retry_after(ctx, clock, backoff, is_transient, |_: &E| None, op).await
}

/// [`with_retry`] that also honours a wait requested by the failing side.
///
/// Each sleep is the larger of the scheduled delay and `retry_after(&error)`. A hint
/// that does not fit in the remaining request budget ends the retries with
/// [`RetryFailure::Failed`].
pub async fn with_retry_after<T, E, F, Fut, P, H>(
    ctx: &RequestContext,
    clock: &dyn Clock,
    mut backoff: Backoff,
    is_transient: P,
    retry_after: H,
    mut op: F,
) -> Result<(T, u32), RetryFailure<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    H: Fn(&E) -> Option<Duration>,
{
    let mut attempt = 1;
    loop {
        let error = match op(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(error) => error,
        };
        if !is_transient(&error) {
            return Err(RetryFailure::Failed {
                error,
                attempts: attempt,
            });
        }
        let Some((_, scheduled)) = backoff.next() else {
            return Err(RetryFailure::Failed {
                error,
                attempts: attempt,
            });
        };
        let delay = match retry_after(&error) {
            Some(hint) if hint > scheduled => {
                if hint >= ctx.remaining() {
                    tracing::debug!(
                        attempt,
                        retry_after_ms = hint.as_millis() as u64,
                        "requested wait exceeds the remaining budget"
                    );
                    return Err(RetryFailure::Failed {
                        error,
                        attempts: attempt,
                    });
                }
                backoff.absorb(hint - scheduled);
                hint
            }
            _ => scheduled,
        };
        tracing::debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            waited_ms = backoff.total_waited().as_millis() as u64,
            "retrying after transient failure"
        );
        if let Err(reason) = ctx.run(clock.sleep(delay)).await {
            return Err(RetryFailure::Interrupted {
                last_error: error,
                reason,
            });
        }
        attempt += 1;
    }
}
