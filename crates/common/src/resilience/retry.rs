//! Generic retry execution with typed policies
//!
//! Retry policy and backoff parameters live in plain data so callers can
//! test their retry behaviour independent of the transport.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the configured backoff delay
    Retry,
    /// Retry after a custom delay
    RetryAfter(Duration),
    /// Don't retry; surface the error as-is
    Stop,
}

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

impl<E, F> RetryPolicy<E> for F
where
    F: Fn(&E, u32) -> RetryDecision,
{
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
        self(error, attempt)
    }
}

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// Exponential backoff: base * 2^attempt, capped at max_delay
    Exponential { base: Duration, max_delay: Duration },
}

impl BackoffStrategy {
    /// Delay before the retry following `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { base, max_delay } => {
                let shift = attempt.min(16);
                let delay = base.saturating_mul(1u32 << shift);
                delay.min(*max_delay)
            }
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential {
                base: Duration::from_millis(500),
                max_delay: Duration::from_secs(30),
            },
        }
    }
}

/// Execute `operation` until it succeeds, the policy stops it, or the
/// attempt budget is spent. The last error is returned unchanged.
pub async fn retry_with_policy<F, Fut, T, E, P>(
    config: &RetryConfig,
    policy: &P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: RetryPolicy<E>,
    E: fmt::Debug,
{
    let attempts = config.max_attempts.max(1);

    let mut attempt = 0;
    loop {
        debug!(attempt = attempt + 1, max_attempts = attempts, "executing retryable operation");

        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(retries = attempt, "operation succeeded after retries");
                }
                return Ok(value);
            }
            Err(error) => {
                if attempt + 1 >= attempts {
                    warn!(attempts, error = ?error, "retry attempts exhausted");
                    return Err(error);
                }

                let delay = match policy.should_retry(&error, attempt) {
                    RetryDecision::Stop => {
                        debug!(error = ?error, "error is not retryable");
                        return Err(error);
                    }
                    RetryDecision::Retry => config.backoff.delay(attempt),
                    RetryDecision::RetryAfter(custom) => custom,
                };

                warn!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, error = ?error, "operation failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
