//! Resilience primitives

pub mod retry;

pub use retry::{retry_with_policy, BackoffStrategy, RetryConfig, RetryDecision, RetryPolicy};
