//! Bounded retries with exponential backoff and jitter.
//!
//! [`retry_with_exponential_backoff`] runs an operation until it succeeds or
//! [`RetryPolicy::max_retries`] retries have failed. Each retry waits twice
//! as long as the previous one, capped at [`RetryPolicy::max_delay_ms`], plus
//! a random jitter. The batch span processor uses it around every export so
//! a flaky collector costs a few extra attempts, never an unbounded loop.

use hivetrace::hive_warn;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// Configuration for retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first call.
    pub max_retries: usize,
    /// Initial delay in milliseconds before the first retry.
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds between retries.
    pub max_delay_ms: u64,
    /// Maximum jitter in milliseconds to add to the delay.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 2,
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            jitter_ms: 50,
        }
    }
}

impl RetryPolicy {
    /// A policy that runs the operation exactly once.
    pub fn no_retry() -> Self {
        RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        }
    }
}

// Generates a random jitter value up to max_jitter
fn generate_jitter(max_jitter: u64) -> u64 {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|elapsed| elapsed.subsec_nanos())
        .unwrap_or_default();
    nanos as u64 % (max_jitter + 1)
}

/// Retries the given operation with exponential backoff and jitter.
///
/// `operation_name` only shows up in the warning logged before each retry.
/// The error of the last attempt is returned once the policy is exhausted.
pub async fn retry_with_exponential_backoff<F, Fut, T, E>(
    policy: RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    E: std::fmt::Debug,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    let mut delay = policy.initial_delay_ms;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) if attempt < policy.max_retries => {
                attempt += 1;
                hive_warn!(
                    name: "Retry.AttemptFailed",
                    operation = operation_name,
                    attempt = attempt,
                    error = format!("{err:?}")
                );
                let jitter = generate_jitter(policy.jitter_ms);
                let delay_with_jitter = std::cmp::min(delay + jitter, policy.max_delay_ms);
                futures_timer::Delay::new(Duration::from_millis(delay_with_jitter)).await;
                delay = std::cmp::min(delay.saturating_mul(2), policy.max_delay_ms);
            }
            Err(err) => return Err(err),
        }
    }
}
