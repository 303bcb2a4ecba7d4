//! Bounded retry with exponential backoff for idempotent reads.
//!
//! Writes must never go through here: a retried write can double-apply.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves as one.
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, base_delay: Duration) -> Self {
        Self { attempts, base_delay }
    }

    /// A single attempt, no waiting.
    pub const fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay before retry number `retry` (1-based), doubling each time.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(MAX_DELAY)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

/// Run `read` until it succeeds, fails with an error `retryable` rejects, or
/// the policy's attempts are spent. The last error is returned.
pub async fn retry_read<T, E, F, P>(policy: RetryPolicy, mut read: F, retryable: P) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match read() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && retryable(&e) => {
                let delay = policy.delay_for(attempt);
                tracing::debug!(attempt, max = attempts, ?delay, error = %e, "read failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn delay_doubles_and_saturates() {
        let p = RetryPolicy::new(10, Duration::from_millis(100));
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
        assert_eq!(p.delay_for(40), MAX_DELAY);
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let calls = Cell::new(0);
        let out: Result<u32, String> = retry_read(
            RetryPolicy::new(3, Duration::from_millis(10)),
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err("flaky".to_string())
                } else {
                    Ok(7)
                }
            },
            |_| true,
        )
        .await;
        assert_eq!(out, Ok(7));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_attempts() {
        let calls = Cell::new(0);
        let out: Result<u32, String> = retry_read(
            RetryPolicy::new(2, Duration::from_millis(10)),
            || {
                calls.set(calls.get() + 1);
                Err("down".to_string())
            },
            |_| true,
        )
        .await;
        assert_eq!(out, Err("down".to_string()));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = Cell::new(0);
        let out: Result<u32, String> = retry_read(
            RetryPolicy::default(),
            || {
                calls.set(calls.get() + 1);
                Err("not found".to_string())
            },
            |e| e != "not found",
        )
        .await;
        assert!(out.is_err());
        assert_eq!(calls.get(), 1);
    }
}
