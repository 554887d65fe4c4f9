//! Retry policy with exponential backoff and full jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use kbase_core::Result;

use crate::TRACING_TARGET;

/// Retry policy for transient model runtime failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Base backoff delay doubled per attempt.
    pub base_delay: Duration,
    /// Upper bound on any single backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Returns the backoff delay before the given retry (1-based), drawn
    /// uniformly from zero to the capped exponential bound (full jitter).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .min(self.max_delay);
        let jittered_ms = rand::thread_rng().gen_range(0..=exp.as_millis() as u64);
        Duration::from_millis(jittered_ms)
    }

    /// Runs `operation` until it succeeds, fails permanently, or the
    /// attempt budget is exhausted.
    ///
    /// Only errors classified retryable are retried; overlong inputs and
    /// other permanent failures surface immediately.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        target: TRACING_TARGET,
                        operation = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient failure, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use kbase_core::Error;

    use super::*;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = quick_policy()
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Error::service_unavailable())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = quick_policy()
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::overlong_input()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_surfaces_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = quick_policy()
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::timeout()) }
            })
            .await;
        assert_eq!(result.unwrap_err().kind, kbase_core::ErrorKind::Timeout);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
        };
        for attempt in 1..10 {
            assert!(policy.backoff_delay(attempt) <= Duration::from_secs(4));
        }
    }
}
