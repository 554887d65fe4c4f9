//! Outbound rate limiting for model runtimes.
//!
//! Two token buckets per gateway: a queries-per-second bucket and a
//! tokens-per-minute bucket. Waiters queue FIFO behind a bounded semaphore;
//! when the queue is full the call fails with a transient rate-limit error
//! instead of piling up unbounded.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::{Clock, MonotonicClock};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use kbase_core::{Error, Result};
use tokio::sync::Semaphore;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

type Limiter = RateLimiter<
    NotKeyed,
    InMemoryState,
    MonotonicClock,
    NoOpMiddleware<<MonotonicClock as Clock>::Instant>,
>;

/// Rate limit configuration for one model gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct RateLimitConfig {
    /// Maximum model requests per second
    #[cfg_attr(
        feature = "config",
        arg(
            long = "inference-max-qps",
            env = "INFERENCE_MAX_QPS",
            default_value_t = 10
        )
    )]
    #[serde(default = "default_max_qps")]
    pub max_qps: u32,

    /// Maximum model tokens per minute
    #[cfg_attr(
        feature = "config",
        arg(
            long = "inference-max-tokens-per-minute",
            env = "INFERENCE_MAX_TOKENS_PER_MINUTE",
            default_value_t = 200_000
        )
    )]
    #[serde(default = "default_max_tpm")]
    pub max_tokens_per_minute: u32,

    /// Maximum callers queued behind the buckets before shedding load
    #[cfg_attr(
        feature = "config",
        arg(
            long = "inference-max-waiters",
            env = "INFERENCE_MAX_WAITERS",
            default_value_t = 64
        )
    )]
    #[serde(default = "default_max_waiters")]
    pub max_waiters: usize,
}

fn default_max_qps() -> u32 {
    10
}

fn default_max_tpm() -> u32 {
    200_000
}

fn default_max_waiters() -> usize {
    64
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_qps: default_max_qps(),
            max_tokens_per_minute: default_max_tpm(),
            max_waiters: default_max_waiters(),
        }
    }
}

/// Token buckets guarding one model gateway.
#[derive(Clone)]
pub struct RateLimits {
    qps: Arc<Limiter>,
    tokens_per_minute: Arc<Limiter>,
    waiters: Arc<Semaphore>,
}

impl RateLimits {
    /// Creates the buckets from configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        let qps = NonZeroU32::new(config.max_qps.max(1)).unwrap_or(NonZeroU32::MIN);
        let tpm =
            NonZeroU32::new(config.max_tokens_per_minute.max(1)).unwrap_or(NonZeroU32::MIN);

        Self {
            qps: Arc::new(RateLimiter::new(
                Quota::per_second(qps),
                InMemoryState::default(),
                MonotonicClock,
            )),
            tokens_per_minute: Arc::new(RateLimiter::new(
                Quota::per_minute(tpm),
                InMemoryState::default(),
                MonotonicClock,
            )),
            waiters: Arc::new(Semaphore::new(config.max_waiters)),
        }
    }

    /// Admits one request consuming an estimated token budget.
    ///
    /// Blocks until both buckets permit the call. Fails with a transient
    /// rate-limit error when the waiter queue is already full.
    pub async fn admit(&self, estimated_tokens: u32) -> Result<()> {
        let _waiting = self.waiters.try_acquire().map_err(|_| {
            Error::rate_limited().with_message("rate limiter queue is full, shedding request")
        })?;

        self.qps.until_ready().await;

        if let Some(tokens) = NonZeroU32::new(estimated_tokens) {
            // Oversized single requests can exceed the whole bucket; clamp
            // to the bucket capacity so they are slowed, not deadlocked.
            match self.tokens_per_minute.until_n_ready(tokens).await {
                Ok(()) => {}
                Err(_insufficient) => {
                    self.tokens_per_minute.until_ready().await;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_admit_within_budget() {
        let limits = RateLimits::new(&RateLimitConfig::default());
        assert!(limits.admit(100).await.is_ok());
    }

    #[tokio::test]
    async fn test_full_queue_sheds_load() {
        let config = RateLimitConfig {
            max_qps: 1,
            max_tokens_per_minute: 1000,
            max_waiters: 0,
        };
        let limits = RateLimits::new(&config);
        let error = limits.admit(10).await.unwrap_err();
        assert_eq!(error.kind, kbase_core::ErrorKind::RateLimited);
    }
}
