//! Unified inference service with observability, retries, and limits.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "config")]
use clap::Args;
use jiff::Timestamp;
use kbase_core::{Result, ServiceHealth};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::chat::{GenerateRequest, GenerateResponse};
use crate::embedding::{EmbeddingRequest, EmbeddingResponse};
use crate::limiter::{RateLimitConfig, RateLimits};
use crate::rerank::{RerankRequest, RerankResponse};
use crate::retry::RetryPolicy;
use crate::{InferenceProvider, TRACING_TARGET};

/// Rough character-per-token ratio used for rate limiter estimates.
const CHARS_PER_TOKEN: usize = 4;

/// Behavior configuration for the inference service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct InferenceConfig {
    /// Maximum in-flight model requests
    #[cfg_attr(
        feature = "config",
        arg(
            long = "inference-max-concurrency",
            env = "INFERENCE_MAX_CONCURRENCY",
            default_value_t = 8
        )
    )]
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Retry attempts for transient failures, including the first try
    #[cfg_attr(
        feature = "config",
        arg(
            long = "inference-retry-attempts",
            env = "INFERENCE_RETRY_ATTEMPTS",
            default_value_t = 3
        )
    )]
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base retry backoff in milliseconds
    #[cfg_attr(
        feature = "config",
        arg(
            long = "inference-retry-base-delay-ms",
            env = "INFERENCE_RETRY_BASE_DELAY_MS",
            default_value_t = 500
        )
    )]
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Outbound rate limits.
    #[cfg_attr(feature = "config", command(flatten))]
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
}

fn default_max_concurrency() -> usize {
    8
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            rate_limits: RateLimitConfig::default(),
        }
    }
}

impl InferenceConfig {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts.max(1),
            base_delay: std::time::Duration::from_millis(self.retry_base_delay_ms),
            ..RetryPolicy::default()
        }
    }
}

struct InferenceServiceInner {
    provider: Arc<dyn InferenceProvider>,
    retry: RetryPolicy,
    limits: RateLimits,
    concurrency: Semaphore,
}

/// Unified inference service wrapping any [`InferenceProvider`].
#[derive(Clone)]
pub struct InferenceService {
    inner: Arc<InferenceServiceInner>,
}

impl fmt::Debug for InferenceService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceService").finish_non_exhaustive()
    }
}

impl InferenceService {
    /// Creates a new inference service from a provider and configuration.
    pub fn new<P>(provider: P, config: InferenceConfig) -> Self
    where
        P: InferenceProvider + 'static,
    {
        Self {
            inner: Arc::new(InferenceServiceInner {
                provider: Arc::new(provider),
                retry: config.retry_policy(),
                limits: RateLimits::new(&config.rate_limits),
                concurrency: Semaphore::new(config.max_concurrency.max(1)),
            }),
        }
    }

    /// Reports the embedding dimensionality of the configured model.
    pub fn embedding_dimensions(&self) -> u64 {
        self.inner.provider.embedding_dimensions()
    }

    /// Generates embeddings for a batch of texts.
    pub async fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse> {
        let started_at = Timestamp::now();
        let estimated_tokens =
            (request.texts.iter().map(|t| t.len()).sum::<usize>() / CHARS_PER_TOKEN) as u32;

        tracing::debug!(
            target: TRACING_TARGET,
            request_id = %request.request_id,
            batch_size = request.len(),
            "Processing embedding request"
        );

        let result = self
            .dispatch(estimated_tokens, "embed", || {
                let provider = Arc::clone(&self.inner.provider);
                async move { provider.embed(request).await }
            })
            .await;

        let elapsed = Timestamp::now().duration_since(started_at);
        match &result {
            Ok(response) => tracing::debug!(
                target: TRACING_TARGET,
                request_id = %request.request_id,
                dimensions = response.dimensions(),
                elapsed_ms = elapsed.as_millis(),
                "Embedding generation successful"
            ),
            Err(error) => tracing::error!(
                target: TRACING_TARGET,
                request_id = %request.request_id,
                error = %error,
                elapsed_ms = elapsed.as_millis(),
                "Embedding generation failed"
            ),
        }

        result
    }

    /// Scores documents against a query with the cross-encoder.
    pub async fn rerank(&self, request: &RerankRequest) -> Result<RerankResponse> {
        let started_at = Timestamp::now();
        let estimated_tokens = ((request.query.len()
            + request.documents.iter().map(String::len).sum::<usize>())
            / CHARS_PER_TOKEN) as u32;

        tracing::debug!(
            target: TRACING_TARGET,
            request_id = %request.request_id,
            candidates = request.len(),
            "Processing rerank request"
        );

        let result = self
            .dispatch(estimated_tokens, "rerank", || {
                let provider = Arc::clone(&self.inner.provider);
                async move { provider.rerank(request).await }
            })
            .await;

        let elapsed = Timestamp::now().duration_since(started_at);
        match &result {
            Ok(response) => tracing::debug!(
                target: TRACING_TARGET,
                request_id = %request.request_id,
                scores = response.scores.len(),
                elapsed_ms = elapsed.as_millis(),
                "Rerank successful"
            ),
            Err(error) => tracing::error!(
                target: TRACING_TARGET,
                request_id = %request.request_id,
                error = %error,
                elapsed_ms = elapsed.as_millis(),
                "Rerank failed"
            ),
        }

        result
    }

    /// Generates a chat completion.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let started_at = Timestamp::now();
        let estimated_tokens = (request
            .messages
            .iter()
            .map(|m| m.content.len())
            .sum::<usize>()
            / CHARS_PER_TOKEN) as u32
            + request.options.max_tokens.unwrap_or(0);

        tracing::debug!(
            target: TRACING_TARGET,
            request_id = %request.request_id,
            messages = request.messages.len(),
            "Processing generation request"
        );

        let result = self
            .dispatch(estimated_tokens, "generate", || {
                let provider = Arc::clone(&self.inner.provider);
                async move { provider.generate(request).await }
            })
            .await;

        let elapsed = Timestamp::now().duration_since(started_at);
        match &result {
            Ok(response) => tracing::debug!(
                target: TRACING_TARGET,
                request_id = %request.request_id,
                prompt_tokens = response.usage.prompt_tokens,
                completion_tokens = response.usage.completion_tokens,
                elapsed_ms = elapsed.as_millis(),
                "Generation successful"
            ),
            Err(error) => tracing::error!(
                target: TRACING_TARGET,
                request_id = %request.request_id,
                error = %error,
                elapsed_ms = elapsed.as_millis(),
                "Generation failed"
            ),
        }

        result
    }

    /// Performs a health check on the underlying provider.
    pub async fn health_check(&self) -> Result<ServiceHealth> {
        self.inner.provider.health_check().await
    }

    /// Applies concurrency, rate limits, and retries around one call.
    async fn dispatch<T, F, Fut>(
        &self,
        estimated_tokens: u32,
        label: &str,
        operation: F,
    ) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.inner
            .retry
            .run(label, || async {
                self.inner.limits.admit(estimated_tokens).await?;
                let _permit = self.inner.concurrency.acquire().await.map_err(|_| {
                    kbase_core::Error::internal_error()
                        .with_message("concurrency semaphore closed")
                })?;
                operation().await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use kbase_core::Error;

    use super::*;
    use crate::chat::TokenUsage;

    /// Provider that fails transiently a fixed number of times.
    struct FlakyProvider {
        failures: AtomicU32,
    }

    #[async_trait::async_trait]
    impl InferenceProvider for FlakyProvider {
        async fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse> {
            if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n > 0).then(|| n - 1)
            }).is_ok()
            {
                return Err(Error::service_unavailable());
            }
            Ok(EmbeddingResponse::new(
                request.request_id,
                vec![vec![0.0; 4]; request.len()],
            ))
        }

        async fn rerank(&self, request: &RerankRequest) -> Result<RerankResponse> {
            Ok(RerankResponse::new(
                request.request_id,
                vec![0.5; request.len()],
            ))
        }

        async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
            Ok(GenerateResponse::new(
                request.request_id,
                "ok",
                TokenUsage::default(),
            ))
        }

        fn embedding_dimensions(&self) -> u64 {
            4
        }

        async fn health_check(&self) -> Result<ServiceHealth> {
            Ok(ServiceHealth::healthy())
        }
    }

    fn quick_config() -> InferenceConfig {
        InferenceConfig {
            retry_base_delay_ms: 1,
            ..InferenceConfig::default()
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let service = InferenceService::new(
            FlakyProvider {
                failures: AtomicU32::new(2),
            },
            quick_config(),
        );

        let response = service
            .embed(&EmbeddingRequest::from_text("hello"))
            .await
            .unwrap();
        assert_eq!(response.embeddings.len(), 1);
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion() {
        let service = InferenceService::new(
            FlakyProvider {
                failures: AtomicU32::new(10),
            },
            quick_config(),
        );

        let error = service
            .embed(&EmbeddingRequest::from_text("hello"))
            .await
            .unwrap_err();
        assert_eq!(error.kind, kbase_core::ErrorKind::ServiceUnavailable);
    }

    #[tokio::test]
    async fn test_rerank_score_arity() {
        let service = InferenceService::new(
            FlakyProvider {
                failures: AtomicU32::new(0),
            },
            quick_config(),
        );

        let request = RerankRequest::new("q", vec!["a".into(), "b".into(), "c".into()]);
        let response = service.rerank(&request).await.unwrap();
        assert_eq!(response.scores.len(), 3);
    }
}
