#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod chat;
mod embedding;
mod limiter;
pub mod provider;
mod rerank;
mod retry;
mod service;

pub use chat::{ChatMessage, ChatRole, GenerateOptions, GenerateRequest, GenerateResponse, TokenUsage};
pub use embedding::{EmbeddingRequest, EmbeddingResponse};
pub use kbase_core::{Error, ErrorKind, Result, ServiceHealth, ServiceStatus};
pub use limiter::{RateLimitConfig, RateLimits};
pub use provider::{HttpProvider, HttpProviderConfig};
pub use rerank::{RerankRequest, RerankResponse};
pub use retry::RetryPolicy;
pub use service::{InferenceConfig, InferenceService};

/// Tracing target for inference operations.
pub const TRACING_TARGET: &str = "kbase_inference";

/// Unified trait for model runtime operations.
///
/// Implement this trait to plug in a different model serving stack; the
/// [`InferenceService`] wrapper supplies retries, rate limiting, and
/// observability on top of any provider.
#[async_trait::async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Generates embeddings for a batch of texts.
    ///
    /// Implementations must reject inputs exceeding the model limit with
    /// [`ErrorKind::OverlongInput`] instead of truncating silently.
    async fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse>;

    /// Scores documents against a query with a cross-encoder.
    ///
    /// The response carries exactly one score per input document, in input
    /// order.
    async fn rerank(&self, request: &RerankRequest) -> Result<RerankResponse>;

    /// Generates a chat completion.
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse>;

    /// Reports the embedding dimensionality of the configured model.
    fn embedding_dimensions(&self) -> u64;

    /// Performs a health check on the provider.
    async fn health_check(&self) -> Result<ServiceHealth>;
}
