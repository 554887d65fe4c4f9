//! OpenAI-compatible HTTP provider.
//!
//! Speaks the `/v1/embeddings`, `/v1/rerank`, and `/v1/chat/completions`
//! JSON dialects served by common model runtimes (vLLM, TEI, and gateway
//! proxies in front of hosted models).

use std::fmt;
use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use jiff::Timestamp;
use kbase_core::{Error, Result, ServiceHealth};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::chat::{GenerateRequest, GenerateResponse, TokenUsage};
use crate::embedding::{EmbeddingRequest, EmbeddingResponse};
use crate::rerank::{RerankRequest, RerankResponse};
use crate::InferenceProvider;

/// Configuration for the OpenAI-compatible provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct HttpProviderConfig {
    /// Base URL of the model runtime (e.g. "http://localhost:8000")
    #[cfg_attr(
        feature = "config",
        arg(long = "inference-endpoint", env = "INFERENCE_ENDPOINT")
    )]
    pub inference_endpoint: String,

    /// API key sent as a bearer token (optional)
    #[cfg_attr(
        feature = "config",
        arg(long = "inference-api-key", env = "INFERENCE_API_KEY")
    )]
    pub inference_api_key: Option<String>,

    /// Embedding model name
    #[cfg_attr(
        feature = "config",
        arg(long = "embedding-model", env = "EMBEDDING_MODEL")
    )]
    pub embedding_model: String,

    /// Embedding dimensionality; fixed per model version
    #[cfg_attr(
        feature = "config",
        arg(
            long = "embedding-dimensions",
            env = "EMBEDDING_DIMENSIONS",
            default_value_t = 1024
        )
    )]
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u64,

    /// Maximum characters per embedding input; longer inputs are rejected
    #[cfg_attr(
        feature = "config",
        arg(
            long = "embedding-max-chars",
            env = "EMBEDDING_MAX_CHARS",
            default_value_t = 8192
        )
    )]
    #[serde(default = "default_embedding_max_chars")]
    pub embedding_max_chars: usize,

    /// Reranker model name
    #[cfg_attr(feature = "config", arg(long = "rerank-model", env = "RERANK_MODEL"))]
    pub rerank_model: String,

    /// Chat model name
    #[cfg_attr(feature = "config", arg(long = "chat-model", env = "CHAT_MODEL"))]
    pub chat_model: String,

    /// Request timeout in seconds
    #[cfg_attr(
        feature = "config",
        arg(
            long = "inference-timeout-secs",
            env = "INFERENCE_TIMEOUT_SECS",
            default_value_t = 120
        )
    )]
    #[serde(default = "default_timeout_secs")]
    pub inference_timeout_secs: u64,
}

fn default_embedding_dimensions() -> u64 {
    1024
}

fn default_embedding_max_chars() -> usize {
    8192
}

fn default_timeout_secs() -> u64 {
    120
}

impl HttpProviderConfig {
    /// Returns the request timeout.
    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }
}

/// OpenAI-compatible HTTP provider.
#[derive(Clone)]
pub struct HttpProvider {
    http: Client,
    config: HttpProviderConfig,
}

impl fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpProvider")
            .field("endpoint", &self.config.inference_endpoint)
            .finish_non_exhaustive()
    }
}

// Wire types for the OpenAI-compatible dialects.

#[derive(Serialize)]
struct WireEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct WireEmbeddingResponse {
    data: Vec<WireEmbeddingDatum>,
}

#[derive(Deserialize)]
struct WireEmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct WireRerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
}

#[derive(Deserialize)]
struct WireRerankResponse {
    results: Vec<WireRerankResult>,
}

#[derive(Deserialize)]
struct WireRerankResult {
    index: usize,
    relevance_score: f32,
}

#[derive(Serialize)]
struct WireChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct WireChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct WireChatResponse {
    choices: Vec<WireChatChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChatChoice {
    message: WireChatMessage,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl HttpProvider {
    /// Creates a provider with the given configuration.
    pub fn new(config: HttpProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                Error::configuration()
                    .with_message("failed to build HTTP client")
                    .with_source(Box::new(e))
            })?;

        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.inference_endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn post_json<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp> {
        let mut request = self.http.post(self.url(path)).json(body);
        if let Some(ref api_key) = self.config.inference_api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let response = check_status(response).await?;

        response.json::<Resp>().await.map_err(|e| {
            Error::serialization()
                .with_message("failed to decode model runtime response")
                .with_source(Box::new(e))
        })
    }
}

/// Maps reqwest transport failures to the gateway taxonomy.
fn map_transport_error(error: reqwest::Error) -> Error {
    let base = if error.is_timeout() {
        Error::timeout().with_message("model runtime request timed out")
    } else {
        Error::network_error().with_message("model runtime request failed")
    };
    base.with_source(Box::new(error))
}

/// Classifies HTTP status codes into transient and permanent failures.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response.text().await.unwrap_or_default();
    let detail = detail.chars().take(512).collect::<String>();

    let error = match status {
        StatusCode::TOO_MANY_REQUESTS => Error::rate_limited(),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Error::timeout(),
        s if s.is_server_error() => Error::service_unavailable(),
        _ => Error::external_error(),
    };

    Err(error.with_message(format!("model runtime returned {status}: {detail}")))
}

#[async_trait::async_trait]
impl InferenceProvider for HttpProvider {
    async fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse> {
        if request.is_empty() {
            return Ok(EmbeddingResponse::new(request.request_id, vec![]));
        }

        // Never truncate silently; callers pre-truncate when they mean to.
        let longest = request.max_input_chars();
        if longest > self.config.embedding_max_chars {
            return Err(Error::overlong_input().with_message(format!(
                "embedding input of {longest} chars exceeds the {} char model limit",
                self.config.embedding_max_chars
            )));
        }

        let wire: WireEmbeddingResponse = self
            .post_json(
                "/v1/embeddings",
                &WireEmbeddingRequest {
                    model: &self.config.embedding_model,
                    input: &request.texts,
                },
            )
            .await?;

        let mut embeddings = vec![Vec::new(); request.len()];
        for datum in wire.data {
            let slot = embeddings.get_mut(datum.index).ok_or_else(|| {
                Error::serialization()
                    .with_message("embedding response index out of range")
            })?;
            *slot = datum.embedding;
        }

        for (i, embedding) in embeddings.iter().enumerate() {
            if embedding.len() as u64 != self.config.embedding_dimensions {
                return Err(Error::serialization().with_message(format!(
                    "embedding {i} has {} dimensions, expected {}",
                    embedding.len(),
                    self.config.embedding_dimensions
                )));
            }
        }

        Ok(EmbeddingResponse::new(request.request_id, embeddings))
    }

    async fn rerank(&self, request: &RerankRequest) -> Result<RerankResponse> {
        if request.is_empty() {
            return Ok(RerankResponse::new(request.request_id, vec![]));
        }

        let wire: WireRerankResponse = self
            .post_json(
                "/v1/rerank",
                &WireRerankRequest {
                    model: &self.config.rerank_model,
                    query: &request.query,
                    documents: &request.documents,
                },
            )
            .await?;

        // The runtime returns results sorted by relevance; restore input
        // order so len(scores) == len(docs) positionally.
        let mut scores = vec![f32::NEG_INFINITY; request.len()];
        for result in wire.results {
            let slot = scores.get_mut(result.index).ok_or_else(|| {
                Error::serialization().with_message("rerank response index out of range")
            })?;
            *slot = result.relevance_score;
        }

        if scores.iter().any(|s| *s == f32::NEG_INFINITY) {
            return Err(Error::serialization()
                .with_message("rerank response is missing scores for some documents"));
        }

        Ok(RerankResponse::new(request.request_id, scores))
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let messages = request
            .messages
            .iter()
            .map(|m| WireChatMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect();

        let wire: WireChatResponse = self
            .post_json(
                "/v1/chat/completions",
                &WireChatRequest {
                    model: &self.config.chat_model,
                    messages,
                    temperature: request.options.temperature,
                    max_tokens: request.options.max_tokens,
                    stop: request.options.stop.clone(),
                },
            )
            .await?;

        let choice = wire.choices.into_iter().next().ok_or_else(|| {
            Error::external_error().with_message("model runtime returned no choices")
        })?;

        let usage = wire.usage.unwrap_or_default();

        Ok(GenerateResponse::new(
            request.request_id,
            choice.message.content,
            TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            },
        ))
    }

    fn embedding_dimensions(&self) -> u64 {
        self.config.embedding_dimensions
    }

    async fn health_check(&self) -> Result<ServiceHealth> {
        let started_at = Timestamp::now();
        let mut request = self.http.get(self.url("/v1/models"));
        if let Some(ref api_key) = self.config.inference_api_key {
            request = request.bearer_auth(api_key);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                let elapsed = Timestamp::now().duration_since(started_at);
                Ok(ServiceHealth::healthy().with_response_time(elapsed.unsigned_abs()))
            }
            Ok(response) => Ok(ServiceHealth::degraded(format!(
                "model runtime returned {}",
                response.status()
            ))),
            Err(error) => Ok(ServiceHealth::unhealthy(error.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HttpProviderConfig {
        HttpProviderConfig {
            inference_endpoint: "http://localhost:8000".to_owned(),
            inference_api_key: None,
            embedding_model: "bge-m3".to_owned(),
            embedding_dimensions: 4,
            embedding_max_chars: 16,
            rerank_model: "bge-reranker-v2-m3".to_owned(),
            chat_model: "qwen2.5-32b-instruct".to_owned(),
            inference_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_overlong_embedding_input_is_rejected() {
        let provider = HttpProvider::new(config()).unwrap();
        let request = EmbeddingRequest::from_text("a".repeat(64));
        let error = provider.embed(&request).await.unwrap_err();
        assert_eq!(error.kind, kbase_core::ErrorKind::OverlongInput);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_url_joins_cleanly() {
        let provider = HttpProvider::new(config()).unwrap();
        assert_eq!(
            provider.url("/v1/embeddings"),
            "http://localhost:8000/v1/embeddings"
        );
    }
}
