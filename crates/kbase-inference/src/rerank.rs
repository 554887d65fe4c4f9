//! Rerank request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request for a cross-encoder rerank operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankRequest {
    /// Unique identifier for this request.
    pub request_id: Uuid,
    /// The query to score against.
    pub query: String,
    /// Candidate passages, in order.
    pub documents: Vec<String>,
}

impl RerankRequest {
    /// Creates a new rerank request.
    pub fn new(query: impl Into<String>, documents: Vec<String>) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            query: query.into(),
            documents,
        }
    }

    /// Returns the number of candidate passages.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns whether the candidate list is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Response from a rerank operation.
///
/// Scores are comparable across calls for the same model version only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankResponse {
    /// Unique identifier for this response.
    pub response_id: Uuid,
    /// Request ID this response corresponds to.
    pub request_id: Uuid,
    /// One relevance score per input document, in input order.
    pub scores: Vec<f32>,
}

impl RerankResponse {
    /// Creates a response for the given request id.
    pub fn new(request_id: Uuid, scores: Vec<f32>) -> Self {
        Self {
            response_id: Uuid::now_v7(),
            request_id,
            scores,
        }
    }
}
