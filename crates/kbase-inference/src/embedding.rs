//! Embedding request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request for a batch embedding operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Unique identifier for this request.
    pub request_id: Uuid,
    /// Texts to embed, in order.
    pub texts: Vec<String>,
}

impl EmbeddingRequest {
    /// Creates a new embedding request for the given texts.
    pub fn new(texts: Vec<String>) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            texts,
        }
    }

    /// Creates a request embedding a single text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(vec![text.into()])
    }

    /// Returns the number of texts in the batch.
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    /// Returns whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Returns the length in characters of the longest input.
    pub fn max_input_chars(&self) -> usize {
        self.texts
            .iter()
            .map(|t| t.chars().count())
            .max()
            .unwrap_or(0)
    }
}

/// Response from a batch embedding operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// Unique identifier for this response.
    pub response_id: Uuid,
    /// Request ID this response corresponds to.
    pub request_id: Uuid,
    /// One embedding per input text, in input order.
    pub embeddings: Vec<Vec<f32>>,
}

impl EmbeddingResponse {
    /// Creates a response for the given request id.
    pub fn new(request_id: Uuid, embeddings: Vec<Vec<f32>>) -> Self {
        Self {
            response_id: Uuid::now_v7(),
            request_id,
            embeddings,
        }
    }

    /// Returns the dimensionality of the first embedding, if any.
    pub fn dimensions(&self) -> usize {
        self.embeddings.first().map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_input_chars() {
        let request = EmbeddingRequest::new(vec!["ab".into(), "发行人情况".into(), "x".into()]);
        assert_eq!(request.max_input_chars(), 5);
        assert_eq!(EmbeddingRequest::new(vec![]).max_input_chars(), 0);
    }
}
