//! Versioned chat message metadata.
//!
//! Message metadata is stored as a JSONB blob but always validated through
//! this tagged, versioned schema on both write and read, so ad-hoc shapes
//! never reach the database.

#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{PgError, PgResult};

/// A retrieval source attached to an assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct SourceRef {
    /// Document the segment belongs to.
    pub doc_id: String,
    /// Display name of the document.
    pub doc_name: String,
    /// Segment identifier.
    pub seg_id: String,
    /// 1-based page index of the segment.
    pub seg_page_idx: i32,
    /// Cross-encoder score after reranking.
    pub rerank_score: f32,
    /// Convex fused dense+lexical score before reranking.
    pub fused_score: f32,
}

/// Versioned metadata envelope for chat messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(tag = "version")]
pub enum MessageMetadata {
    /// Initial metadata schema.
    #[serde(rename = "v1")]
    V1(MessageMetadataV1),
}

/// Metadata recorded with each persisted turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct MessageMetadataV1 {
    /// Sources backing an assistant answer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceRef>,
    /// Self-contained rewrite of the user query, when one was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewritten_query: Option<String>,
    /// Prompt tokens consumed by generation.
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Completion tokens produced by generation.
    #[serde(default)]
    pub completion_tokens: u32,
    /// End-to-end processing time in milliseconds.
    #[serde(default)]
    pub elapsed_ms: u64,
    /// Error description when the turn failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MessageMetadata {
    /// Wraps v1 metadata in the versioned envelope.
    pub fn v1(metadata: MessageMetadataV1) -> Self {
        MessageMetadata::V1(metadata)
    }

    /// Serializes the metadata for storage, validating the schema.
    pub fn to_value(&self) -> PgResult<serde_json::Value> {
        serde_json::to_value(self)
            .map_err(|e| PgError::Unexpected(format!("invalid message metadata: {e}").into()))
    }

    /// Deserializes stored metadata, rejecting unknown versions.
    pub fn from_value(value: &serde_json::Value) -> PgResult<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| PgError::Unexpected(format!("corrupt message metadata: {e}").into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let metadata = MessageMetadata::v1(MessageMetadataV1 {
            sources: vec![SourceRef {
                doc_id: "doc-1".into(),
                doc_name: "handbook.pdf".into(),
                seg_id: "doc-1-2-0-text".into(),
                seg_page_idx: 2,
                rerank_score: 0.92,
                fused_score: 0.71,
            }],
            rewritten_query: Some("what is the refund policy".into()),
            prompt_tokens: 812,
            completion_tokens: 96,
            elapsed_ms: 1450,
            error: None,
        });

        let value = metadata.to_value().unwrap();
        assert_eq!(value["version"], "v1");
        let restored = MessageMetadata::from_value(&value).unwrap();
        assert_eq!(restored, metadata);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let value = serde_json::json!({"version": "v9", "sources": []});
        assert!(MessageMetadata::from_value(&value).is_err());
    }
}
