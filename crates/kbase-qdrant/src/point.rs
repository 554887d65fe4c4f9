//! Segment point types and payload mapping.

use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{PointStruct, ScoredPoint};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{QdrantError, QdrantResult};

/// Namespace for deriving point ids from segment ids.
///
/// Fixed so that the same `seg_id` always maps to the same point id and
/// upserts stay idempotent across processes.
const POINT_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0x62, 0x61, 0x73, 0x65, 0x2d, 0x73, 0x65, 0x67, 0x6d, 0x65, 0x6e, 0x74, 0x2d, 0x76,
    0x31,
]);

/// Derives the deterministic point id for a segment.
pub fn segment_point_id(seg_id: &str) -> Uuid {
    Uuid::new_v5(&POINT_ID_NAMESPACE, seg_id.as_bytes())
}

/// A segment embedding with its scalar payload attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentPoint {
    /// Segment identifier; the logical primary key.
    pub seg_id: String,
    /// Owning document.
    pub doc_id: String,
    /// Segment type attribute ("text", "table", "page_summary").
    pub seg_type: String,
    /// 1-based page index attribute.
    pub seg_page_idx: i32,
    /// Dense embedding vector.
    pub vector: Vec<f32>,
}

impl SegmentPoint {
    /// Converts this segment into a Qdrant point.
    pub fn into_point(self) -> PointStruct {
        let mut payload = qdrant_client::Payload::new();
        payload.insert("seg_id", self.seg_id.clone());
        payload.insert("doc_id", self.doc_id);
        payload.insert("seg_type", self.seg_type);
        payload.insert("seg_page_idx", i64::from(self.seg_page_idx));

        PointStruct::new(
            segment_point_id(&self.seg_id).to_string(),
            self.vector,
            payload,
        )
    }
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSegment {
    /// Segment identifier extracted from the payload.
    pub seg_id: String,
    /// Cosine similarity; higher is better.
    pub score: f32,
}

impl TryFrom<ScoredPoint> for ScoredSegment {
    type Error = QdrantError;

    fn try_from(point: ScoredPoint) -> QdrantResult<Self> {
        let seg_id = point
            .payload
            .get("seg_id")
            .and_then(|value| match value.kind.as_ref() {
                Some(Kind::StringValue(s)) => Some(s.clone()),
                _ => None,
            })
            .ok_or_else(|| QdrantError::MalformedPayload {
                reason: "point is missing the seg_id attribute".to_owned(),
            })?;

        Ok(Self {
            seg_id,
            score: point.score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_is_deterministic() {
        let a = segment_point_id("doc-1-2-0-text");
        let b = segment_point_id("doc-1-2-0-text");
        let c = segment_point_id("doc-1-2-1-text");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
