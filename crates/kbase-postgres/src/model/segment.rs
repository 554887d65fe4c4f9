//! Segment model for the `segment_info` table.

use diesel::prelude::*;
use jiff_diesel::Timestamp;

use crate::schema::segment_info;
use crate::types::SegType;

/// A structurally coherent chunk of a document page; the retrieval unit.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = segment_info)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Segment {
    /// Deterministic segment identifier (`{doc_id}-{page}-{ordinal}-{type}`).
    pub seg_id: String,
    /// Owning document.
    pub doc_id: String,
    /// Segment body: raw text, table HTML, or an image caption marker.
    pub seg_content: String,
    /// Path to the extracted image for image segments.
    pub seg_image_path: Option<String>,
    /// Caption attached by proximity.
    pub seg_caption: Option<String>,
    /// Footnote attached by proximity.
    pub seg_footnote: Option<String>,
    /// Character length of `seg_content`.
    pub seg_len: i32,
    /// Structural kind.
    pub seg_type: SegType,
    /// 1-based page index.
    pub seg_page_idx: i32,
    /// Timestamp when the segment was created.
    pub created_at: Timestamp,
    /// Timestamp when the segment was last updated.
    pub updated_at: Timestamp,
}

/// Data for inserting a new segment.
#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = segment_info)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewSegment {
    /// Deterministic segment identifier.
    pub seg_id: String,
    /// Owning document.
    pub doc_id: String,
    /// Segment body.
    pub seg_content: String,
    /// Image path for image segments.
    pub seg_image_path: Option<String>,
    /// Proximity caption.
    pub seg_caption: Option<String>,
    /// Proximity footnote.
    pub seg_footnote: Option<String>,
    /// Character length of the body.
    pub seg_len: i32,
    /// Structural kind.
    pub seg_type: SegType,
    /// 1-based page index.
    pub seg_page_idx: i32,
}

impl Segment {
    /// Returns whether this segment belongs in the derived indexes.
    pub fn is_indexable(&self) -> bool {
        self.seg_type.is_indexable()
    }
}
