//! Document model for the `doc_info` table.

use diesel::prelude::*;
use jiff_diesel::Timestamp;

use crate::schema::doc_info;
use crate::types::ProcessStatus;

/// A document registered with the knowledge base.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = doc_info)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Document {
    /// Globally unique, caller-provided document identifier.
    pub doc_id: String,
    /// Human-readable document name.
    pub doc_name: String,
    /// Original file extension (lowercase, without dot).
    pub doc_ext: String,
    /// Path or URL of the uploaded source.
    pub source_path: String,
    /// Directory receiving derived artifacts.
    pub output_dir: String,
    /// Converted PDF path, set after the convert stage.
    pub pdf_path: Option<String>,
    /// Structural extraction JSON path, set after the parse stage.
    pub json_path: Option<String>,
    /// Character span artifact path.
    pub spans_path: Option<String>,
    /// Layout artifact path.
    pub layout_path: Option<String>,
    /// Directory of extracted images.
    pub images_dir: Option<String>,
    /// Per-page merged content path, set after the merge stage.
    pub merged_path: Option<String>,
    /// Current pipeline status.
    pub process_status: ProcessStatus,
    /// Failure detail for documents in a failure state.
    pub error_message: Option<String>,
    /// Timestamp when the document was created.
    pub created_at: Timestamp,
    /// Timestamp when the document was last updated.
    pub updated_at: Timestamp,
}

/// Data for registering a new document.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = doc_info)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewDocument {
    /// Document identifier.
    pub doc_id: String,
    /// Document name.
    pub doc_name: String,
    /// File extension.
    pub doc_ext: String,
    /// Source path or URL.
    pub source_path: String,
    /// Output directory.
    pub output_dir: String,
}

/// Derived artifact paths recorded by pipeline stages.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = doc_info)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DocumentArtifacts {
    /// Converted PDF path.
    pub pdf_path: Option<String>,
    /// Structural extraction JSON path.
    pub json_path: Option<String>,
    /// Character span artifact path.
    pub spans_path: Option<String>,
    /// Layout artifact path.
    pub layout_path: Option<String>,
    /// Extracted images directory.
    pub images_dir: Option<String>,
    /// Per-page merged content path.
    pub merged_path: Option<String>,
}

impl Document {
    /// Returns whether the document finished processing successfully.
    pub fn is_complete(&self) -> bool {
        self.process_status.is_complete()
    }

    /// Returns whether the document ended in a failure state.
    pub fn is_failed(&self) -> bool {
        self.process_status.is_failure()
    }

    /// Returns whether the document is still moving through the pipeline.
    pub fn is_in_flight(&self) -> bool {
        self.process_status.is_in_flight()
    }
}
