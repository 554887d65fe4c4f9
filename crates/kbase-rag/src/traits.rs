//! Backend seams for the retriever and orchestrator.
//!
//! The concrete store clients implement these in [`backends`]; tests plug
//! in-memory fakes.
//!
//! [`backends`]: crate::backends

use kbase_core::Result;
use kbase_postgres::model::{ChatMessage, NewChatMessage};

/// A hydrated segment ready for reranking and context assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct HydratedSegment {
    /// Segment identifier.
    pub seg_id: String,
    /// Owning document.
    pub doc_id: String,
    /// Document display name for source tags.
    pub doc_name: String,
    /// Segment body.
    pub content: String,
    /// Proximity caption, when present.
    pub caption: Option<String>,
    /// Proximity footnote, when present.
    pub footnote: Option<String>,
    /// 1-based page index.
    pub seg_page_idx: i32,
}

impl HydratedSegment {
    /// Text handed to the cross-encoder: caption plus body.
    pub fn rerank_text(&self) -> String {
        match self.caption.as_deref() {
            Some(caption) if !caption.is_empty() => format!("{caption}\n{}", self.content),
            _ => self.content.clone(),
        }
    }
}

/// Dense nearest-neighbor search over segment embeddings.
#[async_trait::async_trait]
pub trait DenseIndex: Send + Sync {
    /// Returns up to `k` `(seg_id, score)` pairs, best first, restricted
    /// to the allowed documents.
    async fn search_dense(
        &self,
        query_vector: Vec<f32>,
        k: usize,
        allowed_doc_ids: &[String],
    ) -> Result<Vec<(String, f32)>>;
}

/// BM25 search over segment text.
#[async_trait::async_trait]
pub trait LexicalIndex: Send + Sync {
    /// Returns up to `k` `(seg_id, score)` pairs, best first, restricted
    /// to the allowed documents.
    async fn search_lexical(
        &self,
        query_text: &str,
        k: usize,
        allowed_doc_ids: &[String],
    ) -> Result<Vec<(String, f32)>>;
}

/// Read access to the metadata store needed by retrieval.
#[async_trait::async_trait]
pub trait MetadataReader: Send + Sync {
    /// Returns the document ids a subject is authorized for.
    async fn authorized_doc_ids(&self, subject_id: &str) -> Result<Vec<String>>;

    /// Hydrates segments by id; ids deleted in a race are skipped.
    async fn hydrate_segments(&self, seg_ids: &[String]) -> Result<Vec<HydratedSegment>>;
}

/// Chat history persistence used by the orchestrator.
#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    /// Creates the session row if missing.
    async fn ensure_session(&self, session_id: &str) -> Result<()>;

    /// Appends one turn.
    async fn append_message(&self, message: NewChatMessage) -> Result<ChatMessage>;

    /// Loads recent prompt history, oldest-first, within a character
    /// budget.
    async fn load_recent_messages(
        &self,
        session_id: &str,
        max_chars: usize,
    ) -> Result<Vec<ChatMessage>>;
}
