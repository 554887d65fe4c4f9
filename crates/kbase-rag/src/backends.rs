//! Concrete store clients behind the retrieval seams.

use kbase_core::{Error, Result};
use kbase_lexical::LexicalStore;
use kbase_postgres::PgClient;
use kbase_postgres::model::{ChatMessage, NewChatMessage};
use kbase_postgres::query::{ChatRepository, PermissionRepository, SegmentRepository};
use kbase_qdrant::VectorStore;

use crate::traits::{ChatStore, DenseIndex, HydratedSegment, LexicalIndex, MetadataReader};

#[async_trait::async_trait]
impl DenseIndex for VectorStore {
    async fn search_dense(
        &self,
        query_vector: Vec<f32>,
        k: usize,
        allowed_doc_ids: &[String],
    ) -> Result<Vec<(String, f32)>> {
        let hits = self
            .search(query_vector, k as u64, allowed_doc_ids)
            .await
            .map_err(Error::from)?;
        Ok(hits.into_iter().map(|hit| (hit.seg_id, hit.score)).collect())
    }
}

#[async_trait::async_trait]
impl LexicalIndex for LexicalStore {
    async fn search_lexical(
        &self,
        query_text: &str,
        k: usize,
        allowed_doc_ids: &[String],
    ) -> Result<Vec<(String, f32)>> {
        let hits = self
            .search(query_text, k, allowed_doc_ids)
            .await
            .map_err(Error::from)?;
        Ok(hits.into_iter().map(|hit| (hit.seg_id, hit.score)).collect())
    }
}

#[async_trait::async_trait]
impl MetadataReader for PgClient {
    async fn authorized_doc_ids(&self, subject_id: &str) -> Result<Vec<String>> {
        let mut conn = self.get_connection().await.map_err(Error::from)?;
        conn.authorized_doc_ids(subject_id).await.map_err(Error::from)
    }

    async fn hydrate_segments(&self, seg_ids: &[String]) -> Result<Vec<HydratedSegment>> {
        let mut conn = self.get_connection().await.map_err(Error::from)?;
        let rows = conn
            .find_segments_with_doc_names(seg_ids)
            .await
            .map_err(Error::from)?;

        Ok(rows
            .into_iter()
            .map(|(segment, doc_name)| HydratedSegment {
                seg_id: segment.seg_id,
                doc_id: segment.doc_id,
                doc_name,
                content: segment.seg_content,
                caption: segment.seg_caption,
                footnote: segment.seg_footnote,
                seg_page_idx: segment.seg_page_idx,
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl ChatStore for PgClient {
    async fn ensure_session(&self, session_id: &str) -> Result<()> {
        let mut conn = self.get_connection().await.map_err(Error::from)?;
        conn.ensure_session(session_id).await.map_err(Error::from)
    }

    async fn append_message(&self, message: NewChatMessage) -> Result<ChatMessage> {
        let mut conn = self.get_connection().await.map_err(Error::from)?;
        conn.append_message(message).await.map_err(Error::from)
    }

    async fn load_recent_messages(
        &self,
        session_id: &str,
        max_chars: usize,
    ) -> Result<Vec<ChatMessage>> {
        let mut conn = self.get_connection().await.map_err(Error::from)?;
        conn.load_recent_messages(session_id, max_chars)
            .await
            .map_err(Error::from)
    }
}
