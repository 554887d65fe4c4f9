//! BM25 index operations over segment records.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermSetQuery};
use tantivy::schema::{
    Field, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing, TextOptions, Value,
};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument as Doc, Term, doc};

use crate::config::LexicalStoreConfig;
use crate::error::{LexicalError, LexicalResult};
use crate::{TRACING_TARGET_INDEX, TRACING_TARGET_SEARCH};

/// Tokenizer registered for segment content.
///
/// Jieba segments CJK runs and passes Latin tokens through, which covers
/// the mixed-script corpora this service ingests.
const CONTENT_TOKENIZER: &str = "jieba";

/// A segment to index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalRecord {
    /// Segment identifier; the document key.
    pub seg_id: String,
    /// Owning document.
    pub doc_id: String,
    /// Segment type attribute.
    pub seg_type: String,
    /// 1-based page index attribute.
    pub seg_page_idx: i32,
    /// Analyzed text body.
    pub content: String,
}

/// A ranked BM25 hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalHit {
    /// Segment identifier.
    pub seg_id: String,
    /// BM25 score; higher is better.
    pub score: f32,
}

struct IndexFields {
    seg_id: Field,
    doc_id: Field,
    seg_type: Field,
    seg_page_idx: Field,
    content: Field,
}

struct LexicalStoreInner {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: IndexFields,
}

/// Tantivy-backed lexical store keyed by `seg_id`.
#[derive(Clone)]
pub struct LexicalStore {
    inner: Arc<LexicalStoreInner>,
}

impl fmt::Debug for LexicalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LexicalStore").finish_non_exhaustive()
    }
}

fn build_schema() -> (Schema, IndexFields) {
    let mut builder = Schema::builder();

    let content_options = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(CONTENT_TOKENIZER)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored();

    let fields = IndexFields {
        seg_id: builder.add_text_field("seg_id", STRING | STORED),
        doc_id: builder.add_text_field("doc_id", STRING | STORED),
        seg_type: builder.add_text_field("seg_type", STRING | STORED),
        seg_page_idx: builder.add_u64_field("seg_page_idx", STORED),
        content: builder.add_text_field("content", content_options),
    };

    (builder.build(), fields)
}

impl LexicalStore {
    /// Opens or creates the index at the configured directory.
    pub fn open(config: &LexicalStoreConfig) -> LexicalResult<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.lexical_index_dir)?;

        let (schema, fields) = build_schema();
        let directory = MmapDirectory::open(&config.lexical_index_dir)?;
        let index = Index::open_or_create(directory, schema)?;
        index
            .tokenizers()
            .register(CONTENT_TOKENIZER, tantivy_jieba::JiebaTokenizer {});

        let writer = index.writer(config.lexical_writer_heap_bytes)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;

        tracing::info!(
            target: TRACING_TARGET_INDEX,
            index_dir = %config.lexical_index_dir.display(),
            "Opened lexical index"
        );

        Ok(Self {
            inner: Arc::new(LexicalStoreInner {
                index,
                reader,
                writer: Mutex::new(writer),
                fields,
            }),
        })
    }

    /// Opens a transient in-memory index, for tests.
    pub fn open_in_ram() -> LexicalResult<Self> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        index
            .tokenizers()
            .register(CONTENT_TOKENIZER, tantivy_jieba::JiebaTokenizer {});

        let writer = index.writer(16 * 1024 * 1024)?;
        let reader = index.reader()?;

        Ok(Self {
            inner: Arc::new(LexicalStoreInner {
                index,
                reader,
                writer: Mutex::new(writer),
                fields,
            }),
        })
    }

    /// Indexes a batch of segments; idempotent on `seg_id`.
    ///
    /// Each record is delete-then-add, so re-running the vectorize stage
    /// on the same document never duplicates entries. The batch is
    /// committed before returning, making it visible to readers.
    pub async fn index_segments(&self, records: Vec<LexicalRecord>) -> LexicalResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        let count = records.len();

        tokio::task::spawn_blocking(move || {
            let mut writer = inner
                .writer
                .lock()
                .map_err(|_| LexicalError::Task("writer lock poisoned".to_owned()))?;

            for record in records {
                let key = Term::from_field_text(inner.fields.seg_id, &record.seg_id);
                writer.delete_term(key);
                writer.add_document(doc!(
                    inner.fields.seg_id => record.seg_id,
                    inner.fields.doc_id => record.doc_id,
                    inner.fields.seg_type => record.seg_type,
                    inner.fields.seg_page_idx => record.seg_page_idx as u64,
                    inner.fields.content => record.content,
                ))?;
            }

            writer.commit()?;
            inner.reader.reload()?;
            Ok::<_, LexicalError>(())
        })
        .await
        .map_err(|e| LexicalError::Task(e.to_string()))??;

        tracing::debug!(
            target: TRACING_TARGET_INDEX,
            count,
            "Indexed segment batch"
        );

        Ok(())
    }

    /// Searches with BM25 scoring among the allowed documents.
    ///
    /// Returns up to `k` hits ordered by score descending. An empty
    /// `allowed_doc_ids` slice yields no hits.
    pub async fn search(
        &self,
        query_text: &str,
        k: usize,
        allowed_doc_ids: &[String],
    ) -> LexicalResult<Vec<LexicalHit>> {
        if allowed_doc_ids.is_empty() || query_text.trim().is_empty() {
            return Ok(vec![]);
        }

        let inner = Arc::clone(&self.inner);
        let query_text = query_text.to_owned();
        let allowed: Vec<String> = allowed_doc_ids.to_vec();

        let hits = tokio::task::spawn_blocking(move || {
            let searcher = inner.reader.searcher();

            let parser = QueryParser::for_index(&inner.index, vec![inner.fields.content]);
            // Lenient parsing: user queries are raw natural language and may
            // contain characters the query grammar reserves.
            let (text_query, _errors) = parser.parse_query_lenient(&query_text);

            let doc_terms: Vec<Term> = allowed
                .iter()
                .map(|doc_id| Term::from_field_text(inner.fields.doc_id, doc_id))
                .collect();
            let doc_filter = TermSetQuery::new(doc_terms);

            let query = BooleanQuery::new(vec![
                (Occur::Must, text_query),
                (Occur::Must, Box::new(doc_filter) as Box<dyn Query>),
            ]);

            let top_docs = searcher.search(&query, &TopDocs::with_limit(k))?;

            let mut hits = Vec::with_capacity(top_docs.len());
            for (score, address) in top_docs {
                let stored: Doc = searcher.doc(address)?;
                let seg_id = stored
                    .get_first(inner.fields.seg_id)
                    .and_then(|value| value.as_str())
                    .ok_or_else(|| {
                        LexicalError::Task("indexed document missing seg_id".to_owned())
                    })?;
                hits.push(LexicalHit {
                    seg_id: seg_id.to_owned(),
                    score,
                });
            }

            Ok::<_, LexicalError>(hits)
        })
        .await
        .map_err(|e| LexicalError::Task(e.to_string()))??;

        tracing::debug!(
            target: TRACING_TARGET_SEARCH,
            hits = hits.len(),
            "Lexical search complete"
        );

        Ok(hits)
    }

    /// Removes every entry belonging to a document and commits.
    pub async fn delete_by_doc(&self, doc_id: &str) -> LexicalResult<()> {
        let inner = Arc::clone(&self.inner);
        let doc_id = doc_id.to_owned();

        tokio::task::spawn_blocking(move || {
            let mut writer = inner
                .writer
                .lock()
                .map_err(|_| LexicalError::Task("writer lock poisoned".to_owned()))?;
            writer.delete_term(Term::from_field_text(inner.fields.doc_id, &doc_id));
            writer.commit()?;
            inner.reader.reload()?;
            Ok::<_, LexicalError>(())
        })
        .await
        .map_err(|e| LexicalError::Task(e.to_string()))??;

        Ok(())
    }

    /// Removes specific segments, used when rolling back a partial index.
    pub async fn delete_by_seg_ids(&self, seg_ids: &[String]) -> LexicalResult<()> {
        if seg_ids.is_empty() {
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        let seg_ids: Vec<String> = seg_ids.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut writer = inner
                .writer
                .lock()
                .map_err(|_| LexicalError::Task("writer lock poisoned".to_owned()))?;
            for seg_id in &seg_ids {
                writer.delete_term(Term::from_field_text(inner.fields.seg_id, seg_id));
            }
            writer.commit()?;
            inner.reader.reload()?;
            Ok::<_, LexicalError>(())
        })
        .await
        .map_err(|e| LexicalError::Task(e.to_string()))??;

        Ok(())
    }

    /// Counts indexed segments, for consistency checks.
    pub fn num_docs(&self) -> u64 {
        self.inner.reader.searcher().num_docs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(seg_id: &str, doc_id: &str, content: &str) -> LexicalRecord {
        LexicalRecord {
            seg_id: seg_id.to_owned(),
            doc_id: doc_id.to_owned(),
            seg_type: "text".to_owned(),
            seg_page_idx: 1,
            content: content.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_index_and_search() {
        let store = LexicalStore::open_in_ram().unwrap();
        store
            .index_segments(vec![
                record("d1-1-0-text", "d1", "quarterly revenue grew by twelve percent"),
                record("d2-1-0-text", "d2", "the service manual covers installation"),
            ])
            .await
            .unwrap();

        let hits = store
            .search("revenue", 10, &["d1".to_owned(), "d2".to_owned()])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].seg_id, "d1-1-0-text");
        assert!(hits[0].score > 0.0);
    }

    #[tokio::test]
    async fn test_doc_filter_restricts_results() {
        let store = LexicalStore::open_in_ram().unwrap();
        store
            .index_segments(vec![
                record("d1-1-0-text", "d1", "shared keyword appears here"),
                record("d2-1-0-text", "d2", "shared keyword appears here too"),
            ])
            .await
            .unwrap();

        let hits = store
            .search("shared keyword", 10, &["d2".to_owned()])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].seg_id, "d2-1-0-text");

        // Empty permission set yields nothing, never everything.
        let hits = store.search("shared keyword", 10, &[]).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_reindex_is_idempotent() {
        let store = LexicalStore::open_in_ram().unwrap();
        let batch = vec![record("d1-1-0-text", "d1", "idempotent indexing test")];

        store.index_segments(batch.clone()).await.unwrap();
        store.index_segments(batch).await.unwrap();

        assert_eq!(store.num_docs(), 1);
    }

    #[tokio::test]
    async fn test_cjk_content_is_searchable() {
        let store = LexicalStore::open_in_ram().unwrap();
        store
            .index_segments(vec![record(
                "d1-1-0-text",
                "d1",
                "发行人主要从事软件开发业务 mixed with English terms",
            )])
            .await
            .unwrap();

        let hits = store.search("发行人", 10, &["d1".to_owned()]).await.unwrap();
        assert_eq!(hits.len(), 1);

        let hits = store.search("English", 10, &["d1".to_owned()]).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = LexicalStoreConfig::new(dir.path());

        {
            let store = LexicalStore::open(&config).unwrap();
            store
                .index_segments(vec![record("d1-1-0-text", "d1", "durable content on disk")])
                .await
                .unwrap();
        }

        let reopened = LexicalStore::open(&config).unwrap();
        let hits = reopened
            .search("durable", 10, &["d1".to_owned()])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_doc() {
        let store = LexicalStore::open_in_ram().unwrap();
        store
            .index_segments(vec![
                record("d1-1-0-text", "d1", "first document body"),
                record("d1-1-1-text", "d1", "first document continued"),
                record("d2-1-0-text", "d2", "second document body"),
            ])
            .await
            .unwrap();

        store.delete_by_doc("d1").await.unwrap();

        let hits = store
            .search("document", 10, &["d1".to_owned(), "d2".to_owned()])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].seg_id, "d2-1-0-text");
    }
}
