//! Hybrid dense + lexical retrieval with reranking.

use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use kbase_core::Result;
use kbase_inference::{EmbeddingRequest, InferenceService, RerankRequest};
use serde::{Deserialize, Serialize};

use crate::config::RetrievalConfig;
use crate::fusion::{detect_cliff, fuse_scores};
use crate::traits::{DenseIndex, LexicalIndex, MetadataReader};
use crate::TRACING_TARGET_RETRIEVER;

/// Reason attached to an empty outcome when the subject has no documents.
pub const REASON_NO_PERMITTED_DOCUMENTS: &str = "no-permitted-documents";

/// A final retrieval result entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedSegment {
    /// Owning document.
    pub doc_id: String,
    /// Document display name.
    pub doc_name: String,
    /// Segment identifier.
    pub seg_id: String,
    /// 1-based page index.
    pub seg_page_idx: i32,
    /// Cross-encoder score.
    pub rerank_score: f32,
    /// Convex fused score before reranking.
    pub fused_score: f32,
    /// Segment body.
    pub content: String,
}

/// Outcome of one retrieval, with its empty-reason and partiality flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalOutcome {
    /// Ranked results, best first.
    pub results: Vec<RetrievedSegment>,
    /// Why the outcome is empty, when a structured reason exists.
    pub reason: Option<&'static str>,
    /// Set when a sub-search was cut short by the deadline.
    pub partial: bool,
}

impl RetrievalOutcome {
    fn empty_with_reason(reason: &'static str) -> Self {
        Self {
            reason: Some(reason),
            ..Self::default()
        }
    }
}

/// Hybrid retriever over the dense index, the lexical index, and the
/// metadata store.
#[derive(Clone)]
pub struct HybridRetriever {
    dense: Arc<dyn DenseIndex>,
    lexical: Arc<dyn LexicalIndex>,
    metadata: Arc<dyn MetadataReader>,
    inference: InferenceService,
    config: RetrievalConfig,
}

impl HybridRetriever {
    /// Creates a retriever; fails when the funnel configuration is
    /// inconsistent.
    pub fn new(
        dense: Arc<dyn DenseIndex>,
        lexical: Arc<dyn LexicalIndex>,
        metadata: Arc<dyn MetadataReader>,
        inference: InferenceService,
        config: RetrievalConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            dense,
            lexical,
            metadata,
            inference,
            config,
        })
    }

    /// Retrieves the best segments for a query under a permission filter.
    ///
    /// `remaining` is the caller's deadline budget; each sub-search gets
    /// half of it, and an expired sub-search degrades the outcome to
    /// partial instead of failing it.
    pub async fn retrieve(
        &self,
        query: &str,
        subject_id: &str,
        remaining: Option<Duration>,
    ) -> Result<RetrievalOutcome> {
        let started_at = Timestamp::now();

        // Permission gate: an empty allowed set never falls through to
        // the backends.
        let allowed = self.metadata.authorized_doc_ids(subject_id).await?;
        if allowed.is_empty() {
            tracing::info!(
                target: TRACING_TARGET_RETRIEVER,
                subject_id = %subject_id,
                reason = REASON_NO_PERMITTED_DOCUMENTS,
                "Subject has no permitted documents"
            );
            return Ok(RetrievalOutcome::empty_with_reason(
                REASON_NO_PERMITTED_DOCUMENTS,
            ));
        }

        let embedding = self
            .inference
            .embed(&EmbeddingRequest::from_text(query))
            .await?;
        let query_vector = embedding
            .embeddings
            .into_iter()
            .next()
            .unwrap_or_default();

        // Both searches run concurrently under half the remaining budget
        // each; a timed-out side contributes nothing and flags the
        // outcome partial.
        let sub_budget = remaining.map(|d| d / 2);
        let candidate_k = self.config.candidate_k;

        let dense_fut = bounded(sub_budget, async {
            self.dense
                .search_dense(query_vector, candidate_k, &allowed)
                .await
        });
        let lexical_fut = bounded(sub_budget, async {
            self.lexical
                .search_lexical(query, candidate_k, &allowed)
                .await
        });
        let (dense_out, lexical_out) = tokio::join!(dense_fut, lexical_fut);

        let mut partial = false;
        let dense_hits = match dense_out {
            Some(result) => result?,
            None => {
                partial = true;
                vec![]
            }
        };
        let lexical_hits = match lexical_out {
            Some(result) => result?,
            None => {
                partial = true;
                vec![]
            }
        };

        let fused = fuse_scores(&dense_hits, &lexical_hits, self.config.alpha);
        if fused.is_empty() {
            tracing::info!(
                target: TRACING_TARGET_RETRIEVER,
                subject_id = %subject_id,
                partial,
                "Hybrid search returned no candidates"
            );
            return Ok(RetrievalOutcome {
                partial,
                ..RetrievalOutcome::default()
            });
        }

        let shortlist: Vec<_> = fused.into_iter().take(self.config.rerank_k).collect();
        let seg_ids: Vec<String> = shortlist.iter().map(|c| c.seg_id.clone()).collect();

        // Hydration drops ids deleted in a race with retrieval.
        let hydrated = self.metadata.hydrate_segments(&seg_ids).await?;
        let ordered: Vec<_> = seg_ids
            .iter()
            .filter_map(|seg_id| hydrated.iter().find(|h| &h.seg_id == seg_id))
            .collect();
        if ordered.is_empty() {
            return Ok(RetrievalOutcome {
                partial,
                ..RetrievalOutcome::default()
            });
        }

        let rerank = self
            .inference
            .rerank(&RerankRequest::new(
                query,
                ordered.iter().map(|h| h.rerank_text()).collect(),
            ))
            .await?;

        let fused_by_id: std::collections::HashMap<&str, f32> = shortlist
            .iter()
            .map(|c| (c.seg_id.as_str(), c.fused_score))
            .collect();

        let mut scored: Vec<(usize, f32)> = rerank
            .scores
            .iter()
            .copied()
            .enumerate()
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        // Trim the tail behind the steepest score drop, then apply top_k.
        let sorted_scores: Vec<f32> = scored.iter().map(|(_, s)| *s).collect();
        let keep = detect_cliff(&sorted_scores, self.config.top_k);

        let results: Vec<RetrievedSegment> = scored
            .into_iter()
            .take(keep)
            .map(|(idx, rerank_score)| {
                let hydrated = ordered[idx];
                RetrievedSegment {
                    doc_id: hydrated.doc_id.clone(),
                    doc_name: hydrated.doc_name.clone(),
                    seg_id: hydrated.seg_id.clone(),
                    seg_page_idx: hydrated.seg_page_idx,
                    rerank_score,
                    fused_score: fused_by_id
                        .get(hydrated.seg_id.as_str())
                        .copied()
                        .unwrap_or(0.0),
                    content: hydrated.content.clone(),
                }
            })
            .collect();

        let elapsed = Timestamp::now().duration_since(started_at);
        tracing::info!(
            target: TRACING_TARGET_RETRIEVER,
            subject_id = %subject_id,
            dense_hits = dense_hits.len(),
            lexical_hits = lexical_hits.len(),
            results = results.len(),
            partial,
            elapsed_ms = elapsed.as_millis(),
            "Hybrid retrieval complete"
        );

        Ok(RetrievalOutcome {
            results,
            reason: None,
            partial,
        })
    }
}

/// Runs a future under an optional timeout; `None` on expiry.
async fn bounded<F, T>(budget: Option<Duration>, future: F) -> Option<T>
where
    F: std::future::Future<Output = T>,
{
    match budget {
        Some(budget) => tokio::time::timeout(budget, future).await.ok(),
        None => Some(future.await),
    }
}
