//! RAG chat orchestration: history, rewrite, retrieval, generation,
//! persistence.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use jiff::Timestamp;
use kbase_core::{Error, Result};
use kbase_inference::{GenerateRequest, InferenceService};
use kbase_postgres::model::NewChatMessage;
use kbase_postgres::types::{MessageMetadata, MessageMetadataV1, MessageRole, SourceRef};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::ChatConfig;
use crate::prompt::{REFUSAL_TEMPLATE, build_rag_messages, build_rewrite_messages};
use crate::retriever::{HybridRetriever, RetrievedSegment};
use crate::traits::ChatStore;
use crate::TRACING_TARGET_CHAT;

/// Number of per-session lock stripes.
const SESSION_LOCK_STRIPES: usize = 16;

/// A completed chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAnswer {
    /// Generated (or refusal) answer text.
    pub answer: String,
    /// Sources backing the answer, best first.
    pub sources: Vec<SourceRef>,
    /// Total model tokens consumed by generation.
    pub tokens_used: u32,
    /// End-to-end processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// RAG chat orchestrator.
#[derive(Clone)]
pub struct RagService {
    retriever: HybridRetriever,
    inference: InferenceService,
    chat_store: Arc<dyn ChatStore>,
    config: ChatConfig,
    session_locks: Arc<[Mutex<()>; SESSION_LOCK_STRIPES]>,
}

impl RagService {
    /// Creates the orchestrator.
    pub fn new(
        retriever: HybridRetriever,
        inference: InferenceService,
        chat_store: Arc<dyn ChatStore>,
        config: ChatConfig,
    ) -> Self {
        Self {
            retriever,
            inference,
            chat_store,
            config,
            session_locks: Arc::new(std::array::from_fn(|_| Mutex::new(()))),
        }
    }

    /// Answers one question within a session.
    ///
    /// Appends within one session serialize through a striped lock, so
    /// concurrent questions in the same session persist in submission
    /// order with each AI turn immediately after its human turn.
    pub async fn answer(
        &self,
        session_id: &str,
        subject_id: &str,
        query: &str,
    ) -> Result<ChatAnswer> {
        let started_at = Timestamp::now();

        let query = query.trim();
        if query.is_empty() {
            return Err(Error::invalid_input().with_message("query must not be empty"));
        }
        if query.chars().count() > self.config.query_max_chars {
            return Err(Error::overlong_input().with_message(format!(
                "query exceeds {} characters",
                self.config.query_max_chars
            )));
        }

        let _session_guard = self.session_locks[stripe_of(session_id)].lock().await;

        self.chat_store.ensure_session(session_id).await?;
        let history = self
            .chat_store
            .load_recent_messages(session_id, self.config.history_max_chars)
            .await?;

        // Follow-ups are rewritten into self-contained form; the first
        // turn goes through verbatim.
        let (retrieval_query, rewritten_query) = if history.is_empty() {
            (query.to_owned(), None)
        } else {
            match self.rewrite_query(&history, query).await {
                Ok(rewritten) => (rewritten.clone(), Some(rewritten)),
                Err(error) => {
                    tracing::warn!(
                        target: TRACING_TARGET_CHAT,
                        session_id = %session_id,
                        error = %error,
                        "Query rewrite failed, using the raw query"
                    );
                    (query.to_owned(), None)
                }
            }
        };

        let outcome = self
            .retriever
            .retrieve(&retrieval_query, subject_id, Some(self.config.deadline()))
            .await?;

        // Empty retrieval returns the fixed refusal without a generation
        // call; the model never sees an unsupported question.
        if outcome.results.is_empty() {
            tracing::info!(
                target: TRACING_TARGET_CHAT,
                session_id = %session_id,
                subject_id = %subject_id,
                reason = outcome.reason.unwrap_or("no-candidates"),
                "Retrieval empty, returning refusal"
            );

            let elapsed_ms = elapsed_ms_since(started_at);
            self.persist_turns(
                session_id,
                query,
                REFUSAL_TEMPLATE,
                &[],
                rewritten_query,
                0,
                0,
                elapsed_ms,
                None,
            )
            .await?;

            return Ok(ChatAnswer {
                answer: REFUSAL_TEMPLATE.to_owned(),
                sources: vec![],
                tokens_used: 0,
                processing_time_ms: elapsed_ms,
            });
        }

        let context =
            crate::prompt::build_context(&outcome.results, self.config.context_max_chars);
        let messages = build_rag_messages(&history, &context, query);

        let generation = self
            .inference
            .generate(&GenerateRequest::new(messages))
            .await;

        match generation {
            Ok(response) if !response.text.trim().is_empty() => {
                let elapsed_ms = elapsed_ms_since(started_at);
                let sources = source_refs(&outcome.results);
                self.persist_turns(
                    session_id,
                    query,
                    response.text.trim(),
                    &sources,
                    rewritten_query,
                    response.usage.prompt_tokens,
                    response.usage.completion_tokens,
                    elapsed_ms,
                    None,
                )
                .await?;

                Ok(ChatAnswer {
                    answer: response.text.trim().to_owned(),
                    sources,
                    tokens_used: response.usage.total(),
                    processing_time_ms: elapsed_ms,
                })
            }
            other => {
                let error_detail = match other {
                    Err(error) => error.to_string(),
                    Ok(_) => "model returned an empty answer".to_owned(),
                };
                tracing::error!(
                    target: TRACING_TARGET_CHAT,
                    session_id = %session_id,
                    error = %error_detail,
                    "Generation failed"
                );

                // Persist the failed turn excluded from history so a bad
                // answer never poisons later prompts.
                let elapsed_ms = elapsed_ms_since(started_at);
                self.persist_turns(
                    session_id,
                    query,
                    "",
                    &[],
                    rewritten_query,
                    0,
                    0,
                    elapsed_ms,
                    Some(error_detail.clone()),
                )
                .await?;

                Err(Error::external_error()
                    .with_message(format!("answer generation failed: {error_detail}")))
            }
        }
    }

    async fn rewrite_query(
        &self,
        history: &[kbase_postgres::model::ChatMessage],
        query: &str,
    ) -> Result<String> {
        let messages = build_rewrite_messages(history, query);
        let response = self
            .inference
            .generate(&GenerateRequest::new(messages))
            .await?;

        let rewritten = response.text.trim();
        if rewritten.is_empty() {
            return Err(Error::external_error().with_message("rewrite returned empty text"));
        }
        Ok(rewritten.to_owned())
    }

    /// Persists the human turn and its AI turn back to back.
    #[allow(clippy::too_many_arguments)]
    async fn persist_turns(
        &self,
        session_id: &str,
        query: &str,
        answer: &str,
        sources: &[SourceRef],
        rewritten_query: Option<String>,
        prompt_tokens: u32,
        completion_tokens: u32,
        elapsed_ms: u64,
        error: Option<String>,
    ) -> Result<()> {
        let failed = error.is_some();

        self.chat_store
            .append_message(NewChatMessage::new(session_id, MessageRole::Human, query))
            .await?;

        let metadata = MessageMetadata::v1(MessageMetadataV1 {
            sources: sources.to_vec(),
            rewritten_query,
            prompt_tokens,
            completion_tokens,
            elapsed_ms,
            error,
        });
        let metadata_value = metadata
            .to_value()
            .map_err(|e| Error::serialization().with_source(Box::new(e)))?;

        let mut ai_turn = NewChatMessage::new(session_id, MessageRole::Ai, answer)
            .with_metadata(metadata_value);
        if failed {
            ai_turn = ai_turn.excluded();
        }
        self.chat_store.append_message(ai_turn).await?;

        Ok(())
    }
}

fn stripe_of(session_id: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    session_id.hash(&mut hasher);
    (hasher.finish() as usize) % SESSION_LOCK_STRIPES
}

fn elapsed_ms_since(started_at: Timestamp) -> u64 {
    Timestamp::now()
        .duration_since(started_at)
        .as_millis()
        .max(0) as u64
}

fn source_refs(results: &[RetrievedSegment]) -> Vec<SourceRef> {
    results
        .iter()
        .map(|segment| SourceRef {
            doc_id: segment.doc_id.clone(),
            doc_name: segment.doc_name.clone(),
            seg_id: segment.seg_id.clone(),
            seg_page_idx: segment.seg_page_idx,
            rerank_score: segment.rerank_score,
            fused_score: segment.fused_score,
        })
        .collect()
}
