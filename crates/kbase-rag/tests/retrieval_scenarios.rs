//! End-to-end retrieval and chat scenarios over in-memory backends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use kbase_inference::{
    EmbeddingRequest, EmbeddingResponse, GenerateRequest, GenerateResponse, InferenceConfig,
    InferenceProvider, InferenceService, RerankRequest, RerankResponse, TokenUsage,
};
use kbase_core::{Result, ServiceHealth};
use kbase_postgres::model::{ChatMessage, NewChatMessage};
use kbase_postgres::types::{MessageMetadata, MessageRole};
use kbase_rag::{
    ChatConfig, ChatStore, DenseIndex, HybridRetriever, HydratedSegment, LexicalIndex,
    MetadataReader, RagService, RetrievalConfig, prompt,
};

/// One seeded segment visible to the fake backends.
#[derive(Clone)]
struct SeededSegment {
    seg_id: String,
    doc_id: String,
    doc_name: String,
    content: String,
    dense_score: f32,
    lexical_score: f32,
}

/// Shared fake over the vector, lexical, and metadata backends.
#[derive(Clone, Default)]
struct FakeBackends {
    segments: Vec<SeededSegment>,
    permissions: HashMap<String, Vec<String>>,
}

impl FakeBackends {
    fn seed(mut self, segment: SeededSegment) -> Self {
        self.segments.push(segment);
        self
    }

    fn grant(mut self, subject: &str, doc_ids: &[&str]) -> Self {
        self.permissions.insert(
            subject.to_owned(),
            doc_ids.iter().map(|d| (*d).to_owned()).collect(),
        );
        self
    }
}

#[async_trait::async_trait]
impl DenseIndex for FakeBackends {
    async fn search_dense(
        &self,
        _query_vector: Vec<f32>,
        k: usize,
        allowed: &[String],
    ) -> Result<Vec<(String, f32)>> {
        let mut hits: Vec<_> = self
            .segments
            .iter()
            .filter(|s| allowed.contains(&s.doc_id) && s.dense_score > 0.0)
            .map(|s| (s.seg_id.clone(), s.dense_score))
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        hits.truncate(k);
        Ok(hits)
    }
}

#[async_trait::async_trait]
impl LexicalIndex for FakeBackends {
    async fn search_lexical(
        &self,
        _query: &str,
        k: usize,
        allowed: &[String],
    ) -> Result<Vec<(String, f32)>> {
        let mut hits: Vec<_> = self
            .segments
            .iter()
            .filter(|s| allowed.contains(&s.doc_id) && s.lexical_score > 0.0)
            .map(|s| (s.seg_id.clone(), s.lexical_score))
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        hits.truncate(k);
        Ok(hits)
    }
}

#[async_trait::async_trait]
impl MetadataReader for FakeBackends {
    async fn authorized_doc_ids(&self, subject_id: &str) -> Result<Vec<String>> {
        Ok(self.permissions.get(subject_id).cloned().unwrap_or_default())
    }

    async fn hydrate_segments(&self, seg_ids: &[String]) -> Result<Vec<HydratedSegment>> {
        Ok(self
            .segments
            .iter()
            .filter(|s| seg_ids.contains(&s.seg_id))
            .map(|s| HydratedSegment {
                seg_id: s.seg_id.clone(),
                doc_id: s.doc_id.clone(),
                doc_name: s.doc_name.clone(),
                content: s.content.clone(),
                caption: None,
                footnote: None,
                seg_page_idx: 1,
            })
            .collect())
    }
}

/// Inference fake: identity embeddings, content-length reranking, canned
/// generation, and a generation call counter.
#[derive(Default)]
struct FakeInference {
    generate_calls: Arc<AtomicU32>,
}

#[async_trait::async_trait]
impl InferenceProvider for FakeInference {
    async fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse> {
        Ok(EmbeddingResponse::new(
            request.request_id,
            vec![vec![0.1; 4]; request.len()],
        ))
    }

    async fn rerank(&self, request: &RerankRequest) -> Result<RerankResponse> {
        // Longer passages score higher; deterministic and order-sensitive.
        let scores = request
            .documents
            .iter()
            .map(|d| d.len() as f32 / 100.0)
            .collect();
        Ok(RerankResponse::new(request.request_id, scores))
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(GenerateResponse::new(
            request.request_id,
            "Grounded answer based on the provided references.",
            TokenUsage {
                prompt_tokens: 200,
                completion_tokens: 40,
            },
        ))
    }

    fn embedding_dimensions(&self) -> u64 {
        4
    }

    async fn health_check(&self) -> Result<ServiceHealth> {
        Ok(ServiceHealth::healthy())
    }
}

/// In-memory chat store preserving append order.
#[derive(Default)]
struct FakeChatStore {
    messages: Mutex<Vec<ChatMessage>>,
    next_id: AtomicI64,
}

impl FakeChatStore {
    fn stored(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChatStore for FakeChatStore {
    async fn ensure_session(&self, _session_id: &str) -> Result<()> {
        Ok(())
    }

    async fn append_message(&self, message: NewChatMessage) -> Result<ChatMessage> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let row = ChatMessage {
            id,
            session_id: message.session_id,
            message_type: message.message_type,
            content: message.content,
            metadata: message.metadata,
            excluded_from_history: message.excluded_from_history,
            created_at: jiff_diesel::Timestamp::from(jiff::Timestamp::now()),
        };
        self.messages.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn load_recent_messages(
        &self,
        session_id: &str,
        max_chars: usize,
    ) -> Result<Vec<ChatMessage>> {
        let messages = self.messages.lock().unwrap();
        let mut recent: Vec<ChatMessage> = messages
            .iter()
            .rev()
            .filter(|m| m.session_id == session_id && !m.excluded_from_history)
            .scan(0usize, |budget, m| {
                if *budget > max_chars {
                    return None;
                }
                *budget += m.content.chars().count();
                Some(m.clone())
            })
            .collect();
        recent.reverse();
        Ok(recent)
    }
}

fn seeded_backends() -> FakeBackends {
    FakeBackends::default()
        .seed(SeededSegment {
            seg_id: "d1-1-0-text".into(),
            doc_id: "d1".into(),
            doc_name: "quality-handbook.pdf".into(),
            content: "The shared keyword appears in the quality handbook with detail.".into(),
            dense_score: 0.9,
            lexical_score: 3.1,
        })
        .seed(SeededSegment {
            seg_id: "d2-1-0-text".into(),
            doc_id: "d2".into(),
            doc_name: "ops-manual.pdf".into(),
            content: "The shared keyword also appears in the operations manual text body."
                .into(),
            dense_score: 0.8,
            lexical_score: 2.9,
        })
        .grant("s1", &["d1"])
        .grant("s2", &["d2"])
}

fn service_parts(
    backends: FakeBackends,
) -> (RagService, Arc<FakeChatStore>, Arc<AtomicU32>) {
    let provider = FakeInference::default();
    let generate_calls = Arc::clone(&provider.generate_calls);
    let inference = InferenceService::new(provider, InferenceConfig::default());

    let shared = Arc::new(backends);
    let retriever = HybridRetriever::new(
        shared.clone(),
        shared.clone(),
        shared,
        inference.clone(),
        RetrievalConfig {
            candidate_k: 10,
            rerank_k: 5,
            top_k: 3,
            ..RetrievalConfig::default()
        },
    )
    .unwrap();

    let chat_store = Arc::new(FakeChatStore::default());
    let service = RagService::new(
        retriever,
        inference,
        chat_store.clone(),
        ChatConfig::default(),
    );

    (service, chat_store, generate_calls)
}

#[tokio::test]
async fn test_permission_filtering_partitions_results() {
    let (service, _, _) = service_parts(seeded_backends());

    let for_s1 = service.answer("sess-a", "s1", "shared keyword").await.unwrap();
    assert!(for_s1.sources.iter().all(|s| s.doc_id == "d1"));
    assert!(!for_s1.sources.is_empty());

    let for_s2 = service.answer("sess-b", "s2", "shared keyword").await.unwrap();
    assert!(for_s2.sources.iter().all(|s| s.doc_id == "d2"));
    assert!(!for_s2.sources.is_empty());
}

#[tokio::test]
async fn test_no_permitted_documents_refuses_without_generation() {
    let (service, chat_store, generate_calls) = service_parts(seeded_backends());

    let answer = service
        .answer("sess-c", "unknown-subject", "shared keyword")
        .await
        .unwrap();

    assert_eq!(answer.answer, prompt::REFUSAL_TEMPLATE);
    assert!(answer.sources.is_empty());
    assert_eq!(answer.tokens_used, 0);
    // The model was never invoked for the refusal.
    assert_eq!(generate_calls.load(Ordering::SeqCst), 0);

    // Both turns are still persisted.
    let stored = chat_store.stored();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].message_type, MessageRole::Human);
    assert_eq!(stored[1].message_type, MessageRole::Ai);
    assert_eq!(stored[1].content, prompt::REFUSAL_TEMPLATE);
}

#[tokio::test]
async fn test_answer_persists_turns_with_metadata() {
    let (service, chat_store, generate_calls) = service_parts(seeded_backends());

    let answer = service.answer("sess-d", "s1", "shared keyword").await.unwrap();
    assert_eq!(generate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(answer.tokens_used, 240);

    let stored = chat_store.stored();
    assert_eq!(stored.len(), 2);

    let metadata = stored[1].metadata.as_ref().expect("ai turn metadata");
    let metadata = MessageMetadata::from_value(metadata).unwrap();
    let MessageMetadata::V1(v1) = metadata;
    assert_eq!(v1.prompt_tokens, 200);
    assert_eq!(v1.completion_tokens, 40);
    assert!(!v1.sources.is_empty());
    assert!(v1.sources.iter().all(|s| s.doc_id == "d1"));
}

#[tokio::test]
async fn test_overlong_query_fails_fast() {
    let (service, chat_store, generate_calls) = service_parts(seeded_backends());

    let long_query = "x".repeat(2001);
    let error = service
        .answer("sess-e", "s1", &long_query)
        .await
        .unwrap_err();

    assert_eq!(error.kind, kbase_core::ErrorKind::OverlongInput);
    assert_eq!(generate_calls.load(Ordering::SeqCst), 0);
    assert!(chat_store.stored().is_empty());
}

#[tokio::test]
async fn test_concurrent_turns_in_one_session_do_not_interleave() {
    let (service, chat_store, _) = service_parts(seeded_backends());
    let service = Arc::new(service);

    let mut handles = Vec::new();
    for i in 0..3 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .answer("sess-f", "s1", &format!("shared keyword question {i}"))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stored = chat_store.stored();
    assert_eq!(stored.len(), 6);
    // Each AI turn sits immediately after its human turn.
    for pair in stored.chunks(2) {
        assert_eq!(pair[0].message_type, MessageRole::Human);
        assert_eq!(pair[1].message_type, MessageRole::Ai);
    }
}

/// Generation failure path: the AI turn persists excluded from history.
#[tokio::test]
async fn test_failed_generation_is_excluded_from_history() {
    struct FailingGeneration;

    #[async_trait::async_trait]
    impl InferenceProvider for FailingGeneration {
        async fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse> {
            Ok(EmbeddingResponse::new(
                request.request_id,
                vec![vec![0.1; 4]; request.len()],
            ))
        }

        async fn rerank(&self, request: &RerankRequest) -> Result<RerankResponse> {
            Ok(RerankResponse::new(
                request.request_id,
                vec![0.9; request.len()],
            ))
        }

        async fn generate(&self, _request: &GenerateRequest) -> Result<GenerateResponse> {
            Err(kbase_core::Error::external_error().with_message("model runtime exploded"))
        }

        fn embedding_dimensions(&self) -> u64 {
            4
        }

        async fn health_check(&self) -> Result<ServiceHealth> {
            Ok(ServiceHealth::healthy())
        }
    }

    let inference = InferenceService::new(FailingGeneration, InferenceConfig::default());
    let shared = Arc::new(seeded_backends());
    let retriever = HybridRetriever::new(
        shared.clone(),
        shared.clone(),
        shared,
        inference.clone(),
        RetrievalConfig {
            candidate_k: 10,
            rerank_k: 5,
            top_k: 3,
            ..RetrievalConfig::default()
        },
    )
    .unwrap();

    let chat_store = Arc::new(FakeChatStore::default());
    let service = RagService::new(
        retriever,
        inference,
        chat_store.clone(),
        ChatConfig::default(),
    );

    let error = service.answer("sess-g", "s1", "shared keyword").await.unwrap_err();
    assert_eq!(error.kind, kbase_core::ErrorKind::ExternalError);

    let stored = chat_store.stored();
    assert_eq!(stored.len(), 2);
    assert!(stored[1].excluded_from_history);

    // The poisoned turn never reaches later prompt history.
    let history = chat_store.load_recent_messages("sess-g", 10_000).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message_type, MessageRole::Human);
}
