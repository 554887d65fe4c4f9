//! Stage scheduler and stage bodies.
//!
//! The scheduler owns every `process_status` mutation and every milestone
//! notification; stage bodies only produce artifacts and side effects in
//! the derived stores. Errors never escape `process_document`: each one
//! becomes a stage-failure transition plus a milestone callback.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use kbase_core::{Error, Result};
use kbase_inference::{EmbeddingRequest, InferenceService};
use kbase_lexical::{LexicalRecord, LexicalStore};
use kbase_postgres::model::{Document, DocumentArtifacts, NewDocPage};
use kbase_postgres::query::{DocPageRepository, DocumentRepository, SegmentRepository};
use kbase_postgres::types::ProcessStatus;
use kbase_postgres::{PgClient, PgError};
use kbase_qdrant::{SegmentPoint, VectorStore};
use kbase_webhook::{StatusSyncHandle, StatusUpdate};
use tokio::sync::Semaphore;
use url::Url;

use crate::chunker::{ChunkerConfig, chunk_pages};
use crate::config::PipelineConfig;
use crate::external::{DocumentConverter, ParsedBlock, StructureParser};
use crate::merge::{MergedPage, merge_pages};
use crate::stage::{Stage, StageOutcome};
use crate::TRACING_TARGET;

/// File name of the merged per-page artifact under the output directory.
const MERGED_ARTIFACT: &str = "merged.json";

/// One accepted upload moving through the pipeline.
#[derive(Debug, Clone)]
pub struct IngestJob {
    /// Document to process.
    pub doc_id: String,
    /// Request id threaded through logs and callbacks.
    pub request_id: String,
    /// Callback endpoint for this upload, when the caller provided one.
    pub callback_url: Option<Url>,
}

impl IngestJob {
    /// Creates a new ingestion job.
    pub fn new(
        doc_id: impl Into<String>,
        request_id: impl Into<String>,
        callback_url: Option<Url>,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            request_id: request_id.into(),
            callback_url,
        }
    }
}

/// Shared state for pipeline workers.
#[derive(Clone)]
pub struct PipelineState {
    /// Metadata store client.
    pub postgres: PgClient,
    /// Vector store client.
    pub vectors: VectorStore,
    /// Lexical store client.
    pub lexical: LexicalStore,
    /// Model gateway.
    pub inference: InferenceService,
    /// Fire-and-forget milestone notifications.
    pub status_sync: StatusSyncHandle,
    /// External source-to-PDF converter.
    pub converter: Arc<dyn DocumentConverter>,
    /// External structural extractor.
    pub parser: Arc<dyn StructureParser>,
    /// Pipeline configuration.
    pub config: Arc<PipelineConfig>,
    parse_budget: Arc<Semaphore>,
    vectorize_budget: Arc<Semaphore>,
}

impl PipelineState {
    /// Creates pipeline state with per-stage budgets from configuration.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        postgres: PgClient,
        vectors: VectorStore,
        lexical: LexicalStore,
        inference: InferenceService,
        status_sync: StatusSyncHandle,
        converter: Arc<dyn DocumentConverter>,
        parser: Arc<dyn StructureParser>,
        config: PipelineConfig,
    ) -> Self {
        let parse_budget = Arc::new(Semaphore::new(config.parse_budget.max(1)));
        let vectorize_budget = Arc::new(Semaphore::new(config.vectorize_budget.max(1)));
        Self {
            postgres,
            vectors,
            lexical,
            inference,
            status_sync,
            converter,
            parser,
            config: Arc::new(config),
            parse_budget,
            vectorize_budget,
        }
    }

    /// Drives one document from its current status to a terminal state.
    ///
    /// Never returns an error; failures become stage-failure transitions
    /// and milestone callbacks.
    pub async fn process_document(&self, job: &IngestJob) {
        loop {
            let doc = match self.fetch_document(&job.doc_id).await {
                Ok(Some(doc)) => doc,
                Ok(None) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        request_id = %job.request_id,
                        doc_id = %job.doc_id,
                        "Document vanished before processing"
                    );
                    return;
                }
                Err(error) => {
                    tracing::error!(
                        target: TRACING_TARGET,
                        request_id = %job.request_id,
                        doc_id = %job.doc_id,
                        error = %error,
                        "Failed to load document, leaving status untouched"
                    );
                    return;
                }
            };

            let Some(stage) = Stage::for_status(doc.process_status) else {
                tracing::debug!(
                    target: TRACING_TARGET,
                    request_id = %job.request_id,
                    doc_id = %job.doc_id,
                    status = %doc.process_status,
                    "Document is terminal, nothing to do"
                );
                return;
            };

            // Entry transition; skipped when resuming mid-stage status.
            if doc.process_status != stage.running_status() {
                if let Err(error) = self
                    .transition(&job.doc_id, stage.running_status(), None)
                    .await
                {
                    tracing::error!(
                        target: TRACING_TARGET,
                        request_id = %job.request_id,
                        doc_id = %job.doc_id,
                        stage = stage.name(),
                        error = %error,
                        "Stage entry transition rejected"
                    );
                    return;
                }
            }

            let outcome = self.run_stage_guarded(stage, &doc, job).await;

            match outcome {
                StageOutcome::Advanced => {
                    let next = stage.success_status();
                    match self.transition(&job.doc_id, next, None).await {
                        Ok(()) => {
                            tracing::info!(
                                target: TRACING_TARGET,
                                request_id = %job.request_id,
                                doc_id = %job.doc_id,
                                stage = stage.name(),
                                status = %next,
                                "Stage complete"
                            );
                            self.notify(job, next);
                            if next == ProcessStatus::Splited {
                                return;
                            }
                        }
                        Err(error) => {
                            tracing::error!(
                                target: TRACING_TARGET,
                                request_id = %job.request_id,
                                doc_id = %job.doc_id,
                                stage = stage.name(),
                                error = %error,
                                "Success transition rejected, stopping"
                            );
                            return;
                        }
                    }
                }
                StageOutcome::Failed { message } => {
                    let failure = stage.failure_status();
                    tracing::error!(
                        target: TRACING_TARGET,
                        request_id = %job.request_id,
                        doc_id = %job.doc_id,
                        stage = stage.name(),
                        status = %failure,
                        error = %message,
                        "Stage failed"
                    );
                    if let Err(error) = self
                        .transition(&job.doc_id, failure, Some(message))
                        .await
                    {
                        tracing::error!(
                            target: TRACING_TARGET,
                            request_id = %job.request_id,
                            doc_id = %job.doc_id,
                            error = %error,
                            "Failure transition rejected"
                        );
                    }
                    self.notify(job, failure);
                    return;
                }
            }
        }
    }

    /// Runs one stage under its budget and timeout.
    async fn run_stage_guarded(
        &self,
        stage: Stage,
        doc: &Document,
        job: &IngestJob,
    ) -> StageOutcome {
        let _budget = match stage {
            Stage::Parse => self.parse_budget.clone().acquire_owned().await.ok(),
            Stage::Vectorize => self.vectorize_budget.clone().acquire_owned().await.ok(),
            _ => None,
        };

        let timeout = self.stage_timeout(stage);
        let body = async {
            match stage {
                Stage::Convert => self.run_convert(doc).await,
                Stage::Parse => self.run_parse(doc).await,
                Stage::Merge => self.run_merge(doc).await,
                Stage::Chunk => self.run_chunk(doc).await,
                Stage::Vectorize => self.run_vectorize(doc, job).await,
            }
        };

        match tokio::time::timeout(timeout, body).await {
            Ok(Ok(())) => StageOutcome::Advanced,
            Ok(Err(error)) => StageOutcome::Failed {
                message: error.to_string(),
            },
            Err(_) => StageOutcome::Failed {
                message: format!(
                    "{} stage exceeded its {}s timeout",
                    stage.name(),
                    timeout.as_secs()
                ),
            },
        }
    }

    fn stage_timeout(&self, stage: Stage) -> Duration {
        let secs = match stage {
            Stage::Convert => self.config.convert_timeout_secs,
            Stage::Parse => self.config.parse_timeout_secs,
            Stage::Merge | Stage::Chunk => self.config.segment_timeout_secs,
            Stage::Vectorize => self.config.vectorize_timeout_secs,
        };
        Duration::from_secs(secs.max(1))
    }

    fn notify(&self, job: &IngestJob, status: ProcessStatus) {
        self.status_sync.enqueue(StatusUpdate::new(
            job.doc_id.clone(),
            status,
            job.request_id.clone(),
            job.callback_url.clone(),
        ));
    }

    async fn fetch_document(&self, doc_id: &str) -> Result<Option<Document>> {
        let mut conn = self.postgres.get_connection().await.map_err(Error::from)?;
        conn.find_document(doc_id).await.map_err(Error::from)
    }

    async fn transition(
        &self,
        doc_id: &str,
        status: ProcessStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        let mut conn = self.postgres.get_connection().await.map_err(Error::from)?;
        conn.update_document_status(doc_id, status, error_message)
            .await
            .map(drop)
            .map_err(Error::from)
    }

    // Stage bodies.

    /// Convert: reuse the source when it already is a PDF, otherwise run
    /// the external converter. Records `pdf_path`.
    async fn run_convert(&self, doc: &Document) -> Result<()> {
        let pdf_path = if doc.doc_ext.eq_ignore_ascii_case("pdf") {
            PathBuf::from(&doc.source_path)
        } else {
            self.converter
                .convert(Path::new(&doc.source_path), Path::new(&doc.output_dir))
                .await?
        };

        self.update_artifacts(
            &doc.doc_id,
            DocumentArtifacts {
                pdf_path: Some(pdf_path.to_string_lossy().into_owned()),
                ..DocumentArtifacts::default()
            },
        )
        .await
    }

    /// Parse: run the structural extractor and record its artifacts.
    async fn run_parse(&self, doc: &Document) -> Result<()> {
        let pdf_path = doc
            .pdf_path
            .as_deref()
            .ok_or_else(|| Error::internal_error().with_message("parse without pdf_path"))?;

        let artifacts = self
            .parser
            .parse(Path::new(pdf_path), Path::new(&doc.output_dir))
            .await?;

        self.update_artifacts(
            &doc.doc_id,
            DocumentArtifacts {
                json_path: Some(artifacts.json_path.to_string_lossy().into_owned()),
                spans_path: artifacts
                    .spans_path
                    .map(|p| p.to_string_lossy().into_owned()),
                layout_path: artifacts
                    .layout_path
                    .map(|p| p.to_string_lossy().into_owned()),
                images_dir: artifacts
                    .images_dir
                    .map(|p| p.to_string_lossy().into_owned()),
                ..DocumentArtifacts::default()
            },
        )
        .await
    }

    /// Merge: group parsed blocks per page, attach captions/footnotes,
    /// persist the merged artifact and the page rows.
    async fn run_merge(&self, doc: &Document) -> Result<()> {
        let json_path = doc
            .json_path
            .as_deref()
            .ok_or_else(|| Error::internal_error().with_message("merge without json_path"))?;

        let raw = tokio::fs::read(json_path).await.map_err(|e| {
            Error::external_error()
                .with_message(format!("cannot read parsed blocks at {json_path}"))
                .with_source(Box::new(e))
        })?;
        let blocks: Vec<ParsedBlock> = serde_json::from_slice(&raw).map_err(|e| {
            Error::serialization()
                .with_message("parsed block artifact is malformed")
                .with_source(Box::new(e))
        })?;

        let pages = merge_pages(&blocks);
        if pages.is_empty() {
            return Err(Error::external_error().with_message("document has no parsable content"));
        }

        let merged_path = Path::new(&doc.output_dir).join(MERGED_ARTIFACT);
        let encoded = serde_json::to_vec(&pages).map_err(|e| {
            Error::serialization()
                .with_message("cannot encode merged pages")
                .with_source(Box::new(e))
        })?;
        tokio::fs::write(&merged_path, encoded).await.map_err(|e| {
            Error::external_error()
                .with_message(format!("cannot write {}", merged_path.display()))
                .with_source(Box::new(e))
        })?;

        let page_rows: Vec<NewDocPage> = pages
            .iter()
            .map(|page| NewDocPage {
                doc_id: doc.doc_id.clone(),
                page_idx: page.page_idx,
                page_image_path: doc
                    .images_dir
                    .as_deref()
                    .map(|dir| format!("{dir}/page_{}.png", page.page_idx)),
            })
            .collect();

        let mut conn = self.postgres.get_connection().await.map_err(Error::from)?;
        conn.upsert_pages_bulk(page_rows).await.map_err(Error::from)?;

        self.update_artifacts(
            &doc.doc_id,
            DocumentArtifacts {
                merged_path: Some(merged_path.to_string_lossy().into_owned()),
                ..DocumentArtifacts::default()
            },
        )
        .await
    }

    /// Chunk: segment the merged pages and persist the segments in one
    /// batch, replacing any partial batch from an interrupted run.
    async fn run_chunk(&self, doc: &Document) -> Result<()> {
        let merged_path = doc
            .merged_path
            .as_deref()
            .ok_or_else(|| Error::internal_error().with_message("chunk without merged_path"))?;

        let raw = tokio::fs::read(merged_path).await.map_err(|e| {
            Error::external_error()
                .with_message(format!("cannot read merged pages at {merged_path}"))
                .with_source(Box::new(e))
        })?;
        let pages: Vec<MergedPage> = serde_json::from_slice(&raw).map_err(|e| {
            Error::serialization()
                .with_message("merged page artifact is malformed")
                .with_source(Box::new(e))
        })?;

        let chunker_config = ChunkerConfig {
            soft_limit: self.config.segment_soft_limit,
            emit_page_summaries: self.config.emit_page_summaries,
        };
        let segments = chunk_pages(&doc.doc_id, &pages, &chunker_config);
        if segments.is_empty() {
            return Err(Error::external_error().with_message("chunking produced no segments"));
        }

        let mut conn = self.postgres.get_connection().await.map_err(Error::from)?;
        // Idempotent re-entry: drop any partial batch before inserting.
        conn.delete_document_segments(&doc.doc_id)
            .await
            .map_err(Error::from)?;
        conn.insert_segments_bulk(segments)
            .await
            .map(drop)
            .map_err(Error::from)
    }

    /// Vectorize+index: embed indexable segments and fan out to both
    /// derived stores. The document becomes visible atomically: `splited`
    /// commits only after both stores acknowledged, and any partial rows
    /// are deleted on failure.
    async fn run_vectorize(&self, doc: &Document, job: &IngestJob) -> Result<()> {
        let result = self.vectorize_inner(doc).await;

        if result.is_err() {
            // Roll back partial derived rows so the read path never sees
            // a half-indexed document.
            if let Err(cleanup) = self.vectors.delete_by_doc(&doc.doc_id).await {
                tracing::error!(
                    target: TRACING_TARGET,
                    request_id = %job.request_id,
                    doc_id = %doc.doc_id,
                    error = %cleanup,
                    "Failed to clean up partial vector rows"
                );
            }
            if let Err(cleanup) = self.lexical.delete_by_doc(&doc.doc_id).await {
                tracing::error!(
                    target: TRACING_TARGET,
                    request_id = %job.request_id,
                    doc_id = %doc.doc_id,
                    error = %cleanup,
                    "Failed to clean up partial lexical rows"
                );
            }
        }

        result
    }

    async fn vectorize_inner(&self, doc: &Document) -> Result<()> {
        let mut conn = self.postgres.get_connection().await.map_err(Error::from)?;
        let segments = conn
            .list_document_segments(&doc.doc_id)
            .await
            .map_err(Error::from)?;
        drop(conn);

        let indexable: Vec<_> = segments.iter().filter(|s| s.is_indexable()).collect();
        if indexable.is_empty() {
            return Err(
                Error::internal_error().with_message("no indexable segments to vectorize")
            );
        }

        // Idempotent re-entry: replace any partial index from a previous
        // attempt.
        self.vectors
            .delete_by_doc(&doc.doc_id)
            .await
            .map_err(Error::from)?;
        self.lexical
            .delete_by_doc(&doc.doc_id)
            .await
            .map_err(Error::from)?;

        for batch in indexable.chunks(self.config.embedding_batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|s| embedding_text(s)).collect();
            let request = EmbeddingRequest::new(texts);
            let response = self.inference.embed(&request).await?;

            // Boundary sanity check: one embedding per indexable segment.
            if response.embeddings.len() != batch.len() {
                return Err(Error::internal_error().with_message(format!(
                    "embedding arity mismatch: {} inputs, {} vectors",
                    batch.len(),
                    response.embeddings.len()
                )));
            }

            let points: Vec<SegmentPoint> = batch
                .iter()
                .zip(response.embeddings.iter())
                .map(|(segment, vector)| SegmentPoint {
                    seg_id: segment.seg_id.clone(),
                    doc_id: segment.doc_id.clone(),
                    seg_type: segment.seg_type.to_string(),
                    seg_page_idx: segment.seg_page_idx,
                    vector: vector.clone(),
                })
                .collect();

            let records: Vec<LexicalRecord> = batch
                .iter()
                .map(|segment| LexicalRecord {
                    seg_id: segment.seg_id.clone(),
                    doc_id: segment.doc_id.clone(),
                    seg_type: segment.seg_type.to_string(),
                    seg_page_idx: segment.seg_page_idx,
                    content: segment.seg_content.clone(),
                })
                .collect();

            self.vectors.upsert_segments(points).await.map_err(Error::from)?;
            self.lexical.index_segments(records).await.map_err(Error::from)?;
        }

        Ok(())
    }

    async fn update_artifacts(&self, doc_id: &str, artifacts: DocumentArtifacts) -> Result<()> {
        let mut conn = self.postgres.get_connection().await.map_err(Error::from)?;
        conn.update_document_artifacts(doc_id, artifacts)
            .await
            .map(drop)
            .map_err(Error::from)
    }

    /// Deletes a document and fans the deletion out to both derived
    /// stores synchronously.
    pub async fn delete_document(&self, doc_id: &str) -> Result<bool> {
        let mut conn = self.postgres.get_connection().await.map_err(Error::from)?;
        let deleted = conn.delete_document(doc_id).await.map_err(Error::from)?;
        drop(conn);

        self.vectors.delete_by_doc(doc_id).await.map_err(Error::from)?;
        self.lexical.delete_by_doc(doc_id).await.map_err(Error::from)?;

        Ok(deleted)
    }

    /// Restarts a failed document and returns the job to re-enqueue.
    pub async fn restart_document(
        &self,
        doc_id: &str,
        request_id: &str,
        callback_url: Option<Url>,
    ) -> std::result::Result<IngestJob, PgError> {
        let mut conn = self.postgres.get_connection().await?;
        conn.restart_document(doc_id).await?;
        Ok(IngestJob::new(doc_id, request_id, callback_url))
    }
}

/// Text actually embedded for a segment: the caption gives tables and
/// summaries retrieval context the raw body lacks.
fn embedding_text(segment: &kbase_postgres::model::Segment) -> String {
    match segment.seg_caption.as_deref() {
        Some(caption) if !caption.is_empty() => {
            format!("{caption}\n{}", segment.seg_content)
        }
        _ => segment.seg_content.clone(),
    }
}

