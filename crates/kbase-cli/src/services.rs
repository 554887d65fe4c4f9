//! Service container with deterministic startup and teardown.

use std::sync::Arc;

use anyhow::Context;
use kbase_inference::{HttpProvider, InferenceService};
use kbase_lexical::LexicalStore;
use kbase_pipeline::{
    IngestHandle, OrphanSweeper, PipelineState, PipelineWorkers, resume_stale_documents,
};
use kbase_postgres::PgClient;
use kbase_qdrant::VectorStore;
use kbase_rag::{HybridRetriever, RagService};
use kbase_webhook::{CallbackClient, StatusSyncHandle, StatusSyncWorker, StatusSynchronizer};

use crate::config::Cli;
use crate::external::{RemoteParser, SofficeConverter};
use crate::TRACING_TARGET_STARTUP;

/// The assembled service container.
///
/// Construction order is the dependency order; [`shutdown`] tears the
/// container down in reverse.
///
/// [`shutdown`]: Services::shutdown
pub struct Services {
    /// Metadata store client.
    pub postgres: PgClient,
    /// RAG chat service.
    pub rag: RagService,
    /// Ingestion enqueue handle.
    pub ingest: IngestHandle,
    /// Pipeline state, for delete/restart operations.
    pub pipeline: PipelineState,

    workers: PipelineWorkers,
    sweeper: Option<OrphanSweeper>,
    status_sync_worker: StatusSyncWorker,
    status_sync: StatusSyncHandle,
}

impl Services {
    /// Connects every backend and spawns the background workers.
    pub async fn init(cli: &Cli) -> anyhow::Result<Self> {
        // 1. Metadata store: source of truth, first up.
        let postgres = PgClient::connect(cli.postgres.clone())
            .await
            .context("connecting to the metadata store")?;

        // 2. Model gateway; its embedding dimensionality shapes the
        //    vector collection.
        let provider =
            HttpProvider::new(cli.provider.clone()).context("building the model gateway")?;
        let inference = InferenceService::new(provider, cli.inference.clone());
        let dimensions = inference.embedding_dimensions();

        // 3. Vector store.
        let vectors = VectorStore::connect(cli.qdrant.clone())
            .await
            .context("connecting to the vector store")?;
        vectors
            .ensure_collection(dimensions)
            .await
            .context("ensuring the segment collection")?;

        // 4. Lexical store.
        let lexical = LexicalStore::open(&cli.lexical).context("opening the lexical index")?;

        // 5. Status synchronizer queue and workers.
        let callback_client =
            CallbackClient::new(&cli.status_sync).context("building the callback client")?;
        let synchronizer = StatusSynchronizer::new(callback_client, cli.status_sync.clone());
        let (status_sync, status_sync_worker) = StatusSyncWorker::spawn(synchronizer);

        // 6. Ingestion pipeline.
        let converter = Arc::new(SofficeConverter::new(&cli.soffice_path));
        let parser =
            Arc::new(RemoteParser::new(cli.parser_url.clone()).context("building the parser")?);
        let pipeline = PipelineState::new(
            postgres.clone(),
            vectors.clone(),
            lexical.clone(),
            inference.clone(),
            status_sync.clone(),
            converter,
            parser,
            cli.pipeline.clone(),
        );
        let (ingest, workers) = PipelineWorkers::spawn(pipeline.clone());
        let sweeper = OrphanSweeper::spawn(pipeline.clone());

        // 7. Retrieval and chat.
        let retriever = HybridRetriever::new(
            Arc::new(vectors),
            Arc::new(lexical),
            Arc::new(postgres.clone()),
            inference.clone(),
            cli.retrieval.clone(),
        )
        .context("building the hybrid retriever")?;
        let rag = RagService::new(
            retriever,
            inference,
            Arc::new(postgres.clone()),
            cli.chat.clone(),
        );

        // Resume documents stranded by a previous crash.
        match resume_stale_documents(&pipeline, &ingest).await {
            Ok(0) => {}
            Ok(resumed) => tracing::info!(
                target: TRACING_TARGET_STARTUP,
                resumed,
                "Re-enqueued stalled documents"
            ),
            Err(error) => tracing::warn!(
                target: TRACING_TARGET_STARTUP,
                error = %error,
                "Stalled-document recovery failed"
            ),
        }

        tracing::info!(target: TRACING_TARGET_STARTUP, "Service container ready");

        Ok(Self {
            postgres,
            rag,
            ingest,
            pipeline,
            workers,
            sweeper,
            status_sync_worker,
            status_sync,
        })
    }

    /// Returns the status sync handle, for restart/delete operations that
    /// need to emit milestones.
    pub fn status_sync(&self) -> &StatusSyncHandle {
        &self.status_sync
    }

    /// Tears the container down in reverse construction order.
    pub async fn shutdown(self) {
        tracing::info!(target: TRACING_TARGET_STARTUP, "Shutting down");

        if let Some(sweeper) = self.sweeper {
            sweeper.shutdown();
            sweeper.wait().await;
        }

        self.workers.shutdown();
        self.workers.wait().await;

        // Callbacks drain after the pipeline stopped producing them.
        self.status_sync_worker.shutdown();
        self.status_sync_worker.wait().await;

        // Stores close last; the lexical and vector clients release on
        // drop.
        self.postgres.close();

        tracing::info!(target: TRACING_TARGET_STARTUP, "Shutdown complete");
    }
}
