//! Bounded ingestion queue and worker pool.

use std::sync::Arc;

use kbase_core::{Error, Result};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::processor::{IngestJob, PipelineState};
use crate::TRACING_TARGET;

/// Handle used to enqueue ingestion jobs.
///
/// The queue is bounded: a full queue rejects the upload with a
/// rate-limit error so ingestion storms surface as backpressure instead
/// of unbounded memory growth.
#[derive(Clone)]
pub struct IngestHandle {
    tx: mpsc::Sender<IngestJob>,
}

impl IngestHandle {
    /// Enqueues a job for background processing.
    pub fn enqueue(&self, job: IngestJob) -> Result<()> {
        self.tx.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(job) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    doc_id = %job.doc_id,
                    "Ingestion queue full, rejecting upload"
                );
                Error::rate_limited().with_message("ingestion queue is full, retry later")
            }
            mpsc::error::TrySendError::Closed(_) => {
                Error::service_unavailable().with_message("ingestion workers stopped")
            }
        })
    }
}

/// Handles for the ingestion worker pool.
///
/// Workers pull jobs from the shared queue and drive each document to a
/// terminal state. Shutdown is cooperative: workers finish the document
/// they are on, and interrupted documents resume from the start of their
/// current stage on the next startup.
pub struct PipelineWorkers {
    handles: Vec<JoinHandle<()>>,
    cancel_token: CancellationToken,
}

impl PipelineWorkers {
    /// Spawns the worker pool over the given state.
    pub fn spawn(state: PipelineState) -> (IngestHandle, Self) {
        let (tx, rx) = mpsc::channel(state.config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let cancel_token = CancellationToken::new();

        let handles = (0..state.config.workers.max(1))
            .map(|worker_idx| {
                let state = state.clone();
                let rx = Arc::clone(&rx);
                let cancel = cancel_token.clone();

                tokio::spawn(async move {
                    tracing::info!(
                        target: TRACING_TARGET,
                        worker = worker_idx,
                        "Ingestion worker started"
                    );
                    loop {
                        let job = {
                            let mut rx = rx.lock().await;
                            tokio::select! {
                                biased;

                                () = cancel.cancelled() => break,
                                job = rx.recv() => job,
                            }
                        };
                        match job {
                            Some(job) => state.process_document(&job).await,
                            None => break,
                        }
                    }
                    tracing::info!(
                        target: TRACING_TARGET,
                        worker = worker_idx,
                        "Ingestion worker stopped"
                    );
                })
            })
            .collect();

        (
            IngestHandle { tx },
            Self {
                handles,
                cancel_token,
            },
        )
    }

    /// Requests graceful shutdown.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    /// Waits for all workers to stop.
    pub async fn wait(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
