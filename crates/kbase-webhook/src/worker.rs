//! Bounded queue and worker pool for fire-and-forget delivery.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::request::StatusUpdate;
use crate::sync::StatusSynchronizer;
use crate::TRACING_TARGET;

/// Default queue capacity before updates are shed.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default number of delivery workers.
pub const DEFAULT_WORKER_COUNT: usize = 2;

/// Handle used by the pipeline to enqueue milestone updates.
///
/// Enqueueing never blocks and never fails the caller: when the queue is
/// full the update is dropped with a warning, preserving the contract that
/// pipeline latency is independent of callback latency.
#[derive(Clone)]
pub struct StatusSyncHandle {
    tx: mpsc::Sender<StatusUpdate>,
}

impl StatusSyncHandle {
    /// Enqueues an update for asynchronous delivery.
    pub fn enqueue(&self, update: StatusUpdate) {
        if let Err(err) = self.tx.try_send(update) {
            let update = match err {
                mpsc::error::TrySendError::Full(update) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        doc_id = %update.doc_id,
                        status = %update.status,
                        "Status sync queue full, dropping update"
                    );
                    return;
                }
                mpsc::error::TrySendError::Closed(update) => update,
            };
            tracing::warn!(
                target: TRACING_TARGET,
                doc_id = %update.doc_id,
                status = %update.status,
                "Status sync workers stopped, dropping update"
            );
        }
    }
}

/// Worker pool draining the callback queue.
pub struct StatusSyncWorker {
    handles: Vec<JoinHandle<()>>,
    cancel_token: CancellationToken,
}

impl StatusSyncWorker {
    /// Spawns the worker pool and returns it with the enqueue handle.
    pub fn spawn(synchronizer: StatusSynchronizer) -> (StatusSyncHandle, Self) {
        Self::spawn_with(synchronizer, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKER_COUNT)
    }

    /// Spawns the worker pool with explicit queue and pool sizes.
    pub fn spawn_with(
        synchronizer: StatusSynchronizer,
        queue_capacity: usize,
        workers: usize,
    ) -> (StatusSyncHandle, Self) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let rx = std::sync::Arc::new(tokio::sync::Mutex::new(rx));
        let cancel_token = CancellationToken::new();

        let handles = (0..workers.max(1))
            .map(|worker_idx| {
                let synchronizer = synchronizer.clone();
                let rx = std::sync::Arc::clone(&rx);
                let cancel = cancel_token.clone();

                tokio::spawn(async move {
                    tracing::debug!(
                        target: TRACING_TARGET,
                        worker = worker_idx,
                        "Status sync worker started"
                    );
                    loop {
                        let update = {
                            let mut rx = rx.lock().await;
                            tokio::select! {
                                biased;

                                () = cancel.cancelled() => break,
                                update = rx.recv() => update,
                            }
                        };
                        match update {
                            Some(update) => {
                                synchronizer.sync_safely(&update).await;
                            }
                            None => break,
                        }
                    }
                    tracing::debug!(
                        target: TRACING_TARGET,
                        worker = worker_idx,
                        "Status sync worker stopped"
                    );
                })
            })
            .collect();

        (
            StatusSyncHandle { tx },
            Self {
                handles,
                cancel_token,
            },
        )
    }

    /// Requests shutdown; queued updates not yet picked up are dropped.
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

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use jiff::Timestamp;
    use kbase_core::Result;
    use kbase_postgres::types::ProcessStatus;
    use url::Url;

    use super::*;
    use crate::client::StatusSyncConfig;
    use crate::request::CallbackPayload;
    use crate::response::CallbackResponse;
    use crate::CallbackProvider;

    #[derive(Clone, Default)]
    struct RecordingProvider {
        delivered: Arc<Mutex<Vec<CallbackPayload>>>,
    }

    #[async_trait::async_trait]
    impl CallbackProvider for RecordingProvider {
        async fn deliver(
            &self,
            _url: &Url,
            payload: &CallbackPayload,
        ) -> Result<CallbackResponse> {
            self.delivered.lock().unwrap().push(payload.clone());
            Ok(CallbackResponse::new(200, Timestamp::now()))
        }
    }

    #[tokio::test]
    async fn test_queue_drains_and_shuts_down() {
        let provider = RecordingProvider::default();
        let delivered = Arc::clone(&provider.delivered);
        let config = StatusSyncConfig {
            status_sync_enabled: true,
            ..StatusSyncConfig::default()
        };

        let (handle, worker) =
            StatusSyncWorker::spawn_with(StatusSynchronizer::new(provider, config), 16, 2);

        let url = Url::parse("https://orchestrator.internal/callback").unwrap();
        handle.enqueue(StatusUpdate::new(
            "doc-1",
            ProcessStatus::Parsed,
            "req-1",
            Some(url.clone()),
        ));
        handle.enqueue(StatusUpdate::new(
            "doc-1",
            ProcessStatus::Splited,
            "req-1",
            Some(url),
        ));

        // Let the pool drain before stopping it.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        worker.shutdown();
        worker.wait().await;

        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
    }
}
