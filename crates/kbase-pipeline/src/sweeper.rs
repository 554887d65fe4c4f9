//! Background repair of orphaned derived rows.
//!
//! Deletion and failure cleanup are synchronous on their primary paths;
//! the sweeper only repairs the crash windows between a failure transition
//! and its derived-row cleanup. No read path depends on it.

use std::time::Duration;

use kbase_postgres::query::DocumentRepository;
use kbase_postgres::types::ProcessStatus;
use strum::IntoEnumIterator;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::processor::PipelineState;
use crate::TRACING_TARGET;

/// Periodically removes derived rows left behind by interrupted failure
/// cleanups.
pub struct OrphanSweeper {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl OrphanSweeper {
    /// Spawns the sweeper; a zero interval disables it.
    pub fn spawn(state: PipelineState) -> Option<Self> {
        let interval_secs = state.config.sweep_interval_secs;
        if interval_secs == 0 {
            return None;
        }

        let cancel_token = CancellationToken::new();
        let cancel = cancel_token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(error) = sweep_once(&state).await {
                            tracing::warn!(
                                target: TRACING_TARGET,
                                error = %error,
                                "Orphan sweep failed"
                            );
                        }
                    }
                }
            }
        });

        Some(Self {
            handle,
            cancel_token,
        })
    }

    /// Requests shutdown.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    /// Waits for the sweeper task to stop.
    pub async fn wait(self) {
        let _ = self.handle.await;
    }
}

/// One sweep pass: documents that failed during vectorize may have left
/// partial rows in the derived stores if the process died between the
/// failure transition and the cleanup.
async fn sweep_once(state: &PipelineState) -> kbase_core::Result<()> {
    let failure_states: Vec<ProcessStatus> =
        ProcessStatus::iter().filter(|s| s.is_failure()).collect();

    let mut conn = state
        .postgres
        .get_connection()
        .await
        .map_err(kbase_core::Error::from)?;
    let failed = conn
        .list_documents_with_status(&failure_states)
        .await
        .map_err(kbase_core::Error::from)?;
    drop(conn);

    for doc in failed {
        if let Err(error) = state.vectors.delete_by_doc(&doc.doc_id).await {
            tracing::warn!(
                target: TRACING_TARGET,
                doc_id = %doc.doc_id,
                error = %error,
                "Sweep could not clear vector rows"
            );
            continue;
        }
        if let Err(error) = state.lexical.delete_by_doc(&doc.doc_id).await {
            tracing::warn!(
                target: TRACING_TARGET,
                doc_id = %doc.doc_id,
                error = %error,
                "Sweep could not clear lexical rows"
            );
        }
    }

    Ok(())
}
