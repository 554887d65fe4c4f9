//! Crash recovery: resume stalled in-flight documents.

use jiff::{SignedDuration, Timestamp};
use kbase_core::{Error, Result};
use kbase_postgres::query::DocumentRepository;
use uuid::Uuid;

use crate::processor::IngestJob;
use crate::processor::PipelineState;
use crate::queue::IngestHandle;
use crate::TRACING_TARGET;

/// Re-enqueues every in-flight document whose last update is older than
/// the configured grace period.
///
/// Documents resume from the start of their current stage; stage bodies
/// are idempotent under re-entry, so a document interrupted mid-stage
/// replays that stage cleanly. Returns the number of documents resumed.
pub async fn resume_stale_documents(
    state: &PipelineState,
    ingest: &IngestHandle,
) -> Result<usize> {
    let grace = SignedDuration::try_from(state.config.recovery_grace())
        .map_err(|e| Error::configuration().with_source(Box::new(e)))?;
    let cutoff = Timestamp::now() - grace;

    let mut conn = state.postgres.get_connection().await.map_err(Error::from)?;
    let stale = conn.list_stale_in_flight(cutoff).await.map_err(Error::from)?;
    drop(conn);

    let mut resumed = 0usize;
    for doc in stale {
        let request_id = format!("recovery-{}", Uuid::now_v7());
        tracing::info!(
            target: TRACING_TARGET,
            doc_id = %doc.doc_id,
            status = %doc.process_status,
            request_id = %request_id,
            "Resuming stalled document"
        );
        match ingest.enqueue(IngestJob::new(&doc.doc_id, &request_id, None)) {
            Ok(()) => resumed += 1,
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    doc_id = %doc.doc_id,
                    error = %error,
                    "Could not re-enqueue stalled document"
                );
                break;
            }
        }
    }

    Ok(resumed)
}
