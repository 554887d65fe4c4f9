//! Document repository enforcing the pipeline state machine.

use std::future::Future;

use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};

use crate::model::{Document, DocumentArtifacts, NewDocument};
use crate::types::ProcessStatus;
use crate::{PgConnection, PgError, PgResult, TRACING_TARGET_QUERY, schema};

/// Repository for document database operations.
///
/// Status transitions are enforced inside guarded UPDATE statements: the
/// legal predecessor set sits in the WHERE clause, so a concurrent scheduler
/// can never interleave an illegal step between a read and a write.
pub trait DocumentRepository {
    /// Registers a document for processing.
    ///
    /// Fails with [`PgError::Duplicate`] when the document already finished
    /// processing, and with [`PgError::Conflict`] when a previous processing
    /// run is still in flight. A document in a failure state is overwritten:
    /// derived paths are cleared and the status resets to `pending`.
    fn create_document(
        &mut self,
        new_doc: NewDocument,
    ) -> impl Future<Output = PgResult<Document>> + Send;

    /// Finds a document by its identifier.
    fn find_document(
        &mut self,
        doc_id: &str,
    ) -> impl Future<Output = PgResult<Option<Document>>> + Send;

    /// Transitions a document to `new_status`, atomically rejecting
    /// transitions the state machine does not permit.
    ///
    /// On rejection the row is left untouched and
    /// [`PgError::IllegalTransition`] is returned.
    fn update_document_status(
        &mut self,
        doc_id: &str,
        new_status: ProcessStatus,
        error_message: Option<String>,
    ) -> impl Future<Output = PgResult<Document>> + Send;

    /// Records derived artifact paths produced by a pipeline stage.
    fn update_document_artifacts(
        &mut self,
        doc_id: &str,
        artifacts: DocumentArtifacts,
    ) -> impl Future<Output = PgResult<Document>> + Send;

    /// Resets a failed document back to `pending`, clearing its error.
    ///
    /// This is the only backward transition; it is legal from failure
    /// states only.
    fn restart_document(&mut self, doc_id: &str)
    -> impl Future<Output = PgResult<Document>> + Send;

    /// Deletes a document; segments, pages, and permission links cascade.
    ///
    /// Returns whether a row was deleted. Derived vector/lexical entries
    /// are the caller's responsibility (deletion is a fan-out).
    fn delete_document(&mut self, doc_id: &str) -> impl Future<Output = PgResult<bool>> + Send;

    /// Lists in-flight documents whose last update is older than `cutoff`,
    /// for crash recovery re-enqueueing.
    fn list_stale_in_flight(
        &mut self,
        cutoff: jiff::Timestamp,
    ) -> impl Future<Output = PgResult<Vec<Document>>> + Send;

    /// Lists documents currently holding any of the given statuses.
    fn list_documents_with_status(
        &mut self,
        statuses: &[ProcessStatus],
    ) -> impl Future<Output = PgResult<Vec<Document>>> + Send;
}

impl DocumentRepository for PgConnection {
    async fn create_document(&mut self, new_doc: NewDocument) -> PgResult<Document> {
        use schema::doc_info::{self, dsl};

        self.transaction(|conn| {
            async move {
                let existing: Option<Document> = doc_info::table
                    .filter(dsl::doc_id.eq(&new_doc.doc_id))
                    .select(Document::as_select())
                    .first(conn)
                    .await
                    .optional()
                    .map_err(PgError::from)?;

                match existing {
                    None => {
                        let doc = diesel::insert_into(doc_info::table)
                            .values(&new_doc)
                            .returning(Document::as_returning())
                            .get_result(conn)
                            .await
                            .map_err(PgError::from)?;
                        Ok(doc)
                    }
                    Some(doc) if doc.is_failed() => {
                        tracing::info!(
                            target: TRACING_TARGET_QUERY,
                            doc_id = %new_doc.doc_id,
                            previous_status = %doc.process_status,
                            "Overwriting failed document on re-upload"
                        );
                        let doc = diesel::update(doc_info::table.filter(dsl::doc_id.eq(&new_doc.doc_id)))
                            .set((
                                dsl::doc_name.eq(&new_doc.doc_name),
                                dsl::doc_ext.eq(&new_doc.doc_ext),
                                dsl::source_path.eq(&new_doc.source_path),
                                dsl::output_dir.eq(&new_doc.output_dir),
                                dsl::pdf_path.eq(None::<String>),
                                dsl::json_path.eq(None::<String>),
                                dsl::spans_path.eq(None::<String>),
                                dsl::layout_path.eq(None::<String>),
                                dsl::images_dir.eq(None::<String>),
                                dsl::merged_path.eq(None::<String>),
                                dsl::process_status.eq(ProcessStatus::Pending),
                                dsl::error_message.eq(None::<String>),
                                dsl::updated_at.eq(diesel::dsl::now),
                            ))
                            .returning(Document::as_returning())
                            .get_result(conn)
                            .await
                            .map_err(PgError::from)?;
                        Ok(doc)
                    }
                    Some(doc) if doc.is_complete() => {
                        Err(PgError::Duplicate(format!("document {} already processed", doc.doc_id).into()))
                    }
                    Some(doc) => Err(PgError::Conflict(
                        format!("document {} is still processing ({})", doc.doc_id, doc.process_status).into(),
                    )),
                }
            }
            .scope_boxed()
        })
        .await
    }

    async fn find_document(&mut self, doc_id: &str) -> PgResult<Option<Document>> {
        use schema::doc_info::{self, dsl};

        let doc = doc_info::table
            .filter(dsl::doc_id.eq(doc_id))
            .select(Document::as_select())
            .first(self)
            .await
            .optional()
            .map_err(PgError::from)?;

        Ok(doc)
    }

    async fn update_document_status(
        &mut self,
        doc_id: &str,
        new_status: ProcessStatus,
        error_message: Option<String>,
    ) -> PgResult<Document> {
        use schema::doc_info::{self, dsl};

        let updated = diesel::update(
            doc_info::table
                .filter(dsl::doc_id.eq(doc_id))
                .filter(dsl::process_status.eq_any(new_status.predecessors())),
        )
        .set((
            dsl::process_status.eq(new_status),
            dsl::error_message.eq(error_message),
            dsl::updated_at.eq(diesel::dsl::now),
        ))
        .returning(Document::as_returning())
        .get_result(self)
        .await
        .optional()
        .map_err(PgError::from)?;

        match updated {
            Some(doc) => Ok(doc),
            None => {
                // Distinguish a missing row from a rejected transition.
                let current = self.find_document(doc_id).await?;
                match current {
                    None => Err(PgError::NotFound(format!("document {doc_id}").into())),
                    Some(doc) => Err(PgError::IllegalTransition(
                        format!("{} -> {} for document {doc_id}", doc.process_status, new_status)
                            .into(),
                    )),
                }
            }
        }
    }

    async fn update_document_artifacts(
        &mut self,
        doc_id: &str,
        artifacts: DocumentArtifacts,
    ) -> PgResult<Document> {
        use schema::doc_info::{self, dsl};

        let doc = diesel::update(doc_info::table.filter(dsl::doc_id.eq(doc_id)))
            .set((&artifacts, dsl::updated_at.eq(diesel::dsl::now)))
            .returning(Document::as_returning())
            .get_result(self)
            .await
            .optional()
            .map_err(PgError::from)?;

        doc.ok_or_else(|| PgError::NotFound(format!("document {doc_id}").into()))
    }

    async fn restart_document(&mut self, doc_id: &str) -> PgResult<Document> {
        use schema::doc_info::{self, dsl};

        let failure_states = [
            ProcessStatus::ConvertFailed,
            ProcessStatus::ParseFailed,
            ProcessStatus::MergeFailed,
            ProcessStatus::ChunkFailed,
            ProcessStatus::SplitFailed,
        ];

        let updated = diesel::update(
            doc_info::table
                .filter(dsl::doc_id.eq(doc_id))
                .filter(dsl::process_status.eq_any(failure_states)),
        )
        .set((
            dsl::process_status.eq(ProcessStatus::Pending),
            dsl::error_message.eq(None::<String>),
            dsl::updated_at.eq(diesel::dsl::now),
        ))
        .returning(Document::as_returning())
        .get_result(self)
        .await
        .optional()
        .map_err(PgError::from)?;

        match updated {
            Some(doc) => Ok(doc),
            None => match self.find_document(doc_id).await? {
                None => Err(PgError::NotFound(format!("document {doc_id}").into())),
                Some(doc) => Err(PgError::IllegalTransition(
                    format!(
                        "restart requires a failure state, document {doc_id} is {}",
                        doc.process_status
                    )
                    .into(),
                )),
            },
        }
    }

    async fn delete_document(&mut self, doc_id: &str) -> PgResult<bool> {
        use schema::doc_info::{self, dsl};

        let affected = diesel::delete(doc_info::table.filter(dsl::doc_id.eq(doc_id)))
            .execute(self)
            .await
            .map_err(PgError::from)?;

        Ok(affected > 0)
    }

    async fn list_stale_in_flight(&mut self, cutoff: jiff::Timestamp) -> PgResult<Vec<Document>> {
        use strum::IntoEnumIterator;

        use schema::doc_info::{self, dsl};

        let in_flight: Vec<ProcessStatus> =
            ProcessStatus::iter().filter(|s| s.is_in_flight()).collect();

        let docs = doc_info::table
            .filter(dsl::process_status.eq_any(in_flight))
            .filter(dsl::updated_at.lt(jiff_diesel::Timestamp::from(cutoff)))
            .order(dsl::updated_at.asc())
            .select(Document::as_select())
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(docs)
    }

    async fn list_documents_with_status(
        &mut self,
        statuses: &[ProcessStatus],
    ) -> PgResult<Vec<Document>> {
        use schema::doc_info::{self, dsl};

        if statuses.is_empty() {
            return Ok(vec![]);
        }

        let docs = doc_info::table
            .filter(dsl::process_status.eq_any(statuses))
            .order(dsl::updated_at.asc())
            .select(Document::as_select())
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(docs)
    }
}
