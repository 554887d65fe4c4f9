//! Upload registration: validation, metadata row, permissions, enqueue.

use std::path::Path;

use kbase_core::{Error, Result};
use kbase_postgres::model::{NewDocument, NewPermissionLink};
use kbase_postgres::query::{DocumentRepository, PermissionRepository};
use url::Url;

use crate::processor::{IngestJob, PipelineState};
use crate::queue::IngestHandle;
use crate::TRACING_TARGET;

/// File extensions the converter stack supports.
const SUPPORTED_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt",
];

/// Maximum length of a display name.
const MAX_NAME_CHARS: usize = 200;

/// An accepted upload request.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Caller-assigned globally unique document id.
    pub doc_id: String,
    /// Display name.
    pub doc_name: String,
    /// Server-local source path or URL.
    pub source_path: String,
    /// Directory receiving derived artifacts.
    pub output_dir: String,
    /// Subjects granted access; empty means unrestricted.
    pub subject_ids: Vec<String>,
    /// Kind of subject the grants target.
    pub permission_type: String,
    /// Request id for tracing and callbacks.
    pub request_id: String,
    /// Callback endpoint for milestone notifications.
    pub callback_url: Option<Url>,
}

/// Validates an upload, registers the document, stores its permission
/// links, and enqueues processing.
///
/// Fails with `Duplicate` when the document already finished processing,
/// `Conflict` when a previous run is still in flight, and `InvalidInput`
/// for unsupported formats. Processing itself runs asynchronously.
pub async fn register_upload(
    state: &PipelineState,
    ingest: &IngestHandle,
    request: UploadRequest,
) -> Result<String> {
    if request.doc_id.trim().is_empty() {
        return Err(Error::invalid_input().with_message("doc_id must not be empty"));
    }
    if request.doc_name.chars().count() > MAX_NAME_CHARS {
        return Err(Error::invalid_input()
            .with_message(format!("doc_name exceeds {MAX_NAME_CHARS} characters")));
    }

    let ext = Path::new(&request.source_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(Error::invalid_input()
            .with_message(format!("unsupported file format: {ext:?}")));
    }

    let mut conn = state.postgres.get_connection().await.map_err(Error::from)?;

    let doc = conn
        .create_document(NewDocument {
            doc_id: request.doc_id.clone(),
            doc_name: request.doc_name.clone(),
            doc_ext: ext,
            source_path: request.source_path.clone(),
            output_dir: request.output_dir.clone(),
        })
        .await
        .map_err(Error::from)?;

    let links = if request.subject_ids.is_empty() {
        vec![NewPermissionLink::unrestricted(
            &request.permission_type,
            &doc.doc_id,
        )]
    } else {
        request
            .subject_ids
            .iter()
            .map(|subject| {
                NewPermissionLink::for_subject(&request.permission_type, subject, &doc.doc_id)
            })
            .collect()
    };
    conn.replace_document_permissions(&doc.doc_id, links)
        .await
        .map_err(Error::from)?;
    drop(conn);

    ingest.enqueue(IngestJob::new(
        &doc.doc_id,
        &request.request_id,
        request.callback_url,
    ))?;

    tracing::info!(
        target: TRACING_TARGET,
        request_id = %request.request_id,
        doc_id = %doc.doc_id,
        "Upload registered and queued"
    );

    Ok(doc.doc_id)
}
