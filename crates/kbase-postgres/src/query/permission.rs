//! Permission link repository.

use std::future::Future;

use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};

use crate::model::{NewPermissionLink, PermissionLink};
use crate::{PgConnection, PgError, PgResult, schema};

/// Repository for permission link operations.
///
/// Authorization semantics: a subject `s` is authorized for a document iff
/// a link row exists with `subject_id = s`, or the document carries an
/// unrestricted row (`subject_id` NULL or empty).
pub trait PermissionRepository {
    /// Replaces all permission links of a document in one transaction.
    fn replace_document_permissions(
        &mut self,
        doc_id: &str,
        links: Vec<NewPermissionLink>,
    ) -> impl Future<Output = PgResult<Vec<PermissionLink>>> + Send;

    /// Lists the permission links of a document.
    fn list_document_permissions(
        &mut self,
        doc_id: &str,
    ) -> impl Future<Output = PgResult<Vec<PermissionLink>>> + Send;

    /// Returns the distinct document ids a subject is authorized for.
    fn authorized_doc_ids(
        &mut self,
        subject_id: &str,
    ) -> impl Future<Output = PgResult<Vec<String>>> + Send;
}

impl PermissionRepository for PgConnection {
    async fn replace_document_permissions(
        &mut self,
        doc_id: &str,
        links: Vec<NewPermissionLink>,
    ) -> PgResult<Vec<PermissionLink>> {
        use schema::permission_doc_link::{self, dsl};

        let doc_id = doc_id.to_owned();
        self.transaction(|conn| {
            async move {
                diesel::delete(permission_doc_link::table.filter(dsl::doc_id.eq(&doc_id)))
                    .execute(conn)
                    .await
                    .map_err(PgError::from)?;

                if links.is_empty() {
                    return Ok(vec![]);
                }

                let rows = diesel::insert_into(permission_doc_link::table)
                    .values(&links)
                    .returning(PermissionLink::as_returning())
                    .get_results(conn)
                    .await
                    .map_err(PgError::from)?;

                Ok(rows)
            }
            .scope_boxed()
        })
        .await
    }

    async fn list_document_permissions(&mut self, doc_id: &str) -> PgResult<Vec<PermissionLink>> {
        use schema::permission_doc_link::{self, dsl};

        let rows = permission_doc_link::table
            .filter(dsl::doc_id.eq(doc_id))
            .select(PermissionLink::as_select())
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(rows)
    }

    async fn authorized_doc_ids(&mut self, subject_id: &str) -> PgResult<Vec<String>> {
        use schema::permission_doc_link::{self, dsl};

        // Empty subject ids are normalized to NULL on insert, but tolerate
        // legacy rows storing the empty string.
        let doc_ids = permission_doc_link::table
            .filter(
                dsl::subject_id
                    .is_null()
                    .or(dsl::subject_id.eq(""))
                    .or(dsl::subject_id.eq(subject_id)),
            )
            .select(dsl::doc_id)
            .distinct()
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(doc_ids)
    }
}
