//! Page artifact repository.

use std::future::Future;

use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use crate::model::{DocPage, NewDocPage};
use crate::{PgConnection, PgError, PgResult, schema};

/// Repository for per-page artifact rows.
pub trait DocPageRepository {
    /// Inserts page rows, upserting on `(doc_id, page_idx)` so the merge
    /// stage stays idempotent under re-entry.
    fn upsert_pages_bulk(
        &mut self,
        pages: Vec<NewDocPage>,
    ) -> impl Future<Output = PgResult<Vec<DocPage>>> + Send;

    /// Lists page rows of a document ordered by page index.
    fn list_document_pages(
        &mut self,
        doc_id: &str,
    ) -> impl Future<Output = PgResult<Vec<DocPage>>> + Send;

    /// Deletes all page rows of a document.
    fn delete_document_pages(
        &mut self,
        doc_id: &str,
    ) -> impl Future<Output = PgResult<usize>> + Send;
}

impl DocPageRepository for PgConnection {
    async fn upsert_pages_bulk(&mut self, pages: Vec<NewDocPage>) -> PgResult<Vec<DocPage>> {
        use schema::doc_page_info::{self, dsl};

        if pages.is_empty() {
            return Ok(vec![]);
        }

        let rows = diesel::insert_into(doc_page_info::table)
            .values(&pages)
            .on_conflict((dsl::doc_id, dsl::page_idx))
            .do_update()
            .set(dsl::page_image_path.eq(excluded(dsl::page_image_path)))
            .returning(DocPage::as_returning())
            .get_results(self)
            .await
            .map_err(PgError::from)?;

        Ok(rows)
    }

    async fn list_document_pages(&mut self, doc_id: &str) -> PgResult<Vec<DocPage>> {
        use schema::doc_page_info::{self, dsl};

        let rows = doc_page_info::table
            .filter(dsl::doc_id.eq(doc_id))
            .order(dsl::page_idx.asc())
            .select(DocPage::as_select())
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(rows)
    }

    async fn delete_document_pages(&mut self, doc_id: &str) -> PgResult<usize> {
        use schema::doc_page_info::{self, dsl};

        let affected = diesel::delete(doc_page_info::table.filter(dsl::doc_id.eq(doc_id)))
            .execute(self)
            .await
            .map_err(PgError::from)?;

        Ok(affected)
    }
}
