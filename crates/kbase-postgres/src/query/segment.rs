//! Segment repository for chunk persistence and hydration.

use std::future::Future;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::model::{NewSegment, Segment};
use crate::{PgConnection, PgError, PgResult, schema};

/// Repository for segment database operations.
pub trait SegmentRepository {
    /// Inserts a batch of segments all-or-nothing.
    ///
    /// A duplicate `seg_id` anywhere in the batch fails the whole insert
    /// with [`PgError::Duplicate`].
    fn insert_segments_bulk(
        &mut self,
        segments: Vec<NewSegment>,
    ) -> impl Future<Output = PgResult<Vec<Segment>>> + Send;

    /// Hydrates segments by id.
    ///
    /// Missing ids are skipped silently; the caller treats them as deleted
    /// in a race with retrieval.
    fn find_segments_by_ids(
        &mut self,
        seg_ids: &[String],
    ) -> impl Future<Output = PgResult<Vec<Segment>>> + Send;

    /// Hydrates segments by id together with their document display
    /// names, for source attribution.
    ///
    /// Missing ids are skipped silently.
    fn find_segments_with_doc_names(
        &mut self,
        seg_ids: &[String],
    ) -> impl Future<Output = PgResult<Vec<(Segment, String)>>> + Send;

    /// Lists all segments of a document ordered by page and id.
    fn list_document_segments(
        &mut self,
        doc_id: &str,
    ) -> impl Future<Output = PgResult<Vec<Segment>>> + Send;

    /// Deletes all segments of a document. Returns the number removed.
    fn delete_document_segments(
        &mut self,
        doc_id: &str,
    ) -> impl Future<Output = PgResult<usize>> + Send;

    /// Counts the segments of a document.
    fn count_document_segments(
        &mut self,
        doc_id: &str,
    ) -> impl Future<Output = PgResult<i64>> + Send;
}

impl SegmentRepository for PgConnection {
    async fn insert_segments_bulk(&mut self, segments: Vec<NewSegment>) -> PgResult<Vec<Segment>> {
        use schema::segment_info;

        if segments.is_empty() {
            return Ok(vec![]);
        }

        // A single multi-row INSERT is atomic; any conflict rolls the
        // whole statement back.
        let inserted = diesel::insert_into(segment_info::table)
            .values(&segments)
            .returning(Segment::as_returning())
            .get_results(self)
            .await
            .map_err(|e| {
                let error = PgError::from(e);
                if error.is_unique_violation() {
                    PgError::Duplicate("segment batch contains an existing seg_id".into())
                } else {
                    error
                }
            })?;

        Ok(inserted)
    }

    async fn find_segments_by_ids(&mut self, seg_ids: &[String]) -> PgResult<Vec<Segment>> {
        use schema::segment_info::{self, dsl};

        if seg_ids.is_empty() {
            return Ok(vec![]);
        }

        let segments = segment_info::table
            .filter(dsl::seg_id.eq_any(seg_ids))
            .select(Segment::as_select())
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(segments)
    }

    async fn find_segments_with_doc_names(
        &mut self,
        seg_ids: &[String],
    ) -> PgResult<Vec<(Segment, String)>> {
        use schema::{doc_info, segment_info};

        if seg_ids.is_empty() {
            return Ok(vec![]);
        }

        let rows = segment_info::table
            .inner_join(doc_info::table)
            .filter(segment_info::seg_id.eq_any(seg_ids))
            .select((Segment::as_select(), doc_info::doc_name))
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(rows)
    }

    async fn list_document_segments(&mut self, doc_id: &str) -> PgResult<Vec<Segment>> {
        use schema::segment_info::{self, dsl};

        let segments = segment_info::table
            .filter(dsl::doc_id.eq(doc_id))
            .order((dsl::seg_page_idx.asc(), dsl::seg_id.asc()))
            .select(Segment::as_select())
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(segments)
    }

    async fn delete_document_segments(&mut self, doc_id: &str) -> PgResult<usize> {
        use schema::segment_info::{self, dsl};

        let affected = diesel::delete(segment_info::table.filter(dsl::doc_id.eq(doc_id)))
            .execute(self)
            .await
            .map_err(PgError::from)?;

        Ok(affected)
    }

    async fn count_document_segments(&mut self, doc_id: &str) -> PgResult<i64> {
        use schema::segment_info::{self, dsl};

        let count = segment_info::table
            .filter(dsl::doc_id.eq(doc_id))
            .count()
            .get_result(self)
            .await
            .map_err(PgError::from)?;

        Ok(count)
    }
}
