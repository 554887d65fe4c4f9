//! Page model for the `doc_page_info` table.

use diesel::prelude::*;
use jiff_diesel::Timestamp;

use crate::schema::doc_page_info;

/// A rendered page artifact produced during the merge stage.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = doc_page_info)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DocPage {
    /// Surrogate row id.
    pub id: i64,
    /// Owning document.
    pub doc_id: String,
    /// 1-based page index; unique per document.
    pub page_idx: i32,
    /// Path of the rendered page image, when one was produced.
    pub page_image_path: Option<String>,
    /// Timestamp when the row was created.
    pub created_at: Timestamp,
}

/// Data for inserting a page row.
#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = doc_page_info)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewDocPage {
    /// Owning document.
    pub doc_id: String,
    /// 1-based page index.
    pub page_idx: i32,
    /// Rendered page image path.
    pub page_image_path: Option<String>,
}
