//! Segment type enumeration.

use diesel_derive_enum::DbEnum;
#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Structural kind of a segment derived from a document page.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[derive(Serialize, Deserialize, DbEnum, Display, EnumIter, EnumString)]
#[ExistingTypePath = "crate::schema::sql_types::SegType"]
pub enum SegType {
    /// Plain text paragraph(s)
    #[db_rename = "text"]
    #[serde(rename = "text")]
    #[strum(serialize = "text")]
    Text,

    /// Table stored as HTML
    #[db_rename = "table"]
    #[serde(rename = "table")]
    #[strum(serialize = "table")]
    Table,

    /// Image reference with caption marker content
    #[db_rename = "image"]
    #[serde(rename = "image")]
    #[strum(serialize = "image")]
    Image,

    /// Optional coarse-grained per-page summary
    #[db_rename = "page_summary"]
    #[serde(rename = "page_summary")]
    #[strum(serialize = "page_summary")]
    PageSummary,
}

impl SegType {
    /// Returns whether segments of this type are indexed into the vector
    /// and lexical stores.
    ///
    /// Image segments live in the metadata store only; their caption marker
    /// content keeps them retrievable through hydration of neighbors.
    #[inline]
    pub fn is_indexable(self) -> bool {
        matches!(self, SegType::Text | SegType::Table | SegType::PageSummary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexability() {
        assert!(SegType::Text.is_indexable());
        assert!(SegType::Table.is_indexable());
        assert!(SegType::PageSummary.is_indexable());
        assert!(!SegType::Image.is_indexable());
    }

    #[test]
    fn test_string_round_trip() {
        assert_eq!(SegType::PageSummary.to_string(), "page_summary");
        let parsed: SegType = "table".parse().unwrap();
        assert_eq!(parsed, SegType::Table);
    }
}
