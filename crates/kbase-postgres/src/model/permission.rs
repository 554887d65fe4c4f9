//! Permission link model for the `permission_doc_link` table.

use diesel::prelude::*;
use jiff_diesel::Timestamp;

use crate::schema::permission_doc_link;

/// Grants a subject access to a document.
///
/// A row with no `subject_id` marks the document as unrestricted: any
/// subject is authorized for it.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = permission_doc_link)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PermissionLink {
    /// Surrogate row id.
    pub id: i64,
    /// Kind of subject the grant targets (e.g. "department", "role").
    pub permission_type: String,
    /// Subject the grant targets; `None` means unrestricted.
    pub subject_id: Option<String>,
    /// Target document.
    pub doc_id: String,
    /// Timestamp when the grant was created.
    pub created_at: Timestamp,
}

/// Data for inserting a permission link.
#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = permission_doc_link)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewPermissionLink {
    /// Kind of subject the grant targets.
    pub permission_type: String,
    /// Subject the grant targets; `None` means unrestricted.
    pub subject_id: Option<String>,
    /// Target document.
    pub doc_id: String,
}

impl NewPermissionLink {
    /// Creates a grant for a specific subject.
    ///
    /// An empty subject id is normalized to an unrestricted grant, matching
    /// the query semantics where missing and empty are equivalent.
    pub fn for_subject(
        permission_type: impl Into<String>,
        subject_id: impl Into<String>,
        doc_id: impl Into<String>,
    ) -> Self {
        let subject_id = subject_id.into();
        Self {
            permission_type: permission_type.into(),
            subject_id: (!subject_id.is_empty()).then_some(subject_id),
            doc_id: doc_id.into(),
        }
    }

    /// Creates an unrestricted grant for a document.
    pub fn unrestricted(permission_type: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            permission_type: permission_type.into(),
            subject_id: None,
            doc_id: doc_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_subject_becomes_unrestricted() {
        let link = NewPermissionLink::for_subject("department", "", "doc-1");
        assert!(link.subject_id.is_none());

        let link = NewPermissionLink::for_subject("department", "dep-7", "doc-1");
        assert_eq!(link.subject_id.as_deref(), Some("dep-7"));
    }
}
