//! Chat session and message models.

use diesel::prelude::*;
use jiff_diesel::Timestamp;

use crate::schema::{chat_messages, chat_sessions};
use crate::types::MessageRole;

/// A conversation scope for chat history.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = chat_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ChatSession {
    /// Caller-provided opaque session identifier.
    pub session_id: String,
    /// Timestamp when the session was created.
    pub created_at: Timestamp,
    /// Timestamp when the session last received a message.
    pub updated_at: Timestamp,
}

/// Data for creating a session.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = chat_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewChatSession {
    /// Session identifier.
    pub session_id: String,
}

/// A single stored chat turn.
///
/// Messages within a session are totally ordered by `(created_at, id)`.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = chat_messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ChatMessage {
    /// Monotonic insertion id; the ordering tie-break.
    pub id: i64,
    /// Owning session.
    pub session_id: String,
    /// Author role.
    pub message_type: MessageRole,
    /// Message text.
    pub content: String,
    /// Versioned metadata blob (see [`MessageMetadata`]).
    ///
    /// [`MessageMetadata`]: crate::types::MessageMetadata
    pub metadata: Option<serde_json::Value>,
    /// Quality gate: excluded turns never enter prompt history.
    pub excluded_from_history: bool,
    /// Timestamp when the message was appended.
    pub created_at: Timestamp,
}

/// Data for appending a message.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = chat_messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewChatMessage {
    /// Owning session.
    pub session_id: String,
    /// Author role.
    pub message_type: MessageRole,
    /// Message text.
    pub content: String,
    /// Validated metadata blob.
    pub metadata: Option<serde_json::Value>,
    /// Whether the turn is excluded from prompt history.
    pub excluded_from_history: bool,
}

impl NewChatMessage {
    /// Creates a plain message included in history.
    pub fn new(
        session_id: impl Into<String>,
        message_type: MessageRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            message_type,
            content: content.into(),
            metadata: None,
            excluded_from_history: false,
        }
    }

    /// Attaches validated metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Marks the turn as excluded from prompt history.
    pub fn excluded(mut self) -> Self {
        self.excluded_from_history = true;
        self
    }
}
