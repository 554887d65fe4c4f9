//! Chat session and message repository.

use std::future::Future;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::model::{ChatMessage, NewChatMessage, NewChatSession};
use crate::{PgConnection, PgError, PgResult, schema};

/// Hard cap on rows scanned while assembling prompt history.
///
/// The character budget is the real bound; this only protects against a
/// pathological session with thousands of tiny turns.
const MAX_HISTORY_SCAN: i64 = 200;

/// Repository for chat persistence.
pub trait ChatRepository {
    /// Creates the session row if it does not exist yet.
    fn ensure_session(&mut self, session_id: &str) -> impl Future<Output = PgResult<()>> + Send;

    /// Appends a message to a session.
    ///
    /// Ordering within a session is `(created_at, id)`; callers serialize
    /// appends per session so the stored order equals the append order.
    fn append_message(
        &mut self,
        message: NewChatMessage,
    ) -> impl Future<Output = PgResult<ChatMessage>> + Send;

    /// Loads recent history for prompting, oldest-first.
    ///
    /// Walks messages newest-first, skipping turns excluded from history,
    /// and stops once the cumulative character count exceeds `max_chars`;
    /// the turn that crosses the budget is kept.
    fn load_recent_messages(
        &mut self,
        session_id: &str,
        max_chars: usize,
    ) -> impl Future<Output = PgResult<Vec<ChatMessage>>> + Send;
}

impl ChatRepository for PgConnection {
    async fn ensure_session(&mut self, session_id: &str) -> PgResult<()> {
        use schema::chat_sessions::{self, dsl};

        diesel::insert_into(chat_sessions::table)
            .values(NewChatSession {
                session_id: session_id.to_owned(),
            })
            .on_conflict(dsl::session_id)
            .do_nothing()
            .execute(self)
            .await
            .map_err(PgError::from)?;

        Ok(())
    }

    async fn append_message(&mut self, message: NewChatMessage) -> PgResult<ChatMessage> {
        use schema::{chat_messages, chat_sessions};

        let row = diesel::insert_into(chat_messages::table)
            .values(&message)
            .returning(ChatMessage::as_returning())
            .get_result(self)
            .await
            .map_err(PgError::from)?;

        diesel::update(
            chat_sessions::table.filter(chat_sessions::session_id.eq(&row.session_id)),
        )
        .set(chat_sessions::updated_at.eq(diesel::dsl::now))
        .execute(self)
        .await
        .map_err(PgError::from)?;

        Ok(row)
    }

    async fn load_recent_messages(
        &mut self,
        session_id: &str,
        max_chars: usize,
    ) -> PgResult<Vec<ChatMessage>> {
        use schema::chat_messages::{self, dsl};

        let newest_first: Vec<ChatMessage> = chat_messages::table
            .filter(dsl::session_id.eq(session_id))
            .filter(dsl::excluded_from_history.eq(false))
            .order((dsl::created_at.desc(), dsl::id.desc()))
            .limit(MAX_HISTORY_SCAN)
            .select(ChatMessage::as_select())
            .load(self)
            .await
            .map_err(PgError::from)?;

        let mut budget = 0usize;
        let mut kept = Vec::new();
        for message in newest_first {
            let over = budget > max_chars;
            if over {
                break;
            }
            budget += message.content.chars().count();
            kept.push(message);
        }

        kept.reverse();
        Ok(kept)
    }
}
