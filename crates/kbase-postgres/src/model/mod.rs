//! Database models mapping to the persisted schema.

mod chat;
mod doc_page;
mod document;
mod permission;
mod segment;

pub use chat::{ChatMessage, ChatSession, NewChatMessage, NewChatSession};
pub use doc_page::{DocPage, NewDocPage};
pub use document::{Document, DocumentArtifacts, NewDocument};
pub use permission::{NewPermissionLink, PermissionLink};
pub use segment::{NewSegment, Segment};
