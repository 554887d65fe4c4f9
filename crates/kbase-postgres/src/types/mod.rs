//! Column types shared by models and repositories.

mod message_metadata;
mod message_role;
mod process_status;
mod seg_type;

pub use message_metadata::{MessageMetadata, MessageMetadataV1, SourceRef};
pub use message_role::MessageRole;
pub use process_status::ProcessStatus;
pub use seg_type::SegType;
