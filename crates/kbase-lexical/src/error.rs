//! Error types for lexical store operations.

/// Result type for all lexical store operations in this crate.
pub type LexicalResult<T, E = LexicalError> = std::result::Result<T, E>;

/// Unified error type for lexical store operations.
#[derive(Debug, thiserror::Error)]
pub enum LexicalError {
    /// Underlying tantivy failure
    #[error("Index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    /// Index directory could not be opened
    #[error("Index directory error: {0}")]
    Directory(#[from] tantivy::directory::error::OpenDirectoryError),

    /// Filesystem failure while preparing the index directory
    #[error("Index io error: {0}")]
    Io(#[from] std::io::Error),

    /// The query could not be parsed even leniently
    #[error("Query parse error: {0}")]
    QueryParse(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A blocking index task failed to complete
    #[error("Index task failed: {0}")]
    Task(String),
}

impl From<LexicalError> for kbase_core::Error {
    fn from(value: LexicalError) -> Self {
        use kbase_core::{Error, ErrorKind};

        let kind = match &value {
            LexicalError::Index(_) | LexicalError::Task(_) => ErrorKind::InternalError,
            LexicalError::Directory(_) | LexicalError::Io(_) => ErrorKind::ServiceUnavailable,
            LexicalError::QueryParse(_) => ErrorKind::InvalidInput,
            LexicalError::Config(_) => ErrorKind::Configuration,
        };

        Error::new(kind)
            .with_message(value.to_string())
            .with_source(Box::new(value))
    }
}
