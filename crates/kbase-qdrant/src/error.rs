//! Error types for vector store operations.

/// Result type for all vector store operations in this crate.
pub type QdrantResult<T, E = QdrantError> = std::result::Result<T, E>;

/// Unified error type for vector store operations.
#[derive(Debug, thiserror::Error)]
pub enum QdrantError {
    /// Qdrant client/connection errors
    #[error("Qdrant connection error: {0}")]
    Connection(#[from] qdrant_client::QdrantError),

    /// Invalid vector dimensions
    #[error("Invalid vector dimensions: expected {expected}, got {actual}")]
    InvalidVectorDimensions { expected: usize, actual: usize },

    /// A returned point is missing a required payload attribute
    #[error("Malformed point payload: {reason}")]
    MalformedPayload { reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl From<QdrantError> for kbase_core::Error {
    fn from(value: QdrantError) -> Self {
        use kbase_core::{Error, ErrorKind};

        let kind = match &value {
            QdrantError::Connection(_) => ErrorKind::ServiceUnavailable,
            QdrantError::InvalidVectorDimensions { .. } => ErrorKind::InvalidInput,
            QdrantError::MalformedPayload { .. } => ErrorKind::InternalError,
            QdrantError::InvalidConfig { .. } => ErrorKind::Configuration,
        };

        Error::new(kind)
            .with_message(value.to_string())
            .with_source(Box::new(value))
    }
}
