//! Error types for metadata store operations.

use std::borrow::Cow;

use deadpool::managed::TimeoutType;
use diesel::result::{ConnectionError, DatabaseErrorKind, Error as DieselError};
use diesel_async::pooled_connection::PoolError as DieselPoolError;
use diesel_async::pooled_connection::deadpool::PoolError as DeadpoolError;

/// Type-erased error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for Results with [`PgError`].
pub type PgResult<T> = std::result::Result<T, PgError>;

/// Comprehensive error type for all metadata store operations.
#[derive(Debug, thiserror::Error)]
#[must_use = "database errors should be handled appropriately"]
pub enum PgError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database operation timed out waiting on the pool.
    #[error("Database operation timed out")]
    Timeout(TimeoutType),

    /// Failed to establish or maintain a database connection.
    #[error("Database connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Database migration operation failed.
    #[error("Database migration error: {0}")]
    Migration(BoxError),

    /// Database query execution failed.
    #[error("Database query error: {0}")]
    Query(#[from] DieselError),

    /// A record with the same identity already exists.
    #[error("Duplicate record: {0}")]
    Duplicate(Cow<'static, str>),

    /// The operation conflicts with in-flight document processing.
    #[error("Conflicting operation: {0}")]
    Conflict(Cow<'static, str>),

    /// A document status transition violated the pipeline state machine.
    #[error("Illegal status transition: {0}")]
    IllegalTransition(Cow<'static, str>),

    /// The referenced row does not exist.
    #[error("Record not found: {0}")]
    NotFound(Cow<'static, str>),

    /// Unexpected error occurred.
    #[error("Unexpected error: {0}")]
    Unexpected(Cow<'static, str>),
}

impl PgError {
    /// Returns the violated constraint name for constraint violation errors.
    pub fn constraint(&self) -> Option<&str> {
        let PgError::Query(err) = self else {
            return None;
        };

        let DieselError::DatabaseError(_, info) = err else {
            return None;
        };

        info.constraint_name()
    }

    /// Returns whether this error is a unique constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            PgError::Query(DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                _
            )) | PgError::Duplicate(_)
        )
    }

    /// Returns whether this error indicates a transient failure that might
    /// succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PgError::Timeout(_) | PgError::Connection(ConnectionError::BadConnection(_))
        )
    }

    /// Returns whether this error indicates a permanent failure.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

impl From<DeadpoolError> for PgError {
    fn from(value: DeadpoolError) -> Self {
        match value {
            DeadpoolError::Timeout(timeout) => Self::Timeout(timeout),
            DeadpoolError::Backend(DieselPoolError::QueryError(error)) => Self::Query(error),
            DeadpoolError::Backend(DieselPoolError::ConnectionError(error)) => {
                Self::Connection(error)
            }
            DeadpoolError::PostCreateHook(err) => {
                tracing::warn!("Unexpected post-create hook error: {}", err);
                Self::Unexpected(err.to_string().into())
            }
            DeadpoolError::NoRuntimeSpecified => {
                tracing::error!("No tokio runtime specified for connection pool");
                Self::Unexpected("No runtime specified".into())
            }
            DeadpoolError::Closed => Self::Unexpected("Connection pool is closed".into()),
        }
    }
}

impl From<PgError> for kbase_core::Error {
    fn from(value: PgError) -> Self {
        use kbase_core::{Error, ErrorKind};

        let kind = match &value {
            PgError::Duplicate(_) => ErrorKind::Duplicate,
            PgError::Conflict(_) => ErrorKind::Conflict,
            PgError::IllegalTransition(_) => ErrorKind::IllegalTransition,
            PgError::NotFound(_) => ErrorKind::NotFound,
            PgError::Timeout(_) => ErrorKind::Timeout,
            PgError::Connection(_) => ErrorKind::ServiceUnavailable,
            PgError::Config(_) => ErrorKind::Configuration,
            PgError::Query(_) if value.is_unique_violation() => ErrorKind::Duplicate,
            PgError::Query(_) | PgError::Migration(_) | PgError::Unexpected(_) => {
                ErrorKind::InternalError
            }
        };

        Error::new(kind)
            .with_message(value.to_string())
            .with_source(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(PgError::Timeout(TimeoutType::Wait).is_transient());
        assert!(PgError::Duplicate("doc-1".into()).is_permanent());
        assert!(PgError::IllegalTransition("splited -> parsing".into()).is_permanent());
    }

    #[test]
    fn test_core_error_mapping() {
        let error: kbase_core::Error = PgError::Duplicate("seg".into()).into();
        assert_eq!(error.kind, kbase_core::ErrorKind::Duplicate);

        let error: kbase_core::Error = PgError::Conflict("doc in flight".into()).into();
        assert_eq!(error.kind, kbase_core::ErrorKind::Conflict);

        let error: kbase_core::Error = PgError::NotFound("doc-1".into()).into();
        assert_eq!(error.kind, kbase_core::ErrorKind::NotFound);
    }
}
