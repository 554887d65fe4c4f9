//! Common error type definitions.

use thiserror::Error;

/// Type alias for boxed dynamic errors that can be sent across threads.
///
/// Used as the source slot of [`Error`], wrapping any error that implements
/// the standard `Error` trait while keeping Send and Sync bounds.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for Results with our custom Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of errors that can occur across kbase services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input validation failed.
    InvalidInput,
    /// Input exceeds a model or API length limit; never retried.
    OverlongInput,
    /// A record with the same identity already exists.
    Duplicate,
    /// The operation conflicts with in-flight state (e.g. re-upload while processing).
    Conflict,
    /// A document status transition violates the pipeline state machine.
    IllegalTransition,
    /// Subject is not permitted to access the resource.
    Authorization,
    /// Resource not found.
    NotFound,
    /// Rate limit exceeded or limiter queue full.
    RateLimited,
    /// Backend temporarily unavailable.
    ServiceUnavailable,
    /// Operation timed out.
    Timeout,
    /// Network-level failure.
    NetworkError,
    /// Serialization/deserialization failure.
    Serialization,
    /// Configuration error.
    Configuration,
    /// External collaborator (converter, parser, model runtime) failed.
    ExternalError,
    /// Internal invariant violation.
    InternalError,
}

/// A structured error type shared by the gateway and orchestration layers.
#[derive(Debug, Error)]
#[error("{kind:?}{}", message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional error message.
    pub message: Option<String>,
    /// Optional source error.
    #[source]
    pub source: Option<BoxedError>,
}

impl Error {
    /// Creates a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Adds a message to this error.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds a source error to this error.
    pub fn with_source(mut self, source: BoxedError) -> Self {
        self.source = Some(source);
        self
    }

    /// Creates a new invalid input error.
    pub fn invalid_input() -> Self {
        Self::new(ErrorKind::InvalidInput)
    }

    /// Creates a new overlong input error.
    pub fn overlong_input() -> Self {
        Self::new(ErrorKind::OverlongInput)
    }

    /// Creates a new duplicate error.
    pub fn duplicate() -> Self {
        Self::new(ErrorKind::Duplicate)
    }

    /// Creates a new conflict error.
    pub fn conflict() -> Self {
        Self::new(ErrorKind::Conflict)
    }

    /// Creates a new illegal transition error.
    pub fn illegal_transition() -> Self {
        Self::new(ErrorKind::IllegalTransition)
    }

    /// Creates a new authorization error.
    pub fn authorization() -> Self {
        Self::new(ErrorKind::Authorization)
    }

    /// Creates a new not found error.
    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound)
    }

    /// Creates a new rate limited error.
    pub fn rate_limited() -> Self {
        Self::new(ErrorKind::RateLimited)
    }

    /// Creates a new service unavailable error.
    pub fn service_unavailable() -> Self {
        Self::new(ErrorKind::ServiceUnavailable)
    }

    /// Creates a new timeout error.
    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout)
    }

    /// Creates a new network error.
    pub fn network_error() -> Self {
        Self::new(ErrorKind::NetworkError)
    }

    /// Creates a new serialization error.
    pub fn serialization() -> Self {
        Self::new(ErrorKind::Serialization)
    }

    /// Creates a new configuration error.
    pub fn configuration() -> Self {
        Self::new(ErrorKind::Configuration)
    }

    /// Creates a new external error.
    pub fn external_error() -> Self {
        Self::new(ErrorKind::ExternalError)
    }

    /// Creates a new internal error.
    pub fn internal_error() -> Self {
        Self::new(ErrorKind::InternalError)
    }

    /// Returns true if this is a client error (4xx equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::InvalidInput
                | ErrorKind::OverlongInput
                | ErrorKind::Duplicate
                | ErrorKind::Conflict
                | ErrorKind::Authorization
                | ErrorKind::NotFound
                | ErrorKind::RateLimited
        )
    }

    /// Returns true if this error is transient and a retry may succeed.
    ///
    /// Overlong inputs are deliberately excluded: resubmitting the same
    /// oversized payload can never succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::NetworkError
                | ErrorKind::RateLimited
                | ErrorKind::ServiceUnavailable
                | ErrorKind::Timeout
        )
    }

    /// Returns true if this is a timeout error.
    pub fn is_timeout_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = Error::new(ErrorKind::InvalidInput);
        assert_eq!(error.kind, ErrorKind::InvalidInput);
        assert!(error.message.is_none());
        assert!(error.source.is_none());
    }

    #[test]
    fn test_error_with_message() {
        let error = Error::overlong_input().with_message("query exceeds 2000 characters");
        assert_eq!(error.kind, ErrorKind::OverlongInput);
        assert_eq!(
            error.message.as_deref(),
            Some("query exceeds 2000 characters")
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(Error::invalid_input().is_client_error());
        assert!(Error::overlong_input().is_client_error());
        assert!(Error::duplicate().is_client_error());
        assert!(Error::conflict().is_client_error());
        assert!(Error::authorization().is_client_error());
        assert!(!Error::internal_error().is_client_error());
        assert!(!Error::external_error().is_client_error());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(Error::rate_limited().is_retryable());
        assert!(Error::service_unavailable().is_retryable());
        assert!(Error::network_error().is_retryable());
        assert!(Error::timeout().is_retryable());
        // Overlong inputs must never be retried.
        assert!(!Error::overlong_input().is_retryable());
        assert!(!Error::invalid_input().is_retryable());
        assert!(!Error::illegal_transition().is_retryable());
    }

    #[test]
    fn test_error_display() {
        let error = Error::illegal_transition().with_message("splited -> parsing");
        let rendered = format!("{}", error);
        assert!(rendered.contains("IllegalTransition"));
        assert!(rendered.contains("splited -> parsing"));
    }
}
