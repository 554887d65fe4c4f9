//! Callback delivery response.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Outcome of one callback delivery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackResponse {
    /// HTTP status code returned by the endpoint.
    pub status_code: u16,
    /// Timestamp when the attempt started.
    pub started_at: Timestamp,
    /// Timestamp when the response arrived.
    pub completed_at: Timestamp,
}

impl CallbackResponse {
    /// Creates a response record.
    pub fn new(status_code: u16, started_at: Timestamp) -> Self {
        Self {
            status_code,
            started_at,
            completed_at: Timestamp::now(),
        }
    }

    /// Returns whether the endpoint acknowledged the callback (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Returns the round-trip duration of the attempt.
    pub fn elapsed(&self) -> jiff::SignedDuration {
        self.completed_at.duration_since(self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_classification() {
        assert!(CallbackResponse::new(200, Timestamp::now()).is_success());
        assert!(CallbackResponse::new(204, Timestamp::now()).is_success());
        assert!(!CallbackResponse::new(302, Timestamp::now()).is_success());
        assert!(!CallbackResponse::new(500, Timestamp::now()).is_success());
    }
}
