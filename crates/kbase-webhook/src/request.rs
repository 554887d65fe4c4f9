//! Status update and callback payload types.

use kbase_postgres::types::ProcessStatus;
#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Coarse-grained milestone statuses visible to the external orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub enum ExternalStatus {
    /// Structure extraction finished; layout artifacts are available.
    #[serde(rename = "layout_ready")]
    LayoutReady,
    /// The document is fully indexed and retrievable.
    #[serde(rename = "fully_processed")]
    FullyProcessed,
    /// Processing ended in a failure state.
    #[serde(rename = "processing_failed")]
    ProcessingFailed,
}

impl ExternalStatus {
    /// Maps an internal pipeline status to its external milestone.
    ///
    /// Returns `None` for statuses the orchestrator is not told about;
    /// those updates are filtered without a call.
    pub fn from_internal(status: ProcessStatus) -> Option<Self> {
        match status {
            ProcessStatus::Parsed => Some(ExternalStatus::LayoutReady),
            ProcessStatus::Splited => Some(ExternalStatus::FullyProcessed),
            status if status.is_failure() => Some(ExternalStatus::ProcessingFailed),
            _ => None,
        }
    }
}

/// A milestone notification handed to the synchronizer.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    /// Document the update concerns.
    pub doc_id: String,
    /// Internal status reached.
    pub status: ProcessStatus,
    /// Request id threaded through for tracing.
    pub request_id: String,
    /// Endpoint to notify; falls back to the configured default when
    /// absent.
    pub callback_url: Option<Url>,
}

impl StatusUpdate {
    /// Creates a new status update.
    pub fn new(
        doc_id: impl Into<String>,
        status: ProcessStatus,
        request_id: impl Into<String>,
        callback_url: Option<Url>,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            status,
            request_id: request_id.into(),
            callback_url,
        }
    }

    /// Returns whether this update reports a failure milestone.
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }
}

/// JSON body POSTed to the external orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct CallbackPayload {
    /// Document the milestone concerns.
    pub doc_id: String,
    /// External milestone status.
    pub status: ExternalStatus,
    /// Request id for end-to-end tracing.
    pub request_id: String,
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_milestone_mapping() {
        assert_eq!(
            ExternalStatus::from_internal(ProcessStatus::Parsed),
            Some(ExternalStatus::LayoutReady)
        );
        assert_eq!(
            ExternalStatus::from_internal(ProcessStatus::Splited),
            Some(ExternalStatus::FullyProcessed)
        );
        for status in ProcessStatus::iter().filter(|s| s.is_failure()) {
            assert_eq!(
                ExternalStatus::from_internal(status),
                Some(ExternalStatus::ProcessingFailed)
            );
        }
    }

    #[test]
    fn test_intermediate_statuses_are_filtered() {
        for status in [
            ProcessStatus::Pending,
            ProcessStatus::Converting,
            ProcessStatus::Parsing,
            ProcessStatus::Merging,
            ProcessStatus::Merged,
            ProcessStatus::Chunking,
            ProcessStatus::Chunked,
            ProcessStatus::Vectorizing,
        ] {
            assert_eq!(ExternalStatus::from_internal(status), None);
        }
    }

    #[test]
    fn test_payload_shape() {
        let payload = CallbackPayload {
            doc_id: "doc-1".to_owned(),
            status: ExternalStatus::LayoutReady,
            request_id: "req-1".to_owned(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["doc_id"], "doc-1");
        assert_eq!(value["status"], "layout_ready");
        assert_eq!(value["request_id"], "req-1");
    }
}
