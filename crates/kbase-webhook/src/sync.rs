//! Milestone synchronization with filtering, retries, and safe logging.

use std::sync::Arc;

use crate::client::StatusSyncConfig;
use crate::request::{CallbackPayload, ExternalStatus, StatusUpdate};
use crate::{CallbackProvider, TRACING_TARGET};

/// Outcome of one synchronization, as recorded in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The update was filtered (non-milestone status) or syncing is
    /// disabled; no call was made.
    Skipped,
    /// The endpoint acknowledged the milestone.
    Delivered,
    /// Every attempt failed for a success milestone.
    Failed,
    /// Every attempt failed for a failure milestone. Elevated severity:
    /// the user-facing failure notification itself never arrived.
    FailedForFailureStatus,
}

/// Synchronizes internal milestones to the external orchestrator.
///
/// Never returns an error: every outcome is converted into a structured
/// log record. Callers treat this as fire-and-forget.
#[derive(Clone)]
pub struct StatusSynchronizer {
    provider: Arc<dyn CallbackProvider>,
    config: StatusSyncConfig,
}

impl StatusSynchronizer {
    /// Creates a synchronizer from a delivery provider and configuration.
    pub fn new<P>(provider: P, config: StatusSyncConfig) -> Self
    where
        P: CallbackProvider + 'static,
    {
        Self {
            provider: Arc::new(provider),
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StatusSyncConfig {
        &self.config
    }

    /// Synchronizes one update, absorbing every failure into logs.
    pub async fn sync_safely(&self, update: &StatusUpdate) -> SyncOutcome {
        if !self.config.status_sync_enabled {
            tracing::info!(
                target: TRACING_TARGET,
                outcome = "sync-skipped",
                request_id = %update.request_id,
                doc_id = %update.doc_id,
                status = %update.status,
                "Status sync disabled, skipping"
            );
            return SyncOutcome::Skipped;
        }

        let Some(external) = ExternalStatus::from_internal(update.status) else {
            tracing::info!(
                target: TRACING_TARGET,
                outcome = "sync-skipped",
                request_id = %update.request_id,
                doc_id = %update.doc_id,
                status = %update.status,
                "Status is not a milestone, skipping"
            );
            return SyncOutcome::Skipped;
        };

        let Some(callback_url) = update
            .callback_url
            .as_ref()
            .or(self.config.status_sync_url.as_ref())
        else {
            tracing::warn!(
                target: TRACING_TARGET,
                outcome = "sync-skipped",
                request_id = %update.request_id,
                doc_id = %update.doc_id,
                status = %update.status,
                "No callback endpoint configured, skipping milestone"
            );
            return SyncOutcome::Skipped;
        };

        let payload = CallbackPayload {
            doc_id: update.doc_id.clone(),
            status: external,
            request_id: update.request_id.clone(),
        };

        let attempts = self.config.status_sync_retry_attempts.max(1);
        for attempt in 1..=attempts {
            match self.provider.deliver(callback_url, &payload).await {
                Ok(response) if response.is_success() => {
                    tracing::info!(
                        target: TRACING_TARGET,
                        outcome = "sync-ok",
                        request_id = %update.request_id,
                        doc_id = %update.doc_id,
                        status = %update.status,
                        external_status = ?external,
                        attempt,
                        elapsed_ms = response.elapsed().as_millis(),
                        "Status callback delivered"
                    );
                    return SyncOutcome::Delivered;
                }
                Ok(response) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        request_id = %update.request_id,
                        doc_id = %update.doc_id,
                        status_code = response.status_code,
                        attempt,
                        attempts,
                        "Status callback rejected by endpoint"
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        request_id = %update.request_id,
                        doc_id = %update.doc_id,
                        error = %error,
                        attempt,
                        attempts,
                        "Status callback attempt failed"
                    );
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay()).await;
            }
        }

        if update.is_failure() {
            tracing::error!(
                target: TRACING_TARGET,
                outcome = "sync-failed-for-failure-status",
                request_id = %update.request_id,
                doc_id = %update.doc_id,
                status = %update.status,
                "Failure milestone could not be delivered; the caller may wait indefinitely"
            );
            SyncOutcome::FailedForFailureStatus
        } else {
            tracing::error!(
                target: TRACING_TARGET,
                outcome = "sync-failed",
                request_id = %update.request_id,
                doc_id = %update.doc_id,
                status = %update.status,
                "Milestone could not be delivered"
            );
            SyncOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use jiff::Timestamp;
    use kbase_core::{Error, Result};
    use kbase_postgres::types::ProcessStatus;
    use url::Url;

    use super::*;
    use crate::response::CallbackResponse;

    /// Records deliveries and replays scripted status codes.
    struct ScriptedProvider {
        codes: Mutex<Vec<u16>>,
        delivered: Mutex<Vec<CallbackPayload>>,
    }

    impl ScriptedProvider {
        fn new(codes: Vec<u16>) -> Self {
            Self {
                codes: Mutex::new(codes),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl CallbackProvider for ScriptedProvider {
        async fn deliver(
            &self,
            _url: &Url,
            payload: &CallbackPayload,
        ) -> Result<CallbackResponse> {
            self.delivered.lock().unwrap().push(payload.clone());
            let mut codes = self.codes.lock().unwrap();
            if codes.is_empty() {
                return Err(Error::network_error());
            }
            Ok(CallbackResponse::new(codes.remove(0), Timestamp::now()))
        }
    }

    fn enabled_config() -> StatusSyncConfig {
        StatusSyncConfig {
            status_sync_enabled: true,
            status_sync_retry_delay_secs: 0,
            ..StatusSyncConfig::default()
        }
    }

    fn update(status: ProcessStatus) -> StatusUpdate {
        StatusUpdate::new(
            "doc-1",
            status,
            "req-1",
            Some(Url::parse("https://orchestrator.internal/callback").unwrap()),
        )
    }

    #[tokio::test]
    async fn test_disabled_sync_skips() {
        let sync = StatusSynchronizer::new(
            ScriptedProvider::new(vec![200]),
            StatusSyncConfig::default(),
        );
        let outcome = sync.sync_safely(&update(ProcessStatus::Parsed)).await;
        assert_eq!(outcome, SyncOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_non_milestone_is_filtered() {
        let provider = ScriptedProvider::new(vec![200]);
        let sync = StatusSynchronizer::new(provider, enabled_config());
        let outcome = sync.sync_safely(&update(ProcessStatus::Chunking)).await;
        assert_eq!(outcome, SyncOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_delivery_retries_until_acknowledged() {
        let sync = StatusSynchronizer::new(
            ScriptedProvider::new(vec![500, 502, 200]),
            enabled_config(),
        );
        let outcome = sync.sync_safely(&update(ProcessStatus::Splited)).await;
        assert_eq!(outcome, SyncOutcome::Delivered);
    }

    #[tokio::test]
    async fn test_failure_status_exhaustion_is_elevated() {
        let sync =
            StatusSynchronizer::new(ScriptedProvider::new(vec![500, 500, 500]), enabled_config());
        let outcome = sync.sync_safely(&update(ProcessStatus::ParseFailed)).await;
        assert_eq!(outcome, SyncOutcome::FailedForFailureStatus);
    }

    #[tokio::test]
    async fn test_success_status_exhaustion() {
        let sync = StatusSynchronizer::new(ScriptedProvider::new(vec![]), enabled_config());
        let outcome = sync.sync_safely(&update(ProcessStatus::Parsed)).await;
        assert_eq!(outcome, SyncOutcome::Failed);
    }
}
