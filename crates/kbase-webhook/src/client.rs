//! Reqwest-based callback delivery client and configuration.

use std::fmt;
use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use jiff::Timestamp;
use kbase_core::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::request::CallbackPayload;
use crate::response::CallbackResponse;
use crate::{CallbackProvider, TRACING_TARGET};

/// Status synchronization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct StatusSyncConfig {
    /// Master switch; when disabled every update is logged and skipped
    #[cfg_attr(
        feature = "config",
        arg(long = "status-sync-enabled", env = "STATUS_SYNC_ENABLED")
    )]
    #[serde(default)]
    pub status_sync_enabled: bool,

    /// Default callback endpoint when the upload did not carry one
    #[cfg_attr(
        feature = "config",
        arg(long = "status-sync-url", env = "STATUS_SYNC_URL")
    )]
    pub status_sync_url: Option<Url>,

    /// Per-request timeout in seconds
    #[cfg_attr(
        feature = "config",
        arg(
            long = "status-sync-timeout-secs",
            env = "STATUS_SYNC_TIMEOUT",
            default_value_t = 10
        )
    )]
    #[serde(default = "default_timeout_secs")]
    pub status_sync_timeout_secs: u64,

    /// Delivery attempts per update, including the first
    #[cfg_attr(
        feature = "config",
        arg(
            long = "status-sync-retry-attempts",
            env = "STATUS_SYNC_RETRY_ATTEMPTS",
            default_value_t = 3
        )
    )]
    #[serde(default = "default_retry_attempts")]
    pub status_sync_retry_attempts: u32,

    /// Fixed delay between attempts in seconds
    #[cfg_attr(
        feature = "config",
        arg(
            long = "status-sync-retry-delay-secs",
            env = "STATUS_SYNC_RETRY_DELAY",
            default_value_t = 2
        )
    )]
    #[serde(default = "default_retry_delay_secs")]
    pub status_sync_retry_delay_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    2
}

impl Default for StatusSyncConfig {
    fn default() -> Self {
        Self {
            status_sync_enabled: false,
            status_sync_url: None,
            status_sync_timeout_secs: default_timeout_secs(),
            status_sync_retry_attempts: default_retry_attempts(),
            status_sync_retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl StatusSyncConfig {
    /// Returns the per-request timeout.
    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.status_sync_timeout_secs)
    }

    /// Returns the delay between retry attempts.
    #[inline]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.status_sync_retry_delay_secs)
    }
}

/// Reqwest-based HTTP client delivering callback payloads.
#[derive(Clone)]
pub struct CallbackClient {
    http: Client,
}

impl fmt::Debug for CallbackClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackClient").finish_non_exhaustive()
    }
}

impl CallbackClient {
    /// Creates a new client with the configured timeout.
    pub fn new(config: &StatusSyncConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                Error::configuration()
                    .with_message("failed to build callback HTTP client")
                    .with_source(Box::new(e))
            })?;

        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl CallbackProvider for CallbackClient {
    async fn deliver(&self, url: &Url, payload: &CallbackPayload) -> Result<CallbackResponse> {
        let started_at = Timestamp::now();

        tracing::debug!(
            target: TRACING_TARGET,
            request_id = %payload.request_id,
            doc_id = %payload.doc_id,
            url = %url,
            "Delivering status callback"
        );

        let response = self
            .http
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                let base = if e.is_timeout() {
                    Error::timeout()
                } else {
                    Error::network_error()
                };
                base.with_message("callback request failed")
                    .with_source(Box::new(e))
            })?;

        Ok(CallbackResponse::new(
            response.status().as_u16(),
            started_at,
        ))
    }
}
