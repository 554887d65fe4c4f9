#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod client;
mod request;
mod response;
mod sync;
mod worker;

pub use client::{CallbackClient, StatusSyncConfig};
pub use request::{CallbackPayload, ExternalStatus, StatusUpdate};
pub use response::CallbackResponse;
pub use sync::{StatusSynchronizer, SyncOutcome};
pub use worker::{StatusSyncHandle, StatusSyncWorker};

/// Tracing target for status synchronization.
pub const TRACING_TARGET: &str = "kbase_webhook::status_sync";

/// Core trait for callback delivery.
///
/// Implement this trait to substitute the HTTP transport, e.g. with an
/// in-memory recorder in tests.
#[async_trait::async_trait]
pub trait CallbackProvider: Send + Sync {
    /// Delivers one callback payload to the endpoint.
    async fn deliver(
        &self,
        url: &url::Url,
        payload: &CallbackPayload,
    ) -> kbase_core::Result<CallbackResponse>;
}
