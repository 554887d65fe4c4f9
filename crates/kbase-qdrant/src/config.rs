//! Vector store client configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{QdrantError, QdrantResult};

/// Default collection holding segment embeddings.
pub const DEFAULT_COLLECTION: &str = "kbase_segments";

/// Configuration for Qdrant client connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct VectorStoreConfig {
    /// Qdrant endpoint (e.g. "http://localhost:6334")
    #[cfg_attr(feature = "config", arg(long = "qdrant-url", env = "QDRANT_URL"))]
    pub qdrant_url: String,

    /// API key for authentication (optional)
    #[cfg_attr(
        feature = "config",
        arg(long = "qdrant-api-key", env = "QDRANT_API_KEY")
    )]
    pub qdrant_api_key: Option<String>,

    /// Collection holding segment embeddings
    #[cfg_attr(
        feature = "config",
        arg(
            long = "qdrant-collection",
            env = "QDRANT_COLLECTION",
            default_value = DEFAULT_COLLECTION
        )
    )]
    pub qdrant_collection: String,

    /// Request timeout in seconds (optional)
    #[cfg_attr(
        feature = "config",
        arg(long = "qdrant-timeout-secs", env = "QDRANT_TIMEOUT_SECS")
    )]
    pub qdrant_timeout_secs: Option<u64>,
}

impl VectorStoreConfig {
    /// Creates a new configuration for the given endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            qdrant_url: url.into(),
            qdrant_api_key: None,
            qdrant_collection: DEFAULT_COLLECTION.to_owned(),
            qdrant_timeout_secs: None,
        }
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.qdrant_api_key = Some(api_key.into());
        self
    }

    /// Sets the collection name.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.qdrant_collection = collection.into();
        self
    }

    /// Returns the request timeout as a Duration, if set.
    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.qdrant_timeout_secs.map(Duration::from_secs)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> QdrantResult<()> {
        if self.qdrant_url.is_empty() {
            return Err(QdrantError::InvalidConfig {
                reason: "qdrant url must not be empty".to_owned(),
            });
        }
        if self.qdrant_collection.is_empty() {
            return Err(QdrantError::InvalidConfig {
                reason: "collection name must not be empty".to_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(VectorStoreConfig::new("http://localhost:6334").validate().is_ok());
        assert!(VectorStoreConfig::new("").validate().is_err());

        let config = VectorStoreConfig::new("http://localhost:6334").with_collection("");
        assert!(config.validate().is_err());
    }
}
