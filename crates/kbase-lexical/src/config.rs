//! Lexical store configuration.

use std::path::PathBuf;

#[cfg(feature = "config")]
use clap::Args;
#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{LexicalError, LexicalResult};

/// Default writer heap budget in bytes.
pub const DEFAULT_WRITER_HEAP_BYTES: usize = 64 * 1024 * 1024;

/// Configuration for the tantivy-backed lexical store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct LexicalStoreConfig {
    /// Directory holding the BM25 index
    #[cfg_attr(
        feature = "config",
        arg(long = "lexical-index-dir", env = "LEXICAL_INDEX_DIR")
    )]
    pub lexical_index_dir: PathBuf,

    /// Writer heap budget in bytes
    #[cfg_attr(
        feature = "config",
        arg(
            long = "lexical-writer-heap-bytes",
            env = "LEXICAL_WRITER_HEAP_BYTES",
            default_value_t = DEFAULT_WRITER_HEAP_BYTES
        )
    )]
    #[serde(default = "default_writer_heap_bytes")]
    pub lexical_writer_heap_bytes: usize,
}

fn default_writer_heap_bytes() -> usize {
    DEFAULT_WRITER_HEAP_BYTES
}

impl LexicalStoreConfig {
    /// Creates a configuration rooted at the given index directory.
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            lexical_index_dir: index_dir.into(),
            lexical_writer_heap_bytes: DEFAULT_WRITER_HEAP_BYTES,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> LexicalResult<()> {
        // Tantivy refuses writers below its minimum heap; catch it early
        // with a clearer message.
        if self.lexical_writer_heap_bytes < 15_000_000 {
            return Err(LexicalError::Config(
                "writer heap must be at least 15MB".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(LexicalStoreConfig::new("/tmp/idx").validate().is_ok());

        let mut config = LexicalStoreConfig::new("/tmp/idx");
        config.lexical_writer_heap_bytes = 1024;
        assert!(config.validate().is_err());
    }
}
