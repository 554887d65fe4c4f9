#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod backends;
mod config;
mod fusion;
mod orchestrator;
pub mod prompt;
mod retriever;
mod traits;

pub use config::{ChatConfig, RetrievalConfig};
pub use fusion::{detect_cliff, fuse_scores, normalize_scores};
pub use orchestrator::{ChatAnswer, RagService};
pub use retriever::{HybridRetriever, RetrievalOutcome, RetrievedSegment};
pub use traits::{ChatStore, DenseIndex, HydratedSegment, LexicalIndex, MetadataReader};

/// Tracing target for retrieval operations.
pub const TRACING_TARGET_RETRIEVER: &str = "kbase_rag::retriever";

/// Tracing target for chat orchestration.
pub const TRACING_TARGET_CHAT: &str = "kbase_rag::chat";
