#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for Qdrant connection operations.
pub const TRACING_TARGET_CONNECTION: &str = "kbase_qdrant::connection";

/// Tracing target for Qdrant point operations.
pub const TRACING_TARGET_POINTS: &str = "kbase_qdrant::points";

/// Tracing target for Qdrant search operations.
pub const TRACING_TARGET_SEARCH: &str = "kbase_qdrant::search";

mod config;
mod error;
mod point;
mod store;

pub use config::VectorStoreConfig;
pub use error::{QdrantError, QdrantResult};
pub use point::{ScoredSegment, SegmentPoint, segment_point_id};
pub use store::VectorStore;
