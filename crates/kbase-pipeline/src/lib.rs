#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod chunker;
mod config;
pub mod external;
mod intake;
pub mod merge;
mod processor;
mod queue;
mod recovery;
mod stage;
mod sweeper;

pub use chunker::{ChunkerConfig, chunk_pages};
pub use config::PipelineConfig;
pub use external::{BlockType, DocumentConverter, ParseArtifacts, ParsedBlock, StructureParser};
pub use intake::{UploadRequest, register_upload};
pub use merge::{MergedBlock, MergedPage, merge_pages};
pub use processor::{IngestJob, PipelineState};
pub use queue::{IngestHandle, PipelineWorkers};
pub use recovery::resume_stale_documents;
pub use stage::{Stage, StageOutcome};
pub use sweeper::OrphanSweeper;

/// Tracing target for pipeline operations.
pub const TRACING_TARGET: &str = "kbase_pipeline";
