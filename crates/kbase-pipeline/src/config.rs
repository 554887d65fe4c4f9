//! Pipeline behavior configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

/// Soft limit for a text segment in characters.
pub const DEFAULT_SEGMENT_SOFT_LIMIT: usize = 800;

/// Complete ingestion pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct PipelineConfig {
    /// Number of ingestion workers
    #[cfg_attr(
        feature = "config",
        arg(
            long = "pipeline-workers",
            env = "PIPELINE_WORKERS",
            default_value_t = 2
        )
    )]
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the ingestion queue before uploads are rejected
    #[cfg_attr(
        feature = "config",
        arg(
            long = "pipeline-queue-capacity",
            env = "PIPELINE_QUEUE_CAPACITY",
            default_value_t = 128
        )
    )]
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Concurrent structural extractions (the parse budget)
    #[cfg_attr(
        feature = "config",
        arg(
            long = "pipeline-parse-budget",
            env = "PIPELINE_PARSE_BUDGET",
            default_value_t = 2
        )
    )]
    #[serde(default = "default_parse_budget")]
    pub parse_budget: usize,

    /// Concurrent embed+index runs (the vectorize budget)
    #[cfg_attr(
        feature = "config",
        arg(
            long = "pipeline-vectorize-budget",
            env = "PIPELINE_VECTORIZE_BUDGET",
            default_value_t = 4
        )
    )]
    #[serde(default = "default_vectorize_budget")]
    pub vectorize_budget: usize,

    /// Per-stage timeout in seconds for convert
    #[cfg_attr(
        feature = "config",
        arg(
            long = "pipeline-convert-timeout-secs",
            env = "PIPELINE_CONVERT_TIMEOUT_SECS",
            default_value_t = 300
        )
    )]
    #[serde(default = "default_convert_timeout")]
    pub convert_timeout_secs: u64,

    /// Per-stage timeout in seconds for parse
    #[cfg_attr(
        feature = "config",
        arg(
            long = "pipeline-parse-timeout-secs",
            env = "PIPELINE_PARSE_TIMEOUT_SECS",
            default_value_t = 1800
        )
    )]
    #[serde(default = "default_parse_timeout")]
    pub parse_timeout_secs: u64,

    /// Per-stage timeout in seconds for merge and chunk
    #[cfg_attr(
        feature = "config",
        arg(
            long = "pipeline-segment-timeout-secs",
            env = "PIPELINE_SEGMENT_TIMEOUT_SECS",
            default_value_t = 300
        )
    )]
    #[serde(default = "default_segment_timeout")]
    pub segment_timeout_secs: u64,

    /// Per-stage timeout in seconds for vectorize+index
    #[cfg_attr(
        feature = "config",
        arg(
            long = "pipeline-vectorize-timeout-secs",
            env = "PIPELINE_VECTORIZE_TIMEOUT_SECS",
            default_value_t = 1800
        )
    )]
    #[serde(default = "default_vectorize_timeout")]
    pub vectorize_timeout_secs: u64,

    /// Grace period before a stalled in-flight document is resumed
    #[cfg_attr(
        feature = "config",
        arg(
            long = "pipeline-recovery-grace-secs",
            env = "PIPELINE_RECOVERY_GRACE_SECS",
            default_value_t = 900
        )
    )]
    #[serde(default = "default_recovery_grace")]
    pub recovery_grace_secs: u64,

    /// Soft limit for a text segment in characters
    #[cfg_attr(
        feature = "config",
        arg(
            long = "segment-soft-limit",
            env = "SEGMENT_SOFT_LIMIT",
            default_value_t = DEFAULT_SEGMENT_SOFT_LIMIT
        )
    )]
    #[serde(default = "default_soft_limit")]
    pub segment_soft_limit: usize,

    /// Emit one coarse-grained summary segment per page
    #[cfg_attr(
        feature = "config",
        arg(long = "emit-page-summaries", env = "EMIT_PAGE_SUMMARIES")
    )]
    #[serde(default)]
    pub emit_page_summaries: bool,

    /// Embedding batch size during vectorize
    #[cfg_attr(
        feature = "config",
        arg(
            long = "embedding-batch-size",
            env = "EMBEDDING_BATCH_SIZE",
            default_value_t = 16
        )
    )]
    #[serde(default = "default_embedding_batch")]
    pub embedding_batch_size: usize,

    /// Interval in seconds between orphan sweeper runs (0 disables)
    #[cfg_attr(
        feature = "config",
        arg(
            long = "pipeline-sweep-interval-secs",
            env = "PIPELINE_SWEEP_INTERVAL_SECS",
            default_value_t = 3600
        )
    )]
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_workers() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    128
}

fn default_parse_budget() -> usize {
    2
}

fn default_vectorize_budget() -> usize {
    4
}

fn default_convert_timeout() -> u64 {
    300
}

fn default_parse_timeout() -> u64 {
    1800
}

fn default_segment_timeout() -> u64 {
    300
}

fn default_vectorize_timeout() -> u64 {
    1800
}

fn default_recovery_grace() -> u64 {
    900
}

fn default_soft_limit() -> usize {
    DEFAULT_SEGMENT_SOFT_LIMIT
}

fn default_embedding_batch() -> usize {
    16
}

fn default_sweep_interval() -> u64 {
    3600
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            parse_budget: default_parse_budget(),
            vectorize_budget: default_vectorize_budget(),
            convert_timeout_secs: default_convert_timeout(),
            parse_timeout_secs: default_parse_timeout(),
            segment_timeout_secs: default_segment_timeout(),
            vectorize_timeout_secs: default_vectorize_timeout(),
            recovery_grace_secs: default_recovery_grace(),
            segment_soft_limit: default_soft_limit(),
            emit_page_summaries: false,
            embedding_batch_size: default_embedding_batch(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl PipelineConfig {
    /// Returns the recovery grace period.
    #[inline]
    pub fn recovery_grace(&self) -> Duration {
        Duration::from_secs(self.recovery_grace_secs)
    }
}
