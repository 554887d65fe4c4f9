//! Retrieval and chat configuration.

#[cfg(feature = "config")]
use clap::Args;
use kbase_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Hybrid retrieval tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct RetrievalConfig {
    /// Weight of the dense score in the convex fusion (0.0 to 1.0)
    #[cfg_attr(
        feature = "config",
        arg(long = "retrieval-alpha", env = "RETRIEVAL_ALPHA", default_value_t = 0.6)
    )]
    #[serde(default = "default_alpha")]
    pub alpha: f32,

    /// Candidates fetched from each backend
    #[cfg_attr(
        feature = "config",
        arg(
            long = "retrieval-candidate-k",
            env = "RETRIEVAL_CANDIDATE_K",
            default_value_t = 50
        )
    )]
    #[serde(default = "default_candidate_k")]
    pub candidate_k: usize,

    /// Fused candidates passed to the cross-encoder
    #[cfg_attr(
        feature = "config",
        arg(
            long = "retrieval-rerank-k",
            env = "RETRIEVAL_RERANK_K",
            default_value_t = 20
        )
    )]
    #[serde(default = "default_rerank_k")]
    pub rerank_k: usize,

    /// Final results returned to the orchestrator
    #[cfg_attr(
        feature = "config",
        arg(long = "retrieval-top-k", env = "RETRIEVAL_TOP_K", default_value_t = 5)
    )]
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_alpha() -> f32 {
    0.6
}

fn default_candidate_k() -> usize {
    50
}

fn default_rerank_k() -> usize {
    20
}

fn default_top_k() -> usize {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            candidate_k: default_candidate_k(),
            rerank_k: default_rerank_k(),
            top_k: default_top_k(),
        }
    }
}

impl RetrievalConfig {
    /// Validates the funnel ordering `candidate_k >= rerank_k >= top_k`
    /// and the fusion weight range.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::configuration()
                .with_message(format!("alpha must be within [0, 1], got {}", self.alpha)));
        }
        if self.candidate_k < self.rerank_k || self.rerank_k < self.top_k {
            return Err(Error::configuration().with_message(format!(
                "retrieval funnel must satisfy candidate_k >= rerank_k >= top_k, got {} >= {} >= {}",
                self.candidate_k, self.rerank_k, self.top_k
            )));
        }
        if self.top_k == 0 {
            return Err(Error::configuration().with_message("top_k must be at least 1"));
        }
        Ok(())
    }
}

/// Chat orchestration tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct ChatConfig {
    /// Maximum accepted query length in characters
    #[cfg_attr(
        feature = "config",
        arg(
            long = "chat-query-max-chars",
            env = "CHAT_QUERY_MAX_CHARS",
            default_value_t = 2000
        )
    )]
    #[serde(default = "default_query_max")]
    pub query_max_chars: usize,

    /// Character budget for prompt history
    #[cfg_attr(
        feature = "config",
        arg(
            long = "chat-history-max-chars",
            env = "CHAT_HISTORY_MAX_CHARS",
            default_value_t = 4000
        )
    )]
    #[serde(default = "default_history_max")]
    pub history_max_chars: usize,

    /// Character budget for knowledge context
    #[cfg_attr(
        feature = "config",
        arg(
            long = "chat-context-max-chars",
            env = "CHAT_CONTEXT_MAX_CHARS",
            default_value_t = 12000
        )
    )]
    #[serde(default = "default_context_max")]
    pub context_max_chars: usize,

    /// Overall request deadline in seconds
    #[cfg_attr(
        feature = "config",
        arg(
            long = "chat-deadline-secs",
            env = "CHAT_DEADLINE_SECS",
            default_value_t = 60
        )
    )]
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

fn default_query_max() -> usize {
    2000
}

fn default_history_max() -> usize {
    4000
}

fn default_context_max() -> usize {
    12000
}

fn default_deadline_secs() -> u64 {
    60
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            query_max_chars: default_query_max(),
            history_max_chars: default_history_max(),
            context_max_chars: default_context_max(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl ChatConfig {
    /// Returns the overall request deadline.
    #[inline]
    pub fn deadline(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.deadline_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_funnel_validation() {
        assert!(RetrievalConfig::default().validate().is_ok());

        let bad = RetrievalConfig {
            candidate_k: 10,
            rerank_k: 20,
            ..RetrievalConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = RetrievalConfig {
            rerank_k: 3,
            top_k: 5,
            ..RetrievalConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = RetrievalConfig {
            alpha: 1.5,
            ..RetrievalConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
