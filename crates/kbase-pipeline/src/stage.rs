//! Pipeline stages and their status mapping.

use kbase_postgres::types::ProcessStatus;

/// The five active pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Source-to-PDF conversion.
    Convert,
    /// Structural extraction of the PDF.
    Parse,
    /// Per-page merge of parsed blocks.
    Merge,
    /// Segmentation and segment persistence.
    Chunk,
    /// Embedding plus vector/lexical indexing.
    Vectorize,
}

impl Stage {
    /// Status a document holds while this stage runs.
    pub fn running_status(self) -> ProcessStatus {
        match self {
            Stage::Convert => ProcessStatus::Converting,
            Stage::Parse => ProcessStatus::Parsing,
            Stage::Merge => ProcessStatus::Merging,
            Stage::Chunk => ProcessStatus::Chunking,
            Stage::Vectorize => ProcessStatus::Vectorizing,
        }
    }

    /// Status reached when this stage succeeds.
    pub fn success_status(self) -> ProcessStatus {
        match self {
            Stage::Convert => ProcessStatus::Parsing,
            Stage::Parse => ProcessStatus::Parsed,
            Stage::Merge => ProcessStatus::Merged,
            Stage::Chunk => ProcessStatus::Chunked,
            Stage::Vectorize => ProcessStatus::Splited,
        }
    }

    /// Status reached when this stage fails.
    pub fn failure_status(self) -> ProcessStatus {
        match self {
            Stage::Convert => ProcessStatus::ConvertFailed,
            Stage::Parse => ProcessStatus::ParseFailed,
            Stage::Merge => ProcessStatus::MergeFailed,
            Stage::Chunk => ProcessStatus::ChunkFailed,
            Stage::Vectorize => ProcessStatus::SplitFailed,
        }
    }

    /// Maps a document's current status to the stage that must run next.
    ///
    /// Returns `None` for terminal statuses. A document observed in a
    /// running status resumes from the start of that same stage; stage
    /// boundaries are the only resume points.
    pub fn for_status(status: ProcessStatus) -> Option<Stage> {
        match status {
            ProcessStatus::Pending | ProcessStatus::Converting => Some(Stage::Convert),
            ProcessStatus::Parsing => Some(Stage::Parse),
            ProcessStatus::Parsed | ProcessStatus::Merging => Some(Stage::Merge),
            ProcessStatus::Merged | ProcessStatus::Chunking => Some(Stage::Chunk),
            ProcessStatus::Chunked | ProcessStatus::Vectorizing => Some(Stage::Vectorize),
            _ => None,
        }
    }

    /// Stage name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Convert => "convert",
            Stage::Parse => "parse",
            Stage::Merge => "merge",
            Stage::Chunk => "chunk",
            Stage::Vectorize => "vectorize",
        }
    }
}

/// Result of running one stage body.
#[derive(Debug)]
pub enum StageOutcome {
    /// The stage completed; the scheduler commits the success transition.
    Advanced,
    /// The stage failed; the scheduler commits the failure transition.
    Failed {
        /// Human-readable failure detail persisted to `error_message`.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_statuses_are_consistent_with_state_machine() {
        for stage in [
            Stage::Convert,
            Stage::Parse,
            Stage::Merge,
            Stage::Chunk,
            Stage::Vectorize,
        ] {
            let running = stage.running_status();
            assert!(
                running.can_transition_to(stage.failure_status()),
                "{} failure transition",
                stage.name()
            );
            // The success status is reachable from the running status,
            // directly or through the next stage's running state.
            assert!(
                running.can_transition_to(stage.success_status()),
                "{} success transition",
                stage.name()
            );
        }
    }

    #[test]
    fn test_resume_maps_running_status_to_same_stage() {
        assert_eq!(
            Stage::for_status(ProcessStatus::Converting),
            Some(Stage::Convert)
        );
        assert_eq!(Stage::for_status(ProcessStatus::Parsing), Some(Stage::Parse));
        assert_eq!(
            Stage::for_status(ProcessStatus::Vectorizing),
            Some(Stage::Vectorize)
        );
        assert_eq!(Stage::for_status(ProcessStatus::Splited), None);
        assert_eq!(Stage::for_status(ProcessStatus::ParseFailed), None);
    }
}
