//! Document processing status enumeration and state machine.

use diesel_derive_enum::DbEnum;
#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Lifecycle status of a document moving through the ingestion pipeline.
///
/// This enumeration corresponds to the `PROCESS_STATUS` PostgreSQL enum.
/// The legal transitions form a linear pipeline with one failure branch per
/// active stage:
///
/// ```text
/// pending → converting → parsing → parsed → merging → merged
///         → chunking → chunked → vectorizing → splited
/// ```
///
/// Each of `converting`, `parsing`, `merging`, `chunking`, and `vectorizing`
/// may instead fall into its failure state. Failure states are terminal and
/// only an explicit restart resets a document back to `pending`.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[derive(Serialize, Deserialize, DbEnum, Display, EnumIter, EnumString)]
#[ExistingTypePath = "crate::schema::sql_types::ProcessStatus"]
pub enum ProcessStatus {
    /// Accepted upload awaiting processing
    #[db_rename = "pending"]
    #[serde(rename = "pending")]
    #[strum(serialize = "pending")]
    #[default]
    Pending,

    /// Source document is being converted to PDF
    #[db_rename = "converting"]
    #[serde(rename = "converting")]
    #[strum(serialize = "converting")]
    Converting,

    /// PDF is being structurally extracted
    #[db_rename = "parsing"]
    #[serde(rename = "parsing")]
    #[strum(serialize = "parsing")]
    Parsing,

    /// Structure extraction complete; layout artifacts available
    #[db_rename = "parsed"]
    #[serde(rename = "parsed")]
    #[strum(serialize = "parsed")]
    Parsed,

    /// Parsed blocks are being merged per page
    #[db_rename = "merging"]
    #[serde(rename = "merging")]
    #[strum(serialize = "merging")]
    Merging,

    /// Page merge complete
    #[db_rename = "merged"]
    #[serde(rename = "merged")]
    #[strum(serialize = "merged")]
    Merged,

    /// Merged pages are being segmented
    #[db_rename = "chunking"]
    #[serde(rename = "chunking")]
    #[strum(serialize = "chunking")]
    Chunking,

    /// Segmentation complete; segments persisted
    #[db_rename = "chunked"]
    #[serde(rename = "chunked")]
    #[strum(serialize = "chunked")]
    Chunked,

    /// Segments are being embedded and indexed
    #[db_rename = "vectorizing"]
    #[serde(rename = "vectorizing")]
    #[strum(serialize = "vectorizing")]
    Vectorizing,

    /// Terminal success: segments indexed in both derived stores
    #[db_rename = "splited"]
    #[serde(rename = "splited")]
    #[strum(serialize = "splited")]
    Splited,

    /// PDF conversion failed
    #[db_rename = "convert_failed"]
    #[serde(rename = "convert_failed")]
    #[strum(serialize = "convert_failed")]
    ConvertFailed,

    /// Structure extraction failed
    #[db_rename = "parse_failed"]
    #[serde(rename = "parse_failed")]
    #[strum(serialize = "parse_failed")]
    ParseFailed,

    /// Page merge failed
    #[db_rename = "merge_failed"]
    #[serde(rename = "merge_failed")]
    #[strum(serialize = "merge_failed")]
    MergeFailed,

    /// Segmentation failed
    #[db_rename = "chunk_failed"]
    #[serde(rename = "chunk_failed")]
    #[strum(serialize = "chunk_failed")]
    ChunkFailed,

    /// Embedding or indexing failed
    #[db_rename = "split_failed"]
    #[serde(rename = "split_failed")]
    #[strum(serialize = "split_failed")]
    SplitFailed,
}

impl ProcessStatus {
    /// Returns whether this status is a terminal failure.
    #[inline]
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            ProcessStatus::ConvertFailed
                | ProcessStatus::ParseFailed
                | ProcessStatus::MergeFailed
                | ProcessStatus::ChunkFailed
                | ProcessStatus::SplitFailed
        )
    }

    /// Returns whether this status is the terminal success state.
    #[inline]
    pub fn is_complete(self) -> bool {
        matches!(self, ProcessStatus::Splited)
    }

    /// Returns whether the document is still moving through the pipeline.
    #[inline]
    pub fn is_in_flight(self) -> bool {
        !self.is_complete() && !self.is_failure()
    }

    /// Returns the set of statuses a document must currently hold for a
    /// transition into `self` to be legal.
    ///
    /// `Pending` has no legal predecessors here: documents enter `pending`
    /// on creation or through an explicit restart, never through the
    /// ordinary transition path.
    pub fn predecessors(self) -> &'static [ProcessStatus] {
        match self {
            ProcessStatus::Pending => &[],
            ProcessStatus::Converting => &[ProcessStatus::Pending],
            ProcessStatus::Parsing => &[ProcessStatus::Converting],
            ProcessStatus::Parsed => &[ProcessStatus::Parsing],
            ProcessStatus::Merging => &[ProcessStatus::Parsed],
            ProcessStatus::Merged => &[ProcessStatus::Merging],
            ProcessStatus::Chunking => &[ProcessStatus::Merged],
            ProcessStatus::Chunked => &[ProcessStatus::Chunking],
            ProcessStatus::Vectorizing => &[ProcessStatus::Chunked],
            ProcessStatus::Splited => &[ProcessStatus::Vectorizing],
            ProcessStatus::ConvertFailed => &[ProcessStatus::Converting],
            ProcessStatus::ParseFailed => &[ProcessStatus::Parsing],
            ProcessStatus::MergeFailed => &[ProcessStatus::Merging],
            ProcessStatus::ChunkFailed => &[ProcessStatus::Chunking],
            ProcessStatus::SplitFailed => &[ProcessStatus::Vectorizing],
        }
    }

    /// Returns whether a transition from `self` to `next` is legal.
    #[inline]
    pub fn can_transition_to(self, next: ProcessStatus) -> bool {
        next.predecessors().contains(&self)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_happy_path_is_legal() {
        let path = [
            ProcessStatus::Pending,
            ProcessStatus::Converting,
            ProcessStatus::Parsing,
            ProcessStatus::Parsed,
            ProcessStatus::Merging,
            ProcessStatus::Merged,
            ProcessStatus::Chunking,
            ProcessStatus::Chunked,
            ProcessStatus::Vectorizing,
            ProcessStatus::Splited,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_failure_branches() {
        assert!(ProcessStatus::Converting.can_transition_to(ProcessStatus::ConvertFailed));
        assert!(ProcessStatus::Parsing.can_transition_to(ProcessStatus::ParseFailed));
        assert!(ProcessStatus::Merging.can_transition_to(ProcessStatus::MergeFailed));
        assert!(ProcessStatus::Chunking.can_transition_to(ProcessStatus::ChunkFailed));
        assert!(ProcessStatus::Vectorizing.can_transition_to(ProcessStatus::SplitFailed));
    }

    #[test]
    fn test_no_backward_transitions() {
        assert!(!ProcessStatus::Splited.can_transition_to(ProcessStatus::Parsing));
        assert!(!ProcessStatus::Parsed.can_transition_to(ProcessStatus::Converting));
        assert!(!ProcessStatus::Vectorizing.can_transition_to(ProcessStatus::Chunked));
        // Failure states are terminal under ordinary transitions.
        for status in ProcessStatus::iter().filter(|s| s.is_failure()) {
            for next in ProcessStatus::iter() {
                assert!(
                    !status.can_transition_to(next),
                    "{status} -> {next} must be illegal"
                );
            }
        }
    }

    #[test]
    fn test_skipping_stages_is_illegal() {
        assert!(!ProcessStatus::Pending.can_transition_to(ProcessStatus::Parsing));
        assert!(!ProcessStatus::Parsed.can_transition_to(ProcessStatus::Chunking));
        assert!(!ProcessStatus::Chunked.can_transition_to(ProcessStatus::Splited));
    }

    #[test]
    fn test_classification() {
        assert!(ProcessStatus::Splited.is_complete());
        assert!(ProcessStatus::ParseFailed.is_failure());
        assert!(ProcessStatus::Vectorizing.is_in_flight());
        assert!(!ProcessStatus::Splited.is_in_flight());
        assert!(!ProcessStatus::ChunkFailed.is_in_flight());
    }

    #[test]
    fn test_string_round_trip() {
        for status in ProcessStatus::iter() {
            let rendered = status.to_string();
            let parsed: ProcessStatus = rendered.parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert_eq!(ProcessStatus::SplitFailed.to_string(), "split_failed");
    }
}
