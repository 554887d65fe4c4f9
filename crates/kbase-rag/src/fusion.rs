//! Score fusion primitives.

use std::collections::HashMap;

/// Spread below which a score list is treated as constant.
const MIN_SPREAD: f32 = 1e-5;

/// Min-max normalizes scores to [0, 1].
///
/// A near-constant list normalizes to all zeros: when every candidate
/// scored the same, the list carries no ranking signal.
pub fn normalize_scores(scores: &[f32]) -> Vec<f32> {
    if scores.len() <= 1 {
        return scores.to_vec();
    }

    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    if max - min > MIN_SPREAD {
        scores.iter().map(|s| (s - min) / (max - min)).collect()
    } else {
        vec![0.0; scores.len()]
    }
}

/// A fused candidate with the scores that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    /// Segment identifier.
    pub seg_id: String,
    /// Convex fused score.
    pub fused_score: f32,
    /// Raw dense score (0 when absent from the dense list).
    pub dense_score: f32,
}

/// Fuses dense and lexical result lists by convex combination of
/// min-max-normalized scores over the candidate union.
///
/// A candidate missing from one list contributes 0 on that side before
/// normalization. Ties on the fused score break by dense score. The
/// result is ordered best-first.
pub fn fuse_scores(
    dense: &[(String, f32)],
    lexical: &[(String, f32)],
    alpha: f32,
) -> Vec<FusedCandidate> {
    if dense.is_empty() && lexical.is_empty() {
        return vec![];
    }

    let dense_map: HashMap<&str, f32> = dense.iter().map(|(id, s)| (id.as_str(), *s)).collect();
    let lexical_map: HashMap<&str, f32> =
        lexical.iter().map(|(id, s)| (id.as_str(), *s)).collect();

    // Union preserving first-seen order (dense first), deduplicated.
    let mut union: Vec<&str> = Vec::with_capacity(dense.len() + lexical.len());
    for (id, _) in dense.iter().chain(lexical.iter()) {
        if !union.contains(&id.as_str()) {
            union.push(id);
        }
    }

    let dense_raw: Vec<f32> = union
        .iter()
        .map(|id| dense_map.get(id).copied().unwrap_or(0.0))
        .collect();
    let lexical_raw: Vec<f32> = union
        .iter()
        .map(|id| lexical_map.get(id).copied().unwrap_or(0.0))
        .collect();

    let dense_norm = normalize_scores(&dense_raw);
    let lexical_norm = normalize_scores(&lexical_raw);

    let mut fused: Vec<FusedCandidate> = union
        .iter()
        .enumerate()
        .map(|(i, id)| FusedCandidate {
            seg_id: (*id).to_owned(),
            fused_score: alpha * dense_norm[i] + (1.0 - alpha) * lexical_norm[i],
            dense_score: dense_raw[i],
        })
        .collect();

    fused.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.dense_score
                    .partial_cmp(&a.dense_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });

    fused
}

/// Finds the cut-off before the largest drop in a descending score list.
///
/// Returns how many entries to keep: the index just before the steepest
/// first-difference, capped at `top_k`. Short lists are returned whole
/// (up to `top_k`).
pub fn detect_cliff(sorted_scores: &[f32], top_k: usize) -> usize {
    if sorted_scores.len() <= 1 {
        return sorted_scores.len().min(top_k);
    }

    let deltas: Vec<f32> = sorted_scores
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .collect();

    let min_delta = deltas.iter().copied().fold(f32::INFINITY, f32::min);
    let cliff_index = deltas
        .iter()
        .position(|d| *d == min_delta)
        .map(|idx| idx + 1)
        .unwrap_or(sorted_scores.len());

    cliff_index.min(top_k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        let normalized = normalize_scores(&[1.0, 0.5, 0.0]);
        assert_eq!(normalized, vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_normalize_constant_list_is_zeroed() {
        let normalized = normalize_scores(&[0.7, 0.7, 0.7]);
        assert_eq!(normalized, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_normalize_single_score_passes_through() {
        assert_eq!(normalize_scores(&[0.42]), vec![0.42]);
    }

    #[test]
    fn test_fusion_ranking() {
        // Dense {A: 1.0, B: 0.5}, lexical {B: 1.0, C: 0.7}, alpha 0.6.
        // Over the union with missing sides as 0: dense [1.0, 0.5, 0.0],
        // lexical [0.0, 1.0, 0.7]; fused A=0.6, B=0.7, C=0.28.
        let dense = vec![("A".to_owned(), 1.0), ("B".to_owned(), 0.5)];
        let lexical = vec![("B".to_owned(), 1.0), ("C".to_owned(), 0.7)];

        let fused = fuse_scores(&dense, &lexical, 0.6);
        let order: Vec<&str> = fused.iter().map(|c| c.seg_id.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);

        assert!((fused[0].fused_score - 0.7).abs() < 1e-6);
        assert!((fused[1].fused_score - 0.6).abs() < 1e-6);
        assert!((fused[2].fused_score - 0.28).abs() < 1e-6);
    }

    #[test]
    fn test_duplicate_candidate_merges_once() {
        let dense = vec![("A".to_owned(), 1.0)];
        let lexical = vec![("A".to_owned(), 1.0)];

        let fused = fuse_scores(&dense, &lexical, 0.5);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].seg_id, "A");
    }

    #[test]
    fn test_ties_break_by_dense_score() {
        // Both candidates fuse to the same score with alpha = 0; the one
        // with the higher dense score must rank first.
        let dense = vec![("low".to_owned(), 0.2), ("high".to_owned(), 0.9)];
        let lexical = vec![("low".to_owned(), 0.8), ("high".to_owned(), 0.8)];

        let fused = fuse_scores(&dense, &lexical, 0.0);
        assert_eq!(fused[0].seg_id, "high");
    }

    #[test]
    fn test_cliff_detection() {
        // Steepest drop sits after the second entry.
        let kept = detect_cliff(&[0.95, 0.92, 0.30, 0.28], 10);
        assert_eq!(kept, 2);

        // top_k still caps the cut.
        let kept = detect_cliff(&[0.95, 0.92, 0.30, 0.28], 1);
        assert_eq!(kept, 1);

        // Gentle slopes keep everything up to top_k.
        let kept = detect_cliff(&[0.9, 0.8, 0.7], 10);
        assert!(kept >= 1 && kept <= 3);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(fuse_scores(&[], &[], 0.6).is_empty());
        assert_eq!(detect_cliff(&[], 5), 0);
        assert_eq!(detect_cliff(&[0.5], 5), 1);
    }
}
