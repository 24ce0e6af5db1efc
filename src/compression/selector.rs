//! Candidate ordering for the compression loop

use super::models::Segment;
use std::cmp::Ordering;

/// Compression priority: least relevant first, largest first among equals.
///
/// Ascending on `(relevance_score, -token_count)`. Ties on both keys keep
/// the collection order.
pub fn compare_candidates(a: &Segment, b: &Segment) -> Ordering {
    a.relevance_score
        .total_cmp(&b.relevance_score)
        .then_with(|| b.token_count.cmp(&a.token_count))
}

/// Positions into `segments`, in the order candidates should be tried this pass
pub fn candidate_order(segments: &[Segment]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..segments.len()).collect();
    order.sort_by(|&a, &b| compare_candidates(&segments[a], &segments[b]));
    order
}
