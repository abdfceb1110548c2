use crate::core::model::HeadingCandidate;

#[derive(Debug, Clone)]
pub struct AlignmentResult {
    /// Heuristic candidates with no layout candidate nearby.
    pub unmatched_heuristic: Vec<HeadingCandidate>,
    /// Heuristic candidates dropped in favour of a nearby layout candidate.
    pub suppressed: usize,
}

/// Proximity dedup: a heuristic candidate is matched when some layout
/// candidate sits on the same page less than `y_tolerance` away vertically.
pub fn align_candidates(
    heuristic: Vec<HeadingCandidate>,
    layout: &[HeadingCandidate],
    y_tolerance: f32,
) -> AlignmentResult {
    let total = heuristic.len();
    let unmatched_heuristic: Vec<HeadingCandidate> = heuristic
        .into_iter()
        .filter(|candidate| {
            !layout.iter().any(|other| {
                other.page_idx == candidate.page_idx && (other.y - candidate.y).abs() < y_tolerance
            })
        })
        .collect();

    AlignmentResult {
        suppressed: total - unmatched_heuristic.len(),
        unmatched_heuristic,
    }
}
