use crate::core::model::{HeadingCandidate, HeadingReason};

/// Heuristic candidates allowed next to layout ones: larger font or bold, or
/// at most `max_words` words.
pub fn passes_precision_filter(candidate: &HeadingCandidate, max_words: usize) -> bool {
    candidate.reasons.contains(HeadingReason::LargerFont)
        || candidate.reasons.contains(HeadingReason::Bold)
        || candidate.word_count() <= max_words
}

/// Layout candidates first, surviving heuristic ones after, then ordered by
/// (page, y). The sort is stable so equal positions keep that precedence.
pub fn resolve_candidates(
    layout: Vec<HeadingCandidate>,
    heuristic: Vec<HeadingCandidate>,
    max_words: usize,
) -> Vec<HeadingCandidate> {
    let mut merged = layout;
    merged.extend(
        heuristic
            .into_iter()
            .filter(|candidate| passes_precision_filter(candidate, max_words)),
    );
    sort_by_position(&mut merged);
    merged
}

pub fn sort_by_position(candidates: &mut [HeadingCandidate]) {
    candidates.sort_by(|a, b| a.page_idx.cmp(&b.page_idx).then(a.y.total_cmp(&b.y)));
}
