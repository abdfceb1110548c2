pub mod align;
pub mod resolve;

use crate::core::model::HeadingCandidate;

/// Reconciles the heuristic and layout candidate lists of one document.
pub trait FusionEngine {
    fn fuse(&self, heuristic: Vec<HeadingCandidate>, layout: Vec<HeadingCandidate>) -> Vec<HeadingCandidate>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityFusionEngine {
    pub y_tolerance: f32,
    pub max_words: usize,
}

impl Default for ProximityFusionEngine {
    fn default() -> Self {
        Self {
            y_tolerance: 20.0,
            max_words: 8,
        }
    }
}

impl ProximityFusionEngine {
    pub fn new(y_tolerance: f32, max_words: usize) -> Self {
        Self { y_tolerance, max_words }
    }
}

impl FusionEngine for ProximityFusionEngine {
    fn fuse(&self, heuristic: Vec<HeadingCandidate>, layout: Vec<HeadingCandidate>) -> Vec<HeadingCandidate> {
        let aligned = align::align_candidates(heuristic, &layout, self.y_tolerance);
        tracing::debug!(
            layout = layout.len(),
            suppressed = aligned.suppressed,
            "fusing heading candidates"
        );
        resolve::resolve_candidates(layout, aligned.unmatched_heuristic, self.max_words)
    }
}
