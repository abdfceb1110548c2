//! Heading candidates from text-span geometry.

pub mod hybrid;

pub use hybrid::HybridExtractor;

use crate::core::line_classifier::{classify_line, ClassifierParams, LineSignals};
use crate::core::model::{HeadingCandidate, LogicalLine, ParsedDocument, Provenance, HEURISTIC_CONFIDENCE};
use crate::core::stats::LineStats;
use crate::parser::line_merger::{merge_page_lines, DEFAULT_PARAGRAPH_GAP_RATIO};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicParams {
    pub classifier: ClassifierParams,
    pub paragraph_gap_ratio: f32,
    /// Stop scanning further pages once this many lines are collected.
    pub max_lines: usize,
}

impl Default for HeuristicParams {
    fn default() -> Self {
        Self {
            classifier: ClassifierParams::default(),
            paragraph_gap_ratio: DEFAULT_PARAGRAPH_GAP_RATIO,
            max_lines: 1000,
        }
    }
}

/// Logical lines of every page, in page order.
pub fn collect_lines(document: &ParsedDocument, params: &HeuristicParams) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    for page in &document.pages {
        if lines.len() > params.max_lines {
            tracing::debug!(
                document = %document.name,
                page = page.page_idx,
                "line limit reached, skipping remaining pages"
            );
            break;
        }
        lines.extend(merge_page_lines(page, params.paragraph_gap_ratio));
    }
    lines
}

/// Classify every logical line and keep the ones with at least one reason.
/// An empty result means the document has nothing to offer, not an error.
pub fn extract_heuristic(document: &ParsedDocument, params: &HeuristicParams) -> Vec<HeadingCandidate> {
    let lines = collect_lines(document, params);
    let Some(stats) = LineStats::measure(&lines) else {
        return Vec::new();
    };

    lines
        .into_iter()
        .filter_map(|line| {
            let signals = LineSignals::from_line(&line, &stats, &params.classifier);
            let reasons = classify_line(signals, &params.classifier);
            if reasons.is_empty() {
                return None;
            }
            Some(HeadingCandidate {
                page_idx: line.page_idx(),
                y: line.span.bbox.y0,
                x: line.span.bbox.x0,
                text: line.text,
                confidence: HEURISTIC_CONFIDENCE,
                source: Provenance::Heuristic,
                reasons,
                bbox: None,
            })
        })
        .collect()
}
