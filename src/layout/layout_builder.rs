use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::core::geometry::BBox;
use crate::core::model::{
    HeadingCandidate, LayoutLabel, ParsedDocument, Provenance, ReasonSet, Word,
};
use crate::core::text::{is_binary_data, normalize_text};
use crate::layout::{LayoutBox, LayoutDetector};

pub const DEFAULT_BOX_TOLERANCE: f32 = 5.0;

/// Layout headings for one document.
///
/// Detections are cached per page for the lifetime of the pass, so a pass
/// must not be reused across documents.
pub struct LayoutPass {
    detector: Arc<dyn LayoutDetector>,
    box_tolerance: f32,
    deadline: Option<Instant>,
    cache: HashMap<usize, Vec<LayoutBox>>,
}

impl LayoutPass {
    pub fn new(detector: Arc<dyn LayoutDetector>, box_tolerance: f32) -> Self {
        Self {
            detector,
            box_tolerance,
            deadline: None,
            cache: HashMap::new(),
        }
    }

    /// No new page is started once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cached_pages(&self) -> usize {
        self.cache.len()
    }

    /// Heading candidates from every page the detector can handle. A page
    /// whose detection fails contributes nothing; the rest still run.
    pub fn run(&mut self, document: &ParsedDocument) -> Vec<HeadingCandidate> {
        let tolerance = self.box_tolerance;
        let mut candidates = Vec::new();
        for page in &document.pages {
            if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                tracing::debug!(document = %document.name, page = page.page_idx, "layout deadline passed, stopping");
                break;
            }
            let boxes = match self.page_boxes(document, page.page_idx) {
                Ok(boxes) => boxes,
                Err(err) => {
                    tracing::warn!(
                        document = %document.name,
                        page = page.page_idx,
                        error = %err,
                        "layout detection failed, skipping page"
                    );
                    continue;
                }
            };

            for layout_box in boxes {
                let Some(label) = LayoutLabel::parse(&layout_box.label) else {
                    continue;
                };
                let Some(text) = recover_text(&page.words, &layout_box.bbox, tolerance) else {
                    continue;
                };
                candidates.push(HeadingCandidate {
                    text,
                    page_idx: page.page_idx,
                    y: layout_box.bbox.y0,
                    x: layout_box.bbox.x0,
                    confidence: layout_box.score,
                    source: Provenance::Layout { label },
                    reasons: ReasonSet::default(),
                    bbox: Some(layout_box.bbox),
                });
            }
        }
        tracing::debug!(document = %document.name, count = candidates.len(), "layout candidates");
        candidates
    }

    fn page_boxes(&mut self, document: &ParsedDocument, page_idx: usize) -> anyhow::Result<&[LayoutBox]> {
        if !self.cache.contains_key(&page_idx) {
            let boxes = self.detector.detect_page(document, page_idx)?;
            self.cache.insert(page_idx, boxes);
        }
        Ok(self.cache.get(&page_idx).map(Vec::as_slice).unwrap_or_default())
    }
}

/// Text of the words lying inside `bbox` grown by `tolerance`, left to right.
/// Binary words are dropped one by one so a stray glyph run does not sink the
/// whole box.
pub fn recover_text(words: &[Word], bbox: &BBox, tolerance: f32) -> Option<String> {
    let area = bbox.expand(tolerance);
    let mut inside: Vec<&Word> = words
        .iter()
        .filter(|word| area.contains(&word.bbox) && !is_binary_data(&word.text))
        .collect();
    inside.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));

    let joined = inside
        .iter()
        .map(|word| word.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let text = normalize_text(&joined);
    if text.is_empty() || is_binary_data(&text) {
        None
    } else {
        Some(text)
    }
}
