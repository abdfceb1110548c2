use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::core::model::{HeadingCandidate, ParsedDocument};
use crate::fusion::{FusionEngine, ProximityFusionEngine};
use crate::heading::{extract_heuristic, HeuristicParams};
use crate::layout::layout_builder::DEFAULT_BOX_TOLERANCE;
use crate::layout::{LayoutDetector, LayoutPass};

pub const DEFAULT_LAYOUT_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs the heuristic and layout paths side by side on blocking workers and
/// fuses them. Without a detector, or when the layout path fails or misses
/// the deadline, the heuristic candidates are returned as they are.
#[derive(Clone)]
pub struct HybridExtractor {
    params: HeuristicParams,
    detector: Option<Arc<dyn LayoutDetector>>,
    box_tolerance: f32,
    timeout: Duration,
    fusion: ProximityFusionEngine,
}

impl HybridExtractor {
    pub fn new(params: HeuristicParams) -> Self {
        Self {
            params,
            detector: None,
            box_tolerance: DEFAULT_BOX_TOLERANCE,
            timeout: DEFAULT_LAYOUT_TIMEOUT,
            fusion: ProximityFusionEngine::default(),
        }
    }

    pub fn with_layout(mut self, detector: Arc<dyn LayoutDetector>, box_tolerance: f32) -> Self {
        self.detector = Some(detector);
        self.box_tolerance = box_tolerance;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fusion(mut self, fusion: ProximityFusionEngine) -> Self {
        self.fusion = fusion;
        self
    }

    pub fn layout_enabled(&self) -> bool {
        self.detector.is_some()
    }

    pub async fn extract(&self, document: Arc<ParsedDocument>) -> Result<Vec<HeadingCandidate>> {
        let deadline = Instant::now() + self.timeout;

        let params = self.params;
        let heuristic_doc = Arc::clone(&document);
        let heuristic = tokio::task::spawn_blocking(move || extract_heuristic(&heuristic_doc, &params));

        let Some(detector) = self.detector.clone() else {
            return heuristic.await.context("heuristic extraction task failed");
        };

        let tolerance = self.box_tolerance;
        let layout_doc = Arc::clone(&document);
        let cutoff = deadline.into_std();
        let layout = tokio::task::spawn_blocking(move || {
            LayoutPass::new(detector, tolerance)
                .with_deadline(cutoff)
                .run(&layout_doc)
        });

        let heuristic = heuristic.await.context("heuristic extraction task failed")?;

        // After a timeout the layout task finishes its current page and stops;
        // its result is dropped.
        match tokio::time::timeout_at(deadline, layout).await {
            Ok(Ok(layout)) => Ok(self.fusion.fuse(heuristic, layout)),
            Ok(Err(err)) => {
                tracing::warn!(document = %document.name, error = %err, "layout task failed, using heuristics only");
                Ok(heuristic)
            }
            Err(_) => {
                tracing::warn!(
                    document = %document.name,
                    timeout_secs = self.timeout.as_secs(),
                    "layout detection timed out, using heuristics only"
                );
                Ok(heuristic)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::BBox;
    use crate::core::model::{Page, Provenance, StyleFlags, TextLine, TextSpan, Word};
    use crate::layout::LayoutBox;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn text_line(text: &str, font: &str, size: f32, y: f32, width: f32) -> TextLine {
        let bbox = BBox::new(72.0, y, 72.0 + width, y + size);
        TextLine {
            bbox,
            spans: vec![TextSpan {
                text: text.to_string(),
                font: font.to_string(),
                size,
                flags: StyleFlags::from_font_name(font),
                bbox,
                origin_y: y,
                page_width: 600.0,
                page_idx: 0,
            }],
        }
    }

    fn document() -> Arc<ParsedDocument> {
        Arc::new(ParsedDocument {
            name: "trip.pdf".to_string(),
            path: PathBuf::from("trip.pdf"),
            pages: vec![Page {
                page_idx: 0,
                width: 600.0,
                height: 800.0,
                lines: vec![
                    text_line("Coastal Adventures", "Helvetica-Bold", 16.0, 105.0, 180.0),
                    text_line("the coast offers plenty of beaches and water sports for groups.", "Times-Roman", 11.0, 140.0, 456.0),
                    text_line("nightlife is concentrated in the old town near the harbour.", "Times-Roman", 11.0, 154.0, 456.0),
                ],
                words: vec![
                    Word {
                        text: "Coastal".to_string(),
                        bbox: BBox::new(72.0, 100.0, 140.0, 116.0),
                    },
                    Word {
                        text: "Adventures".to_string(),
                        bbox: BBox::new(145.0, 100.0, 250.0, 116.0),
                    },
                ],
            }],
        })
    }

    struct FixedDetector;

    impl LayoutDetector for FixedDetector {
        fn detect_page(&self, _document: &ParsedDocument, _page_idx: usize) -> Result<Vec<LayoutBox>> {
            Ok(vec![LayoutBox {
                label: "paragraph_title".to_string(),
                score: 0.95,
                bbox: BBox::new(70.0, 100.0, 255.0, 118.0),
            }])
        }
    }

    struct SlowDetector;

    impl LayoutDetector for SlowDetector {
        fn detect_page(&self, document: &ParsedDocument, page_idx: usize) -> Result<Vec<LayoutBox>> {
            std::thread::sleep(Duration::from_millis(300));
            FixedDetector.detect_page(document, page_idx)
        }
    }

    struct FailingDetector;

    impl LayoutDetector for FailingDetector {
        fn detect_page(&self, _document: &ParsedDocument, page_idx: usize) -> Result<Vec<LayoutBox>> {
            anyhow::bail!("model crashed on page {page_idx}")
        }
    }

    #[tokio::test]
    async fn heuristic_only_without_detector() -> Result<()> {
        let extractor = HybridExtractor::new(HeuristicParams::default());
        assert!(!extractor.layout_enabled());
        let candidates = extractor.extract(document()).await?;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].text, "Coastal Adventures");
        assert_eq!(candidates[0].source, Provenance::Heuristic);
        Ok(())
    }

    #[tokio::test]
    async fn layout_candidate_replaces_nearby_heuristic() -> Result<()> {
        let extractor =
            HybridExtractor::new(HeuristicParams::default()).with_layout(Arc::new(FixedDetector), DEFAULT_BOX_TOLERANCE);
        let candidates = extractor.extract(document()).await?;
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].is_layout());
        assert_eq!(candidates[0].confidence, 0.95);
        assert_eq!(candidates[0].y, 100.0);
        Ok(())
    }

    #[tokio::test]
    async fn slow_layout_falls_back_to_heuristics() -> Result<()> {
        let extractor = HybridExtractor::new(HeuristicParams::default())
            .with_layout(Arc::new(SlowDetector), DEFAULT_BOX_TOLERANCE)
            .with_timeout(Duration::from_millis(20));
        let candidates = extractor.extract(document()).await?;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source, Provenance::Heuristic);
        Ok(())
    }

    /// Three pages, each slower than the deadline.
    struct CountingSlowDetector(Arc<AtomicUsize>);

    impl LayoutDetector for CountingSlowDetector {
        fn detect_page(&self, document: &ParsedDocument, page_idx: usize) -> Result<Vec<LayoutBox>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            SlowDetector.detect_page(document, page_idx)
        }
    }

    #[tokio::test]
    async fn timed_out_layout_stops_after_its_current_page() -> Result<()> {
        let mut doc = (*document()).clone();
        let first = doc.pages[0].clone();
        for page_idx in 1..3 {
            doc.pages.push(Page { page_idx, ..first.clone() });
        }
        let calls = Arc::new(AtomicUsize::new(0));
        let extractor = HybridExtractor::new(HeuristicParams::default())
            .with_layout(Arc::new(CountingSlowDetector(Arc::clone(&calls))), DEFAULT_BOX_TOLERANCE)
            .with_timeout(Duration::from_millis(20));

        let candidates = extractor.extract(Arc::new(doc)).await?;
        assert!(candidates.iter().all(|c| c.source == Provenance::Heuristic));

        tokio::time::sleep(Duration::from_millis(700)).await;
        // at most the page already in flight when the deadline hit
        assert!(calls.load(Ordering::SeqCst) <= 1);
        Ok(())
    }

    #[tokio::test]
    async fn failing_pages_leave_heuristics_in_place() -> Result<()> {
        let extractor =
            HybridExtractor::new(HeuristicParams::default()).with_layout(Arc::new(FailingDetector), DEFAULT_BOX_TOLERANCE);
        let candidates = extractor.extract(document()).await?;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source, Provenance::Heuristic);
        assert_eq!(candidates[0].y, 105.0);
        Ok(())
    }
}
