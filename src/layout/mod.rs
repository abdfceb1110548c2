pub mod bridge;
pub mod layout_builder;
pub mod renderer;

pub use bridge::{LayoutBridge, RawDetection};
pub use layout_builder::LayoutPass;
pub use renderer::{PageRenderer, RenderedPage};

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::geometry::BBox;
use crate::core::model::ParsedDocument;
use renderer::pixel_to_point_scale;

/// One detected region, already in PDF points.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBox {
    pub label: String,
    pub score: f32,
    pub bbox: BBox,
}

/// Layout-detection capability: one page in, labelled boxes out.
pub trait LayoutDetector: Send + Sync {
    fn detect_page(&self, document: &ParsedDocument, page_idx: usize) -> Result<Vec<LayoutBox>>;
}

/// Turns one PDF page into an image on disk.
pub trait PageRasterizer: Send + Sync {
    fn dpi(&self) -> u32;
    fn render_page(&self, pdf_path: &Path, page_idx: usize) -> Result<RenderedPage>;
}

/// Runs the layout model on one page image.
pub trait DetectionBackend: Send + Sync {
    fn detect(&self, image_path: &Path) -> Result<Vec<RawDetection>>;
}

/// Rasterizes a page and hands the image to a detection backend, by default
/// poppler and the Python layout bridge.
#[derive(Debug)]
pub struct BridgeDetector<R = PageRenderer, B = LayoutBridge> {
    renderer: R,
    backend: B,
}

impl<R, B> BridgeDetector<R, B> {
    pub fn new(renderer: R, backend: B) -> Self {
        Self { renderer, backend }
    }
}

impl<R> BridgeDetector<R, LayoutBridge> {
    pub fn probe(&self) -> Result<()> {
        self.backend.probe()
    }
}

impl<R: PageRasterizer, B: DetectionBackend> LayoutDetector for BridgeDetector<R, B> {
    fn detect_page(&self, document: &ParsedDocument, page_idx: usize) -> Result<Vec<LayoutBox>> {
        let page = document
            .page(page_idx)
            .with_context(|| format!("page {page_idx} out of range"))?;
        let rendered = self.renderer.render_page(&document.path, page_idx)?;
        let detections = self.backend.detect(&rendered.path);
        let image_width = rendered.width;
        // the image goes before any detection error is reported
        rendered.release();

        let scale = pixel_to_point_scale(page.width, image_width, self.renderer.dpi());
        let boxes = detections?
            .into_iter()
            .map(|det| {
                let [x0, y0, x1, y1] = det.coordinate;
                LayoutBox {
                    label: det.label,
                    score: det.score,
                    bbox: BBox::new(x0, y0, x1, y1).scale(scale),
                }
            })
            .collect();
        Ok(boxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Page;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Writes a placeholder image into a fresh scratch directory and keeps
    /// track of where it went.
    #[derive(Default)]
    struct ScratchRasterizer {
        dirs: Mutex<Vec<PathBuf>>,
    }

    impl ScratchRasterizer {
        fn dirs(&self) -> Vec<PathBuf> {
            self.dirs.lock().map(|dirs| dirs.clone()).unwrap_or_default()
        }
    }

    impl PageRasterizer for ScratchRasterizer {
        fn dpi(&self) -> u32 {
            150
        }

        fn render_page(&self, _pdf_path: &Path, _page_idx: usize) -> Result<RenderedPage> {
            let dir = tempfile::tempdir()?;
            let path = dir.path().join("page.png");
            std::fs::write(&path, b"png")?;
            if let Ok(mut dirs) = self.dirs.lock() {
                dirs.push(dir.path().to_path_buf());
            }
            Ok(RenderedPage::new(dir, path, 1200, 1600))
        }
    }

    struct FixedBackend(Result<Vec<RawDetection>, String>);

    impl DetectionBackend for FixedBackend {
        fn detect(&self, image_path: &Path) -> Result<Vec<RawDetection>> {
            assert!(image_path.exists(), "image must exist while detecting");
            self.0.clone().map_err(anyhow::Error::msg)
        }
    }

    fn document() -> ParsedDocument {
        ParsedDocument {
            name: "guide.pdf".to_string(),
            path: PathBuf::from("guide.pdf"),
            pages: vec![Page {
                page_idx: 0,
                width: 600.0,
                height: 800.0,
                lines: Vec::new(),
                words: Vec::new(),
            }],
        }
    }

    #[test]
    fn scales_detections_to_points_and_releases_the_image() -> Result<()> {
        let backend = FixedBackend(Ok(vec![RawDetection {
            label: "doc_title".to_string(),
            score: 0.9,
            coordinate: [200.0, 100.0, 600.0, 140.0],
        }]));
        let detector = BridgeDetector::new(ScratchRasterizer::default(), backend);

        let boxes = detector.detect_page(&document(), 0)?;
        assert_eq!(
            boxes,
            vec![LayoutBox {
                label: "doc_title".to_string(),
                score: 0.9,
                bbox: BBox::new(100.0, 50.0, 300.0, 70.0),
            }]
        );
        assert!(detector.renderer.dirs().iter().all(|dir| !dir.exists()));
        Ok(())
    }

    #[test]
    fn failed_detection_still_releases_the_image() {
        let backend = FixedBackend(Err("model crashed".to_string()));
        let detector = BridgeDetector::new(ScratchRasterizer::default(), backend);

        let err = detector.detect_page(&document(), 0).unwrap_err();
        assert!(err.to_string().contains("model crashed"));
        let dirs = detector.renderer.dirs();
        assert_eq!(dirs.len(), 1);
        assert!(!dirs[0].exists());
    }

    #[test]
    fn out_of_range_page_renders_nothing() {
        let detector = BridgeDetector::new(ScratchRasterizer::default(), FixedBackend(Ok(Vec::new())));
        assert!(detector.detect_page(&document(), 3).is_err());
        assert!(detector.renderer.dirs().is_empty());
    }
}
