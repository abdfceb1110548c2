use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use super::PageRasterizer;

/// A rasterized page living in its own scratch directory.
///
/// The directory is removed by [`RenderedPage::release`], or on drop if the
/// page is never released explicitly.
#[derive(Debug)]
pub struct RenderedPage {
    dir: TempDir,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl RenderedPage {
    pub fn new(dir: TempDir, path: PathBuf, width: u32, height: u32) -> Self {
        Self { dir, path, width, height }
    }

    /// Remove the scratch directory. Cleanup failures are logged only.
    pub fn release(self) {
        let dir = self.dir.path().to_path_buf();
        if let Err(err) = self.dir.close() {
            tracing::warn!(dir = %dir.display(), error = %err, "failed to remove rendered page");
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageRenderer {
    dpi: u32,
}

impl Default for PageRenderer {
    fn default() -> Self {
        Self { dpi: 150 }
    }
}

impl PageRenderer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }
}

impl PageRasterizer for PageRenderer {
    fn dpi(&self) -> u32 {
        self.dpi
    }

    fn render_page(&self, pdf_path: &Path, page_idx: usize) -> Result<RenderedPage> {
        let dir = tempfile::Builder::new()
            .prefix("docrank-page-")
            .tempdir()
            .context("failed to create scratch directory for page rendering")?;

        // pdftoppm uses 1-based page indices
        let page_number = page_idx + 1;
        let prefix = dir.path().join("page");

        let status = Command::new("pdftoppm")
            .arg("-png")
            .arg("-singlefile")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-f")
            .arg(page_number.to_string())
            .arg("-l")
            .arg(page_number.to_string())
            .arg(pdf_path)
            .arg(&prefix)
            .status()
            .with_context(|| "failed to invoke pdftoppm; is poppler-utils installed?")?;

        if !status.success() {
            anyhow::bail!("pdftoppm failed with status: {status}");
        }

        // -singlefile writes exactly `<prefix>.png`
        let image_path = prefix.with_extension("png");
        if !image_path.exists() {
            anyhow::bail!("expected rendered image not found: {}", image_path.display());
        }

        let (width, height) = image::image_dimensions(&image_path)
            .with_context(|| format!("failed to read dimensions of {}", image_path.display()))?;

        Ok(RenderedPage::new(dir, image_path, width, height))
    }
}

/// Factor converting rendered pixels back to PDF points for a page.
pub fn pixel_to_point_scale(page_width: f32, image_width: u32, dpi: u32) -> f32 {
    if image_width > 0 && page_width > 0.0 {
        page_width / image_width as f32
    } else {
        72.0 / dpi.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_prefers_measured_width() {
        assert!((pixel_to_point_scale(612.0, 1275, 150) - 0.48).abs() < 1e-6);
        assert!((pixel_to_point_scale(612.0, 0, 150) - 0.48).abs() < 1e-6);
        assert_eq!(pixel_to_point_scale(0.0, 0, 144), 0.5);
        assert_eq!(pixel_to_point_scale(600.0, 1200, 150), 0.5);
    }

    #[test]
    fn release_removes_scratch_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path().to_path_buf();
        let path = root.join("page.png");
        std::fs::write(&path, b"png")?;
        let page = RenderedPage::new(dir, path, 1, 1);
        page.release();
        assert!(!root.exists());
        Ok(())
    }

    #[test]
    #[ignore] // needs pdftoppm and a sample PDF
    fn renders_first_page() -> Result<()> {
        let page = PageRenderer::default().render_page(Path::new("test/test_document.pdf"), 0)?;
        assert!(page.width > 0 && page.height > 0);
        page.release();
        Ok(())
    }
}
