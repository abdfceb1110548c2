use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::model::Section;
use crate::export::Exporter;

/// Writes `<stem>_results.json` next to the collection output.
#[derive(Debug, Clone)]
pub struct DocumentResultsExporter {
    out_dir: PathBuf,
}

impl DocumentResultsExporter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }

    pub fn results_path(&self, document: &str) -> PathBuf {
        let stem = Path::new(document)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| document.to_string());
        self.out_dir.join(format!("{stem}_results.json"))
    }
}

impl Exporter for DocumentResultsExporter {
    fn export(&self, document: &str, sections: &[Section]) -> Result<PathBuf> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("failed to create {}", self.out_dir.display()))?;
        let path = self.results_path(document);
        let data = serde_json::to_string_pretty(sections)?;
        fs::write(&path, data).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}
