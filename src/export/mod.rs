pub mod json_export;
pub mod round1b;

use anyhow::Result;
use std::path::PathBuf;

use crate::core::model::Section;

pub use json_export::DocumentResultsExporter;
pub use round1b::Round1BFormatter;

/// Persists the sections of one document; returns where they went.
pub trait Exporter {
    fn export(&self, document: &str, sections: &[Section]) -> Result<PathBuf>;
}
