pub mod line_merger;
pub mod pdf_reader;
pub mod stext;

pub use pdf_reader::{MutoolParser, PdfReader};

use anyhow::Result;
use std::path::Path;

use crate::core::model::ParsedDocument;

/// Document-parsing capability: a PDF in, every page's spans and words out.
pub trait ParserTrack {
    fn parse_document(&self, pdf_path: &Path) -> Result<ParsedDocument>;
}
