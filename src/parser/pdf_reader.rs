use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::model::ParsedDocument;
use crate::parser::stext::decode_stext;
use crate::parser::ParserTrack;

#[derive(Debug, Clone)]
pub struct PdfReader {
    path: PathBuf,
}

impl PdfReader {
    pub fn new(path: PathBuf) -> Result<Self> {
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> Result<usize> {
        get_page_count(&self.path)
    }

    pub fn parse(&self) -> Result<ParsedDocument> {
        MutoolParser::default().parse_document(&self.path)
    }
}

/// Structured text through `mutool draw -F stext`.
#[derive(Debug, Clone)]
pub struct MutoolParser {
    binary: PathBuf,
}

impl Default for MutoolParser {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("mutool"),
        }
    }
}

impl MutoolParser {
    pub fn with_binary(mut self, binary: PathBuf) -> Self {
        self.binary = binary;
        self
    }
}

impl ParserTrack for MutoolParser {
    fn parse_document(&self, pdf_path: &Path) -> Result<ParsedDocument> {
        let work_dir = tempfile::Builder::new()
            .prefix("docrank-stext-")
            .tempdir()
            .context("failed to create scratch directory for structured text")?;
        let out_path = work_dir.path().join("document.stext.xml");

        let output = Command::new(&self.binary)
            .arg("draw")
            .arg("-q")
            .arg("-F")
            .arg("stext")
            .arg("-o")
            .arg(&out_path)
            .arg(pdf_path)
            .output()
            .with_context(|| "failed to invoke mutool; is mupdf-tools installed?")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("mutool failed on {}: {stderr}", pdf_path.display());
        }

        let xml = fs::read_to_string(&out_path)
            .with_context(|| format!("failed to read {}", out_path.display()))?;
        let pages = decode_stext(&xml)
            .with_context(|| format!("failed to decode structured text of {}", pdf_path.display()))?;

        Ok(ParsedDocument {
            name: document_name(pdf_path),
            path: pdf_path.to_path_buf(),
            pages,
        })
    }
}

pub fn document_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn get_page_count(pdf_path: &Path) -> Result<usize> {
    let output = Command::new("pdfinfo")
        .arg(pdf_path)
        .output()
        .with_context(|| format!("failed to invoke pdfinfo on {}", pdf_path.display()))?;

    if !output.status.success() {
        anyhow::bail!("pdfinfo failed with status: {}", output.status);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_page_count(&stdout).with_context(|| {
        format!(
            "pdfinfo output did not contain a 'Pages:' line for {}",
            pdf_path.display()
        )
    })
}

fn parse_page_count(pdfinfo: &str) -> Result<usize> {
    for line in pdfinfo.lines() {
        if let Some(rest) = line.strip_prefix("Pages:") {
            let num_str = rest.trim();
            let pages: usize = num_str.parse().with_context(|| {
                format!("failed to parse page count from 'Pages:' line: {num_str}")
            })?;
            return Ok(pages);
        }
    }
    anyhow::bail!("no 'Pages:' line")
}
