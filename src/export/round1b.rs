use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::model::Section;

pub const OUTPUT_FILE_NAME: &str = "challenge1b_output.json";
pub const DEFAULT_TOP_K_OUTPUT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub input_documents: Vec<String>,
    pub persona: String,
    pub job_to_be_done: String,
    pub processing_timestamp: String,
    pub total_sections_found: usize,
    pub top_k_selected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedSection {
    pub document: String,
    pub section_title: String,
    /// 1-based position in the score order.
    pub importance_rank: usize,
    pub page_number: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsectionAnalysis {
    pub document: String,
    pub refined_text: String,
    pub page_number: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Round1BOutput {
    pub metadata: Metadata,
    pub extracted_sections: Vec<ExtractedSection>,
    pub subsection_analysis: Vec<SubsectionAnalysis>,
}

#[derive(Debug, Clone, PartialEq)]
struct SourcedSection {
    document: String,
    section: Section,
}

/// Collects sections from every document of a collection and writes the
/// global top-K as `challenge1b_output.json`.
#[derive(Debug, Clone)]
pub struct Round1BFormatter {
    input_documents: Vec<String>,
    persona: String,
    job_to_be_done: String,
    top_k: usize,
    sections: Vec<SourcedSection>,
}

impl Round1BFormatter {
    pub fn new(input_documents: Vec<String>, persona: &str, job_to_be_done: &str, top_k: usize) -> Self {
        Self {
            input_documents,
            persona: persona.to_string(),
            job_to_be_done: job_to_be_done.to_string(),
            top_k,
            sections: Vec::new(),
        }
    }

    pub fn add_document_results(&mut self, document: &str, sections: &[Section]) {
        self.sections.extend(sections.iter().map(|section| SourcedSection {
            document: document.to_string(),
            section: section.clone(),
        }));
    }

    pub fn total_sections(&self) -> usize {
        self.sections.len()
    }

    /// Sections ordered by descending score, cut to the top K. Equal scores
    /// keep the order they were added in.
    pub fn build(&self, processing_timestamp: String) -> Round1BOutput {
        let mut ranked: Vec<&SourcedSection> = self.sections.iter().collect();
        ranked.sort_by(|a, b| b.section.score.total_cmp(&a.section.score));
        ranked.truncate(self.top_k);

        let extracted_sections = ranked
            .iter()
            .enumerate()
            .map(|(idx, item)| ExtractedSection {
                document: item.document.clone(),
                section_title: item.section.heading.clone(),
                importance_rank: idx + 1,
                page_number: item.section.page_number,
            })
            .collect();
        let subsection_analysis = ranked
            .iter()
            .map(|item| SubsectionAnalysis {
                document: item.document.clone(),
                refined_text: item.section.content.clone(),
                page_number: item.section.page_number,
            })
            .collect();

        Round1BOutput {
            metadata: Metadata {
                input_documents: self.input_documents.clone(),
                persona: self.persona.clone(),
                job_to_be_done: self.job_to_be_done.clone(),
                processing_timestamp,
                total_sections_found: self.sections.len(),
                top_k_selected: ranked.len(),
            },
            extracted_sections,
            subsection_analysis,
        }
    }

    pub fn save(&self, output_folder: &Path) -> Result<PathBuf> {
        let output = self.build(processing_timestamp());
        fs::create_dir_all(output_folder)
            .with_context(|| format!("failed to create {}", output_folder.display()))?;
        let path = output_folder.join(OUTPUT_FILE_NAME);
        let data = serde_json::to_string_pretty(&output)?;
        fs::write(&path, data).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            selected = output.metadata.top_k_selected,
            total = output.metadata.total_sections_found,
            "round 1B output saved"
        );
        Ok(path)
    }
}

/// Local time, ISO-8601 with microseconds.
pub fn processing_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn section(heading: &str, score: f32, page_number: usize) -> Section {
        Section {
            heading: heading.to_string(),
            score,
            content: format!("{heading} body."),
            page_number,
        }
    }

    fn formatter(top_k: usize) -> Round1BFormatter {
        let mut formatter = Round1BFormatter::new(
            vec!["a.pdf".to_string(), "b.pdf".to_string()],
            "Travel Planner",
            "Plan a trip",
            top_k,
        );
        formatter.add_document_results("a.pdf", &[section("Beaches", 0.41, 2), section("History", 0.12, 5)]);
        formatter.add_document_results("b.pdf", &[section("Nightlife", 0.87, 1), section("Markets", 0.41, 3)]);
        formatter
    }

    #[test]
    fn ranks_globally_and_truncates() {
        let output = formatter(3).build("2025-01-01T00:00:00.000000".to_string());

        assert_eq!(output.metadata.total_sections_found, 4);
        assert_eq!(output.metadata.top_k_selected, 3);
        let ranked: Vec<(&str, &str, usize)> = output
            .extracted_sections
            .iter()
            .map(|s| (s.document.as_str(), s.section_title.as_str(), s.importance_rank))
            .collect();
        assert_eq!(
            ranked,
            vec![("b.pdf", "Nightlife", 1), ("a.pdf", "Beaches", 2), ("b.pdf", "Markets", 3)]
        );
        assert_eq!(output.subsection_analysis[1].refined_text, "Beaches body.");
        assert_eq!(output.subsection_analysis[1].page_number, 2);
    }

    #[test]
    fn top_k_larger_than_total_keeps_everything() {
        let output = formatter(20).build(String::new());
        assert_eq!(output.metadata.top_k_selected, 4);
        assert_eq!(output.extracted_sections.len(), output.subsection_analysis.len());
    }

    #[test]
    fn writes_json_document() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = formatter(2).save(dir.path())?;
        assert_eq!(path, dir.path().join(OUTPUT_FILE_NAME));

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(value["metadata"]["persona"], "Travel Planner");
        assert_eq!(value["metadata"]["input_documents"][1], "b.pdf");
        assert_eq!(value["extracted_sections"][0]["section_title"], "Nightlife");
        assert_eq!(value["subsection_analysis"].as_array().map(Vec::len), Some(2));
        Ok(())
    }
}
