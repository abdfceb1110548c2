use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use crate::config::{CollectionConfig, ExtractionSettings, OutputSettings};
use crate::core::model::{HeadingCandidate, ParsedDocument, RankedMatch, Section};
use crate::core::text::WordBudget;
use crate::export::{DocumentResultsExporter, Exporter, Round1BFormatter};
use crate::heading::HybridExtractor;
use crate::layout::{BridgeDetector, LayoutBridge, PageRenderer};
use crate::parser::pdf_reader::document_name;
use crate::parser::ParserTrack;
use crate::rank::{Embedder, SemanticRanker};
use crate::sections::extract_sections;

/// Heading extractor built from the extraction settings. Layout detection is
/// attached only when enabled and its bridge passes the startup probe.
pub fn build_extractor(settings: &ExtractionSettings) -> HybridExtractor {
    let extractor = HybridExtractor::new(settings.heuristic_params())
        .with_fusion(settings.fusion())
        .with_timeout(settings.layout_timeout());
    if !settings.enable_layout_detection {
        return extractor;
    }

    let bridge = LayoutBridge::new(settings.layout_script.clone())
        .with_python(settings.python.clone())
        .with_model_dir(settings.layout_model_dir.clone());
    let detector = BridgeDetector::new(PageRenderer::new(settings.render_dpi), bridge);
    match detector.probe() {
        Ok(()) => extractor.with_layout(Arc::new(detector), settings.box_tolerance),
        Err(err) => {
            tracing::warn!(error = %err, "layout detection unavailable, using heuristics only");
            extractor
        }
    }
}

/// Parse one PDF and collect its heading candidates. Parsing shells out, so
/// it runs on the blocking pool.
pub async fn extract_candidates<P>(
    parser: Arc<P>,
    extractor: &HybridExtractor,
    pdf_path: &Path,
) -> Result<(Arc<ParsedDocument>, Vec<HeadingCandidate>)>
where
    P: ParserTrack + Send + Sync + 'static,
{
    let path = pdf_path.to_path_buf();
    let document = tokio::task::spawn_blocking(move || {
        parser
            .parse_document(&path)
            .with_context(|| format!("failed to parse {}", path.display()))
    })
    .await
    .context("parser task failed")??;
    let document = Arc::new(document);
    let candidates = extractor.extract(Arc::clone(&document)).await?;
    Ok((document, candidates))
}

/// PDFs directly inside `folder`, ordered by file name.
pub fn list_pdfs(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut pdfs: Vec<PathBuf> = fs::read_dir(folder)
        .with_context(|| format!("failed to read input folder {}", folder.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    pdfs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(pdfs)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionSummary {
    pub documents: usize,
    pub documents_with_sections: usize,
    pub sections_found: usize,
    pub output_path: Option<PathBuf>,
}

pub struct Pipeline<P, E> {
    parser: Arc<P>,
    extractor: HybridExtractor,
    /// Model inference runs on the blocking pool, one document at a time.
    ranker: Arc<Mutex<SemanticRanker<E>>>,
    budget: WordBudget,
}

impl<P, E> Pipeline<P, E>
where
    P: ParserTrack + Send + Sync + 'static,
    E: Embedder + Send + 'static,
{
    pub fn new(parser: P, extractor: HybridExtractor, embedder: E, budget: WordBudget) -> Self {
        Self {
            parser: Arc::new(parser),
            extractor,
            ranker: Arc::new(Mutex::new(SemanticRanker::new(embedder))),
            budget,
        }
    }

    async fn rank(&self, candidates: Vec<HeadingCandidate>, job_query: &str, top_k: usize) -> Result<Vec<RankedMatch>> {
        let ranker = Arc::clone(&self.ranker);
        let query = job_query.to_string();
        tokio::task::spawn_blocking(move || {
            let mut ranker = ranker
                .lock()
                .map_err(|err| anyhow::anyhow!("ranker lock poisoned: {err}"))?;
            ranker.top_k(candidates, &query, top_k)
        })
        .await
        .context("ranking task failed")?
    }

    /// Sections for the top `top_k` headings of one document. An empty result
    /// means the document had nothing to contribute.
    pub async fn process_document(&mut self, pdf_path: &Path, job_query: &str, top_k: usize) -> Result<Vec<Section>> {
        let (document, candidates) = extract_candidates(Arc::clone(&self.parser), &self.extractor, pdf_path).await?;
        tracing::info!(document = %document.name, count = candidates.len(), "heading candidates");
        if candidates.is_empty() {
            tracing::info!(document = %document.name, "no heading candidates, skipping");
            return Ok(Vec::new());
        }

        let matches = self.rank(candidates, job_query, top_k).await?;
        if matches.is_empty() {
            tracing::info!(document = %document.name, "no matching headings, skipping");
            return Ok(Vec::new());
        }

        Ok(extract_sections(&document, &matches, self.budget))
    }

    /// Run every PDF of a collection and write the collection output into
    /// `output_folder`. Failing documents are logged and skipped.
    pub async fn process_collection(
        &mut self,
        name: &str,
        collection: &CollectionConfig,
        output: &OutputSettings,
        output_folder: &Path,
    ) -> Result<CollectionSummary> {
        tracing::info!(
            collection = name,
            input = %collection.input_folder.display(),
            persona = %collection.persona,
            job = %collection.job_to_be_done,
            "processing collection"
        );

        let pdfs = list_pdfs(&collection.input_folder)?;
        if pdfs.is_empty() {
            tracing::info!(collection = name, "no PDF files found in {}", collection.input_folder.display());
            return Ok(CollectionSummary::default());
        }

        let input_documents: Vec<String> = pdfs.iter().map(|path| document_name(path)).collect();
        let mut formatter = Round1BFormatter::new(
            input_documents,
            &collection.persona,
            &collection.job_to_be_done,
            output.top_k_output,
        );
        let exporter = DocumentResultsExporter::new(output_folder.to_path_buf());
        let mut summary = CollectionSummary {
            documents: pdfs.len(),
            ..CollectionSummary::default()
        };

        for pdf_path in &pdfs {
            let document = document_name(pdf_path);
            let sections = match self
                .process_document(pdf_path, &collection.job_query, output.top_k_matches)
                .await
            {
                Ok(sections) => sections,
                Err(err) => {
                    tracing::error!(document = %document, error = %format!("{err:#}"), "failed to process document");
                    continue;
                }
            };
            if sections.is_empty() {
                continue;
            }

            formatter.add_document_results(&document, &sections);
            summary.documents_with_sections += 1;

            if output.save_individual_results {
                match exporter.export(&document, &sections) {
                    Ok(path) => tracing::info!(document = %document, path = %path.display(), "individual results saved"),
                    Err(err) => tracing::error!(document = %document, error = %format!("{err:#}"), "failed to save individual results"),
                }
            } else {
                tracing::info!(document = %document, count = sections.len(), "sections extracted");
            }
        }

        summary.sections_found = formatter.total_sections();
        match formatter.save(output_folder) {
            Ok(path) => summary.output_path = Some(path),
            Err(err) => tracing::error!(collection = name, error = %format!("{err:#}"), "failed to write collection output"),
        }
        Ok(summary)
    }
}
