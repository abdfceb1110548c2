//! Body text between consecutive chosen headings.

use crate::core::model::{ParsedDocument, RankedMatch, Section};
use crate::core::text::{clean_text, is_binary_data, WordBudget};

/// Where a section stops: the next heading's position, or the end of the
/// document.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Boundary {
    page_idx: usize,
    y: Option<f32>,
}

/// One section per match, ordered by the heading's (page, y).
///
/// A section runs from its heading up to the next chosen heading, so text
/// under headings that were not chosen is absorbed by the preceding section.
pub fn extract_sections(document: &ParsedDocument, matches: &[RankedMatch], budget: WordBudget) -> Vec<Section> {
    let mut sorted: Vec<&RankedMatch> = matches.iter().collect();
    sorted.sort_by(|a, b| {
        a.candidate
            .page_idx
            .cmp(&b.candidate.page_idx)
            .then(a.candidate.y.total_cmp(&b.candidate.y))
    });

    let last_page = document.page_count().saturating_sub(1);
    sorted
        .iter()
        .enumerate()
        .map(|(i, current)| {
            let end = match sorted.get(i + 1) {
                Some(next) => Boundary {
                    page_idx: next.candidate.page_idx,
                    y: Some(next.candidate.y),
                },
                None => Boundary {
                    page_idx: last_page,
                    y: None,
                },
            };
            let raw = section_text(document, current.candidate.page_idx, current.candidate.y, end);
            Section {
                heading: current.candidate.text.clone(),
                score: current.score,
                content: clean_text(&raw, budget),
                page_number: current.candidate.page_idx + 1,
            }
        })
        .collect()
}

fn section_text(document: &ParsedDocument, start_page: usize, start_y: f32, end: Boundary) -> String {
    let mut text = String::new();
    for page in document
        .pages
        .iter()
        .filter(|page| page.page_idx >= start_page && page.page_idx <= end.page_idx)
    {
        for line in &page.lines {
            let line_y = line.bbox.y0;
            if page.page_idx == start_page && line_y < start_y {
                continue;
            }
            if page.page_idx == end.page_idx && end.y.is_some_and(|end_y| line_y >= end_y) {
                continue;
            }
            for span in line.spans.iter().filter(|span| !is_binary_data(&span.text)) {
                text.push_str(&span.text);
                text.push(' ');
            }
        }
        text.push('\n');
    }
    text
}
