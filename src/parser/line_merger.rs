use crate::core::model::{LogicalLine, Page, TextSpan};
use crate::core::text::{ends_with_terminal_punctuation, is_binary_data, normalize_text};

/// Gap between consecutive span origins, in multiples of the font size, that
/// starts a new paragraph.
pub const DEFAULT_PARAGRAPH_GAP_RATIO: f32 = 1.2;

/// Spans of one page in reading order: by line origin (rounded to one
/// decimal), then left edge.
pub fn reading_order(page: &Page) -> Vec<&TextSpan> {
    let mut spans: Vec<&TextSpan> = page.lines.iter().flat_map(|line| line.spans.iter()).collect();
    spans.sort_by(|a, b| {
        round1(a.origin_y)
            .total_cmp(&round1(b.origin_y))
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });
    spans
}

/// Greedily merge a page's spans into logical lines.
///
/// A line is closed when the text gathered so far ends a sentence, or when the
/// next span sits more than `gap_ratio` font sizes below the previous one.
pub fn merge_page_lines(page: &Page, gap_ratio: f32) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut buffer = String::new();
    let mut last: Option<(f32, &TextSpan)> = None;

    for span in reading_order(page) {
        if is_binary_data(&span.text) {
            continue;
        }
        let text = normalize_text(&span.text);
        if text.is_empty() {
            continue;
        }

        let current_y = round1(span.origin_y);
        let new_paragraph = last
            .map(|(last_y, _)| (current_y - last_y).abs() > span.size * gap_ratio)
            .unwrap_or(false);

        if !buffer.is_empty() && (ends_with_terminal_punctuation(&buffer) || new_paragraph) {
            if let Some((_, last_span)) = last {
                lines.push(logical_line(std::mem::take(&mut buffer), last_span));
            }
            buffer = text;
        } else if buffer.is_empty() {
            buffer = text;
        } else {
            buffer.push(' ');
            buffer.push_str(&text);
        }

        last = Some((current_y, span));
    }

    if let Some((_, last_span)) = last {
        if !buffer.is_empty() {
            lines.push(logical_line(buffer, last_span));
        }
    }

    lines
}

fn logical_line(text: String, span: &TextSpan) -> LogicalLine {
    LogicalLine {
        text: text.trim().to_string(),
        size: span.size,
        span: span.clone(),
    }
}

fn round1(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}
