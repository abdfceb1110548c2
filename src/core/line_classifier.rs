use crate::core::model::{HeadingReason, LogicalLine, ReasonSet};
use crate::core::stats::LineStats;
use crate::core::text::{is_all_upper, is_title_case};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierParams {
    /// Font size above `median * ratio` counts as larger.
    pub larger_font_ratio: f32,
    /// Lines narrower than `dominant_width * ratio` count as short.
    pub width_threshold_ratio: f32,
    /// Max distance between left margin and mirrored right margin.
    pub centered_tolerance: f32,
    /// Lines with fewer words than this count as short.
    pub short_line_words: usize,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            larger_font_ratio: 1.15,
            width_threshold_ratio: 0.75,
            centered_tolerance: 20.0,
            short_line_words: 10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LineSignals {
    pub size: f32,
    pub median_font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub centering_offset: f32,
    pub width: f32,
    pub width_threshold: f32,
    pub word_count: usize,
    pub all_upper: bool,
    pub title_case: bool,
}

impl LineSignals {
    pub fn from_line(line: &LogicalLine, stats: &LineStats, params: &ClassifierParams) -> Self {
        Self {
            size: line.size,
            median_font_size: stats.median_font_size,
            bold: line.span.is_bold(),
            italic: line.span.flags.is_italic(),
            centering_offset: line.span.bbox.centering_offset(line.span.page_width),
            width: line.width(),
            width_threshold: stats.dominant_width * params.width_threshold_ratio,
            word_count: line.word_count(),
            all_upper: is_all_upper(&line.text),
            title_case: is_title_case(&line.text),
        }
    }
}

pub fn classify_line(signals: LineSignals, params: &ClassifierParams) -> ReasonSet {
    let mut reasons = ReasonSet::default();
    let short = signals.word_count < params.short_line_words;

    if signals.size > signals.median_font_size * params.larger_font_ratio {
        reasons.insert(HeadingReason::LargerFont);
    }
    if signals.bold {
        reasons.insert(HeadingReason::Bold);
    }
    if signals.italic {
        reasons.insert(HeadingReason::Italic);
    }
    if signals.centering_offset < params.centered_tolerance
        && (signals.width < signals.width_threshold || short)
    {
        reasons.insert(HeadingReason::CenteredShortLine);
    }
    if signals.all_upper {
        reasons.insert(HeadingReason::AllUppercase);
    }
    if signals.title_case {
        reasons.insert(HeadingReason::TitleCase);
    }
    if short && signals.size > signals.median_font_size {
        reasons.insert(HeadingReason::ShortProminent);
    }

    reasons
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_signals() -> LineSignals {
        LineSignals {
            size: 11.0,
            median_font_size: 11.0,
            bold: false,
            italic: false,
            centering_offset: 200.0,
            width: 430.0,
            width_threshold: 322.5,
            word_count: 14,
            all_upper: false,
            title_case: false,
        }
    }

    #[test]
    fn plain_body_line_has_no_reasons() {
        assert!(classify_line(body_signals(), &ClassifierParams::default()).is_empty());
    }

    #[test]
    fn large_bold_heading() {
        let signals = LineSignals {
            size: 18.0,
            bold: true,
            word_count: 1,
            all_upper: true,
            title_case: true,
            ..body_signals()
        };
        let reasons = classify_line(signals, &ClassifierParams::default());
        assert!(reasons.contains(HeadingReason::LargerFont));
        assert!(reasons.contains(HeadingReason::Bold));
        assert!(reasons.contains(HeadingReason::AllUppercase));
        assert!(reasons.contains(HeadingReason::ShortProminent));
        assert!(!reasons.contains(HeadingReason::CenteredShortLine));
        assert!(!reasons.contains(HeadingReason::Italic));
    }

    #[test]
    fn italic_line_is_flagged_on_its_own() {
        let signals = LineSignals {
            italic: true,
            ..body_signals()
        };
        let reasons = classify_line(signals, &ClassifierParams::default());
        assert!(reasons.contains(HeadingReason::Italic));
        assert_eq!(reasons.len(), 1);
    }

    #[test]
    fn centered_requires_short_or_narrow() {
        let centered_long = LineSignals {
            centering_offset: 4.0,
            ..body_signals()
        };
        assert!(classify_line(centered_long, &ClassifierParams::default()).is_empty());

        let centered_narrow = LineSignals {
            width: 200.0,
            ..centered_long
        };
        let reasons = classify_line(centered_narrow, &ClassifierParams::default());
        assert!(reasons.contains(HeadingReason::CenteredShortLine));
    }

    #[test]
    fn slightly_larger_font_is_prominent_but_not_larger() {
        let signals = LineSignals {
            size: 12.0,
            word_count: 3,
            ..body_signals()
        };
        let reasons = classify_line(signals, &ClassifierParams::default());
        assert!(reasons.contains(HeadingReason::ShortProminent));
        assert!(!reasons.contains(HeadingReason::LargerFont));
    }
}
