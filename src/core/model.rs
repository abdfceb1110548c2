use std::fmt;
use std::path::PathBuf;

use serde::{Serialize, Serializer};

use crate::core::geometry::BBox;

/// Confidence attached to every candidate that only the heuristics vouch for.
pub const HEURISTIC_CONFIDENCE: f32 = 0.7;

/// Font style bits carried by a span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StyleFlags(pub u32);

impl StyleFlags {
    pub const ITALIC: u32 = 1;
    pub const BOLD: u32 = 1 << 1;

    /// Structured-text output carries no flag word, so the style is read off
    /// the font name (`Helvetica-BoldOblique`, `Arial Black`, ...).
    pub fn from_font_name(font: &str) -> Self {
        let lower = font.to_lowercase();
        let mut bits = 0;
        if ["bold", "black", "heavy"].iter().any(|w| lower.contains(w)) {
            bits |= Self::BOLD;
        }
        if lower.contains("italic") || lower.contains("oblique") {
            bits |= Self::ITALIC;
        }
        Self(bits)
    }

    pub fn is_bold(self) -> bool {
        self.0 & Self::BOLD != 0
    }

    pub fn is_italic(self) -> bool {
        self.0 & Self::ITALIC != 0
    }
}

/// A run of text with a uniform font, tagged with where it sits on its page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub font: String,
    pub size: f32,
    pub flags: StyleFlags,
    pub bbox: BBox,
    /// Top of the line the span belongs to.
    pub origin_y: f32,
    pub page_width: f32,
    pub page_idx: usize,
}

impl TextSpan {
    /// Bold by flag or by a heavy font family name.
    pub fn is_bold(&self) -> bool {
        self.flags.is_bold() || StyleFlags::from_font_name(&self.font).is_bold()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub bbox: BBox,
    pub spans: Vec<TextSpan>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub bbox: BBox,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub page_idx: usize,
    pub width: f32,
    pub height: f32,
    pub lines: Vec<TextLine>,
    pub words: Vec<Word>,
}

/// A fully decoded PDF: every page's lines, spans and words, in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub name: String,
    pub path: PathBuf,
    pub pages: Vec<Page>,
}

impl ParsedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, page_idx: usize) -> Option<&Page> {
        self.pages.get(page_idx)
    }
}

/// Spans merged into one visual line or wrapped sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalLine {
    pub text: String,
    /// Size of the last span appended.
    pub size: f32,
    /// Last span appended; supplies the line's geometry.
    pub span: TextSpan,
}

impl LogicalLine {
    pub fn page_idx(&self) -> usize {
        self.span.page_idx
    }

    pub fn width(&self) -> f32 {
        self.span.bbox.x1 - self.span.bbox.x0
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeadingReason {
    LargerFont,
    Bold,
    Italic,
    CenteredShortLine,
    AllUppercase,
    TitleCase,
    ShortProminent,
}

impl HeadingReason {
    pub const ALL: [HeadingReason; 7] = [
        HeadingReason::LargerFont,
        HeadingReason::Bold,
        HeadingReason::Italic,
        HeadingReason::CenteredShortLine,
        HeadingReason::AllUppercase,
        HeadingReason::TitleCase,
        HeadingReason::ShortProminent,
    ];

    pub fn label(self) -> &'static str {
        match self {
            HeadingReason::LargerFont => "Larger font size",
            HeadingReason::Bold => "Bold font",
            HeadingReason::Italic => "Italic font",
            HeadingReason::CenteredShortLine => "Center aligned (short line)",
            HeadingReason::AllUppercase => "All uppercase",
            HeadingReason::TitleCase => "Title case",
            HeadingReason::ShortProminent => "Short & prominent",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for HeadingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Set of heuristic reasons, one bit per [`HeadingReason`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReasonSet(u8);

impl ReasonSet {
    pub fn insert(&mut self, reason: HeadingReason) {
        self.0 |= reason.bit();
    }

    pub fn contains(&self, reason: HeadingReason) -> bool {
        self.0 & reason.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = HeadingReason> + '_ {
        HeadingReason::ALL
            .into_iter()
            .filter(move |reason| self.contains(*reason))
    }
}

impl FromIterator<HeadingReason> for ReasonSet {
    fn from_iter<I: IntoIterator<Item = HeadingReason>>(iter: I) -> Self {
        let mut set = ReasonSet::default();
        for reason in iter {
            set.insert(reason);
        }
        set
    }
}

impl Serialize for ReasonSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(HeadingReason::label))
    }
}

/// Box labels the layout model emits that we treat as headings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutLabel {
    ParagraphTitle,
    DocTitle,
}

impl LayoutLabel {
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "paragraph_title" => Some(LayoutLabel::ParagraphTitle),
            "doc_title" => Some(LayoutLabel::DocTitle),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LayoutLabel::ParagraphTitle => "paragraph_title",
            LayoutLabel::DocTitle => "doc_title",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Heuristic,
    Layout { label: LayoutLabel },
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Heuristic => f.write_str("heuristic"),
            Provenance::Layout { label } => write!(f, "layout_{}", label.as_str()),
        }
    }
}

impl Serialize for Provenance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadingCandidate {
    pub text: String,
    /// 0-based.
    pub page_idx: usize,
    pub y: f32,
    pub x: f32,
    pub confidence: f32,
    pub source: Provenance,
    pub reasons: ReasonSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
}

impl HeadingCandidate {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn is_layout(&self) -> bool {
        matches!(self.source, Provenance::Layout { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedMatch {
    pub candidate: HeadingCandidate,
    /// Cosine similarity against the job query, rounded to 3 decimals.
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub heading: String,
    pub score: f32,
    pub content: String,
    /// 1-based.
    pub page_number: usize,
}
