//! Predicates and cleanup for raw PDF text.
//!
//! Everything that leaves the parser passes through [`clean_text`] before it
//! is compared, embedded or written out.

/// Marker appended when a word budget cut could not end on a sentence.
pub const ELLIPSIS: &str = "...";

/// Word budget applied to section bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordBudget {
    pub max_words: usize,
    /// Words scanned past the budget looking for one that ends in `.`.
    pub lookahead: usize,
}

impl Default for WordBudget {
    fn default() -> Self {
        Self {
            max_words: 150,
            lookahead: 50,
        }
    }
}

/// Printable in the sense of a glyph a reader can see: no control, format,
/// private-use or separator characters, no noncharacters, and nothing from
/// the unassigned stretch between CJK extension H and the variation
/// selectors. Other unassigned code points are kept since std carries no
/// general-category table.
pub fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    if c.is_control() || c.is_whitespace() {
        return false;
    }
    let cp = c as u32;
    // U+FDD0..U+FDEF and the last two code points of every plane
    if (0xFDD0..=0xFDEF).contains(&cp) || cp & 0xFFFE == 0xFFFE {
        return false;
    }
    !matches!(
        cp,
        0x00AD
            | 0x0600..=0x0605
            | 0x061C
            | 0x06DD
            | 0x070F
            | 0x180E
            | 0x200B..=0x200F
            | 0x202A..=0x202E
            | 0x2060..=0x206F
            | 0xFEFF
            | 0xFFF9..=0xFFFB
            | 0xE000..=0xF8FF
            | 0x110BD
            | 0x1BCA0..=0x1BCA3
            | 0x1D173..=0x1D17A
            | 0x323B0..=0xE00FF
            | 0xE01F0..=0x10FFFF
    )
}

/// Heuristic for glyph soup and embedded binary streams.
pub fn is_binary_data(text: &str) -> bool {
    let total = text.chars().count();
    if total == 0 {
        return false;
    }

    let printable = text
        .chars()
        .filter(|c| is_printable(*c) || c.is_whitespace())
        .count();
    if (printable as f32) / (total as f32) < 0.7 {
        return true;
    }

    if text.contains('\0') {
        return true;
    }
    let controls = text
        .chars()
        .filter(|c| (*c as u32) < 32 && !matches!(c, '\n' | '\r' | '\t'))
        .count();
    (controls as f32) > (total as f32) * 0.1
}

/// Every word that starts with a letter starts with an uppercase one.
pub fn is_title_case(text: &str) -> bool {
    if is_binary_data(text) {
        return false;
    }
    let mut words = text.split_whitespace().peekable();
    if words.peek().is_none() {
        return false;
    }
    words.all(|word| match word.chars().next() {
        Some(first) if first.is_alphabetic() => first.is_uppercase(),
        _ => true,
    })
}

/// All cased characters are uppercase and at least one letter is present.
pub fn is_all_upper(text: &str) -> bool {
    if is_binary_data(text) {
        return false;
    }
    text.chars().any(char::is_uppercase)
        && !text.chars().any(char::is_lowercase)
        && text.chars().any(char::is_alphabetic)
}

/// Collapse whitespace, drop unprintable characters and reject binary text.
/// Returns an empty string when nothing readable remains.
pub fn normalize_text(text: &str) -> String {
    if is_binary_data(text) {
        return String::new();
    }

    let filtered: String = text
        .chars()
        .filter(|c| is_printable(*c) || matches!(c, '\n' | '\r' | '\t'))
        .collect();
    let collapsed = filtered.split_whitespace().collect::<Vec<_>>().join(" ");

    if is_binary_data(&collapsed) {
        return String::new();
    }
    collapsed
}

/// [`normalize_text`] followed by a word budget cut.
///
/// Text over budget keeps going until the first word that ends in `.`; if no
/// such word shows up within the lookahead the scanned words are kept and an
/// ellipsis marks the cut.
pub fn clean_text(text: &str, budget: WordBudget) -> String {
    let normalized = normalize_text(text);
    let words: Vec<&str> = normalized.split_whitespace().collect();
    if words.len() <= budget.max_words {
        return normalized;
    }

    let (prefix, suffix) = words.split_at(budget.max_words);
    let mut kept: Vec<&str> = prefix.to_vec();
    for word in suffix.iter().take(budget.lookahead) {
        kept.push(*word);
        if word.ends_with('.') {
            return kept.join(" ");
        }
    }

    format!("{} {ELLIPSIS}", kept.join(" "))
}

pub fn ends_with_terminal_punctuation(text: &str) -> bool {
    matches!(text.chars().last(), Some('.' | '?' | '!'))
}
