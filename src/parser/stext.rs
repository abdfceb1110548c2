//! Decoder for MuPDF structured-text XML (`mutool draw -F stext`).
//!
//! The tree is `page > block > line > font > char`; older MuPDF releases
//! spell the font level `span`. Chars carry either a `quad` (8 numbers) or a
//! `bbox` (4 numbers). Coordinates are PDF points with a top-left origin.

use std::collections::HashMap;

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use unicode_normalization::UnicodeNormalization;

use crate::core::geometry::BBox;
use crate::core::model::{Page, StyleFlags, TextLine, TextSpan, Word};

pub fn decode_stext(xml: &str) -> Result<Vec<Page>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut decoder = StextDecoder::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => decoder.open(&e),
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"font" | b"span" => decoder.close_span(),
                b"line" => decoder.close_line(),
                b"page" => decoder.close_page(),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("malformed stext XML at byte {}", reader.buffer_position())
                })
            }
            _ => {}
        }
        buf.clear();
    }

    decoder.close_page();
    Ok(decoder.pages)
}

#[derive(Debug, Default)]
struct StextDecoder {
    pages: Vec<Page>,
    page: Option<Page>,
    line: Option<LineBuilder>,
    font: Option<(String, f32)>,
    span_chars: Vec<(String, BBox)>,
}

#[derive(Debug)]
struct LineBuilder {
    bbox: BBox,
    spans: Vec<TextSpan>,
    chars: Vec<(String, BBox)>,
}

impl StextDecoder {
    fn open(&mut self, element: &BytesStart<'_>) {
        let attrs = attributes(element);
        match element.name().as_ref() {
            b"page" => {
                self.close_page();
                self.page = Some(Page {
                    page_idx: self.pages.len(),
                    width: number(&attrs, "width"),
                    height: number(&attrs, "height"),
                    lines: Vec::new(),
                    words: Vec::new(),
                });
            }
            b"line" => {
                self.close_line();
                let bbox = attrs
                    .get("bbox")
                    .and_then(|value| parse_box(value))
                    .unwrap_or(BBox::new(0.0, 0.0, 0.0, 0.0));
                self.line = Some(LineBuilder {
                    bbox,
                    spans: Vec::new(),
                    chars: Vec::new(),
                });
            }
            b"font" | b"span" => {
                self.close_span();
                let name = attrs.get("name").or_else(|| attrs.get("font")).cloned();
                self.font = Some((name.unwrap_or_default(), number(&attrs, "size")));
            }
            b"char" => {
                let Some(c) = attrs.get("c") else {
                    return;
                };
                let bbox = attrs
                    .get("quad")
                    .and_then(|value| parse_quad(value))
                    .or_else(|| attrs.get("bbox").and_then(|value| parse_box(value)));
                if let Some(bbox) = bbox {
                    self.span_chars.push((c.clone(), bbox));
                    if let Some(line) = self.line.as_mut() {
                        line.chars.push((c.clone(), bbox));
                    }
                }
            }
            _ => {}
        }
    }

    fn close_span(&mut self) {
        let chars = std::mem::take(&mut self.span_chars);
        let Some((font, size)) = self.font.take() else {
            return;
        };
        let (Some(page), Some(line)) = (self.page.as_ref(), self.line.as_mut()) else {
            return;
        };
        let Some(bbox) = union_all(chars.iter().map(|(_, bbox)| *bbox)) else {
            return;
        };

        let raw: String = chars.iter().map(|(c, _)| c.as_str()).collect();
        line.spans.push(TextSpan {
            text: raw.nfkc().collect(),
            flags: StyleFlags::from_font_name(&font),
            font,
            size,
            bbox,
            origin_y: line.bbox.y0,
            page_width: page.width,
            page_idx: page.page_idx,
        });
    }

    fn close_line(&mut self) {
        self.close_span();
        let Some(line) = self.line.take() else {
            return;
        };
        let Some(page) = self.page.as_mut() else {
            return;
        };

        page.words.extend(split_words(&line.chars));
        if !line.spans.is_empty() {
            page.lines.push(TextLine {
                bbox: line.bbox,
                spans: line.spans,
            });
        }
    }

    fn close_page(&mut self) {
        self.close_line();
        if let Some(page) = self.page.take() {
            self.pages.push(page);
        }
    }
}

fn split_words(chars: &[(String, BBox)]) -> Vec<Word> {
    let mut words = Vec::new();
    let mut text = String::new();
    let mut bbox: Option<BBox> = None;

    for (c, char_box) in chars {
        if c.trim().is_empty() {
            if let Some(bbox) = bbox.take() {
                words.push(Word {
                    text: std::mem::take(&mut text).nfkc().collect(),
                    bbox,
                });
            }
            continue;
        }
        text.push_str(c);
        bbox = Some(bbox.map_or(*char_box, |current| current.union(char_box)));
    }
    if let Some(bbox) = bbox {
        words.push(Word {
            text: text.nfkc().collect(),
            bbox,
        });
    }
    words
}

fn attributes(element: &BytesStart<'_>) -> HashMap<String, String> {
    element
        .attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map(|value| value.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            (key, value)
        })
        .collect()
}

fn number(attrs: &HashMap<String, String>, key: &str) -> f32 {
    attrs
        .get(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0.0)
}

fn parse_floats(value: &str) -> Option<Vec<f32>> {
    value
        .split_whitespace()
        .map(|part| part.parse::<f32>().ok())
        .collect()
}

fn parse_box(value: &str) -> Option<BBox> {
    match parse_floats(value)?.as_slice() {
        [x0, y0, x1, y1] => Some(BBox::new(*x0, *y0, *x1, *y1)),
        _ => None,
    }
}

fn parse_quad(value: &str) -> Option<BBox> {
    let values: [f32; 8] = parse_floats(value)?.try_into().ok()?;
    Some(BBox::from_quad(&values))
}

fn union_all(boxes: impl Iterator<Item = BBox>) -> Option<BBox> {
    boxes.reduce(|acc, bbox| acc.union(&bbox))
}
