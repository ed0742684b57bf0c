//! Positioned page text
//!
//! A [`PageLayout`] is the geometry-carrying view of one page: blocks of lines
//! of glyphs, each glyph with its box in page space. It is plain owned data so
//! it can be handed to worker tasks, and it answers the two questions the rest
//! of the crate asks of a page:
//!
//! - what is its text (whole page, or per block)?
//! - where on the page does a given fragment of that text appear?

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{Rect, LETTER};

/// A single rendered character and its box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub ch: char,
    pub rect: Rect,
}

/// Glyphs sharing a baseline, in content-stream order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutLine {
    pub glyphs: Vec<Glyph>,
}

impl LayoutLine {
    pub fn text(&self) -> String {
        self.glyphs.iter().map(|g| g.ch).collect()
    }

    pub fn bbox(&self) -> Option<Rect> {
        Rect::union_all(self.glyphs.iter().map(|g| &g.rect))
    }

    /// Drop leading and trailing whitespace glyphs
    pub(crate) fn trim(&mut self) {
        while self.glyphs.last().is_some_and(|g| g.ch.is_whitespace()) {
            self.glyphs.pop();
        }
        let leading = self
            .glyphs
            .iter()
            .take_while(|g| g.ch.is_whitespace())
            .count();
        self.glyphs.drain(..leading);
    }
}

/// Vertically adjacent lines forming one text block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutBlock {
    pub lines: Vec<LayoutLine>,
}

impl LayoutBlock {
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(LayoutLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn bbox(&self) -> Option<Rect> {
        let boxes: Vec<Rect> = self.lines.iter().filter_map(LayoutLine::bbox).collect();
        Rect::union_all(boxes.iter())
    }
}

/// A block as handed out to the extractor: its box and its raw text
#[derive(Debug, Clone, PartialEq)]
pub struct RawBlock {
    pub rect: Rect,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    /// Zero-based page index
    pub index: usize,
    /// Page bounds (MediaBox)
    pub media_box: Rect,
    pub blocks: Vec<LayoutBlock>,
}

impl PageLayout {
    /// A page without any text
    pub fn empty(index: usize) -> Self {
        Self {
            index,
            media_box: LETTER,
            blocks: Vec::new(),
        }
    }

    /// Build a monospaced layout on a Letter page.
    ///
    /// Each paragraph becomes one block, each `\n` inside a paragraph starts a
    /// new line. Glyphs are 6pt wide on a 14pt line pitch starting at (72, 720),
    /// with one blank line between paragraphs.
    pub fn from_paragraphs(index: usize, paragraphs: &[&str]) -> Self {
        const LEFT: f32 = 72.0;
        const TOP: f32 = 720.0;
        const ADVANCE: f32 = 6.0;
        const PITCH: f32 = 14.0;

        let mut baseline = TOP;
        let mut blocks = Vec::new();
        for paragraph in paragraphs {
            let mut block = LayoutBlock::default();
            for line in paragraph.split('\n') {
                let glyphs = line
                    .chars()
                    .enumerate()
                    .map(|(i, ch)| {
                        let x = LEFT + i as f32 * ADVANCE;
                        Glyph {
                            ch,
                            rect: Rect::new(x, baseline - 2.4, x + ADVANCE, baseline + 9.6),
                        }
                    })
                    .collect();
                block.lines.push(LayoutLine { glyphs });
                baseline -= PITCH;
            }
            blocks.push(block);
            baseline -= PITCH;
        }

        Self {
            index,
            media_box: LETTER,
            blocks,
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &LayoutLine> {
        self.blocks.iter().flat_map(|b| b.lines.iter())
    }

    /// Whole-page plain text, one layout line per text line
    pub fn text(&self) -> String {
        self.lines()
            .map(LayoutLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Blocks with their boxes, in layout order
    pub fn raw_blocks(&self) -> Vec<RawBlock> {
        self.blocks
            .iter()
            .filter_map(|block| {
                block.bbox().map(|rect| RawBlock {
                    rect: rect.clamp_to(&self.media_box),
                    text: block.text(),
                })
            })
            .collect()
    }

    /// Find every occurrence of `needle` on the page.
    ///
    /// Matching is case-sensitive; runs of whitespace (line breaks included)
    /// compare equal to a single space, and the needle is trimmed first.
    /// Occurrences are non-overlapping, scanned left to right. Each occurrence
    /// is returned as one rectangle per layout line it covers.
    pub fn search_for(&self, needle: &str) -> Vec<Vec<Rect>> {
        let pattern = normalize_whitespace(needle);
        if pattern.is_empty() {
            return Vec::new();
        }

        let haystack = self.searchable();
        let n = pattern.len();
        let mut found = Vec::new();
        let mut i = 0;
        while i + n <= haystack.len() {
            let hit = haystack[i..i + n]
                .iter()
                .zip(&pattern)
                .all(|(slot, p)| slot.ch == *p);
            if !hit {
                i += 1;
                continue;
            }

            let mut per_line: BTreeMap<usize, Rect> = BTreeMap::new();
            for slot in &haystack[i..i + n] {
                if let (Some(line), false) = (slot.line, slot.ch == ' ') {
                    per_line
                        .entry(line)
                        .and_modify(|r| *r = r.union(&slot.rect))
                        .or_insert(slot.rect);
                }
            }
            found.push(
                per_line
                    .into_values()
                    .map(|r| r.clamp_to(&self.media_box))
                    .collect(),
            );
            i += n;
        }
        found
    }

    /// Flatten the page into whitespace-collapsed characters tagged with their
    /// line and glyph box. Line breaks become an untagged space.
    fn searchable(&self) -> Vec<Slot> {
        let mut slots: Vec<Slot> = Vec::new();
        for (line_no, line) in self.lines().enumerate() {
            if slots.last().is_some_and(|s| s.ch != ' ') {
                slots.push(Slot {
                    ch: ' ',
                    line: None,
                    rect: LETTER,
                });
            }
            for glyph in &line.glyphs {
                if glyph.ch.is_whitespace() {
                    if slots.last().is_some_and(|s| s.ch == ' ') || slots.is_empty() {
                        continue;
                    }
                    slots.push(Slot {
                        ch: ' ',
                        line: Some(line_no),
                        rect: glyph.rect,
                    });
                } else {
                    slots.push(Slot {
                        ch: glyph.ch,
                        line: Some(line_no),
                        rect: glyph.rect,
                    });
                }
            }
        }
        while slots.last().is_some_and(|s| s.ch == ' ') {
            slots.pop();
        }
        slots
    }
}

struct Slot {
    ch: char,
    line: Option<usize>,
    rect: Rect,
}

fn normalize_whitespace(text: &str) -> Vec<char> {
    let mut out = Vec::new();
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.extend(word.chars());
    }
    out
}
