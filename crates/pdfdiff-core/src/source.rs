//! lopdf-backed page source
//!
//! Walks each page's content stream with a simplified text-rendering state
//! machine and turns the shown strings into a [`PageLayout`]:
//!
//! | Operator | Action |
//! |----------|--------|
//! | `cm` `q` `Q` | Graphics state matrix |
//! | `BT`     | Begin text object, reset matrices |
//! | `Tf`     | Select font and size |
//! | `Tm`     | Set text matrix |
//! | `Td` `TD` `T*` `TL` | Line positioning and leading |
//! | `Tc` `Tw` `Tz` `Ts` | Spacing, scaling and rise |
//! | `Tj` `TJ` `'` `"` | Show text |
//!
//! Glyph advances come from the font's `/Widths` or `/W` array (see
//! [`crate::font`]). Fonts without widths fall back to
//! `APPROX_CHAR_WIDTH_RATIO` em per glyph.

use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};
use tracing::debug;

use crate::error::DiffError;
use crate::extract::PageSource;
use crate::font::{page_fonts, FontMap, FontMetrics};
use crate::geometry::{Rect, LETTER};
use crate::layout::{Glyph, LayoutBlock, LayoutLine, PageLayout};

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Glyph advance as a fraction of the font size, for fonts without widths
const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// Glyph extent below and above the baseline, in em
const DESCENT: f32 = 0.2;
const ASCENT: f32 = 0.8;

/// A vertical gap larger than this multiple of the font size starts a new block
const BLOCK_GAP_FACTOR: f32 = 1.4;

/// A horizontal gap larger than this multiple of the font size reads as a space
const WORD_GAP_FACTOR: f32 = 0.15;

/// `TJ` adjustments (thousandths of an em) at least this far right read as a space
const KERNING_SPACE_THRESHOLD: f32 = 150.0;

/// Read-only handle on one PDF file
pub struct LopdfSource {
    path: PathBuf,
    doc: Document,
    pages: Vec<ObjectId>,
}

impl LopdfSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DiffError> {
        let path = path.as_ref();
        let doc = Document::load(path).map_err(|e| DiffError::DocumentOpen {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self::from_document(path.to_path_buf(), doc))
    }

    /// Parse an in-memory PDF; `label` is used in error messages
    pub fn from_bytes(bytes: &[u8], label: impl Into<PathBuf>) -> Result<Self, DiffError> {
        let path = label.into();
        let doc = Document::load_mem(bytes).map_err(|e| DiffError::DocumentOpen {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok(Self::from_document(path, doc))
    }

    fn from_document(path: PathBuf, doc: Document) -> Self {
        let pages = doc.get_pages().into_values().collect();
        Self { path, doc, pages }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageSource for LopdfSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_layout(&self, index: usize) -> Result<PageLayout, DiffError> {
        let page_id = *self.pages.get(index).ok_or_else(|| DiffError::Extraction {
            page: index,
            message: format!("page out of range ({} pages)", self.pages.len()),
        })?;

        let content = self
            .doc
            .get_page_content(page_id)
            .map_err(|e| DiffError::Extraction {
                page: index,
                message: e.to_string(),
            })?;
        let operations = Content::decode(&content)
            .map_err(|e| DiffError::Extraction {
                page: index,
                message: e.to_string(),
            })?
            .operations;

        let fonts = page_fonts(&self.doc, page_id);
        let layout = interpret(index, media_box(&self.doc, page_id), &fonts, &operations);
        debug!(
            page = index,
            blocks = layout.blocks.len(),
            path = %self.path.display(),
            "page layout extracted"
        );
        Ok(layout)
    }
}

/// Run the text state machine over a decoded content stream
pub fn interpret(
    index: usize,
    media_box: Rect,
    fonts: &FontMap,
    operations: &[Operation],
) -> PageLayout {
    let mut builder = LayoutBuilder::new(media_box, fonts);

    for op in operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => builder.state.ctm_stack.push(builder.state.ctm),
            "Q" => {
                if let Some(ctm) = builder.state.ctm_stack.pop() {
                    builder.state.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = matrix_operand(operands) {
                    builder.state.ctm = multiply(&m, &builder.state.ctm);
                }
            }
            "BT" => {
                builder.state.text_matrix = IDENTITY;
                builder.state.line_matrix = IDENTITY;
            }
            "Tf" => {
                if let Some(Ok(name)) = operands.first().map(Object::as_name) {
                    builder.state.font = Some(name.to_vec());
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    builder.state.font_size = size;
                }
            }
            "Tm" => {
                if let Some(m) = matrix_operand(operands) {
                    builder.state.text_matrix = m;
                    builder.state.line_matrix = m;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (
                    operands.first().and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    builder.state.translate_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (
                    operands.first().and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    builder.state.leading = -ty;
                    builder.state.translate_line(tx, ty);
                }
            }
            "T*" => builder.state.next_line(),
            "TL" => {
                if let Some(v) = operands.first().and_then(number) {
                    builder.state.leading = v;
                }
            }
            "Tc" => {
                if let Some(v) = operands.first().and_then(number) {
                    builder.state.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some(v) = operands.first().and_then(number) {
                    builder.state.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some(v) = operands.first().and_then(number) {
                    builder.state.horiz_scale = v / 100.0;
                }
            }
            "Ts" => {
                if let Some(v) = operands.first().and_then(number) {
                    builder.state.rise = v;
                }
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    builder.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => builder.show(bytes),
                            other => {
                                if let Some(adj) = number(other) {
                                    builder.kern(adj);
                                }
                            }
                        }
                    }
                }
            }
            "'" => {
                builder.state.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    builder.show(bytes);
                }
            }
            "\"" => {
                if let Some(aw) = operands.first().and_then(number) {
                    builder.state.word_spacing = aw;
                }
                if let Some(ac) = operands.get(1).and_then(number) {
                    builder.state.char_spacing = ac;
                }
                builder.state.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    builder.show(bytes);
                }
            }
            _ => {}
        }
    }

    builder.finish(index)
}

struct TextState {
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horiz_scale: f32,
    leading: f32,
    rise: f32,
    font: Option<Vec<u8>>,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horiz_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            font: None,
        }
    }
}

impl TextState {
    fn translate_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.translate_line(0.0, -self.leading);
    }

    fn advance_x(&mut self, tx: f32) {
        self.text_matrix[4] += tx * self.text_matrix[0];
        self.text_matrix[5] += tx * self.text_matrix[1];
    }

    /// Text rendering matrix for the current position
    fn rendering_matrix(&self) -> Matrix {
        let scale = [
            self.font_size * self.horiz_scale,
            0.0,
            0.0,
            self.font_size,
            0.0,
            self.rise,
        ];
        multiply(&scale, &multiply(&self.text_matrix, &self.ctm))
    }

    /// Font size after text and graphics matrix scaling
    fn effective_font_size(&self) -> f32 {
        let m = multiply(&self.text_matrix, &self.ctm);
        (self.font_size * (m[2].powi(2) + m[3].powi(2)).sqrt()).abs()
    }
}

struct LayoutBuilder<'a> {
    media_box: Rect,
    fonts: &'a FontMap,
    state: TextState,
    blocks: Vec<LayoutBlock>,
    block: LayoutBlock,
    line: LayoutLine,
    line_baseline: f32,
    line_size: f32,
    prev_baseline: Option<f32>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(media_box: Rect, fonts: &'a FontMap) -> Self {
        Self {
            media_box,
            fonts,
            state: TextState::default(),
            blocks: Vec::new(),
            block: LayoutBlock::default(),
            line: LayoutLine::default(),
            line_baseline: 0.0,
            line_size: 0.0,
            prev_baseline: None,
        }
    }

    fn show(&mut self, bytes: &[u8]) {
        let fonts = self.fonts;
        let font = self.state.font.as_ref().and_then(|name| fonts.get(name));
        for glyph in shown_glyphs(bytes, font) {
            let mut tx = glyph.width * self.state.font_size + self.state.char_spacing;
            if glyph.word_space {
                tx += self.state.word_spacing;
            }
            if !glyph.ch.is_control() {
                let (rect, baseline) = self.glyph_box(glyph.width);
                let size = self.state.effective_font_size();
                self.place(glyph.ch, rect, baseline, size);
            }
            self.state.advance_x(tx * self.state.horiz_scale);
        }
    }

    /// Apply a `TJ` position adjustment
    fn kern(&mut self, adjustment: f32) {
        let tx = -adjustment / 1000.0 * self.state.font_size * self.state.horiz_scale;
        if adjustment <= -KERNING_SPACE_THRESHOLD && self.state.font_size != 0.0 {
            let width = tx / (self.state.font_size * self.state.horiz_scale);
            let (rect, baseline) = self.glyph_box(width);
            let size = self.state.effective_font_size();
            self.place(' ', rect, baseline, size);
        }
        self.state.advance_x(tx);
    }

    /// Box of a glyph `width` em wide at the current position, and its baseline
    fn glyph_box(&self, width: f32) -> (Rect, f32) {
        let trm = self.state.rendering_matrix();
        let corners = [
            transform(&trm, 0.0, -DESCENT),
            transform(&trm, width, -DESCENT),
            transform(&trm, 0.0, ASCENT),
            transform(&trm, width, ASCENT),
        ];
        let (x0, x1) = corners
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), (x, _)| (lo.min(*x), hi.max(*x)));
        let (y0, y1) = corners
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), (_, y)| (lo.min(*y), hi.max(*y)));
        let (_, baseline) = transform(&trm, 0.0, 0.0);
        (Rect::new(x0, y0, x1, y1), baseline)
    }

    fn place(&mut self, ch: char, rect: Rect, baseline: f32, size: f32) {
        if let Some(last) = self.line.glyphs.last() {
            let tolerance = self.line_size.max(size) * 0.5;
            let moved_back = rect.x0 < last.rect.x0 - size;
            if (baseline - self.line_baseline).abs() > tolerance || moved_back {
                self.finish_line();
            } else if !ch.is_whitespace()
                && !last.ch.is_whitespace()
                && rect.x0 - last.rect.x1 > size * WORD_GAP_FACTOR
            {
                let gap = Rect::new(last.rect.x1, rect.y0, rect.x0, rect.y1);
                self.line.glyphs.push(Glyph { ch: ' ', rect: gap });
            }
        }

        if self.line.glyphs.is_empty() {
            self.line_baseline = baseline;
            self.line_size = size;
        }
        self.line.glyphs.push(Glyph { ch, rect });
    }

    fn finish_line(&mut self) {
        let mut line = std::mem::take(&mut self.line);
        line.trim();
        if line.glyphs.is_empty() {
            return;
        }

        if let Some(prev) = self.prev_baseline {
            let gap = prev - self.line_baseline;
            if gap <= 0.0 || gap > BLOCK_GAP_FACTOR * self.line_size {
                self.finish_block();
            }
        }
        self.block.lines.push(line);
        self.prev_baseline = Some(self.line_baseline);
    }

    fn finish_block(&mut self) {
        let block = std::mem::take(&mut self.block);
        if !block.lines.is_empty() {
            self.blocks.push(block);
        }
    }

    fn finish(mut self, index: usize) -> PageLayout {
        self.finish_line();
        self.finish_block();

        let media_box = self.media_box;
        for glyph in self
            .blocks
            .iter_mut()
            .flat_map(|b| b.lines.iter_mut())
            .flat_map(|l| l.glyphs.iter_mut())
        {
            glyph.rect = glyph.rect.clamp_to(&media_box);
        }

        PageLayout {
            index,
            media_box,
            blocks: self.blocks,
        }
    }
}

struct ShownGlyph {
    ch: char,
    /// Advance in em
    width: f32,
    /// Single-byte code 32, which takes `Tw` word spacing
    word_space: bool,
}

/// Split a string operand into glyphs with their advances. Two-byte codes for
/// Type0 fonts, decoded text otherwise.
fn shown_glyphs(bytes: &[u8], font: Option<&FontMetrics>) -> Vec<ShownGlyph> {
    let advance = |code: u32| {
        font.and_then(|f| f.advance(code))
            .unwrap_or(APPROX_CHAR_WIDTH_RATIO)
    };
    match font {
        Some(f) if f.composite => bytes
            .chunks_exact(2)
            .map(|pair| {
                let code = u32::from(u16::from_be_bytes([pair[0], pair[1]]));
                ShownGlyph {
                    ch: char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER),
                    width: advance(code),
                    word_space: false,
                }
            })
            .collect(),
        _ => decode_pdf_string(bytes)
            .chars()
            .map(|ch| {
                let code = u32::from(ch);
                ShownGlyph {
                    ch,
                    width: if code < 256 {
                        advance(code)
                    } else {
                        APPROX_CHAR_WIDTH_RATIO
                    },
                    word_space: ch == ' ',
                }
            })
            .collect(),
    }
}

fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

fn transform(m: &Matrix, x: f32, y: f32) -> (f32, f32) {
    (x * m[0] + y * m[2] + m[4], x * m[1] + y * m[3] + m[5])
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(v) => Some(*v as f32),
        Object::Real(v) => Some(*v),
        _ => None,
    }
}

fn matrix_operand(operands: &[Object]) -> Option<Matrix> {
    let values: Vec<f32> = operands.iter().take(6).filter_map(number).collect();
    <[f32; 6]>::try_from(values).ok()
}

/// Decode a string operand: UTF-16BE with BOM, then UTF-8, then Latin-1
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        if let Ok(s) = String::from_utf16(&units) {
            return s;
        }
    }
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Page MediaBox, following inherited attributes up the page tree
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> Rect {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let Ok(dict) = doc.get_object(id).and_then(Object::as_dict) else {
            break;
        };
        if let Ok(Object::Array(arr)) = dict.get(b"MediaBox") {
            let values: Vec<f32> = arr
                .iter()
                .filter_map(|obj| match obj {
                    Object::Reference(r) => doc.get_object(*r).ok().and_then(number),
                    other => number(other),
                })
                .collect();
            if let [x0, y0, x1, y1] = values[..] {
                return Rect::new(x0, y0, x1, y1);
            }
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    LETTER
}
