//! Text extraction
//!
//! Turns a [`PageSource`] into per-page text units. In whole-page mode every
//! page is one string; in paragraph mode every page is a list of
//! [`TextBlock`]s carrying their bounding boxes.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Granularity;
use crate::error::DiffError;
use crate::geometry::Rect;
use crate::layout::PageLayout;

/// Separator between paragraphs inside one extracted block
const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Anything that can hand out page layouts by index
pub trait PageSource {
    fn page_count(&self) -> usize;

    fn page_layout(&self, index: usize) -> Result<PageLayout, DiffError>;
}

/// Pre-built layouts act as a source on their own
impl PageSource for Vec<PageLayout> {
    fn page_count(&self) -> usize {
        self.len()
    }

    fn page_layout(&self, index: usize) -> Result<PageLayout, DiffError> {
        self.get(index).cloned().ok_or_else(|| DiffError::Extraction {
            page: index,
            message: format!("page out of range ({} pages)", self.len()),
        })
    }
}

/// One paragraph and the box it was found in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub bounding_box: Rect,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PageText {
    Whole(String),
    Blocks(Vec<TextBlock>),
}

impl PageText {
    /// Plain text regardless of mode, blocks separated by a blank line
    pub fn text(&self) -> String {
        match self {
            PageText::Whole(text) => text.clone(),
            PageText::Blocks(blocks) => blocks
                .iter()
                .map(|b| b.text.as_str())
                .collect::<Vec<_>>()
                .join(PARAGRAPH_SEPARATOR),
        }
    }
}

/// Extracted text of a whole document, page order preserved
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentText {
    pub pages: Vec<PageText>,
}

impl DocumentText {
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn page(&self, index: usize) -> Option<&PageText> {
        self.pages.get(index)
    }
}

/// Extract every page, stopping at the first page that fails
pub fn extract(source: &dyn PageSource, granularity: Granularity) -> Result<DocumentText, DiffError> {
    let pages = (0..source.page_count())
        .map(|index| {
            source
                .page_layout(index)
                .map(|layout| page_text(&layout, granularity))
        })
        .collect::<Result<Vec<_>, _>>()?;
    debug!(pages = pages.len(), ?granularity, "extracted document text");
    Ok(DocumentText { pages })
}

/// Extract every page layout, keeping per-page failures in place
pub fn extract_layouts(source: &dyn PageSource) -> Vec<Result<PageLayout, DiffError>> {
    (0..source.page_count())
        .map(|index| {
            let layout = source.page_layout(index);
            if let Err(e) = &layout {
                warn!(page = index, error = %e, "page extraction failed");
            }
            layout
        })
        .collect()
}

/// Text of one page in the requested mode
pub fn page_text(layout: &PageLayout, granularity: Granularity) -> PageText {
    match granularity {
        Granularity::Char => PageText::Whole(layout.text()),
        Granularity::Paragraph => PageText::Blocks(paragraphs(layout)),
    }
}

/// Trimmed, non-empty paragraphs of a page, each with its block's box
pub fn paragraphs(layout: &PageLayout) -> Vec<TextBlock> {
    layout
        .raw_blocks()
        .into_iter()
        .flat_map(|block| split_block(block.rect, &block.text))
        .collect()
}

fn split_block(rect: Rect, text: &str) -> Vec<TextBlock> {
    text.split(PARAGRAPH_SEPARATOR)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| TextBlock {
            bounding_box: rect,
            text: p.to_string(),
        })
        .collect()
}
