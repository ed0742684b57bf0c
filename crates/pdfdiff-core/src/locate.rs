//! Mapping diff output back onto the page
//!
//! Character ops are located by searching their text in the page layout:
//! insertions in the edited page, deletions in the master page. Paragraph
//! matches carry their own box and are located directly.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::diff::DiffOp;
use crate::geometry::Rect;
use crate::layout::PageLayout;
use crate::paragraph::ParagraphMatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insertion,
    Deletion,
    Modified,
}

/// Which document's geometry a region's coordinates come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Master,
    Edited,
}

/// A classified rectangle to annotate on one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Page index (pages are paired positionally)
    pub page: usize,
    pub kind: ChangeKind,
    pub anchor: Anchor,
    /// Union of `quads`
    pub rect: Rect,
    /// One rectangle per covered text line
    pub quads: Vec<Rect>,
    pub text: String,
}

/// A changed fragment that could not be found on its page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanMiss {
    pub page: usize,
    pub kind: ChangeKind,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Located {
    pub regions: Vec<Region>,
    pub misses: Vec<SpanMiss>,
}

/// Regions for a character edit script between a page pair.
///
/// Regions are numbered by the edited page index.
pub fn locate_ops(master: &PageLayout, edited: &PageLayout, ops: &[DiffOp]) -> Located {
    let page = edited.index;
    let mut located = Located::default();

    for op in ops {
        let (kind, anchor, layout, text) = match op {
            DiffOp::Equal(_) => continue,
            DiffOp::Insert(text) => (ChangeKind::Insertion, Anchor::Edited, edited, text),
            DiffOp::Delete(text) => (ChangeKind::Deletion, Anchor::Master, master, text),
        };
        let fragment = text.trim();
        if fragment.is_empty() {
            continue;
        }

        let hits = layout.search_for(fragment);
        if hits.is_empty() {
            warn!(page, ?kind, text = fragment, "changed text not found on page");
            located.misses.push(SpanMiss {
                page,
                kind,
                text: fragment.to_string(),
            });
            continue;
        }

        debug!(page, ?kind, occurrences = hits.len(), "located change");
        for quads in hits {
            let Some(rect) = Rect::union_all(quads.iter()) else {
                continue;
            };
            located.regions.push(Region {
                page,
                kind,
                anchor,
                rect,
                quads,
                text: fragment.to_string(),
            });
        }
    }

    located
}

/// One `Modified` region per changed paragraph, on the edited block's box
pub fn locate_matches(page: usize, matches: &[ParagraphMatch]) -> Vec<Region> {
    matches
        .iter()
        .filter(|m| !m.is_unchanged())
        .map(|m| Region {
            page,
            kind: ChangeKind::Modified,
            anchor: Anchor::Edited,
            rect: m.edited_block.bounding_box,
            quads: vec![m.edited_block.bounding_box],
            text: m.edited_block.text.clone(),
        })
        .collect()
}
