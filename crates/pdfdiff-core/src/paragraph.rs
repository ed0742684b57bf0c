//! Paragraph nearest-match
//!
//! Each edited paragraph is paired with the master paragraph (same page) at
//! the smallest Levenshtein distance. Cost is O(M*E) distance computations
//! per page.

use serde::Serialize;

use crate::extract::TextBlock;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParagraphMatch {
    pub edited_block: TextBlock,
    pub closest_master_text: String,
    /// `None` when the master page had no paragraphs
    pub closest_master_index: Option<usize>,
    pub distance: usize,
}

impl ParagraphMatch {
    pub fn is_unchanged(&self) -> bool {
        self.distance == 0
    }
}

/// Character-level edit distance
pub fn distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Nearest master paragraph for every edited paragraph, in edited order.
/// Ties go to the earliest master paragraph.
pub fn match_paragraphs(master: &[TextBlock], edited: &[TextBlock]) -> Vec<ParagraphMatch> {
    edited
        .iter()
        .map(|block| {
            let mut best: Option<(usize, usize)> = None;
            for (i, candidate) in master.iter().enumerate() {
                let d = distance(&candidate.text, &block.text);
                if best.map_or(true, |(_, best_d)| d < best_d) {
                    best = Some((i, d));
                    if d == 0 {
                        break;
                    }
                }
            }

            match best {
                Some((i, d)) => ParagraphMatch {
                    edited_block: block.clone(),
                    closest_master_text: master[i].text.clone(),
                    closest_master_index: Some(i),
                    distance: d,
                },
                None => ParagraphMatch {
                    edited_block: block.clone(),
                    closest_master_text: String::new(),
                    closest_master_index: None,
                    distance: distance("", &block.text),
                },
            }
        })
        .collect()
}
