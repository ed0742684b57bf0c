//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use lopdf::{Document, Object};

mod pdf;

pub use pdf::*;

/// Build a Letter PDF, each page a list of stacked lines
pub fn pdf_with_pages(pages: &[&[&str]]) -> Vec<u8> {
    let pages: Vec<Vec<TestLine>> = pages.iter().map(|lines| stacked(lines)).collect();
    build_pdf(&pages)
}

pub fn write_pdf(dir: &Path, name: &str, pages: &[&[&str]]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, pdf_with_pages(pages)).unwrap();
    path
}

/// `(subtype, contents)` of every annotation, per page
pub fn annotations(path: &Path) -> Vec<Vec<(String, String)>> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let page = doc.get_dictionary(page_id).unwrap();
            let Ok(Object::Array(annots)) = page.get(b"Annots") else {
                return Vec::new();
            };
            annots
                .iter()
                .map(|r| {
                    let annot = doc.get_dictionary(r.as_reference().unwrap()).unwrap();
                    let subtype = String::from_utf8_lossy(
                        annot.get(b"Subtype").unwrap().as_name().unwrap(),
                    )
                    .into_owned();
                    let contents = annot
                        .get(b"Contents")
                        .and_then(Object::as_str)
                        .map(|b| String::from_utf8_lossy(b).into_owned())
                        .unwrap_or_default();
                    (subtype, contents)
                })
                .collect()
        })
        .collect()
}

/// x position of the glyph at `column` on a generated line. The page font
/// carries no `/Widths`, so every glyph advances half an em.
pub fn column_x(column: usize) -> f32 {
    LEFT + column as f32 * FONT_SIZE * 0.5
}
