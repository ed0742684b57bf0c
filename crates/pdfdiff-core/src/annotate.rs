//! Writing regions into the edited document as annotations
//!
//! - edited-anchored regions: `/Highlight` over the region quads
//! - `Modified` regions: highlight plus a `/Square` outline
//! - master-anchored regions: `/Square` outline at the master coordinates,
//!   the removed text in `/Contents`

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use tracing::{debug, warn};

use crate::config::{HighlightStyle, Rgb};
use crate::error::DiffError;
use crate::geometry::Rect;
use crate::locate::{Anchor, ChangeKind, Region};
use crate::orchestrator::RegionSink;
use crate::source::media_box;

/// Owner of the output document
pub struct Annotator {
    doc: Document,
    pages: Vec<ObjectId>,
    style: HighlightStyle,
    annotations: usize,
}

impl Annotator {
    pub fn open(path: impl AsRef<Path>, style: HighlightStyle) -> Result<Self, DiffError> {
        let path = path.as_ref();
        let doc = Document::load(path).map_err(|e| DiffError::DocumentOpen {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self::new(doc, style))
    }

    pub fn from_bytes(bytes: &[u8], style: HighlightStyle) -> Result<Self, DiffError> {
        let doc = Document::load_mem(bytes).map_err(|e| DiffError::DocumentOpen {
            path: "<memory>".into(),
            message: e.to_string(),
        })?;
        Ok(Self::new(doc, style))
    }

    fn new(doc: Document, style: HighlightStyle) -> Self {
        let pages = doc.get_pages().into_values().collect();
        Self {
            doc,
            pages,
            style,
            annotations: 0,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of annotation objects added so far
    pub fn annotation_count(&self) -> usize {
        self.annotations
    }

    /// Annotate every region, in order. Regions on pages the document lacks
    /// are skipped.
    pub fn apply(&mut self, regions: &[Region]) -> Result<(), DiffError> {
        for region in regions {
            let Some(&page_id) = self.pages.get(region.page) else {
                warn!(
                    page = region.page,
                    pages = self.pages.len(),
                    "region on missing page skipped"
                );
                continue;
            };
            self.apply_region(page_id, region)?;
        }
        Ok(())
    }

    fn apply_region(&mut self, page_id: ObjectId, region: &Region) -> Result<(), DiffError> {
        let color = self.style.color_for(region.kind);
        match (region.anchor, region.kind) {
            (Anchor::Master, _) => {
                // Master and edited pages need not share a size
                let rect = region.rect.clamp_to(&media_box(&self.doc, page_id));
                if rect.is_empty() {
                    warn!(
                        page = region.page,
                        text = %region.text,
                        "deletion outside edited page skipped"
                    );
                    return Ok(());
                }
                self.add_outline(page_id, &rect, color, &region.text)?;
            }
            (Anchor::Edited, ChangeKind::Modified) => {
                self.add_highlight(page_id, region, color)?;
                self.add_outline(page_id, &region.rect, color, &region.text)?;
            }
            (Anchor::Edited, ChangeKind::Insertion | ChangeKind::Deletion) => {
                self.add_highlight(page_id, region, color)?;
            }
        }
        Ok(())
    }

    fn add_highlight(
        &mut self,
        page_id: ObjectId,
        region: &Region,
        color: Rgb,
    ) -> Result<(), DiffError> {
        let mut annot = Dictionary::new();
        annot.set("Type", Object::Name(b"Annot".to_vec()));
        annot.set("Subtype", Object::Name(b"Highlight".to_vec()));
        annot.set("Rect", rect_array(&region.rect));
        annot.set("QuadPoints", quad_points(&region.quads));
        annot.set("CA", Object::Real(self.style.opacity));
        annot.set("C", color_array(color));
        annot.set("Contents", text_string(&region.text));
        // Print flag
        annot.set("F", Object::Integer(4));

        let annot_id = self.doc.add_object(Object::Dictionary(annot));
        self.add_annotation_to_page(page_id, annot_id)
    }

    fn add_outline(
        &mut self,
        page_id: ObjectId,
        rect: &Rect,
        color: Rgb,
        contents: &str,
    ) -> Result<(), DiffError> {
        let mut annot = Dictionary::new();
        annot.set("Type", Object::Name(b"Annot".to_vec()));
        annot.set("Subtype", Object::Name(b"Square".to_vec()));
        annot.set("Rect", rect_array(rect));
        annot.set("C", color_array(color));
        annot.set("Contents", text_string(contents));
        annot.set("F", Object::Integer(4));
        let mut bs = Dictionary::new();
        bs.set("W", Object::Integer(1));
        annot.set("BS", Object::Dictionary(bs));

        let annot_id = self.doc.add_object(Object::Dictionary(annot));
        self.add_annotation_to_page(page_id, annot_id)
    }

    fn add_annotation_to_page(
        &mut self,
        page_id: ObjectId,
        annot_id: ObjectId,
    ) -> Result<(), DiffError> {
        let page = self
            .doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| DiffError::AnnotationWrite(e.to_string()))?;

        // /Annots may be inline or an indirect array
        let annots_ref = match page.get(b"Annots") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };
        match annots_ref {
            Some(array_id) => {
                let array = self
                    .doc
                    .get_object_mut(array_id)
                    .and_then(Object::as_array_mut)
                    .map_err(|e| DiffError::AnnotationWrite(e.to_string()))?;
                array.push(Object::Reference(annot_id));
            }
            None => {
                if let Ok(Object::Array(ref mut arr)) = page.get_mut(b"Annots") {
                    arr.push(Object::Reference(annot_id));
                } else {
                    page.set("Annots", Object::Array(vec![Object::Reference(annot_id)]));
                }
            }
        }
        self.annotations += 1;
        Ok(())
    }

    /// Serialize the annotated document
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, DiffError> {
        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| DiffError::AnnotationWrite(e.to_string()))?;
        Ok(output)
    }

    /// Write to `path` through a temporary file in the same directory, so a
    /// failed save never leaves a partial output behind.
    pub fn save(mut self, path: impl AsRef<Path>) -> Result<(), DiffError> {
        let path = path.as_ref();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| DiffError::AnnotationWrite(format!("{}: {}", dir.display(), e)))?;
        self.doc
            .save_to(&mut tmp)
            .map_err(|e| DiffError::AnnotationWrite(e.to_string()))?;
        tmp.persist(path)
            .map_err(|e| DiffError::AnnotationWrite(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), annotations = self.annotations, "saved annotated document");
        Ok(())
    }
}

impl RegionSink for Annotator {
    fn apply_page(&mut self, _page: usize, regions: &[Region]) -> Result<(), DiffError> {
        self.apply(regions)
    }
}

fn rect_array(rect: &Rect) -> Object {
    Object::Array(vec![
        Object::Real(rect.x0),
        Object::Real(rect.y0),
        Object::Real(rect.x1),
        Object::Real(rect.y1),
    ])
}

/// Quads in the order viewers expect: top-left, top-right, bottom-left, bottom-right
fn quad_points(quads: &[Rect]) -> Object {
    Object::Array(
        quads
            .iter()
            .flat_map(|q| [q.x0, q.y1, q.x1, q.y1, q.x0, q.y0, q.x1, q.y0])
            .map(Object::Real)
            .collect(),
    )
}

fn color_array(color: Rgb) -> Object {
    Object::Array(color.components().into_iter().map(Object::Real).collect())
}

/// PDF text string: literal for ASCII, UTF-16BE with BOM otherwise
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}
