//! Glyph advance widths from page font resources
//!
//! Simple fonts carry `/FirstChar` + `/Widths` (and optionally
//! `/FontDescriptor /MissingWidth`); Type0 fonts carry `/W` + `/DW` on their
//! descendant CIDFont. Widths are in thousandths of an em. Fonts without
//! either (bare base-14 fonts, Type3) are left out of the map and the
//! interpreter falls back to a fixed ratio.

use std::collections::{BTreeMap, HashMap};

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

/// Resource name (`F1`, ...) to metrics, for one page
pub type FontMap = BTreeMap<Vec<u8>, FontMetrics>;

/// PDF default for `/DW`
const DEFAULT_CID_WIDTH: f32 = 1000.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontMetrics {
    /// Two-byte codes (Type0) instead of one byte per glyph
    pub composite: bool,
    first_char: u32,
    widths: Vec<f32>,
    cid_widths: HashMap<u32, f32>,
    default_width: Option<f32>,
}

impl FontMetrics {
    /// Single-byte font: `widths[i]` is the width of code `first_char + i`
    pub fn simple(first_char: u32, widths: Vec<f32>, missing_width: Option<f32>) -> Self {
        Self {
            composite: false,
            first_char,
            widths,
            default_width: missing_width,
            ..Default::default()
        }
    }

    /// Two-byte CID font
    pub fn composite(cid_widths: HashMap<u32, f32>, default_width: f32) -> Self {
        Self {
            composite: true,
            cid_widths,
            default_width: Some(default_width),
            ..Default::default()
        }
    }

    /// Advance of `code` in em, when the font defines one
    pub fn advance(&self, code: u32) -> Option<f32> {
        let width = if self.composite {
            self.cid_widths.get(&code).copied().or(self.default_width)
        } else {
            // Zero entries in /Widths mark codes the font does not use
            code.checked_sub(self.first_char)
                .and_then(|i| self.widths.get(i as usize).copied())
                .filter(|w| *w > 0.0)
                .or(self.default_width)
        };
        width.map(|w| w / 1000.0)
    }

    pub fn from_dict(doc: &Document, font: &Dictionary) -> Option<Self> {
        match font.get(b"Subtype").and_then(Object::as_name).ok() {
            Some(b"Type0") => {
                let descendant = font
                    .get(b"DescendantFonts")
                    .ok()
                    .and_then(|o| resolve(doc, o))
                    .and_then(|o| o.as_array().ok())
                    .and_then(|fonts| fonts.first())
                    .and_then(|o| resolve(doc, o))
                    .and_then(|o| o.as_dict().ok())?;
                let default_width = descendant
                    .get(b"DW")
                    .ok()
                    .and_then(|o| resolve_number(doc, o))
                    .unwrap_or(DEFAULT_CID_WIDTH);
                let cid_widths = descendant
                    .get(b"W")
                    .ok()
                    .and_then(|o| resolve(doc, o))
                    .and_then(|o| o.as_array().ok())
                    .map(|items| parse_cid_widths(doc, items))
                    .unwrap_or_default();
                Some(Self::composite(cid_widths, default_width))
            }
            // Type3 widths are in glyph space, not thousandths of an em
            Some(b"Type3") => None,
            _ => {
                let missing_width = font
                    .get(b"FontDescriptor")
                    .ok()
                    .and_then(|o| resolve(doc, o))
                    .and_then(|o| o.as_dict().ok())
                    .and_then(|d| d.get(b"MissingWidth").ok())
                    .and_then(|o| resolve_number(doc, o))
                    .filter(|w| *w > 0.0);
                let widths: Option<Vec<f32>> = font
                    .get(b"Widths")
                    .ok()
                    .and_then(|o| resolve(doc, o))
                    .and_then(|o| o.as_array().ok())
                    .map(|items| {
                        items
                            .iter()
                            .map(|o| resolve_number(doc, o).unwrap_or(0.0))
                            .collect()
                    });
                if widths.is_none() && missing_width.is_none() {
                    return None;
                }
                let first_char = font
                    .get(b"FirstChar")
                    .ok()
                    .and_then(|o| resolve_number(doc, o))
                    .unwrap_or(0.0)
                    .max(0.0) as u32;
                Some(Self::simple(
                    first_char,
                    widths.unwrap_or_default(),
                    missing_width,
                ))
            }
        }
    }
}

/// Metrics of every font in a page's resources, inherited resources included
pub fn page_fonts(doc: &Document, page_id: ObjectId) -> FontMap {
    let mut fonts = FontMap::new();
    let mut current = Some(page_id);
    while let Some(id) = current {
        let Ok(node) = doc.get_object(id).and_then(Object::as_dict) else {
            break;
        };
        let font_dict = node
            .get(b"Resources")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok())
            .and_then(|resources| resources.get(b"Font").ok())
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok());
        if let Some(font_dict) = font_dict {
            for (name, font) in font_dict.iter() {
                let metrics = resolve(doc, font)
                    .and_then(|o| o.as_dict().ok())
                    .and_then(|dict| FontMetrics::from_dict(doc, dict));
                if let Some(metrics) = metrics {
                    fonts.insert(name.clone(), metrics);
                }
            }
            break;
        }
        current = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    debug!(fonts = fonts.len(), "page font widths loaded");
    fonts
}

/// `/W` entries: `c [w1 w2 ...]` or `c_first c_last w`
fn parse_cid_widths(doc: &Document, items: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < items.len() {
        let Some(first) = resolve_number(doc, &items[i]) else {
            break;
        };
        let first = first.max(0.0) as u32;
        match items.get(i + 1).and_then(|o| resolve(doc, o)) {
            Some(Object::Array(run)) => {
                for (offset, w) in run.iter().enumerate() {
                    if let Some(w) = resolve_number(doc, w) {
                        widths.insert(first + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(w)) = (
                    number(last),
                    items.get(i + 2).and_then(|o| resolve_number(doc, o)),
                ) else {
                    break;
                };
                for code in first..=last.max(0.0) as u32 {
                    widths.insert(code, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_number(doc: &Document, obj: &Object) -> Option<f32> {
    resolve(doc, obj).and_then(number)
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(v) => Some(*v as f32),
        Object::Real(v) => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use pretty_assertions::assert_eq;

    fn ints(values: &[i64]) -> Vec<Object> {
        values.iter().map(|&v| Object::Integer(v)).collect()
    }

    #[test]
    fn test_simple_font_widths() {
        let doc = Document::with_version("1.7");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "FirstChar" => 65,
            "Widths" => ints(&[722, 0, 667]),
        };
        let metrics = FontMetrics::from_dict(&doc, &font).unwrap();
        assert!(!metrics.composite);
        assert_eq!(metrics.advance(65), Some(0.722));
        assert_eq!(metrics.advance(67), Some(0.667));
        // Zero entry, below range and above range have no width
        assert_eq!(metrics.advance(66), None);
        assert_eq!(metrics.advance(32), None);
        assert_eq!(metrics.advance(68), None);
    }

    #[test]
    fn test_missing_width_fills_gaps() {
        let mut doc = Document::with_version("1.7");
        let descriptor = doc.add_object(dictionary! { "MissingWidth" => 250 });
        let widths = doc.add_object(ints(&[500]));
        let font = dictionary! {
            "Subtype" => "Type1",
            "FirstChar" => 97,
            "Widths" => widths,
            "FontDescriptor" => descriptor,
        };
        let metrics = FontMetrics::from_dict(&doc, &font).unwrap();
        assert_eq!(metrics.advance(97), Some(0.5));
        assert_eq!(metrics.advance(98), Some(0.25));
    }

    #[test]
    fn test_base14_font_without_widths_is_skipped() {
        let doc = Document::with_version("1.7");
        let font = dictionary! { "Subtype" => "Type1", "BaseFont" => "Helvetica" };
        assert_eq!(FontMetrics::from_dict(&doc, &font), None);
    }

    #[test]
    fn test_type3_is_skipped() {
        let doc = Document::with_version("1.7");
        let font = dictionary! {
            "Subtype" => "Type3",
            "FirstChar" => 0,
            "Widths" => ints(&[10]),
        };
        assert_eq!(FontMetrics::from_dict(&doc, &font), None);
    }

    #[test]
    fn test_type0_cid_widths() {
        let mut doc = Document::with_version("1.7");
        let descendant = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "DW" => 600,
            "W" => vec![
                Object::Integer(1),
                Object::Array(ints(&[300, 400])),
                Object::Integer(10),
                Object::Integer(12),
                Object::Integer(700),
            ],
        });
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "DescendantFonts" => vec![Object::Reference(descendant)],
        };
        let metrics = FontMetrics::from_dict(&doc, &font).unwrap();
        assert!(metrics.composite);
        assert_eq!(metrics.advance(1), Some(0.3));
        assert_eq!(metrics.advance(2), Some(0.4));
        assert_eq!(metrics.advance(11), Some(0.7));
        assert_eq!(metrics.advance(12), Some(0.7));
        assert_eq!(metrics.advance(5), Some(0.6));
    }

    #[test]
    fn test_page_fonts_inherited_from_parent() {
        let mut doc = Document::with_version("1.7");
        let font = doc.add_object(dictionary! {
            "Subtype" => "TrueType",
            "FirstChar" => 32,
            "Widths" => ints(&[278]),
        });
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F2" => font },
                },
            }),
        );

        let fonts = page_fonts(&doc, page_id);
        assert_eq!(fonts.len(), 1);
        assert_eq!(fonts[&b"F2".to_vec()].advance(32), Some(0.278));
    }
}
