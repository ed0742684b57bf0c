//! In-memory Letter PDFs with one Helvetica text run per line

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// Left margin and first baseline of stacked pages
pub const LEFT: f32 = 72.0;
pub const TOP: f32 = 720.0;
pub const FONT_SIZE: f32 = 12.0;
pub const LINE_PITCH: f32 = 14.0;

pub struct TestLine<'a> {
    pub x: f32,
    pub y: f32,
    pub text: &'a str,
}

impl<'a> TestLine<'a> {
    pub fn at(x: f32, y: f32, text: &'a str) -> Self {
        Self { x, y, text }
    }
}

/// Lines stacked down from the top margin; an empty string leaves a blank
/// line, which splits the text into separate blocks.
pub fn stacked<'a>(lines: &[&'a str]) -> Vec<TestLine<'a>> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, text)| !text.is_empty())
        .map(|(i, text)| TestLine::at(LEFT, TOP - i as f32 * LINE_PITCH, text))
        .collect()
}

/// `/FirstChar` and `/Widths` written into the page font
pub struct FontWidths {
    pub first_char: i64,
    pub widths: Vec<i64>,
}

/// Page font without a `/Widths` array
pub fn build_pdf(pages: &[Vec<TestLine>]) -> Vec<u8> {
    build_pdf_with_font(pages, None)
}

pub fn build_pdf_with_font(pages: &[Vec<TestLine>], widths: Option<&FontWidths>) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut font = dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    };
    if let Some(w) = widths {
        font.set("FirstChar", w.first_char);
        font.set("LastChar", w.first_char + w.widths.len() as i64 - 1);
        font.set(
            "Widths",
            w.widths.iter().map(|&v| Object::Integer(v)).collect::<Vec<_>>(),
        );
    }
    let font_id = doc.add_object(font);
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        for line in lines {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Real(FONT_SIZE)],
            ));
            operations.push(Operation::new(
                "Td",
                vec![Object::Real(line.x), Object::Real(line.y)],
            ));
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(line.text)],
            ));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}
