use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

/// Left edges of the five default statement columns.
pub const DATE_X: i64 = 62;
pub const DETAILS_X: i64 = 130;
pub const DEBIT_X: i64 = 280;
pub const CREDIT_X: i64 = 350;
pub const BALANCE_X: i64 = 460;

/// One line of a statement page: a baseline and the text of each column.
pub struct Line<'a> {
    pub y: i64,
    pub cells: [Option<&'a str>; 5],
}

impl<'a> Line<'a> {
    pub fn new(y: i64, cells: [Option<&'a str>; 5]) -> Self {
        Self { y, cells }
    }
}

pub fn header_line(y: i64) -> Line<'static> {
    Line::new(
        y,
        [
            Some("Date"),
            Some("Transaction Details"),
            Some("Debits"),
            Some("Credits"),
            Some("Balance"),
        ],
    )
}

fn place_text(operations: &mut Vec<Operation>, x: i64, y: i64, text: &str) {
    operations.extend([
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 10.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]);
}

/// Writes a PDF whose pages carry text placed at absolute positions, one
/// text object per cell, laid out on the default column template.
pub fn create_statement_pdf(
    path: &Path,
    pages: &[Vec<Line<'_>>],
) -> Result<(), Box<dyn std::error::Error>> {
    let columns = [DATE_X, DETAILS_X, DEBIT_X, CREDIT_X, BALANCE_X];
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut page_ids = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        for line in lines {
            for (x, text) in columns.iter().zip(line.cells) {
                if let Some(text) = text {
                    place_text(&mut operations, *x, line.y, text);
                }
            }
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| (*id).into()).collect::<Vec<_>>(),
            "Count" => i64::try_from(page_ids.len())?,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    doc.save(path)?;
    Ok(())
}
