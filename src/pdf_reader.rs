//! Positioned text extraction over `lopdf` content streams.
//!
//! Each page is reduced to text fragments carrying their baseline origin in
//! user space. Fragments are grouped into lines by baseline and cut into
//! cells by the fixed column boundaries of a [`StatementTemplate`]. There is
//! no glyph metric lookup: advances are estimated from the font size.

use std::collections::BTreeMap;
use std::path::Path;

use encoding_rs::{BIG5, UTF_16BE};
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use tracing::debug;

use crate::error::ConvertError;
use crate::model::{PageTables, RawRow};
use crate::options::{BOUNDARY_COUNT, PageSelection, StatementTemplate};

/// Average glyph advance as a fraction of the font size.
const AVG_GLYPH_ADVANCE: f32 = 0.5;

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn multiply(lhs: &Matrix, rhs: &Matrix) -> Matrix {
    [
        lhs[0] * rhs[0] + lhs[1] * rhs[2],
        lhs[0] * rhs[1] + lhs[1] * rhs[3],
        lhs[2] * rhs[0] + lhs[3] * rhs[2],
        lhs[2] * rhs[1] + lhs[3] * rhs[3],
        lhs[4] * rhs[0] + lhs[5] * rhs[2] + rhs[4],
        lhs[4] * rhs[1] + lhs[5] * rhs[3] + rhs[5],
    ]
}

fn translation(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

#[allow(clippy::cast_precision_loss)]
fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

fn numbers<const N: usize>(operands: &[Object]) -> Option<[f32; N]> {
    let mut out = [0.0_f32; N];
    if operands.len() < N {
        return None;
    }
    for (slot, operand) in out.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(out)
}

fn looks_decoding_broken(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    if text.contains("?Identity-H Unimplemented?") {
        return true;
    }

    let total = text.chars().count();
    let replacement = text.matches('\u{FFFD}').count();
    let control = text
        .chars()
        .filter(|ch| ch.is_control() && !matches!(ch, '\n' | '\r' | '\t'))
        .count();

    replacement * 8 > total || control * 5 > total
}

fn decode_pdf_bytes(encoding: Option<&str>, bytes: &[u8]) -> String {
    let decoded = Document::decode_text(encoding, bytes);
    if !looks_decoding_broken(&decoded) {
        return decoded;
    }

    if bytes.starts_with(&[0xFE, 0xFF]) {
        let (utf16, had_errors) = UTF_16BE.decode_without_bom_handling(&bytes[2..]);
        if !had_errors && !utf16.is_empty() {
            return utf16.into_owned();
        }
    }

    if let Some(name) = encoding.map(str::to_ascii_lowercase) {
        if name.contains("identity-h") || name.contains("ucs2") || name.contains("utf16") {
            let (utf16, had_errors) = UTF_16BE.decode_without_bom_handling(bytes);
            if !had_errors && !utf16.is_empty() {
                return utf16.into_owned();
            }
        }
        if name.contains("big5") || name.contains("b5") {
            let (big5, _, had_errors) = BIG5.decode(bytes);
            if !had_errors && !big5.is_empty() {
                return big5.into_owned();
            }
        }
    }

    String::from_utf8_lossy(bytes).to_string()
}

/// A run of text shown by one string operand, positioned at its baseline
/// origin in user space.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextFragment {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub text: String,
}

struct TextState<'a> {
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    leading: f32,
    font_size: f32,
    encoding: Option<&'a str>,
    fragments: Vec<TextFragment>,
}

impl<'a> TextState<'a> {
    fn new() -> Self {
        Self {
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            leading: 0.0,
            font_size: 1.0,
            encoding: None,
            fragments: Vec::new(),
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = multiply(&translation(tx, ty), &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn advance(&mut self, tx: f32) {
        self.text_matrix = multiply(&translation(tx, 0.0), &self.text_matrix);
    }

    #[allow(clippy::cast_precision_loss)]
    fn show(&mut self, bytes: &[u8]) {
        let text = decode_pdf_bytes(self.encoding, bytes);
        let advance = text.chars().count() as f32 * self.font_size * AVG_GLYPH_ADVANCE;
        let placed = multiply(&self.text_matrix, &self.ctm);

        if !text.trim().is_empty() {
            let scale = placed[0].hypot(placed[1]);
            self.fragments.push(TextFragment {
                x: placed[4],
                y: placed[5],
                width: advance * scale,
                text,
            });
        }
        self.advance(advance);
    }

    fn show_array(&mut self, items: &[Object]) {
        for item in items {
            match item {
                Object::String(bytes, _) => self.show(bytes),
                other => {
                    if let Some(adjustment) = number(other) {
                        self.advance(-adjustment / 1000.0 * self.font_size);
                    }
                }
            }
        }
    }
}

pub(crate) fn page_fragments(document: &Document, page_id: ObjectId) -> Vec<TextFragment> {
    let Ok(raw_content) = document.get_page_content(page_id) else {
        return Vec::new();
    };
    let Ok(content) = Content::decode(&raw_content) else {
        return Vec::new();
    };
    let encodings = document
        .get_page_fonts(page_id)
        .into_iter()
        .map(|(name, font)| (name, font.get_font_encoding()))
        .collect::<BTreeMap<Vec<u8>, &str>>();

    let mut state = TextState::new();
    for operation in &content.operations {
        let operands = operation.operands.as_slice();
        match operation.operator.as_str() {
            "q" => state.ctm_stack.push(state.ctm),
            "Q" => {
                if let Some(ctm) = state.ctm_stack.pop() {
                    state.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(matrix) = numbers::<6>(operands) {
                    state.ctm = multiply(&matrix, &state.ctm);
                }
            }
            "BT" => {
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "Tf" => {
                if let Some(font_name) = operands.first().and_then(|operand| operand.as_name().ok())
                {
                    state.encoding = encodings.get(font_name).copied();
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    state.font_size = size;
                }
            }
            "TL" => {
                if let Some([leading]) = numbers::<1>(operands) {
                    state.leading = leading;
                }
            }
            "Td" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    state.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    state.leading = -ty;
                    state.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(matrix) = numbers::<6>(operands) {
                    state.text_matrix = matrix;
                    state.line_matrix = matrix;
                }
            }
            "T*" => state.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    state.show(bytes);
                }
            }
            "'" => {
                state.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    state.show(bytes);
                }
            }
            "\"" => {
                state.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    state.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    state.show_array(items);
                }
            }
            _ => {}
        }
    }

    state.fragments
}

/// Groups fragments into lines, top of page first. A fragment joins the
/// current line while its baseline is within `y_tolerance` of the line's
/// first baseline.
pub(crate) fn group_lines(
    mut fragments: Vec<TextFragment>,
    y_tolerance: f32,
) -> Vec<Vec<TextFragment>> {
    fragments.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut lines: Vec<Vec<TextFragment>> = Vec::new();
    let mut anchor = f32::NAN;
    for fragment in fragments {
        if let Some(line) = lines
            .last_mut()
            .filter(|_| (anchor - fragment.y).abs() <= y_tolerance)
        {
            line.push(fragment);
        } else {
            anchor = fragment.y;
            lines.push(vec![fragment]);
        }
    }

    for line in &mut lines {
        line.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    lines
}

fn join_cell(fragments: &[&TextFragment], text_tolerance: f32) -> Option<String> {
    let mut out = String::new();
    let mut previous_end: Option<f32> = None;
    for fragment in fragments {
        if let Some(end) = previous_end
            && fragment.x - end > text_tolerance
        {
            out.push(' ');
        }
        out.push_str(&fragment.text);
        previous_end = Some(fragment.x + fragment.width);
    }
    (!out.trim().is_empty()).then_some(out)
}

/// Cuts one line into the template's columns. Returns `None` when no
/// fragment lies inside the column window.
pub(crate) fn line_to_row(line: &[TextFragment], template: &StatementTemplate) -> Option<RawRow> {
    let mut buckets: Vec<Vec<&TextFragment>> = vec![Vec::new(); BOUNDARY_COUNT - 1];
    for fragment in line {
        if let Some(column) = template.column_for(fragment.x) {
            buckets[column].push(fragment);
        }
    }

    if buckets.iter().all(Vec::is_empty) {
        return None;
    }

    Some(
        buckets
            .iter()
            .map(|bucket| join_cell(bucket, template.text_tolerance))
            .collect(),
    )
}

fn page_table(
    document: &Document,
    page_id: ObjectId,
    template: &StatementTemplate,
) -> Vec<RawRow> {
    let fragments = page_fragments(document, page_id);
    group_lines(fragments, template.text_y_tolerance)
        .iter()
        .filter_map(|line| line_to_row(line, template))
        .collect()
}

fn tables_from_document(
    document: &Document,
    template: &StatementTemplate,
    page_selection: Option<&PageSelection>,
) -> Result<Vec<PageTables>, ConvertError> {
    let mut pages = Vec::new();
    for (page_number, page_id) in document.get_pages() {
        if page_selection.is_some_and(|selection| !selection.contains(page_number)) {
            continue;
        }

        let rows = page_table(document, page_id, template);
        debug!(page = page_number, rows = rows.len(), "extracted page table");
        let tables = if rows.is_empty() { Vec::new() } else { vec![rows] };
        pages.push(PageTables {
            page_number,
            tables,
        });
    }

    if pages.is_empty() {
        return Err(ConvertError::NoPagesSelected);
    }

    Ok(pages)
}

pub(crate) fn read_statement_pages(
    input_pdf: &Path,
    template: &StatementTemplate,
    page_selection: Option<&PageSelection>,
) -> Result<Vec<PageTables>, ConvertError> {
    let document = Document::load(input_pdf)?;
    tables_from_document(&document, template, page_selection)
}

pub(crate) fn read_statement_pages_from_bytes(
    input_pdf: &[u8],
    template: &StatementTemplate,
    page_selection: Option<&PageSelection>,
) -> Result<Vec<PageTables>, ConvertError> {
    let document = Document::load_mem(input_pdf)?;
    tables_from_document(&document, template, page_selection)
}
