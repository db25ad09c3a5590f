use crate::model::{NormalizedRow, STATEMENT_WIDTH};

fn clean_cell(cell: Option<&str>) -> Option<String> {
    cell.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Pads or truncates `row` to `width` cells, trimming each one. Empty and
/// whitespace-only fragments become `None`.
pub fn normalize_cells<S: AsRef<str>>(row: &[Option<S>], width: usize) -> Vec<Option<String>> {
    let mut out = row
        .iter()
        .take(width)
        .map(|cell| clean_cell(cell.as_ref().map(|text| text.as_ref())))
        .collect::<Vec<_>>();
    out.resize(width, None);
    out
}

/// Normalizes a raw extractor row onto the five statement columns. Total over
/// any input length, including zero.
pub fn normalize<S: AsRef<str>>(row: &[Option<S>]) -> NormalizedRow {
    let mut cells: [Option<String>; STATEMENT_WIDTH] = Default::default();
    for (slot, cell) in cells.iter_mut().zip(normalize_cells(row, STATEMENT_WIDTH)) {
        *slot = cell;
    }
    NormalizedRow::from_cells(cells)
}
