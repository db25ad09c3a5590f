use std::path::Path;

use tempfile::NamedTempFile;
use umya_spreadsheet::{HorizontalAlignmentValues, Spreadsheet, VerticalAlignmentValues, Worksheet};

use crate::error::ConvertError;
use crate::model::Tabular;

fn sink_error(error: impl std::fmt::Display) -> ConvertError {
    ConvertError::SinkWrite(error.to_string())
}

fn coordinate(column: usize, row: usize) -> Result<(u32, u32), ConvertError> {
    let column = u32::try_from(column + 1).map_err(sink_error)?;
    let row = u32::try_from(row + 1).map_err(sink_error)?;
    Ok((column, row))
}

/// Writes `value` at zero-based `(column, row)` with top/left aligned,
/// wrapping presentation. Absent values still get the style.
fn write_cell(
    sheet: &mut Worksheet,
    column: usize,
    row: usize,
    value: Option<&str>,
) -> Result<(), ConvertError> {
    let at = coordinate(column, row)?;
    if let Some(value) = value {
        sheet.get_cell_mut(at).set_value_string(value);
    }

    let alignment = sheet.get_style_mut(at).get_alignment_mut();
    alignment.set_horizontal(HorizontalAlignmentValues::Left);
    alignment.set_vertical(VerticalAlignmentValues::Top);
    alignment.set_wrap_text(true);
    Ok(())
}

fn build_workbook(sheet_name: &str, table: &Tabular) -> Result<(Spreadsheet, usize), ConvertError> {
    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    let sheet = book.new_sheet(sheet_name).map_err(sink_error)?;

    for (column, header) in table.headers.iter().enumerate() {
        write_cell(sheet, column, 0, Some(header))?;
    }

    let mut written = 0;
    for row in table.rows.iter().filter(|row| row.iter().any(Option::is_some)) {
        written += 1;
        for (column, value) in row.iter().enumerate() {
            write_cell(sheet, column, written, value.as_deref())?;
        }
    }

    Ok((book, written))
}

/// Writes `table` as the only sheet of a new workbook at `path` and returns
/// the number of data rows written. Rows with every cell absent are dropped.
///
/// The workbook is staged in a temporary file next to `path` and renamed into
/// place, so a failed write leaves no partial file behind.
pub(crate) fn write_sheet(
    path: &Path,
    sheet_name: &str,
    table: &Tabular,
) -> Result<usize, ConvertError> {
    let (book, written) = build_workbook(sheet_name, table)?;

    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staging = NamedTempFile::new_in(directory).map_err(sink_error)?;
    umya_spreadsheet::writer::xlsx::write_writer(&book, staging.as_file_mut())
        .map_err(sink_error)?;
    staging
        .persist(path)
        .map_err(|error| sink_error(error.error))?;

    Ok(written)
}

/// Reads a sheet written by [`write_sheet`] back into headers and rows. Empty
/// cells come back as `None`.
pub fn read_sheet(path: &Path, sheet_name: &str) -> Result<Tabular, ConvertError> {
    let book = umya_spreadsheet::reader::xlsx::read(path).map_err(sink_error)?;
    let sheet = book
        .get_sheet_by_name(sheet_name)
        .ok_or_else(|| ConvertError::EmptyInput(format!("sheet '{sheet_name}' not found")))?;

    let width = sheet.get_highest_column();
    let height = sheet.get_highest_row();
    let read_row = |row: u32| {
        (1..=width)
            .map(|column| {
                let value = sheet.get_value((column, row));
                (!value.is_empty()).then_some(value)
            })
            .collect::<Vec<_>>()
    };

    let headers = if height == 0 {
        Vec::new()
    } else {
        read_row(1).into_iter().map(Option::unwrap_or_default).collect()
    };
    let rows = (2..=height).map(read_row).collect();

    Ok(Tabular { headers, rows })
}
