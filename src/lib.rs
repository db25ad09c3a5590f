mod batch;
mod error;
mod formats;
mod model;
mod normalize;
mod options;
mod pdf_reader;
mod reconstruct;
mod sheet_out;
mod warning;

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::pdf_reader::{read_statement_pages, read_statement_pages_from_bytes};
use crate::sheet_out::write_sheet;

pub use batch::{
    BatchSummary, FileFailure, FileOutcome, convert_batch, convert_file, output_path_for,
};
pub use error::ConvertError;
pub use formats::{SourceFormat, convert_csv, convert_json, convert_tsv, convert_txt};
pub use model::{
    CanonicalRecord, Column, DocumentOutput, NormalizedRow, PageTables, RawRow, Tabular,
};
pub use normalize::{normalize, normalize_cells};
pub use options::{ConvertOptions, DEFAULT_SHEET_NAME, PageSelection, StatementTemplate};
pub use reconstruct::{
    RowKind, ScanState, Step, TableOutcome, TableScan, classify, is_continuation, is_header,
    reconstruct_table, step,
};
pub use sheet_out::read_sheet;
pub use warning::{ConversionWarning, WarningCode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub record_count: usize,
    pub table_count: usize,
    pub tables_without_header: usize,
    pub warnings: Vec<ConversionWarning>,
}

fn reconstruct_pages(pages: &[PageTables]) -> (DocumentOutput, Vec<ConversionWarning>) {
    let mut output = DocumentOutput::default();
    let mut warnings = Vec::new();

    for page in pages {
        if page.tables.is_empty() {
            warnings.push(
                ConversionWarning::new(
                    WarningCode::PageWithoutCells,
                    "no text inside the column boundaries",
                )
                .with_page(page.page_number),
            );
        }

        for (index, table) in page.tables.iter().enumerate() {
            let table_index = index + 1;
            output.table_count += 1;

            let rows = table
                .iter()
                .map(|row| normalize(row.as_slice()))
                .collect::<Vec<_>>();
            match reconstruct_table(&rows) {
                TableOutcome::NoHeader => {
                    output.tables_without_header += 1;
                    warn!(
                        page = page.page_number,
                        table = table_index,
                        "table has no Date header row; skipping"
                    );
                    warnings.push(
                        ConversionWarning::new(
                            WarningCode::NoHeaderInTable,
                            "table has no row starting with 'Date'; skipped",
                        )
                        .with_page(page.page_number)
                        .with_table_index(table_index),
                    );
                }
                TableOutcome::Scanned(scan) => {
                    debug!(
                        page = page.page_number,
                        table = table_index,
                        records = scan.records.len(),
                        "scanned statement table"
                    );
                    if scan.discarded_rows > 0 {
                        warnings.push(
                            ConversionWarning::new(
                                WarningCode::RowsAfterCarriedForward,
                                format!(
                                    "{} row(s) after 'Carried Forward' were ignored",
                                    scan.discarded_rows
                                ),
                            )
                            .with_page(page.page_number)
                            .with_table_index(table_index),
                        );
                    }
                    output.records.extend(scan.records);
                }
            }
        }
    }

    (output, warnings)
}

/// Reconstructs the records of a whole document from its extracted tables,
/// pages and tables in source order. Fails with [`ConvertError::NoDataFound`]
/// when no table yields a record.
pub fn reconstruct_document(
    pages: &[PageTables],
) -> Result<(DocumentOutput, ConversionReport), ConvertError> {
    let (output, warnings) = reconstruct_pages(pages);
    if output.records.is_empty() {
        return Err(ConvertError::NoDataFound);
    }

    let report = ConversionReport {
        record_count: output.records.len(),
        table_count: output.table_count,
        tables_without_header: output.tables_without_header,
        warnings,
    };
    Ok((output, report))
}

pub fn reconstruct_statement(
    input_pdf: &Path,
    options: &ConvertOptions,
) -> Result<(DocumentOutput, ConversionReport), ConvertError> {
    options.template.validate()?;
    let pages = read_statement_pages(input_pdf, &options.template, options.pages.as_ref())?;
    reconstruct_document(&pages)
}

pub fn reconstruct_statement_bytes(
    input_pdf: &[u8],
    options: &ConvertOptions,
) -> Result<(DocumentOutput, ConversionReport), ConvertError> {
    options.template.validate()?;
    let pages =
        read_statement_pages_from_bytes(input_pdf, &options.template, options.pages.as_ref())?;
    reconstruct_document(&pages)
}

/// Writes records under the fixed statement header and returns the number of
/// data rows written.
pub fn write_records(
    output_xlsx: &Path,
    records: &[CanonicalRecord],
    sheet_name: &str,
) -> Result<usize, ConvertError> {
    write_sheet(output_xlsx, sheet_name, &Tabular::from_records(records))
}

pub fn write_tabular(
    output_xlsx: &Path,
    table: &Tabular,
    sheet_name: &str,
) -> Result<usize, ConvertError> {
    write_sheet(output_xlsx, sheet_name, table)
}

/// Reconstructs a statement PDF and writes it as a single-sheet workbook. No
/// file is written when the document yields no records.
pub fn convert_statement_pdf(
    input_pdf: &Path,
    output_xlsx: &Path,
    options: &ConvertOptions,
) -> Result<ConversionReport, ConvertError> {
    let (output, report) = reconstruct_statement(input_pdf, options)?;
    write_records(output_xlsx, &output.records, &options.sheet_name)?;

    info!(
        input = %input_pdf.display(),
        records = report.record_count,
        tables = report.table_count,
        "statement converted"
    );
    Ok(report)
}
