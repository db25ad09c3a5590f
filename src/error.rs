use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV read error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to load PDF: {0}")]
    PdfLoad(#[from] lopdf::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported JSON structure: {0}")]
    InvalidJson(String),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid statement template: {0}")]
    InvalidTemplate(String),

    #[error("invalid page selection: {0}")]
    InvalidPageSelection(String),

    #[error("no pages available after applying selection")]
    NoPagesSelected,

    #[error("input contains no rows: {0}")]
    EmptyInput(String),

    /// Every table of the document was skipped or empty.
    #[error("no transaction records found in document")]
    NoDataFound,

    #[error("failed to write spreadsheet: {0}")]
    SinkWrite(String),
}

impl ConvertError {
    /// True for failures caused by the document content rather than the
    /// environment; the CLI reports these with a distinct exit code.
    #[must_use]
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoDataFound | Self::EmptyInput(_))
    }
}
