use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    /// A table had no row starting with `Date`; it contributed nothing.
    NoHeaderInTable,
    /// A selected page produced no cells inside the column window.
    PageWithoutCells,
    /// Rows remained after the `Carried Forward` marker and were dropped.
    RowsAfterCarriedForward,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionWarning {
    pub code: WarningCode,
    pub message: String,
    pub page: Option<u32>,
    pub table_index: Option<usize>,
}

impl ConversionWarning {
    #[must_use]
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            page: None,
            table_index: None,
        }
    }

    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn with_table_index(mut self, table_index: usize) -> Self {
        self.table_index = Some(table_index);
        self
    }
}
