use serde::Serialize;

/// One row as delivered by the layout extractor: one optional fragment per
/// detected column, any length.
pub type RawRow = Vec<Option<String>>;

/// Statement columns in template order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Date,
    Details,
    Debit,
    Credit,
    Balance,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Date,
        Column::Details,
        Column::Debit,
        Column::Credit,
        Column::Balance,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Date => 0,
            Self::Details => 1,
            Self::Debit => 2,
            Self::Credit => 3,
            Self::Balance => 4,
        }
    }

    /// Heading used in the output sheet.
    #[must_use]
    pub const fn heading(self) -> &'static str {
        match self {
            Self::Date => "Date",
            Self::Details => "Transaction Details",
            Self::Debit => "Debits",
            Self::Credit => "Credits",
            Self::Balance => "Balance",
        }
    }
}

pub const STATEMENT_WIDTH: usize = Column::ALL.len();

/// Exactly five trimmed cells aligned to `[Date, Details, Debit, Credit, Balance]`.
/// Whitespace-only fragments are stored as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedRow {
    cells: [Option<String>; STATEMENT_WIDTH],
}

impl NormalizedRow {
    pub(crate) fn from_cells(cells: [Option<String>; STATEMENT_WIDTH]) -> Self {
        Self { cells }
    }

    #[must_use]
    pub fn get(&self, column: Column) -> Option<&str> {
        self.cells[column.index()].as_deref()
    }

    #[must_use]
    pub fn is_populated(&self, column: Column) -> bool {
        self.cells[column.index()].is_some()
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    /// Populated cells concatenated without a separator, used for marker
    /// matching. A marker phrase split across two cells does not match.
    #[must_use]
    pub fn text(&self) -> String {
        self.cells.iter().flatten().map(String::as_str).collect()
    }

    #[must_use]
    pub fn cells(&self) -> &[Option<String>; STATEMENT_WIDTH] {
        &self.cells
    }

    #[must_use]
    pub fn into_raw(self) -> RawRow {
        self.cells.into_iter().collect()
    }
}

/// One logical transaction. `details` may span several source lines joined
/// with `\n`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalRecord {
    pub date: Option<String>,
    /// `None` when the primary row had no details and no continuation followed.
    pub details: Option<String>,
    pub debit: Option<String>,
    pub credit: Option<String>,
    pub balance: Option<String>,
}

impl CanonicalRecord {
    #[must_use]
    pub fn fields(&self) -> [Option<&str>; STATEMENT_WIDTH] {
        [
            self.date.as_deref(),
            self.details.as_deref(),
            self.debit.as_deref(),
            self.credit.as_deref(),
            self.balance.as_deref(),
        ]
    }
}

/// Raw tables extracted from one page, in extraction order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTables {
    pub page_number: u32,
    pub tables: Vec<Vec<RawRow>>,
}

/// Records of a whole document in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentOutput {
    pub records: Vec<CanonicalRecord>,
    pub table_count: usize,
    pub tables_without_header: usize,
}

/// Generic sheet content produced by the non-statement converters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tabular {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Tabular {
    #[must_use]
    pub fn from_records(records: &[CanonicalRecord]) -> Self {
        Self {
            headers: Column::ALL
                .iter()
                .map(|column| column.heading().to_string())
                .collect(),
            rows: records
                .iter()
                .map(|record| {
                    record
                        .fields()
                        .iter()
                        .map(|field| field.map(str::to_string))
                        .collect()
                })
                .collect(),
        }
    }
}
