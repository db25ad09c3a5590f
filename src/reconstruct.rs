//! Reassembles transaction records from the normalized rows of one extracted
//! statement table.
//!
//! Scanning is a single pass driven by [`step`], a pure transition from the
//! current [`ScanState`] and the row under the cursor to the next state. The
//! cursor only moves by the amount a step reports as consumed.
//!
//! ```text
//! SeekingHeader --"Date..." row--> ScanningBody --primary row--> Absorbing
//!       |                           ^      |                        |
//!    no rows                        +------+--- non-continuation ---+
//!       v                                  |
//!    Terminal <--- "Carried Forward" / end of rows
//! ```

use crate::model::{CanonicalRecord, Column, NormalizedRow};

const HEADER_TOKEN: &str = "Date";
const BROUGHT_FORWARD: &str = "Brought Forward";
const CARRIED_FORWARD: &str = "Carried Forward";

/// Columns whose presence marks a row as the start of a new record. A row
/// carrying only a debit or credit amount does not qualify.
const PRIMARY_COLUMNS: [Column; 3] = [Column::Date, Column::Details, Column::Balance];

/// Columns that must be empty for a row to continue the open record.
const NON_DETAIL_COLUMNS: [Column; 4] = [
    Column::Date,
    Column::Debit,
    Column::Credit,
    Column::Balance,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Blank,
    BroughtForward,
    CarriedForward,
    Primary,
    Noise,
}

/// Classifies a body row. Markers win over the primary-row test.
#[must_use]
pub fn classify(row: &NormalizedRow) -> RowKind {
    if row.is_blank() {
        return RowKind::Blank;
    }

    let text = row.text();
    if text.contains(BROUGHT_FORWARD) {
        return RowKind::BroughtForward;
    }
    if text.contains(CARRIED_FORWARD) {
        return RowKind::CarriedForward;
    }

    if PRIMARY_COLUMNS.iter().any(|column| row.is_populated(*column)) {
        RowKind::Primary
    } else {
        RowKind::Noise
    }
}

fn is_marker(row: &NormalizedRow) -> bool {
    let text = row.text();
    text.contains(BROUGHT_FORWARD) || text.contains(CARRIED_FORWARD)
}

#[must_use]
pub fn is_header(row: &NormalizedRow) -> bool {
    row.get(Column::Date)
        .is_some_and(|date| date.starts_with(HEADER_TOKEN))
}

/// A continuation row has details text and nothing else. Marker rows never
/// continue a record.
#[must_use]
pub fn is_continuation(row: &NormalizedRow) -> bool {
    !is_marker(row)
        && row.is_populated(Column::Details)
        && NON_DETAIL_COLUMNS
            .iter()
            .all(|column| !row.is_populated(*column))
}

fn open_record(row: &NormalizedRow) -> CanonicalRecord {
    let field = |column| row.get(column).map(str::to_string);
    CanonicalRecord {
        date: field(Column::Date),
        details: field(Column::Details),
        debit: field(Column::Debit),
        credit: field(Column::Credit),
        balance: field(Column::Balance),
    }
}

fn append_details(record: &mut CanonicalRecord, line: &str) {
    match &mut record.details {
        Some(details) => {
            details.push('\n');
            details.push_str(line);
        }
        None => record.details = Some(line.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    SeekingHeader,
    ScanningBody,
    /// A record is open and following detail-only rows are merged into it.
    Absorbing(CanonicalRecord),
    Terminal,
}

/// Result of one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub next: ScanState,
    /// Rows the cursor moves past; zero when the row must be re-examined in
    /// the next state.
    pub consumed: usize,
    pub emitted: Option<CanonicalRecord>,
}

impl Step {
    fn advance(next: ScanState) -> Self {
        Self {
            next,
            consumed: 1,
            emitted: None,
        }
    }

    fn hold(next: ScanState) -> Self {
        Self {
            next,
            consumed: 0,
            emitted: None,
        }
    }

    fn emit(mut self, record: CanonicalRecord) -> Self {
        self.emitted = Some(record);
        self
    }
}

/// Transition for the row under the cursor; `None` means the rows are
/// exhausted.
#[must_use]
pub fn step(state: ScanState, row: Option<&NormalizedRow>) -> Step {
    match (state, row) {
        (ScanState::Terminal, _) => Step::hold(ScanState::Terminal),
        (ScanState::Absorbing(record), None) => Step::hold(ScanState::Terminal).emit(record),
        (_, None) => Step::hold(ScanState::Terminal),
        (ScanState::SeekingHeader, Some(row)) => {
            if is_header(row) {
                Step::advance(ScanState::ScanningBody)
            } else {
                Step::advance(ScanState::SeekingHeader)
            }
        }
        (ScanState::ScanningBody, Some(row)) => match classify(row) {
            RowKind::Blank | RowKind::BroughtForward | RowKind::Noise => {
                Step::advance(ScanState::ScanningBody)
            }
            RowKind::CarriedForward => Step::advance(ScanState::Terminal),
            RowKind::Primary => Step::advance(ScanState::Absorbing(open_record(row))),
        },
        (ScanState::Absorbing(mut record), Some(row)) => {
            if is_continuation(row) {
                if let Some(line) = row.get(Column::Details) {
                    append_details(&mut record, line);
                }
                Step::advance(ScanState::Absorbing(record))
            } else {
                Step::hold(ScanState::ScanningBody).emit(record)
            }
        }
    }
}

/// Transient state for one table; dropped once the table is scanned.
#[derive(Debug, Default)]
struct TableScanState {
    header_index: Option<usize>,
    cursor: usize,
    records: Vec<CanonicalRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOutcome {
    /// No row starting with `Date`; the table contributes nothing.
    NoHeader,
    Scanned(TableScan),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableScan {
    pub records: Vec<CanonicalRecord>,
    /// Non-blank rows left unread after a `Carried Forward` marker.
    pub discarded_rows: usize,
}

#[must_use]
pub fn reconstruct_table(rows: &[NormalizedRow]) -> TableOutcome {
    let mut scan = TableScanState::default();
    let mut state = ScanState::SeekingHeader;

    while state != ScanState::Terminal {
        let was_seeking = state == ScanState::SeekingHeader;
        let Step {
            next,
            consumed,
            emitted,
        } = step(state, rows.get(scan.cursor));

        if was_seeking && next == ScanState::ScanningBody {
            scan.header_index = Some(scan.cursor);
        }
        scan.records.extend(emitted);
        scan.cursor += consumed;
        state = next;
    }

    if scan.header_index.is_none() {
        return TableOutcome::NoHeader;
    }

    let discarded_rows = rows
        .get(scan.cursor..)
        .unwrap_or_default()
        .iter()
        .filter(|row| !row.is_blank())
        .count();

    TableOutcome::Scanned(TableScan {
        records: scan.records,
        discarded_rows,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{
        RowKind, ScanState, TableOutcome, classify, is_continuation, reconstruct_table, step,
    };
    use crate::model::{CanonicalRecord, NormalizedRow};
    use crate::normalize::normalize;

    fn row(cells: &[Option<&str>]) -> NormalizedRow {
        normalize(cells)
    }

    fn header() -> NormalizedRow {
        row(&[
            Some("Date"),
            Some("Details"),
            Some("Debit"),
            Some("Credit"),
            Some("Balance"),
        ])
    }

    fn blank() -> NormalizedRow {
        row(&[None, None, None, None, None])
    }

    fn details(text: &str) -> NormalizedRow {
        row(&[None, Some(text), None, None, None])
    }

    fn records(outcome: TableOutcome) -> Vec<CanonicalRecord> {
        match outcome {
            TableOutcome::Scanned(scan) => scan.records,
            TableOutcome::NoHeader => panic!("expected a header"),
        }
    }

    fn record(fields: [Option<&str>; 5]) -> CanonicalRecord {
        let [date, details, debit, credit, balance] = fields.map(|f| f.map(str::to_string));
        CanonicalRecord {
            date,
            details,
            debit,
            credit,
            balance,
        }
    }

    #[test]
    fn empty_table_has_no_header() {
        assert_eq!(reconstruct_table(&[]), TableOutcome::NoHeader);
    }

    #[test]
    fn table_without_date_header_is_skipped() {
        let rows = vec![
            row(&[Some("Account"), Some("Summary")]),
            row(&[Some("1/1"), Some("Coffee"), None, Some("5.00"), Some("95.00")]),
        ];
        assert_eq!(reconstruct_table(&rows), TableOutcome::NoHeader);
    }

    #[test]
    fn header_token_is_case_sensitive() {
        let rows = vec![
            row(&[Some("DATE"), Some("Details")]),
            row(&[Some("1/1"), Some("Coffee")]),
        ];
        assert_eq!(reconstruct_table(&rows), TableOutcome::NoHeader);
    }

    #[test]
    fn header_only_table_yields_no_records() {
        let outcome = reconstruct_table(&[header()]);
        assert_eq!(records(outcome), Vec::new());
    }

    #[test]
    fn blank_row_is_skipped_before_primary_row() {
        let rows = vec![
            header(),
            blank(),
            row(&[Some("1/1"), Some("Coffee"), None, Some("5.00"), Some("95.00")]),
        ];
        assert_eq!(
            records(reconstruct_table(&rows)),
            vec![record([Some("1/1"), Some("Coffee"), None, Some("5.00"), Some("95.00")])]
        );
    }

    #[test]
    fn continuation_rows_merge_into_details() {
        let rows = vec![
            header(),
            row(&[Some("2/1"), Some("Transfer"), Some("10.00"), None, Some("85.00")]),
            details("REF 1234"),
            details("To Savings"),
        ];
        assert_eq!(
            records(reconstruct_table(&rows)),
            vec![record([
                Some("2/1"),
                Some("Transfer\nREF 1234\nTo Savings"),
                Some("10.00"),
                None,
                Some("85.00"),
            ])]
        );
    }

    #[test]
    fn absorption_stops_at_next_primary_row() {
        let rows = vec![
            header(),
            row(&[Some("2/1"), Some("Transfer"), Some("10.00"), None, Some("85.00")]),
            details("REF 1234"),
            row(&[Some("3/1"), Some("Salary"), None, Some("500.00"), Some("585.00")]),
            details("ACME LTD"),
        ];
        let out = records(reconstruct_table(&rows));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].details.as_deref(), Some("Transfer\nREF 1234"));
        assert_eq!(out[1].details.as_deref(), Some("Salary\nACME LTD"));
        assert_eq!(out[1].balance.as_deref(), Some("585.00"));
    }

    #[test]
    fn brought_forward_row_is_never_emitted() {
        let rows = vec![
            header(),
            row(&[None, Some("Brought Forward"), None, None, Some("100.00")]),
            row(&[Some("1/1"), Some("Coffee"), None, Some("5.00"), Some("95.00")]),
        ];
        let out = records(reconstruct_table(&rows));
        assert_eq!(out.len(), 1);
        assert!(
            out.iter()
                .all(|r| !r.details.as_deref().unwrap_or("").contains("Brought Forward"))
        );
    }

    #[test]
    fn marker_row_ends_absorption() {
        let rows = vec![
            header(),
            row(&[Some("1/1"), Some("Coffee"), None, Some("5.00"), Some("95.00")]),
            details("Brought Forward"),
            details("stray"),
        ];
        let out = records(reconstruct_table(&rows));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].details.as_deref(), Some("Coffee"));
        assert_eq!(out[1].details.as_deref(), Some("stray"));
    }

    #[test]
    fn carried_forward_terminates_the_table() {
        let rows = vec![
            header(),
            row(&[Some("1/1"), Some("Coffee"), None, Some("5.00"), Some("95.00")]),
            row(&[None, Some("Carried Forward"), None, None, Some("95.00")]),
            row(&[Some("2/1"), Some("Late"), None, Some("1.00"), Some("96.00")]),
            blank(),
        ];
        match reconstruct_table(&rows) {
            TableOutcome::Scanned(scan) => {
                assert_eq!(scan.records.len(), 1);
                assert_eq!(scan.records[0].details.as_deref(), Some("Coffee"));
                assert_eq!(scan.discarded_rows, 1);
            }
            TableOutcome::NoHeader => panic!("expected a header"),
        }
    }

    #[test]
    fn marker_split_across_cells_is_not_a_marker() {
        let split = row(&[None, Some("Brought"), Some("Forward"), None, None]);
        assert_eq!(classify(&split), RowKind::Primary);
    }

    #[test]
    fn marker_in_any_column_takes_precedence_over_primary() {
        let marker = row(&[Some("31/1"), None, None, Some("Carried Forward"), Some("9.00")]);
        assert_eq!(classify(&marker), RowKind::CarriedForward);
    }

    #[test]
    fn noise_rows_between_header_and_data_are_dropped() {
        let rows = vec![
            header(),
            row(&[None, None, Some("0.01"), None, None]),
            row(&[Some("1/1"), Some("Coffee"), None, Some("5.00"), Some("95.00")]),
        ];
        let out = records(reconstruct_table(&rows));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].debit, None);
    }

    #[test]
    fn debit_only_row_is_not_primary() {
        // Known edge case: an amount with no date, details or balance is
        // treated as noise, not as a new record.
        let debit_only = row(&[None, None, Some("12.00"), None, None]);
        assert_eq!(classify(&debit_only), RowKind::Noise);

        let rows = vec![
            header(),
            row(&[Some("1/1"), Some("Coffee"), None, Some("5.00"), Some("95.00")]),
            debit_only,
            details("after amount"),
        ];
        let out = records(reconstruct_table(&rows));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].details.as_deref(), Some("Coffee"));
        assert_eq!(out[1].details.as_deref(), Some("after amount"));
    }

    #[test]
    fn blank_row_ends_absorption() {
        let rows = vec![
            header(),
            row(&[Some("1/1"), Some("Coffee"), None, Some("5.00"), Some("95.00")]),
            blank(),
            details("separate"),
        ];
        let out = records(reconstruct_table(&rows));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].details.as_deref(), Some("Coffee"));
        assert_eq!(out[1].details.as_deref(), Some("separate"));
    }

    #[test]
    fn primary_without_details_takes_continuation_text() {
        let rows = vec![
            header(),
            row(&[Some("4/1"), None, None, None, Some("70.00")]),
            details("Standing order"),
        ];
        let out = records(reconstruct_table(&rows));
        assert_eq!(out[0].details.as_deref(), Some("Standing order"));
        assert_eq!(out[0].date.as_deref(), Some("4/1"));
    }

    #[test]
    fn primary_without_details_or_continuation_keeps_details_absent() {
        let rows = vec![header(), row(&[Some("4/1"), None, None, None, Some("70.00")])];
        assert_eq!(
            records(reconstruct_table(&rows)),
            vec![record([Some("4/1"), None, None, None, Some("70.00")])]
        );
    }

    #[test]
    fn rows_before_header_are_ignored() {
        let rows = vec![
            row(&[Some("1/1"), Some("Preamble"), None, None, Some("1.00")]),
            header(),
            row(&[Some("2/1"), Some("Coffee"), None, Some("5.00"), Some("95.00")]),
        ];
        let out = records(reconstruct_table(&rows));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].details.as_deref(), Some("Coffee"));
    }

    #[test]
    fn continuation_requires_only_details() {
        assert!(is_continuation(&details("x")));
        assert!(!is_continuation(&row(&[None, Some("x"), Some("1.00"), None, None])));
        assert!(!is_continuation(&blank()));
    }

    #[test]
    fn absorbing_holds_cursor_on_stop_row() {
        let open = ScanState::Absorbing(CanonicalRecord::default());
        let next_primary = row(&[Some("1/1"), Some("x"), None, None, None]);
        let out = step(open, Some(&next_primary));
        assert_eq!(out.consumed, 0);
        assert_eq!(out.next, ScanState::ScanningBody);
        assert!(out.emitted.is_some());
    }

    #[test]
    fn end_of_rows_flushes_open_record() {
        let open = ScanState::Absorbing(CanonicalRecord {
            details: Some("x".to_string()),
            ..CanonicalRecord::default()
        });
        let out = step(open, None);
        assert_eq!(out.next, ScanState::Terminal);
        assert_eq!(out.emitted.and_then(|r| r.details), Some("x".to_string()));
    }
}
