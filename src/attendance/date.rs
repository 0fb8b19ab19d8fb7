//! Report date extraction.
//!
//! Text dates are tried against three grammars in fixed priority order:
//!
//! 1. `day-month name-year`, e.g. `03-Jul-2025` or `03-Jul-25`
//! 2. `year-month-day`, e.g. `2025-07-03` or `2025-7-3`
//! 3. `day/month/year`, e.g. `03/07/2025`
//!
//! Two-digit years pivot at 70: `25` is 2025, `85` is 1985.

use crate::attendance::record::Warning;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::RawSheet;
use chrono::NaiveDate;
use regex::Captures;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;
use tracing::warn;

const DAY_MONTH_NAME_YEAR: &str = r"(\d{1,2})-([A-Za-z]{3,9})-(\d{4}|\d{2})";
const YEAR_MONTH_DAY: &str = r"(\d{4})-(\d{1,2})-(\d{1,2})";
const DAY_MONTH_YEAR: &str = r"(\d{1,2})/(\d{1,2})/(\d{4})";

/// A trailing time of day is tolerated after a whole-cell date.
const TIME_SUFFIX: &str = r"(?:[ T]\d{1,2}:\d{2}(?::\d{2}(?:\.\d+)?)?)?";

const MONTHS: [&str; 12] = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];

struct Grammar {
    whole: Regex,
    search: Regex,
    build: fn(&Captures) -> Option<NaiveDate>,
}

impl Grammar {
    fn new(pattern: &str, build: fn(&Captures) -> Option<NaiveDate>) -> Self {
        Grammar {
            whole: Regex::new(&format!(r"^{pattern}{TIME_SUFFIX}$")).expect("Hardcode regex pattern"),
            search: Regex::new(&format!(r"\b{pattern}\b")).expect("Hardcode regex pattern"),
            build,
        }
    }
}

static GRAMMARS: LazyLock<[Grammar; 3]> = LazyLock::new(|| [
    Grammar::new(DAY_MONTH_NAME_YEAR, |captures| {
        date(year(&captures[3])?, month_from_name(&captures[2])?, captures[1].parse().ok()?)
    }),
    Grammar::new(YEAR_MONTH_DAY, |captures| {
        date(captures[1].parse().ok()?, captures[2].parse().ok()?, captures[3].parse().ok()?)
    }),
    Grammar::new(DAY_MONTH_YEAR, |captures| {
        date(captures[3].parse().ok()?, captures[2].parse().ok()?, captures[1].parse().ok()?)
    }),
]);

static LOG_HEADER_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Date:\s*(\d{4})-(\d{1,2})-(\d{1,2})").expect("Hardcode regex pattern")
});

fn date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn year(digits: &str) -> Option<i32> {
    let value = digits.parse::<i32>().ok()?;
    match digits.len() {
        2 if value < 70 => Some(2000 + value),
        2 => Some(1900 + value),
        _ => Some(value),
    }
}

/// Accepts three-letter abbreviations and full English month names.
fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let index = MONTHS.iter().position(|month| lower.starts_with(month))?;
    (lower.len() == 3 || is_full_month_name(&lower)).then_some(index as u32 + 1)
}

fn is_full_month_name(name: &str) -> bool {
    matches!(
        name,
        "january" | "february" | "march" | "april" | "june" | "july" | "august"
            | "september" | "sept" | "october" | "november" | "december"
    )
}

/// Parses a whole cell text as a date, trying each grammar in priority order.
pub fn parse_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    GRAMMARS.iter().find_map(|grammar| {
        grammar.whole.captures(text).and_then(|captures| (grammar.build)(&captures))
    })
}

/// Finds the first date embedded in free text, grammar priority first, then position.
pub fn find_in_text(text: &str) -> Option<NaiveDate> {
    GRAMMARS.iter().find_map(|grammar| {
        grammar.search.captures_iter(text).find_map(|captures| (grammar.build)(&captures))
    })
}

/// Reads a date from one cell: native dates first, then the text grammars.
pub fn from_cell(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Date(date) => Some(*date),
        CellValue::DateTime(datetime) => Some(datetime.date()),
        CellValue::Text(text) => parse_text(text).or_else(|| find_in_text(text)),
        _ => None,
    }
}

/// Extracts the `Date:YYYY-M-D` header of a log dump.
pub fn log_header_date(text: &str) -> Option<NaiveDate> {
    LOG_HEADER_DATE
        .captures_iter(text)
        .find_map(|captures| date(captures[1].parse().ok()?, captures[2].parse().ok()?, captures[3].parse().ok()?))
}

/// Scans the first `rows` rows, all columns, row by row, returning the first date and its position.
pub fn scan_window(sheet: &RawSheet, rows: usize) -> Option<(NaiveDate, (usize, usize))> {
    (0..rows.min(sheet.height())).find_map(|row| {
        sheet.row(row)
            .iter()
            .enumerate()
            .find_map(|(col, cell)| from_cell(cell).map(|date| (date, (row, col))))
    })
}

/// Resolves the report date of a structured sheet.
///
/// Tries the configured date cells in order, then the first `scan_rows` rows,
/// then falls back to `processing_date`. Never fails; fallbacks are reported
/// as warnings.
pub fn resolve_report_date(
    sheet: &RawSheet,
    date_cells: &[String],
    scan_rows: usize,
    processing_date: NaiveDate,
) -> (NaiveDate, Vec<Warning>) {
    let mut warnings = Vec::new();
    let positions: Vec<(usize, usize)> = date_cells
        .iter()
        .filter_map(|reference| reference_to_index(reference))
        .collect();
    for &(row, col) in &positions {
        if let Some(date) = from_cell(sheet.get(row, col)) {
            debug!(cell = %index_to_reference(row, col), %date, "report date from date cell");
            return (date, warnings);
        }
    }

    if !positions.is_empty() && positions.iter().all(|&(row, col)| sheet.get(row, col).is_empty()) {
        warn!(cells = ?date_cells, "all date cells are empty, flagging for manual review");
        warnings.push(Warning::AmbiguousDateCells { cells: date_cells.to_vec() });
    }

    if let Some((date, (row, col))) = scan_window(sheet, scan_rows) {
        debug!(cell = %index_to_reference(row, col), %date, "report date from scan window");
        return (date, warnings);
    }

    warn!(fallback = %processing_date, "report date not found, using processing date");
    warnings.push(Warning::DateUnresolved { fallback: processing_date });
    (processing_date, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn july_3rd() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 3).unwrap()
    }

    #[test]
    fn all_grammars_yield_the_same_date() {
        assert_eq!(parse_text("03-Jul-2025"), Some(july_3rd()));
        assert_eq!(parse_text("2025-07-03"), Some(july_3rd()));
        assert_eq!(parse_text("03/07/2025"), Some(july_3rd()));
        assert_eq!(parse_text(" 2025-7-3 "), Some(july_3rd()));
        assert_eq!(parse_text("3-jul-2025"), Some(july_3rd()));
        assert_eq!(parse_text("03-July-2025"), Some(july_3rd()));
        assert_eq!(parse_text("2025-07-03 00:00:00"), Some(july_3rd()));
    }

    #[test]
    fn two_digit_years_pivot() {
        assert_eq!(parse_text("03-Jul-25"), Some(july_3rd()));
        assert_eq!(parse_text("03-Jul-85"), NaiveDate::from_ymd_opt(1985, 7, 3));
    }

    #[test]
    fn rejects_invalid_dates() {
        assert_eq!(parse_text("31-Feb-2025"), None);
        assert_eq!(parse_text("03-Jux-2025"), None);
        assert_eq!(parse_text("2025-13-01"), None);
        assert_eq!(parse_text("E. Code"), None);
        assert_eq!(parse_text(""), None);
    }

    #[test]
    fn finds_dates_inside_text() {
        assert_eq!(find_in_text("Report Date : 03-Jul-2025 (Thu)"), Some(july_3rd()));
        assert_eq!(find_in_text("From 2025-07-03 to 2025-07-04"), Some(july_3rd()));
        assert_eq!(find_in_text("no date here"), None);
    }

    #[test]
    fn reads_native_and_text_cells() {
        assert_eq!(from_cell(&CellValue::Date(july_3rd())), Some(july_3rd()));
        let datetime = july_3rd().and_time(NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(from_cell(&CellValue::DateTime(datetime)), Some(july_3rd()));
        assert_eq!(from_cell(&CellValue::Text("03/07/2025".to_owned())), Some(july_3rd()));
        assert_eq!(from_cell(&CellValue::Number(45841.0)), None);
        assert_eq!(from_cell(&CellValue::Empty), None);
    }

    #[test]
    fn reads_log_header_date() {
        assert_eq!(log_header_date("Att. Time Date:2025-7-3~2025-7-3 Tabulation"), Some(july_3rd()));
        assert_eq!(log_header_date("Date: 2025-07-03"), Some(july_3rd()));
        assert_eq!(log_header_date("Date:2025-13-3"), None);
        assert_eq!(log_header_date("03-Jul-2025"), None);
    }

    #[test]
    fn scans_window_row_by_row() {
        let sheet = RawSheet::from_rows("s", vec![
            vec!["Attendance Report", ""],
            vec!["", "", "Printed", "03/07/2025"],
            vec!["04/07/2025"],
        ]);
        assert_eq!(scan_window(&sheet, 10), Some((july_3rd(), (1, 3))));
        assert_eq!(scan_window(&sheet, 1), None);
    }

    #[test]
    fn resolves_from_first_configured_cell() {
        let date_cells = vec!["B2".to_owned(), "E2".to_owned()];
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();

        let sheet = RawSheet::from_rows("s", vec![vec![""], vec!["", "03-Jul-2025"]]);
        assert_eq!(resolve_report_date(&sheet, &date_cells, 10, today), (july_3rd(), vec![]));

        let sheet = RawSheet::from_rows("s", vec![vec![""], vec!["", "", "", "", "2025-07-03"]]);
        assert_eq!(resolve_report_date(&sheet, &date_cells, 10, today), (july_3rd(), vec![]));
    }

    #[test]
    fn flags_empty_date_cells_and_falls_back() {
        let date_cells = vec!["B2".to_owned(), "E2".to_owned()];
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();

        let sheet = RawSheet::from_rows("s", vec![vec!["Printed 03/07/2025"]]);
        let (date, warnings) = resolve_report_date(&sheet, &date_cells, 10, today);
        assert_eq!(date, july_3rd());
        assert_eq!(warnings, vec![Warning::AmbiguousDateCells { cells: date_cells.clone() }]);

        let sheet = RawSheet::from_rows("s", vec![vec![""], vec!["", "not a date"]]);
        let (date, warnings) = resolve_report_date(&sheet, &date_cells, 10, today);
        assert_eq!(date, today);
        assert_eq!(warnings, vec![Warning::DateUnresolved { fallback: today }]);
    }
}
