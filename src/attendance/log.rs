//! Free-text log dumps.
//!
//! The sheet holds one text column headed `Original record`. After dropping
//! blank entries, entry 0 carries the report date (`Date:YYYY-M-D`), and the
//! rest repeats in strides of three starting at entry 1:
//!
//! ```text
//! 1: Name:Jane Doe Dept.:Sales      person info
//! 2: 1 2 3 4 ...                    ignored
//! 3: 09:00\n12:31\n18:05            punch times, one per line
//! ```
//!
//! Grammars of the person-info entry:
//!
//! - name: the text between `Name:` and the next `Dept` on the same line, trimmed
//! - department: the non-blank run after `Dept.:`

use crate::attendance::date::log_header_date;
use crate::attendance::pipeline::Options;
use crate::attendance::recognize::Extractor;
use crate::attendance::record::AttendanceRecord;
use crate::attendance::record::AttendanceSummary;
use crate::attendance::record::Layout;
use crate::attendance::record::Warning;
use crate::spreadsheet::sheet::RawSheet;
use chrono::NaiveTime;
use regex::Regex;
use std::sync::LazyLock;
use tracing::info;
use tracing::warn;

/// Placeholder for a missing name or department
pub const UNKNOWN: &str = "Unknown";

static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Name:(.*?)Dept").expect("Hardcode regex pattern"));
static DEPARTMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Dept\.:[ \t]*(\S+)").expect("Hardcode regex pattern"));

/// Extracts the name between the `Name:` and `Dept` markers.
pub fn parse_name(text: &str) -> Option<String> {
    let name = NAME.captures(text)?.get(1)?.as_str().trim();
    (!name.is_empty()).then(|| name.to_owned())
}

/// Extracts the department following the `Dept.:` marker.
pub fn parse_department(text: &str) -> Option<String> {
    Some(DEPARTMENT.captures(text)?.get(1)?.as_str().to_owned())
}

/// Parses one `HH:MM` (or `HH:MM:SS`) token per line, ignoring blank lines.
///
/// Fails on the first token that is not a time, and when there is no token at all.
pub fn parse_times(text: &str) -> Result<Vec<NaiveTime>, String> {
    let times = text
        .split('\n')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            NaiveTime::parse_from_str(token, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(token, "%H:%M:%S"))
                .map_err(|_| format!("invalid time '{token}'"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if times.is_empty() {
        Err("no time entries".to_owned())?
    }
    Ok(times)
}

/// Extracts records from the text column of a log dump.
pub struct LogExtractor {
    header_row: usize,
    column: usize,
}

impl LogExtractor {
    pub fn new(header_row: usize, column: usize) -> Self {
        LogExtractor { header_row, column }
    }

    /// Non-blank texts of the log column below the header.
    fn entries(&self, sheet: &RawSheet) -> Vec<String> {
        sheet.rows_below(self.header_row)
            .filter_map(|(_, cells)| cells.get(self.column))
            .map(|cell| cell.to_string())
            .filter(|text| !text.trim().is_empty())
            .collect()
    }

    fn parse_triplet(person: &str, times: &str, date: chrono::NaiveDate) -> Result<AttendanceRecord, String> {
        let name = parse_name(person);
        let department = parse_department(person);
        if name.is_none() && department.is_none() {
            Err("missing Name and Dept markers".to_owned())?
        }
        let times = parse_times(times)?;
        let in_time = times.iter().min().map(|time| time.format("%H:%M").to_string());
        let out_time = times.iter().max().map(|time| time.format("%H:%M").to_string());
        Ok(AttendanceRecord {
            emp_code: None,
            name: name.unwrap_or_else(|| UNKNOWN.to_owned()),
            department: Some(department.unwrap_or_else(|| UNKNOWN.to_owned())),
            date,
            in_time,
            out_time,
            status: None,
        })
    }
}

impl Extractor for LogExtractor {
    fn layout(&self) -> Layout {
        Layout::LogFormat
    }

    fn extract(&self, sheet: &RawSheet, options: &Options) -> AttendanceSummary {
        let entries = self.entries(sheet);
        let mut warnings = Vec::new();
        let date = match entries.first().and_then(|entry| log_header_date(entry)) {
            Some(date) => date,
            None => {
                warn!(fallback = %options.processing_date, "log header has no date, using processing date");
                warnings.push(Warning::DateUnresolved { fallback: options.processing_date });
                options.processing_date
            }
        };

        let mut records = Vec::new();
        let mut entry = 1;
        while entry + 2 < entries.len() {
            match Self::parse_triplet(&entries[entry], &entries[entry + 2], date) {
                Ok(record) => records.push(record),
                Err(reason) => {
                    warn!(entry, %reason, "skipping log entry");
                    warnings.push(Warning::TripletSkipped { entry, reason });
                }
            }
            entry += 3;
        }

        info!(layout = %Layout::LogFormat, %date, records = records.len(), "extracted log");
        AttendanceSummary { layout: Layout::LogFormat, date, records, warnings }
    }
}
