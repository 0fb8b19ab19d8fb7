use chrono::NaiveDate;
use std::fmt::Display;

/// Known report layouts, in recognition priority order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Free-text dump under an `Original record` column
    LogFormat,
    /// Table with employee code, name, shift, in/out times and status
    FullTabular,
    /// Table with employee code, name, in/out times and status
    BasicTabular,
    /// Table without an employee code column
    NameStatusOnly,
}

impl Layout {
    /// Whether records of this layout carry an employee code.
    pub fn has_emp_code(&self) -> bool {
        matches!(self, Layout::FullTabular | Layout::BasicTabular)
    }

    /// Whether records of this layout carry a status.
    pub fn has_status(&self) -> bool {
        !matches!(self, Layout::LogFormat)
    }
}

impl Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Layout::LogFormat => "log format",
            Layout::FullTabular => "full tabular",
            Layout::BasicTabular => "basic tabular",
            Layout::NameStatusOnly => "name/status only",
        };
        write!(f, "{name}")
    }
}

/// Canonical fields a structured layout maps its columns onto.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    EmpCode,
    Name,
    Shift,
    InTime,
    OutTime,
    Status,
    Department,
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Field::EmpCode => "emp_code",
            Field::Name => "name",
            Field::Shift => "shift",
            Field::InTime => "in_time",
            Field::OutTime => "out_time",
            Field::Status => "status",
            Field::Department => "department",
        };
        write!(f, "{name}")
    }
}

/// One normalized attendance row.
///
/// `in_time <= out_time` holds for log-derived records only; structured
/// layouts pass their source values through unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub emp_code: Option<String>,
    pub name: String,
    pub department: Option<String>,
    pub date: NaiveDate,
    pub in_time: Option<String>,
    pub out_time: Option<String>,
    pub status: Option<String>,
}

/// A non-fatal problem found while extracting records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// A table row was dropped; `row` is the zero-based sheet row
    RowSkipped { row: usize, reason: String },
    /// A log triplet was dropped; `entry` is the index of its person-info entry
    TripletSkipped { entry: usize, reason: String },
    /// No date could be found, the processing date was used
    DateUnresolved { fallback: NaiveDate },
    /// Every configured date cell was empty; the file needs a manual check
    AmbiguousDateCells { cells: Vec<String> },
}

impl Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::RowSkipped { row, reason } => write!(f, "row {} skipped: {reason}", row + 1),
            Warning::TripletSkipped { entry, reason } => write!(f, "log entry {entry} skipped: {reason}"),
            Warning::DateUnresolved { fallback } => write!(f, "report date not found, using {fallback}"),
            Warning::AmbiguousDateCells { cells } => write!(f, "date cells {} are all empty", cells.join(", ")),
        }
    }
}

/// The records of one report sharing one date.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttendanceSummary {
    pub layout: Layout,
    pub date: NaiveDate,
    pub records: Vec<AttendanceRecord>,
    pub warnings: Vec<Warning>,
}

impl AttendanceSummary {
    /// Number of rows or triplets that were dropped.
    pub fn skipped(&self) -> usize {
        self.warnings
            .iter()
            .filter(|warning| matches!(warning, Warning::RowSkipped { .. } | Warning::TripletSkipped { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_columns() {
        assert!(Layout::FullTabular.has_emp_code());
        assert!(!Layout::NameStatusOnly.has_emp_code());
        assert!(!Layout::LogFormat.has_status());
        assert_eq!(Layout::NameStatusOnly.to_string(), "name/status only");
    }

    #[test]
    fn counts_skipped_rows() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 3).unwrap();
        let summary = AttendanceSummary {
            layout: Layout::LogFormat,
            date,
            records: Vec::new(),
            warnings: vec![
                Warning::TripletSkipped { entry: 1, reason: "no times".to_owned() },
                Warning::DateUnresolved { fallback: date },
                Warning::RowSkipped { row: 6, reason: "empty key".to_owned() },
            ],
        };
        assert_eq!(summary.skipped(), 2);
        assert_eq!(summary.warnings[2].to_string(), "row 7 skipped: empty key");
        assert_eq!(summary.warnings[1].to_string(), "report date not found, using 2025-07-03");
    }
}
