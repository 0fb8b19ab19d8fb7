//! Recognize-then-extract orchestration.

use crate::attendance::layout::LayoutSpec;
use crate::attendance::recognize::recognizers;
use crate::attendance::record::AttendanceSummary;
use crate::error::AttendanceSheetError;
use crate::spreadsheet::load_first_sheet;
use crate::spreadsheet::Container;
use chrono::Local;
use chrono::NaiveDate;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Terminal outcomes of one run. Row-level problems are never errors; they
/// are reported as warnings on the summary.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported file extension '{0}', expected xls or xlsx")]
    UnsupportedExtension(String),

    #[error("Corrupt {container} file: {message}")]
    CorruptContainer { container: Container, message: String },

    #[error("Unrecognized attendance report format")]
    UnrecognizedFormat,

    #[error("Unreadable workbook: {0}")]
    Unreadable(#[source] AttendanceSheetError),
}

/// Settings of one run.
#[derive(Clone, Debug)]
pub struct Options {
    /// Check the container structure before parsing
    pub validate_container: bool,
    /// Date used when a report carries none
    pub processing_date: NaiveDate,
    /// Rows above the header searched for a report date
    pub scan_rows: usize,
    /// Layouts to try, in order
    pub layouts: Vec<LayoutSpec>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            validate_container: true,
            processing_date: Local::now().date_naive(),
            scan_rows: 10,
            layouts: LayoutSpec::defaults(),
        }
    }
}

/// Runs the pipeline over a seekable source, leaving it rewound to the start.
pub fn process<RS: Read + Seek>(reader: &mut RS, extension: &str, options: &Options) -> Result<AttendanceSummary, ProcessError> {
    let data = read_all(reader).map_err(|error| ProcessError::Unreadable(error.into()))?;
    process_bytes(&data, extension, options)
}

fn read_all<RS: Read + Seek>(reader: &mut RS) -> std::io::Result<Vec<u8>> {
    let mut data = Vec::new();
    reader.seek(SeekFrom::Start(0))?;
    reader.read_to_end(&mut data)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(data)
}

/// Runs the pipeline over an in-memory workbook.
pub fn process_bytes(data: &[u8], extension: &str, options: &Options) -> Result<AttendanceSummary, ProcessError> {
    let container = Container::from_extension(extension)
        .ok_or_else(|| ProcessError::UnsupportedExtension(extension.to_owned()))?;

    if options.validate_container {
        container.validate(data).map_err(|error| {
            warn!(%container, %error, "container validation failed");
            ProcessError::CorruptContainer { container, message: error.to_string() }
        })?;
    }

    let sheet = load_first_sheet(data, container).map_err(|error| {
        warn!(%container, %error, "failed to load first worksheet");
        if error.is_container_error() {
            ProcessError::CorruptContainer { container, message: error.to_string() }
        } else {
            ProcessError::Unreadable(error)
        }
    })?;
    debug!(sheet = %sheet.name, rows = sheet.height(), cols = sheet.width(), "loaded sheet");

    for recognizer in recognizers(&options.layouts) {
        debug!(layout = %recognizer.layout(), "trying recognizer");
        if let Some(extractor) = recognizer.recognize(&sheet) {
            info!(layout = %extractor.layout(), "recognized layout");
            return Ok(extractor.extract(&sheet, options));
        }
    }

    warn!(sheet = %sheet.name, "no layout matched");
    Err(ProcessError::UnrecognizedFormat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::record::Layout;
    use crate::attendance::record::Warning;
    use crate::helpers::cfb::tests::compound_file;
    use crate::spreadsheet::xls;
    use crate::spreadsheet::xlsx;
    use std::io::Cursor;

    fn options() -> Options {
        Options {
            processing_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            ..Options::default()
        }
    }

    fn july_3rd() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 3).unwrap()
    }

    fn log_workbook() -> Vec<u8> {
        xlsx::tests::workbook(&[
            vec!["Original record"],
            vec!["Att. Time Date:2025-7-3~2025-7-3 Tabulation:2025-07-04"],
            vec![""],
            vec!["Name:Jane Doe Dept.:Sales"],
            vec!["3"],
            vec!["09:00\n18:05"],
        ])
    }

    fn table_rows() -> Vec<Vec<&'static str>> {
        vec![
            vec!["Daily Attendance Report"],
            vec!["Date", "03-Jul-2025"],
            vec![],
            vec![],
            vec!["E. Code", "Name", "InTime", "OutTime", "Status"],
            vec!["101", "Jane Doe", "09:00", "18:05", "P"],
            vec!["102", "John Roe", "", "", "A"],
        ]
    }

    #[test]
    fn log_format_workbook() {
        let summary = process_bytes(&log_workbook(), "xlsx", &options()).unwrap();
        assert_eq!(summary.layout, Layout::LogFormat);
        assert_eq!(summary.date, july_3rd());
        assert_eq!(summary.records.len(), 1);
        let record = &summary.records[0];
        assert_eq!(record.name, "Jane Doe");
        assert_eq!(record.department.as_deref(), Some("Sales"));
        assert_eq!(record.date, july_3rd());
        assert_eq!(record.in_time.as_deref(), Some("09:00"));
        assert_eq!(record.out_time.as_deref(), Some("18:05"));
    }

    #[test]
    fn structured_workbook_at_offset_four() {
        let summary = process_bytes(&xlsx::tests::workbook(&table_rows()), "xlsx", &options()).unwrap();
        assert_eq!(summary.layout, Layout::BasicTabular);
        assert_eq!(summary.date, july_3rd());
        assert_eq!(summary.records.len(), 2);
        assert!(summary.records.iter().all(|record| record.date == july_3rd()));
        assert_eq!(summary.records[0].emp_code.as_deref(), Some("101"));
        assert!(summary.warnings.is_empty());
    }

    #[test]
    fn structured_xls_workbook() {
        let data = xls::tests::workbook(&table_rows(), &[], &[]);
        let summary = process_bytes(&data, "xls", &options()).unwrap();
        assert_eq!(summary.layout, Layout::BasicTabular);
        assert_eq!(summary.date, july_3rd());
        assert_eq!(summary.records[1].name, "John Roe");
    }

    #[test]
    fn unrecognized_workbook() {
        let data = xlsx::tests::workbook(&[vec!["Quarterly sales"], vec!["Region", "Total"], vec!["North", "12"]]);
        let error = process_bytes(&data, "xlsx", &options()).unwrap_err();
        assert!(matches!(error, ProcessError::UnrecognizedFormat));
    }

    #[test]
    fn corrupt_container_short_circuits() {
        let error = process_bytes(b"this is not a zip file", "xlsx", &options()).unwrap_err();
        assert!(matches!(error, ProcessError::CorruptContainer { container: Container::Xlsx, .. }));

        // Without validation the reader failure is still classified as corruption.
        let unvalidated = Options { validate_container: false, ..options() };
        let error = process_bytes(b"this is not a zip file", "xlsx", &unvalidated).unwrap_err();
        assert!(matches!(error, ProcessError::CorruptContainer { .. }));

        let error = process_bytes(&log_workbook(), "xls", &options()).unwrap_err();
        assert!(matches!(error, ProcessError::CorruptContainer { container: Container::Xls, .. }));
    }

    #[test]
    fn password_protected_is_unreadable() {
        let encrypted = compound_file("EncryptedPackage", &[0u8; 4096]);
        let error = process_bytes(&encrypted, "xlsx", &options()).unwrap_err();
        assert!(matches!(error, ProcessError::Unreadable(_)));
    }

    #[test]
    fn unsupported_extension() {
        let error = process_bytes(&log_workbook(), "csv", &options()).unwrap_err();
        assert!(matches!(error, ProcessError::UnsupportedExtension(extension) if extension == "csv"));
    }

    #[test]
    fn rerunning_yields_identical_output() {
        let data = log_workbook();
        let mut cursor = Cursor::new(data);
        let first = process(&mut cursor, "xlsx", &options()).unwrap();
        assert_eq!(cursor.position(), 0);
        let second = process(&mut cursor, "xlsx", &options()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_date_cells_are_flagged() {
        let mut rows = table_rows();
        rows[1] = vec!["Printed on 03/07/2025"];
        let summary = process_bytes(&xlsx::tests::workbook(&rows), "xlsx", &options()).unwrap();
        assert_eq!(summary.date, july_3rd());
        assert_eq!(summary.warnings, vec![Warning::AmbiguousDateCells { cells: vec!["B2".to_owned(), "E2".to_owned()] }]);
    }

    #[test]
    fn custom_layouts_restrict_recognition() {
        let only_log = Options { layouts: vec![LayoutSpec::log()], ..options() };
        let error = process_bytes(&xlsx::tests::workbook(&table_rows()), "xlsx", &only_log).unwrap_err();
        assert!(matches!(error, ProcessError::UnrecognizedFormat));
    }
}
