//! # Workbook loading
//!
//! Reads the first worksheet of an Excel workbook, either a legacy `.xls`
//! compound file or an `.xlsx` zip package, into a [`RawSheet`] of typed
//! cell values. Containers can be validated up front so a damaged upload is
//! reported as corrupt instead of failing somewhere inside a reader.

pub(crate) mod cell;
pub(crate) mod excel;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod xls;
pub(crate) mod xlsx;

use crate::error::AttendanceSheetError;
use crate::helpers::cfb;
use crate::helpers::zip::ZipHelper;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::sheet::RawSheet;
use crate::spreadsheet::xls::XlsSpreadsheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use std::fmt::Display;
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;
use zip::ZipArchive;

/// Local file header signature of a zip archive
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

/// Spreadsheet-level errors
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Workbook contains no worksheets")]
    EmptyWorkbook,

    #[error("Workbook is password protected")]
    PasswordProtected,

    #[error("Corrupt container: {0}")]
    CorruptContainer(String),

    #[error("Missing package part '{0}'")]
    FileError(String),
}

/// Container formats a workbook can arrive in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Container {
    /// Excel 97-2003 compound file (`.xls`)
    Xls,
    /// Office Open XML zip package (`.xlsx`)
    Xlsx,
}

impl Container {
    /// Selects the container from a file extension or file name, case-insensitively.
    pub fn from_extension(extension: &str) -> Option<Container> {
        let extension = extension.rsplit('.').next().unwrap_or(extension).trim();
        if extension.eq_ignore_ascii_case("xls") {
            Some(Container::Xls)
        } else if extension.eq_ignore_ascii_case("xlsx") {
            Some(Container::Xlsx)
        } else {
            None
        }
    }

    /// Checks the container structure without parsing any cells.
    ///
    /// An `.xlsx` must start with a zip local file header, open as a zip
    /// archive and hold `xl/workbook.xml`. An `.xls` must carry the compound
    /// file signature. Encrypted packages pass; they are reported as password
    /// protected when loaded.
    pub fn validate(&self, data: &[u8]) -> Result<(), SpreadsheetError> {
        match self {
            Container::Xlsx if excel::is_password_protected(data) => Ok(()),
            Container::Xlsx => {
                if !data.starts_with(ZIP_SIGNATURE) {
                    Err(SpreadsheetError::CorruptContainer("missing zip signature".to_owned()))?
                }
                let zip = ZipArchive::new(Cursor::new(data))
                    .map_err(|error| SpreadsheetError::CorruptContainer(error.to_string()))?;
                if !zip.contains(xlsx::WORKBOOK_PATH) {
                    Err(SpreadsheetError::CorruptContainer(format!("missing {}", xlsx::WORKBOOK_PATH)))?
                }
                Ok(())
            }
            Container::Xls if cfb::has_signature(data) => Ok(()),
            Container::Xls => Err(SpreadsheetError::CorruptContainer("missing compound file signature".to_owned())),
        }
    }
}

impl Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Container::Xls => write!(f, "xls"),
            Container::Xlsx => write!(f, "xlsx"),
        }
    }
}

/// Common interface of the container readers.
pub(crate) trait Spreadsheet {
    /// Loads the shared string table referenced by [`cell::CellType::SharedString`] cells.
    fn load_shared_strings(&mut self) -> Result<Vec<String>, AttendanceSheetError>;

    /// Reads the name and every non-empty cell of the first worksheet.
    fn read_first_sheet(&mut self) -> Result<(String, Vec<Cell>), AttendanceSheetError>;
}

/// Loads sheet index 0 of a workbook into a [`RawSheet`].
pub fn load_first_sheet(data: &[u8], container: Container) -> Result<RawSheet, AttendanceSheetError> {
    let mut spreadsheet: Box<dyn Spreadsheet> = match container {
        Container::Xls => Box::new(XlsSpreadsheet::open(data.to_vec())?),
        Container::Xlsx => Box::new(XlsxSpreadsheet::open(data.to_vec())?),
    };
    let (name, cells) = spreadsheet.read_first_sheet()?;
    let shared_strings = spreadsheet.load_shared_strings()?;
    debug!(sheet = %name, cells = cells.len(), shared_strings = shared_strings.len(), "loaded first worksheet");

    let mut sheet = RawSheet::new(&name);
    for cell in &cells {
        sheet.push(cell.row, cell.col, cell.to_value(&shared_strings));
    }
    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::cfb::tests::compound_file;
    use crate::spreadsheet::cell::CellValue;

    #[test]
    fn selects_container_from_extension() {
        assert_eq!(Container::from_extension("xlsx"), Some(Container::Xlsx));
        assert_eq!(Container::from_extension("XLS"), Some(Container::Xls));
        assert_eq!(Container::from_extension("report.final.xlsx"), Some(Container::Xlsx));
        assert_eq!(Container::from_extension("csv"), None);
        assert_eq!(Container::from_extension(""), None);
    }

    #[test]
    fn validates_xlsx_structure() {
        let workbook = xlsx::tests::workbook(&[vec!["Name"]]);
        assert!(Container::Xlsx.validate(&workbook).is_ok());
        assert!(Container::Xlsx.validate(b"not a zip at all").is_err());
        assert!(Container::Xlsx.validate(b"PK\x03\x04truncated").is_err());
        assert!(Container::Xls.validate(&workbook).is_err());
    }

    #[test]
    fn encrypted_package_passes_validation_but_fails_to_load() {
        let encrypted = compound_file("EncryptedPackage", &[0u8; 4096]);
        assert!(Container::Xlsx.validate(&encrypted).is_ok());
        let error = load_first_sheet(&encrypted, Container::Xlsx).unwrap_err();
        assert!(matches!(error, AttendanceSheetError::SpreadsheetError(SpreadsheetError::PasswordProtected)));
        assert!(!error.is_container_error());
    }

    #[test]
    fn loads_xlsx_into_raw_sheet() {
        let workbook = xlsx::tests::workbook(&[vec!["Original record"], vec![""], vec!["Date:2025-7-3"]]);
        let sheet = load_first_sheet(&workbook, Container::Xlsx).unwrap();
        assert_eq!(sheet.name, "Attendance");
        assert_eq!(sheet.get(0, 0), &CellValue::Text("Original record".to_owned()));
        assert_eq!(sheet.get(1, 0), &CellValue::Empty);
        assert_eq!(sheet.get(2, 0), &CellValue::Text("Date:2025-7-3".to_owned()));
    }

    #[test]
    fn loads_xls_into_raw_sheet() {
        let workbook = xls::tests::workbook(&[vec!["E. Code", "Name"], vec!["101", "Ann"]], &[], &[]);
        assert!(Container::Xls.validate(&workbook).is_ok());
        let sheet = load_first_sheet(&workbook, Container::Xls).unwrap();
        assert_eq!(sheet.header(0), vec!["E. Code", "Name"]);
        assert_eq!(sheet.get(1, 1), &CellValue::Text("Ann".to_owned()));
    }

    #[test]
    fn garbage_is_a_container_error() {
        let error = load_first_sheet(b"garbage", Container::Xlsx).unwrap_err();
        assert!(error.is_container_error());
        let error = load_first_sheet(b"garbage", Container::Xls).unwrap_err();
        assert!(error.is_container_error());
    }
}
