//! # Attendance Sheet
//!
//! Reads daily attendance reports exported by biometric devices as Excel
//! workbooks and normalizes them into a canonical per-employee summary.
//!
//! ## Features
//!
//! - **Both Excel containers**: legacy `.xls` (BIFF8 in an OLE compound file) and `.xlsx`
//! - **Pure Rust readers**: the first worksheet is decoded directly from the container,
//!   with shared strings, number formats and 1900/1904 date systems
//! - **Layout recognition**: log dumps (`Original record`) plus full, basic and
//!   name/status-only tables with their header row at a configured offset
//! - **Tolerant extraction**: malformed rows are skipped and reported as warnings
//! - **Report date resolution**: fixed date cells, a bounded scan of the report
//!   header, then the processing date as an explicit fallback
//! - **CSV export**: a summary file named after the report date
//!
//! ## Example
//!
//! ```no_run
//! use attendance_sheet::{process_bytes, write_csv, Options};
//!
//! let data = std::fs::read("report.xlsx")?;
//! let summary = process_bytes(&data, "xlsx", &Options::default())?;
//! write_csv(std::io::stdout(), &summary)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod attendance;
mod error;
mod helpers;
mod spreadsheet;

pub use crate::attendance::export::file_name;
pub use crate::attendance::export::write_csv;
pub use crate::attendance::layout::LayoutSpec;
pub use crate::attendance::pipeline::process;
pub use crate::attendance::pipeline::process_bytes;
pub use crate::attendance::pipeline::Options;
pub use crate::attendance::pipeline::ProcessError;
pub use crate::attendance::record::AttendanceRecord;
pub use crate::attendance::record::AttendanceSummary;
pub use crate::attendance::record::Field;
pub use crate::attendance::record::Layout;
pub use crate::attendance::record::Warning;
pub use crate::error::AttendanceSheetError;
pub use crate::spreadsheet::cell::CellValue;
pub use crate::spreadsheet::load_first_sheet;
pub use crate::spreadsheet::sheet::RawSheet;
pub use crate::spreadsheet::Container;
pub use crate::spreadsheet::SpreadsheetError;
