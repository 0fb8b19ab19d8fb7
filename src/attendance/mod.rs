//! # Attendance reports
//!
//! Biometric attendance devices export daily reports in a handful of layouts:
//! a free-text log dump and three tabular variants whose header row sits at a
//! small fixed offset. This module recognizes which layout a loaded sheet has,
//! extracts normalized [`record::AttendanceRecord`]s under a single report
//! date, and writes them out as CSV.
//!
//! Recognizers are tried in the configured order (log first, then the most
//! specific table down to the least), and the first match wins.

pub mod alias;
pub mod date;
pub mod export;
pub mod extract;
pub mod layout;
pub mod log;
pub mod pipeline;
pub mod recognize;
pub mod record;
