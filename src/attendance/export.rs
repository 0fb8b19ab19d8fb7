use crate::attendance::record::AttendanceRecord;
use crate::attendance::record::AttendanceSummary;
use crate::error::AttendanceSheetError;
use chrono::NaiveDate;
use csv::Terminator;
use csv::WriterBuilder;
use std::io::Write;

/// Output column, in the fixed order of the CSV header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Column {
    EmpCode,
    Name,
    Date,
    InTime,
    OutTime,
    Status,
    Department,
}

impl Column {
    fn title(&self) -> &'static str {
        match self {
            Column::EmpCode => "Emp Code",
            Column::Name => "Name",
            Column::Date => "Date",
            Column::InTime => "In Time",
            Column::OutTime => "Out Time",
            Column::Status => "Status",
            Column::Department => "Department",
        }
    }

    fn value(&self, record: &AttendanceRecord) -> String {
        let optional = |value: &Option<String>| value.clone().unwrap_or_default();
        match self {
            Column::EmpCode => optional(&record.emp_code),
            Column::Name => record.name.to_owned(),
            Column::Date => record.date.format("%Y-%m-%d").to_string(),
            Column::InTime => optional(&record.in_time),
            Column::OutTime => optional(&record.out_time),
            Column::Status => optional(&record.status),
            Column::Department => optional(&record.department),
        }
    }
}

/// Columns present for a summary: employee code and status depend on the
/// layout, department on whether any record carries one.
fn columns(summary: &AttendanceSummary) -> Vec<Column> {
    let has_department = summary.records.iter().any(|record| record.department.is_some());
    [
        (Column::EmpCode, summary.layout.has_emp_code()),
        (Column::Name, true),
        (Column::Date, true),
        (Column::InTime, true),
        (Column::OutTime, true),
        (Column::Status, summary.layout.has_status()),
        (Column::Department, has_department),
    ]
    .into_iter()
    .filter_map(|(column, present)| present.then_some(column))
    .collect()
}

/// Header titles of the CSV written for `summary`.
pub fn header(summary: &AttendanceSummary) -> Vec<&'static str> {
    columns(summary).iter().map(Column::title).collect()
}

/// Writes the summary as UTF-8 CSV with a header row.
pub fn write_csv<W: Write>(writer: W, summary: &AttendanceSummary) -> Result<(), AttendanceSheetError> {
    let columns = columns(summary);
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer);
    writer.write_record(columns.iter().map(Column::title))?;
    for record in &summary.records {
        writer.write_record(columns.iter().map(|column| column.value(record)))?;
    }
    writer.flush()?;
    Ok(())
}

/// Download file name embedding the report date, e.g. `summary_2025-07-03.csv`.
pub fn file_name(date: NaiveDate) -> String {
    format!("summary_{}.csv", date.format("%Y-%m-%d"))
}
