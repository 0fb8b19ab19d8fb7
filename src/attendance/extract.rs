use crate::attendance::date::resolve_report_date;
use crate::attendance::layout::LayoutSpec;
use crate::attendance::pipeline::Options;
use crate::attendance::recognize::Extractor;
use crate::attendance::record::AttendanceRecord;
use crate::attendance::record::AttendanceSummary;
use crate::attendance::record::Field;
use crate::attendance::record::Layout;
use crate::attendance::record::Warning;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::sheet::RawSheet;
use std::collections::BTreeMap;
use tracing::info;
use tracing::warn;

/// Extracts rows of a recognized table layout.
pub struct TableExtractor<'a> {
    spec: &'a LayoutSpec,
    header_row: usize,
    columns: BTreeMap<Field, usize>,
}

impl<'a> TableExtractor<'a> {
    pub fn new(spec: &'a LayoutSpec, header_row: usize, columns: BTreeMap<Field, usize>) -> Self {
        TableExtractor { spec, header_row, columns }
    }

    /// Trimmed text of one field in a row; `None` when the column is absent or the cell blank.
    fn value(&self, cells: &[CellValue], field: Field) -> Option<String> {
        let cell = cells.get(*self.columns.get(&field)?)?;
        let text = match (field, cell) {
            (Field::InTime | Field::OutTime, CellValue::Time(time)) => time.format("%H:%M").to_string(),
            (Field::InTime | Field::OutTime, CellValue::DateTime(datetime)) => datetime.format("%H:%M").to_string(),
            _ => cell.to_string(),
        };
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_owned())
    }
}

impl Extractor for TableExtractor<'_> {
    fn layout(&self) -> Layout {
        self.spec.layout
    }

    fn extract(&self, sheet: &RawSheet, options: &Options) -> AttendanceSummary {
        let layout = self.spec.layout;
        let scan_rows = options.scan_rows.min(self.header_row);
        let (date, mut warnings) = resolve_report_date(sheet, &self.spec.date_cells, scan_rows, options.processing_date);
        let key = if layout.has_emp_code() { Field::EmpCode } else { Field::Name };

        let mut records = Vec::new();
        for (row, cells) in sheet.rows_below(self.header_row) {
            if cells.iter().all(CellValue::is_empty) {
                continue;
            }
            if self.value(cells, key).is_none() {
                let reason = format!("empty {key}");
                warn!(row = row + 1, %reason, "skipping row");
                warnings.push(Warning::RowSkipped { row, reason });
                continue;
            }
            records.push(AttendanceRecord {
                emp_code: layout.has_emp_code().then(|| self.value(cells, Field::EmpCode)).flatten(),
                name: self.value(cells, Field::Name).unwrap_or_default(),
                department: self.value(cells, Field::Department),
                date,
                in_time: self.value(cells, Field::InTime),
                out_time: self.value(cells, Field::OutTime),
                status: self.value(cells, Field::Status),
            });
        }

        info!(%layout, header_row = self.header_row, %date, records = records.len(), "extracted table");
        AttendanceSummary { layout, date, records, warnings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::alias;
    use chrono::NaiveDate;
    use chrono::NaiveTime;

    fn options() -> Options {
        Options {
            processing_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            ..Options::default()
        }
    }

    fn extract(spec: &LayoutSpec, sheet: &RawSheet, header_row: usize) -> AttendanceSummary {
        let columns = alias::resolve(&sheet.header(header_row), &spec.fields());
        TableExtractor::new(spec, header_row, columns).extract(sheet, &options())
    }

    #[test]
    fn extracts_basic_table_with_date_cell() {
        let spec = LayoutSpec::basic_tabular();
        let sheet = RawSheet::from_rows("s", vec![
            vec!["Daily Attendance"],
            vec!["Date", "03-Jul-2025"],
            vec![],
            vec![],
            vec!["E. Code", "Name", "InTime", "OutTime", "Status"],
            vec!["101", "Jane Doe", "09:00", "18:05", "P"],
            vec!["", "", "", "", ""],
            vec!["102", "John Roe", "", "", "A"],
            vec!["", "Total: 2"],
        ]);
        let summary = extract(&spec, &sheet, 4);
        let date = NaiveDate::from_ymd_opt(2025, 7, 3).unwrap();
        assert_eq!(summary.layout, Layout::BasicTabular);
        assert_eq!(summary.date, date);
        assert_eq!(summary.records.len(), 2);
        assert_eq!(summary.records[0], AttendanceRecord {
            emp_code: Some("101".to_owned()),
            name: "Jane Doe".to_owned(),
            department: None,
            date,
            in_time: Some("09:00".to_owned()),
            out_time: Some("18:05".to_owned()),
            status: Some("P".to_owned()),
        });
        assert_eq!(summary.records[1].in_time, None);
        assert_eq!(summary.warnings, vec![Warning::RowSkipped { row: 8, reason: "empty emp_code".to_owned() }]);
    }

    #[test]
    fn name_status_only_keys_on_name() {
        let spec = LayoutSpec::name_status_only();
        let sheet = RawSheet::from_rows("s", vec![
            vec!["Name", "In Time", "Out Time", "Status", "Department"],
            vec!["Jane Doe", "09:00", "18:05", "P", "Sales"],
            vec!["", "10:00", "", "P", ""],
        ]);
        let summary = extract(&spec, &sheet, 0);
        assert_eq!(summary.records.len(), 1);
        assert_eq!(summary.records[0].emp_code, None);
        assert_eq!(summary.records[0].department.as_deref(), Some("Sales"));
        assert_eq!(summary.skipped(), 1);
        // Header at row 0 leaves no scan window and no date cell.
        assert_eq!(summary.date, options().processing_date);
        assert!(summary.warnings.contains(&Warning::DateUnresolved { fallback: options().processing_date }));
    }

    #[test]
    fn formats_native_cells() {
        let spec = LayoutSpec::basic_tabular();
        let mut sheet = RawSheet::from_rows("s", vec![vec!["E. Code", "Name", "InTime", "OutTime", "Status"]]);
        sheet.push(1, 0, CellValue::Number(101.0));
        sheet.push(1, 1, CellValue::Text(" Jane ".to_owned()));
        sheet.push(1, 2, CellValue::Time(NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
        let out = NaiveDate::from_ymd_opt(2025, 7, 3).unwrap().and_hms_opt(18, 5, 0).unwrap();
        sheet.push(1, 3, CellValue::DateTime(out));
        let summary = extract(&spec, &sheet, 0);
        let record = &summary.records[0];
        assert_eq!(record.emp_code.as_deref(), Some("101"));
        assert_eq!(record.name, "Jane");
        assert_eq!(record.in_time.as_deref(), Some("09:00"));
        assert_eq!(record.out_time.as_deref(), Some("18:05"));
        assert_eq!(record.status, None);
    }

    #[test]
    fn punch_seconds_are_dropped() {
        let spec = LayoutSpec::basic_tabular();
        let mut sheet = RawSheet::from_rows("s", vec![vec!["E. Code", "Name", "InTime", "OutTime", "Status"]]);
        sheet.push(1, 0, CellValue::Text("101".to_owned()));
        sheet.push(1, 1, CellValue::Text("Jane".to_owned()));
        sheet.push(1, 2, CellValue::Time(NaiveTime::from_hms_opt(9, 2, 37).unwrap()));
        let out = NaiveDate::from_ymd_opt(2025, 7, 3).unwrap().and_hms_opt(18, 5, 59).unwrap();
        sheet.push(1, 3, CellValue::DateTime(out));
        let summary = extract(&spec, &sheet, 0);
        assert_eq!(summary.records[0].in_time.as_deref(), Some("09:02"));
        assert_eq!(summary.records[0].out_time.as_deref(), Some("18:05"));
    }
}
