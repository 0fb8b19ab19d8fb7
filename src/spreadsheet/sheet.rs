use crate::spreadsheet::cell::CellValue;

/// The first worksheet of a workbook, loaded once as a ragged grid of typed values.
///
/// Rows are zero-based sheet rows. Trailing empty cells are not stored, so
/// [`RawSheet::get`] treats any position past the end of a row as empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawSheet {
    /// Sheet name as declared by the workbook
    pub name: String,
    rows: Vec<Vec<CellValue>>,
}

impl RawSheet {
    /// Largest row count of an Excel worksheet
    const MAX_ROWS: usize = 1_048_576;
    /// Largest column count of an Excel worksheet
    const MAX_COLS: usize = 16_384;

    pub fn new(name: &str) -> Self {
        Self { name: name.to_owned(), rows: Vec::new() }
    }

    /// Builds a sheet from text rows; empty strings become empty cells.
    pub fn from_rows<R, C>(name: &str, rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let mut sheet = Self::new(name);
        for (row, cells) in rows.into_iter().enumerate() {
            for (col, cell) in cells.into_iter().enumerate() {
                let text: String = cell.into();
                if !text.is_empty() {
                    sheet.push(row, col, CellValue::Text(text));
                }
            }
        }
        sheet
    }

    /// Stores a value, growing the grid as needed. Empty values and
    /// positions beyond the worksheet limits are ignored.
    pub fn push(&mut self, row: usize, col: usize, value: CellValue) {
        if value == CellValue::Empty || row >= Self::MAX_ROWS || col >= Self::MAX_COLS {
            return;
        }
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize_with(col + 1, CellValue::default);
        }
        cells[col] = value;
    }

    /// Returns the value at `(row, col)`, or [`CellValue::Empty`] outside the stored data.
    pub fn get(&self, row: usize, col: usize) -> &CellValue {
        const EMPTY: &CellValue = &CellValue::Empty;
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .unwrap_or(EMPTY)
    }

    /// Returns the stored cells of one row; empty for rows past the end.
    pub fn row(&self, row: usize) -> &[CellValue] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of rows up to and including the last non-empty one.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Header texts of `row`, trimmed, one per stored column.
    pub fn header(&self, row: usize) -> Vec<String> {
        self.row(row)
            .iter()
            .map(|cell| cell.to_string().trim().to_owned())
            .collect()
    }

    /// Iterates over the rows strictly below `row` with their indexes.
    pub fn rows_below(&self, row: usize) -> impl Iterator<Item = (usize, &[CellValue])> {
        self.rows
            .iter()
            .enumerate()
            .skip(row.saturating_add(1))
            .map(|(index, cells)| (index, cells.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_ragged_rows() {
        let mut sheet = RawSheet::new("Sheet1");
        sheet.push(2, 3, CellValue::Text("x".to_owned()));
        sheet.push(0, 0, CellValue::Number(1.0));
        sheet.push(5, 5, CellValue::Empty);
        assert_eq!(sheet.height(), 3);
        assert_eq!(sheet.width(), 4);
        assert_eq!(sheet.get(2, 3), &CellValue::Text("x".to_owned()));
        assert_eq!(sheet.get(1, 0), &CellValue::Empty);
        assert_eq!(sheet.get(9, 9), &CellValue::Empty);
        assert_eq!(sheet.row(1).len(), 0);
    }

    #[test]
    fn builds_from_text_rows() {
        let sheet = RawSheet::from_rows("Sheet1", vec![vec![" Name ", "", "Status"], vec!["Ann"]]);
        assert_eq!(sheet.header(0), vec!["Name", "", "Status"]);
        assert_eq!(sheet.rows_below(0).count(), 1);
    }

    #[test]
    fn ignores_cells_beyond_worksheet_limits() {
        let mut sheet = RawSheet::new("Sheet1");
        sheet.push(0, RawSheet::MAX_COLS, CellValue::Bool(true));
        assert_eq!(sheet.height(), 0);
    }
}
