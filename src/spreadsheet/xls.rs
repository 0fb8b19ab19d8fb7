use crate::error::AttendanceSheetError;
use crate::error::ResultOptionChain;
use crate::helpers::biff8::Biff8Reader;
use crate::helpers::cfb::Cfb;
use crate::match_biff8_record;
use crate::spreadsheet::cell::to_error_value;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel;
use crate::spreadsheet::excel::load_number_formats;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use either::Either;
use std::collections::HashMap;
use thiserror::Error;

// BIFF8 record type identifiers
const FORMULA: u16 = 6;        // Formula record containing calculation expressions
const EOF: u16 = 10;           // End of file record marking the end of a substream
const DATE1904: u16 = 34;      // Date system flag (1904 vs 1900 base)
const FILE_PASS: u16 = 47;     // File password protection record
const CODE_PAGE: u16 = 66;     // Character encoding specification
const BOUND_SHEET8: u16 = 133; // Worksheet definition and position
const MUL_RK: u16 = 189;       // Multiple RK number records for efficiency
const XF: u16 = 224;           // Extended format record for cell styling
const SST: u16 = 252;          // Shared string table containing repeated text
const LABEL_SST: u16 = 253;    // Label referencing shared string table
const NUMBER: u16 = 515;       // Numeric cell value
const LABEL: u16 = 516;        // Text label cell value
const BOOL_ERR: u16 = 517;     // Boolean or error cell value
const STRING: u16 = 519;       // String value for formula results
const RK: u16 = 638;           // RK number format for compressed numeric storage
const FORMAT: u16 = 1054;      // Custom number format definition
const BOF: u16 = 2057;         // Beginning of file record for substreams

/// Error types specific to XLS parsing
#[derive(Error, Debug)]
pub enum XlsError {
    /// Invalid character encoding code page encountered
    #[error("Invalid Code page '{0}'")]
    CodePageError(u16),

    /// Invalid formula value or structure encountered
    #[error("Invalid Formula value '{0}'")]
    FormulaValueError(u64),

    /// The compound file holds no Workbook or Book stream
    #[error("Missing Workbook stream")]
    MissingWorkbookStream,
}

/// An Excel 97-2003 workbook held in memory
pub(crate) struct XlsSpreadsheet {
    /// BIFF8 reader over the workbook stream
    reader: Biff8Reader,
    /// Shared string table
    shared_strings: Vec<String>,
    /// Number format mappings for cell type detection
    number_formats: Vec<CellType>,
    /// Worksheets with their names and stream positions
    sheets: Vec<(String, usize)>,
}

impl XlsSpreadsheet {
    /// Opens an XLS compound file and reads the workbook globals substream.
    pub(crate) fn open(data: Vec<u8>) -> Result<XlsSpreadsheet, AttendanceSheetError> {
        let cfb = Cfb::from_bytes(data)?;
        if cfb.exists("EncryptedPackage") {
            Err(SpreadsheetError::PasswordProtected)?
        }
        let mut reader = cfb.read("Workbook")
            .ok_none_else(|| cfb.read("Book"))?
            .map(Biff8Reader::new)
            .ok_or(XlsError::MissingWorkbookStream)?;
        let mut is_1904 = false;
        let mut shared_strings = Vec::new();
        let mut custom_formats: HashMap<String, CellType> = HashMap::new();
        let mut format_indexes: Vec<String> = Vec::new();
        let mut sheets: Vec<(String, usize)> = Vec::new();
        match_biff8_record!(reader => {
            EOF => break,
            FILE_PASS => Err(SpreadsheetError::PasswordProtected)?,
            DATE1904 if reader.read_u16()? == 1 => is_1904 = true,
            CODE_PAGE => {
                let code_page = reader.read_u16()?;
                reader.encoding = codepage::to_encoding(code_page).ok_or(XlsError::CodePageError(code_page))?;
            }
            FORMAT => {
                let id = reader.read_u16()?;
                let format = reader.read_xl_unicode_string()?;
                custom_formats.insert(
                    id.to_string(),
                    CellType::parse_custom_number_format(format.as_ref(), is_1904),
                );
            }
            XF => {
                reader.skip(2)?;
                let id = reader.read_u16()?;
                format_indexes.push(id.to_string());
            }
            SST => shared_strings = load_shared_strings(&mut reader)?,
            BOUND_SHEET8 => {
                let pointer = reader.read_usize()?;
                let _visibility = reader.read_u8()?;
                let sheet_type = reader.read_u8()?;
                let sheet_name = reader.read_short_xl_unicode_string()?;
                // Chart, macro and VBA sheets carry no cells
                if sheet_type == 0 {
                    sheets.push((sheet_name, pointer));
                }
            }
        });
        if sheets.is_empty() {
            Err(SpreadsheetError::EmptyWorkbook)?
        }

        let number_formats = load_number_formats(format_indexes, custom_formats, is_1904);

        Ok(XlsSpreadsheet {
            reader,
            shared_strings,
            number_formats,
            sheets,
        })
    }
}

impl Spreadsheet for XlsSpreadsheet {
    /// The SST record is read with the workbook globals.
    fn load_shared_strings(&mut self) -> Result<Vec<String>, AttendanceSheetError> {
        Ok(std::mem::take(&mut self.shared_strings))
    }

    fn read_first_sheet(&mut self) -> Result<(String, Vec<Cell>), AttendanceSheetError> {
        let (sheet_name, pointer) = self.sheets.first()
            .cloned()
            .ok_or(SpreadsheetError::EmptyWorkbook)?;
        let mut cells = Vec::<Cell>::new();
        self.reader.goto(pointer);
        if self.reader.next()? != Some(BOF) {
            Err(SpreadsheetError::CorruptContainer(format!("sheet '{sheet_name}' does not start with BOF")))?
        }
        while let Some(tag) = self.reader.next()? {
            match tag {
                BOF | EOF => break,
                MUL_RK => {
                    let row = self.reader.read_u16()? as usize;
                    let col_lower_bound = self.reader.read_u16()? as usize;
                    let col_upper_bound = self.reader.get_u16_back(2)? as usize;
                    for col in col_lower_bound..=col_upper_bound {
                        let index = self.reader.read_u16()? as usize;
                        let kind = excel::number_format(&self.number_formats, index);
                        let value = self.reader.read_rk_number()?;
                        cells.push(Cell {
                            row,
                            col,
                            kind,
                            value,
                        });
                    }
                }
                BOOL_ERR | NUMBER | RK | LABEL_SST | LABEL | FORMULA => {
                    let row = self.reader.read_u16()? as usize;
                    let col = self.reader.read_u16()? as usize;
                    let (either, value) = match tag {
                        BOOL_ERR => read_bool_or_error_cell(&mut self.reader)?,
                        NUMBER => read_number_cell(&mut self.reader)?,
                        RK => read_rk_cell(&mut self.reader)?,
                        LABEL_SST => read_label_sst_cell(&mut self.reader)?,
                        LABEL => read_label_cell(&mut self.reader)?,
                        _ => read_formula_cell(&mut self.reader)?,
                    };
                    let kind = match either {
                        Either::Left(kind) => kind,
                        Either::Right(index) => excel::number_format(&self.number_formats, index),
                    };
                    if !value.is_empty() {
                        cells.push(Cell {
                            row,
                            col,
                            kind,
                            value,
                        });
                    }
                }
                _ => (),
            }
        }

        Ok((sheet_name, cells))
    }
}

/// Loads the shared string table from the SST record.
fn load_shared_strings(reader: &mut Biff8Reader) -> Result<Vec<String>, AttendanceSheetError> {
    let mut shared_strings: Vec<String> = Vec::new();
    reader.skip(4)?;
    let count = reader.read_usize()?;
    for _ in 0..count {
        let string = reader.read_xl_unicode_rich_extended_string()?;
        shared_strings.push(string);
    }
    Ok(shared_strings)
}

/// BOOL_ERR stores either a boolean or an error code, told apart by a flag byte.
fn read_bool_or_error_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), AttendanceSheetError> {
    reader.skip(2)?;
    let value = reader.read_u8()?;
    let flag = reader.read_u8()?;
    if flag == 0 {
        Ok((Either::Left(CellType::Boolean), value.to_string()))
    } else {
        Ok((Either::Left(CellType::Error), to_error_value(value).to_owned()))
    }
}

fn read_number_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), AttendanceSheetError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_f64()?;
    Ok((Either::Right(index), value.to_string()))
}

fn read_rk_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), AttendanceSheetError> {
    let index = reader.read_u16()? as usize;
    let value = reader.read_rk_number()?;
    Ok((Either::Right(index), value))
}

fn read_label_sst_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), AttendanceSheetError> {
    reader.skip(2)?;
    let value = reader.read_usize()?;
    Ok((Either::Left(CellType::SharedString), value.to_string()))
}

fn read_label_cell(reader: &mut Biff8Reader) -> Result<(Either<CellType, usize>, String), AttendanceSheetError> {
    reader.skip(2)?;
    let value = reader.read_xl_unicode_string()?;
    Ok((Either::Left(CellType::InlineString), value))
}

/// Reads a cached formula result: number, string (from the following STRING record),
/// boolean, error, or empty string.
fn read_formula_cell(
    reader: &mut Biff8Reader,
) -> Result<(Either<CellType, usize>, String), AttendanceSheetError> {
    let index = reader.read_u16()? as usize;
    let formula = reader.read_u64()?;
    let is_number = (formula & 0xFFFF000000000000) != 0xFFFF000000000000;
    let flag = formula & 0xFF;
    if is_number {
        Ok((Either::Right(index), f64::from_bits(formula).to_string()))
    } else if flag == 0 {
        match reader.next()? {
            Some(STRING) => {
                let value = reader.read_xl_unicode_string()?;
                Ok((Either::Left(CellType::InlineString), value))
            }
            _ => Err(XlsError::FormulaValueError(formula))?,
        }
    } else if flag == 1 {
        let value = if (formula & 0xFF0000) > 0 { "1" } else { "0" };
        Ok((Either::Left(CellType::Boolean), value.to_owned()))
    } else if flag == 2 {
        let code = ((formula >> 16) & 0xFF) as u8;
        Ok((Either::Left(CellType::Error), to_error_value(code).to_owned()))
    } else if flag == 3 {
        Ok((Either::Left(CellType::InlineString), "".to_owned()))
    } else {
        Err(XlsError::FormulaValueError(formula))?
    }
}
