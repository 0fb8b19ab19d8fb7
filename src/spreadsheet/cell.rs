use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use std::fmt::Display;

/// Types of raw cell data in spreadsheet files, before typed conversion.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values (true/false)
    Boolean,
    /// Numeric values
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Time values stored as numbers from 1900 epoch
    NumberTime1900,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// Time values stored as numbers from 1904 epoch
    NumberTime1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// Inline string values
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }),
            _ => None,
        }
    }

    /// Parses custom number format strings to determine cell type.
    /// Analyzes format codes for date/time patterns, ignoring quoted literals and `[...]` sections.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_date = false;
        let mut is_time = false;
        let mut is_color = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_color => is_literal = true,

                ']' if is_color => is_color = false,
                '[' if !is_literal => is_color = true,
                _ if is_literal || is_color => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }

    fn is_1904(&self) -> bool {
        matches!(self, Self::NumberDateTime1904 | Self::NumberDate1904 | Self::NumberTime1904)
    }
}

/// Converts Excel error codes to human-readable error strings.
pub(crate) fn to_error_value(value: u8) -> &'static str {
    match value {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        0x2B => "#GETTING_DATA",
        _ => "#ERROR!",
    }
}

/// A cell as it comes out of a container reader: position, raw type and raw text.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    /// Cell data type
    pub(crate) kind: CellType,
    /// Cell value as string
    pub(crate) value: String,
}

impl Cell {
    /// Converts the raw value to a typed [`CellValue`], resolving shared strings.
    /// Values that do not parse as their declared type are kept as text.
    pub(crate) fn to_value(&self, shared_strings: &[String]) -> CellValue {
        let text = || CellValue::Text(self.value.to_owned());
        match self.kind {
            CellType::Empty => CellValue::Empty,
            CellType::Boolean => CellValue::Bool(self.value == "1" || self.value.eq_ignore_ascii_case("true")),
            CellType::Number => self.value.parse::<f64>().map(CellValue::Number).unwrap_or_else(|_| text()),
            CellType::NumberDate1900 | CellType::NumberDate1904 => self
                .value
                .parse::<f64>()
                .ok()
                .and_then(|serial| serial_to_datetime(serial, self.kind.is_1904()))
                .map(|datetime| CellValue::Date(datetime.date()))
                .unwrap_or_else(text),
            CellType::NumberTime1900 | CellType::NumberTime1904 => self
                .value
                .parse::<f64>()
                .ok()
                .and_then(serial_to_time)
                .map(CellValue::Time)
                .unwrap_or_else(text),
            CellType::NumberDateTime1900 | CellType::NumberDateTime1904 => match self.value.parse::<f64>() {
                Ok(serial) if (0.0..1.0).contains(&serial) => serial_to_time(serial).map(CellValue::Time).unwrap_or_else(text),
                Ok(serial) => serial_to_datetime(serial, self.kind.is_1904()).map(CellValue::DateTime).unwrap_or_else(text),
                Err(_) => text(),
            },
            CellType::IsoDateTime => parse_iso_datetime(&self.value).unwrap_or_else(text),
            CellType::InlineString => text(),
            CellType::SharedString => self
                .value
                .parse::<usize>()
                .ok()
                .and_then(|index| shared_strings.get(index))
                .map(|string| CellValue::Text(string.to_owned()))
                .unwrap_or(CellValue::Empty),
            CellType::Error => CellValue::Error(self.value.to_owned()),
        }
    }
}

/// A typed cell value in a loaded sheet.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    /// Excel error literal such as `#N/A`
    Error(String),
}

impl CellValue {
    /// True for empty cells and for text that is blank after trimming.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(text) => write!(f, "{text}"),
            CellValue::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => write!(f, "{}", *number as i64),
            CellValue::Number(number) => write!(f, "{number}"),
            CellValue::Bool(value) => write!(f, "{value}"),
            CellValue::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            CellValue::Time(time) => write!(f, "{}", format_time(time)),
            CellValue::DateTime(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Error(code) => write!(f, "{code}"),
        }
    }
}

/// Formats a time as `HH:MM`, keeping seconds only when they are present.
fn format_time(time: &NaiveTime) -> String {
    use chrono::Timelike;
    if time.second() == 0 {
        time.format("%H:%M").to_string()
    } else {
        time.format("%H:%M:%S").to_string()
    }
}

/// Converts an Excel serial number to a date and time.
/// Handles the Lotus 1-2-3 leap year bug for the 1900 epoch.
fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial > 2_958_466.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let (epoch, offset) = if is_1904 {
        (NaiveDate::from_ymd_opt(1904, 1, 1)?, 0)
    } else {
        (NaiveDate::from_ymd_opt(1899, 12, 30)?, if days < 60 { 1 } else { 0 })
    };
    let date = epoch.checked_add_signed(Duration::days(days + offset))?;
    Some(date.and_time(serial_to_time(serial.fract())?))
}

/// Converts the fractional part of an Excel serial number to a time of day, rounded to the second.
fn serial_to_time(serial: f64) -> Option<NaiveTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let seconds = (serial.fract() * 86_400.0).round() as u32 % 86_400;
    NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)
}

fn parse_iso_datetime(value: &str) -> Option<CellValue> {
    if value.contains('T') {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(CellValue::DateTime)
    } else {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .map(CellValue::Date)
    }
}
