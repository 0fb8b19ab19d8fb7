use thiserror::Error;

/// Main error type for reading attendance workbooks.
/// Aggregates errors from the standard library, dependencies and internal reader modules.
#[derive(Error, Debug)]
pub enum AttendanceSheetError {
    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    // Third-party library errors
    #[error("{0}")]
    CsvError(#[from] csv::Error),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    CfbHelperError(#[from] crate::helpers::cfb::CfbError),

    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    #[error("{0}")]
    Biff8HelperError(#[from] crate::helpers::biff8::Biff8Error),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    XlsError(#[from] crate::spreadsheet::xls::XlsError),
}

impl AttendanceSheetError {
    /// Returns true when the error means the bytes are not a well-formed container
    /// (broken zip directory, bad OLE header, truncated records), as opposed to a
    /// readable workbook that is merely unusable (empty, password protected).
    pub fn is_container_error(&self) -> bool {
        use crate::spreadsheet::SpreadsheetError as S;
        match self {
            Self::ZipError(_)
            | Self::CfbHelperError(_)
            | Self::Biff8HelperError(_)
            | Self::XmlError(_)
            | Self::XmlEncodingError(_)
            | Self::XmlAttributeError(_)
            | Self::XmlHelperError(_)
            | Self::XlsError(_) => true,
            Self::SpreadsheetError(S::CorruptContainer(_) | S::FileError(_)) => true,
            _ => false,
        }
    }
}

pub(crate) trait ResultOptionChain {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self;
}

impl<T, E> ResultOptionChain for Result<Option<T>, E> {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self {
            Ok(None) => f(),
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::cfb::CfbError;
    use crate::spreadsheet::SpreadsheetError;

    #[test]
    fn ok_none_else_falls_back_only_on_none() {
        let fallback: Result<Option<u8>, ()> = Ok(None).ok_none_else(|| Ok(Some(2)));
        assert_eq!(fallback, Ok(Some(2)));
        let kept: Result<Option<u8>, ()> = Ok(Some(1)).ok_none_else(|| Ok(Some(2)));
        assert_eq!(kept, Ok(Some(1)));
    }

    #[test]
    fn container_errors_are_classified() {
        assert!(AttendanceSheetError::from(CfbError::OleSignatureError).is_container_error());
        assert!(!AttendanceSheetError::from(SpreadsheetError::PasswordProtected).is_container_error());
        assert!(!AttendanceSheetError::from(SpreadsheetError::EmptyWorkbook).is_container_error());
    }
}
