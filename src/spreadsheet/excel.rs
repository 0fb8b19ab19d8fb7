//! Microsoft Office Excel Helpers
use crate::error::AttendanceSheetError;
use crate::helpers::cfb;
use crate::helpers::cfb::Cfb;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Cursor;
use zip::ZipArchive;

/// XML tag name for relationship elements in Excel files
const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// In-memory workbook package
pub(super) type Package = ZipArchive<Cursor<Vec<u8>>>;

/// Opens an in-memory Excel package and loads its workbook metadata.
///
/// # Returns
/// Tuple containing:
/// - Zip archive handle
/// - Number format mappings
/// - List of sheet names and their paths
pub(super) fn open<W, F>(data: Vec<u8>, load_workbook: W, load_number_formats: F) -> Result<(
    Package,
    Vec<CellType>,
    Vec<(String, String)>
), AttendanceSheetError>
where
    W: Fn(&mut Package) -> Result<(Vec<(String, String)>, bool), AttendanceSheetError>,
    F: Fn(&mut Package, bool) -> Result<Vec<CellType>, AttendanceSheetError>,
{
    // Encrypted packages are OLE compound files, not zip archives
    if is_password_protected(&data) {
        Err(SpreadsheetError::PasswordProtected)?;
    }

    let mut zip = ZipArchive::new(Cursor::new(data))?;
    let (sheets, is_1904) = load_workbook(&mut zip)?;
    if sheets.is_empty() {
        Err(SpreadsheetError::EmptyWorkbook)?
    }

    let number_formats = load_number_formats(&mut zip, is_1904)?;
    Ok((zip, number_formats, sheets))
}

/// Loads worksheet relationships, mapping relationship IDs to worksheet paths.
pub(super) fn load_relationships(zip: &mut Package, path: &str) -> Result<HashMap<String, String>, AttendanceSheetError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Maps format indexes to cell types using custom and built-in formats.
pub(super) fn load_number_formats(format_indexes: Vec<String>, custom_formats: HashMap<String, CellType>, is_1904: bool) -> Vec<CellType> {
    format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect()
}

/// Looks up the cell type for a style index; unknown styles are plain numbers.
pub(super) fn number_format(number_formats: &[CellType], index: usize) -> CellType {
    number_formats.get(index).copied().unwrap_or(CellType::Number)
}

/// Normalizes a relationship target to its path inside the package.
pub(crate) fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(stripped) = path.strip_prefix('/') {
        stripped.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Checks whether the bytes are an encrypted Office package.
pub(super) fn is_password_protected(data: &[u8]) -> bool {
    if !cfb::has_signature(data) {
        return false;
    }
    Cfb::from_bytes(data.to_vec())
        .map(|cfb| cfb.exists("EncryptedPackage"))
        .unwrap_or(false)
}
