//! Layout recognition.
//!
//! A [`Recognizer`] inspects a loaded sheet at each of its configured header
//! offsets and, on a match, hands back the [`Extractor`] bound to what it found
//! (header row, resolved columns). Recognizers never fail; a non-match is `None`.

use crate::attendance::alias;
use crate::attendance::extract::TableExtractor;
use crate::attendance::layout::LayoutSpec;
use crate::attendance::layout::LOG_MARKER;
use crate::attendance::log::LogExtractor;
use crate::attendance::pipeline::Options;
use crate::attendance::record::AttendanceSummary;
use crate::attendance::record::Layout;
use crate::spreadsheet::sheet::RawSheet;
use tracing::debug;

/// Turns a recognized sheet into normalized records.
pub trait Extractor {
    fn layout(&self) -> Layout;

    /// Extracts every well-formed row; malformed rows become warnings.
    fn extract(&self, sheet: &RawSheet, options: &Options) -> AttendanceSummary;
}

/// Decides whether a sheet has one particular layout.
pub trait Recognizer {
    fn layout(&self) -> Layout;

    fn recognize(&self, sheet: &RawSheet) -> Option<Box<dyn Extractor + '_>>;
}

/// Finds the `Original record` column of a log dump.
pub struct LogRecognizer<'a> {
    spec: &'a LayoutSpec,
}

impl<'a> LogRecognizer<'a> {
    pub fn new(spec: &'a LayoutSpec) -> Self {
        LogRecognizer { spec }
    }
}

impl Recognizer for LogRecognizer<'_> {
    fn layout(&self) -> Layout {
        self.spec.layout
    }

    fn recognize(&self, sheet: &RawSheet) -> Option<Box<dyn Extractor + '_>> {
        self.spec.header_offsets.iter().find_map(|&header_row| {
            let column = sheet.header(header_row)
                .iter()
                .position(|header| header == LOG_MARKER);
            debug!(layout = %self.spec.layout, header_row, matched = column.is_some(), "tried header offset");
            column.map(|column| Box::new(LogExtractor::new(header_row, column)) as Box<dyn Extractor + '_>)
        })
    }
}

/// Matches a table layout by resolving its header row against column aliases.
pub struct TableRecognizer<'a> {
    spec: &'a LayoutSpec,
}

impl<'a> TableRecognizer<'a> {
    pub fn new(spec: &'a LayoutSpec) -> Self {
        TableRecognizer { spec }
    }
}

impl Recognizer for TableRecognizer<'_> {
    fn layout(&self) -> Layout {
        self.spec.layout
    }

    fn recognize(&self, sheet: &RawSheet) -> Option<Box<dyn Extractor + '_>> {
        let fields = self.spec.fields();
        self.spec.header_offsets.iter().find_map(|&header_row| {
            let headers = sheet.header(header_row);
            let columns = alias::resolve(&headers, &fields);
            let missing: Vec<_> = self.spec.required
                .iter()
                .filter(|field| !columns.contains_key(*field))
                .collect();
            let forbidden: Vec<_> = self.spec.forbidden
                .iter()
                .filter(|field| columns.contains_key(*field))
                .collect();
            debug!(layout = %self.spec.layout, header_row, ?missing, ?forbidden, "tried header offset");
            if missing.is_empty() && forbidden.is_empty() {
                Some(Box::new(TableExtractor::new(self.spec, header_row, columns)) as Box<dyn Extractor + '_>)
            } else {
                None
            }
        })
    }
}

/// Builds the recognizers for `layouts`, keeping their order.
pub fn recognizers(layouts: &[LayoutSpec]) -> Vec<Box<dyn Recognizer + '_>> {
    layouts
        .iter()
        .map(|spec| match spec.layout {
            Layout::LogFormat => Box::new(LogRecognizer::new(spec)) as Box<dyn Recognizer + '_>,
            _ => Box::new(TableRecognizer::new(spec)),
        })
        .collect()
}
