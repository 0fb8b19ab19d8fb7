use crate::attendance::record::Field;
use crate::attendance::record::Layout;

/// Header text that marks a free-text log dump
pub const LOG_MARKER: &str = "Original record";

/// Where to look for one layout and what it must contain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutSpec {
    pub layout: Layout,
    /// Zero-based sheet rows holding the column headers, tried in order
    pub header_offsets: Vec<usize>,
    /// Cells holding the report date as `A1` references, tried in order
    pub date_cells: Vec<String>,
    /// Fields that must all resolve for the layout to match
    pub required: Vec<Field>,
    /// Fields whose presence rules the layout out
    pub forbidden: Vec<Field>,
    /// Fields carried when present
    pub optional: Vec<Field>,
}

impl LayoutSpec {
    /// Header rows observed in exported tables
    const TABLE_HEADER_OFFSETS: [usize; 3] = [4, 5, 0];
    /// Report date cells observed in exported tables
    const TABLE_DATE_CELLS: [&'static str; 2] = ["B2", "E2"];

    fn table(layout: Layout, required: Vec<Field>, forbidden: Vec<Field>) -> Self {
        LayoutSpec {
            layout,
            header_offsets: Self::TABLE_HEADER_OFFSETS.to_vec(),
            date_cells: Self::TABLE_DATE_CELLS.iter().map(|cell| cell.to_string()).collect(),
            required,
            forbidden,
            optional: vec![Field::Department],
        }
    }

    /// The `Original record` text dump; its header is always the first row.
    pub fn log() -> Self {
        LayoutSpec {
            layout: Layout::LogFormat,
            header_offsets: vec![0],
            date_cells: Vec::new(),
            required: Vec::new(),
            forbidden: Vec::new(),
            optional: Vec::new(),
        }
    }

    pub fn full_tabular() -> Self {
        Self::table(
            Layout::FullTabular,
            vec![Field::EmpCode, Field::Name, Field::Shift, Field::InTime, Field::OutTime, Field::Status],
            Vec::new(),
        )
    }

    pub fn basic_tabular() -> Self {
        Self::table(
            Layout::BasicTabular,
            vec![Field::EmpCode, Field::Name, Field::InTime, Field::OutTime, Field::Status],
            Vec::new(),
        )
    }

    pub fn name_status_only() -> Self {
        Self::table(
            Layout::NameStatusOnly,
            vec![Field::Name, Field::InTime, Field::OutTime, Field::Status],
            vec![Field::EmpCode],
        )
    }

    /// All built-in layouts, most specific first.
    pub fn defaults() -> Vec<LayoutSpec> {
        vec![Self::log(), Self::full_tabular(), Self::basic_tabular(), Self::name_status_only()]
    }

    /// Every field resolution is attempted for: required, forbidden and optional.
    pub fn fields(&self) -> Vec<Field> {
        let mut fields: Vec<Field> = self.required
            .iter()
            .chain(&self.forbidden)
            .chain(&self.optional)
            .copied()
            .collect();
        fields.sort();
        fields.dedup();
        fields
    }
}
