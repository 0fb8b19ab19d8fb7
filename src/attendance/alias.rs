//! Column aliases and header resolution.
//!
//! Header texts are compared after [`normalize_header`]. A field is first
//! matched against its exact aliases, in alias order, so `Status` wins over
//! `Remarks` wherever the two columns sit. Only fields left unresolved are then
//! matched by substring, and only when a single unclaimed column qualifies.
//! Each column is claimed by at most one field and each field resolves to at
//! most one column.

use crate::attendance::record::Field;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(unnamed:?\d*(level\d+)?|column\d+|field\d+|nan|none)$").expect("Hardcode regex pattern")
});

/// Header variants per field: (exact aliases by priority, substring aliases), already normalized.
fn aliases(field: Field) -> (&'static [&'static str], &'static [&'static str]) {
    match field {
        Field::EmpCode => (
            &["ecode", "empcode", "employeecode", "empid", "employeeid", "empno", "employeeno", "code", "acno", "userid"],
            &["empcode", "employeecode", "ecode", "empid", "employeeid", "empno"],
        ),
        Field::Name => (
            &["name", "empname", "employeename", "employee", "staffname"],
            &["name"],
        ),
        Field::Shift => (
            &["shift", "shiftcode", "shiftname"],
            &["shift"],
        ),
        Field::InTime => (
            &["intime", "in", "timein", "checkin", "punchin", "firstin", "clockin", "aintime", "actintime", "actualintime"],
            &["intime", "timein", "checkin", "punchin", "clockin"],
        ),
        Field::OutTime => (
            &["outtime", "out", "timeout", "checkout", "punchout", "lastout", "clockout", "aouttime", "actouttime", "actualouttime"],
            &["outtime", "timeout", "checkout", "punchout", "clockout"],
        ),
        Field::Status => (
            &["status", "attendance", "attendancestatus", "remark", "remarks"],
            &["status"],
        ),
        Field::Department => (
            &["department", "dept", "deptname", "departmentname", "section"],
            &["department", "dept"],
        ),
    }
}

/// Lowercases and removes whitespace and `.`, `_`, `-` separators:
/// `"E. Code"`, `"e_code"` and `"ECODE"` all become `"ecode"`.
pub fn normalize_header(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '.' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// True for blank headers and default placeholders such as `Unnamed: 3` or `Column5`.
pub fn is_placeholder(text: &str) -> bool {
    let normalized = normalize_header(text);
    normalized.is_empty() || PLACEHOLDER.is_match(&normalized)
}

/// Maps fields to column indexes for one header row.
///
/// Placeholder columns are never matched. Fields with no matching column are
/// absent from the result.
pub fn resolve(headers: &[String], fields: &[Field]) -> BTreeMap<Field, usize> {
    let columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, header)| !is_placeholder(header))
        .map(|(index, header)| (index, normalize_header(header)))
        .collect();

    let mut resolved = BTreeMap::<Field, usize>::new();
    let mut claimed = vec![false; headers.len()];

    for &field in fields {
        let (exact, _) = aliases(field);
        let found = exact.iter().find_map(|alias| {
            columns
                .iter()
                .find(|(index, header)| !claimed[*index] && header.as_str() == *alias)
                .map(|(index, _)| *index)
        });
        if let Some(index) = found {
            claimed[index] = true;
            resolved.insert(field, index);
        }
    }

    for &field in fields {
        if resolved.contains_key(&field) {
            continue;
        }
        let (_, contains) = aliases(field);
        let candidates: Vec<usize> = columns
            .iter()
            .filter(|(index, header)| !claimed[*index] && contains.iter().any(|alias| header.contains(alias)))
            .map(|(index, _)| *index)
            .collect();
        match candidates.as_slice() {
            [] => {}
            [index] => {
                claimed[*index] = true;
                resolved.insert(field, *index);
            }
            _ => debug!(%field, ?candidates, "ambiguous header substring match, leaving field unresolved"),
        }
    }
    resolved
}
