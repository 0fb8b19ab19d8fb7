//! Conversion between Excel `A1`-style references and zero-based indexes.

/// Converts column letters (`A`, `AB`) to a zero-based column index.
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for letter in letters.chars() {
        if !letter.is_ascii_alphabetic() {
            return None;
        }
        let digit = (letter.to_ascii_uppercase() as usize) - ('A' as usize) + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
    }
    Some(index - 1)
}

/// Converts a one-based row number (`"1"`) to a zero-based row index.
pub(crate) fn row_to_index(digits: &str) -> Option<usize> {
    digits.parse::<usize>().ok()?.checked_sub(1)
}

/// Parses a reference such as `B2` into zero-based `(row, col)`.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.trim().replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    Some((row_to_index(digits)?, col_to_index(letters)?))
}

/// Formats zero-based `(row, col)` as an `A1`-style reference.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    let mut letters = String::new();
    let mut col = col + 1;
    while col > 0 {
        col -= 1;
        letters.insert(0, char::from(b'A' + (col % 26) as u8));
        col /= 26;
    }
    format!("{letters}{}", row + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_references() {
        assert_eq!(reference_to_index("A1"), Some((0, 0)));
        assert_eq!(reference_to_index("B2"), Some((1, 1)));
        assert_eq!(reference_to_index("$E$2"), Some((1, 4)));
        assert_eq!(reference_to_index("AA10"), Some((9, 26)));
        assert_eq!(reference_to_index("A0"), None);
        assert_eq!(reference_to_index("12"), None);
        assert_eq!(reference_to_index("B"), None);
    }

    #[test]
    fn formats_references() {
        assert_eq!(index_to_reference(0, 0), "A1");
        assert_eq!(index_to_reference(1, 4), "E2");
        assert_eq!(index_to_reference(9, 26), "AA10");
        assert_eq!(index_to_reference(0, 701), "ZZ1");
    }
}
