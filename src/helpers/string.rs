//! Little-endian conversions for reading numeric fields out of binary workbook data.
//!
//! Every reader takes an offset into a buffer and returns `None` when the field would
//! run past the end, so truncated or hostile files surface as errors instead of panics.

/// Reads the `N` bytes at `offset`, if they are all present.
#[inline]
fn take<const N: usize>(bytes: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    bytes.get(offset..end)?.try_into().ok()
}

#[inline]
pub(crate) fn to_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    take(bytes, offset).map(u16::from_le_bytes)
}

#[inline]
pub(crate) fn to_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    take(bytes, offset).map(u32::from_le_bytes)
}

#[inline]
pub(crate) fn to_u64(bytes: &[u8], offset: usize) -> Option<u64> {
    take(bytes, offset).map(u64::from_le_bytes)
}

#[inline]
pub(crate) fn to_f64(bytes: &[u8], offset: usize) -> Option<f64> {
    take(bytes, offset).map(f64::from_le_bytes)
}

/// Reads a 32-bit field as `usize`.
#[inline]
pub(crate) fn to_usize(bytes: &[u8], offset: usize) -> Option<usize> {
    to_u32(bytes, offset).and_then(|value| usize::try_from(value).ok())
}

/// Splits a byte slice into consecutive 32-bit little-endian values.
/// A trailing partial chunk is ignored.
pub(crate) fn to_usize_iter(bytes: &[u8]) -> impl Iterator<Item = usize> + '_ {
    bytes
        .chunks_exact(4)
        .filter_map(|chunk| to_usize(chunk, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_fields() {
        let bytes = [0x34, 0x12, 0x78, 0x56, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(to_u16(&bytes, 0), Some(0x1234));
        assert_eq!(to_u32(&bytes, 0), Some(0x5678_1234));
        assert_eq!(to_u64(&bytes, 0), Some(0x5678_1234));
    }

    #[test]
    fn out_of_bounds_is_none() {
        let bytes = [1u8, 2, 3];
        assert_eq!(to_u16(&bytes, 2), None);
        assert_eq!(to_u32(&bytes, 0), None);
        assert_eq!(to_u16(&bytes, usize::MAX), None);
    }

    #[test]
    fn iterates_whole_chunks_only() {
        let bytes = [1u8, 0, 0, 0, 2, 0, 0, 0, 9];
        assert_eq!(to_usize_iter(&bytes).collect::<Vec<_>>(), vec![1, 2]);
    }
}
