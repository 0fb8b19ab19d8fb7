//! Microsoft Office Binary Interchange File Format (BIFF8)
//! Reader for the record stream inside Excel 97-2003 workbooks (.xls files)
//! Handles the record-based binary format, including CONTINUE records

use crate::error::AttendanceSheetError;
use crate::helpers::string::to_f64;
use crate::helpers::string::to_u16;
use crate::helpers::string::to_u32;
use crate::helpers::string::to_u64;
use crate::helpers::string::to_usize;
use encoding_rs::Encoding;
use encoding_rs::UTF_16LE;
use thiserror::Error;

const CONTINUE: u16 = 60;

/// Errors specific to BIFF8 format parsing
#[derive(Error, Debug)]
pub enum Biff8Error {
    #[error("Fewer than {0} bytes remaining")]
    NoEnoughDataError(usize),
}

/// Reader for BIFF8 (Excel 97-2003) binary format
/// Handles the record-based structure with continuation records
pub(crate) struct Biff8Reader {
    /// Encoding for compressed 8-bit strings, taken from the CODEPAGE record
    pub(crate) encoding: &'static Encoding,
    buffer: Vec<u8>,
    pointer: usize, // Next read position in buffer
    chunks: Vec<(usize, usize)>, // Current record chunks (start, end)
    index: usize,  // Current chunk index
    offset: usize, // Offset within current chunk
}

impl Biff8Reader {
    /// Creates a new BIFF8 reader with the given data buffer
    pub(crate) fn new(data: Vec<u8>) -> Biff8Reader {
        Biff8Reader {
            encoding: UTF_16LE,
            buffer: data,
            pointer: 0,
            chunks: Vec::new(),
            index: 0,
            offset: 0,
        }
    }

    /// Reads the next record type and prepares for reading record data.
    /// Returns None when no more records are available.
    /// A record whose declared size runs past the stream is clipped to the stream end.
    pub(crate) fn next(&mut self) -> Result<Option<u16>, AttendanceSheetError> {
        if self.pointer + 4 > self.buffer.len() {
            return Ok(None);
        }
        self.index = 0;
        self.offset = 0;

        let kind = self.get_u16_at(self.pointer)?;
        let (lower, upper) = self.record_bounds(self.pointer)?;
        self.pointer = upper;

        self.chunks.clear();
        self.chunks.push((lower, upper));
        while self.pointer + 4 <= self.buffer.len() && self.get_u16_at(self.pointer)? == CONTINUE {
            let (lower, upper) = self.record_bounds(self.pointer)?;
            self.pointer = upper;
            self.chunks.push((lower, upper));
        }

        Ok(Some(kind))
    }

    fn record_bounds(&self, pointer: usize) -> Result<(usize, usize), AttendanceSheetError> {
        let size = self.get_u16_at(pointer + 2)? as usize;
        let lower = pointer + 4;
        let upper = self.buffer.len().min(lower + size);
        Ok((lower, upper))
    }

    /// Sets the reader pointer to a specific position
    pub(crate) fn goto(&mut self, pointer: usize) {
        self.pointer = pointer;
    }

    /// Reads exactly `length` bytes, returning an error if insufficient data
    fn read_extract(&mut self, length: usize) -> Result<&[u8], AttendanceSheetError> {
        let (data, size) = self.read(length);
        if size == length {
            Ok(data)
        } else {
            Err(Biff8Error::NoEnoughDataError(length))?
        }
    }

    /// Reads up to `length` bytes from the current record chunk.
    /// Returns the data slice and actual number of bytes read.
    fn read(&mut self, length: usize) -> (&[u8], usize) {
        if let Some((lower, upper)) = self.chunks.get(self.index).copied() {
            let source = upper.min(lower + self.offset);
            let target = upper.min(source + length);
            let size = target - source;
            if source < upper {
                if target == upper {
                    self.index += 1;
                    self.offset = 0;
                } else {
                    self.offset += size;
                }
                return (&self.buffer[source..target], size);
            }
        }
        (&[], 0)
    }

    /// Skips `length` bytes and returns the skipped data
    pub(crate) fn skip(&mut self, length: usize) -> Result<&[u8], AttendanceSheetError> {
        self.read_extract(length)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, AttendanceSheetError> {
        self.read_extract(1).map(|data| data[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, AttendanceSheetError> {
        let data = self.read_extract(2)?;
        Ok(to_u16(data, 0).ok_or(Biff8Error::NoEnoughDataError(2))?)
    }

    /// Gets a 16-bit unsigned integer counted back from the end of the record
    pub(crate) fn get_u16_back(&self, offset: usize) -> Result<u16, AttendanceSheetError> {
        let mut offset = offset;
        for (lower, upper) in self.chunks.iter().rev() {
            if *lower + offset <= *upper {
                return self.get_u16_at(*upper - offset);
            }
            offset -= *upper - *lower;
        }
        Err(Biff8Error::NoEnoughDataError(2))?
    }

    /// Gets a 16-bit unsigned integer from the specified absolute position
    pub(crate) fn get_u16_at(&self, index: usize) -> Result<u16, AttendanceSheetError> {
        Ok(to_u16(&self.buffer, index).ok_or(Biff8Error::NoEnoughDataError(2))?)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, AttendanceSheetError> {
        let data = self.read_extract(4)?;
        Ok(to_u32(data, 0).ok_or(Biff8Error::NoEnoughDataError(4))?)
    }

    pub(crate) fn read_usize(&mut self) -> Result<usize, AttendanceSheetError> {
        let data = self.read_extract(4)?;
        Ok(to_usize(data, 0).ok_or(Biff8Error::NoEnoughDataError(4))?)
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, AttendanceSheetError> {
        let data = self.read_extract(8)?;
        Ok(to_u64(data, 0).ok_or(Biff8Error::NoEnoughDataError(8))?)
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, AttendanceSheetError> {
        let data = self.read_extract(8)?;
        Ok(to_f64(data, 0).ok_or(Biff8Error::NoEnoughDataError(8))?)
    }

    /// Reads an RK number (compressed numeric format used in Excel)
    /// RK numbers can store integers or floats with an optional divide-by-100 flag
    pub(crate) fn read_rk_number(&mut self) -> Result<String, AttendanceSheetError> {
        let value = self.read_u32()?;
        let is_percentage = (value & 0x01) != 0;
        let is_integer = (value & 0x02) != 0;

        let mut value = if is_integer {
            ((value as i32) >> 2) as f64
        } else {
            let value = (value >> 2) as u64;
            f64::from_bits(value << 34)
        };
        if is_percentage {
            value /= 100.0;
        }
        Ok(if is_integer && !is_percentage {
            (value.trunc() as i64).to_string()
        } else {
            value.to_string()
        })
    }

    /// Reads a short Unicode string (1-byte length prefix)
    pub(crate) fn read_short_xl_unicode_string(&mut self) -> Result<String, AttendanceSheetError> {
        let mut string = String::new();
        let chars = self.read_u8()? as usize;
        self.read_string_into(chars, false, &mut string)?;
        Ok(string)
    }

    /// Reads a Unicode string (2-byte length prefix)
    pub(crate) fn read_xl_unicode_string(&mut self) -> Result<String, AttendanceSheetError> {
        let mut string = String::new();
        let chars = self.read_u16()? as usize;
        self.read_string_into(chars, false, &mut string)?;
        Ok(string)
    }

    /// Reads a rich extended Unicode string, which may continue into the next CONTINUE record
    pub(crate) fn read_xl_unicode_rich_extended_string(&mut self) -> Result<String, AttendanceSheetError> {
        let mut string = String::new();
        let mut expected = self.read_u16()? as usize;
        let mut actual = self.read_string_into(expected, true, &mut string)?;
        while actual < expected {
            expected -= actual;
            actual = self.read_string_into(expected, false, &mut string)?;
            if actual == 0 {
                Err(Biff8Error::NoEnoughDataError(expected))?
            }
        }
        Ok(string)
    }

    /// Reads string data into the provided content buffer,
    /// skipping rich text runs and phonetic blocks
    fn read_string_into(&mut self, chars: usize, is_extend: bool, content: &mut String) -> Result<usize, AttendanceSheetError> {
        let encoding = self.encoding;
        let flag = self.read_u8()?;
        let is_high_byte = (flag & 0x1) > 0;
        let expected = Self::chars_to_bytes(is_high_byte, chars);
        let rich_string_count = if is_extend && (flag & 0x8) > 0 {
            self.read_u16()? as usize
        } else {
            0
        };
        let phonetic_count = if is_extend && (flag & 0x4) > 0 {
            self.read_usize()?
        } else {
            0
        };
        let (bytes, actual) = self.read(expected);
        if is_high_byte {
            let (string, _, _) = UTF_16LE.decode(bytes);
            content.push_str(&string);
        } else if encoding == UTF_16LE {
            // Compressed strings hold the low bytes of UTF-16 code units.
            content.extend(bytes.iter().map(|byte| char::from(*byte)));
        } else {
            let (string, _, _) = encoding.decode(bytes);
            content.push_str(&string);
        }
        // Skip rgRun
        self.skip(4 * rich_string_count)?;
        // Skip ExtRst
        self.skip(phonetic_count)?;
        Ok(Self::bytes_to_chars(is_high_byte, actual))
    }

    #[inline]
    fn chars_to_bytes(is_high_byte: bool, chars: usize) -> usize {
        if is_high_byte { chars << 1 } else { chars }
    }

    #[inline]
    fn bytes_to_chars(is_high_byte: bool, bytes: usize) -> usize {
        if is_high_byte { bytes >> 1 } else { bytes }
    }
}

#[macro_export]
macro_rules! match_biff8_record {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(kind) = $reader.next()? {
            match kind {
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encodes one BIFF record: type, length, payload.
    pub(crate) fn record(kind: u16, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(payload.len() + 4);
        bytes.extend_from_slice(&kind.to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn reads_records_and_fields() {
        let mut data = record(0x0203, &[1, 0, 2, 0, 15, 0]);
        data.extend(record(0x000A, &[]));
        let mut reader = Biff8Reader::new(data);
        assert_eq!(reader.next().unwrap(), Some(0x0203));
        assert_eq!(reader.read_u16().unwrap(), 1);
        assert_eq!(reader.read_u16().unwrap(), 2);
        assert_eq!(reader.get_u16_back(2).unwrap(), 15);
        assert_eq!(reader.next().unwrap(), Some(0x000A));
        assert_eq!(reader.next().unwrap(), None);
    }

    #[test]
    fn string_spans_continue_record() {
        // 5 compressed characters, split as "Hel" + CONTINUE(flag, "lo")
        let mut data = record(0x00FC, &[5, 0, 0, b'H', b'e', b'l']);
        data.extend(record(CONTINUE, &[0, b'l', b'o']));
        let mut reader = Biff8Reader::new(data);
        reader.next().unwrap();
        assert_eq!(reader.read_xl_unicode_rich_extended_string().unwrap(), "Hello");
    }

    #[test]
    fn decodes_high_byte_strings() {
        let mut payload = vec![2, 0, 1];
        payload.extend("Né".encode_utf16().flat_map(u16::to_le_bytes));
        let mut reader = Biff8Reader::new(record(0x0204, &payload));
        reader.next().unwrap();
        assert_eq!(reader.read_xl_unicode_string().unwrap(), "Né");
    }

    #[test]
    fn truncated_record_is_an_error_not_a_panic() {
        // Declares 100 bytes but carries 2.
        let mut data = vec![0x03, 0x02, 100, 0];
        data.extend_from_slice(&[1, 0]);
        let mut reader = Biff8Reader::new(data);
        assert_eq!(reader.next().unwrap(), Some(0x0203));
        assert_eq!(reader.read_u16().unwrap(), 1);
        assert!(reader.read_u16().is_err());
    }

    #[test]
    fn reads_rk_numbers() {
        // Integer 42: (42 << 2) | 0x02
        let mut reader = Biff8Reader::new(record(0x027E, &((42u32 << 2) | 0x02).to_le_bytes()));
        reader.next().unwrap();
        assert_eq!(reader.read_rk_number().unwrap(), "42");
    }
}
