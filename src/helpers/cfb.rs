//! OLE Compound File Binary (CFB) reader for legacy Excel (.xls) workbooks.
//! Also used to probe zip-based workbooks that were wrapped in an encrypted CFB envelope.
//!
//! Uploaded files are untrusted, so sector access is bounds-checked and every
//! allocation chain is walked with a step limit to reject cyclic tables.

use crate::error::AttendanceSheetError;
use crate::helpers::string::to_u16;
use crate::helpers::string::to_u64;
use crate::helpers::string::to_usize;
use crate::helpers::string::to_usize_iter;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use thiserror::Error;

const MAX_REG_SECT: usize = 0xFFFF_FFFB;
const SIGNATURE: u64 = 0xE11A_B1A1_E011_CFD0;
const HEADER_SIZE: usize = 512;
const DIRECTORY_ENTRY_SIZE: usize = 128;
const MINI_SECTOR_SIZE: usize = 64;
const MINI_STREAM_CUTOFF: usize = 4096;

/// Errors specific to Compound File Binary format parsing
#[derive(Error, Debug)]
pub enum CfbError {
    #[error("The file is corrupted or has an invalid CFB structure")]
    FileFormatError,

    #[error("Invalid OLE signature (not an office document?)")]
    OleSignatureError,

    #[error("Invalid Sector size '2 ^ {1}' for major version '{0}'")]
    SectorSizeError(u16, u16),

    #[error("The number of double indirect file allocation table error: expect '{0}', actual '{1}'")]
    DoubleIndirectFileAllocationTableError(usize, usize),

    #[error("Sector '{0}' is outside the file")]
    SectorOutOfRangeError(usize),

    #[error("Allocation chain starting at sector '{0}' does not terminate")]
    CyclicChainError(usize),

    #[error("Empty Root directory")]
    RootDirectoryError,
}

/// Returns true when the buffer starts with the OLE compound file signature.
pub(crate) fn has_signature(data: &[u8]) -> bool {
    to_u64(data, 0) == Some(SIGNATURE)
}

/// Compound File Binary structure representing the entire OLE file
pub(crate) struct Cfb {
    /// Directory index mapping stream names to directory entries
    directories: HashMap<String, Directory>,
    /// File allocation table for regular sectors
    file_allocation_table: Vec<usize>,
    /// Regular sectors containing stream data
    sectors: Sectors,
    /// Mini file allocation table for small streams
    mini_file_allocation_table: Vec<usize>,
    /// Mini sectors for small streams (64-byte sectors)
    mini_sectors: Sectors,
}

impl Cfb {
    /// Reads the whole compound file from `reader` and parses its tables.
    /// The reader is left positioned at its start so the same source can be read again.
    pub(crate) fn new<RS: Read + Seek>(reader: &mut RS) -> Result<Cfb, AttendanceSheetError> {
        let size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        let size = usize::try_from(size).map_err(|_| CfbError::FileFormatError)?;
        if size < HEADER_SIZE {
            Err(CfbError::FileFormatError)?;
        }
        let mut data: Vec<u8> = vec![0u8; size];
        reader.read_exact(&mut data)?;
        reader.seek(SeekFrom::Start(0))?;
        Self::from_bytes(data)
    }

    /// Parses a compound file already held in memory.
    pub(crate) fn from_bytes(data: Vec<u8>) -> Result<Cfb, AttendanceSheetError> {
        let header = Header::new(&data)?;
        let sectors = Sectors { data, size: header.sector_size()? };
        let file_allocation_table = Self::load_file_allocation_table(&sectors, &header)?;
        let directories = Self::load_directories(&file_allocation_table, &sectors, header.directory_shift)?;
        let mini_file_allocation_table = Self::load_mini_file_allocation_table(&file_allocation_table, &sectors, &header)?;
        let mini_sectors = match directories.get("Root Entry") {
            Some(root) => Self::load_mini_sectors(&file_allocation_table, &sectors, root)?,
            None => Sectors { data: Vec::new(), size: MINI_SECTOR_SIZE },
        };

        Ok(Cfb {
            directories,
            file_allocation_table,
            sectors,
            mini_file_allocation_table,
            mini_sectors,
        })
    }

    /// Checks if a stream exists in the CFB structure
    pub(crate) fn exists(&self, name: &str) -> bool {
        self.directories.contains_key(name)
    }

    /// Reads the contents of a stream from the CFB structure
    pub(crate) fn read(&self, name: &str) -> Result<Option<Vec<u8>>, AttendanceSheetError> {
        let Some(directory) = self.directories.get(name) else {
            return Ok(None);
        };
        let mut bytes = if directory.count < MINI_STREAM_CUTOFF {
            Self::read_bytes(&self.mini_file_allocation_table, &self.mini_sectors, directory.index)?
        } else {
            Self::read_bytes(&self.file_allocation_table, &self.sectors, directory.index)?
        };
        bytes.truncate(directory.count);
        Ok(Some(bytes))
    }

    /// Loads the file allocation table through the double indirect table (DIFAT).
    fn load_file_allocation_table(sectors: &Sectors, header: &Header) -> Result<Vec<usize>, AttendanceSheetError> {
        let head = sectors.data.get(76..HEADER_SIZE).ok_or(CfbError::FileFormatError)?;
        let mut double_indirect_file_allocation_table: Vec<usize> = to_usize_iter(head).collect();

        let mut count = 0usize;
        let mut index = header.double_indirect_file_allocation_table_shift;
        while index < MAX_REG_SECT {
            if count >= sectors.count() {
                Err(CfbError::CyclicChainError(header.double_indirect_file_allocation_table_shift))?
            }
            double_indirect_file_allocation_table.extend(to_usize_iter(sectors.get(index)?));
            index = double_indirect_file_allocation_table.pop().ok_or(CfbError::FileFormatError)?;
            count += 1;
        }
        if count != header.double_indirect_file_allocation_table_count {
            Err(CfbError::DoubleIndirectFileAllocationTableError(header.double_indirect_file_allocation_table_count, count))?
        }

        let mut file_allocation_table: Vec<usize> = Vec::new();
        for index in double_indirect_file_allocation_table {
            if index < MAX_REG_SECT {
                file_allocation_table.extend(to_usize_iter(sectors.get(index)?));
            }
        }
        if file_allocation_table.is_empty() {
            Err(CfbError::FileFormatError)?
        }
        Ok(file_allocation_table)
    }

    /// Loads directory entries from the chain starting at `index`
    fn load_directories(file_allocation_table: &[usize], sectors: &Sectors, index: usize) -> Result<HashMap<String, Directory>, AttendanceSheetError> {
        let bytes = Self::read_bytes(file_allocation_table, sectors, index)?;
        let directories: HashMap<String, Directory> = bytes
            .chunks_exact(DIRECTORY_ENTRY_SIZE)
            .filter_map(Directory::new)
            .collect();
        if directories.is_empty() {
            Err(CfbError::RootDirectoryError)?
        }
        Ok(directories)
    }

    /// Loads the mini file allocation table for small streams
    fn load_mini_file_allocation_table(file_allocation_table: &[usize], sectors: &Sectors, header: &Header) -> Result<Vec<usize>, AttendanceSheetError> {
        Ok(if header.mini_file_allocation_table_sector_count > 0 {
            let bytes = Self::read_bytes(file_allocation_table, sectors, header.mini_file_allocation_table_sector_shift)?;
            to_usize_iter(&bytes).collect()
        } else {
            Vec::new()
        })
    }

    /// Loads the mini stream, which is stored as the root entry's data
    fn load_mini_sectors(file_allocation_table: &[usize], sectors: &Sectors, root: &Directory) -> Result<Sectors, AttendanceSheetError> {
        let mut data = Self::read_bytes(file_allocation_table, sectors, root.index)?;
        data.truncate(root.count);
        // Mini sectors are addressed from offset zero, unlike regular sectors that skip the header.
        let mut padded = vec![0u8; MINI_SECTOR_SIZE];
        padded.append(&mut data);
        Ok(Sectors { data: padded, size: MINI_SECTOR_SIZE })
    }

    /// Reads a stream by following its allocation chain
    fn read_bytes(file_allocation_table: &[usize], sectors: &Sectors, index: usize) -> Result<Vec<u8>, AttendanceSheetError> {
        let start = index;
        let mut content: Vec<u8> = Vec::new();
        let mut index = index;
        let mut steps = 0usize;
        while index < MAX_REG_SECT {
            if steps > file_allocation_table.len() {
                Err(CfbError::CyclicChainError(start))?
            }
            content.extend_from_slice(sectors.get(index)?);
            index = *file_allocation_table.get(index).ok_or(CfbError::SectorOutOfRangeError(index))?;
            steps += 1;
        }
        Ok(content)
    }
}

/// Container for all sectors in the CFB file.
/// Sector `n` starts at `(n + 1) * size`: the first slot holds the header.
#[derive(Debug)]
struct Sectors {
    data: Vec<u8>,
    size: usize,
}

impl Sectors {
    /// Gets the data for the sector at the specified index
    fn get(&self, index: usize) -> Result<&[u8], CfbError> {
        let source = index
            .checked_add(1)
            .and_then(|slot| slot.checked_mul(self.size))
            .filter(|source| *source < self.data.len())
            .ok_or(CfbError::SectorOutOfRangeError(index))?;
        let target = self.data.len().min(source + self.size);
        Ok(&self.data[source..target])
    }

    /// Number of whole or partial sectors after the header slot
    fn count(&self) -> usize {
        self.data.len().div_ceil(self.size).saturating_sub(1)
    }
}

/// CFB file header structure
#[derive(Debug)]
struct Header {
    major_version: u16,
    sector_shift: u16,
    directory_shift: usize,
    mini_file_allocation_table_sector_shift: usize,
    mini_file_allocation_table_sector_count: usize,
    double_indirect_file_allocation_table_shift: usize,
    double_indirect_file_allocation_table_count: usize,
}

impl Header {
    /// Parses the CFB header from the first 512 bytes of data
    fn new(data: &[u8]) -> Result<Self, CfbError> {
        if !has_signature(data) {
            return Err(CfbError::OleSignatureError);
        }
        let field = |offset: usize| to_usize(data, offset).ok_or(CfbError::FileFormatError);
        let short = |offset: usize| to_u16(data, offset).ok_or(CfbError::FileFormatError);
        Ok(Header {
            major_version: short(26)?,
            sector_shift: short(30)?,
            directory_shift: field(48)?,
            mini_file_allocation_table_sector_shift: field(60)?,
            mini_file_allocation_table_sector_count: field(64)?,
            double_indirect_file_allocation_table_shift: field(68)?,
            double_indirect_file_allocation_table_count: field(72)?,
        })
    }

    /// Calculates the sector size based on major version and sector shift
    fn sector_size(&self) -> Result<usize, CfbError> {
        match (self.major_version, self.sector_shift) {
            (3, 0x0009) => Ok(512),
            // Version 4 pads the 512-byte header with zeroes up to a full 4096-byte sector.
            (4, 0x000C) => Ok(4096),
            _ => Err(CfbError::SectorSizeError(self.major_version, self.sector_shift)),
        }
    }
}

/// Directory entry representing a stream in the CFB structure
#[derive(Debug)]
struct Directory {
    index: usize,
    count: usize,
}

impl Directory {
    /// Creates a directory entry from a 128-byte record; unused slots yield `None`
    fn new(bytes: &[u8]) -> Option<(String, Directory)> {
        let size = usize::from(to_u16(bytes, 64)?).min(64);
        let object_type = *bytes.get(66)?;
        if object_type == 0 {
            return None;
        }
        let (name, _, _) = UTF_16LE.decode(bytes.get(..size)?);
        let name = match name.find('\0') {
            Some(position) => name[..position].to_owned(),
            None => name.to_string(),
        };
        let index = to_usize(bytes, 116)?;
        let count = usize::try_from(to_u64(bytes, 120)?).ok()?;
        Some((name, Directory { index, count }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
    const FREE_SECT: u32 = 0xFFFF_FFFF;
    const FAT_SECT: u32 = 0xFFFF_FFFD;

    fn put_u16(data: &mut [u8], offset: usize, value: u16) {
        data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn put_u32(data: &mut [u8], offset: usize, value: u32) {
        data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn directory_entry(name: &str, object_type: u8, start: u32, size: u64) -> [u8; 128] {
        let mut entry = [0u8; 128];
        let units: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
        for (index, unit) in units.iter().enumerate() {
            put_u16(&mut entry, index * 2, *unit);
        }
        put_u16(&mut entry, 64, (units.len() * 2) as u16);
        entry[66] = object_type;
        put_u32(&mut entry, 116, start);
        entry[120..128].copy_from_slice(&size.to_le_bytes());
        entry
    }

    /// Builds a version 3 compound file holding one stream stored in regular sectors.
    /// The stream must be at least 4096 bytes long.
    pub(crate) fn compound_file(stream_name: &str, stream: &[u8]) -> Vec<u8> {
        assert!(stream.len() >= MINI_STREAM_CUTOFF);
        let stream_sectors = stream.len().div_ceil(512);
        // Sector 0: FAT, sector 1: directory, sectors 2..: stream.
        let total_sectors = 2 + stream_sectors;
        let mut data = vec![0u8; 512 * (total_sectors + 1)];

        data[0..8].copy_from_slice(&SIGNATURE.to_le_bytes());
        put_u16(&mut data, 24, 0x003E);
        put_u16(&mut data, 26, 3);
        put_u16(&mut data, 28, 0xFFFE);
        put_u16(&mut data, 30, 9);
        put_u16(&mut data, 32, 6);
        put_u32(&mut data, 44, 1);
        put_u32(&mut data, 48, 1);
        put_u32(&mut data, 56, MINI_STREAM_CUTOFF as u32);
        put_u32(&mut data, 60, END_OF_CHAIN);
        put_u32(&mut data, 64, 0);
        put_u32(&mut data, 68, END_OF_CHAIN);
        put_u32(&mut data, 72, 0);
        for slot in 0..109 {
            put_u32(&mut data, 76 + slot * 4, if slot == 0 { 0 } else { FREE_SECT });
        }

        let fat = 512;
        for slot in 0..128 {
            put_u32(&mut data, fat + slot * 4, FREE_SECT);
        }
        put_u32(&mut data, fat, FAT_SECT);
        put_u32(&mut data, fat + 4, END_OF_CHAIN);
        for sector in 0..stream_sectors {
            let next = if sector + 1 == stream_sectors { END_OF_CHAIN } else { (3 + sector) as u32 };
            put_u32(&mut data, fat + (2 + sector) * 4, next);
        }

        let directory = 512 * 2;
        data[directory..directory + 128].copy_from_slice(&directory_entry("Root Entry", 5, END_OF_CHAIN, 0));
        data[directory + 128..directory + 256].copy_from_slice(&directory_entry(stream_name, 2, 2, stream.len() as u64));

        let start = 512 * 3;
        data[start..start + stream.len()].copy_from_slice(stream);
        data
    }

    #[test]
    fn reads_stream_from_regular_sectors() {
        let stream: Vec<u8> = (0..5000u32).map(|value| (value % 251) as u8).collect();
        let cfb = Cfb::new(&mut Cursor::new(compound_file("Workbook", &stream))).unwrap();
        assert!(cfb.exists("Workbook"));
        assert!(!cfb.exists("EncryptedPackage"));
        assert_eq!(cfb.read("Workbook").unwrap(), Some(stream));
        assert_eq!(cfb.read("Book").unwrap(), None);
    }

    #[test]
    fn rejects_short_and_unsigned_input() {
        assert!(Cfb::new(&mut Cursor::new(vec![0u8; 100])).is_err());
        assert!(matches!(
            Cfb::from_bytes(vec![0u8; 1024]),
            Err(AttendanceSheetError::CfbHelperError(CfbError::OleSignatureError))
        ));
    }

    #[test]
    fn rejects_cyclic_chain() {
        let stream = vec![7u8; 4096];
        let mut data = compound_file("Workbook", &stream);
        // Point the last stream sector back at the first one.
        let last = 2 + 4096 / 512 - 1;
        put_u32(&mut data, 512 + last * 4, 2);
        let cfb = Cfb::from_bytes(data).unwrap();
        assert!(matches!(
            cfb.read("Workbook"),
            Err(AttendanceSheetError::CfbHelperError(CfbError::CyclicChainError(2)))
        ));
    }

    #[test]
    fn detects_signature() {
        let stream = vec![0u8; 4096];
        assert!(has_signature(&compound_file("Workbook", &stream)));
        assert!(!has_signature(b"PK\x03\x04"));
    }
}
