use crate::error::Result;
use std::io::{Read, Write};
use std::ops::BitOr;
use time::OffsetDateTime;

/// Version tag written after the comment: "PSVDSC_V2.00\n\r\n\r"
pub const VERSION_TAG: [u8; VERSION_SIZE] = *b"PSVDSC_V2.00\n\r\n\r";

/// Comment field size in bytes
pub const COMMENT_SIZE: usize = 256;

/// Version tag size in bytes
pub const VERSION_SIZE: usize = 16;

/// Entry name field size in bytes
pub const NAME_SIZE: usize = 64;

/// Header size in bytes: comment + version + six u32 params
pub const HEADER_SIZE: usize = COMMENT_SIZE + VERSION_SIZE + 6 * 4;

/// Metadata table record size in bytes: name + four u32 fields
pub const ENTRY_SIZE: usize = NAME_SIZE + 4 * 4;

/// Filler for the unused tail of the comment (DOS EOF)
pub const COMMENT_FILL: u8 = 0x1A;

/// Filler for the unused tail of an entry name
pub const NAME_FILL: u8 = 0x20;

/// File attribute bits carried in the `attributes` field
pub const ATTRIB_READ_ONLY: u32 = 1;
pub const ATTRIB_HIDDEN: u32 = 2;
pub const ATTRIB_SYSTEM: u32 = 4;
pub const ATTRIB_ARCHIVE: u32 = 32;
pub const ATTRIB_MASK: u32 = ATTRIB_READ_ONLY | ATTRIB_HIDDEN | ATTRIB_SYSTEM | ATTRIB_ARCHIVE;

/// Entry flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryFlags(u32);

impl EntryFlags {
    pub const NONE: Self = Self(0);
    pub const DIRECTORY: Self = Self(0x8000_0000);
    pub const LAST_ENTRY: Self = Self(0x4000_0000);

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_directory(self) -> bool {
        self.contains(Self::DIRECTORY)
    }

    pub fn is_last_entry(self) -> bool {
        self.contains(Self::LAST_ENTRY)
    }
}

impl BitOr for EntryFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Archive comment: up to 256 bytes, tail filled with 0x1A
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment([u8; COMMENT_SIZE]);

impl Comment {
    /// Encode a comment, truncating to 256 bytes
    pub fn new(text: &str) -> Self {
        let mut buf = [COMMENT_FILL; COMMENT_SIZE];
        let bytes = text.as_bytes();
        let len = bytes.len().min(COMMENT_SIZE);
        buf[..len].copy_from_slice(&bytes[..len]);
        Self(buf)
    }

    pub fn as_bytes(&self) -> &[u8; COMMENT_SIZE] {
        &self.0
    }

    /// Text up to the first filler byte
    pub fn text(&self) -> String {
        let end = self
            .0
            .iter()
            .position(|&b| b == COMMENT_FILL)
            .unwrap_or(COMMENT_SIZE);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl Default for Comment {
    fn default() -> Self {
        Self::new("")
    }
}

/// Entry name: upper-cased, truncated to 64 bytes, space padded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryName([u8; NAME_SIZE]);

impl Default for EntryName {
    fn default() -> Self {
        Self([NAME_FILL; NAME_SIZE])
    }
}

impl EntryName {
    pub fn new(name: &str) -> Self {
        let upper = name.to_uppercase();
        let bytes = upper.as_bytes();
        let len = bytes.len().min(NAME_SIZE);
        let mut buf = [NAME_FILL; NAME_SIZE];
        buf[..len].copy_from_slice(&bytes[..len]);
        Self(buf)
    }

    pub fn as_bytes(&self) -> &[u8; NAME_SIZE] {
        &self.0
    }

    /// Name with trailing padding removed
    pub fn text(&self) -> String {
        let end = self
            .0
            .iter()
            .rposition(|&b| b != NAME_FILL)
            .map_or(0, |i| i + 1);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

/// Header params block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Params {
    pub entry_count: u32,
    pub file_count: u32,
    pub timestamp: u32,
    pub data_size: u32,
    pub table_offset: u32,
    pub entry_size: u32,
}

/// Archive header at the beginning of the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub comment: Comment,
    pub version: [u8; VERSION_SIZE],
    pub params: Params,
}

impl Header {
    pub fn new(comment: Comment, params: Params) -> Self {
        Self {
            comment,
            version: VERSION_TAG,
            params,
        }
    }

    /// Byte offset where the payload region begins
    pub fn payload_offset(&self) -> u64 {
        self.params.table_offset as u64
            + self.params.entry_count as u64 * self.params.entry_size as u64
    }

    /// Write header to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(self.comment.as_bytes())?;
        writer.write_all(&self.version)?;
        writer.write_all(&self.params.entry_count.to_le_bytes())?;
        writer.write_all(&self.params.file_count.to_le_bytes())?;
        writer.write_all(&self.params.timestamp.to_le_bytes())?;
        writer.write_all(&self.params.data_size.to_le_bytes())?;
        writer.write_all(&self.params.table_offset.to_le_bytes())?;
        writer.write_all(&self.params.entry_size.to_le_bytes())?;
        Ok(())
    }

    /// Read header from a reader
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut comment = [0u8; COMMENT_SIZE];
        reader.read_exact(&mut comment)?;

        let mut version = [0u8; VERSION_SIZE];
        reader.read_exact(&mut version)?;

        let params = Params {
            entry_count: read_u32(&mut reader)?,
            file_count: read_u32(&mut reader)?,
            timestamp: read_u32(&mut reader)?,
            data_size: read_u32(&mut reader)?,
            table_offset: read_u32(&mut reader)?,
            entry_size: read_u32(&mut reader)?,
        };

        Ok(Self {
            comment: Comment(comment),
            version,
            params,
        })
    }
}

/// Metadata table record, one per directory or file
///
/// For directories `offset` is the table index of the first child; for
/// files it is the absolute byte offset of the content in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryRecord {
    pub name: EntryName,
    pub offset: u32,
    pub size: u32,
    pub flags: EntryFlags,
    pub attributes: u32,
}

impl EntryRecord {
    /// Write record to the metadata table
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(self.name.as_bytes())?;
        writer.write_all(&self.offset.to_le_bytes())?;
        writer.write_all(&self.size.to_le_bytes())?;
        writer.write_all(&self.flags.bits().to_le_bytes())?;
        writer.write_all(&self.attributes.to_le_bytes())?;
        Ok(())
    }

    /// Read record from the metadata table
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut name = [0u8; NAME_SIZE];
        reader.read_exact(&mut name)?;

        Ok(Self {
            name: EntryName(name),
            offset: read_u32(&mut reader)?,
            size: read_u32(&mut reader)?,
            flags: EntryFlags::from_bits(read_u32(&mut reader)?),
            attributes: read_u32(&mut reader)?,
        })
    }

    pub fn is_directory(&self) -> bool {
        self.flags.is_directory()
    }
}

/// Pack a timestamp into a 32-bit DOS/FAT date-time
///
/// ```text
/// 31      25 24  21 20  16 15  11 10     5 4     0
/// | year-80 | month |  day | hour | minute | sec/2 |
/// ```
///
/// Years are clamped to 1980..=2107, the range of the 7-bit field.
pub fn pack_dos_datetime(timestamp: OffsetDateTime) -> u32 {
    let year = (timestamp.year().clamp(1980, 2107) - 1980) as u32;
    let month = u8::from(timestamp.month()) as u32;
    let day = timestamp.day() as u32;
    let hour = timestamp.hour() as u32;
    let minute = timestamp.minute() as u32;
    let second = timestamp.second() as u32;

    (year << 25) | (month << 21) | (day << 16) | (hour << 11) | (minute << 5) | (second >> 1)
}

fn read_u32<R: Read>(mut reader: R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}
