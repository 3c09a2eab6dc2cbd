//! Per-member file records.
//!
//! ```text
//! [u64 LE]   offset: bytes from the start of this field to the end of the record
//! [cstr]     member path
//! [2 bytes]  format code, 00 00 = stored
//! [u64 LE]   payload length
//! [length]   payload
//! [u32 LE]   CRC-32 of the payload
//! ```
//!
//! `offset` is a skip distance, not an absolute position: a reader that
//! remembers where the field started can jump to the next record without
//! looking at the payload.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::fmt;
use std::io::{self, Read, Seek, Write};
use tracing::debug;

use crate::checksum::Crc32Writer;
use crate::error::{Result, ZarError};
use crate::mark::StreamMark;
use crate::wire::{cstring_len, read_path, write_cstring};

/// Bytes of a record that do not depend on path or payload:
/// offset + format + length + checksum.
pub const FIXED_OVERHEAD: u64 = 8 + 2 + 8 + 4;

/// Two-byte storage method tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FormatCode(pub [u8; 2]);

impl FormatCode {
    /// Payload written verbatim.
    pub const STORED: FormatCode = FormatCode([0x00, 0x00]);
    /// Placeholder carried by a record that has not been written yet.
    pub const UNSET: FormatCode = FormatCode([0xFF, 0xFF]);

    pub fn is_stored(self) -> bool {
        self == Self::STORED
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::STORED => "stored",
            Self::UNSET => "unset",
            _ => "unknown",
        }
    }
}

impl fmt::Display for FormatCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", hex::encode(self.0), self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub offset:   u64,
    pub path:     String,
    pub format:   FormatCode,
    pub length:   u64,
    pub checksum: u32,
}

impl FileRecord {
    /// A stub: path only, everything else zeroed and the format unset.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            offset:   0,
            path:     path.into(),
            format:   FormatCode::UNSET,
            length:   0,
            checksum: 0,
        }
    }

    /// Bytes from the start of the `offset` field to the first payload byte.
    pub fn header_len(&self) -> u64 {
        8 + cstring_len(&self.path) + 2 + 8
    }

    /// What `offset` must be for this path and payload length.
    pub fn span(&self) -> u64 {
        FIXED_OVERHEAD + cstring_len(&self.path) + self.length
    }

    /// Copy `source` into the record and write it out.
    ///
    /// The payload is staged in memory so that `length` and `offset` are
    /// known before the first byte reaches `writer`; the sink is never
    /// seeked. Use [`write_sized`](Self::write_sized) when the length is
    /// already known.
    pub fn write<W: Write, R: Read>(&mut self, writer: W, mut source: R) -> Result<()> {
        let mut staging = Vec::new();
        source.read_to_end(&mut staging)?;
        let length = staging.len() as u64;
        self.write_sized(writer, staging.as_slice(), length)
    }

    /// Stream exactly `length` bytes of `source` into the record.
    ///
    /// The header goes out first, so a source that ends before `length`
    /// bytes leaves a broken record behind and fails. Bytes past `length`
    /// are not read.
    pub fn write_sized<W: Write, R: Read>(&mut self, mut writer: W, source: R, length: u64) -> Result<()> {
        self.format = FormatCode::STORED;
        self.length = length;
        self.offset = self.span();
        self.write_header(&mut writer)?;

        let mut sink = Crc32Writer::new(&mut writer);
        io::copy(&mut source.take(length), &mut sink)?;
        let copied = sink.bytes_written();
        if copied != length {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{}: source ended after {copied} of {length} bytes", self.path),
            )
            .into());
        }
        self.checksum = sink.checksum();
        debug!(path = %self.path, length = self.length, checksum = self.checksum, offset = self.offset,
               "wrote file record");

        writer.write_u32::<LittleEndian>(self.checksum)?;
        Ok(())
    }

    pub fn write_header<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_u64::<LittleEndian>(self.offset)?;
        write_cstring(&mut writer, &self.path)?;
        writer.write_all(&self.format.0)?;
        writer.write_u64::<LittleEndian>(self.length)?;
        Ok(())
    }

    /// Read everything up to the payload. `checksum` is left at zero and the
    /// stream is left on the first payload byte.
    pub fn read_header<R: Read>(mut reader: R) -> Result<Self> {
        let offset = reader.read_u64::<LittleEndian>()?;
        let path = read_path(&mut reader)?;
        let mut format = [0u8; 2];
        reader.read_exact(&mut format)?;
        let length = reader.read_u64::<LittleEndian>()?;

        let record = Self { offset, path, format: FormatCode(format), length, checksum: 0 };
        let span = FIXED_OVERHEAD
            .checked_add(cstring_len(&record.path))
            .and_then(|n| n.checked_add(length));
        if span != Some(offset) {
            return Err(ZarError::RecordSizeMismatch {
                path:     record.path,
                declared: offset,
                actual:   span.unwrap_or(u64::MAX),
            });
        }
        Ok(record)
    }

    /// Read a complete record's metadata, skipping over its payload.
    /// Leaves the stream at the start of the next record.
    pub fn read<R: Read + Seek>(mut reader: R) -> Result<Self> {
        let mut record = Self::read_header(&mut reader)?;
        StreamMark::capture(&mut reader)?.seek_past(&mut reader, record.length)?;
        record.checksum = reader.read_u32::<LittleEndian>()?;
        Ok(record)
    }
}
