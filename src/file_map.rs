//! The file map: a length-prefixed index of member paths at the front of a
//! volume.
//!
//! ```text
//! [u64 LE]  length of everything below (not counting this field)
//! [cstr]    encoding name, "utf-8"
//! repeated until `length` bytes are consumed:
//!   [u64 LE] reserved offset, always 0
//!   [cstr]   member path
//! ```
//!
//! There is no entry count. A reader keeps parsing entries until it has
//! consumed exactly `length` bytes.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use tracing::{debug, trace};

use crate::error::{Result, ZarError};
use crate::wire::{cstring_len, read_cstring, read_path, write_cstring};

/// The only encoding this version writes or accepts.
pub const ENCODING: &str = "utf-8";

/// Width of the reserved per-entry offset.
pub const ENTRY_OFFSET_SIZE: u64 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMapEntry {
    /// Reserved for a future jump table. Always zero in this version and
    /// ignored on read.
    pub offset: u64,
    pub path:   String,
}

impl FileMapEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self { offset: 0, path: path.into() }
    }

    fn encoded_len(&self) -> u64 {
        ENTRY_OFFSET_SIZE + cstring_len(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMap {
    pub encoding: String,
    pub entries:  Vec<FileMapEntry>,
}

impl Default for FileMap {
    fn default() -> Self {
        Self { encoding: ENCODING.to_owned(), entries: Vec::new() }
    }
}

impl FileMap {
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            encoding: ENCODING.to_owned(),
            entries:  paths.into_iter().map(FileMapEntry::new).collect(),
        }
    }

    /// Value of the length field this map is written with.
    pub fn block_len(&self) -> u64 {
        cstring_len(&self.encoding) + self.entries.iter().map(FileMapEntry::encoded_len).sum::<u64>()
    }

    /// Serialize into a staging buffer, then emit length and buffer in one go.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut block = Vec::with_capacity(self.block_len() as usize);
        write_cstring(&mut block, &self.encoding)?;
        for entry in &self.entries {
            block.write_u64::<LittleEndian>(entry.offset)?;
            write_cstring(&mut block, &entry.path)?;
        }

        let length = block.len() as u64;
        debug!(length, entries = self.entries.len(), "writing file map");
        writer.write_u64::<LittleEndian>(length)?;
        writer.write_all(&block)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let declared = reader.read_u64::<LittleEndian>()?;
        let encoding = read_cstring(&mut reader)?;
        if !encoding.eq_ignore_ascii_case(ENCODING) {
            return Err(ZarError::UnsupportedEncoding(encoding));
        }
        let mut consumed = cstring_len(&encoding);
        debug!(length = declared, %encoding, "reading file map");

        let mut entries = Vec::new();
        // At least one entry is always attempted; a volume never has zero.
        loop {
            let offset = reader.read_u64::<LittleEndian>()?;
            let path = read_path(&mut reader)?;
            let entry = FileMapEntry { offset, path };
            consumed += entry.encoded_len();
            if consumed > declared {
                return Err(ZarError::MapOverrun { declared, consumed });
            }
            trace!(index = entries.len(), path = %entry.path, "file map entry");
            entries.push(entry);
            if consumed == declared {
                break;
            }
        }

        Ok(Self { encoding, entries })
    }
}
