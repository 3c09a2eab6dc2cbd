//! Volume header: start marker, file map, reserved checksum/footer fields and
//! the creator tag.
//!
//! The member records follow the header directly, in file-map order, and
//! are written and read as a separate phase on the same stream.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::debug;

use crate::error::{Result, ZarError};
use crate::file_map::FileMap;
use crate::record::FileRecord;
use crate::wire::{read_cstring, write_cstring};

/// `"ZAR\0"` read as a little-endian u32.
pub const START_MARKER: u32 = 0x0052_415A;

/// Default creator tag written into new volumes.
pub const CREATOR_NAME:    &str = env!("CARGO_PKG_NAME");
pub const CREATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration for [`crate::archive::create`].
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub creator_name:    String,
    pub creator_version: String,
    /// Directory relative inputs are opened from. Member names are the
    /// inputs as given, so `a.txt` under `base_dir` is stored as `a.txt`.
    pub base_dir:        Option<PathBuf>,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            creator_name:    CREATOR_NAME.to_owned(),
            creator_version: CREATOR_VERSION.to_owned(),
            base_dir:        None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRecord {
    /// Members in write order.
    pub records: Vec<FileRecord>,
    /// Reserved; always zero in this version.
    pub checksum: u32,
    /// Reserved footer / next-volume offset; always zero in this version.
    pub footer_offset: u64,
    pub creator_name:    String,
    pub creator_version: String,
}

impl Default for VolumeRecord {
    fn default() -> Self {
        Self::with_options(&CreateOptions::default())
    }
}

impl VolumeRecord {
    pub fn with_options(opts: &CreateOptions) -> Self {
        Self {
            records:         Vec::new(),
            checksum:        0,
            footer_offset:   0,
            creator_name:    opts.creator_name.clone(),
            creator_version: opts.creator_version.clone(),
        }
    }

    pub fn nrecords(&self) -> usize {
        self.records.len()
    }

    pub fn file_map(&self) -> FileMap {
        FileMap::from_paths(self.records.iter().map(|r| r.path.clone()))
    }

    /// Write the header. Member records are the caller's next step.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        if self.records.is_empty() {
            return Err(ZarError::EmptyVolume);
        }
        debug!("writing volume header, start marker {START_MARKER:#010x}");
        writer.write_u32::<LittleEndian>(START_MARKER)?;
        self.file_map().write(&mut writer)?;
        writer.write_u32::<LittleEndian>(self.checksum)?;
        writer.write_u64::<LittleEndian>(self.footer_offset)?;
        write_cstring(&mut writer, &self.creator_name)?;
        write_cstring(&mut writer, &self.creator_version)?;
        Ok(())
    }

    /// Read the header. `records` holds one stub per file-map entry.
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let found = reader.read_u32::<LittleEndian>()?;
        if found != START_MARKER {
            return Err(ZarError::InvalidMagic { expected: START_MARKER, found });
        }

        let map = FileMap::read(&mut reader)?;
        let records = map.entries.into_iter().map(|e| FileRecord::new(e.path)).collect();

        let checksum = reader.read_u32::<LittleEndian>()?;
        let footer_offset = reader.read_u64::<LittleEndian>()?;
        let creator_name = read_cstring(&mut reader)?;
        let creator_version = read_cstring(&mut reader)?;
        debug!(checksum, footer_offset, %creator_name, %creator_version, "read volume header");

        Ok(Self { records, checksum, footer_offset, creator_name, creator_version })
    }
}
