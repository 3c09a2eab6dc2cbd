//! Format-conformance probe.
//!
//! [`VolumeInfo::probe`] walks a volume with its own decoding pass rather
//! than through [`VolumeRecord::read`](crate::volume::VolumeRecord::read),
//! and reports every structural field as found on disk, including values the
//! normal read path ignores (reserved offsets, record positions, bytes left
//! over after the last record).

use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::fmt;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::archive::Archive;
use crate::error::{Result, ZarError};
use crate::mark::StreamMark;
use crate::record::{FileRecord, FormatCode};
use crate::volume::START_MARKER;
use crate::wire::{read_cstring, read_path};

#[derive(Debug, Clone, Serialize)]
pub struct MapEntryInfo {
    pub reserved_offset: u64,
    pub path:            String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordInfo {
    /// Absolute position of the record's `offset` field.
    pub position: u64,
    #[serde(flatten)]
    pub record:   FileRecord,
    /// Whether `offset` matches the bytes the record actually spans.
    pub span_ok:  bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolumeInfo {
    pub archive:         PathBuf,
    pub size:            u64,
    pub marker:          u32,
    pub map_length:      u64,
    pub encoding:        String,
    pub entries:         Vec<MapEntryInfo>,
    pub checksum:        u32,
    pub footer_offset:   u64,
    pub creator_name:    String,
    pub creator_version: String,
    /// Absolute position of the first record.
    pub header_len:      u64,
    pub records:         Vec<RecordInfo>,
    /// Bytes after the last record; zero for a well-formed archive.
    pub trailing_bytes:  u64,
}

impl VolumeInfo {
    /// Walk the volume starting at the reader's current position.
    pub fn probe<R: Read + Seek>(mut reader: R, archive: &Path) -> Result<Self> {
        let origin = StreamMark::capture(&mut reader)?;
        let size = reader.seek(SeekFrom::End(0))?;
        origin.restore(&mut reader)?;

        let marker = reader.read_u32::<LittleEndian>()?;
        if marker != START_MARKER {
            return Err(ZarError::InvalidMagic { expected: START_MARKER, found: marker });
        }

        // Pull the whole map block in at once and parse it from memory.
        let map_length = reader.read_u64::<LittleEndian>()?;
        let mut block = Vec::new();
        (&mut reader).take(map_length).read_to_end(&mut block)?;
        if (block.len() as u64) < map_length {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("file map declares {map_length} bytes, {} present", block.len()),
            )
            .into());
        }
        let mut map = Cursor::new(block);
        let encoding = read_cstring(&mut map)?;
        let mut entries = Vec::new();
        while map.position() < map_length {
            let reserved_offset = map.read_u64::<LittleEndian>()?;
            let path = read_cstring(&mut map)?;
            entries.push(MapEntryInfo { reserved_offset, path });
        }

        let checksum = reader.read_u32::<LittleEndian>()?;
        let footer_offset = reader.read_u64::<LittleEndian>()?;
        let creator_name = read_cstring(&mut reader)?;
        let creator_version = read_cstring(&mut reader)?;
        let header_len = reader.stream_position()?;

        let mut records = Vec::with_capacity(entries.len());
        for _ in &entries {
            let start = StreamMark::capture(&mut reader)?;
            let offset = reader.read_u64::<LittleEndian>()?;
            let path = read_path(&mut reader)?;
            let mut format = [0u8; 2];
            reader.read_exact(&mut format)?;
            let length = reader.read_u64::<LittleEndian>()?;
            let mut record = FileRecord { offset, path, format: FormatCode(format), length, checksum: 0 };

            let checksum_at = record.header_len().checked_add(length).ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "payload length overflows")
            })?;
            start.seek_past(&mut reader, checksum_at)?;
            record.checksum = reader.read_u32::<LittleEndian>()?;
            let consumed = start.distance(&mut reader)?;

            records.push(RecordInfo { position: start.position(), record, span_ok: consumed == offset });
        }

        let end = reader.stream_position()?;
        Ok(Self {
            archive: archive.to_owned(),
            size,
            marker,
            map_length,
            encoding,
            entries,
            checksum,
            footer_offset,
            creator_name,
            creator_version,
            header_len,
            records,
            trailing_bytes: size.saturating_sub(end),
        })
    }

    /// True when every record's framing is consistent and nothing follows
    /// the last one.
    pub fn is_conformant(&self) -> bool {
        self.trailing_bytes == 0
            && self.records.iter().all(|r| r.span_ok)
            && self.entries.iter().zip(&self.records).all(|(e, r)| e.path == r.record.path)
    }
}

impl fmt::Display for VolumeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "── .zar Archive ─────────────────────────────────────────")?;
        writeln!(f, "  Path            {}", self.archive.display())?;
        writeln!(f, "  Size            {} B", self.size)?;
        writeln!(f, "  Start marker    {:#010x} ({})", self.marker, hex::encode(self.marker.to_le_bytes()))?;
        writeln!(f, "  File map length {} B", self.map_length)?;
        writeln!(f, "  Encoding        {}", self.encoding)?;
        writeln!(f, "  Entries         {}", self.entries.len())?;
        for e in &self.entries {
            writeln!(f, "    [{:>8}] {}", e.reserved_offset, e.path)?;
        }
        writeln!(f, "  Volume checksum {:#010x}", self.checksum)?;
        writeln!(f, "  Footer offset   {}", self.footer_offset)?;
        writeln!(f, "  Creator         {} {}", self.creator_name, self.creator_version)?;
        writeln!(f, "  Header length   {} B", self.header_len)?;
        writeln!(f, "  Records:")?;
        for r in &self.records {
            writeln!(
                f,
                "    @{:<10} offset={:<10} format={} length={:<10} crc32={:08x}{} {}",
                r.position,
                r.record.offset,
                r.record.format,
                r.record.length,
                r.record.checksum,
                if r.span_ok { "" } else { " (bad span)" },
                r.record.path,
            )?;
        }
        writeln!(f, "  Trailing bytes  {}", self.trailing_bytes)?;
        write!(f, "  Conformant      {}", self.is_conformant())
    }
}

pub fn info<P: AsRef<Path>>(archive: P) -> Result<VolumeInfo> {
    let _span = tracing::info_span!("info", archive = %archive.as_ref().display()).entered();
    let mut zar = Archive::open_existing(&archive)?;
    let info = VolumeInfo::probe(zar.reader()?, archive.as_ref())?;
    zar.close()?;
    Ok(info)
}
