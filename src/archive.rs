//! High-level [`Archive`] API: open/close plus the create, list and extract
//! operations.
//!
//! ```no_run
//! use zar::archive;
//! use zar::volume::CreateOptions;
//!
//! archive::create("out.zar", ["a.txt", "b.txt"], &CreateOptions::default())?;
//! for record in archive::list("out.zar")? {
//!     println!("{} {}", record.path, record.length);
//! }
//! archive::extract("out.zar", "restored")?;
//! # Ok::<(), zar::ZarError>(())
//! ```
//!
//! An archive is a single seekable file owned exclusively by one [`Archive`]
//! value. Opening the same path from two processes or threads at once is
//! undefined; nothing here guards against it.

use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn};

use crate::checksum::Crc32Writer;
use crate::error::{Result, ZarError};
use crate::mark::StreamMark;
use crate::path::{basename, dirname, member_path, resolve};
use crate::record::FileRecord;
use crate::volume::{CreateOptions, VolumeRecord};

pub struct Archive {
    path:    PathBuf,
    file:    File,
    /// Only single-volume archives exist; this is never populated.
    volumes: Vec<VolumeRecord>,
}

impl Archive {
    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Open `path` read-write, creating an empty file if it does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "archive doesn't exist, creating it");
                OpenOptions::new().read(true).write(true).create_new(true).open(&path)?
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, file, volumes: Vec::new() })
    }

    /// Open an archive that must already exist, without write access.
    pub fn open_existing<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let file = File::open(&path)?;
        Ok(Self { path, file, volumes: Vec::new() })
    }

    /// Flush and release the underlying file.
    pub fn close(mut self) -> Result<()> {
        debug!(path = %self.path.display(), "closing archive");
        self.file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn volumes(&self) -> &[VolumeRecord] {
        &self.volumes
    }

    pub(crate) fn reader(&mut self) -> Result<BufReader<&mut File>> {
        self.file.rewind()?;
        Ok(BufReader::new(&mut self.file))
    }

    // ── Write ────────────────────────────────────────────────────────────────

    /// Replace the archive's contents with a single volume holding `inputs`.
    ///
    /// Inputs that cannot be opened, or whose names cannot be stored as a
    /// member path, are reported and left out of both the file map and the
    /// body. All of that is settled before the archive is truncated.
    /// Everything after that point is fatal, and a partially written archive
    /// is left as-is.
    pub fn write_volume<I, P>(&mut self, inputs: I, opts: &CreateOptions) -> Result<VolumeRecord>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut volume = VolumeRecord::with_options(opts);
        let mut sources = Vec::new();
        for input in inputs {
            let input = input.as_ref();
            let source = match &opts.base_dir {
                Some(base) => base.join(input),
                None => input.to_owned(),
            };
            match probe_input(input, &source) {
                Ok(name) => {
                    sources.push(source);
                    volume.records.push(FileRecord::new(name));
                }
                Err(e) => warn!(path = %source.display(), error = %e, "skipping input"),
            }
        }
        if volume.records.is_empty() {
            return Err(ZarError::EmptyVolume);
        }

        self.file.set_len(0)?;
        self.file.rewind()?;
        let mut writer = BufWriter::new(&mut self.file);
        volume.write(&mut writer)?;

        for (record, source) in volume.records.iter_mut().zip(&sources) {
            info!(member = %record.path, "adding");
            let f = File::open(source)?;
            let length = f.metadata()?.len();
            record.write_sized(&mut writer, BufReader::new(f), length)?;
        }
        writer.flush()?;
        Ok(volume)
    }

    // ── Read ─────────────────────────────────────────────────────────────────

    /// Read the volume header; records are stubs carrying only their paths.
    pub fn read_volume(&mut self) -> Result<VolumeRecord> {
        VolumeRecord::read(self.reader()?)
    }

    /// Metadata of every member, payloads skipped.
    pub fn list(&mut self) -> Result<Vec<FileRecord>> {
        let mut reader = self.reader()?;
        let volume = VolumeRecord::read(&mut reader)?;
        let mut records = Vec::with_capacity(volume.nrecords());
        for (i, stub) in volume.records.iter().enumerate() {
            debug!(index = i, "reading file record");
            let record = FileRecord::read(&mut reader)?;
            if record.path != stub.path {
                warn!(map = %stub.path, record = %record.path, "file map and record order differ");
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Materialize every member under `dest`, verifying each checksum.
    pub fn extract_all<P: AsRef<Path>>(&mut self, dest: P) -> Result<Vec<FileRecord>> {
        let dest = dest.as_ref();
        fs::create_dir_all(dest)?;

        let mut reader = self.reader()?;
        let volume = VolumeRecord::read(&mut reader)?;
        let mut extracted = Vec::with_capacity(volume.nrecords());
        for _ in 0..volume.nrecords() {
            extracted.push(extract_record(&mut reader, dest)?);
        }
        Ok(extracted)
    }
}

/// Recoverable checks on a creation input: its name must make a valid member
/// path, and the file must open and must not be a directory. Returns the
/// member path.
fn probe_input(input: &Path, source: &Path) -> Result<String> {
    let name = member_path(input)?;
    let f = File::open(source)?;
    if f.metadata()?.is_dir() {
        return Err(io::Error::new(io::ErrorKind::Other, "is a directory").into());
    }
    Ok(name)
}

fn extract_record<R: Read + Seek>(reader: &mut R, dest: &Path) -> Result<FileRecord> {
    let start = StreamMark::capture(reader)?;
    let mut record = FileRecord::read_header(&mut *reader)?;
    if !record.format.is_stored() {
        return Err(ZarError::UnsupportedFormat { path: record.path, code: record.format.0 });
    }

    let unsafe_path = |_: ZarError| ZarError::UnsafePath(record.path.clone());
    let dir = match dirname(&record.path) {
        "." | "/" => dest.to_path_buf(),
        parent => resolve(dest, parent).map_err(unsafe_path)?,
    };
    let target = resolve(&dir, basename(&record.path)).map_err(unsafe_path)?;
    fs::create_dir_all(&dir)?;

    let mut sink = Crc32Writer::new(BufWriter::new(File::create(&target)?));
    let copied = io::copy(&mut (&mut *reader).take(record.length), &mut sink)?;
    if copied != record.length {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{}: payload truncated after {copied} of {} bytes", record.path, record.length),
        )
        .into());
    }
    sink.flush()?;
    let actual = sink.checksum();

    record.checksum = reader.read_u32::<LittleEndian>()?;
    if actual != record.checksum {
        return Err(ZarError::ChecksumMismatch {
            path:     record.path,
            expected: record.checksum,
            actual,
        });
    }

    start.seek_past(reader, record.offset)?;
    info!(member = %record.path, bytes = record.length, "extracted");
    Ok(record)
}

// ── Operations ───────────────────────────────────────────────────────────────

/// Build `archive` from `files`, in order.
pub fn create<P, I, Q>(archive: P, files: I, opts: &CreateOptions) -> Result<VolumeRecord>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = Q>,
    Q: AsRef<Path>,
{
    let _span = info_span!("create", archive = %archive.as_ref().display()).entered();
    let mut zar = Archive::open(archive)?;
    let volume = zar.write_volume(files, opts)?;
    zar.close()?;
    Ok(volume)
}

pub fn list<P: AsRef<Path>>(archive: P) -> Result<Vec<FileRecord>> {
    let _span = info_span!("list", archive = %archive.as_ref().display()).entered();
    let mut zar = Archive::open_existing(archive)?;
    let records = zar.list()?;
    zar.close()?;
    Ok(records)
}

pub fn extract<P: AsRef<Path>, D: AsRef<Path>>(archive: P, dest: D) -> Result<Vec<FileRecord>> {
    let _span = info_span!("extract", archive = %archive.as_ref().display()).entered();
    let mut zar = Archive::open_existing(archive)?;
    let records = zar.extract_all(dest)?;
    zar.close()?;
    Ok(records)
}
