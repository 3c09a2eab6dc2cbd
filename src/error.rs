//! Error taxonomy shared by every codec and archive operation.
//!
//! Errors fall in three classes: fatal I/O, fatal data-format, and the single
//! recoverable case, a creation input that cannot be opened or stored under a
//! valid member path. That one is logged and the member skipped instead of
//! being returned.

use std::io;
use thiserror::Error;

/// Input data incorrect.
pub const EX_DATAERR:  u8 = 65;
/// Internal software error.
pub const EX_SOFTWARE: u8 = 70;
/// OS error, e.g. allocation failure.
pub const EX_OSERR:    u8 = 71;
/// File I/O error.
pub const EX_IOERR:    u8 = 74;

pub type Result<T> = std::result::Result<T, ZarError>;

#[derive(Error, Debug)]
pub enum ZarError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("bad volume header: expected start marker {expected:#010x}, found {found:#010x}")]
    InvalidMagic { expected: u32, found: u32 },

    #[error("{path}: unsupported format code {}", hex::encode(code))]
    UnsupportedFormat { path: String, code: [u8; 2] },

    #[error("{path}: checksum mismatch: stored {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { path: String, expected: u32, actual: u32 },

    #[error("empty path where a member path was expected")]
    EmptyPath,

    #[error("path exceeds {max} bytes")]
    PathTooLong { max: usize },

    #[error("invalid member path: {0}")]
    InvalidPath(String),

    #[error("member path escapes the destination: {0}")]
    UnsafePath(String),

    #[error("unsupported file map encoding {0:?}")]
    UnsupportedEncoding(String),

    #[error("file map entries overrun the declared length ({consumed} > {declared} bytes)")]
    MapOverrun { declared: u64, consumed: u64 },

    #[error("{path}: record declares {declared} bytes but spans {actual}")]
    RecordSizeMismatch { path: String, declared: u64, actual: u64 },

    #[error("no readable input files; refusing to write an empty volume")]
    EmptyVolume,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ZarError {
    /// True for errors caused by the data handed to an operation (archive
    /// contents or creation inputs) rather than by the host.
    pub fn is_data_error(&self) -> bool {
        match self {
            // A short read means the container ended early, not a host failure.
            ZarError::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            ZarError::Internal(_) => false,
            _ => true,
        }
    }

    /// sysexits-style process status for this error.
    pub fn exit_code(&self) -> u8 {
        if self.is_data_error() {
            return EX_DATAERR;
        }
        match self {
            ZarError::Io(e) if e.kind() == io::ErrorKind::OutOfMemory => EX_OSERR,
            ZarError::Internal(_) => EX_SOFTWARE,
            _ => EX_IOERR,
        }
    }
}
