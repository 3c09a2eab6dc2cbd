//! CRC-32 glue over `crc32fast`.

use crc32fast::Hasher;
use std::io::{self, Write};

/// CRC-32 of a complete buffer.
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Pass-through writer that checksums and counts every byte it forwards.
///
/// Used on both sides of the payload: when streaming a source file into a
/// record and when copying a record's payload out to disk.
pub struct Crc32Writer<W: Write> {
    inner:   W,
    hasher:  Hasher,
    written: u64,
}

impl<W: Write> Crc32Writer<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, hasher: Hasher::new(), written: 0 }
    }

    /// Checksum of everything written so far.
    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl<W: Write> Write for Crc32Writer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
