//! Absolute position capture/restore on a seekable stream.
//!
//! Reading a volume needs to return to, or skip relative to, positions seen
//! earlier: a record's `offset` field is a distance from where that field
//! starts, not an absolute file offset.

use std::io::{self, Seek, SeekFrom};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StreamMark(u64);

impl StreamMark {
    pub fn capture<S: Seek + ?Sized>(stream: &mut S) -> io::Result<Self> {
        Ok(Self(stream.stream_position()?))
    }

    pub fn position(self) -> u64 {
        self.0
    }

    pub fn restore<S: Seek + ?Sized>(self, stream: &mut S) -> io::Result<()> {
        stream.seek(SeekFrom::Start(self.0))?;
        Ok(())
    }

    /// Seek to `distance` bytes past this mark.
    pub fn seek_past<S: Seek + ?Sized>(self, stream: &mut S, distance: u64) -> io::Result<()> {
        let target = self.0.checked_add(distance).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "seek target overflows u64")
        })?;
        stream.seek(SeekFrom::Start(target))?;
        Ok(())
    }

    /// Bytes between this mark and the stream's current position.
    pub fn distance<S: Seek + ?Sized>(self, stream: &mut S) -> io::Result<u64> {
        let now = stream.stream_position()?;
        Ok(now.saturating_sub(self.0))
    }
}
