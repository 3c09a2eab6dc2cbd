//! NUL-terminated string fields.
//!
//! Every variable-length field in a volume is a byte string followed by a
//! single `0x00`. Strings are bounded so a corrupt archive cannot make a
//! reader consume the rest of the file looking for a terminator.

use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::{Result, ZarError};

/// Longest string, excluding the terminator, accepted in any field.
/// Matches a 1024-byte path buffer with room for the NUL.
pub const MAX_STRING_LEN: usize = 1023;

/// On-disk size of `s` as a NUL-terminated field.
pub fn cstring_len(s: &str) -> u64 {
    s.len() as u64 + 1
}

pub fn write_cstring<W: Write>(mut writer: W, s: &str) -> Result<()> {
    if s.len() > MAX_STRING_LEN {
        return Err(ZarError::PathTooLong { max: MAX_STRING_LEN });
    }
    if s.as_bytes().contains(&0) {
        return Err(ZarError::InvalidPath(s.escape_default().to_string()));
    }
    writer.write_all(s.as_bytes())?;
    writer.write_u8(0)?;
    Ok(())
}

pub fn read_cstring<R: Read>(mut reader: R) -> Result<String> {
    let mut bytes = Vec::new();
    loop {
        match reader.read_u8()? {
            0 => break,
            b => {
                if bytes.len() == MAX_STRING_LEN {
                    return Err(ZarError::PathTooLong { max: MAX_STRING_LEN });
                }
                bytes.push(b);
            }
        }
    }
    String::from_utf8(bytes)
        .map_err(|e| ZarError::InvalidPath(String::from_utf8_lossy(e.as_bytes()).into_owned()))
}

/// Reads a member path; an empty string here means the structure is corrupt.
pub fn read_path<R: Read>(reader: R) -> Result<String> {
    let path = read_cstring(reader)?;
    if path.is_empty() {
        return Err(ZarError::EmptyPath);
    }
    Ok(path)
}
