pub mod error;
pub mod checksum;
pub mod mark;
pub mod wire;
pub mod path;
pub mod file_map;
pub mod record;
pub mod volume;
pub mod archive;
pub mod info;

pub use error::{Result, ZarError};
pub use archive::{Archive, create, extract, list};
pub use file_map::{FileMap, FileMapEntry};
pub use record::{FileRecord, FormatCode};
pub use volume::{CreateOptions, VolumeRecord, START_MARKER};
pub use info::VolumeInfo;
