//! Archive entry types.

use crate::path::Path;
use crate::timestamp::Timestamp;

/// An entry in a 7z archive, as read from its header.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future versions without breaking downstream code. Pattern matching
/// on `Entry` requires a `..` wildcard.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Entry {
    /// The path within the archive.
    pub path: Path,
    /// Whether this entry is a directory.
    pub is_directory: bool,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// CRC-32 checksum of the entry's uncompressed data.
    ///
    /// `None` for directories, some empty files, and archives that omit
    /// per-file CRCs.
    pub crc32: Option<u32>,
    /// Modification time as Windows FILETIME (100-nanosecond intervals since 1601-01-01).
    pub modification_time: Option<u64>,
    /// Creation time as Windows FILETIME (100-nanosecond intervals since 1601-01-01).
    pub creation_time: Option<u64>,
    /// Access time as Windows FILETIME (100-nanosecond intervals since 1601-01-01).
    pub access_time: Option<u64>,
    /// Windows file attributes.
    pub attributes: Option<u32>,
    /// Whether this entry is encrypted.
    pub is_encrypted: bool,
    /// Whether this entry is a symbolic link.
    ///
    /// Detected from the entry attributes: Unix mode bits indicating
    /// `S_IFLNK` (0o120000), or the Windows `REPARSE_POINT` attribute (0x400).
    pub is_symlink: bool,
    /// Whether this is an anti-item (marks file for deletion in incremental backups).
    pub is_anti: bool,
    /// Index in the internal entry list.
    pub(crate) index: usize,
    /// Folder index for solid archives.
    pub(crate) folder_index: Option<usize>,
    /// Stream index within folder.
    pub(crate) stream_index: Option<usize>,
}

impl Entry {
    /// Returns the file name (last component of the path).
    pub fn name(&self) -> &str {
        self.path
            .as_str()
            .rsplit(['/', '\\'])
            .find(|c| !c.is_empty())
            .unwrap_or(self.path.as_str())
    }

    /// Returns true if this is a file (not a directory).
    pub fn is_file(&self) -> bool {
        !self.is_directory
    }

    /// Returns the 0-indexed position of this entry in the archive.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the modification time as a SystemTime (if available).
    pub fn modified(&self) -> Option<std::time::SystemTime> {
        self.modification_time
            .map(|ft| Timestamp::from_filetime(ft).as_system_time())
    }

    /// Returns the creation time as a SystemTime (if available).
    pub fn created(&self) -> Option<std::time::SystemTime> {
        self.creation_time
            .map(|ft| Timestamp::from_filetime(ft).as_system_time())
    }

    /// Returns the access time as a SystemTime (if available).
    pub fn accessed(&self) -> Option<std::time::SystemTime> {
        self.access_time
            .map(|ft| Timestamp::from_filetime(ft).as_system_time())
    }

    /// Returns the modification timestamp with full 100-nanosecond precision.
    pub fn modification_timestamp(&self) -> Option<Timestamp> {
        self.modification_time.map(Timestamp::from_filetime)
    }

    /// Returns the creation timestamp with full 100-nanosecond precision.
    pub fn creation_timestamp(&self) -> Option<Timestamp> {
        self.creation_time.map(Timestamp::from_filetime)
    }

    /// Returns the access timestamp with full 100-nanosecond precision.
    pub fn access_timestamp(&self) -> Option<Timestamp> {
        self.access_time.map(Timestamp::from_filetime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(path: &str, is_dir: bool) -> Entry {
        Entry {
            path: Path::new_item_path(path).unwrap(),
            is_directory: is_dir,
            size: 100,
            crc32: Some(0x12345678),
            modification_time: None,
            creation_time: None,
            access_time: None,
            attributes: None,
            is_encrypted: false,
            is_symlink: false,
            is_anti: false,
            index: 0,
            folder_index: None,
            stream_index: None,
        }
    }

    #[test]
    fn entry_is_file() {
        let file = make_entry("test.txt", false);
        assert!(file.is_file());
        assert!(!file.is_directory);

        let dir = make_entry("subdir", true);
        assert!(!dir.is_file());
        assert!(dir.is_directory);
    }

    #[test]
    fn entry_name() {
        let entry = make_entry("path/to/file.txt", false);
        assert_eq!(entry.name(), "file.txt");
    }
}
