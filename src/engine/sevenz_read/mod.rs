//! Engine-internal 7z archive reader.
//!
//! This is the decoding half of the `engine` black box: it opens a 7z
//! container, exposes its entry list, and decompresses individual entries
//! on demand. Everything above path-safety, overwrite policy, and
//! cancellation is the `coder` layer's job, not this one's.

pub(crate) mod entries;
mod entry;
mod info;

mod archive_open;
mod archive_query;
mod archive_test;
mod decompression;
mod extraction;
mod solid_blocks;

pub use entry::Entry;
pub use info::{ArchiveInfo, EncryptionInfo, ExtractResult, TestResult};

pub(crate) use archive_open::{ExtractionLimits, map_io_error};

use std::path::PathBuf;

#[cfg(feature = "aes")]
use crate::Password;
use crate::config::CoderConfig;
use crate::engine::format::parser::ArchiveHeader;

/// Volume information for multi-volume archives.
#[derive(Debug, Clone)]
pub(crate) struct VolumeInfo {
    /// Number of volumes.
    pub count: u32,
    /// Paths to each volume file.
    pub paths: Vec<PathBuf>,
}

/// A 7z archive reader.
pub struct Archive<R> {
    pub(crate) reader: R,
    pub(crate) header: ArchiveHeader,
    pub(crate) entries: Vec<Entry>,
    pub(crate) info: ArchiveInfo,
    /// Password for encrypted extraction (used by extraction methods).
    #[cfg(feature = "aes")]
    pub(crate) password: Option<Password>,
    /// Volume information for multi-volume archives.
    pub(crate) volume_info: Option<VolumeInfo>,
    /// Offset to the 7z signature (non-zero for SFX archives).
    pub(crate) sfx_offset: u64,
    /// Block-size tunables snapshotted at open time; governs the relay
    /// buffer size used when streaming decompressed bytes to a sink.
    pub(crate) config: CoderConfig,
}

impl<R> Archive<R> {
    /// Overrides the block-size tunables this archive reads with. Called
    /// by `coder::Decoder` right after opening, before any extraction.
    pub(crate) fn set_config(&mut self, config: CoderConfig) {
        self.config = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // Minimal valid 7z archive (empty) with proper header structure
    fn make_empty_archive() -> Vec<u8> {
        use crate::engine::format::property_id;

        let mut data = Vec::new();

        // Signature
        data.extend_from_slice(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C]);
        // Version (0.4)
        data.extend_from_slice(&[0x00, 0x04]);

        // Start header CRC (placeholder)
        let start_header_crc_pos = data.len();
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        // Next header offset (0 - header immediately follows)
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

        // Header data: HEADER marker followed by END
        let header_data = vec![property_id::HEADER, property_id::END];

        // Next header size (2 bytes: HEADER + END)
        let header_size = header_data.len() as u64;
        data.extend_from_slice(&header_size.to_le_bytes());
        // Next header CRC
        let header_crc = crc32fast::hash(&header_data);
        data.extend_from_slice(&header_crc.to_le_bytes());

        // Compute start header CRC (covers bytes 12-31: offset, size, crc)
        let start_header_crc = crc32fast::hash(&data[12..32]);
        data[start_header_crc_pos..start_header_crc_pos + 4]
            .copy_from_slice(&start_header_crc.to_le_bytes());

        // Append header data
        data.extend_from_slice(&header_data);

        data
    }

    #[test]
    fn test_archive_info_default() {
        let info = ArchiveInfo::default();
        assert_eq!(info.entry_count, 0);
        assert!(!info.is_solid);
    }

    #[test]
    fn test_open_empty_archive() {
        let data = make_empty_archive();
        let cursor = Cursor::new(data);
        let archive = Archive::open(cursor).unwrap();

        assert!(archive.is_empty());
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn set_config_overrides_process_defaults() {
        let data = make_empty_archive();
        let mut archive = Archive::open(Cursor::new(data)).unwrap();
        assert_eq!(archive.config, CoderConfig::from_process_defaults());

        let custom = CoderConfig::from_process_defaults().with_decoder_read_block_size(4096);
        archive.set_config(custom);
        assert_eq!(archive.config.decoder_read_block_size, 4096);
    }
}
