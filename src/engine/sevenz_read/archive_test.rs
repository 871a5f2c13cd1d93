//! Archive integrity testing.
//!
//! Decompresses entries and verifies their CRC checksums without writing
//! any files.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::{Error, Result};

use super::archive_open::ExtractionLimits;
use super::{Archive, TestResult};

/// A `Write` sink that only accumulates a running CRC-32, discarding bytes.
struct Crc32Sink {
    hasher: crc32fast::Hasher,
}

impl Crc32Sink {
    fn new() -> Self {
        Self {
            hasher: crc32fast::Hasher::new(),
        }
    }

    fn finalize(self) -> u32 {
        self.hasher.finalize()
    }
}

impl Write for Crc32Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Tests every entry in the archive for integrity.
    pub fn test_all(&mut self) -> Result<TestResult> {
        let mut result = TestResult::default();

        for idx in 0..self.entries.len() {
            let entry = &self.entries[idx];
            let entry_path = entry.path.as_str().to_string();

            result.entries_tested += 1;

            if entry.is_directory {
                result.entries_passed += 1;
                continue;
            }

            match self.test_entry_by_index(idx) {
                Ok(()) => {
                    result.entries_passed += 1;
                }
                Err(e) => {
                    result.entries_failed += 1;
                    result.failures.push((entry_path, e.to_string()));
                }
            }
        }

        Ok(result)
    }

    /// Tests a single entry by decompressing and verifying its CRC.
    pub(crate) fn test_entry_by_index(&mut self, entry_idx: usize) -> Result<()> {
        let entry_size = self.entries[entry_idx].size;
        let entry_crc = self.entries[entry_idx].crc32;
        let folder_index = self.entries[entry_idx].folder_index;
        let stream_index = self.entries[entry_idx].stream_index;

        let folder_idx = match folder_index {
            Some(idx) => idx,
            None => return Ok(()),
        };

        let (folder, pack_size) = {
            let unpack_info = self
                .header
                .unpack_info
                .as_ref()
                .ok_or_else(|| Error::InvalidFormat("missing unpack info".into()))?;

            let folder = unpack_info
                .folders
                .get(folder_idx)
                .ok_or_else(|| {
                    Error::InvalidFormat(format!("folder index {} out of range", folder_idx))
                })?
                .clone();

            let pack_info = self
                .header
                .pack_info
                .as_ref()
                .ok_or_else(|| Error::InvalidFormat("missing pack info".into()))?;

            let pack_size = pack_info
                .pack_sizes
                .get(folder_idx)
                .copied()
                .ok_or_else(|| Error::InvalidFormat("missing pack size".into()))?;

            (folder, pack_size)
        };

        let pack_pos = self.calculate_pack_position(folder_idx)?;

        self.reader
            .seek(SeekFrom::Start(pack_pos))
            .map_err(Error::Io)?;
        let mut packed_data = vec![0u8; pack_size as usize];
        self.reader
            .read_exact(&mut packed_data)
            .map_err(Error::Io)?;

        let mut sink = Crc32Sink::new();
        let limits = ExtractionLimits::unlimited();

        #[cfg(feature = "lzma")]
        if folder.uses_bcj2() {
            self.extract_bcj2(&folder, folder_idx, stream_index, &mut sink, &limits)?;
        } else {
            self.extract_single_stream(
                &folder,
                folder_idx,
                stream_index,
                entry_size,
                &mut sink,
                &limits,
            )?;
        }

        #[cfg(not(feature = "lzma"))]
        self.extract_single_stream(
            &folder,
            folder_idx,
            stream_index,
            entry_size,
            &mut sink,
            &limits,
        )?;

        if let Some(expected_crc) = entry_crc {
            let actual_crc = sink.finalize();
            if actual_crc != expected_crc {
                return Err(Error::CrcMismatch {
                    entry_index: entry_idx,
                    entry_name: Some(self.entries[entry_idx].path.as_str().to_string()),
                    expected: expected_crc,
                    actual: actual_crc,
                });
            }
        }

        Ok(())
    }
}
