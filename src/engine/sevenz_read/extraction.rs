//! Low-level entry extraction.
//!
//! These methods decompress a single entry's data from the archive. Path
//! safety, overwrite policy, symlink handling, and metadata preservation are
//! the concern of the `coder` layer that drives this engine, not of the
//! engine itself.

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use crate::engine::format::streams::Folder;
use crate::{Error, Result};

use super::archive_open::ExtractionLimits;
use super::Archive;

impl<R: Read + Seek> Archive<R> {
    /// Extracts an entry by name to a `Vec`.
    pub fn extract_to_vec(&mut self, name: &str) -> Result<Vec<u8>> {
        let entry_idx = self
            .entries
            .iter()
            .position(|e| e.path.as_str() == name)
            .ok_or_else(|| Error::InvalidFormat(format!("entry not found: {}", name)))?;

        self.extract_entry_to_vec_by_index(entry_idx)
    }

    /// Extracts an entry by index to a `Vec`.
    pub fn extract_entry_to_vec_by_index(&mut self, entry_idx: usize) -> Result<Vec<u8>> {
        let entry = self.entries.get(entry_idx).ok_or_else(|| {
            Error::InvalidFormat(format!("entry index {} out of range", entry_idx))
        })?;

        if entry.is_directory {
            return Err(Error::InvalidFormat(
                "cannot extract directory to vec".into(),
            ));
        }

        // Empty files (size=0, no stream) have folder_index=None: no data to read.
        if entry.size == 0 && entry.folder_index.is_none() {
            return Ok(Vec::new());
        }

        let entry_size = entry.size;
        let entry_crc = entry.crc32;
        let folder_idx = entry
            .folder_index
            .ok_or_else(|| Error::InvalidFormat("entry has no folder index".into()))?;
        let stream_index = entry.stream_index;

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

        let limits = ExtractionLimits::unlimited();
        let mut output = Vec::with_capacity(entry_size as usize);

        #[cfg(feature = "lzma")]
        if folder.uses_bcj2() {
            self.extract_bcj2(&folder, folder_idx, stream_index, &mut output, &limits)?;
        } else {
            self.extract_single_stream(
                &folder,
                folder_idx,
                stream_index,
                entry_size,
                &mut output,
                &limits,
            )?;
        }

        #[cfg(not(feature = "lzma"))]
        self.extract_single_stream(
            &folder,
            folder_idx,
            stream_index,
            entry_size,
            &mut output,
            &limits,
        )?;

        if let Some(expected_crc) = entry_crc {
            let actual_crc = crc32fast::hash(&output);
            if actual_crc != expected_crc {
                return Err(Error::CrcMismatch {
                    entry_index: entry_idx,
                    entry_name: Some(self.entries[entry_idx].path.as_str().to_string()),
                    expected: expected_crc,
                    actual: actual_crc,
                });
            }
        }

        Ok(output)
    }

    /// Extracts an entry directly into a writer by index, without the
    /// intermediate `Vec` buffering `extract_entry_to_vec_by_index` does.
    pub(crate) fn extract_entry_to_writer_by_index<W: Write + ?Sized>(
        &mut self,
        entry_idx: usize,
        writer: &mut W,
    ) -> Result<u64> {
        let data = self.extract_entry_to_vec_by_index(entry_idx)?;
        writer.write_all(&data).map_err(Error::Io)?;
        Ok(data.len() as u64)
    }

    /// Extracts a non-solid entry directly.
    pub(crate) fn extract_non_solid(
        &self,
        packed_data: Vec<u8>,
        folder: &Folder,
        expected_size: u64,
        output: &mut impl Write,
        limits: &ExtractionLimits,
    ) -> Result<u64> {
        if folder.coders.is_empty() {
            return Err(Error::InvalidFormat("folder has no coders".into()));
        }

        let uncompressed_size = folder.final_unpack_size().unwrap_or(expected_size);
        let compressed_size = packed_data.len() as u64;

        let cursor = Cursor::new(packed_data);
        let decoder = self.build_decoder_chain(cursor, folder, uncompressed_size)?;

        let mut limited_decoder = limits.wrap_reader(decoder, compressed_size);

        let mut total_written = 0u64;
        let mut buf = vec![0u8; self.config.decoder_read_block_size as usize];

        loop {
            let n = limited_decoder
                .read(&mut buf)
                .map_err(super::map_io_error)?;
            if n == 0 {
                break;
            }
            output.write_all(&buf[..n]).map_err(Error::Io)?;
            total_written += n as u64;
        }

        Ok(total_written)
    }

    /// Extracts an entry from a solid block.
    pub(crate) fn extract_from_solid_block(
        &self,
        packed_data: Vec<u8>,
        folder: &Folder,
        folder_idx: usize,
        stream_index: usize,
        output: &mut impl Write,
        limits: &ExtractionLimits,
    ) -> Result<u64> {
        if folder.coders.is_empty() {
            return Err(Error::InvalidFormat("folder has no coders".into()));
        }

        let entry_sizes = self.get_solid_block_entry_sizes(folder_idx)?;

        if stream_index >= entry_sizes.len() {
            return Err(Error::InvalidFormat(format!(
                "stream index {} out of range for solid block",
                stream_index
            )));
        }

        let uncompressed_size = folder.final_unpack_size().unwrap_or(0);
        let compressed_size = packed_data.len() as u64;

        let cursor = Cursor::new(packed_data);
        let mut decoder = self.build_decoder_chain(cursor, folder, uncompressed_size)?;

        // Skip entries before the target; no limit enforcement on skipped data.
        for &skip_size in entry_sizes.iter().take(stream_index) {
            let mut remaining = skip_size;
            let mut buf = vec![0u8; self.config.decoder_read_block_size as usize];
            while remaining > 0 {
                let to_read = buf.len().min(remaining as usize);
                let n = decoder.read(&mut buf[..to_read]).map_err(Error::Io)?;
                if n == 0 {
                    break;
                }
                remaining -= n as u64;
            }
        }

        let target_size = entry_sizes[stream_index];
        let mut limited_decoder = limits.wrap_reader(&mut decoder, compressed_size);

        let mut remaining = target_size;
        let mut total_written = 0u64;
        let mut buf = vec![0u8; self.config.decoder_read_block_size as usize];

        while remaining > 0 {
            let to_read = buf.len().min(remaining as usize);
            let n = limited_decoder
                .read(&mut buf[..to_read])
                .map_err(super::map_io_error)?;
            if n == 0 {
                break;
            }
            output.write_all(&buf[..n]).map_err(Error::Io)?;
            total_written += n as u64;
            remaining -= n as u64;
        }

        Ok(total_written)
    }

    /// Extracts a single-stream entry (non-BCJ2).
    pub(crate) fn extract_single_stream(
        &mut self,
        folder: &Folder,
        folder_idx: usize,
        stream_index: Option<usize>,
        expected_size: u64,
        output: &mut impl Write,
        limits: &ExtractionLimits,
    ) -> Result<u64> {
        let pack_info = self
            .header
            .pack_info
            .as_ref()
            .ok_or_else(|| Error::InvalidFormat("missing pack info".into()))?;

        let pack_pos = self.calculate_pack_position(folder_idx)?;

        let pack_size = pack_info
            .pack_sizes
            .get(folder_idx)
            .copied()
            .ok_or_else(|| Error::InvalidFormat("missing pack size".into()))?;

        self.reader
            .seek(SeekFrom::Start(pack_pos))
            .map_err(Error::Io)?;

        let mut packed_data = vec![0u8; pack_size as usize];
        self.reader
            .read_exact(&mut packed_data)
            .map_err(Error::Io)?;

        let is_solid_block = self.is_solid_block(folder_idx);

        if is_solid_block {
            self.extract_from_solid_block(
                packed_data,
                folder,
                folder_idx,
                stream_index.unwrap_or(0),
                output,
                limits,
            )
        } else {
            self.extract_non_solid(packed_data, folder, expected_size, output, limits)
        }
    }
}
