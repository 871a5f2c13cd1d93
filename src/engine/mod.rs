//! The archive engine: the concrete implementation of the "black box"
//! boundary `spec.md` §1 describes. `coder` drives it only through the
//! narrow surface exposed here (open/list/extract/compress plus per-item
//! property queries); nothing above this module reaches into `format`,
//! `codec`, or `crypto` directly.

pub mod codec;
#[cfg(feature = "aes")]
pub mod crypto;
pub mod format;
pub mod safety;
pub mod sevenz_read;
pub mod sevenz_write;
pub mod tar;
#[cfg(feature = "lzma")]
pub mod xz;

use std::io::{Read, Seek, Write};

use crate::path::Path;
use crate::{Error, Result, Timestamp};

/// Archive container kind, matching spec.md §4.7's `type` option and §6's
/// per-format capability matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    SevenZip,
    Xz,
    Tar,
}

impl ArchiveFormat {
    /// `xz` carries exactly one item and no password; `tar` any count but
    /// also no password; `7z` is the only format that supports encryption
    /// and multi-volume splitting.
    pub fn supports_encryption(&self) -> bool {
        matches!(self, ArchiveFormat::SevenZip)
    }

    pub fn supports_multivolume(&self) -> bool {
        matches!(self, ArchiveFormat::SevenZip)
    }

    pub fn max_item_count(&self) -> u64 {
        match self {
            ArchiveFormat::Xz => 1,
            ArchiveFormat::SevenZip | ArchiveFormat::Tar => u64::from(u32::MAX),
        }
    }

    /// `tar` is store-only; `xz` is always LZMA2.
    pub fn forces_store_only(&self) -> bool {
        matches!(self, ArchiveFormat::Tar)
    }
}

/// Format-agnostic view of one archive entry's metadata, as surfaced by a
/// [`ReadEngine`] implementation and consumed by `coder::Decoder` to build
/// [`crate::Item`] values.
#[derive(Debug, Clone)]
pub struct EngineItemInfo {
    pub path: String,
    pub index: u32,
    pub size: u64,
    pub pack_size: u64,
    pub crc32: Option<u32>,
    pub creation_time: Option<Timestamp>,
    pub access_time: Option<Timestamp>,
    pub modification_time: Option<Timestamp>,
    pub encrypted: bool,
    pub is_dir: bool,
}

/// Source material for one item an [`crate::coder::Encoder`] has queued,
/// translated into the property bag the engine needs at `compress()` time.
#[derive(Debug, Clone)]
pub struct EngineItemProperties {
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub creation_time: Option<Timestamp>,
    pub access_time: Option<Timestamp>,
    pub modification_time: Option<Timestamp>,
}

/// The fixed operation surface `coder::Decoder` drives, common to every
/// container format this engine understands. No method here leaks a
/// format-specific type; `coder` never downcasts back to `Archive<R>` or
/// `XzReader<R>`.
pub trait ReadEngine {
    fn format(&self) -> ArchiveFormat;

    fn item_count(&self) -> u32;

    /// Whether entries share compressed blocks, so `coder` must still
    /// decode skipped items' bytes even when their output is discarded.
    fn is_solid(&self) -> bool {
        false
    }

    fn comment(&self) -> Option<String> {
        None
    }

    fn item_info(&self, index: u32) -> Result<EngineItemInfo>;

    /// Decompresses one item's content into `sink`, returning the byte
    /// count written.
    fn extract_item(&mut self, index: u32, sink: &mut dyn Write) -> Result<u64>;

    /// Decompresses one item without retaining its bytes, verifying any
    /// checksum the container carries.
    fn test_item(&mut self, index: u32) -> Result<()>;
}

/// The fixed operation surface `coder::Encoder` drives to build an archive
/// of any supported format.
pub trait WriteEngine {
    fn add_directory(&mut self, props: EngineItemProperties) -> Result<()>;

    fn add_file(&mut self, props: EngineItemProperties, source: &mut dyn Read) -> Result<()>;

    /// Flushes and closes the archive. Consumes `self` so no further writes
    /// can happen afterward, matching the coder's `Closed` terminal state.
    fn finish(self: Box<Self>) -> Result<()>;
}

fn item_out_of_range(index: u32) -> Error {
    Error::InvalidFormat(format!("item index {index} out of range"))
}

impl<R: Read + Seek> ReadEngine for sevenz_read::Archive<R> {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::SevenZip
    }

    fn item_count(&self) -> u32 {
        self.len() as u32
    }

    fn is_solid(&self) -> bool {
        self.info().is_solid
    }

    fn comment(&self) -> Option<String> {
        sevenz_read::Archive::comment(self).map(str::to_string)
    }

    fn item_info(&self, index: u32) -> Result<EngineItemInfo> {
        let entry = self
            .entries()
            .get(index as usize)
            .ok_or_else(|| item_out_of_range(index))?;

        Ok(EngineItemInfo {
            path: entry.path.as_str().to_string(),
            index,
            size: entry.size,
            pack_size: 0,
            crc32: entry.crc32,
            creation_time: entry.creation_timestamp(),
            access_time: entry.access_timestamp(),
            modification_time: entry.modification_timestamp(),
            encrypted: entry.is_encrypted,
            is_dir: entry.is_directory,
        })
    }

    fn extract_item(&mut self, index: u32, sink: &mut dyn Write) -> Result<u64> {
        self.extract_entry_to_writer_by_index(index as usize, sink)
    }

    fn test_item(&mut self, index: u32) -> Result<()> {
        self.test_entry_by_index(index as usize)
    }
}

impl<W: std::io::Write + Seek> WriteEngine for sevenz_write::Writer<W> {
    fn add_directory(&mut self, props: EngineItemProperties) -> Result<()> {
        let archive_path = Path::new_item_path(&props.path)?;
        let meta = sevenz_write::EntryMeta {
            creation_time: props.creation_time.map(|t| t.as_filetime()),
            access_time: props.access_time.map(|t| t.as_filetime()),
            modification_time: props.modification_time.map(|t| t.as_filetime()),
            ..sevenz_write::EntryMeta::directory()
        };
        sevenz_write::Writer::add_directory(self, archive_path, meta)
    }

    fn add_file(&mut self, props: EngineItemProperties, source: &mut dyn Read) -> Result<()> {
        let archive_path = Path::new_item_path(&props.path)?;
        let meta = sevenz_write::EntryMeta {
            creation_time: props.creation_time.map(|t| t.as_filetime()),
            access_time: props.access_time.map(|t| t.as_filetime()),
            modification_time: props.modification_time.map(|t| t.as_filetime()),
            ..sevenz_write::EntryMeta::file(props.size)
        };
        sevenz_write::Writer::add_stream(self, archive_path, source, meta)
    }

    fn finish(self: Box<Self>) -> Result<()> {
        (*self).finish_into_inner().map(|_| ())
    }
}

#[cfg(feature = "lzma")]
impl<R: Read + Seek + Send> ReadEngine for xz::XzReader<R> {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Xz
    }

    fn item_count(&self) -> u32 {
        1
    }

    fn item_info(&self, index: u32) -> Result<EngineItemInfo> {
        if index != 0 {
            return Err(item_out_of_range(index));
        }
        Ok(EngineItemInfo {
            path: String::new(),
            index: 0,
            size: self.uncompressed_size(),
            pack_size: 0,
            crc32: None,
            creation_time: None,
            access_time: None,
            modification_time: None,
            encrypted: false,
            is_dir: false,
        })
    }

    fn extract_item(&mut self, index: u32, sink: &mut dyn Write) -> Result<u64> {
        if index != 0 {
            return Err(item_out_of_range(index));
        }
        self.extract(sink)
    }

    fn test_item(&mut self, index: u32) -> Result<()> {
        self.extract_item(index, &mut std::io::sink()).map(|_| ())
    }
}

impl<R: Read + Seek> ReadEngine for tar::TarReader<R> {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Tar
    }

    fn item_count(&self) -> u32 {
        self.entries().len() as u32
    }

    fn item_info(&self, index: u32) -> Result<EngineItemInfo> {
        let entry = self
            .entries()
            .get(index as usize)
            .ok_or_else(|| item_out_of_range(index))?;

        Ok(EngineItemInfo {
            path: entry.path.clone(),
            index,
            size: entry.size,
            pack_size: entry.size,
            crc32: None,
            creation_time: None,
            access_time: None,
            modification_time: Timestamp::from_unix_secs(entry.mtime as i64),
            encrypted: false,
            is_dir: entry.is_dir,
        })
    }

    fn extract_item(&mut self, index: u32, sink: &mut dyn Write) -> Result<u64> {
        tar::TarReader::extract(self, index as usize, sink)
    }

    fn test_item(&mut self, index: u32) -> Result<()> {
        self.extract_item(index, &mut std::io::sink()).map(|_| ())
    }
}

#[cfg(feature = "lzma")]
impl<W: Write> WriteEngine for xz::XzWriter<W> {
    fn add_directory(&mut self, props: EngineItemProperties) -> Result<()> {
        xz::XzWriter::add_directory(self, &props.path)
    }

    fn add_file(&mut self, props: EngineItemProperties, source: &mut dyn Read) -> Result<()> {
        let mut data = Vec::with_capacity(props.size as usize);
        source.read_to_end(&mut data).map_err(Error::Io)?;
        xz::XzWriter::add_file(self, &props.path, data)
    }

    fn finish(self: Box<Self>) -> Result<()> {
        (*self).finish().map(|_| ())
    }
}

impl<W: std::io::Write> WriteEngine for tar::TarWriter<W> {
    fn add_directory(&mut self, props: EngineItemProperties) -> Result<()> {
        let mtime = props.modification_time.map(|t| t.as_unix_secs()).unwrap_or(0);
        tar::TarWriter::add_directory(self, &props.path, mtime.max(0) as u64)
    }

    fn add_file(&mut self, props: EngineItemProperties, source: &mut dyn Read) -> Result<()> {
        let mtime = props.modification_time.map(|t| t.as_unix_secs()).unwrap_or(0);
        let mut data = Vec::with_capacity(props.size as usize);
        source.read_to_end(&mut data).map_err(Error::Io)?;
        tar::TarWriter::add_file(self, &props.path, &data, mtime.max(0) as u64)
    }

    fn finish(self: Box<Self>) -> Result<()> {
        (*self).finish().map(|_| ())
    }
}
