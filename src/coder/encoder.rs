//! Queue/open/compress orchestration over a [`WriteEngine`], per spec.md
//! §4.7.
//!
//! Shaped after [`crate::coder::decoder::Decoder`]: sources are queued with
//! [`Encoder::add_path`]/[`Encoder::add_directory`]/[`Encoder::add_stream`],
//! `open()` validates the queue and resolves directories into their files
//! without touching the engine, and `compress()` builds the format-specific
//! [`WriteEngine`] and drives it through the resolved items in order
//! (grounded in `plzma_encoder_impl.cpp` and `plzma_update_callback.cpp`'s
//! per-item `GetProperty`/`GetStream` pass).

use std::collections::HashSet;
use std::io::{Seek, SeekFrom};
use std::sync::{Arc, Mutex};

use crate::coder::callbacks::{ExceptionSlot, PasswordSlot};
use crate::coder::CoderState;
use crate::engine::codec::CodecMethod;
use crate::engine::sevenz_write::WriteOptions;
use crate::engine::{self, ArchiveFormat, EngineItemProperties, WriteEngine};
use crate::path::Path;
use crate::progress::ProgressTracker;
use crate::stream::{InStream, OutStream};
use crate::{Error, Result, Timestamp};

#[cfg(feature = "aes")]
use crate::engine::crypto::Password;

/// Whether symlinks are followed while [`Encoder::add_directory`] walks a
/// tree, per spec.md §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectoryMode {
    #[default]
    IgnoreSymlinks,
    FollowSymlinks,
}

/// One source queued for compression. Built by [`Encoder::add_path`],
/// [`Encoder::add_directory`], or [`Encoder::add_stream`]; resolved into
/// one-or-more [`ResolvedItem`]s at [`Encoder::open`].
#[derive(Debug, Clone)]
pub enum AddedSource {
    /// A single on-disk file, stored at `archive_path`.
    Path { disk_path: Path, archive_path: Path },
    /// A directory tree, enumerated once at `open()` time. Every regular
    /// file found is added under `archive_root` (or the archive root if
    /// `None`), joined with its path relative to `disk_path`.
    Directory {
        disk_path: Path,
        archive_root: Option<Path>,
        mode: DirectoryMode,
    },
    /// An in-memory or caller-supplied stream, stored at `archive_path`.
    /// Its size is resolved by opening, seeking to the end, and recording
    /// the position (spec.md §4.7).
    Stream { stream: InStream, archive_path: Path },
}

/// Compression method for a 7z archive, per spec.md §4.7. `xz` always uses
/// `Lzma2` and `tar` ignores this entirely (both per the format's
/// capability matrix in spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncoderMethod {
    Lzma,
    #[default]
    Lzma2,
    Ppmd,
}

impl EncoderMethod {
    fn as_codec(self) -> CodecMethod {
        match self {
            EncoderMethod::Lzma => CodecMethod::Lzma,
            EncoderMethod::Lzma2 => CodecMethod::Lzma2,
            EncoderMethod::Ppmd => CodecMethod::PPMd,
        }
    }
}

/// Per-archive compression options, per spec.md §4.7's option list.
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    pub solid: bool,
    pub compress_header: bool,
    pub compress_header_full: bool,
    pub encrypt_content: bool,
    pub encrypt_header: bool,
    pub store_ctime: bool,
    pub store_atime: bool,
    pub store_mtime: bool,
    /// Clamped to `[0, 9]` when building the engine's write options.
    pub compression_level: u32,
    pub method: EncoderMethod,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            solid: true,
            compress_header: true,
            compress_header_full: true,
            encrypt_content: false,
            encrypt_header: false,
            store_ctime: true,
            store_atime: true,
            store_mtime: true,
            compression_level: 7,
            method: EncoderMethod::Lzma2,
        }
    }
}

impl EncoderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: EncoderMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    pub fn with_solid(mut self, solid: bool) -> Self {
        self.solid = solid;
        self
    }

    pub fn with_encrypt_content(mut self, encrypt: bool) -> Self {
        self.encrypt_content = encrypt;
        self
    }

    pub fn with_encrypt_header(mut self, encrypt: bool) -> Self {
        self.encrypt_header = encrypt;
        self
    }

    pub fn with_store_timestamps(mut self, ctime: bool, atime: bool, mtime: bool) -> Self {
        self.store_ctime = ctime;
        self.store_atime = atime;
        self.store_mtime = mtime;
        self
    }
}

/// One item resolved from the queue, ready to hand to the engine.
struct ResolvedItem {
    archive_path: String,
    size: u64,
    creation_time: Option<Timestamp>,
    access_time: Option<Timestamp>,
    modification_time: Option<Timestamp>,
    source: ItemSource,
}

enum ItemSource {
    DiskFile(Path),
    Stream(InStream),
}

/// Builds a 7z/xz/tar archive: queues sources, validates and resolves them
/// at `open()`, then drives a [`WriteEngine`] through them at `compress()`.
/// See spec.md §4.7 for the state machine this implements.
pub struct Encoder {
    stream: OutStream,
    format: ArchiveFormat,
    options: EncoderOptions,
    queue: Mutex<Vec<AddedSource>>,
    state: Mutex<CoderState>,
    resolved: Mutex<Option<Vec<ResolvedItem>>>,
    exception: ExceptionSlot,
    password: PasswordSlot,
    progress: Arc<ProgressTracker>,
}

impl Encoder {
    /// Creates an encoder over `stream`, to build an archive of `format`
    /// with `options`. Does not touch the stream until [`Encoder::open`].
    pub fn new(stream: OutStream, format: ArchiveFormat, options: EncoderOptions) -> Self {
        Self {
            stream,
            format,
            options,
            queue: Mutex::new(Vec::new()),
            state: Mutex::new(CoderState::Fresh),
            resolved: Mutex::new(None),
            exception: ExceptionSlot::new(),
            password: PasswordSlot::new(),
            progress: Arc::new(ProgressTracker::new()),
        }
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Sets the password used to encrypt content and/or header when
    /// [`EncoderOptions::encrypt_content`]/[`EncoderOptions::encrypt_header`]
    /// are set. Rejected on builds without the `aes` feature.
    #[cfg(feature = "aes")]
    pub fn set_password(&self, password: impl Into<Password>) {
        self.password.set(Some(password.into()));
    }

    fn locked_queue(&self) -> std::sync::MutexGuard<'_, Vec<AddedSource>> {
        self.queue.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    fn locked_state(&self) -> std::sync::MutexGuard<'_, CoderState> {
        self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Queues a single on-disk file to be stored at `archive_path`.
    pub fn add_path(&self, disk_path: Path, archive_path: Path) {
        self.locked_queue().push(AddedSource::Path { disk_path, archive_path });
    }

    /// Queues a directory tree for recursive enumeration at `open()`.
    pub fn add_directory(&self, disk_path: Path, archive_root: Option<Path>, mode: DirectoryMode) {
        self.locked_queue().push(AddedSource::Directory {
            disk_path,
            archive_root,
            mode,
        });
    }

    /// Queues an in-stream source to be stored at `archive_path`.
    pub fn add_stream(&self, stream: InStream, archive_path: Path) {
        self.locked_queue().push(AddedSource::Stream { stream, archive_path });
    }

    /// Safe to call from any thread at any state (spec.md §5).
    pub fn abort(&self) {
        self.exception.cancel();
        let mut state = self.locked_state();
        if *state != CoderState::Running {
            self.stream.close().ok();
        }
        log::debug!("encoder: {:?} -> Aborted", *state);
        *state = CoderState::Aborted;
    }

    /// Validates the queue against spec.md §4.7's rules, resolves it into
    /// a flat item list, and stores it for [`Encoder::compress`]. Returns
    /// `Ok(false)` without resolving anything if the encoder was aborted
    /// first, or if the resolved queue is empty.
    pub fn open(&self) -> Result<bool> {
        {
            let mut state = self.locked_state();
            match *state {
                CoderState::Open => return Ok(true),
                CoderState::Aborted => return Ok(false),
                _ => {}
            }
            if self.exception.is_cancelled() {
                *state = CoderState::Aborted;
                return Ok(false);
            }
            *state = CoderState::Opening;
        }
        log::debug!("encoder: Fresh -> Opening");

        let result = self.validate_and_resolve();

        let mut state = self.locked_state();
        match result {
            Ok(items) if items.is_empty() => {
                log::debug!("encoder: Opening -> Fresh (empty queue)");
                *state = CoderState::Fresh;
                Ok(false)
            }
            Ok(items) => {
                self.stream.open()?;
                log::debug!("encoder: Opening -> Open ({} items)", items.len());
                *self.resolved.lock().unwrap_or_else(|p| p.into_inner()) = Some(items);
                *state = CoderState::Open;
                Ok(true)
            }
            Err(err) => {
                log::warn!("encoder: open failed: {err}");
                *state = CoderState::Fresh;
                Err(err)
            }
        }
    }

    fn validate_and_resolve(&self) -> Result<Vec<ResolvedItem>> {
        #[cfg(not(feature = "aes"))]
        if self.options.encrypt_content || self.options.encrypt_header {
            return Err(Error::invalid_arguments(
                "encryption requires the `aes` feature to be built into this crate",
            ));
        }

        if self.stream.is_multivolume() && !self.format.supports_multivolume() {
            return Err(Error::invalid_arguments(
                "multi-volume output is only supported for 7z archives",
            ));
        }

        let queue = self.locked_queue().clone();
        let mut items = Vec::new();
        let mut seen = HashSet::new();

        for source in &queue {
            match source {
                AddedSource::Path { disk_path, archive_path } => {
                    push_unique(&mut seen, archive_path.as_str())?;
                    let stat = disk_path.stat()?;
                    items.push(ResolvedItem {
                        archive_path: archive_path.as_str().to_string(),
                        size: stat.size,
                        creation_time: Timestamp::from_unix_secs(stat.ctime as i64),
                        access_time: Timestamp::from_unix_secs(stat.atime as i64),
                        modification_time: Timestamp::from_unix_secs(stat.mtime as i64),
                        source: ItemSource::DiskFile(disk_path.clone()),
                    });
                }
                AddedSource::Directory { disk_path, archive_root, mode } => {
                    let follow = matches!(mode, DirectoryMode::FollowSymlinks);
                    for entry in disk_path.open_dir(follow)? {
                        let entry = entry?;
                        if entry.is_dir {
                            continue;
                        }
                        let archive_path = match archive_root {
                            Some(root) => root.appending(&entry.path),
                            None => Path::new(entry.path.clone()),
                        };
                        push_unique(&mut seen, archive_path.as_str())?;

                        let full = disk_path.appending(&entry.path);
                        let stat = full.stat()?;
                        items.push(ResolvedItem {
                            archive_path: archive_path.as_str().to_string(),
                            size: stat.size,
                            creation_time: Timestamp::from_unix_secs(stat.ctime as i64),
                            access_time: Timestamp::from_unix_secs(stat.atime as i64),
                            modification_time: Timestamp::from_unix_secs(stat.mtime as i64),
                            source: ItemSource::DiskFile(full),
                        });
                    }
                }
                AddedSource::Stream { stream, archive_path } => {
                    if archive_path.as_str().is_empty() {
                        return Err(Error::invalid_arguments("stream source requires a non-empty archive path"));
                    }
                    push_unique(&mut seen, archive_path.as_str())?;

                    stream.open()?;
                    let mut probe = stream.clone();
                    let size = probe.seek(SeekFrom::End(0)).map_err(Error::Io)?;
                    stream.close();

                    items.push(ResolvedItem {
                        archive_path: archive_path.as_str().to_string(),
                        size,
                        creation_time: None,
                        access_time: None,
                        modification_time: None,
                        source: ItemSource::Stream(stream.clone()),
                    });
                }
            }
        }

        if items.len() as u64 > u64::from(u32::MAX) {
            return Err(Error::invalid_arguments("archive cannot hold more than 2^32-1 items"));
        }
        if items.len() as u64 > self.format.max_item_count() {
            return Err(Error::invalid_arguments("xz archives carry exactly one item"));
        }

        Ok(items)
    }

    /// Builds the format-specific engine and drives it through every
    /// resolved item, in queue order. Returns `Ok(false)` if cancelled
    /// mid-run; raises any other failure.
    pub fn compress(&self) -> Result<bool> {
        {
            let mut state = self.locked_state();
            if *state == CoderState::Aborted || self.exception.is_cancelled() {
                *state = CoderState::Aborted;
                return Ok(false);
            }
            if *state != CoderState::Open {
                return Err(Error::invalid_arguments("encoder is not open"));
            }
            *state = CoderState::Running;
        }
        log::debug!("encoder: Open -> Running");

        let result = self.compress_locked();
        if let Err(ref err) = result {
            if !matches!(err, Error::Cancelled) {
                log::warn!("encoder: compress failed: {err}");
            }
        }

        let mut state = self.locked_state();
        *state = if self.exception.is_cancelled() {
            CoderState::Aborted
        } else {
            CoderState::Closed
        };
        log::debug!("encoder: Running -> {:?}", *state);
        drop(state);
        self.stream.close().ok();

        match result {
            Ok(()) => Ok(true),
            Err(Error::Cancelled) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn compress_locked(&self) -> Result<()> {
        let items = self
            .resolved
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
            .ok_or_else(|| Error::invalid_arguments("encoder is not open"))?;

        if items.is_empty() {
            // Decided open question: an already-validated but empty queue
            // (only possible if open() is never called to reject it first)
            // compresses to an empty, valid archive rather than failing.
            return Ok(());
        }

        let mut engine = self.build_engine()?;
        self.progress.reset();
        self.progress.set_parts_count(items.len() as u32);

        for (i, item) in items.iter().enumerate() {
            if self.exception.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.progress.begin_part((i + 1) as u32, item.archive_path.clone());

            let props = EngineItemProperties {
                path: item.archive_path.clone(),
                is_dir: false,
                size: item.size,
                creation_time: if self.options.store_ctime { item.creation_time } else { None },
                access_time: if self.options.store_atime { item.access_time } else { None },
                modification_time: if self.options.store_mtime {
                    item.modification_time
                } else {
                    None
                },
            };

            // Spec note: any non-success result here sets the exception slot
            // to an internal error and the source is closed regardless.
            let add_result = match &item.source {
                ItemSource::DiskFile(path) => {
                    let mut file = path.open_file_read()?;
                    engine.add_file(props, &mut file)
                }
                ItemSource::Stream(stream) => {
                    stream.open()?;
                    let mut reader = stream.clone();
                    let result = engine.add_file(props, &mut reader);
                    stream.close();
                    result
                }
            };

            if let Err(err) = add_result {
                let err = Error::internal(format!("failed to add '{}' to the archive", item.archive_path), Some(err));
                self.exception.set(err);
                break;
            }
        }

        if let Some(err) = self.exception.take() {
            return Err(err);
        }

        engine.finish()
    }

    fn build_engine(&self) -> Result<Box<dyn WriteEngine + Send>> {
        match self.format {
            ArchiveFormat::SevenZip => self.build_sevenzip(),
            ArchiveFormat::Xz => self.build_xz(),
            ArchiveFormat::Tar => {
                Ok(Box::new(engine::tar::TarWriter::new(self.stream.clone())) as Box<dyn WriteEngine + Send>)
            }
        }
    }

    fn build_sevenzip(&self) -> Result<Box<dyn WriteEngine + Send>> {
        let mut write_options = WriteOptions::new()
            .method(self.options.method.as_codec())
            .level(self.options.compression_level)?;
        if self.options.solid {
            write_options = write_options.solid();
        }

        #[cfg(feature = "aes")]
        if let Some(password) = self.password.get() {
            write_options = write_options
                .password(password)
                .encrypt_header(self.options.encrypt_header)
                .encrypt_data(self.options.encrypt_content);
        }

        let writer = engine::sevenz_write::Writer::create(self.stream.clone())?.options(write_options);
        Ok(Box::new(writer) as Box<dyn WriteEngine + Send>)
    }

    #[cfg(feature = "lzma")]
    fn build_xz(&self) -> Result<Box<dyn WriteEngine + Send>> {
        let preset = self.options.compression_level.min(9);
        Ok(Box::new(engine::xz::XzWriter::new(self.stream.clone(), preset)) as Box<dyn WriteEngine + Send>)
    }

    #[cfg(not(feature = "lzma"))]
    fn build_xz(&self) -> Result<Box<dyn WriteEngine + Send>> {
        Err(Error::invalid_arguments("xz support requires the `lzma` feature"))
    }
}

fn push_unique(seen: &mut HashSet<String>, archive_path: &str) -> Result<()> {
    if !seen.insert(archive_path.to_string()) {
        return Err(Error::invalid_arguments(format!(
            "duplicate archive path '{archive_path}'"
        )));
    }
    Ok(())
}
