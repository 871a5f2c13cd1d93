//! Open/list/extract/test orchestration over a [`ReadEngine`], per
//! spec.md §4.6.
//!
//! The decoder owns the archive's input stream and drives the engine
//! synchronously: `open()` constructs the format-specific engine value,
//! `extract`/`test` batch requested indices in slices of
//! [`BATCH_SIZE`] and select a per-item sink the way the original's
//! `process()` helper does (grounded in `plzma_decoder_impl.cpp` and
//! `plzma_extract_callback.cpp`).

use std::fs::File;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crate::coder::callbacks::{ExceptionSlot, PasswordSlot};
use crate::coder::CoderState;
use crate::config::CoderConfig;
use crate::engine::{self, ArchiveFormat, EngineItemInfo, ReadEngine};
use crate::item::Item;
use crate::path::Path;
use crate::progress::ProgressTracker;
use crate::stream::{InStream, OutStream};
use crate::{Error, Result};

#[cfg(feature = "aes")]
use crate::engine::crypto::Password;

/// Upper bound on indices processed per engine invocation (spec.md §4.6).
const BATCH_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Extract,
    Test,
}

/// Where extracted bytes go, for an [`Decoder::extract_all`]/
/// [`Decoder::extract_items`]/[`Decoder::extract_to_streams`] call.
pub enum Destination {
    /// Extract into files under `root`. `items_full_path` preserves the
    /// archive's internal subdirectory structure; otherwise every item is
    /// flattened to its last path component.
    Path { root: Path, items_full_path: bool },
    /// Extract item `index` into its paired stream. Lookup is by binary
    /// search, so every requested index must appear exactly once.
    Streams(Vec<(u32, OutStream)>),
}

struct OpenedArchive {
    engine: Box<dyn ReadEngine + Send>,
}

/// Decodes a 7z/xz/tar archive: lists its directory and extracts or tests
/// entries. See spec.md §4.6 for the state machine this implements.
pub struct Decoder {
    stream: InStream,
    format: ArchiveFormat,
    state: Mutex<CoderState>,
    opened: Mutex<Option<OpenedArchive>>,
    exception: ExceptionSlot,
    password: PasswordSlot,
    progress: Arc<ProgressTracker>,
    config: CoderConfig,
}

impl Decoder {
    /// Creates a decoder over `stream`, to be opened as an archive of
    /// `format`. Does not touch the stream until [`Decoder::open`].
    pub fn new(stream: InStream, format: ArchiveFormat) -> Self {
        Self {
            stream,
            format,
            state: Mutex::new(CoderState::Fresh),
            opened: Mutex::new(None),
            exception: ExceptionSlot::new(),
            password: PasswordSlot::new(),
            progress: Arc::new(ProgressTracker::new()),
            config: CoderConfig::from_process_defaults(),
        }
    }

    /// Overrides the block-size tunables used once the archive is opened.
    /// Has no effect on a decoder that has already opened its archive.
    pub fn with_config(mut self, config: CoderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Sets the password used when opening an encrypted-header 7z archive
    /// or decrypting its content. Rejected builds without the `aes`
    /// feature (see [`PasswordSlot`]).
    #[cfg(feature = "aes")]
    pub fn set_password(&self, password: impl Into<Password>) {
        self.password.set(Some(password.into()));
    }

    fn locked_state(&self) -> std::sync::MutexGuard<'_, CoderState> {
        self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Safe to call from any thread at any state (spec.md §5). The next
    /// engine callback observes the cancellation and the coder becomes
    /// terminal.
    pub fn abort(&self) {
        self.exception.cancel();
        let mut state = self.locked_state();
        if *state != CoderState::Running {
            self.stream.close();
        }
        log::debug!("decoder: {:?} -> Aborted", *state);
        *state = CoderState::Aborted;
    }

    /// Opens the archive and records its item count. Returns `Ok(false)`
    /// without touching the engine if the decoder was aborted first;
    /// any other open failure is raised.
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
        log::debug!("decoder: Fresh -> Opening");

        self.stream.open()?;
        let opened = self.open_engine();

        let mut state = self.locked_state();
        match opened {
            Ok(archive) => {
                log::debug!("decoder: Opening -> Open ({} items)", archive.item_count());
                *self.opened.lock().unwrap_or_else(|p| p.into_inner()) =
                    Some(OpenedArchive { engine: archive });
                *state = CoderState::Open;
                Ok(true)
            }
            Err(err) => {
                log::warn!("decoder: open failed: {err}");
                self.stream.close();
                *state = CoderState::Fresh;
                Err(err)
            }
        }
    }

    fn open_engine(&self) -> Result<Box<dyn ReadEngine + Send>> {
        match self.format {
            ArchiveFormat::SevenZip => self.open_sevenzip(),
            ArchiveFormat::Xz => self.open_xz(),
            ArchiveFormat::Tar => engine::tar::TarReader::open(self.stream.clone())
                .map(|reader| Box::new(reader) as Box<dyn ReadEngine + Send>),
        }
    }

    fn open_sevenzip(&self) -> Result<Box<dyn ReadEngine + Send>> {
        #[cfg(feature = "aes")]
        let archive = match self.password.get() {
            Some(password) => engine::sevenz_read::Archive::open_with_password(self.stream.clone(), password),
            None => engine::sevenz_read::Archive::open(self.stream.clone()),
        };
        #[cfg(not(feature = "aes"))]
        let archive = engine::sevenz_read::Archive::open(self.stream.clone());

        archive.map(|mut archive| {
            archive.set_config(self.config.clone());
            Box::new(archive) as Box<dyn ReadEngine + Send>
        })
    }

    #[cfg(feature = "lzma")]
    fn open_xz(&self) -> Result<Box<dyn ReadEngine + Send>> {
        engine::xz::XzReader::open(self.stream.clone())
            .map(|reader| Box::new(reader) as Box<dyn ReadEngine + Send>)
    }

    #[cfg(not(feature = "lzma"))]
    fn open_xz(&self) -> Result<Box<dyn ReadEngine + Send>> {
        Err(Error::invalid_arguments("xz support requires the `lzma` feature"))
    }

    fn with_opened<T>(&self, f: impl FnOnce(&dyn ReadEngine) -> Result<T>) -> Result<T> {
        let guard = self.opened.lock().unwrap_or_else(|p| p.into_inner());
        let opened = guard
            .as_ref()
            .ok_or_else(|| Error::invalid_arguments("decoder is not open"))?;
        f(opened.engine.as_ref())
    }

    /// Number of items in the archive's directory, or `0` if not open.
    pub fn count(&self) -> u32 {
        self.opened
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .map(|o| o.engine.item_count())
            .unwrap_or(0)
    }

    pub fn item_at(&self, index: u32) -> Result<Item> {
        self.with_opened(|engine| engine.item_info(index).map(item_from_info))
    }

    pub fn items(&self) -> Result<Vec<Item>> {
        self.with_opened(|engine| {
            (0..engine.item_count())
                .map(|i| engine.item_info(i).map(item_from_info))
                .collect()
        })
    }

    /// Extracts every item into files under `root`.
    pub fn extract_all(&self, root: Path, items_full_path: bool) -> Result<bool> {
        let indices = self.all_indices()?;
        self.run(&indices, Some(Destination::Path { root, items_full_path }))
    }

    /// Extracts the requested `indices` into files under `root`.
    pub fn extract_items(&self, indices: &[u32], root: Path, items_full_path: bool) -> Result<bool> {
        self.run(indices, Some(Destination::Path { root, items_full_path }))
    }

    /// Extracts each `(index, stream)` pair's item into its paired stream.
    pub fn extract_to_streams(&self, map: Vec<(u32, OutStream)>) -> Result<bool> {
        let indices: Vec<u32> = map.iter().map(|(i, _)| *i).collect();
        self.run(&indices, Some(Destination::Streams(map)))
    }

    pub fn test_all(&self) -> Result<bool> {
        let indices = self.all_indices()?;
        self.run(&indices, None)
    }

    pub fn test_items(&self, indices: &[u32]) -> Result<bool> {
        self.run(indices, None)
    }

    fn all_indices(&self) -> Result<Vec<u32>> {
        self.with_opened(|engine| Ok((0..engine.item_count()).collect()))
    }

    fn run(&self, indices: &[u32], destination: Option<Destination>) -> Result<bool> {
        {
            let mut state = self.locked_state();
            if *state == CoderState::Aborted || self.exception.is_cancelled() {
                *state = CoderState::Aborted;
                return Ok(false);
            }
            if *state != CoderState::Open {
                return Err(Error::invalid_arguments("decoder is not open"));
            }
            *state = CoderState::Running;
        }

        let mode = if destination.is_some() { Mode::Extract } else { Mode::Test };
        log::debug!("decoder: Open -> Running (mode {mode:?})");
        let mut destination = destination;
        if let Some(Destination::Streams(map)) = destination.as_mut() {
            map.sort_unstable_by_key(|(index, _)| *index);
        }

        let mut sorted: Vec<u32> = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let result = self.run_locked(mode, &sorted, destination.as_ref());
        if let Err(ref err) = result {
            if !matches!(err, Error::Cancelled) {
                log::warn!("decoder: {mode:?} operation failed: {err}");
            }
        }

        let mut state = self.locked_state();
        *state = if self.exception.is_cancelled() {
            CoderState::Aborted
        } else {
            CoderState::Open
        };
        log::debug!("decoder: Running -> {:?}", *state);
        drop(state);

        match result {
            Ok(()) => Ok(true),
            Err(Error::Cancelled) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn run_locked(&self, mode: Mode, sorted: &[u32], destination: Option<&Destination>) -> Result<()> {
        let mut guard = self.opened.lock().unwrap_or_else(|p| p.into_inner());
        let opened = guard
            .as_mut()
            .ok_or_else(|| Error::invalid_arguments("decoder is not open"))?;
        let engine = opened.engine.as_mut();

        let item_count = engine.item_count();
        if let Some(&bad) = sorted.iter().find(|&&i| i >= item_count) {
            return Err(Error::internal(
                format!("requested item index {bad} is not part of this archive's {item_count} items"),
                None,
            ));
        }

        let solid = engine.is_solid();
        self.progress.reset();
        self.progress.set_parts_count(sorted.len().max(1) as u32);
        let mut part_number = 0u32;

        for batch in sorted.chunks(BATCH_SIZE) {
            if self.exception.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let first = *batch.first().expect("chunks() never yields an empty slice");
            let last = *batch.last().expect("chunks() never yields an empty slice");

            let visit: Box<dyn Iterator<Item = (u32, bool)>> = if solid {
                Box::new((first..=last).map(|i| (i, batch.binary_search(&i).is_ok())))
            } else {
                Box::new(batch.iter().map(|&i| (i, true)))
            };

            for (index, requested) in visit {
                if self.exception.is_cancelled() {
                    return Err(Error::Cancelled);
                }

                let info = engine.item_info(index)?;
                part_number += 1;
                self.progress.begin_part(part_number, info.path.clone());

                match mode {
                    Mode::Test if requested => {
                        if !info.is_dir {
                            engine.test_item(index)?;
                        }
                    }
                    Mode::Test => {}
                    Mode::Extract if !requested => {
                        if !info.is_dir {
                            engine.extract_item(index, &mut io::sink())?;
                        }
                    }
                    Mode::Extract => {
                        let destination = destination.expect("extract mode always has a destination");
                        self.extract_one(engine, destination, index, &info)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn extract_one(
        &self,
        engine: &mut dyn ReadEngine,
        destination: &Destination,
        index: u32,
        info: &EngineItemInfo,
    ) -> Result<()> {
        match destination {
            Destination::Streams(map) => {
                let pos = map
                    .binary_search_by_key(&index, |(i, _)| *i)
                    .map_err(|_| Error::internal(format!("no output stream registered for item {index}"), None))?;
                let mut sink = map[pos].1.clone();
                sink.open()?;
                engine.extract_item(index, &mut sink)?;
                sink.close()?;
                Ok(())
            }
            Destination::Path { root, items_full_path } => {
                if info.is_dir {
                    let dir_path = self.item_output_path(root, info, *items_full_path)?;
                    dir_path.create_dir(true);
                    return Ok(());
                }
                let file_path = self.item_output_path(root, info, *items_full_path)?;
                if self.format == ArchiveFormat::Xz {
                    let mut is_dir = false;
                    if file_path.exists(&mut is_dir) && is_dir {
                        return Err(Error::invalid_arguments(
                            "xz extraction target exists and is a directory",
                        ));
                    }
                }
                let mut parent = file_path.clone();
                parent.remove_last_component();
                parent.create_dir(true);

                let mut file: File = file_path.open_file_write()?;
                engine.extract_item(index, &mut file)?;
                file.flush().map_err(Error::Io)?;
                Ok(())
            }
        }
    }

    /// Builds the on-disk output path for one item, per spec.md §4.6's
    /// per-item sink selection rules. xz carries no internal path, so its
    /// single item is written directly to `root`.
    fn item_output_path(&self, root: &Path, info: &EngineItemInfo, items_full_path: bool) -> Result<Path> {
        if self.format == ArchiveFormat::Xz {
            return Ok(root.clone());
        }

        let mut out = root.clone();
        if items_full_path {
            for component in info.path.split(['/', '\\']).filter(|c| !c.is_empty()) {
                if component == ".." {
                    return Err(Error::PathTraversal {
                        entry_index: info.index as usize,
                        path: info.path.clone(),
                    });
                }
                out.append(component);
            }
        } else {
            let last = info
                .path
                .rsplit(['/', '\\'])
                .find(|c| !c.is_empty())
                .unwrap_or(info.path.as_str());
            out.append(last);
        }
        Ok(out)
    }
}

fn item_from_info(info: EngineItemInfo) -> Item {
    let mut item = Item::new(Path::new(info.path), info.index);
    item.set_size(info.size);
    item.set_pack_size(info.pack_size);
    item.set_crc32(info.crc32);
    item.set_creation_time(info.creation_time);
    item.set_access_time(info.access_time);
    item.set_modification_time(info.modification_time);
    item.set_encrypted(info.encrypted);
    item.set_directory(info.is_dir);
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sevenz_write::Writer;
    use crate::path::Path;

    fn make_7z(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = Writer::create(io::Cursor::new(Vec::new())).unwrap();
        for (name, data) in entries {
            writer
                .add_bytes(Path::new_item_path(*name).unwrap(), data)
                .unwrap();
        }
        let (_, cursor) = writer.finish_into_inner().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn lists_and_extracts_to_memory_streams() {
        let bytes = make_7z(&[("a.txt", b"hello"), ("b.bin", &[0u8, 1, 2, 3])]);
        let decoder = Decoder::new(InStream::from_memory_copy(bytes), ArchiveFormat::SevenZip);
        assert!(decoder.open().unwrap());
        assert_eq!(decoder.count(), 2);

        let items = decoder.items().unwrap();
        assert_eq!(items.len(), 2);
        for (i, item) in items.iter().enumerate() {
            assert_eq!(item.index() as usize, i);
        }

        let sink_a = OutStream::from_memory();
        let sink_b = OutStream::from_memory();
        assert!(decoder
            .extract_to_streams(vec![(0, sink_a.clone()), (1, sink_b.clone())])
            .unwrap());

        assert_eq!(sink_a.copy_content().unwrap(), b"hello");
        assert_eq!(sink_b.copy_content().unwrap(), vec![0u8, 1, 2, 3]);
    }

    #[test]
    fn extracts_correctly_with_a_tiny_decoder_read_block_size() {
        let payload: Vec<u8> = (0u8..=255).cycle().take(5000).collect();
        let bytes = make_7z(&[("big.bin", &payload)]);
        let decoder = Decoder::new(InStream::from_memory_copy(bytes), ArchiveFormat::SevenZip)
            .with_config(CoderConfig::from_process_defaults().with_decoder_read_block_size(16));
        assert!(decoder.open().unwrap());

        let sink = OutStream::from_memory();
        assert!(decoder.extract_to_streams(vec![(0, sink.clone())]).unwrap());
        assert_eq!(sink.copy_content().unwrap(), payload);
    }

    #[test]
    fn abort_before_open_returns_false_without_touching_the_engine() {
        let bytes = make_7z(&[("a.txt", b"hello")]);
        let decoder = Decoder::new(InStream::from_memory_copy(bytes), ArchiveFormat::SevenZip);
        decoder.abort();
        assert!(!decoder.open().unwrap());
        assert_eq!(decoder.count(), 0);
    }

    #[test]
    fn extract_to_streams_with_unknown_index_is_internal_error() {
        let bytes = make_7z(&[("a.txt", b"hello")]);
        let decoder = Decoder::new(InStream::from_memory_copy(bytes), ArchiveFormat::SevenZip);
        assert!(decoder.open().unwrap());
        let err = decoder
            .extract_to_streams(vec![(5, OutStream::from_memory())])
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
    }
}
