//! Writable, seekable byte sinks, per spec.md §4.4.

use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};

use crate::path::Path;
use crate::stream::{EraseMode, SeekOrigin};
use crate::{Error, Result};

/// Maximum part index for the one defined naming format (`NNN` from `001` to
/// `999`), per spec.md §6.
const MAX_PARTS: u32 = 999;

enum PartSink {
    File(File),
    Memory(Vec<u8>),
}

impl PartSink {
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        match self {
            PartSink::File(f) => {
                f.seek(io::SeekFrom::Start(offset))?;
                f.write_all(buf)
            }
            PartSink::Memory(data) => {
                let end = offset as usize + buf.len();
                if data.len() < end {
                    data.resize(end, 0);
                }
                data[offset as usize..end].copy_from_slice(buf);
                Ok(())
            }
        }
    }

    fn len(&self) -> u64 {
        match self {
            PartSink::File(f) => f.metadata().map(|m| m.len()).unwrap_or(0),
            PartSink::Memory(data) => data.len() as u64,
        }
    }
}

/// Where multi-volume file parts are written; `None` keeps parts entirely
/// in memory.
pub struct VolumeNaming {
    pub dir: Path,
    pub base_name: String,
    pub extension: String,
}

impl VolumeNaming {
    fn part_path(&self, index: u32) -> Path {
        self.dir
            .appending(format!("{}.{}.{:03}", self.base_name, self.extension, index))
    }
}

enum Inner {
    Path {
        path: Path,
        file: Option<File>,
    },
    Memory {
        data: Vec<u8>,
        pos: u64,
        opened: bool,
    },
    /// Discards writes, tracking only the virtual length written.
    Test {
        len: u64,
        pos: u64,
        opened: bool,
    },
    MultiVolume {
        naming: Option<VolumeNaming>,
        part_size: u64,
        /// Closed, finalized parts in order.
        finalized: Vec<OutStream>,
        current: Option<PartSink>,
        /// 1-based index of `current`; 0 when no part has been allocated.
        current_index: u32,
        within_part_offset: u64,
        opened: bool,
    },
}

/// A writable, seekable byte sink. Cheaply [`Clone`]-able for the same
/// reason as [`crate::stream::InStream`].
#[derive(Clone)]
pub struct OutStream(std::sync::Arc<std::sync::Mutex<Inner>>);

impl OutStream {
    fn wrap(inner: Inner) -> Self {
        Self(std::sync::Arc::new(std::sync::Mutex::new(inner)))
    }

    pub fn from_path(path: Path) -> Self {
        Self::wrap(Inner::Path { path, file: None })
    }

    pub fn from_memory() -> Self {
        Self::wrap(Inner::Memory {
            data: Vec::new(),
            pos: 0,
            opened: false,
        })
    }

    pub fn from_test_sink() -> Self {
        Self::wrap(Inner::Test {
            len: 0,
            pos: 0,
            opened: false,
        })
    }

    /// File-backed multi-volume sink, splitting into numbered parts under
    /// `naming.dir`.
    pub fn from_multivolume_file(naming: VolumeNaming, part_size: u64) -> Result<Self> {
        if part_size == 0 || part_size > u32::MAX as u64 {
            return Err(Error::invalid_arguments("partSize out of range [1, 2^32-1]"));
        }
        Ok(Self::wrap(Inner::MultiVolume {
            naming: Some(naming),
            part_size,
            finalized: Vec::new(),
            current: None,
            current_index: 0,
            within_part_offset: 0,
            opened: false,
        }))
    }

    /// Purely in-memory multi-volume sink.
    pub fn from_multivolume_memory(part_size: u64) -> Result<Self> {
        if part_size == 0 || part_size > u32::MAX as u64 {
            return Err(Error::invalid_arguments("partSize out of range [1, 2^32-1]"));
        }
        Ok(Self::wrap(Inner::MultiVolume {
            naming: None,
            part_size,
            finalized: Vec::new(),
            current: None,
            current_index: 0,
            within_part_offset: 0,
            opened: false,
        }))
    }

    pub fn open(&self) -> Result<()> {
        let mut inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *inner {
            Inner::Path { path, file } => *file = Some(path.open_file_write()?),
            Inner::Memory { data, pos, opened } => {
                data.clear();
                *pos = 0;
                *opened = true;
            }
            Inner::Test { len, pos, opened } => {
                *len = 0;
                *pos = 0;
                *opened = true;
            }
            Inner::MultiVolume { opened, .. } => *opened = true,
        }
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        let mut inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *inner {
            Inner::Path { file, .. } => *file = None,
            Inner::Memory { opened, .. } => *opened = false,
            Inner::Test { opened, .. } => *opened = false,
            Inner::MultiVolume {
                naming,
                finalized,
                current,
                current_index,
                opened,
                ..
            } => {
                if let Some(sink) = current.take() {
                    finalize_part(naming.as_ref(), finalized, *current_index, sink)?;
                }
                *opened = false;
            }
        }
        Ok(())
    }

    pub fn opened(&self) -> bool {
        let inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &*inner {
            Inner::Path { file, .. } => file.is_some(),
            Inner::Memory { opened, .. } => *opened,
            Inner::Test { opened, .. } => *opened,
            Inner::MultiVolume { opened, .. } => *opened,
        }
    }

    pub fn erase(&self, mode: EraseMode) -> bool {
        let mut inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *inner {
            Inner::Memory { data, .. } => {
                if mode == EraseMode::ZeroFill {
                    data.iter_mut().for_each(|b| *b = 0);
                }
                data.clear();
                true
            }
            _ => false,
        }
    }

    /// Returns an owned copy of the written bytes. Memory-backed only;
    /// requires the stream be closed.
    pub fn copy_content(&self) -> Result<Vec<u8>> {
        let inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &*inner {
            Inner::Memory { data, opened, .. } => {
                if *opened {
                    return Err(Error::invalid_arguments("copy_content requires a closed stream"));
                }
                Ok(data.clone())
            }
            _ => Err(Error::invalid_arguments("copy_content requires a memory-backed stream")),
        }
    }

    /// Whether this sink splits its output across numbered volume parts.
    pub fn is_multivolume(&self) -> bool {
        let inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        matches!(&*inner, Inner::MultiVolume { .. })
    }

    /// Finalized parts, in order. Multi-volume only; empty while open.
    pub fn streams(&self) -> Vec<OutStream> {
        let inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &*inner {
            Inner::MultiVolume { finalized, .. } => finalized.clone(),
            _ => Vec::new(),
        }
    }

    pub fn set_size(&self, new_size: u64) -> Result<()> {
        let mut inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *inner {
            Inner::Path { file, .. } => {
                let file = file
                    .as_mut()
                    .ok_or_else(|| Error::internal("stream not opened", None))?;
                file.set_len(new_size).map_err(Error::Io)
            }
            Inner::Memory { data, .. } => {
                data.resize(new_size as usize, 0);
                Ok(())
            }
            Inner::Test { len, .. } => {
                *len = new_size;
                Ok(())
            }
            Inner::MultiVolume {
                part_size,
                finalized,
                current,
                current_index,
                within_part_offset,
                ..
            } => set_multivolume_size(
                *part_size,
                finalized,
                current,
                current_index,
                within_part_offset,
                new_size,
            ),
        }
    }

    fn write_locked(&self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *inner {
            Inner::Path { file, .. } => {
                let file = file
                    .as_mut()
                    .ok_or_else(|| io::Error::other("stream not opened"))?;
                file.write(buf)
            }
            Inner::Memory { data, pos, opened } => {
                if !*opened {
                    return Err(io::Error::other("stream not opened"));
                }
                let end = *pos as usize + buf.len();
                if data.len() < end {
                    data.resize(end, 0);
                }
                data[*pos as usize..end].copy_from_slice(buf);
                *pos += buf.len() as u64;
                Ok(buf.len())
            }
            Inner::Test { len, pos, opened } => {
                if !*opened {
                    return Err(io::Error::other("stream not opened"));
                }
                *pos += buf.len() as u64;
                *len = (*len).max(*pos);
                Ok(buf.len())
            }
            Inner::MultiVolume {
                naming,
                part_size,
                finalized,
                current,
                current_index,
                within_part_offset,
                opened,
            } => {
                if !*opened {
                    return Err(io::Error::other("stream not opened"));
                }
                write_multivolume(
                    naming.as_ref(),
                    *part_size,
                    finalized,
                    current,
                    current_index,
                    within_part_offset,
                    buf,
                )
                .map_err(|e| io::Error::other(e.to_string()))
            }
        }
    }

    fn seek_locked(&self, offset: i64, origin: SeekOrigin) -> Result<u64> {
        let mut inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *inner {
            Inner::Path { file, .. } => {
                let file = file
                    .as_mut()
                    .ok_or_else(|| Error::internal("stream not opened", None))?;
                let from = match origin {
                    SeekOrigin::Start => io::SeekFrom::Start(offset.max(0) as u64),
                    SeekOrigin::Current => io::SeekFrom::Current(offset),
                    SeekOrigin::End => io::SeekFrom::End(offset),
                };
                file.seek(from).map_err(Error::Io)
            }
            Inner::Memory { data, pos, .. } => {
                *pos = resolve_seek(*pos, data.len() as u64, offset, origin)?;
                Ok(*pos)
            }
            Inner::Test { len, pos, .. } => {
                *pos = resolve_seek(*pos, *len, offset, origin)?;
                Ok(*pos)
            }
            Inner::MultiVolume {
                naming,
                part_size,
                finalized,
                current,
                current_index,
                within_part_offset,
                ..
            } => {
                let total = multivolume_total_len(*part_size, finalized, current, *current_index);
                let target = resolve_seek(
                    multivolume_current_pos(*part_size, *current_index, *within_part_offset),
                    total,
                    offset,
                    origin,
                )?;
                if target > total {
                    let pad = target - total;
                    let zeros = vec![0u8; pad as usize];
                    write_multivolume(
                        naming.as_ref(),
                        *part_size,
                        finalized,
                        current,
                        current_index,
                        within_part_offset,
                        &zeros,
                    )
                    .map_err(Error::Io)?;
                } else {
                    // Target lies at or before the current write position.
                    // If it falls outside the part currently held in
                    // `current`, that part must be finalized and the part
                    // actually containing `target` loaded as the new
                    // `current` — otherwise subsequent writes land in the
                    // wrong part (e.g. a writer seeking back to offset 0 to
                    // patch a header would corrupt whichever part was last
                    // open instead of part 1).
                    let target_index = (target / *part_size) as u32 + 1;
                    let target_offset = target % *part_size;
                    if target_index != *current_index || current.is_none() {
                        if let Some(sink) = current.take() {
                            finalize_part(naming.as_ref(), finalized, *current_index, sink)?;
                        }
                        *current = Some(activate_part(naming.as_ref(), finalized, target_index)?);
                    }
                    *current_index = target_index;
                    *within_part_offset = target_offset;
                }
                Ok(target)
            }
        }
    }
}

fn resolve_seek(current: u64, len: u64, offset: i64, origin: SeekOrigin) -> Result<u64> {
    let base = match origin {
        SeekOrigin::Start => 0i64,
        SeekOrigin::Current => current as i64,
        SeekOrigin::End => len as i64,
    };
    let target = base
        .checked_add(offset)
        .ok_or_else(|| Error::invalid_arguments("seek offset overflow"))?;
    if target < 0 {
        return Err(Error::invalid_arguments("seek before start of stream"));
    }
    Ok(target as u64)
}

fn multivolume_current_pos(part_size: u64, current_index: u32, within_part_offset: u64) -> u64 {
    if current_index == 0 {
        0
    } else {
        (current_index as u64 - 1) * part_size + within_part_offset
    }
}

fn multivolume_total_len(
    part_size: u64,
    finalized: &[OutStream],
    current: &Option<PartSink>,
    current_index: u32,
) -> u64 {
    let finalized_len = finalized.len() as u64 * part_size;
    match current {
        Some(sink) => finalized_len + sink.len(),
        None => {
            if current_index > finalized.len() as u32 {
                finalized_len
            } else {
                finalized_len
            }
        }
    }
}

/// Stores `sink` as part `index` (1-based) in `finalized`, at the slot
/// `index - 1`: a replace if that slot already holds an earlier version of
/// the same part (a part reactivated by [`activate_part`] and then
/// re-finalized), or a push if `index` is the next sequential part. Parts
/// are never finalized out of order by more than one slot, so those are the
/// only two cases.
fn finalize_part(
    naming: Option<&VolumeNaming>,
    finalized: &mut Vec<OutStream>,
    index: u32,
    sink: PartSink,
) -> Result<()> {
    let stream = match sink {
        PartSink::File(file) => {
            drop(file);
            let path = naming
                .ok_or_else(|| Error::internal("file part finalized without naming", None))?
                .part_path(index);
            OutStream::wrap(Inner::Path { path, file: None })
        }
        PartSink::Memory(data) => OutStream::wrap(Inner::Memory {
            data,
            pos: 0,
            opened: false,
        }),
    };

    let slot = (index - 1) as usize;
    if slot < finalized.len() {
        finalized[slot] = stream;
    } else {
        finalized.push(stream);
    }
    Ok(())
}

fn allocate_part(naming: Option<&VolumeNaming>, index: u32) -> Result<PartSink> {
    if index > MAX_PARTS {
        return Err(Error::invalid_arguments(format!(
            "multi-volume output would exceed {MAX_PARTS} parts"
        )));
    }
    match naming {
        Some(naming) => {
            let path = naming.part_path(index);
            Ok(PartSink::File(path.open_file_write()?))
        }
        None => Ok(PartSink::Memory(Vec::new())),
    }
}

/// Makes part `index` (1-based) the active sink for writes, for a seek that
/// lands outside the part currently held in `current`.
///
/// If `index` already has a finalized entry (an earlier seek or a full part
/// written and closed mid-operation), that entry is reopened in place: the
/// file variant is reopened without truncation so its bytes survive, and the
/// in-memory variant is cloned into a fresh buffer for writes to patch.
/// The entry is left in `finalized` rather than removed — removing it would
/// shift every later part down a slot and break the `index - 1` positional
/// mapping [`finalize_part`] relies on; it is overwritten in place once this
/// part is re-finalized. Otherwise a fresh part is allocated, matching the
/// no-current-part case in `write_multivolume`.
fn activate_part(naming: Option<&VolumeNaming>, finalized: &[OutStream], index: u32) -> Result<PartSink> {
    let slot = (index - 1) as usize;
    match finalized.get(slot) {
        Some(part) => {
            let inner = part.0.lock().unwrap_or_else(|e| e.into_inner());
            match &*inner {
                Inner::Path { path, .. } => Ok(PartSink::File(path.open_file_for_patch()?)),
                Inner::Memory { data, .. } => Ok(PartSink::Memory(data.clone())),
                _ => Err(Error::internal("multi-volume part holds an unexpected stream kind", None)),
            }
        }
        None => allocate_part(naming, index),
    }
}

/// The multi-volume write algorithm of spec.md §4.4.
#[allow(clippy::too_many_arguments)]
fn write_multivolume(
    naming: Option<&VolumeNaming>,
    part_size: u64,
    finalized: &mut Vec<OutStream>,
    current: &mut Option<PartSink>,
    current_index: &mut u32,
    within_part_offset: &mut u64,
    mut buf: &[u8],
) -> Result<usize> {
    let total_requested = buf.len();
    while !buf.is_empty() {
        if current.is_none() {
            *current_index += 1;
            *current = Some(allocate_part(naming, *current_index)?);
            *within_part_offset = 0;
        }
        let room = part_size - *within_part_offset;
        let chunk = room.min(buf.len() as u64) as usize;
        let sink = current.as_mut().expect("current part just allocated");
        sink.write_at(*within_part_offset, &buf[..chunk]).map_err(Error::Io)?;
        *within_part_offset += chunk as u64;
        buf = &buf[chunk..];

        if *within_part_offset >= part_size && !buf.is_empty() {
            let sink = current.take().expect("current part just written");
            finalize_part(naming, finalized, *current_index, sink)?;
        }
    }
    Ok(total_requested)
}

#[allow(clippy::too_many_arguments)]
fn set_multivolume_size(
    part_size: u64,
    finalized: &mut Vec<OutStream>,
    current: &mut Option<PartSink>,
    current_index: &mut u32,
    within_part_offset: &mut u64,
    new_size: u64,
) -> Result<()> {
    let full_parts = (new_size / part_size) as usize;
    let remainder = new_size % part_size;

    if let Some(sink) = current.take() {
        finalize_part(None, finalized, *current_index, sink)?;
    }

    finalized.truncate(full_parts);
    *current_index = full_parts as u32;
    *within_part_offset = 0;

    if remainder > 0 {
        *current_index += 1;
        let mut sink = PartSink::Memory(Vec::new());
        sink.write_at(0, &vec![0u8; remainder as usize]).map_err(Error::Io)?;
        *current = Some(sink);
        *within_part_offset = remainder;
    }
    Ok(())
}

impl Write for OutStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_locked(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for OutStream {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, origin) = match pos {
            io::SeekFrom::Start(n) => (n as i64, SeekOrigin::Start),
            io::SeekFrom::Current(n) => (n, SeekOrigin::Current),
            io::SeekFrom::End(n) => (n, SeekOrigin::End),
        };
        self.seek_locked(offset, origin)
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

impl Read for OutStream {
    /// Supports reading back a closed memory-backed sink's bytes, used by
    /// [`OutStream::copy_content`] callers that prefer the `Read` API.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *inner {
            Inner::Memory { data, pos, .. } => {
                let start = (*pos).min(data.len() as u64) as usize;
                let n = (&data[start..]).read(buf)?;
                *pos += n as u64;
                Ok(n)
            }
            _ => Err(io::Error::other("stream does not support read-back")),
        }
    }
}
