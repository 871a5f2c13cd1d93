//! Readable, seekable byte sources, per spec.md §4.3.

use std::fs::File;
use std::io::{self, Read, Seek};
use std::sync::{Arc, Mutex};

use crate::path::Path;
use crate::stream::{EraseMode, SeekOrigin};
use crate::{Error, Result};

/// User-supplied callback set for a callback-driven [`InStream`], mirroring
/// the `{ open, close, seek, read }` contract of spec.md §6.
pub trait InStreamCallbacks: Send {
    fn open(&mut self) -> bool;
    fn close(&mut self);
    /// Returns the resulting absolute position, or `None` on failure.
    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Option<u64>;
    /// Returns bytes read, or `None` on failure. `Some(0)` signals EOF.
    fn read(&mut self, buf: &mut [u8]) -> Option<usize>;
}

enum Inner {
    Path {
        path: Path,
        file: Option<File>,
    },
    /// Owned copy of caller-supplied bytes.
    Memory {
        data: Arc<Vec<u8>>,
        pos: u64,
        opened: bool,
    },
    /// Borrowed bytes with a finalizer invoked exactly once, at drop.
    ///
    /// # Safety
    /// The caller guarantees `ptr..ptr+len` remains valid until `free` runs.
    Borrowed {
        ptr: *mut u8,
        len: usize,
        pos: u64,
        opened: bool,
        free: Option<Box<dyn FnOnce() + Send>>,
    },
    Callback {
        cb: Box<dyn InStreamCallbacks>,
        opened: bool,
    },
    /// Concatenation of sub-streams presented as one logical stream.
    MultiVolume {
        parts: Vec<InStream>,
        /// `prefix[i]` = total size of parts before part `i`; computed lazily
        /// at the first `seek`, per spec.md §4.3.
        prefix: Option<Vec<u64>>,
        pos: u64,
        opened: bool,
    },
}

// Safety: the raw pointer in `Borrowed` is only dereferenced while the
// `Mutex<Inner>` guard is held, and `free` is `Send`.
unsafe impl Send for Inner {}

impl Drop for Inner {
    /// Runs `Borrowed`'s finalizer if `erase()` hasn't already taken it,
    /// so the caller's `free` callback fires exactly once regardless of
    /// whether the handle was erased explicitly or just dropped.
    fn drop(&mut self) {
        if let Inner::Borrowed { free, .. } = self {
            if let Some(free) = free.take() {
                free();
            }
        }
    }
}

/// A readable, seekable byte source. Cheaply [`Clone`]-able: clones share the
/// same underlying state, letting a coder retain one handle while another is
/// moved into the archive engine as its `Read + Seek` generic.
#[derive(Clone)]
pub struct InStream(Arc<Mutex<Inner>>);

impl InStream {
    fn wrap(inner: Inner) -> Self {
        Self(Arc::new(Mutex::new(inner)))
    }

    /// Opens on `open()`, closes on `close()`, matching spec.md §4.3.
    pub fn from_path(path: Path) -> Self {
        Self::wrap(Inner::Path { path, file: None })
    }

    /// Duplicates `data`, taking ownership of the copy.
    pub fn from_memory_copy(data: impl Into<Vec<u8>>) -> Self {
        Self::wrap(Inner::Memory {
            data: Arc::new(data.into()),
            pos: 0,
            opened: false,
        })
    }

    /// Wraps borrowed memory, invoking `free` exactly once at drop.
    ///
    /// # Safety
    /// `ptr` must remain valid for `len` bytes for as long as any clone of
    /// the returned [`InStream`] is alive.
    pub unsafe fn from_borrowed(
        ptr: *mut u8,
        len: usize,
        free: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self::wrap(Inner::Borrowed {
            ptr,
            len,
            pos: 0,
            opened: false,
            free: Some(Box::new(free)),
        })
    }

    pub fn from_callbacks(cb: impl InStreamCallbacks + 'static) -> Self {
        Self::wrap(Inner::Callback {
            cb: Box::new(cb),
            opened: false,
        })
    }

    /// Concatenates `parts` into one monotonic virtual offset space.
    pub fn from_parts(parts: Vec<InStream>) -> Self {
        Self::wrap(Inner::MultiVolume {
            parts,
            prefix: None,
            pos: 0,
            opened: false,
        })
    }

    pub fn open(&self) -> Result<()> {
        let mut inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *inner {
            Inner::Path { path, file } => {
                *file = Some(path.open_file_read()?);
            }
            Inner::Memory { pos, opened, .. } => {
                *pos = 0;
                *opened = true;
            }
            Inner::Borrowed { pos, opened, .. } => {
                *pos = 0;
                *opened = true;
            }
            Inner::Callback { cb, opened } => {
                if !cb.open() {
                    return Err(Error::internal("callback stream failed to open", None));
                }
                *opened = true;
            }
            Inner::MultiVolume { parts, pos, opened, .. } => {
                for part in parts.iter() {
                    part.open()?;
                }
                *pos = 0;
                *opened = true;
            }
        }
        Ok(())
    }

    pub fn close(&self) {
        let mut inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *inner {
            Inner::Path { file, .. } => *file = None,
            Inner::Memory { opened, .. } => *opened = false,
            Inner::Borrowed { opened, .. } => *opened = false,
            Inner::Callback { cb, opened } => {
                cb.close();
                *opened = false;
            }
            Inner::MultiVolume { parts, opened, .. } => {
                for part in parts.iter() {
                    part.close();
                }
                *opened = false;
            }
        }
    }

    pub fn opened(&self) -> bool {
        let inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &*inner {
            Inner::Path { file, .. } => file.is_some(),
            Inner::Memory { opened, .. } => *opened,
            Inner::Borrowed { opened, .. } => *opened,
            Inner::Callback { opened, .. } => *opened,
            Inner::MultiVolume { opened, .. } => *opened,
        }
    }

    /// Overwrites memory-backed content with zeros (if requested) then
    /// releases it. Path/callback/multi-volume variants cannot erase and
    /// return `false`.
    pub fn erase(&self, mode: EraseMode) -> bool {
        let mut inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *inner {
            Inner::Memory { data, .. } => {
                if mode == EraseMode::ZeroFill {
                    if let Some(buf) = Arc::get_mut(data) {
                        buf.iter_mut().for_each(|b| *b = 0);
                    }
                }
                *data = Arc::new(Vec::new());
                true
            }
            Inner::Borrowed { ptr, len, free, .. } => {
                if mode == EraseMode::ZeroFill {
                    // Safety: `ptr..ptr+len` is guaranteed valid by the
                    // constructor's caller for the handle's lifetime.
                    unsafe {
                        std::ptr::write_bytes(*ptr, 0, *len);
                    }
                }
                if let Some(free) = free.take() {
                    free();
                }
                true
            }
            _ => false,
        }
    }

    fn total_len(&self) -> Option<u64> {
        let inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &*inner {
            Inner::Memory { data, .. } => Some(data.len() as u64),
            Inner::Borrowed { len, .. } => Some(*len as u64),
            Inner::Path { path, .. } => path.stat().ok().map(|s| s.size),
            Inner::MultiVolume { parts, .. } => {
                let mut total = 0u64;
                for p in parts {
                    total = total.checked_add(p.total_len()?)?;
                }
                Some(total)
            }
            Inner::Callback { .. } => None,
        }
    }

    fn read_locked(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *inner {
            Inner::Path { file, .. } => {
                let file = file
                    .as_mut()
                    .ok_or_else(|| io::Error::other("stream not opened"))?;
                file.read(buf)
            }
            Inner::Memory { data, pos, opened } => {
                if !*opened {
                    return Err(io::Error::other("stream not opened"));
                }
                let start = (*pos).min(data.len() as u64) as usize;
                let n = (&data[start..]).read(buf)?;
                *pos += n as u64;
                Ok(n)
            }
            Inner::Borrowed { ptr, len, pos, opened, .. } => {
                if !*opened {
                    return Err(io::Error::other("stream not opened"));
                }
                let start = (*pos).min(*len as u64) as usize;
                let remaining = *len - start;
                let n = remaining.min(buf.len());
                if n > 0 {
                    // Safety: `start+n <= len`, `ptr` valid per constructor contract.
                    unsafe {
                        std::ptr::copy_nonoverlapping(ptr.add(start), buf.as_mut_ptr(), n);
                    }
                }
                *pos += n as u64;
                Ok(n)
            }
            Inner::Callback { cb, opened } => {
                if !*opened {
                    return Err(io::Error::other("stream not opened"));
                }
                cb.read(buf)
                    .ok_or_else(|| io::Error::other("callback stream read failed"))
            }
            Inner::MultiVolume { parts, prefix, pos, opened } => {
                if !*opened {
                    return Err(io::Error::other("stream not opened"));
                }
                let prefix = ensure_prefix_sums(parts, prefix)?;
                read_multivolume(parts, &prefix, pos, buf)
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
                seek_io(file, offset, origin).map_err(Error::Io)
            }
            Inner::Memory { data, pos, .. } => {
                *pos = resolve_seek(*pos, data.len() as u64, offset, origin)?;
                Ok(*pos)
            }
            Inner::Borrowed { len, pos, .. } => {
                *pos = resolve_seek(*pos, *len as u64, offset, origin)?;
                Ok(*pos)
            }
            Inner::Callback { cb, .. } => cb
                .seek(offset, origin)
                .ok_or_else(|| Error::internal("callback stream seek failed", None)),
            Inner::MultiVolume { parts, prefix, pos, .. } => {
                let computed = ensure_prefix_sums(parts, prefix).map_err(Error::Io)?;
                let total = *computed.last().unwrap_or(&0);
                *pos = resolve_seek(*pos, total, offset, origin)?;
                Ok(*pos)
            }
        }
    }
}

fn ensure_prefix_sums(parts: &[InStream], cache: &mut Option<Vec<u64>>) -> io::Result<Vec<u64>> {
    if let Some(p) = cache {
        return Ok(p.clone());
    }
    let mut prefix = Vec::with_capacity(parts.len() + 1);
    let mut total = 0u64;
    prefix.push(0);
    for part in parts {
        let len = part
            .total_len()
            .ok_or_else(|| io::Error::other("multi-volume part has unknown length"))?;
        total += len;
        prefix.push(total);
    }
    *cache = Some(prefix.clone());
    Ok(prefix)
}

fn read_multivolume(
    parts: &[InStream],
    prefix: &[u64],
    pos: &mut u64,
    buf: &mut [u8],
) -> io::Result<usize> {
    let total = *prefix.last().unwrap_or(&0);
    if *pos >= total || buf.is_empty() {
        return Ok(0);
    }
    let part_index = match prefix.binary_search(pos) {
        Ok(i) if i < parts.len() => i,
        Ok(i) => i - 1,
        Err(i) => i - 1,
    };
    let within = *pos - prefix[part_index];
    let part = &parts[part_index];
    part.seek_locked(within as i64, SeekOrigin::Start)
        .map_err(|_| io::Error::other("multi-volume part seek failed"))?;
    let n = part.read_locked(buf)?;
    *pos += n as u64;
    Ok(n)
}

fn seek_io<S: Seek>(stream: &mut S, offset: i64, origin: SeekOrigin) -> io::Result<u64> {
    let from = match origin {
        SeekOrigin::Start => io::SeekFrom::Start(offset.max(0) as u64),
        SeekOrigin::Current => io::SeekFrom::Current(offset),
        SeekOrigin::End => io::SeekFrom::End(offset),
    };
    stream.seek(from)
}

/// Resolves a seek against a known logical length, allowing seeks past the
/// end (callers probe this way), per spec.md §4.3.
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

impl Read for InStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_locked(buf)
    }
}

impl Seek for InStream {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_stream_reads_back_content() {
        let s = InStream::from_memory_copy(b"hello".to_vec());
        s.open().unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(s.clone().read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        s.close();
    }

    #[test]
    fn seek_past_end_of_empty_stream_yields_zero() {
        let s = InStream::from_memory_copy(Vec::new());
        s.open().unwrap();
        let pos = s.clone().seek(io::SeekFrom::End(0)).unwrap();
        assert_eq!(pos, 0);
    }

    #[test]
    fn multivolume_read_chains_across_parts() {
        let a = InStream::from_memory_copy(b"abc".to_vec());
        let b = InStream::from_memory_copy(b"defgh".to_vec());
        let mv = InStream::from_parts(vec![a, b]);
        mv.open().unwrap();
        let mut out = Vec::new();
        let mut mv2 = mv.clone();
        let mut buf = [0u8; 2];
        loop {
            let n = mv2.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"abcdefgh");
    }

    #[test]
    fn borrowed_stream_calls_free_once_on_erase() {
        let mut data = vec![1u8, 2, 3];
        let freed = Arc::new(Mutex::new(false));
        let freed_clone = Arc::clone(&freed);
        let s = unsafe {
            InStream::from_borrowed(data.as_mut_ptr(), data.len(), move || {
                *freed_clone.lock().unwrap() = true;
            })
        };
        s.open().unwrap();
        assert!(s.erase(EraseMode::ZeroFill));
        assert!(*freed.lock().unwrap());
    }

    #[test]
    fn borrowed_stream_calls_free_once_on_plain_drop() {
        let mut data = vec![1u8, 2, 3];
        let freed = Arc::new(Mutex::new(false));
        let freed_clone = Arc::clone(&freed);
        let s = unsafe {
            InStream::from_borrowed(data.as_mut_ptr(), data.len(), move || {
                *freed_clone.lock().unwrap() = true;
            })
        };
        let clone = s.clone();
        drop(s);
        assert!(!*freed.lock().unwrap(), "free must not run until the last clone drops");
        drop(clone);
        assert!(*freed.lock().unwrap());
    }
}
