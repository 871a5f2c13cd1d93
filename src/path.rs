//! Filesystem path with a lazily-materialized wide-character form.
//!
//! The canonical representation is UTF-8 (a `String`); a UTF-16 form is
//! cached on demand for engine boundaries that expect one and invalidated on
//! every mutating call, per the Design Note on dual string representations
//! preferring a single canonical source.

use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path as StdPath, PathBuf};
use std::sync::Mutex;

use zeroize::Zeroizing;

use crate::{Error, Result};

const RANDOM_COMPONENT_MAX_LENGTH: usize = 32;
const RANDOM_COMPONENT_START_LENGTH: usize = 8;

/// Upper bound on an item path's byte length, well above any real
/// filesystem path limit (Linux `PATH_MAX` is 4 KiB, Windows `MAX_PATH`
/// is ~260); rejects maliciously oversized paths from a hostile archive.
const MAX_ITEM_PATH_LENGTH: usize = 32768;

/// Windows reserved device names, rejected in item paths for portability.
const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

fn is_windows_reserved(name: &str) -> bool {
    let base = match name.find('.') {
        Some(pos) => &name[..pos],
        None => name,
    };
    WINDOWS_RESERVED_NAMES
        .iter()
        .any(|reserved| base.eq_ignore_ascii_case(reserved))
}

/// Metadata snapshot returned by [`Path::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStat {
    pub size: u64,
    pub ctime: u64,
    pub atime: u64,
    pub mtime: u64,
    pub is_dir: bool,
}

/// An owned filesystem path, carrying both UTF-8 and wide forms.
///
/// Equality and ordering compare the canonical UTF-8 form after stripping
/// trailing separators. The narrow form is zeroized on drop (it may carry
/// an in-archive path derived from caller-supplied, possibly sensitive,
/// input) mirroring `engine::crypto::Password`'s handling of secrets.
pub struct Path {
    narrow: Zeroizing<String>,
    wide: Mutex<Option<Vec<u16>>>,
}

impl Path {
    /// Creates a path from a UTF-8 string, normalizing separators.
    pub fn new(s: impl Into<String>) -> Self {
        let mut path = Self {
            narrow: Zeroizing::new(String::new()),
            wide: Mutex::new(None),
        };
        path.set(s.into());
        path
    }

    /// Validates and constructs a path meant to be used as an archive item's
    /// in-archive path: relative, no `.`/`..` segments, no empty segments,
    /// no NUL bytes, no reserved device names, under the archive path length
    /// cap. Grounded in the teacher's entry-path validation (defense against
    /// zip-slip-style path escapes), kept as a constructor check on `Path`
    /// itself rather than a distinct wrapper type (per the Data Model note:
    /// `Item` carries a `Path` directly).
    pub fn new_item_path(s: &str) -> Result<Self> {
        if s.contains('\0') {
            return Err(Error::InvalidArchivePath("contains NUL byte".into()));
        }
        if s.is_empty() {
            return Err(Error::InvalidArchivePath("empty path".into()));
        }
        if s.len() > MAX_ITEM_PATH_LENGTH {
            return Err(Error::InvalidArchivePath(format!(
                "path exceeds maximum length of {MAX_ITEM_PATH_LENGTH} bytes"
            )));
        }
        if s.starts_with('/') || s.starts_with('\\') {
            return Err(Error::InvalidArchivePath("absolute path not allowed".into()));
        }
        if s.ends_with('/') || s.ends_with('\\') {
            return Err(Error::InvalidArchivePath("trailing separator not allowed".into()));
        }
        for segment in s.split(['/', '\\']) {
            if segment.is_empty() {
                return Err(Error::InvalidArchivePath(
                    "empty segment (consecutive separators)".into(),
                ));
            }
            if segment == "." || segment == ".." {
                return Err(Error::InvalidArchivePath(format!(
                    "'{segment}' segment not allowed (path traversal)"
                )));
            }
            if is_windows_reserved(segment) {
                return Err(Error::InvalidArchivePath(format!(
                    "Windows reserved filename '{segment}' not allowed"
                )));
            }
        }
        Ok(Self::new(s))
    }

    /// Replaces the path's content, re-normalizing separators.
    pub fn set(&mut self, s: impl Into<String>) {
        *self.narrow = normalize_separators(&s.into());
        self.invalidate_wide();
    }

    /// Appends a path component, normalizing the joined result.
    pub fn append(&mut self, component: impl AsRef<str>) {
        let component = component.as_ref();
        if self.narrow.is_empty() {
            *self.narrow = component.to_string();
        } else {
            self.narrow.push(std::path::MAIN_SEPARATOR);
            self.narrow.push_str(component);
        }
        *self.narrow = normalize_separators(&self.narrow);
        self.invalidate_wide();
    }

    /// Pure variant of [`Path::append`]: returns a new path, leaves `self`
    /// untouched.
    pub fn appending(&self, component: impl AsRef<str>) -> Self {
        let mut copy = Self::new(self.narrow.as_str().to_string());
        copy.append(component);
        copy
    }

    /// Appends a random lowercase-letter component not already present on
    /// disk, starting at 8 characters and growing by ×1.5 up to 32; fails
    /// with an internal error if no free name is found.
    pub fn append_random_component(&mut self) -> Result<()> {
        let mut length = RANDOM_COMPONENT_START_LENGTH;
        loop {
            let candidate = self.appending(random_lowercase_string(length));
            if !candidate.exists(&mut false) {
                *self.narrow = candidate.narrow.as_str().to_string();
                self.invalidate_wide();
                return Ok(());
            }
            if length >= RANDOM_COMPONENT_MAX_LENGTH {
                return Err(Error::internal(
                    "could not find a free random component up to length 32",
                    None,
                ));
            }
            length = (length * 3 / 2).min(RANDOM_COMPONENT_MAX_LENGTH);
        }
    }

    /// Returns the last path component as its own `Path`.
    pub fn last_component(&self) -> Self {
        let name = StdPath::new(self.narrow.as_str())
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or(self.narrow.as_str());
        Self::new(name.to_string())
    }

    /// Removes the last component in place.
    pub fn remove_last_component(&mut self) {
        if let Some(parent) = StdPath::new(self.narrow.as_str()).parent().and_then(|p| p.to_str()) {
            let parent = parent.to_string();
            *self.narrow = parent;
        } else {
            self.narrow.clear();
        }
        self.invalidate_wide();
    }

    /// Number of Unicode code points in the canonical form.
    pub fn count(&self) -> usize {
        self.narrow.chars().count()
    }

    /// Borrowed UTF-8 view of the canonical form.
    pub fn as_str(&self) -> &str {
        self.narrow.as_str()
    }

    /// Materializes (and caches) the UTF-16 form.
    pub fn as_wide(&self) -> Vec<u16> {
        let mut guard = self.wide.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            *guard = Some(self.narrow.as_str().encode_utf16().collect());
        }
        guard.clone().unwrap_or_default()
    }

    fn invalidate_wide(&mut self) {
        if let Ok(mut guard) = self.wide.lock() {
            if let Some(buf) = guard.as_mut() {
                buf.iter_mut().for_each(|u| *u = 0);
            }
            *guard = None;
        }
    }

    fn std_path(&self) -> &StdPath {
        StdPath::new(self.narrow.as_str())
    }

    /// Checks existence, reporting whether the target is a directory.
    pub fn exists(&self, is_dir: &mut bool) -> bool {
        match fs::symlink_metadata(self.std_path()) {
            Ok(meta) => {
                *is_dir = meta.is_dir();
                true
            }
            Err(_) => {
                *is_dir = false;
                false
            }
        }
    }

    pub fn readable(&self) -> bool {
        File::open(self.std_path()).is_ok()
    }

    pub fn writable(&self) -> bool {
        OpenOptions::new()
            .write(true)
            .open(self.std_path())
            .is_ok()
    }

    pub fn readable_and_writable(&self) -> bool {
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(self.std_path())
            .is_ok()
    }

    /// Returns size and timestamps (as Unix seconds) plus whether the
    /// target is a directory.
    pub fn stat(&self) -> Result<PathStat> {
        let meta = fs::metadata(self.std_path()).map_err(Error::Io)?;
        let to_secs = |t: io::Result<std::time::SystemTime>| {
            t.ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0)
        };
        Ok(PathStat {
            size: meta.len(),
            ctime: to_secs(meta.created()),
            atime: to_secs(meta.accessed()),
            mtime: to_secs(meta.modified()),
            is_dir: meta.is_dir(),
        })
    }

    /// Recursively (post-order) removes the path. With `skip_errors`,
    /// continues past per-entry failures and reports success once the root
    /// is gone or was already absent.
    pub fn remove(&self, skip_errors: bool) -> bool {
        let path = self.std_path();
        let mut is_dir = false;
        if !self.exists(&mut is_dir) {
            return true;
        }

        let result = if is_dir {
            remove_dir_recursive(path, skip_errors)
        } else {
            fs::remove_file(path).map_err(|_| ())
        };

        match result {
            Ok(()) => true,
            Err(()) => skip_errors && !path.exists(),
        }
    }

    /// Creates the leaf directory, optionally walking and creating missing
    /// intermediate components.
    pub fn create_dir(&self, with_intermediates: bool) -> bool {
        if with_intermediates {
            fs::create_dir_all(self.std_path()).is_ok()
        } else {
            fs::create_dir(self.std_path()).is_ok()
        }
    }

    /// Opens a file at this path for reading.
    pub fn open_file_read(&self) -> Result<File> {
        File::open(self.std_path()).map_err(Error::Io)
    }

    /// Opens (creating/truncating) a file at this path for writing.
    pub fn open_file_write(&self) -> Result<File> {
        File::create(self.std_path()).map_err(Error::Io)
    }

    /// Reopens an existing file for writing without truncating its
    /// contents, for in-place patching (e.g. a multi-volume part reopened
    /// after a backward seek).
    pub(crate) fn open_file_for_patch(&self) -> Result<File> {
        OpenOptions::new().write(true).open(self.std_path()).map_err(Error::Io)
    }

    /// Opens this path as a directory iterator. Symlinks are followed only
    /// when `follow_symlinks` is set.
    pub fn open_dir(&self, follow_symlinks: bool) -> Result<DirIterator> {
        DirIterator::new(self.std_path().to_path_buf(), follow_symlinks)
    }

    /// Returns the platform per-user temporary directory, guaranteed
    /// read-write; idempotent across calls.
    pub fn tmp_path() -> Self {
        Self::new(std::env::temp_dir().to_string_lossy().into_owned())
    }

    /// Returns a `std::path::Path` view for interop with `std::fs`.
    pub fn as_std_path(&self) -> &StdPath {
        self.std_path()
    }
}

impl Clone for Path {
    fn clone(&self) -> Self {
        Self::new(self.narrow.as_str().to_string())
    }
}

impl std::fmt::Debug for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Path").field(&self.narrow).finish()
    }
}

impl Drop for Path {
    /// `narrow` zeroizes itself via `Zeroizing`; the wide cache isn't wrapped
    /// in it (it's behind a `Mutex<Option<Vec<u16>>>`), so it's zeroed here
    /// explicitly before the `Vec` is freed.
    fn drop(&mut self) {
        if let Ok(mut guard) = self.wide.lock() {
            if let Some(buf) = guard.as_mut() {
                buf.iter_mut().for_each(|u| *u = 0);
            }
        }
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.narrow.trim_end_matches(std::path::MAIN_SEPARATOR)
            == other.narrow.trim_end_matches(std::path::MAIN_SEPARATOR)
    }
}
impl Eq for Path {}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl From<String> for Path {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for Path {
    fn from(p: PathBuf) -> Self {
        Self::new(p.to_string_lossy().into_owned())
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.narrow.as_str())
    }
}

/// Collapses repeated separators and rewrites them to the host separator,
/// except for a leading scheme prefix (`letter ':' sep [sep]`) which is
/// preserved verbatim so URI-like paths round-trip.
fn normalize_separators(s: &str) -> String {
    let bytes = s.as_bytes();
    let (prefix, rest) = if bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
    {
        let mut end = 3;
        if bytes.len() > 3 && (bytes[3] == b'/' || bytes[3] == b'\\') {
            end = 4;
        }
        (&s[..end], &s[end..])
    } else {
        ("", s)
    };

    let mut out = String::with_capacity(prefix.len() + rest.len());
    out.push_str(prefix);

    let mut last_was_sep = prefix.ends_with(['/', '\\']);
    for c in rest.chars() {
        if c == '/' || c == '\\' {
            if !last_was_sep {
                out.push(std::path::MAIN_SEPARATOR);
            }
            last_was_sep = true;
        } else {
            out.push(c);
            last_was_sep = false;
        }
    }
    out
}

fn remove_dir_recursive(dir: &StdPath, skip_errors: bool) -> std::result::Result<(), ()> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) if skip_errors => return Ok(()),
        Err(_) => return Err(()),
    };

    let mut had_error = false;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let result = if is_dir {
            remove_dir_recursive(&path, skip_errors)
        } else {
            fs::remove_file(&path).map_err(|_| ())
        };
        if result.is_err() {
            had_error = true;
            if !skip_errors {
                return Err(());
            }
        }
    }

    match fs::remove_dir(dir) {
        Ok(()) => Ok(()),
        Err(_) if skip_errors && !had_error => Ok(()),
        Err(_) => Err(()),
    }
}

fn random_lowercase_string(length: usize) -> String {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hash, Hasher};
    use std::time::{SystemTime, UNIX_EPOCH};

    let mut seed = RandomState::new().build_hasher();
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut seed);
    std::process::id().hash(&mut seed);
    let mut state = seed.finish();

    let mut out = String::with_capacity(length);
    for _ in 0..length {
        // xorshift64
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let letter = b'a' + (state % 26) as u8;
        out.push(letter as char);
    }
    out
}

/// One step of depth-first directory traversal.
#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    pub component: String,
    pub path: String,
    pub full_path: String,
    pub is_dir: bool,
}

/// Depth-first directory iterator. Owns its open directory handles and
/// releases them on drop.
pub struct DirIterator {
    root: PathBuf,
    follow_symlinks: bool,
    stack: Vec<fs::ReadDir>,
    rel_stack: Vec<PathBuf>,
}

impl DirIterator {
    fn new(root: PathBuf, follow_symlinks: bool) -> Result<Self> {
        let initial = fs::read_dir(&root).map_err(Error::Io)?;
        Ok(Self {
            root,
            follow_symlinks,
            stack: vec![initial],
            rel_stack: vec![PathBuf::new()],
        })
    }

    /// Explicitly releases directory handles before drop.
    pub fn close(&mut self) {
        self.stack.clear();
        self.rel_stack.clear();
    }
}

impl Iterator for DirIterator {
    type Item = Result<DirEntryInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (reader, rel_base) = match (self.stack.last_mut(), self.rel_stack.last()) {
                (Some(r), Some(b)) => (r, b.clone()),
                _ => return None,
            };

            match reader.next() {
                None => {
                    self.stack.pop();
                    self.rel_stack.pop();
                    continue;
                }
                Some(Err(e)) => return Some(Err(Error::Io(e))),
                Some(Ok(entry)) => {
                    let full_path = entry.path();
                    let component = entry.file_name().to_string_lossy().into_owned();
                    let rel_path = rel_base.join(&component);

                    let file_type = match entry.file_type() {
                        Ok(t) => t,
                        Err(e) => return Some(Err(Error::Io(e))),
                    };

                    let is_symlink = file_type.is_symlink();
                    let is_dir = if is_symlink {
                        if self.follow_symlinks {
                            fs::metadata(&full_path).map(|m| m.is_dir()).unwrap_or(false)
                        } else {
                            false
                        }
                    } else {
                        file_type.is_dir()
                    };

                    if is_dir {
                        if let Ok(reader) = fs::read_dir(&full_path) {
                            self.stack.push(reader);
                            self.rel_stack.push(rel_path.clone());
                        }
                    }

                    return Some(Ok(DirEntryInfo {
                        component,
                        path: rel_path.to_string_lossy().into_owned(),
                        full_path: full_path.to_string_lossy().into_owned(),
                        is_dir,
                    }));
                }
            }
        }
    }
}

impl Drop for DirIterator {
    fn drop(&mut self) {
        self.close();
    }
}
