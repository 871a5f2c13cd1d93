//! Minimal store-only USTAR reader/writer, per `ArchiveFormat::Tar`'s
//! `forces_store_only` row in `engine::mod`: tar carries entries verbatim,
//! with no compression and no password, so this module is a thin framing
//! layer over 512-byte header/data blocks.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::{Error, Result};

const BLOCK_SIZE: usize = 512;
const NAME_LEN: usize = 100;
const PREFIX_LEN: usize = 155;
const MAGIC: &[u8; 6] = b"ustar\0";

const TYPEFLAG_FILE: u8 = b'0';
const TYPEFLAG_DIR: u8 = b'5';

fn octal_field(value: u64, width: usize) -> Vec<u8> {
    let digits = format!("{:0width$o}\0", value, width = width - 1);
    let mut bytes = digits.into_bytes();
    bytes.truncate(width);
    while bytes.len() < width {
        bytes.push(0);
    }
    bytes
}

fn parse_octal(field: &[u8]) -> u64 {
    let s = std::str::from_utf8(field)
        .unwrap_or("")
        .trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if s.is_empty() {
        return 0;
    }
    u64::from_str_radix(s, 8).unwrap_or(0)
}

fn split_name(path: &str) -> Result<([u8; NAME_LEN], [u8; PREFIX_LEN])> {
    let bytes = path.as_bytes();
    if bytes.len() <= NAME_LEN {
        let mut name = [0u8; NAME_LEN];
        name[..bytes.len()].copy_from_slice(bytes);
        return Ok((name, [0u8; PREFIX_LEN]));
    }

    // Split on the last '/' that keeps both halves within their field
    // widths, matching the USTAR prefix/name split convention.
    let split = path
        .char_indices()
        .rev()
        .find(|&(i, c)| c == '/' && i <= PREFIX_LEN && path.len() - i - 1 <= NAME_LEN)
        .map(|(i, _)| i);

    match split {
        Some(i) => {
            let prefix_str = &path[..i];
            let name_str = &path[i + 1..];
            let mut name = [0u8; NAME_LEN];
            name[..name_str.len()].copy_from_slice(name_str.as_bytes());
            let mut prefix = [0u8; PREFIX_LEN];
            prefix[..prefix_str.len()].copy_from_slice(prefix_str.as_bytes());
            Ok((name, prefix))
        }
        None => Err(Error::InvalidFormat(format!(
            "path too long for ustar header: {path}"
        ))),
    }
}

fn build_header(path: &str, typeflag: u8, size: u64, mtime: u64) -> Result<[u8; BLOCK_SIZE]> {
    let mut header = [0u8; BLOCK_SIZE];
    let (name, prefix) = split_name(path)?;

    header[0..NAME_LEN].copy_from_slice(&name);
    header[100..108].copy_from_slice(&octal_field(0o644, 8)); // mode
    header[108..116].copy_from_slice(&octal_field(0, 8)); // uid
    header[116..124].copy_from_slice(&octal_field(0, 8)); // gid
    header[124..136].copy_from_slice(&octal_field(size, 12));
    header[136..148].copy_from_slice(&octal_field(mtime, 12));
    header[148..156].copy_from_slice(b"        "); // chksum placeholder
    header[156] = typeflag;
    // linkname [157..257] left zeroed
    header[257..263].copy_from_slice(MAGIC);
    header[263..265].copy_from_slice(b"00");
    // uname/gname [265..297][297..329] left zeroed
    header[329..337].copy_from_slice(&octal_field(0, 8)); // devmajor
    header[337..345].copy_from_slice(&octal_field(0, 8)); // devminor
    header[345..345 + prefix.len()].copy_from_slice(&prefix);

    let checksum: u64 = header.iter().map(|&b| u64::from(b)).sum();
    let checksum_field = format!("{:06o}\0 ", checksum);
    header[148..156].copy_from_slice(checksum_field.as_bytes());

    Ok(header)
}

fn pad_len(size: u64) -> usize {
    let rem = (size % BLOCK_SIZE as u64) as usize;
    if rem == 0 { 0 } else { BLOCK_SIZE - rem }
}

/// Writes entries sequentially as USTAR header+data blocks, terminated by
/// the standard two all-zero blocks.
pub struct TarWriter<W> {
    sink: W,
}

impl<W: Write> TarWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn add_directory(&mut self, path: &str, mtime: u64) -> Result<()> {
        let mut name = path.to_string();
        if !name.ends_with('/') {
            name.push('/');
        }
        let header = build_header(&name, TYPEFLAG_DIR, 0, mtime)?;
        self.sink.write_all(&header).map_err(Error::Io)
    }

    pub fn add_file(&mut self, path: &str, data: &[u8], mtime: u64) -> Result<()> {
        let header = build_header(path, TYPEFLAG_FILE, data.len() as u64, mtime)?;
        self.sink.write_all(&header).map_err(Error::Io)?;
        self.sink.write_all(data).map_err(Error::Io)?;
        let pad = pad_len(data.len() as u64);
        if pad > 0 {
            self.sink.write_all(&vec![0u8; pad]).map_err(Error::Io)?;
        }
        Ok(())
    }

    /// Writes the two trailing zero blocks and flushes.
    pub fn finish(mut self) -> Result<W> {
        self.sink.write_all(&[0u8; BLOCK_SIZE * 2]).map_err(Error::Io)?;
        self.sink.flush().map_err(Error::Io)?;
        Ok(self.sink)
    }
}

/// One entry's metadata plus its byte offset in the underlying stream, as
/// parsed from the sequential header blocks.
#[derive(Debug, Clone)]
pub struct TarEntryInfo {
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub mtime: u64,
    data_offset: u64,
}

pub struct TarReader<R> {
    reader: R,
    entries: Vec<TarEntryInfo>,
}

impl<R: Read + Seek> TarReader<R> {
    pub fn open(mut reader: R) -> Result<Self> {
        let mut entries = Vec::new();
        let mut offset = 0u64;

        loop {
            let mut header = [0u8; BLOCK_SIZE];
            reader.seek(SeekFrom::Start(offset)).map_err(Error::Io)?;
            let read = read_full_or_eof(&mut reader, &mut header)?;
            if read == 0 || header.iter().all(|&b| b == 0) {
                break;
            }
            if read < BLOCK_SIZE {
                return Err(Error::InvalidFormat("truncated tar header".into()));
            }

            let size = parse_octal(&header[124..136]);
            let mtime = parse_octal(&header[136..148]);
            let typeflag = header[156];

            let name_field = cstr(&header[0..NAME_LEN]);
            let prefix_field = cstr(&header[345..345 + PREFIX_LEN]);
            let path = if prefix_field.is_empty() {
                name_field
            } else {
                format!("{prefix_field}/{name_field}")
            };

            let is_dir = typeflag == TYPEFLAG_DIR || path.ends_with('/');
            let data_offset = offset + BLOCK_SIZE as u64;

            entries.push(TarEntryInfo {
                path,
                is_dir,
                size,
                mtime,
                data_offset,
            });

            let data_blocks = (size as usize).div_ceil(BLOCK_SIZE) as u64;
            offset = data_offset + data_blocks * BLOCK_SIZE as u64;
        }

        Ok(Self { reader, entries })
    }

    pub fn entries(&self) -> &[TarEntryInfo] {
        &self.entries
    }

    pub fn extract(&mut self, index: usize, sink: &mut dyn Write) -> Result<u64> {
        let entry = self
            .entries
            .get(index)
            .ok_or_else(|| Error::InvalidFormat(format!("tar entry index {index} out of range")))?
            .clone();

        if entry.is_dir {
            return Ok(0);
        }

        self.reader
            .seek(SeekFrom::Start(entry.data_offset))
            .map_err(Error::Io)?;
        let mut remaining = entry.size;
        let mut buf = [0u8; 64 * 1024];
        let mut total = 0u64;
        while remaining > 0 {
            let to_read = buf.len().min(remaining as usize);
            let n = self.reader.read(&mut buf[..to_read]).map_err(Error::Io)?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n]).map_err(Error::Io)?;
            remaining -= n as u64;
            total += n as u64;
        }
        Ok(total)
    }
}

fn cstr(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn read_full_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut read = 0;
    while read < buf.len() {
        match reader.read(&mut buf[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_files_and_directories() {
        let mut buf = Vec::new();
        {
            let mut writer = TarWriter::new(&mut buf);
            writer.add_directory("dir", 1_700_000_000).unwrap();
            writer
                .add_file("dir/file.txt", b"hello world", 1_700_000_000)
                .unwrap();
            writer.finish().unwrap();
        }

        let mut reader = TarReader::open(Cursor::new(buf)).unwrap();
        assert_eq!(reader.entries().len(), 2);
        assert!(reader.entries()[0].is_dir);
        assert_eq!(reader.entries()[1].path, "dir/file.txt");
        assert_eq!(reader.entries()[1].size, 11);

        let mut out = Vec::new();
        reader.extract(1, &mut out).unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn long_path_splits_into_prefix_and_name() {
        let long_dir = "a/".repeat(40);
        let path = format!("{long_dir}file.txt");
        let header = build_header(&path, TYPEFLAG_FILE, 0, 0).unwrap();
        assert_eq!(&header[257..263], MAGIC);
    }

    #[test]
    fn checksum_is_consistent_across_header_rebuilds() {
        let h1 = build_header("a.txt", TYPEFLAG_FILE, 5, 0).unwrap();
        let h2 = build_header("a.txt", TYPEFLAG_FILE, 5, 0).unwrap();
        assert_eq!(h1, h2);
    }
}
