//! Minimal `.xz` container: a single LZMA2-compressed block carrying exactly
//! one item, per `ArchiveFormat::Xz`'s single-item/no-password/no-volume
//! capability row in `engine::mod`.
//!
//! Follows the public xz format (stream header, one block, index, stream
//! footer) closely enough to round-trip through this engine; multi-filter
//! chains, delta filters, and multi-block streams are out of scope here, as
//! this engine never needs to read archives it didn't write.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::checksum::{Checksum, Crc32};
use crate::{Error, Result};

use super::codec::lzma::{Lzma2Encoder, Lzma2EncoderOptions};

const STREAM_MAGIC: [u8; 6] = [0xFD, b'7', b'z', b'X', b'Z', 0x00];
const FOOTER_MAGIC: [u8; 2] = [b'Y', b'Z'];
const CHECK_CRC32: u8 = 0x01;
const FILTER_ID_LZMA2: u64 = 0x21;

/// Writes a variable-length integer in the xz encoding: little-endian
/// base-128 with the continuation bit in the MSB of each byte.
fn write_vint<W: Write>(w: &mut W, mut value: u64) -> io::Result<()> {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            w.write_all(&[byte])?;
            return Ok(());
        }
        w.write_all(&[byte | 0x80])?;
    }
}

fn read_vint<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut value = 0u64;
    for i in 0..9 {
        let mut byte = [0u8; 1];
        r.read_exact(&mut byte)?;
        let byte = byte[0];
        value |= u64::from(byte & 0x7f) << (i * 7);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "xz vint too long",
    ))
}

fn pad_to_4<W: Write>(w: &mut W, written: u64) -> io::Result<()> {
    let rem = (written % 4) as usize;
    if rem != 0 {
        w.write_all(&[0u8; 4][..4 - rem])?;
    }
    Ok(())
}

fn skip_padding<R: Read>(r: &mut R, written: u64) -> io::Result<()> {
    let rem = (written % 4) as usize;
    if rem != 0 {
        let mut buf = [0u8; 4];
        r.read_exact(&mut buf[..4 - rem])?;
    }
    Ok(())
}

/// Writes a complete single-item `.xz` stream to `sink`.
///
/// Returns `(compressed_size, uncompressed_size, crc32)` of the item so the
/// caller can populate an `EngineItemInfo`/`WriteResult` without re-reading.
pub fn write_stream<W: Write>(
    sink: &mut W,
    data: &[u8],
    preset: u32,
) -> Result<(u64, u64, u32)> {
    sink.write_all(&STREAM_MAGIC).map_err(Error::Io)?;
    let stream_flags = [0x00u8, CHECK_CRC32];
    sink.write_all(&stream_flags).map_err(Error::Io)?;
    let flags_crc = Crc32::compute(&stream_flags);
    sink.write_all(&flags_crc.to_le_bytes()).map_err(Error::Io)?;

    let options = Lzma2EncoderOptions::with_preset(preset);
    let properties = Lzma2Encoder::<Vec<u8>>::properties(&options);
    debug_assert_eq!(properties.len(), 1);

    let mut compressed = Vec::new();
    {
        let mut encoder = Lzma2Encoder::new(&mut compressed, &options);
        encoder.write_all(data).map_err(Error::Io)?;
        encoder.try_finish().map_err(Error::Io)?;
    }
    let compressed_size = compressed.len() as u64;
    let uncompressed_size = data.len() as u64;
    let content_crc = Crc32::compute(data);

    let mut header_body = Vec::new();
    let mut block_flags = 0x00u8;
    block_flags |= 0x40; // compressed size present
    block_flags |= 0x80; // uncompressed size present
    header_body.push(block_flags);
    write_vint(&mut header_body, compressed_size).map_err(Error::Io)?;
    write_vint(&mut header_body, uncompressed_size).map_err(Error::Io)?;
    write_vint(&mut header_body, FILTER_ID_LZMA2).map_err(Error::Io)?;
    write_vint(&mut header_body, properties.len() as u64).map_err(Error::Io)?;
    header_body.extend_from_slice(&properties);

    let unpadded_len = 1 + header_body.len() as u64;
    let padded_len = unpadded_len.div_ceil(4) * 4;
    let header_size_field = (padded_len / 4 - 1) as u8;

    let mut header_bytes = Vec::with_capacity(padded_len as usize);
    header_bytes.push(header_size_field);
    header_bytes.extend_from_slice(&header_body);
    while header_bytes.len() < padded_len as usize {
        header_bytes.push(0);
    }
    let header_crc = Crc32::compute(&header_bytes);

    sink.write_all(&header_bytes).map_err(Error::Io)?;
    sink.write_all(&header_crc.to_le_bytes()).map_err(Error::Io)?;

    sink.write_all(&compressed).map_err(Error::Io)?;
    pad_to_4(sink, compressed_size).map_err(Error::Io)?;
    sink.write_all(&content_crc.to_le_bytes()).map_err(Error::Io)?;

    let block_unpadded_size = padded_len + compressed_size.div_ceil(4) * 4 + 4;

    let mut index_body = Vec::new();
    write_vint(&mut index_body, block_unpadded_size).map_err(Error::Io)?;
    write_vint(&mut index_body, uncompressed_size).map_err(Error::Io)?;

    let mut index_bytes = vec![0x00u8];
    write_vint(&mut index_bytes, 1).map_err(Error::Io)?;
    index_bytes.extend_from_slice(&index_body);
    let index_unpadded = index_bytes.len() as u64;
    pad_to_4(&mut index_bytes, index_unpadded).map_err(Error::Io)?;
    let index_crc = Crc32::compute(&index_bytes);

    sink.write_all(&index_bytes).map_err(Error::Io)?;
    sink.write_all(&index_crc.to_le_bytes()).map_err(Error::Io)?;

    let index_size = index_bytes.len() as u64 + 4;
    let backward_size = (index_size / 4 - 1) as u32;

    let mut footer = Vec::with_capacity(6);
    footer.extend_from_slice(&backward_size.to_le_bytes());
    footer.extend_from_slice(&stream_flags);
    let footer_crc = Crc32::compute(&footer);

    sink.write_all(&footer_crc.to_le_bytes()).map_err(Error::Io)?;
    sink.write_all(&footer).map_err(Error::Io)?;
    sink.write_all(&FOOTER_MAGIC).map_err(Error::Io)?;

    Ok((compressed_size, uncompressed_size, content_crc))
}

/// Accumulates the single item a `.xz` stream may carry, writing the
/// complete stream on `finish()`. xz has no directory entries and no
/// incremental write path: the whole item is buffered in memory until the
/// compressed sizes are known, same as [`write_stream`].
pub struct XzWriter<W> {
    sink: W,
    preset: u32,
    item: Option<(String, Vec<u8>)>,
}

impl<W: Write> XzWriter<W> {
    pub fn new(sink: W, preset: u32) -> Self {
        Self { sink, preset, item: None }
    }

    pub fn add_file(&mut self, path: &str, data: Vec<u8>) -> Result<()> {
        if self.item.is_some() {
            return Err(Error::InvalidArguments {
                what: "an xz stream carries exactly one item".into(),
            });
        }
        self.item = Some((path.to_string(), data));
        Ok(())
    }

    pub fn add_directory(&mut self, _path: &str) -> Result<()> {
        Err(Error::InvalidArguments {
            what: "xz archives cannot contain directory entries".into(),
        })
    }

    pub fn finish(mut self) -> Result<W> {
        let (_path, data) = self.item.take().unwrap_or_default();
        write_stream(&mut self.sink, &data, self.preset)?;
        Ok(self.sink)
    }
}

/// A parsed `.xz` stream's single block, ready for extraction.
#[derive(Debug)]
pub struct XzReader<R> {
    reader: R,
    properties: Vec<u8>,
    compressed_offset: u64,
    compressed_size: u64,
    uncompressed_size: u64,
}

impl<R: Read + Seek + Send> XzReader<R> {
    /// Parses the stream header and block header, leaving the reader
    /// positioned at the start of the compressed payload.
    pub fn open(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 6];
        reader.read_exact(&mut magic).map_err(Error::Io)?;
        if magic != STREAM_MAGIC {
            return Err(Error::InvalidFormat("not an xz stream".into()));
        }

        let mut stream_flags = [0u8; 2];
        reader.read_exact(&mut stream_flags).map_err(Error::Io)?;
        let mut flags_crc = [0u8; 4];
        reader.read_exact(&mut flags_crc).map_err(Error::Io)?;
        if Crc32::compute(&stream_flags) != u32::from_le_bytes(flags_crc) {
            return Err(Error::InvalidFormat("xz stream flags CRC mismatch".into()));
        }

        let mut header_size_byte = [0u8; 1];
        reader.read_exact(&mut header_size_byte).map_err(Error::Io)?;
        let padded_len = (u64::from(header_size_byte[0]) + 1) * 4;

        let mut header_body = vec![0u8; (padded_len - 1) as usize];
        reader.read_exact(&mut header_body).map_err(Error::Io)?;
        let mut header_crc = [0u8; 4];
        reader.read_exact(&mut header_crc).map_err(Error::Io)?;

        let mut full_header = Vec::with_capacity(padded_len as usize);
        full_header.push(header_size_byte[0]);
        full_header.extend_from_slice(&header_body);
        if Crc32::compute(&full_header) != u32::from_le_bytes(header_crc) {
            return Err(Error::InvalidFormat("xz block header CRC mismatch".into()));
        }

        let mut cursor = io::Cursor::new(header_body);
        let mut flags_byte = [0u8; 1];
        cursor.read_exact(&mut flags_byte).map_err(Error::Io)?;
        let flags_byte = flags_byte[0];

        let compressed_size = if flags_byte & 0x40 != 0 {
            read_vint(&mut cursor).map_err(Error::Io)?
        } else {
            return Err(Error::InvalidFormat(
                "xz block without compressed size is unsupported".into(),
            ));
        };
        let uncompressed_size = if flags_byte & 0x80 != 0 {
            read_vint(&mut cursor).map_err(Error::Io)?
        } else {
            return Err(Error::InvalidFormat(
                "xz block without uncompressed size is unsupported".into(),
            ));
        };

        let filter_id = read_vint(&mut cursor).map_err(Error::Io)?;
        if filter_id != FILTER_ID_LZMA2 {
            return Err(Error::UnsupportedMethod { method_id: filter_id });
        }
        let props_len = read_vint(&mut cursor).map_err(Error::Io)?;
        let mut properties = vec![0u8; props_len as usize];
        cursor.read_exact(&mut properties).map_err(Error::Io)?;

        let num_filters = (flags_byte & 0x03) + 1;
        if num_filters != 1 {
            return Err(Error::UnsupportedFeature {
                feature: "xz filter chains longer than one",
            });
        }

        let compressed_offset = reader.stream_position().map_err(Error::Io)?;

        Ok(Self {
            reader,
            properties,
            compressed_offset,
            compressed_size,
            uncompressed_size,
        })
    }

    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    /// Decompresses the single block's payload into `sink`, verifying the
    /// trailing CRC-32 check record.
    pub fn extract(&mut self, sink: &mut dyn Write) -> Result<u64> {
        self.reader
            .seek(SeekFrom::Start(self.compressed_offset))
            .map_err(Error::Io)?;
        let bounded = (&mut self.reader).take(self.compressed_size);
        let mut decoder = super::codec::lzma::Lzma2Decoder::new(bounded, &self.properties)?;

        let mut crc = Crc32::new();
        let mut buf = [0u8; 64 * 1024];
        let mut total = 0u64;
        loop {
            let n = decoder.read(&mut buf).map_err(Error::Io)?;
            if n == 0 {
                break;
            }
            crc.update(&buf[..n]);
            sink.write_all(&buf[..n]).map_err(Error::Io)?;
            total += n as u64;
        }
        drop(decoder);

        skip_padding(&mut self.reader, self.compressed_size).map_err(Error::Io)?;
        let mut expected = [0u8; 4];
        self.reader.read_exact(&mut expected).map_err(Error::Io)?;
        let expected = u32::from_le_bytes(expected);
        let actual = crc.finalize();
        if expected != actual {
            return Err(Error::CrcMismatch {
                entry_index: 0,
                entry_name: None,
                expected,
                actual,
            });
        }

        Ok(total)
    }
}
