//! # plzma-core
//!
//! An embeddable core for reading and writing 7z, xz, and tar archives.
//!
//! The crate is organized in two layers:
//!
//! - [`engine`] is the archive-format "black box": concrete 7z/xz/tar
//!   readers and writers, each driven through the narrow [`engine::ReadEngine`]
//!   / [`engine::WriteEngine`] traits.
//! - [`coder`] sits above it and exposes the public operation surface:
//!   [`coder::Decoder`] lists and extracts, [`coder::Encoder`] queues sources
//!   and compresses them, both driving whichever engine matches the
//!   requested [`engine::ArchiveFormat`].
//!
//! Everything else ([`path`], [`item`], [`stream`], [`progress`],
//! [`timestamp`], [`checksum`], [`config`]) is shared value/utility plumbing
//! used by both layers.
//!
//! ## Extracting an archive
//!
//! ```rust,no_run
//! use plzma_core::{Decoder, Path, Result};
//! use plzma_core::engine::ArchiveFormat;
//! use plzma_core::stream::InStream;
//!
//! fn main() -> Result<()> {
//!     let decoder = Decoder::new(InStream::from_path(Path::new("archive.7z")), ArchiveFormat::SevenZip);
//!     if decoder.open()? {
//!         for item in decoder.items()? {
//!             println!("{}: {} bytes", item.path().as_str(), item.size());
//!         }
//!         decoder.extract_all(Path::new("./output"), false)?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Creating an archive
//!
//! ```rust,no_run
//! use plzma_core::{Encoder, EncoderOptions, Path, Result};
//! use plzma_core::engine::ArchiveFormat;
//! use plzma_core::stream::OutStream;
//!
//! fn main() -> Result<()> {
//!     let encoder = Encoder::new(
//!         OutStream::from_path(Path::new("archive.7z")),
//!         ArchiveFormat::SevenZip,
//!         EncoderOptions::new(),
//!     );
//!     encoder.add_path(Path::new("file.txt"), Path::new("file.txt"));
//!     if encoder.open()? {
//!         encoder.compress()?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Password-protected archives
//!
//! ```rust,ignore
//! # #[cfg(feature = "aes")]
//! use plzma_core::engine::crypto::Password;
//!
//! # #[cfg(feature = "aes")]
//! fn open_encrypted(decoder: &plzma_core::Decoder) -> plzma_core::Result<()> {
//!     decoder.set_password(Password::new("secret"));
//!     decoder.open()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error handling
//!
//! Every fallible operation returns [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. Callers that only need the coarse
//! five-way taxonomy can match on [`Error::kind`] rather than the full
//! [`Error`] enum:
//!
//! ```rust
//! use plzma_core::{Error, ErrorKind};
//!
//! fn describe(err: &Error) -> &'static str {
//!     match err.kind() {
//!         ErrorKind::InvalidArguments => "bad argument",
//!         ErrorKind::NotEnoughMemory => "out of memory",
//!         ErrorKind::Io => "I/O failure",
//!         ErrorKind::Internal => "internal error",
//!         ErrorKind::Unknown => "unknown error",
//!     }
//! }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `lzma` | Yes | LZMA decoding/encoding |
//! | `lzma2` | Yes | LZMA2 decoding/encoding (includes `lzma`) |
//! | `deflate` | Yes | Deflate/zlib decoding/encoding |
//! | `bzip2` | Yes | BZip2 decoding/encoding |
//! | `ppmd` | Yes | PPMd decoding/encoding |
//! | `aes` | Yes | AES-256 encryption for 7z data and headers |
//! | `parallel` | Yes | Multi-threaded decompression with Rayon |
//! | `lz4` | No | LZ4 decoding (read-only codec coverage) |
//! | `zstd` | No | Zstandard decoding (read-only codec coverage) |
//! | `brotli` | No | Brotli decoding (read-only codec coverage) |
//! | `fast-lzma2` | No | Radix-match-finder LZMA2 encoder (experimental, faster compression) |
//!
//! Disable default features for a minimal build:
//!
//! ```toml
//! [dependencies]
//! plzma-core = { version = "1.0", default-features = false, features = ["lzma2"] }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

/// Default buffer size for read operations (8 KiB).
pub(crate) const READ_BUFFER_SIZE: usize = 8192;

pub mod checksum;
pub mod coder;
pub mod config;
pub mod engine;
pub mod error;
pub mod item;
pub mod path;
pub mod progress;
pub mod stream;
pub mod timestamp;

pub use coder::{
    AddedSource, Decoder, DirectoryMode, Encoder, EncoderMethod, EncoderOptions, Destination,
};
pub use config::CoderConfig;
pub use engine::ArchiveFormat;
pub use error::{Error, ErrorKind, Result};
pub use item::Item;
pub use path::Path;
pub use progress::{ProgressObserver, ProgressTracker};
pub use stream::{InStream, OutStream};
pub use timestamp::Timestamp;

#[cfg(feature = "aes")]
#[cfg_attr(docsrs, doc(cfg(feature = "aes")))]
pub use engine::crypto::Password;

// `coder::CoderState` is re-exported from its defining module rather than
// the crate root: it is lifecycle bookkeeping for `Decoder`/`Encoder`, not a
// type callers construct directly.
pub use coder::CoderState;
