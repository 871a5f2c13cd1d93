//! Polymorphic, seekable byte sources and sinks, shared by reference between
//! a coder and its callback adapter.
//!
//! Both [`in_stream::InStream`] and [`out_stream::OutStream`] wrap an
//! `Arc<Mutex<_>>` around their concrete variant so a clone can be handed to
//! the engine (which takes ownership of its reader/writer generic) while the
//! coder keeps a clone to drive `open`/`close` around the operation, per
//! spec.md §3's "Streams are reference-counted" invariant.

pub mod in_stream;
pub mod out_stream;

/// Mirrors the engine callback's `origin` argument for seeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Start,
    Current,
    End,
}

/// How [`in_stream::InStream::erase`]/[`out_stream::OutStream::erase`]
/// overwrite memory-backed content before deallocating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EraseMode {
    /// Just drop the buffer.
    #[default]
    None,
    /// Overwrite with zero bytes first, to avoid leaking cleartext (e.g. a
    /// password embedded in an in-memory header) through freed memory.
    ZeroFill,
}

pub use in_stream::InStream;
pub use out_stream::OutStream;
