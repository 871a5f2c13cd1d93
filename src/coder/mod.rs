//! Decoder/Encoder orchestration: the only layer above [`crate::engine`]
//! the public API exposes. `coder` drives the engine's `ReadEngine`/
//! `WriteEngine` traits directly; everything in spec.md §4.6-§4.8's state
//! tables, batching rules, and validation lives here.

mod callbacks;
pub mod decoder;
pub mod encoder;

pub use callbacks::{ExceptionSlot, PasswordSlot};
pub use decoder::{Decoder, Destination};
pub use encoder::{AddedSource, DirectoryMode, Encoder, EncoderMethod, EncoderOptions};

/// Lifecycle state shared by [`Decoder`] and [`Encoder`], per spec.md
/// §4.6/§4.7's state tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoderState {
    Fresh,
    Opening,
    Open,
    Running,
    Aborted,
    Closed,
}
