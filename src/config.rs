//! Process-wide tunables and per-coder configuration overrides.
//!
//! The block-size knobs are process-global `AtomicU64` statics, matching the
//! teacher's existing use of atomics for shared runtime state
//! (`progress.rs`, `engine::safety`). A [`CoderConfig`] snapshots them once
//! at operation start so a `Decoder`/`Encoder` is not exposed to concurrent
//! global mutation mid-operation, per the Design Note on global
//! configuration preferring explicit coder state over hidden shared state.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::progress::BYTES_MIB;

static STREAM_READ_BLOCK_SIZE: AtomicU64 = AtomicU64::new(BYTES_MIB);
static STREAM_WRITE_BLOCK_SIZE: AtomicU64 = AtomicU64::new(BYTES_MIB);
static DECODER_READ_BLOCK_SIZE: AtomicU64 = AtomicU64::new(BYTES_MIB);
static DECODER_WRITE_BLOCK_SIZE: AtomicU64 = AtomicU64::new(4 * BYTES_MIB);

/// Returns the process-wide default for stream reads.
pub fn stream_read_block_size() -> u64 {
    STREAM_READ_BLOCK_SIZE.load(Ordering::Relaxed)
}

/// Sets the process-wide default for stream reads.
pub fn set_stream_read_block_size(bytes: u64) {
    STREAM_READ_BLOCK_SIZE.store(bytes, Ordering::Relaxed);
}

/// Returns the process-wide default for stream writes.
pub fn stream_write_block_size() -> u64 {
    STREAM_WRITE_BLOCK_SIZE.load(Ordering::Relaxed)
}

/// Sets the process-wide default for stream writes.
pub fn set_stream_write_block_size(bytes: u64) {
    STREAM_WRITE_BLOCK_SIZE.store(bytes, Ordering::Relaxed);
}

/// Returns the process-wide default for decoder reads.
pub fn decoder_read_block_size() -> u64 {
    DECODER_READ_BLOCK_SIZE.load(Ordering::Relaxed)
}

/// Sets the process-wide default for decoder reads.
pub fn set_decoder_read_block_size(bytes: u64) {
    DECODER_READ_BLOCK_SIZE.store(bytes, Ordering::Relaxed);
}

/// Returns the process-wide default for decoder writes.
pub fn decoder_write_block_size() -> u64 {
    DECODER_WRITE_BLOCK_SIZE.load(Ordering::Relaxed)
}

/// Sets the process-wide default for decoder writes.
pub fn set_decoder_write_block_size(bytes: u64) {
    DECODER_WRITE_BLOCK_SIZE.store(bytes, Ordering::Relaxed);
}

/// Per-coder snapshot of the block-size tunables, taken once when a
/// `Decoder`/`Encoder` begins an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoderConfig {
    pub stream_read_block_size: u64,
    pub stream_write_block_size: u64,
    pub decoder_read_block_size: u64,
    pub decoder_write_block_size: u64,
}

impl Default for CoderConfig {
    fn default() -> Self {
        Self::from_process_defaults()
    }
}

impl CoderConfig {
    /// Snapshots the current process-wide defaults.
    pub fn from_process_defaults() -> Self {
        Self {
            stream_read_block_size: stream_read_block_size(),
            stream_write_block_size: stream_write_block_size(),
            decoder_read_block_size: decoder_read_block_size(),
            decoder_write_block_size: decoder_write_block_size(),
        }
    }

    pub fn with_stream_read_block_size(mut self, bytes: u64) -> Self {
        self.stream_read_block_size = bytes;
        self
    }

    pub fn with_stream_write_block_size(mut self, bytes: u64) -> Self {
        self.stream_write_block_size = bytes;
        self
    }

    pub fn with_decoder_read_block_size(mut self, bytes: u64) -> Self {
        self.decoder_read_block_size = bytes;
        self
    }

    pub fn with_decoder_write_block_size(mut self, bytes: u64) -> Self {
        self.decoder_write_block_size = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_approximations() {
        let config = CoderConfig::default();
        assert_eq!(config.stream_read_block_size, BYTES_MIB);
        assert_eq!(config.decoder_write_block_size, 4 * BYTES_MIB);
    }

    #[test]
    fn override_builder_chains() {
        let config = CoderConfig::default()
            .with_stream_read_block_size(2 * BYTES_MIB)
            .with_decoder_write_block_size(8 * BYTES_MIB);
        assert_eq!(config.stream_read_block_size, 2 * BYTES_MIB);
        assert_eq!(config.decoder_write_block_size, 8 * BYTES_MIB);
    }

    #[test]
    fn process_setters_are_observed_by_new_snapshots() {
        set_stream_write_block_size(123456);
        let config = CoderConfig::from_process_defaults();
        assert_eq!(config.stream_write_block_size, 123456);
        set_stream_write_block_size(BYTES_MIB);
    }
}
