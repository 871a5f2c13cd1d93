//! Shared glue between a `Decoder`/`Encoder` operation and the `engine` it
//! drives: the exception slot that ferries a mid-operation failure back to
//! the initiating method (spec.md §4.8, §9 "Exception ferrying"), plus
//! password storage (§4.8 "password delivery").
//!
//! The original callback adapters (`OpenCallback`/`ExtractCallback`/
//! `UpdateCallback`) existed because the 7z SDK drives extraction by calling
//! back *into* caller code. This engine is the opposite shape: `coder` calls
//! into `ReadEngine`/`WriteEngine` directly, so there is no inversion of
//! control to adapt. What survives from that design, and is genuinely still
//! needed here, is the bookkeeping those adapters centralized: recording the
//! first failure so every subsequent step short-circuits instead of leaving
//! the coder half-torn-down, and gating password access behind the `aes`
//! feature.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::Error;

#[cfg(feature = "aes")]
use crate::engine::crypto::Password;

/// Captures the first failure (or cancellation) raised while an operation is
/// in flight. Once set, it stays set: later callers observe the same
/// failure rather than racing to overwrite it.
#[derive(Default)]
pub struct ExceptionSlot {
    cancelled: AtomicBool,
    error: Mutex<Option<Error>>,
}

impl ExceptionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the cancellation sentinel. Safe to call from any thread at
    /// any time, per spec.md §5.
    pub fn cancel(&self) {
        log::debug!("exception slot: cancellation requested");
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Records `err` as the slot's failure if nothing is stored yet.
    pub fn set(&self, err: Error) {
        let mut slot = self.error.lock().unwrap_or_else(|poison| poison.into_inner());
        if slot.is_none() {
            log::warn!("engine callback failed: {err}");
            *slot = Some(err);
        }
    }

    /// True once either a real failure or a cancellation has been recorded.
    pub fn has_failure(&self) -> bool {
        self.is_cancelled()
            || self
                .error
                .lock()
                .unwrap_or_else(|poison| poison.into_inner())
                .is_some()
    }

    /// Drains the stored failure, preferring a captured error over plain
    /// cancellation so the caller sees the root cause when both raced.
    pub fn take(&self) -> Option<Error> {
        let mut slot = self.error.lock().unwrap_or_else(|poison| poison.into_inner());
        if let Some(err) = slot.take() {
            return Some(err);
        }
        if self.cancelled.swap(false, Ordering::SeqCst) {
            return Some(Error::Cancelled);
        }
        None
    }
}

/// Password storage shared by a decoder/encoder. A build without the `aes`
/// feature rejects every `set` and reports no password on `get`, matching
/// the original's `LIBPLZMA_NO_CRYPTO` behavior.
#[derive(Default)]
pub struct PasswordSlot {
    #[cfg(feature = "aes")]
    inner: Mutex<Option<Password>>,
}

impl PasswordSlot {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(feature = "aes")]
    pub fn set(&self, password: Option<Password>) {
        *self.inner.lock().unwrap_or_else(|poison| poison.into_inner()) = password;
    }

    #[cfg(not(feature = "aes"))]
    pub fn set(&self, _password: Option<()>) -> crate::Result<()> {
        Err(Error::invalid_arguments(
            "crypto support was not built into this crate (enable the `aes` feature)",
        ))
    }

    #[cfg(feature = "aes")]
    pub fn get(&self) -> Option<Password> {
        self.inner.lock().unwrap_or_else(|poison| poison.into_inner()).clone()
    }

    /// `password_is_defined` in spec.md §4.8's password delivery wording.
    #[cfg(feature = "aes")]
    pub fn is_defined(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .is_some()
    }

    #[cfg(not(feature = "aes"))]
    pub fn is_defined(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_slot_keeps_first_error() {
        let slot = ExceptionSlot::new();
        slot.set(Error::Cancelled);
        slot.set(Error::invalid_arguments("second"));
        assert!(matches!(slot.take(), Some(Error::Cancelled)));
        assert!(slot.take().is_none());
    }

    #[test]
    fn exception_slot_cancel_is_visible_across_clones_of_the_flag() {
        let slot = ExceptionSlot::new();
        assert!(!slot.has_failure());
        slot.cancel();
        assert!(slot.has_failure());
        assert!(matches!(slot.take(), Some(Error::Cancelled)));
    }

    #[cfg(feature = "aes")]
    #[test]
    fn password_slot_round_trips() {
        let slot = PasswordSlot::new();
        assert!(!slot.is_defined());
        slot.set(Some(Password::new("hunter2")));
        assert!(slot.is_defined());
        assert_eq!(slot.get().unwrap().as_str(), "hunter2");
    }
}
