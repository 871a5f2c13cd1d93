//! Aggregated fractional progress for decoder/encoder operations.
//!
//! A single [`ProgressTracker`] is shared by a coder and its callback
//! adapter. The engine reports `set_total`/`set_completed` per item; the
//! tracker folds those into one `[0, 1]` fraction across all parts of the
//! operation and fans the result out to an observer.

use std::sync::Mutex;

/// IEC byte unit: 1 KiB = 1024 bytes.
pub const BYTES_KIB: u64 = 1024;
/// IEC byte unit: 1 MiB = 1024 KiB.
pub const BYTES_MIB: u64 = 1024 * BYTES_KIB;
/// IEC byte unit: 1 GiB = 1024 MiB.
pub const BYTES_GIB: u64 = 1024 * BYTES_MIB;

const BYTES_KB: f64 = 1024.0;
const BYTES_MB: f64 = BYTES_KB * 1024.0;
const BYTES_GB: f64 = BYTES_MB * 1024.0;

/// Receives `(path, progress)` whenever the tracker's fraction or current
/// path changes. Invoked on whichever thread drove the update; the tracker
/// releases its internal lock before calling this, so an observer may
/// safely call back into the coder.
pub trait ProgressObserver: Send {
    fn on_progress(&mut self, path: &str, progress: f64);
}

impl<F: FnMut(&str, f64) + Send> ProgressObserver for F {
    fn on_progress(&mut self, path: &str, progress: f64) {
        self(path, progress)
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    parts_count: u32,
    part_number: u32,
    part_completed: u64,
    part_total: u64,
    current_path: String,
    progress: f64,
    /// Path last delivered to the observer; distinct from `current_path` so
    /// a path change can be detected even when `progress` is unchanged.
    notified_path: String,
}

impl State {
    fn recompute(&mut self) -> f64 {
        self.progress = if self.part_number > 0 && self.part_total > 0 && self.parts_count > 0 {
            let parts_count = f64::from(self.parts_count);
            let part_number = f64::from(self.part_number);
            let within_part = self.part_completed as f64 / self.part_total as f64;
            (((part_number - 1.0) / parts_count) + (within_part / parts_count)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.progress
    }
}

/// Single-writer, multi-reader aggregator of `(current path, progress)`.
///
/// Matches the engine's view of a multi-part operation: `parts_count` total
/// parts, `part_number` the 1-based part currently running, and
/// `part_completed`/`part_total` bytes within that part.
pub struct ProgressTracker {
    state: Mutex<State>,
    observer: Mutex<Option<Box<dyn ProgressObserver>>>,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("state", &*self.state.lock().unwrap_or_else(|e| e.into_inner()))
            .finish()
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            observer: Mutex::new(None),
        }
    }

    /// Attaches an observer, replacing any previously set one.
    pub fn set_observer(&self, observer: impl ProgressObserver + 'static) {
        *self.observer.lock().unwrap_or_else(|e| e.into_inner()) = Some(Box::new(observer));
    }

    /// Removes the observer.
    pub fn clear_observer(&self) {
        *self.observer.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Sets the total number of parts for the upcoming operation.
    pub fn set_parts_count(&self, parts_count: u32) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.parts_count = parts_count;
        self.notify_locked(state);
    }

    /// Advances to a new part, setting the path it corresponds to.
    pub fn begin_part(&self, part_number: u32, path: impl Into<String>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.part_number = part_number;
        state.current_path = path.into();
        state.part_completed = 0;
        state.part_total = 0;
        self.notify_locked(state);
    }

    /// The engine's `set_total` callback for the current part.
    pub fn set_total(&self, total: u64) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.part_total = total;
        self.notify_locked(state);
    }

    /// The engine's `set_completed` callback for the current part.
    pub fn set_completed(&self, completed: u64) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.part_completed = completed;
        self.notify_locked(state);
    }

    /// Zeros counters and the cached fraction, preserving the observer.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = State::default();
    }

    /// Current cached fraction in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).progress
    }

    /// Current path, empty if no part has started.
    pub fn current_path(&self) -> String {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .current_path
            .clone()
    }

    /// Recomputes the fraction under the lock, then calls the observer (if
    /// any) after releasing it — re-entrancy safe per the tracker's
    /// contract: an observer invoked from here may call back into this
    /// tracker without deadlocking.
    ///
    /// Notifies whenever the fraction changes *or* the path changes, per
    /// spec.md §4.5 — directory items and other zero-total parts can leave
    /// the fraction at 0 across a `begin_part`, so the fraction alone isn't
    /// enough to detect that the observer needs telling.
    fn notify_locked(&self, mut state: std::sync::MutexGuard<'_, State>) {
        let previous = state.progress;
        let fraction = state.recompute();
        let path = state.current_path.clone();
        let fraction_changed = fraction != previous;
        let path_changed = path != state.notified_path;
        if path_changed {
            state.notified_path = path.clone();
        }
        drop(state);

        if !fraction_changed && !path_changed {
            return;
        }

        let mut observer = self.observer.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(observer) = observer.as_mut() {
            observer.on_progress(&path, fraction);
        }
    }
}

/// Formats bytes per second as a human-readable string using IEC units.
pub fn format_bytes_per_second_iec(rate: f64) -> String {
    if rate < BYTES_KB {
        format!("{:.0} B/s", rate)
    } else if rate < BYTES_MB {
        format!("{:.1} KiB/s", rate / BYTES_KB)
    } else if rate < BYTES_GB {
        format!("{:.1} MiB/s", rate / BYTES_MB)
    } else {
        format!("{:.1} GiB/s", rate / BYTES_GB)
    }
}

/// Formats bytes as a human-readable string using IEC units (KiB, MiB, GiB).
pub fn format_bytes_iec(bytes: u64) -> String {
    let bytes_f64 = bytes as f64;
    if bytes_f64 < BYTES_KB {
        format!("{} B", bytes)
    } else if bytes_f64 < BYTES_MB {
        format!("{:.1} KiB", bytes_f64 / BYTES_KB)
    } else if bytes_f64 < BYTES_GB {
        format!("{:.1} MiB", bytes_f64 / BYTES_MB)
    } else {
        format!("{:.1} GiB", bytes_f64 / BYTES_GB)
    }
}
