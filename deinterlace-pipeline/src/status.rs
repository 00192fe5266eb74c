//! Shared movie status.
//!
//! One `MovieStatus` per movie, written by its orchestrator and pipelines,
//! read lock-free by the batch progress display. Stale progress reads are
//! fine; progress is monotone until the terminal state, and the terminal
//! state never mutates again.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A lock-free progress value in `[0, 1]`.
#[derive(Default)]
pub struct ProgressCell {
    bits: AtomicU64,
}

impl ProgressCell {
    /// Create a cell at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a progress value, clamped to `[0, 1]`.
    ///
    /// Values never move backwards; a stale writer cannot regress the
    /// display.
    pub fn set(&self, value: f64) {
        let value = value.clamp(0.0, 1.0);
        let mut current = self.bits.load(Ordering::Relaxed);
        while value > f64::from_bits(current) {
            match self.bits.compare_exchange_weak(
                current,
                value.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Read the current value.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Status of one movie job.
pub struct MovieStatus {
    has_started: AtomicBool,
    has_completed: AtomicBool,
    success: AtomicBool,
    tracks: RwLock<Vec<Arc<ProgressCell>>>,
}

impl Default for MovieStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl MovieStatus {
    /// Create a fresh status.
    pub fn new() -> Self {
        Self {
            has_started: AtomicBool::new(false),
            has_completed: AtomicBool::new(false),
            success: AtomicBool::new(false),
            tracks: RwLock::new(Vec::new()),
        }
    }

    /// Claim the started flag; returns false if already started.
    pub fn mark_started(&self) -> bool {
        self.has_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move to the terminal state; later calls are ignored.
    pub fn complete(&self, success: bool) {
        if self.has_completed.load(Ordering::Acquire) {
            return;
        }
        self.success.store(success, Ordering::Release);
        self.has_completed.store(true, Ordering::Release);
    }

    /// Register a per-track progress cell.
    pub fn add_track_cell(&self) -> Arc<ProgressCell> {
        let cell = Arc::new(ProgressCell::new());
        self.tracks.write().push(Arc::clone(&cell));
        cell
    }

    /// Whether the movie has been started.
    pub fn has_started(&self) -> bool {
        self.has_started.load(Ordering::Acquire)
    }

    /// Whether the movie reached its terminal state.
    pub fn has_completed(&self) -> bool {
        self.has_completed.load(Ordering::Acquire)
    }

    /// Whether the movie is started but not yet terminal.
    pub fn is_running(&self) -> bool {
        self.has_started() && !self.has_completed()
    }

    /// Whether the movie completed successfully.
    ///
    /// Meaningful only once `has_completed` is true.
    pub fn succeeded(&self) -> bool {
        self.success.load(Ordering::Acquire)
    }

    /// Overall progress: the mean of per-track progress, 1.0 once terminal.
    pub fn progress(&self) -> f64 {
        if self.has_completed() {
            return 1.0;
        }
        let tracks = self.tracks.read();
        if tracks.is_empty() {
            return 0.0;
        }
        tracks.iter().map(|c| c.get()).sum::<f64>() / tracks.len() as f64
    }
}
