//! Join group for awaiting a set of concurrent pipelines.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// A counter with a wait operation that unblocks when it returns to zero.
///
/// Callers must `enter` before starting the work that will `leave`;
/// entering from the started work races the final wake-up.
#[derive(Clone, Default)]
pub struct JoinGroup {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    count: Mutex<usize>,
    zero: Condvar,
}

impl JoinGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one unit of pending work.
    pub fn enter(&self) {
        *self.inner.count.lock() += 1;
    }

    /// Complete one unit of pending work.
    pub fn leave(&self) {
        let mut count = self.inner.count.lock();
        debug_assert!(*count > 0, "leave without matching enter");
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.inner.zero.notify_all();
        }
    }

    /// Block until the counter reaches zero.
    pub fn wait(&self) {
        let mut count = self.inner.count.lock();
        while *count > 0 {
            self.inner.zero.wait(&mut count);
        }
    }

    /// Current pending count.
    pub fn pending(&self) -> usize {
        *self.inner.count.lock()
    }
}
