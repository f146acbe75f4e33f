use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Position in a stream's submission order.
///
/// `FenceValue::ZERO` is complete from the start, so a buffer that never had
/// work submitted is always idle.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FenceValue(pub(crate) u64);

impl FenceValue {
    pub const ZERO: FenceValue = FenceValue(0);

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Monotonic completion counter shared by a stream and its waiters.
#[derive(Debug, Default)]
pub struct Fence {
    completed: Mutex<u64>,
    signaled: Condvar,
}

impl Fence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks every value up to `value` as complete.
    pub(crate) fn signal(&self, value: FenceValue) {
        let mut completed = self.completed.lock();
        if value.0 > *completed {
            *completed = value.0;
        }
        self.signaled.notify_all();
    }

    pub fn completed(&self) -> FenceValue {
        FenceValue(*self.completed.lock())
    }

    pub fn is_complete(&self, value: FenceValue) -> bool {
        *self.completed.lock() >= value.0
    }

    /// Blocks until `value` is complete.
    pub fn wait(&self, value: FenceValue) {
        let mut completed = self.completed.lock();
        while *completed < value.0 {
            self.signaled.wait(&mut completed);
        }
    }

    /// Blocks until `value` is complete or `timeout` elapses. Returns whether
    /// the value completed.
    pub fn wait_timeout(&self, value: FenceValue, timeout: Duration) -> bool {
        let mut completed = self.completed.lock();
        while *completed < value.0 {
            if self.signaled.wait_for(&mut completed, timeout).timed_out() {
                return *completed >= value.0;
            }
        }
        true
    }
}
