use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{CompositorError, Result};

static DISPLAY_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Process-wide claim on the display.
///
/// Only one initialized compositor may exist per process. The lease is taken
/// by `init_window` and returned when the compositor is destroyed.
#[derive(Debug)]
pub(crate) struct InstanceLease(());

impl InstanceLease {
    pub(crate) fn acquire() -> Result<Self> {
        DISPLAY_CLAIMED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(()))
            .map_err(|_| CompositorError::DoubleInit)
    }
}

impl Drop for InstanceLease {
    fn drop(&mut self) {
        DISPLAY_CLAIMED.store(false, Ordering::Release);
    }
}

/// Returns `true` while some compositor in the process owns the display.
pub fn display_claimed() -> bool {
    DISPLAY_CLAIMED.load(Ordering::Acquire)
}
