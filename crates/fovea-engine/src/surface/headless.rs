use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Surface, SurfaceDescriptor};
use crate::coords::Resolution;
use crate::error::{CompositorError, Result};

/// Window stand-in for offscreen operation and tests.
///
/// The window is "closed" through a [`CloseHandle`], which may be used from any
/// thread; resizes are injected with [`HeadlessSurface::resize`].
#[derive(Debug)]
pub struct HeadlessSurface {
    title: String,
    resolution: Resolution,
    pending_resize: Option<Resolution>,
    closed: Arc<AtomicBool>,
    open: bool,
    polls: u64,
}

/// Closes a [`HeadlessSurface`] from outside the display thread.
#[derive(Debug, Clone)]
pub struct CloseHandle(Arc<AtomicBool>);

impl CloseHandle {
    pub fn close(&self) {
        self.0.store(true, Ordering::Release);
    }
}

impl HeadlessSurface {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle(Arc::clone(&self.closed))
    }

    /// Closes the window; observed at the next poll.
    pub fn request_close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Simulates a window resize; observed at the next poll.
    pub fn resize(&mut self, resolution: Resolution) {
        self.pending_resize = Some(resolution);
    }

    /// Number of event polls so far.
    pub fn polls(&self) -> u64 {
        self.polls
    }
}

impl Surface for HeadlessSurface {
    fn create(desc: &SurfaceDescriptor) -> Result<Self> {
        if !desc.resolution.is_valid() {
            return Err(CompositorError::WindowCreation(format!(
                "invalid window resolution {}",
                desc.resolution
            )));
        }

        log::debug!("headless surface `{}` {}", desc.title, desc.resolution);

        Ok(Self {
            title: desc.title.clone(),
            resolution: desc.resolution,
            pending_resize: None,
            closed: Arc::new(AtomicBool::new(false)),
            open: true,
            polls: 0,
        })
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn poll_events(&mut self) -> bool {
        self.polls += 1;
        if self.closed.load(Ordering::Acquire) {
            self.open = false;
        }
        if let Some(res) = self.pending_resize {
            if res.is_valid() {
                self.resolution = res;
            }
        }
        self.open
    }

    fn is_open(&self) -> bool {
        self.open && !self.closed.load(Ordering::Acquire)
    }

    fn take_resize(&mut self) -> Option<Resolution> {
        self.pending_resize.take().filter(|r| r.is_valid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(w: u32, h: u32) -> SurfaceDescriptor {
        SurfaceDescriptor {
            resolution: Resolution::new(w, h),
            hidden: true,
            ..Default::default()
        }
    }

    #[test]
    fn zero_resolution_fails_creation() {
        let err = HeadlessSurface::create(&desc(0, 600)).unwrap_err();
        assert!(matches!(err, CompositorError::WindowCreation(_)));
    }

    #[test]
    fn close_handle_is_observed_on_poll() {
        let mut surface = HeadlessSurface::create(&desc(8, 8)).unwrap();
        assert!(surface.poll_events());
        surface.close_handle().close();
        assert!(!surface.is_open());
        assert!(!surface.poll_events());
    }

    #[test]
    fn resize_is_reported_once() {
        let mut surface = HeadlessSurface::create(&desc(8, 8)).unwrap();
        surface.resize(Resolution::new(16, 4));
        assert!(surface.poll_events());
        assert_eq!(surface.resolution(), Resolution::new(16, 4));
        assert_eq!(surface.take_resize(), Some(Resolution::new(16, 4)));
        assert_eq!(surface.take_resize(), None);
    }

    #[test]
    fn zero_sized_resize_keeps_resolution() {
        let mut surface = HeadlessSurface::create(&desc(8, 8)).unwrap();
        surface.resize(Resolution::new(0, 0));
        surface.poll_events();
        assert_eq!(surface.resolution(), Resolution::new(8, 8));
        assert_eq!(surface.take_resize(), None);
    }
}
