//! Window ownership.
//!
//! A [`Surface`] owns the native window (or its headless stand-in), reports its
//! resolution, and processes pending events when polled. All presenter and
//! overlay work for a surface happens on the thread that created it.

mod headless;
mod native;

pub use self::headless::{CloseHandle, HeadlessSurface};
pub use self::native::WinitSurface;

use crate::coords::Resolution;
use crate::error::Result;

/// Parameters for creating a surface.
#[derive(Debug, Clone)]
pub struct SurfaceDescriptor {
    pub title: String,
    pub resolution: Resolution,

    /// Create the window without showing it (offscreen operation).
    pub hidden: bool,
}

impl Default for SurfaceDescriptor {
    fn default() -> Self {
        Self {
            title: "fovea".to_string(),
            resolution: Resolution::new(1280, 720),
            hidden: false,
        }
    }
}

/// Window contract consumed by presenters and overlays.
pub trait Surface: Sized {
    /// Allocates the window. Fails with `CompositorError::WindowCreation`.
    fn create(desc: &SurfaceDescriptor) -> Result<Self>;

    /// Current framebuffer resolution in physical pixels.
    fn resolution(&self) -> Resolution;

    /// Physical pixels per logical point.
    fn scale_factor(&self) -> f32 {
        1.0
    }

    /// Processes pending events. Returns `false` once the window is closed.
    fn poll_events(&mut self) -> bool;

    fn is_open(&self) -> bool;

    /// New resolution if the window was resized since the last call.
    fn take_resize(&mut self) -> Option<Resolution>;

    /// Called right before the presenter hands a frame to the display.
    fn pre_present(&self) {}
}
