//! Diagnostic overlay.
//!
//! The compositor brackets every frame with [`Overlay::begin_frame`] and
//! [`Overlay::end_frame`], and calls [`Overlay::draw`] after the views were
//! blitted so the overlay lands on top.

mod egui_overlay;
mod null;

pub use self::egui_overlay::{EguiOverlay, OverlayContent};
pub use self::null::NullOverlay;

use crate::coords::Resolution;
use crate::error::Result;
use crate::present::Presenter;
use crate::time::FrameStats;

/// Lifecycle of an immediate-mode overlay bound to a presenter backend.
pub trait Overlay<P: Presenter> {
    /// Binds the overlay to the window. Called once after surface creation.
    fn init(&mut self, surface: &P::Surface, presenter: &P) -> Result<()>;

    /// Starts a UI frame. Returns `false` if the window state is invalid.
    fn begin_frame(&mut self, surface: &P::Surface) -> bool;

    /// Runs the content provider's widget declarations.
    fn draw(&mut self, stats: &FrameStats);

    /// Flushes the UI frame into `frame`, if one was acquired.
    fn end_frame(
        &mut self,
        surface: &P::Surface,
        presenter: &mut P,
        frame: Option<&mut P::Frame>,
    ) -> Result<()>;

    fn resize(&mut self, resolution: Resolution, scale_factor: f32) {
        let _ = (resolution, scale_factor);
    }

    /// Releases window-bound resources; `init` may be called again afterwards.
    fn shutdown(&mut self) {}
}
