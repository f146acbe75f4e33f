//! Fovea engine crate.
//!
//! Presents a progressively accumulated render buffer in a window. The
//! rendering engine writes samples on a compute stream; the [`Compositor`]
//! waits for that work at `present`, resolves it into presentable textures and
//! resamples them onto the framebuffer, optionally foveated, with a diagnostic
//! overlay on top.
//!
//! Backends are selected by type: `Compositor<GpuPresenter, EguiOverlay>` opens
//! a real window, `Compositor<SoftwarePresenter, NullOverlay>` runs headless.

pub mod compositor;
pub mod compute;
pub mod coords;
pub mod error;
pub mod foveation;
pub mod logging;
pub mod overlay;
pub mod present;
pub mod surface;
pub mod time;

pub use compositor::{Compositor, CompositorConfig, FrameState, ViewSizing};
pub use error::{CompositorError, Result};

/// Windowed compositor with the egui overlay.
pub type WindowCompositor = Compositor<present::GpuPresenter, overlay::EguiOverlay>;

/// Offscreen compositor backed by the software presenter.
pub type HeadlessCompositor<O = overlay::NullOverlay> = Compositor<present::SoftwarePresenter, O>;
