//! Pixel-space types shared by the surface, presenter and compositor.
//!
//! Canonical space:
//! - physical pixels
//! - origin top-left
//! - +X right, +Y down
//!
//! Normalized coordinates (`[0, 1]` per axis) use the same orientation.

mod grid;
mod rect;
mod resolution;

pub use grid::ViewGrid;
pub use rect::PixelRect;
pub use resolution::Resolution;
