//! Foveated resampling.
//!
//! A foveation describes how an accumulation buffer distributes its pixels over
//! the display: the centre region gets more buffer pixels per display pixel than
//! the periphery. The presenter maps each display coordinate through
//! [`Foveation::warp`] to find the buffer coordinate to sample; the rendering
//! engine uses [`Foveation::unwarp`] to place its samples.

mod warp;

pub use warp::{AxisWarp, Foveation, FoveationUniform, WarpUniform};
