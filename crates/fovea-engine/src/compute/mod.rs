//! Compute-side resources.
//!
//! The rendering engine's work runs on a [`ComputeStream`], a dedicated worker
//! that executes jobs in submission order. Completion is published through a
//! [`Fence`]; the display thread waits on it before reading an
//! [`AccumulationBuffer`]. That wait is the only blocking point of a frame.

mod accumulation;
mod engine;
mod fence;
mod stream;

pub use accumulation::{AccumulationBuffer, ResolvedView, SampleWriter, CLEAR_DEPTH};
pub use engine::{RenderEngine, ViewContext};
pub use fence::{Fence, FenceValue};
pub use stream::ComputeStream;
