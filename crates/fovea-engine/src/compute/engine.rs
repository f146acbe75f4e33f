use super::accumulation::AccumulationBuffer;
use crate::coords::Resolution;
use crate::foveation::Foveation;

/// What the engine needs to know about the view it renders this frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewContext {
    /// Index of the view in the compositor's grid.
    pub index: usize,
    pub resolution: Resolution,
    pub frame_index: u64,

    /// Seconds since the previous frame.
    pub dt: f32,
}

/// Contract of the external rendering engine.
///
/// Called on the display thread once per view and frame. Implementations queue
/// their work with [`AccumulationBuffer::submit`] and return without waiting
/// for it; the compositor synchronizes on completion before presenting.
pub trait RenderEngine {
    /// Queues this frame's work for `view`.
    fn enqueue(&mut self, view: &ViewContext, accumulation: &mut AccumulationBuffer);

    /// Foveation the engine rendered `view` with this frame.
    fn foveation(&self, view: &ViewContext) -> Foveation {
        let _ = view;
        Foveation::IDENTITY
    }
}
