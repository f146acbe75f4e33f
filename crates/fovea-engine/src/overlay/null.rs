use super::Overlay;
use crate::error::Result;
use crate::present::Presenter;
use crate::surface::Surface;
use crate::time::FrameStats;

/// Overlay that draws nothing; used headless.
#[derive(Debug, Default)]
pub struct NullOverlay {
    frames: u64,
}

impl NullOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed overlay frames.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl<P: Presenter> Overlay<P> for NullOverlay {
    fn init(&mut self, _surface: &P::Surface, _presenter: &P) -> Result<()> {
        Ok(())
    }

    fn begin_frame(&mut self, surface: &P::Surface) -> bool {
        surface.is_open()
    }

    fn draw(&mut self, _stats: &FrameStats) {}

    fn end_frame(
        &mut self,
        _surface: &P::Surface,
        _presenter: &mut P,
        _frame: Option<&mut P::Frame>,
    ) -> Result<()> {
        self.frames += 1;
        Ok(())
    }
}
