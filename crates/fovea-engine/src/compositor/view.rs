use std::sync::Arc;

use crate::compute::{AccumulationBuffer, ComputeStream, ResolvedView};
use crate::coords::Resolution;
use crate::error::{CompositorError, Result};
use crate::foveation::Foveation;
use crate::present::{PresentTexture, PresentableTexturePair, Presenter};

/// Resources of one packed view.
pub(crate) struct ViewSlot<T> {
    pub(crate) textures: PresentableTexturePair<T>,
    pub(crate) accumulation: AccumulationBuffer,
    pub(crate) foveation: Foveation,

    /// Scratch space for the resolve, reused across frames.
    resolved: ResolvedView,
}

impl<T: PresentTexture> ViewSlot<T> {
    pub(crate) fn new<P>(
        presenter: &mut P,
        resolution: Resolution,
        stream: Arc<ComputeStream>,
    ) -> Result<Self>
    where
        P: Presenter<Texture = T>,
    {
        Ok(Self {
            textures: PresentableTexturePair::new(presenter, resolution)?,
            accumulation: AccumulationBuffer::new(resolution, stream),
            foveation: Foveation::IDENTITY,
            resolved: ResolvedView::default(),
        })
    }

    /// Brings the accumulation buffer to `resolution`, waiting on its work
    /// first if it has to be reallocated.
    pub(crate) fn fit_accumulation(&mut self, resolution: Resolution) {
        if self.accumulation.resolution() != resolution {
            self.accumulation.resize(resolution);
        }
    }

    /// Reallocates the texture pair if it no longer matches `resolution`.
    /// Returns whether a reallocation happened.
    pub(crate) fn fit_textures<P>(
        &mut self,
        presenter: &mut P,
        resolution: Resolution,
    ) -> Result<bool>
    where
        P: Presenter<Texture = T>,
    {
        match self.textures.check(resolution) {
            Ok(()) => Ok(false),
            Err(CompositorError::ResourceMismatch { expected, actual }) => {
                log::debug!("view textures {actual} -> {expected}");
                self.textures = PresentableTexturePair::new(presenter, expected)?;
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    /// Waits for the accumulation's compute work, resolves it and uploads the
    /// result into the texture pair.
    pub(crate) fn upload<P>(&mut self, presenter: &mut P, exposure: f32) -> Result<()>
    where
        P: Presenter<Texture = T>,
    {
        self.accumulation.await_completion();
        self.accumulation.resolve_into(&mut self.resolved, exposure);
        self.textures.upload(presenter, &self.resolved)
    }
}
