use super::{PresentTexture, Presenter, TexelUpload, TextureKind};
use crate::compute::ResolvedView;
use crate::coords::Resolution;
use crate::error::{CompositorError, Result};

/// Color and depth textures of one view, sized to the view resolution.
///
/// Owned by the compositor; presenters only see them borrowed through a blit.
pub struct PresentableTexturePair<T> {
    color: T,
    depth: T,
}

impl<T: PresentTexture> PresentableTexturePair<T> {
    pub fn new<P>(presenter: &mut P, resolution: Resolution) -> Result<Self>
    where
        P: Presenter<Texture = T>,
    {
        Ok(Self {
            color: presenter.create_texture(TextureKind::Color, resolution)?,
            depth: presenter.create_texture(TextureKind::Depth, resolution)?,
        })
    }

    pub fn color(&self) -> &T {
        &self.color
    }

    pub fn depth(&self) -> &T {
        &self.depth
    }

    pub fn resolution(&self) -> Resolution {
        self.color.resolution()
    }

    /// Fails with `ResourceMismatch` if either texture differs from `expected`.
    pub fn check(&self, expected: Resolution) -> Result<()> {
        for actual in [self.color.resolution(), self.depth.resolution()] {
            if actual != expected {
                return Err(CompositorError::ResourceMismatch { expected, actual });
            }
        }
        Ok(())
    }

    /// Writes a resolved view into both textures.
    pub fn upload<P>(&mut self, presenter: &mut P, view: &ResolvedView) -> Result<()>
    where
        P: Presenter<Texture = T>,
    {
        self.check(view.resolution)?;
        presenter.write_texture(&mut self.color, TexelUpload::Color(&view.color))?;
        presenter.write_texture(&mut self.depth, TexelUpload::Depth(&view.depth))?;
        Ok(())
    }
}
