//! Presentation.
//!
//! A [`Presenter`] owns the draw primitives that put a view's color/depth
//! textures onto the window framebuffer. The central operation is
//! [`Presenter::blit_texture`]: every destination pixel of the target rectangle
//! is mapped through the view's [`Foveation`] to a source coordinate, then color
//! is sampled with the requested filter and depth with nearest sampling.
//!
//! Backends:
//! - [`GpuPresenter`]: wgpu swap chain, WGSL blit pipeline
//! - [`SoftwarePresenter`]: CPU reference of the same rule, for headless use

mod gpu;
mod software;
mod texture;

pub use self::gpu::{GpuFrame, GpuPresenter, GpuTexture};
pub use self::software::{CpuFramebuffer, CpuTexture, SoftwarePresenter};
pub use self::texture::PresentableTexturePair;

use crate::coords::{PixelRect, Resolution, ViewGrid};
use crate::error::Result;
use crate::foveation::Foveation;
use crate::surface::Surface;

/// Color sampling rule used by a blit.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// Content class of a presentable texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TextureKind {
    /// 8-bit sRGB color with alpha.
    Color,
    /// 32-bit float depth, normalized.
    Depth,
}

/// Common surface of presentable textures across backends.
pub trait PresentTexture {
    fn kind(&self) -> TextureKind;
    fn resolution(&self) -> Resolution;
}

/// Texel data written into a presentable texture. Row-major, top row first.
#[derive(Debug, Copy, Clone)]
pub enum TexelUpload<'a> {
    Color(&'a [[u8; 4]]),
    Depth(&'a [f32]),
}

impl TexelUpload<'_> {
    pub fn kind(&self) -> TextureKind {
        match self {
            Self::Color(_) => TextureKind::Color,
            Self::Depth(_) => TextureKind::Depth,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Color(t) => t.len(),
            Self::Depth(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One resampling operation onto the current frame.
///
/// Textures are borrowed for the duration of the call only.
pub struct Blit<'a, T> {
    pub foveation: Foveation,
    pub color: &'a T,
    pub filter: FilterMode,
    pub depth: Option<&'a T>,

    /// Top-left corner of the destination rectangle, in framebuffer pixels.
    pub offset: [u32; 2],
    pub size: Resolution,
}

impl<T> Blit<'_, T> {
    pub fn target(&self) -> PixelRect {
        PixelRect::new(self.offset[0], self.offset[1], self.size.width, self.size.height)
    }
}

/// One packed view handed to [`Presenter::present`].
pub struct PresentView<'a, T> {
    pub color: &'a T,
    pub depth: Option<&'a T>,
    pub foveation: Foveation,
    pub filter: FilterMode,
}

/// Resolution of an acquired frame's framebuffer.
pub trait FrameTarget {
    fn resolution(&self) -> Resolution;
}

/// Outcome of [`Presenter::begin_frame`].
#[derive(Debug)]
pub enum FrameStart<F> {
    /// A framebuffer was acquired; blits may be recorded into it.
    Acquired(F),
    /// The window is open but no framebuffer is available this frame.
    Skipped,
    /// The window was closed.
    Closed,
}

/// Presenter configuration.
#[derive(Debug, Clone)]
pub struct PresentOptions {
    /// Framebuffer clear color, linear RGBA.
    pub clear_color: [f64; 4],

    /// Wait for vertical blank when presenting.
    pub vsync: bool,

    /// Write view depth into the framebuffer's depth attachment.
    pub write_depth: bool,

    /// Prefer an sRGB swap-chain format.
    pub prefer_srgb: bool,
}

impl Default for PresentOptions {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            vsync: true,
            write_depth: true,
            prefer_srgb: true,
        }
    }
}

/// Display-side draw primitives bound to one surface.
///
/// All calls happen on the thread that created the surface.
pub trait Presenter: Sized {
    type Surface: Surface;
    type Texture: PresentTexture;
    type Frame: FrameTarget;

    fn create(surface: &Self::Surface, options: &PresentOptions) -> Result<Self>;

    fn create_texture(&mut self, kind: TextureKind, resolution: Resolution)
        -> Result<Self::Texture>;

    /// Replaces the texture's content. The upload must match the texture's kind
    /// and pixel count.
    fn write_texture(&mut self, texture: &mut Self::Texture, texels: TexelUpload<'_>)
        -> Result<()>;

    /// Adapts the framebuffer to a new window resolution.
    fn resize(&mut self, resolution: Resolution);

    /// Polls window events and acquires the next framebuffer.
    fn begin_frame(&mut self, surface: &mut Self::Surface) -> Result<FrameStart<Self::Frame>>;

    /// Resamples `blit.color`/`blit.depth` into the destination rectangle.
    ///
    /// Returns `CompositorError::ContextLost` when the frame cannot be drawn; the
    /// frame must still be ended.
    fn blit_texture(&mut self, frame: &mut Self::Frame, blit: &Blit<'_, Self::Texture>)
        -> Result<()>;

    /// Blits every view into its tile of `grid`. Returns whether the window is
    /// still open.
    fn present(
        &mut self,
        surface: &Self::Surface,
        frame: &mut Self::Frame,
        grid: ViewGrid,
        views: &[PresentView<'_, Self::Texture>],
    ) -> Result<bool> {
        let target = frame.resolution();

        for (index, view) in views.iter().enumerate() {
            let Some(tile) = grid.tile(index, target) else {
                log::warn!("view {index} does not fit a {}x{} grid", grid.columns, grid.rows);
                continue;
            };

            self.blit_texture(
                frame,
                &Blit {
                    foveation: view.foveation,
                    color: view.color,
                    filter: view.filter,
                    depth: view.depth,
                    offset: [tile.x, tile.y],
                    size: tile.size(),
                },
            )?;
        }

        Ok(surface.is_open())
    }

    /// Finalizes the frame and makes it visible.
    fn end_frame(&mut self, surface: &Self::Surface, frame: Self::Frame) -> Result<()>;
}
