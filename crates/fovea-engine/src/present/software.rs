use std::marker::PhantomData;

use super::{
    Blit, FilterMode, FrameStart, FrameTarget, PresentOptions, PresentTexture, Presenter,
    TexelUpload, TextureKind,
};
use crate::compute::CLEAR_DEPTH;
use crate::coords::{PixelRect, Resolution};
use crate::error::{CompositorError, Result};
use crate::surface::{HeadlessSurface, Surface};

/// CPU-side presentable texture.
#[derive(Debug, Clone)]
pub struct CpuTexture {
    resolution: Resolution,
    texels: CpuTexels,
}

#[derive(Debug, Clone)]
enum CpuTexels {
    Color(Vec<[u8; 4]>),
    Depth(Vec<f32>),
}

impl CpuTexture {
    pub fn color_texels(&self) -> Option<&[[u8; 4]]> {
        match &self.texels {
            CpuTexels::Color(t) => Some(t),
            CpuTexels::Depth(_) => None,
        }
    }

    pub fn depth_texels(&self) -> Option<&[f32]> {
        match &self.texels {
            CpuTexels::Depth(t) => Some(t),
            CpuTexels::Color(_) => None,
        }
    }

    fn sample_nearest_color(&self, uv: [f32; 2]) -> [u8; 4] {
        let Some(texels) = self.color_texels() else {
            return [0; 4];
        };
        let (x, y) = nearest(uv, self.resolution);
        texels[self.resolution.index(x, y)]
    }

    fn sample_nearest_depth(&self, uv: [f32; 2]) -> f32 {
        let Some(texels) = self.depth_texels() else {
            return CLEAR_DEPTH;
        };
        let (x, y) = nearest(uv, self.resolution);
        texels[self.resolution.index(x, y)]
    }

    /// Bilinear filtering between texel centres, clamped to the edge.
    fn sample_linear_color(&self, uv: [f32; 2]) -> [u8; 4] {
        let Some(texels) = self.color_texels() else {
            return [0; 4];
        };
        let res = self.resolution;

        let px = uv[0] * res.width as f32 - 0.5;
        let py = uv[1] * res.height as f32 - 0.5;
        let fx = px - px.floor();
        let fy = py - py.floor();

        let x0 = clamp_texel(px.floor(), res.width);
        let x1 = clamp_texel(px.floor() + 1.0, res.width);
        let y0 = clamp_texel(py.floor(), res.height);
        let y1 = clamp_texel(py.floor() + 1.0, res.height);

        let t00 = texels[res.index(x0, y0)];
        let t10 = texels[res.index(x1, y0)];
        let t01 = texels[res.index(x0, y1)];
        let t11 = texels[res.index(x1, y1)];

        let mut out = [0u8; 4];
        for c in 0..4 {
            let top = t00[c] as f32 + (t10[c] as f32 - t00[c] as f32) * fx;
            let bottom = t01[c] as f32 + (t11[c] as f32 - t01[c] as f32) * fx;
            out[c] = (top + (bottom - top) * fy).round().clamp(0.0, 255.0) as u8;
        }
        out
    }
}

impl PresentTexture for CpuTexture {
    fn kind(&self) -> TextureKind {
        match self.texels {
            CpuTexels::Color(_) => TextureKind::Color,
            CpuTexels::Depth(_) => TextureKind::Depth,
        }
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }
}

fn clamp_texel(v: f32, extent: u32) -> u32 {
    (v.max(0.0) as u32).min(extent.saturating_sub(1))
}

fn nearest(uv: [f32; 2], res: Resolution) -> (u32, u32) {
    (
        clamp_texel((uv[0] * res.width as f32).floor(), res.width),
        clamp_texel((uv[1] * res.height as f32).floor(), res.height),
    )
}

/// Framebuffer of the software presenter.
#[derive(Debug, Clone)]
pub struct CpuFramebuffer {
    resolution: Resolution,
    pub color: Vec<[u8; 4]>,
    pub depth: Vec<f32>,
}

impl CpuFramebuffer {
    fn new(resolution: Resolution, clear: [u8; 4]) -> Self {
        let n = resolution.pixel_count();
        Self {
            resolution,
            color: vec![clear; n],
            depth: vec![CLEAR_DEPTH; n],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.color[self.resolution.index(x, y)]
    }

    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        self.depth[self.resolution.index(x, y)]
    }
}

impl FrameTarget for CpuFramebuffer {
    fn resolution(&self) -> Resolution {
        self.resolution
    }
}

/// Reference presenter that resamples on the CPU.
///
/// Follows the same destination-driven rule as the GPU blit: pixel centres of
/// the target rectangle are normalized, warped into source space and sampled.
/// The last framebuffer handed to `end_frame` is kept for inspection.
pub struct SoftwarePresenter<S = HeadlessSurface> {
    options: PresentOptions,
    resolution: Resolution,
    clear: [u8; 4],
    last_presented: Option<CpuFramebuffer>,
    frames_presented: u64,
    _surface: PhantomData<fn() -> S>,
}

impl<S> SoftwarePresenter<S> {
    pub fn options(&self) -> &PresentOptions {
        &self.options
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Framebuffer of the most recently ended frame.
    pub fn last_presented(&self) -> Option<&CpuFramebuffer> {
        self.last_presented.as_ref()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }
}

fn clear_bytes(color: [f64; 4]) -> [u8; 4] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

impl<S: Surface> Presenter for SoftwarePresenter<S> {
    type Surface = S;
    type Texture = CpuTexture;
    type Frame = CpuFramebuffer;

    fn create(surface: &S, options: &PresentOptions) -> Result<Self> {
        log::debug!("software presenter at {}", surface.resolution());
        Ok(Self {
            options: options.clone(),
            resolution: surface.resolution(),
            clear: clear_bytes(options.clear_color),
            last_presented: None,
            frames_presented: 0,
            _surface: PhantomData,
        })
    }

    fn create_texture(&mut self, kind: TextureKind, resolution: Resolution) -> Result<CpuTexture> {
        if !resolution.is_valid() {
            return Err(CompositorError::InvalidUpload(format!(
                "cannot allocate a {resolution} texture"
            )));
        }
        let n = resolution.pixel_count();
        let texels = match kind {
            TextureKind::Color => CpuTexels::Color(vec![[0; 4]; n]),
            TextureKind::Depth => CpuTexels::Depth(vec![CLEAR_DEPTH; n]),
        };
        Ok(CpuTexture { resolution, texels })
    }

    fn write_texture(&mut self, texture: &mut CpuTexture, texels: TexelUpload<'_>) -> Result<()> {
        let expected = texture.resolution.pixel_count();
        if texels.len() != expected {
            return Err(CompositorError::InvalidUpload(format!(
                "{} texels for a {} texture",
                texels.len(),
                texture.resolution
            )));
        }

        match (&mut texture.texels, texels) {
            (CpuTexels::Color(dst), TexelUpload::Color(src)) => dst.copy_from_slice(src),
            (CpuTexels::Depth(dst), TexelUpload::Depth(src)) => dst.copy_from_slice(src),
            (_, upload) => {
                return Err(CompositorError::InvalidUpload(format!(
                    "{:?} data for a {:?} texture",
                    upload.kind(),
                    texture.kind()
                )));
            }
        }
        Ok(())
    }

    fn resize(&mut self, resolution: Resolution) {
        if resolution.is_valid() {
            self.resolution = resolution;
        }
    }

    fn begin_frame(&mut self, surface: &mut S) -> Result<FrameStart<CpuFramebuffer>> {
        if !surface.poll_events() {
            return Ok(FrameStart::Closed);
        }
        if let Some(resolution) = surface.take_resize() {
            self.resize(resolution);
        }
        Ok(FrameStart::Acquired(CpuFramebuffer::new(self.resolution, self.clear)))
    }

    fn blit_texture(
        &mut self,
        frame: &mut CpuFramebuffer,
        blit: &Blit<'_, CpuTexture>,
    ) -> Result<()> {
        if blit.color.kind() != TextureKind::Color {
            return Err(CompositorError::ContextLost(
                "blit color source is not a color texture".into(),
            ));
        }
        if blit.depth.is_some_and(|d| d.kind() != TextureKind::Depth) {
            return Err(CompositorError::ContextLost(
                "blit depth source is not a depth texture".into(),
            ));
        }

        let size = blit.size;
        let Some(region) = blit.target().clip_to(frame.resolution) else {
            return Ok(());
        };
        let write_depth = self.options.write_depth;

        let [ox, oy] = blit.offset;
        let PixelRect { x, y, width, height } = region;

        for py in y..y + height {
            let v = ((py - oy) as f32 + 0.5) / size.height as f32;
            for px in x..x + width {
                let u = ((px - ox) as f32 + 0.5) / size.width as f32;
                let src = blit.foveation.warp([u, v]);

                let i = frame.resolution.index(px, py);
                frame.color[i] = match blit.filter {
                    FilterMode::Nearest => blit.color.sample_nearest_color(src),
                    FilterMode::Linear => blit.color.sample_linear_color(src),
                };
                if write_depth {
                    if let Some(depth) = blit.depth {
                        frame.depth[i] = depth.sample_nearest_depth(src);
                    }
                }
            }
        }
        Ok(())
    }

    fn end_frame(&mut self, surface: &S, frame: CpuFramebuffer) -> Result<()> {
        surface.pre_present();
        self.frames_presented += 1;
        self.last_presented = Some(frame);
        Ok(())
    }
}
