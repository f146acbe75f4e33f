//! wgpu presenter.

mod blit;
mod device;

use self::blit::{BlitInputs, BlitPipeline, DEPTH_FORMAT};
use self::device::{Gpu, SurfaceErrorAction};
use super::{
    Blit, FrameStart, FrameTarget, PresentOptions, PresentTexture, Presenter, TexelUpload,
    TextureKind,
};
use crate::coords::Resolution;
use crate::error::{CompositorError, Result};
use crate::surface::{Surface, WinitSurface};

/// GPU presentable texture: `Rgba8UnormSrgb` color or `R32Float` depth.
pub struct GpuTexture {
    kind: TextureKind,
    resolution: Resolution,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl GpuTexture {
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

impl PresentTexture for GpuTexture {
    fn kind(&self) -> TextureKind {
        self.kind
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }
}

/// Represents a single acquired frame.
///
/// Short-lived: holding the surface texture prevents acquiring the next one.
pub struct GpuFrame {
    surface_texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
    resolution: Resolution,
}

impl GpuFrame {
    /// Swap-chain view the frame renders into.
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn encoder_mut(&mut self) -> &mut wgpu::CommandEncoder {
        &mut self.encoder
    }
}

impl FrameTarget for GpuFrame {
    fn resolution(&self) -> Resolution {
        self.resolution
    }
}

/// Presents onto a winit window through wgpu.
///
/// Each frame is cleared at acquisition; blits then draw into it with a
/// fullscreen triangle restricted to the destination rectangle.
pub struct GpuPresenter {
    gpu: Gpu,
    options: PresentOptions,
    blit: BlitPipeline,
    depth_target: wgpu::TextureView,
}

impl GpuPresenter {
    pub fn device(&self) -> &wgpu::Device {
        self.gpu.device()
    }

    pub fn queue(&self) -> &wgpu::Queue {
        self.gpu.queue()
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.gpu.surface_format()
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.gpu.adapter_info()
    }

    fn create_depth_target(device: &wgpu::Device, size: Resolution) -> wgpu::TextureView {
        device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("fovea framebuffer depth"),
                size: wgpu::Extent3d {
                    width: size.width.max(1),
                    height: size.height.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn clear(&self, frame: &mut GpuFrame) {
        let [r, g, b, a] = self.options.clear_color;
        let _pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("fovea clear pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &frame.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
    }
}

impl Presenter for GpuPresenter {
    type Surface = WinitSurface;
    type Texture = GpuTexture;
    type Frame = GpuFrame;

    fn create(surface: &WinitSurface, options: &PresentOptions) -> Result<Self> {
        let gpu = pollster::block_on(Gpu::new(surface.window().clone(), options))?;
        let blit = BlitPipeline::new(
            gpu.device(),
            gpu.queue(),
            gpu.surface_format(),
            options.write_depth,
        );
        let depth_target = Self::create_depth_target(gpu.device(), gpu.size());

        Ok(Self {
            gpu,
            options: options.clone(),
            blit,
            depth_target,
        })
    }

    fn create_texture(&mut self, kind: TextureKind, resolution: Resolution) -> Result<GpuTexture> {
        if !resolution.is_valid() {
            return Err(CompositorError::InvalidUpload(format!(
                "cannot allocate a {resolution} texture"
            )));
        }

        let (label, format) = match kind {
            TextureKind::Color => ("fovea view color", wgpu::TextureFormat::Rgba8UnormSrgb),
            TextureKind::Depth => ("fovea view depth", wgpu::TextureFormat::R32Float),
        };

        let texture = self.gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: resolution.width,
                height: resolution.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(GpuTexture {
            kind,
            resolution,
            texture,
            view,
        })
    }

    fn write_texture(&mut self, texture: &mut GpuTexture, texels: TexelUpload<'_>) -> Result<()> {
        let res = texture.resolution;
        if texels.kind() != texture.kind || texels.len() != res.pixel_count() {
            return Err(CompositorError::InvalidUpload(format!(
                "{} {:?} texels for a {} {:?} texture",
                texels.len(),
                texels.kind(),
                res,
                texture.kind
            )));
        }

        let bytes: &[u8] = match texels {
            TexelUpload::Color(t) => bytemuck::cast_slice(t),
            TexelUpload::Depth(t) => bytemuck::cast_slice(t),
        };

        // Both formats are four bytes per texel.
        self.gpu.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * res.width),
                rows_per_image: Some(res.height),
            },
            wgpu::Extent3d {
                width: res.width,
                height: res.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn resize(&mut self, resolution: Resolution) {
        self.gpu.resize(resolution);
        if resolution.is_valid() {
            self.depth_target = Self::create_depth_target(self.gpu.device(), resolution);
        }
    }

    fn begin_frame(&mut self, surface: &mut WinitSurface) -> Result<FrameStart<GpuFrame>> {
        if !surface.poll_events() {
            return Ok(FrameStart::Closed);
        }
        if let Some(resolution) = surface.take_resize() {
            self.resize(resolution);
        }
        if !self.gpu.size().is_valid() {
            return Ok(FrameStart::Skipped);
        }

        let surface_texture = match self.gpu.acquire() {
            Ok(t) => t,
            Err(e) => {
                return match self.gpu.handle_surface_error(e) {
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        log::debug!("surface unavailable this frame");
                        Ok(FrameStart::Skipped)
                    }
                    SurfaceErrorAction::Fatal => {
                        Err(CompositorError::Gpu("surface out of memory".into()))
                    }
                };
            }
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("fovea frame encoder"),
            });

        let mut frame = GpuFrame {
            resolution: Resolution::new(
                surface_texture.texture.width(),
                surface_texture.texture.height(),
            ),
            surface_texture,
            view,
            depth_view: self.depth_target.clone(),
            encoder,
        };
        self.clear(&mut frame);
        Ok(FrameStart::Acquired(frame))
    }

    fn blit_texture(&mut self, frame: &mut GpuFrame, blit: &Blit<'_, GpuTexture>) -> Result<()> {
        if blit.color.kind != TextureKind::Color
            || blit.depth.is_some_and(|d| d.kind != TextureKind::Depth)
        {
            return Err(CompositorError::ContextLost(
                "blit sources do not match their texture kinds".into(),
            ));
        }
        if frame.resolution != self.gpu.size() {
            return Err(CompositorError::ContextLost(format!(
                "frame is {}, surface is {}",
                frame.resolution,
                self.gpu.size()
            )));
        }

        let Some(region) = blit.target().clip_to(frame.resolution) else {
            return Ok(());
        };

        let inputs = BlitInputs {
            foveation: &blit.foveation,
            filter: blit.filter,
            color: &blit.color.view,
            depth: blit.depth.map(|d| &d.view),
            rect: [
                blit.offset[0] as f32,
                blit.offset[1] as f32,
                blit.size.width as f32,
                blit.size.height as f32,
            ],
        };

        self.blit.record(
            self.gpu.device(),
            &mut frame.encoder,
            &frame.view,
            &frame.depth_view,
            &inputs,
            [region.x, region.y, region.width, region.height],
        );
        Ok(())
    }

    fn end_frame(&mut self, surface: &WinitSurface, frame: GpuFrame) -> Result<()> {
        let GpuFrame {
            surface_texture,
            view,
            encoder,
            ..
        } = frame;

        self.gpu.queue().submit(std::iter::once(encoder.finish()));
        drop(view);

        surface.pre_present();
        surface_texture.present();
        Ok(())
    }
}
