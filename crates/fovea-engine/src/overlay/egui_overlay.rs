use winit::window::Window;

use super::Overlay;
use crate::coords::Resolution;
use crate::error::Result;
use crate::present::{GpuFrame, GpuPresenter};
use crate::surface::{Surface, WinitSurface};
use crate::time::FrameStats;

/// Widget declarations run once per frame inside `draw`.
pub type OverlayContent = Box<dyn FnMut(&egui::Context, &FrameStats)>;

/// egui overlay drawn on top of the presented views.
///
/// Input arrives through the window events the surface collected during its
/// last poll. The overlay renders into the acquired frame after the blits.
pub struct EguiOverlay {
    ctx: egui::Context,
    content: OverlayContent,
    binding: Option<EguiBinding>,

    /// Set between `begin_pass` and `end_pass`.
    in_pass: bool,
}

/// Window-bound half of the overlay; dropped at shutdown.
struct EguiBinding {
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
    screen: egui_wgpu::ScreenDescriptor,
}

impl EguiOverlay {
    pub fn new(content: impl FnMut(&egui::Context, &FrameStats) + 'static) -> Self {
        Self {
            ctx: egui::Context::default(),
            content: Box::new(content),
            binding: None,
            in_pass: false,
        }
    }

    pub fn context(&self) -> &egui::Context {
        &self.ctx
    }
}

impl Overlay<GpuPresenter> for EguiOverlay {
    fn init(&mut self, surface: &WinitSurface, presenter: &GpuPresenter) -> Result<()> {
        if self.binding.is_some() {
            log::warn!("egui overlay initialized twice; rebinding");
        }

        let window: &Window = surface.window();
        let size = surface.resolution();
        let state = egui_winit::State::new(
            self.ctx.clone(),
            self.ctx.viewport_id(),
            window,
            Some(surface.scale_factor()),
            None,
            None,
        );
        let renderer = egui_wgpu::Renderer::new(
            presenter.device(),
            presenter.surface_format(),
            egui_wgpu::RendererOptions::default(),
        );

        self.binding = Some(EguiBinding {
            state,
            renderer,
            screen: egui_wgpu::ScreenDescriptor {
                size_in_pixels: [size.width, size.height],
                pixels_per_point: surface.scale_factor(),
            },
        });
        log::debug!("egui overlay bound to window");
        Ok(())
    }

    fn begin_frame(&mut self, surface: &WinitSurface) -> bool {
        let Some(binding) = self.binding.as_mut() else {
            return false;
        };
        if !surface.is_open() {
            return false;
        }

        let window: &Window = surface.window();
        for event in surface.pending_events() {
            let _ = binding.state.on_window_event(window, event);
        }

        let raw_input = binding.state.take_egui_input(window);
        self.ctx.begin_pass(raw_input);
        self.in_pass = true;
        true
    }

    fn draw(&mut self, stats: &FrameStats) {
        if self.in_pass {
            (self.content)(&self.ctx, stats);
        }
    }

    fn end_frame(
        &mut self,
        surface: &WinitSurface,
        presenter: &mut GpuPresenter,
        frame: Option<&mut GpuFrame>,
    ) -> Result<()> {
        if !std::mem::take(&mut self.in_pass) {
            return Ok(());
        }
        let Some(binding) = self.binding.as_mut() else {
            return Ok(());
        };

        let egui::FullOutput {
            shapes,
            textures_delta,
            platform_output,
            pixels_per_point,
            ..
        } = self.ctx.end_pass();

        binding
            .state
            .handle_platform_output(surface.window(), platform_output);

        let device = presenter.device();
        let queue = presenter.queue();

        for (id, delta) in &textures_delta.set {
            binding.renderer.update_texture(device, queue, *id, delta);
        }

        if let Some(frame) = frame {
            let primitives = self.ctx.tessellate(shapes, pixels_per_point);
            binding.screen.pixels_per_point = pixels_per_point;

            let extra = binding.renderer.update_buffers(
                device,
                queue,
                frame.encoder_mut(),
                &primitives,
                &binding.screen,
            );
            if !extra.is_empty() {
                queue.submit(extra);
            }

            let view = frame.view().clone();
            let mut pass = frame
                .encoder_mut()
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("fovea overlay pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    ..Default::default()
                })
                .forget_lifetime();

            binding.renderer.render(&mut pass, &primitives, &binding.screen);
        }

        for id in &textures_delta.free {
            binding.renderer.free_texture(id);
        }
        Ok(())
    }

    fn resize(&mut self, resolution: Resolution, scale_factor: f32) {
        if let Some(binding) = self.binding.as_mut() {
            binding.screen.size_in_pixels = [resolution.width, resolution.height];
            binding.screen.pixels_per_point = scale_factor;
        }
    }

    fn shutdown(&mut self) {
        if self.in_pass {
            let _ = self.ctx.end_pass();
            self.in_pass = false;
        }
        if self.binding.take().is_some() {
            log::debug!("egui overlay released");
        }
    }
}
