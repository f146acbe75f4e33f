//! Frame orchestration.
//!
//! The [`Compositor`] owns the window (through its presenter backend), the
//! presentable textures and accumulation buffers of every view, and the compute
//! stream the rendering engine submits to. It drives the frame state machine:
//!
//! ```text
//! init_window ─► Ready ─begin_frame─► FrameActive ─end_frame─► Ready ─► …
//!                  ▲                     │ render_with / present
//!                  └──────── destroy ────┘ (from any state)
//! ```

mod config;
mod lease;
mod state;
mod view;

pub use self::config::{CompositorConfig, ViewSizing};
pub use self::lease::display_claimed;
pub use self::state::FrameState;

use std::sync::Arc;

use self::lease::InstanceLease;
use self::view::ViewSlot;
use crate::compute::{AccumulationBuffer, ComputeStream, RenderEngine, ViewContext};
use crate::coords::Resolution;
use crate::error::{CompositorError, Result};
use crate::foveation::Foveation;
use crate::overlay::{NullOverlay, Overlay};
use crate::present::{FilterMode, FrameStart, PresentView, PresentableTexturePair, Presenter};
use crate::surface::{Surface, SurfaceDescriptor};
use crate::time::{FrameClock, FrameStats};

/// Everything that exists only between `init_window` and `destroy`.
struct Display<P: Presenter> {
    lease: InstanceLease,
    surface: P::Surface,
    presenter: P,
    stream: Arc<ComputeStream>,
    views: Vec<ViewSlot<P::Texture>>,

    /// Framebuffer of the active frame; `None` when acquisition was skipped.
    frame: Option<P::Frame>,

    window: Resolution,
    view_resolution: Resolution,
}

/// Display compositor for a progressively rendered image.
///
/// One compositor may be initialized per process. Dropping it runs
/// [`destroy`](Self::destroy).
pub struct Compositor<P: Presenter, O: Overlay<P> = NullOverlay> {
    config: CompositorConfig,
    overlay: O,
    state: FrameState,
    display: Option<Display<P>>,

    /// Whether the overlay has an open frame that `end_frame` must close.
    overlay_active: bool,

    clock: FrameClock,
    stats: FrameStats,
}

impl<P: Presenter, O: Overlay<P>> Compositor<P, O> {
    pub fn new(config: CompositorConfig, overlay: O) -> Self {
        Self {
            config,
            overlay,
            state: FrameState::Uninitialized,
            display: None,
            overlay_active: false,
            clock: FrameClock::new(),
            stats: FrameStats::default(),
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn overlay(&self) -> &O {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut O {
        &mut self.overlay
    }

    pub fn surface(&self) -> Option<&P::Surface> {
        self.display.as_ref().map(|d| &d.surface)
    }

    pub fn surface_mut(&mut self) -> Option<&mut P::Surface> {
        self.display.as_mut().map(|d| &mut d.surface)
    }

    pub fn presenter(&self) -> Option<&P> {
        self.display.as_ref().map(|d| &d.presenter)
    }

    pub fn window_resolution(&self) -> Option<Resolution> {
        self.display.as_ref().map(|d| d.window)
    }

    pub fn view_resolution(&self) -> Option<Resolution> {
        self.display.as_ref().map(|d| d.view_resolution)
    }

    pub fn view_count(&self) -> usize {
        self.display.as_ref().map_or(0, |d| d.views.len())
    }

    /// Presentable textures of view `index`.
    pub fn view_textures(&self, index: usize) -> Option<&PresentableTexturePair<P::Texture>> {
        self.display
            .as_ref()
            .and_then(|d| d.views.get(index))
            .map(|v| &v.textures)
    }

    pub fn accumulation(&self, index: usize) -> Option<&AccumulationBuffer> {
        self.display
            .as_ref()
            .and_then(|d| d.views.get(index))
            .map(|v| &v.accumulation)
    }

    /// Opens the window and allocates every view's resources.
    ///
    /// Fails with `DoubleInit` if this compositor is already initialized or
    /// another one holds the display, and with `WindowCreation` if no window can
    /// be created.
    pub fn init_window(&mut self, width: u32, height: u32, hidden: bool) -> Result<()> {
        if self.state != FrameState::Uninitialized {
            return Err(CompositorError::DoubleInit);
        }

        let lease = InstanceLease::acquire()?;

        let window = Resolution::checked(width, height).ok_or_else(|| {
            CompositorError::WindowCreation(format!("invalid window resolution {width}x{height}"))
        })?;

        let surface = P::Surface::create(&SurfaceDescriptor {
            title: self.config.title.clone(),
            resolution: window,
            hidden,
        })?;
        let mut presenter = P::create(&surface, &self.config.present)?;
        self.overlay.init(&surface, &presenter)?;

        let stream = Arc::new(ComputeStream::new(format!("{} compute", self.config.title))?);

        // The platform may not honour the requested size exactly.
        let window = surface.resolution();
        let grid = self.config.view_grid;
        let view_resolution = self.config.view_sizing.resolve(window, grid);

        let views = (0..grid.count())
            .map(|_| ViewSlot::new(&mut presenter, view_resolution, Arc::clone(&stream)))
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "compositor ready: window {window}, {} view(s) at {view_resolution}",
            views.len()
        );

        self.display = Some(Display {
            lease,
            surface,
            presenter,
            stream,
            views,
            frame: None,
            window,
            view_resolution,
        });

        self.clock.reset();
        self.stats = FrameStats {
            window,
            view: view_resolution,
            view_count: grid.count(),
            ..FrameStats::default()
        };
        self.state = FrameState::Ready;
        Ok(())
    }

    /// Polls the window and opens a frame.
    ///
    /// Returns `Ok(false)` without changing state when the window was closed or
    /// the overlay reports it invalid.
    pub fn begin_frame(&mut self) -> Result<bool> {
        self.expect_state("begin_frame", FrameState::Ready)?;
        let Some(display) = self.display.as_mut() else {
            return Err(self.invalid_state("begin_frame", FrameState::Ready));
        };

        let frame = match display.presenter.begin_frame(&mut display.surface)? {
            FrameStart::Closed => return Ok(false),
            FrameStart::Skipped => None,
            FrameStart::Acquired(frame) => Some(frame),
        };

        let window = display.surface.resolution();
        if window != display.window && window.is_valid() {
            log::debug!("window {} -> {}", display.window, window);
            display.window = window;
            self.overlay.resize(window, display.surface.scale_factor());

            if matches!(self.config.view_sizing, ViewSizing::FollowWindow { .. }) {
                display.view_resolution = self
                    .config
                    .view_sizing
                    .resolve(window, self.config.view_grid);
            }
        }

        if !self.overlay.begin_frame(&display.surface) {
            return Ok(false);
        }
        self.overlay_active = true;
        display.frame = frame;

        let time = self.clock.tick();
        self.stats.record_time(&time);
        self.stats.window = display.window;
        self.stats.view = display.view_resolution;

        self.state = FrameState::FrameActive;
        Ok(true)
    }

    /// Lets `engine` queue this frame's work for every view and records the
    /// foveation it rendered with.
    pub fn render_with<E: RenderEngine + ?Sized>(&mut self, engine: &mut E) -> Result<()> {
        self.expect_state("render_with", FrameState::FrameActive)?;
        let Some(display) = self.display.as_mut() else {
            return Err(self.invalid_state("render_with", FrameState::FrameActive));
        };

        let resolution = display.view_resolution;
        for (index, slot) in display.views.iter_mut().enumerate() {
            slot.fit_accumulation(resolution);

            let view = ViewContext {
                index,
                resolution,
                frame_index: self.stats.frame_index,
                dt: self.stats.dt,
            };
            engine.enqueue(&view, &mut slot.accumulation);
            slot.foveation = engine.foveation(&view);
        }
        Ok(())
    }

    /// Resolves every view, blits it into its tile and draws the overlay.
    ///
    /// Waits for outstanding compute work on the accumulation buffers; this is
    /// the only blocking point of a frame. A lost graphics context skips the
    /// blit for this frame. Returns `Ok(false)` once the window is invalid.
    pub fn present(&mut self) -> Result<bool> {
        self.expect_state("present", FrameState::FrameActive)?;
        let Some(display) = self.display.as_mut() else {
            return Err(self.invalid_state("present", FrameState::FrameActive));
        };

        let Display {
            surface,
            presenter,
            views,
            frame,
            view_resolution,
            ..
        } = display;
        let resolution = *view_resolution;

        let open = match frame.as_mut() {
            None => {
                self.stats.skipped_frames += 1;
                surface.is_open()
            }
            Some(frame) => {
                let blitted = Self::blit_views(
                    presenter,
                    surface,
                    frame,
                    views,
                    resolution,
                    &self.config,
                    &mut self.stats,
                );
                match blitted {
                    Ok(open) => open,
                    Err(e) if e.is_frame_scoped() => {
                        log::warn!("frame {} skipped: {e}", self.stats.frame_index);
                        self.stats.skipped_frames += 1;
                        surface.is_open()
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        // Skipped or failed blits never reached the uploads; the engine must
        // still not run ahead of the display.
        for slot in views.iter() {
            slot.accumulation.await_completion();
        }

        self.stats.view = resolution;
        self.stats.samples = views.first().map_or(0, |v| v.accumulation.samples());

        self.overlay.draw(&self.stats);
        Ok(open && surface.is_open())
    }

    fn blit_views(
        presenter: &mut P,
        surface: &P::Surface,
        frame: &mut P::Frame,
        views: &mut [ViewSlot<P::Texture>],
        resolution: Resolution,
        config: &CompositorConfig,
        stats: &mut FrameStats,
    ) -> Result<bool> {
        for slot in views.iter_mut() {
            slot.fit_accumulation(resolution);
            if slot.fit_textures(presenter, resolution)? {
                stats.reallocations += 1;
            }
            slot.upload(presenter, config.exposure)?;
        }

        let present_views: Vec<_> = views
            .iter()
            .map(|slot| PresentView {
                color: slot.textures.color(),
                depth: Some(slot.textures.depth()),
                foveation: slot.foveation,
                filter: config.color_filter,
            })
            .collect();

        presenter.present(surface, frame, config.view_grid, &present_views)
    }

    /// Closes the overlay frame, then presents the framebuffer.
    ///
    /// Must follow every successful `begin_frame`, including frames whose
    /// `present` failed or was never called.
    pub fn end_frame(&mut self) -> Result<()> {
        self.expect_state("end_frame", FrameState::FrameActive)?;
        let Some(display) = self.display.as_mut() else {
            return Err(self.invalid_state("end_frame", FrameState::FrameActive));
        };

        self.state = FrameState::Ready;

        let mut frame = display.frame.take();
        let overlay_result = if std::mem::take(&mut self.overlay_active) {
            self.overlay
                .end_frame(&display.surface, &mut display.presenter, frame.as_mut())
        } else {
            Ok(())
        };

        let present_result = match frame {
            Some(frame) => display.presenter.end_frame(&display.surface, frame),
            None => Ok(()),
        };

        overlay_result.and(present_result)
    }

    /// Tears everything down and returns to `Uninitialized`.
    ///
    /// Waits for in-flight compute work before releasing any view, releases the
    /// window last and returns the display lease. An open frame is discarded.
    /// Calling it again is a no-op.
    pub fn destroy(&mut self) {
        let Some(display) = self.display.take() else {
            self.state = FrameState::Uninitialized;
            return;
        };

        let Display {
            lease,
            surface,
            presenter,
            stream,
            views,
            frame,
            ..
        } = display;

        if self.state == FrameState::FrameActive {
            log::debug!("destroying compositor with an open frame");
        }
        drop(frame);
        self.overlay_active = false;

        for slot in &views {
            slot.accumulation.await_completion();
        }
        drop(views);

        self.overlay.shutdown();
        drop(presenter);

        stream.synchronize();
        drop(stream);

        drop(surface);
        drop(lease);

        self.state = FrameState::Uninitialized;
        log::info!("compositor destroyed");
    }

    /// Sets the foveation used for view `index` until the engine supplies another.
    pub fn set_foveation(&mut self, index: usize, foveation: Foveation) {
        match self.display.as_mut().and_then(|d| d.views.get_mut(index)) {
            Some(slot) => slot.foveation = foveation,
            None => log::warn!("set_foveation: no view {index}"),
        }
    }

    /// Pins views to `resolution`. Textures and accumulation buffers follow at
    /// the next `render_with` or `present`.
    pub fn set_view_resolution(&mut self, resolution: Resolution) {
        self.config.view_sizing = ViewSizing::Fixed(resolution);
        if let Some(display) = self.display.as_mut() {
            display.view_resolution = self
                .config
                .view_sizing
                .resolve(display.window, self.config.view_grid);
        }
    }

    /// Makes views follow the window again, scaled by `render_scale`.
    pub fn follow_window(&mut self, render_scale: f32) {
        self.config.view_sizing = ViewSizing::FollowWindow { render_scale };
        if let Some(display) = self.display.as_mut() {
            display.view_resolution = self
                .config
                .view_sizing
                .resolve(display.window, self.config.view_grid);
        }
    }

    pub fn set_exposure(&mut self, exposure: f32) {
        self.config.exposure = exposure;
    }

    pub fn set_color_filter(&mut self, filter: FilterMode) {
        self.config.color_filter = filter;
    }

    /// Queues a clear of every accumulation buffer.
    pub fn reset_accumulation(&mut self) {
        if let Some(display) = self.display.as_mut() {
            for slot in &mut display.views {
                slot.accumulation.reset();
            }
        }
    }

    fn invalid_state(&self, operation: &'static str, expected: FrameState) -> CompositorError {
        CompositorError::InvalidState {
            operation,
            expected,
            found: self.state,
        }
    }

    fn expect_state(&self, operation: &'static str, expected: FrameState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.invalid_state(operation, expected))
        }
    }
}

impl<P: Presenter, O: Overlay<P>> Drop for Compositor<P, O> {
    fn drop(&mut self) {
        self.destroy();
    }
}
