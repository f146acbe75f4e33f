use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowAttributes, WindowId};

use super::{Surface, SurfaceDescriptor};
use crate::coords::Resolution;
use crate::error::{CompositorError, Result};

/// Pumps allowed while waiting for the platform to hand us the window.
const CREATE_PUMP_LIMIT: u32 = 64;

thread_local! {
    // winit allows one event loop per process; it is parked here between
    // surfaces so the display can be torn down and created again.
    static PARKED_EVENT_LOOP: RefCell<Option<EventLoop<()>>> = const { RefCell::new(None) };
}

/// Native window driven by polling rather than by `run_app`.
///
/// The caller owns the frame loop; [`Surface::poll_events`] pumps winit without
/// blocking. Window events seen during the last poll are kept for the overlay.
pub struct WinitSurface {
    event_loop: Option<EventLoop<()>>,
    handler: SurfaceHandler,
    window: Arc<Window>,
    open: bool,
}

impl WinitSurface {
    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Window events received during the most recent poll.
    pub fn pending_events(&self) -> &[WindowEvent] {
        &self.handler.events
    }

    fn take_event_loop() -> Result<EventLoop<()>> {
        if let Some(event_loop) = PARKED_EVENT_LOOP.with(|slot| slot.borrow_mut().take()) {
            return Ok(event_loop);
        }
        EventLoop::new()
            .map_err(|e| CompositorError::WindowCreation(format!("event loop: {e}")))
    }
}

impl Surface for WinitSurface {
    fn create(desc: &SurfaceDescriptor) -> Result<Self> {
        if !desc.resolution.is_valid() {
            return Err(CompositorError::WindowCreation(format!(
                "invalid window resolution {}",
                desc.resolution
            )));
        }

        let mut event_loop = Self::take_event_loop()?;

        let attrs = Window::default_attributes()
            .with_title(desc.title.clone())
            .with_inner_size(winit::dpi::PhysicalSize::<u32>::from(desc.resolution))
            .with_visible(!desc.hidden);

        let mut handler = SurfaceHandler::new(attrs);

        let mut pumps = 0;
        while handler.window.is_none() && handler.error.is_none() && pumps < CREATE_PUMP_LIMIT {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::ZERO), &mut handler)
            {
                handler.error = Some(format!("event loop exited with code {code}"));
            }
            pumps += 1;
        }

        let window = match (handler.window.clone(), handler.error.take()) {
            (Some(window), None) => window,
            (_, Some(reason)) => {
                PARKED_EVENT_LOOP.with(|slot| *slot.borrow_mut() = Some(event_loop));
                return Err(CompositorError::WindowCreation(reason));
            }
            (None, None) => {
                PARKED_EVENT_LOOP.with(|slot| *slot.borrow_mut() = Some(event_loop));
                return Err(CompositorError::WindowCreation(
                    "platform did not resume the event loop".into(),
                ));
            }
        };

        log::info!(
            "window `{}` created ({}, scale {:.2})",
            desc.title,
            Resolution::from(window.inner_size()),
            window.scale_factor()
        );

        Ok(Self {
            event_loop: Some(event_loop),
            handler,
            window,
            open: true,
        })
    }

    fn resolution(&self) -> Resolution {
        self.window.inner_size().into()
    }

    fn scale_factor(&self) -> f32 {
        self.window.scale_factor() as f32
    }

    fn poll_events(&mut self) -> bool {
        self.handler.events.clear();

        if let Some(event_loop) = self.event_loop.as_mut() {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::ZERO), &mut self.handler)
            {
                log::debug!("event loop exited with code {code}");
                self.open = false;
            }
        }

        if self.handler.close_requested {
            self.open = false;
        }
        self.open
    }

    fn is_open(&self) -> bool {
        self.open && !self.handler.close_requested
    }

    fn take_resize(&mut self) -> Option<Resolution> {
        self.handler.resized.take().filter(|r| r.is_valid())
    }

    fn pre_present(&self) {
        self.window.pre_present_notify();
    }
}

impl Drop for WinitSurface {
    fn drop(&mut self) {
        self.handler.window = None;
        if let Some(event_loop) = self.event_loop.take() {
            PARKED_EVENT_LOOP.with(|slot| *slot.borrow_mut() = Some(event_loop));
        }
        log::debug!("window released");
    }
}

struct SurfaceHandler {
    attrs: Option<WindowAttributes>,
    window: Option<Arc<Window>>,
    error: Option<String>,

    events: Vec<WindowEvent>,
    close_requested: bool,
    resized: Option<Resolution>,
}

impl SurfaceHandler {
    fn new(attrs: WindowAttributes) -> Self {
        Self {
            attrs: Some(attrs),
            window: None,
            error: None,
            events: Vec::new(),
            close_requested: false,
            resized: None,
        }
    }
}

impl ApplicationHandler for SurfaceHandler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(attrs) = self.attrs.take() else {
            return;
        };

        match event_loop.create_window(attrs) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != id {
            return;
        }

        match &event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                self.resized = Some(Resolution::from(*size));
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                self.resized = Some(Resolution::from(window.inner_size()));
            }
            _ => {}
        }

        self.events.push(event);
    }
}
