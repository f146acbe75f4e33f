//! Frame state machine and presentation, driven through the headless backend.
//!
//! The display lease is process-wide, so every test here runs serially.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use serial_test::serial;

use fovea_engine::compositor::display_claimed;
use fovea_engine::compute::{AccumulationBuffer, RenderEngine, ViewContext};
use fovea_engine::coords::{Resolution, ViewGrid};
use fovea_engine::foveation::{AxisWarp, Foveation};
use fovea_engine::overlay::{NullOverlay, Overlay};
use fovea_engine::present::{
    Blit, CpuFramebuffer, CpuTexture, FilterMode, FrameStart, PresentOptions, PresentTexture,
    Presenter, SoftwarePresenter, TexelUpload, TextureKind,
};
use fovea_engine::surface::HeadlessSurface;
use fovea_engine::time::FrameStats;
use fovea_engine::{Compositor, CompositorConfig, CompositorError, FrameState, HeadlessCompositor};

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

/// Fills every view with one color.
struct SolidEngine {
    colors: Vec<[f32; 4]>,
    depth: f32,
}

impl SolidEngine {
    fn new(color: [f32; 4]) -> Self {
        Self {
            colors: vec![color],
            depth: 0.5,
        }
    }
}

impl RenderEngine for SolidEngine {
    fn enqueue(&mut self, view: &ViewContext, accumulation: &mut AccumulationBuffer) {
        let color = self.colors[view.index.min(self.colors.len() - 1)];
        let depth = self.depth;
        accumulation.submit(move |w| w.fill(color, depth));
    }
}

/// Horizontal ramp, rendered with a fixed foveation.
struct RampEngine {
    foveation: Foveation,
}

impl RenderEngine for RampEngine {
    fn enqueue(&mut self, view: &ViewContext, accumulation: &mut AccumulationBuffer) {
        let width = view.resolution.width as f32;
        accumulation.submit(move |w| {
            w.shade(|x, _| ([x as f32 / (width - 1.0), 0.0, 0.0, 1.0], 0.5));
        });
    }

    fn foveation(&self, _view: &ViewContext) -> Foveation {
        self.foveation
    }
}

fn config() -> CompositorConfig {
    CompositorConfig {
        title: "fovea test".into(),
        ..Default::default()
    }
}

fn headless(config: CompositorConfig) -> HeadlessCompositor {
    Compositor::new(config, Default::default())
}

fn last_frame(c: &HeadlessCompositor) -> Vec<[u8; 4]> {
    c.presenter()
        .and_then(|p| p.last_presented())
        .map(|f| f.color.clone())
        .expect("a presented frame")
}

fn run_frame<E: RenderEngine, O: Overlay<SoftwarePresenter>>(c: &mut HeadlessCompositor<O>, engine: &mut E) -> bool {
    assert!(c.begin_frame().unwrap());
    c.render_with(engine).unwrap();
    let open = c.present().unwrap();
    c.end_frame().unwrap();
    open
}

// ── scenarios ───────────────────────────────────────────────────────────────

#[test]
#[serial]
fn solid_accumulation_presents_uniform_color() {
    let mut c = headless(config());
    c.init_window(800, 600, false).unwrap();
    assert_eq!(c.state(), FrameState::Ready);

    assert!(c.begin_frame().unwrap());
    assert_eq!(c.state(), FrameState::FrameActive);
    assert_eq!(c.surface().unwrap().polls(), 1);

    c.render_with(&mut SolidEngine::new([1.0, 0.0, 0.0, 1.0])).unwrap();
    assert!(c.present().unwrap());

    let color = c.view_textures(0).unwrap().color();
    assert_eq!(color.resolution(), Resolution::new(800, 600));
    assert!(color.color_texels().unwrap().iter().all(|t| *t == RED));

    c.end_frame().unwrap();
    assert_eq!(c.state(), FrameState::Ready);
    assert!(last_frame(&c).iter().all(|t| *t == RED));

    c.destroy();
    assert_eq!(c.state(), FrameState::Uninitialized);
    assert!(!display_claimed());
}

#[test]
#[serial]
fn external_close_stops_the_loop() {
    let mut c = headless(config());
    c.init_window(32, 32, true).unwrap();
    let close = c.surface().unwrap().close_handle();

    assert!(run_frame(&mut c, &mut SolidEngine::new([0.0; 4])));

    close.close();
    assert!(!c.begin_frame().unwrap());
    assert_eq!(c.state(), FrameState::Ready);

    // The loop must not present after a failed begin.
    assert!(matches!(
        c.present(),
        Err(CompositorError::InvalidState { .. })
    ));
}

#[test]
#[serial]
fn close_during_frame_is_reported_by_present() {
    let mut c = headless(config());
    c.init_window(16, 16, true).unwrap();

    assert!(c.begin_frame().unwrap());
    c.surface().unwrap().request_close();
    assert!(!c.present().unwrap());
    c.end_frame().unwrap();
    assert_eq!(c.state(), FrameState::Ready);
}

#[test]
#[serial]
fn second_init_fails_with_double_init() {
    let mut c = headless(config());
    c.init_window(16, 16, true).unwrap();
    assert!(matches!(
        c.init_window(16, 16, true),
        Err(CompositorError::DoubleInit)
    ));
    assert_eq!(c.state(), FrameState::Ready);
}

#[test]
#[serial]
fn second_compositor_is_refused_until_the_first_is_destroyed() {
    let mut first = headless(config());
    first.init_window(16, 16, true).unwrap();

    let mut second = headless(config());
    assert!(matches!(
        second.init_window(16, 16, true),
        Err(CompositorError::DoubleInit)
    ));
    assert_eq!(second.state(), FrameState::Uninitialized);

    first.destroy();
    second.init_window(16, 16, true).unwrap();
}

#[test]
#[serial]
fn drop_releases_the_display() {
    {
        let mut c = headless(config());
        c.init_window(8, 8, true).unwrap();
        assert!(display_claimed());
    }
    assert!(!display_claimed());
}

#[test]
#[serial]
fn zero_sized_window_fails_and_releases_the_display() {
    let mut c = headless(config());
    assert!(matches!(
        c.init_window(0, 600, false),
        Err(CompositorError::WindowCreation(_))
    ));
    assert_eq!(c.state(), FrameState::Uninitialized);
    assert!(!display_claimed());
    c.init_window(4, 4, true).unwrap();
}

// ── state machine ───────────────────────────────────────────────────────────

#[test]
#[serial]
fn frame_calls_outside_their_state_fail() {
    let mut c = headless(config());

    assert!(matches!(
        c.present(),
        Err(CompositorError::InvalidState {
            found: FrameState::Uninitialized,
            ..
        })
    ));
    assert!(c.begin_frame().is_err());

    c.init_window(8, 8, true).unwrap();
    assert!(matches!(
        c.present(),
        Err(CompositorError::InvalidState {
            operation: "present",
            expected: FrameState::FrameActive,
            found: FrameState::Ready,
        })
    ));
    assert!(c.end_frame().is_err());
    assert!(c.render_with(&mut SolidEngine::new([0.0; 4])).is_err());

    assert!(c.begin_frame().unwrap());
    assert!(matches!(
        c.begin_frame(),
        Err(CompositorError::InvalidState { .. })
    ));
    c.end_frame().unwrap();
}

#[test]
#[serial]
fn destroy_is_idempotent() {
    let mut c = headless(config());
    c.init_window(8, 8, true).unwrap();
    run_frame(&mut c, &mut SolidEngine::new([1.0; 4]));

    c.destroy();
    assert_eq!(c.state(), FrameState::Uninitialized);
    assert!(c.view_textures(0).is_none());

    c.destroy();
    assert_eq!(c.state(), FrameState::Uninitialized);
    assert!(!display_claimed());

    c.init_window(8, 8, true).unwrap();
    assert_eq!(c.state(), FrameState::Ready);
}

#[test]
#[serial]
fn destroy_waits_for_in_flight_compute() {
    struct SlowEngine(Arc<AtomicBool>);

    impl RenderEngine for SlowEngine {
        fn enqueue(&mut self, _view: &ViewContext, accumulation: &mut AccumulationBuffer) {
            let done = Arc::clone(&self.0);
            accumulation.submit(move |w| {
                std::thread::sleep(Duration::from_millis(50));
                w.fill([1.0; 4], 0.0);
                done.store(true, Ordering::SeqCst);
            });
        }
    }

    let done = Arc::new(AtomicBool::new(false));
    let mut c = headless(config());
    c.init_window(8, 8, true).unwrap();
    assert!(c.begin_frame().unwrap());
    c.render_with(&mut SlowEngine(Arc::clone(&done))).unwrap();

    // Torn down mid-frame, before present ever waited on the work.
    c.destroy();
    assert!(done.load(Ordering::SeqCst));
    assert_eq!(c.state(), FrameState::Uninitialized);
}

// ── views and resizing ──────────────────────────────────────────────────────

#[test]
#[serial]
fn resize_reallocates_before_the_next_blit() {
    let mut c = headless(config());
    c.init_window(64, 48, true).unwrap();
    let mut engine = SolidEngine::new([0.0, 0.0, 1.0, 1.0]);
    run_frame(&mut c, &mut engine);
    assert_eq!(c.stats().reallocations, 0);

    c.surface_mut().unwrap().resize(Resolution::new(100, 80));

    assert!(c.begin_frame().unwrap());
    assert_eq!(c.view_resolution(), Some(Resolution::new(100, 80)));
    assert!(c.present().unwrap());

    let textures = c.view_textures(0).unwrap();
    assert_eq!(textures.resolution(), Resolution::new(100, 80));
    assert_eq!(textures.depth().resolution(), Resolution::new(100, 80));
    assert_eq!(c.accumulation(0).unwrap().resolution(), Resolution::new(100, 80));
    assert_eq!(c.stats().reallocations, 1);
    c.end_frame().unwrap();

    let frame = last_frame(&c);
    assert_eq!(frame.len(), 100 * 80);
}

#[test]
#[serial]
fn fixed_view_resolution_is_scaled_onto_the_window() {
    let mut c = headless(CompositorConfig {
        color_filter: FilterMode::Nearest,
        ..config()
    });
    c.init_window(8, 8, true).unwrap();
    c.set_view_resolution(Resolution::new(2, 2));

    run_frame(&mut c, &mut SolidEngine::new([1.0, 0.0, 0.0, 1.0]));

    assert_eq!(c.view_textures(0).unwrap().resolution(), Resolution::new(2, 2));
    let frame = last_frame(&c);
    assert_eq!(frame.len(), 64);
    assert!(frame.iter().all(|t| *t == RED));
}

#[test]
#[serial]
fn stereo_views_are_tiled_side_by_side() {
    let mut c = headless(CompositorConfig {
        view_grid: ViewGrid::STEREO,
        ..config()
    });
    c.init_window(8, 4, true).unwrap();
    assert_eq!(c.view_count(), 2);
    assert_eq!(c.view_resolution(), Some(Resolution::new(4, 4)));

    let mut engine = SolidEngine {
        colors: vec![[1.0, 0.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]],
        depth: 0.5,
    };
    run_frame(&mut c, &mut engine);

    let frame = last_frame(&c);
    for y in 0..4 {
        for x in 0..8 {
            let expected = if x < 4 { RED } else { BLUE };
            assert_eq!(frame[y * 8 + x], expected, "pixel ({x}, {y})");
        }
    }
}

#[test]
#[serial]
fn engine_foveation_warps_the_blit() {
    let cfg = CompositorConfig {
        color_filter: FilterMode::Nearest,
        ..config()
    };

    let mut flat = headless(cfg.clone());
    flat.init_window(16, 1, true).unwrap();
    run_frame(&mut flat, &mut RampEngine { foveation: Foveation::IDENTITY });
    let identity = last_frame(&flat);
    flat.destroy();

    let mut foveated = headless(cfg);
    foveated.init_window(16, 1, true).unwrap();
    let foveation = Foveation {
        x: AxisWarp::new(0.5, 0.5, 0.25),
        y: AxisWarp::IDENTITY,
    };
    run_frame(&mut foveated, &mut RampEngine { foveation });
    let warped = last_frame(&foveated);

    // Identity is a straight copy: every pixel of the ramp is distinct.
    assert!(identity.windows(2).all(|w| w[0] != w[1]));
    // The warp spreads central texels over two pixels.
    assert_eq!(warped[4], warped[5]);
    assert_ne!(warped, identity);
}

// ── accumulation ────────────────────────────────────────────────────────────

#[test]
#[serial]
fn samples_accumulate_until_reset() {
    let mut c = headless(config());
    c.init_window(4, 4, true).unwrap();
    let mut engine = SolidEngine::new([0.5, 0.5, 0.5, 1.0]);

    for _ in 0..3 {
        run_frame(&mut c, &mut engine);
    }
    assert_eq!(c.stats().samples, 3);

    c.reset_accumulation();
    run_frame(&mut c, &mut engine);
    assert_eq!(c.stats().samples, 1);
}

#[test]
#[serial]
fn exposure_is_applied_at_resolve() {
    let mut c = headless(config());
    c.init_window(2, 2, true).unwrap();
    c.set_exposure(1.0);

    run_frame(&mut c, &mut SolidEngine::new([0.25, 0.25, 0.25, 1.0]));

    // 0.25 * 2 = 0.5 linear, 188 in sRGB.
    assert!(last_frame(&c).iter().all(|t| *t == [188, 188, 188, 255]));
}

// ── frame-scoped failures ───────────────────────────────────────────────────

static SKIP_ACQUIRE: AtomicBool = AtomicBool::new(false);
static LOSE_BLITS: AtomicU32 = AtomicU32::new(0);

fn inject_faults(skip_acquire: bool, lose_blits: u32) {
    SKIP_ACQUIRE.store(skip_acquire, Ordering::SeqCst);
    LOSE_BLITS.store(lose_blits, Ordering::SeqCst);
}

/// Software presenter that can withhold framebuffers and lose blits.
struct FlakyPresenter(SoftwarePresenter);

impl Presenter for FlakyPresenter {
    type Surface = HeadlessSurface;
    type Texture = CpuTexture;
    type Frame = CpuFramebuffer;

    fn create(surface: &HeadlessSurface, options: &PresentOptions) -> fovea_engine::Result<Self> {
        SoftwarePresenter::create(surface, options).map(Self)
    }

    fn create_texture(
        &mut self,
        kind: TextureKind,
        resolution: Resolution,
    ) -> fovea_engine::Result<CpuTexture> {
        self.0.create_texture(kind, resolution)
    }

    fn write_texture(
        &mut self,
        texture: &mut CpuTexture,
        texels: TexelUpload<'_>,
    ) -> fovea_engine::Result<()> {
        self.0.write_texture(texture, texels)
    }

    fn resize(&mut self, resolution: Resolution) {
        self.0.resize(resolution);
    }

    fn begin_frame(
        &mut self,
        surface: &mut HeadlessSurface,
    ) -> fovea_engine::Result<FrameStart<CpuFramebuffer>> {
        let start = self.0.begin_frame(surface)?;
        if SKIP_ACQUIRE.load(Ordering::SeqCst) && matches!(start, FrameStart::Acquired(_)) {
            return Ok(FrameStart::Skipped);
        }
        Ok(start)
    }

    fn blit_texture(
        &mut self,
        frame: &mut CpuFramebuffer,
        blit: &Blit<'_, CpuTexture>,
    ) -> fovea_engine::Result<()> {
        let lost = LOSE_BLITS
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost {
            return Err(CompositorError::ContextLost("device removed".into()));
        }
        self.0.blit_texture(frame, blit)
    }

    fn end_frame(
        &mut self,
        surface: &HeadlessSurface,
        frame: CpuFramebuffer,
    ) -> fovea_engine::Result<()> {
        self.0.end_frame(surface, frame)
    }
}

fn flaky(config: CompositorConfig) -> Compositor<FlakyPresenter> {
    Compositor::new(config, NullOverlay::new())
}

/// Adds one sample per frame, slowly.
struct SlowFillEngine;

impl RenderEngine for SlowFillEngine {
    fn enqueue(&mut self, _view: &ViewContext, accumulation: &mut AccumulationBuffer) {
        accumulation.submit(|w| {
            std::thread::sleep(Duration::from_millis(5));
            w.fill([0.5, 0.5, 0.5, 1.0], 0.5);
        });
    }
}

#[test]
#[serial]
fn skipped_acquisition_still_waits_for_compute() {
    inject_faults(true, 0);
    let mut c = flaky(config());
    c.init_window(8, 8, true).unwrap();

    for frame in 1..=20 {
        assert!(c.begin_frame().unwrap());
        c.render_with(&mut SlowFillEngine).unwrap();
        assert!(c.present().unwrap());
        assert!(
            c.accumulation(0).unwrap().is_idle(),
            "compute work still queued after frame {frame}"
        );
        c.end_frame().unwrap();
    }

    assert_eq!(c.stats().skipped_frames, 20);
    assert_eq!(c.stats().samples, 20);
    assert!(c.presenter().unwrap().0.last_presented().is_none());
    inject_faults(false, 0);
}

#[test]
#[serial]
fn lost_context_skips_the_frame_and_recovers() {
    inject_faults(false, 1);
    let mut c = flaky(config());
    c.init_window(4, 4, true).unwrap();
    let mut engine = SolidEngine::new([1.0, 0.0, 0.0, 1.0]);

    assert!(c.begin_frame().unwrap());
    c.render_with(&mut engine).unwrap();
    assert!(c.present().unwrap());
    assert_eq!(c.stats().skipped_frames, 1);
    c.end_frame().unwrap();
    assert_eq!(c.state(), FrameState::Ready);

    assert!(c.begin_frame().unwrap());
    c.render_with(&mut engine).unwrap();
    assert!(c.present().unwrap());
    c.end_frame().unwrap();

    assert_eq!(c.stats().skipped_frames, 1);
    let presenter = &c.presenter().unwrap().0;
    assert_eq!(presenter.frames_presented(), 2);
    let frame = presenter.last_presented().expect("a presented frame");
    assert!(frame.color.iter().all(|t| *t == RED));
}

// ── overlay ─────────────────────────────────────────────────────────────────

/// Records the overlay calls and what the presenter had done at each point.
#[derive(Default)]
struct RecordingOverlay {
    calls: Vec<String>,
    refuse: bool,
}

impl Overlay<SoftwarePresenter> for RecordingOverlay {
    fn init(
        &mut self,
        _surface: &HeadlessSurface,
        _presenter: &SoftwarePresenter,
    ) -> fovea_engine::Result<()> {
        self.calls.push("init".into());
        Ok(())
    }

    fn begin_frame(&mut self, _surface: &HeadlessSurface) -> bool {
        self.calls.push("begin".into());
        !self.refuse
    }

    fn draw(&mut self, stats: &FrameStats) {
        self.calls.push(format!("draw {}", stats.samples));
    }

    fn end_frame(
        &mut self,
        _surface: &HeadlessSurface,
        presenter: &mut SoftwarePresenter,
        frame: Option<&mut fovea_engine::present::CpuFramebuffer>,
    ) -> fovea_engine::Result<()> {
        self.calls.push(format!(
            "end presented={} frame={}",
            presenter.frames_presented(),
            frame.is_some()
        ));
        Ok(())
    }

    fn shutdown(&mut self) {
        self.calls.push("shutdown".into());
    }
}

#[test]
#[serial]
fn overlay_is_driven_inside_the_frame() {
    let mut c: HeadlessCompositor<RecordingOverlay> =
        Compositor::new(config(), RecordingOverlay::default());
    c.init_window(4, 4, true).unwrap();
    run_frame(&mut c, &mut SolidEngine::new([1.0; 4]));
    c.destroy();

    assert_eq!(
        c.overlay().calls,
        vec![
            "init",
            "begin",
            "draw 1",
            // The overlay flushes before the presenter ends the frame.
            "end presented=0 frame=true",
            "shutdown",
        ]
    );
}

#[test]
#[serial]
fn refusing_overlay_keeps_the_compositor_ready() {
    let mut c: HeadlessCompositor<RecordingOverlay> = Compositor::new(
        config(),
        RecordingOverlay {
            refuse: true,
            ..Default::default()
        },
    );
    c.init_window(4, 4, true).unwrap();
    assert!(!c.begin_frame().unwrap());
    assert_eq!(c.state(), FrameState::Ready);
}
