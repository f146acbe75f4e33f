use fovea_engine::compute::{AccumulationBuffer, RenderEngine, ViewContext};
use fovea_engine::foveation::Foveation;

/// Procedural stand-in for a progressive renderer.
///
/// Every frame adds one jittered sample per buffer pixel. Samples are placed in
/// display space through the foveation's `unwarp`, so a foveated buffer spends
/// its pixels on the focus region.
pub struct PatternEngine {
    pub animate: bool,
    foveation: Foveation,
    time: f32,
}

impl PatternEngine {
    pub fn new() -> Self {
        Self {
            animate: false,
            foveation: Foveation::IDENTITY,
            time: 0.0,
        }
    }

    pub fn set_foveation(&mut self, foveation: Foveation) {
        self.foveation = foveation;
    }
}

impl RenderEngine for PatternEngine {
    fn enqueue(&mut self, view: &ViewContext, accumulation: &mut AccumulationBuffer) {
        if self.animate && view.index == 0 {
            self.time += view.dt;
        }

        let time = self.time;
        let foveation = self.foveation;
        let res = view.resolution;
        let stereo_shift = view.index as f32 * 0.02;

        accumulation.submit(move |w| {
            let [jx, jy] = jitter(w.sample_index());
            w.shade(|x, y| {
                let uv = [
                    (x as f32 + jx) / res.width as f32,
                    (y as f32 + jy) / res.height as f32,
                ];
                let [px, py] = foveation.unwarp(uv);
                pattern([px + stereo_shift, py], time)
            });
        });
    }

    fn foveation(&self, _view: &ViewContext) -> Foveation {
        self.foveation
    }
}

/// Rings around a drifting centre over a soft checkerboard.
fn pattern(p: [f32; 2], time: f32) -> ([f32; 4], f32) {
    let cx = 0.5 + 0.2 * (time * 0.5).cos();
    let cy = 0.5 + 0.2 * (time * 0.5).sin();
    let r = ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt();

    let rings = 0.5 + 0.5 * (r * 120.0).cos();
    let cell = (p[0] * 16.0).floor() as i32 + (p[1] * 16.0).floor() as i32;
    let checker = if cell.rem_euclid(2) == 0 { 1.0 } else { 0.55 };

    let color = [
        rings * checker,
        (1.0 - r).clamp(0.0, 1.0) * 0.8 * checker,
        0.25 + 0.6 * p[1].clamp(0.0, 1.0),
        1.0,
    ];
    (color, r.clamp(0.0, 1.0))
}

/// Sub-pixel offset of sample `index`: Halton (2, 3).
fn jitter(index: u32) -> [f32; 2] {
    [radical_inverse(index + 1, 2), radical_inverse(index + 1, 3)]
}

fn radical_inverse(mut n: u32, base: u32) -> f32 {
    let inv_base = 1.0 / base as f32;
    let mut scale = inv_base;
    let mut out = 0.0;
    while n > 0 {
        out += (n % base) as f32 * scale;
        n /= base;
        scale *= inv_base;
    }
    out
}
