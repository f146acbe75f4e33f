use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use super::fence::FenceValue;
use super::stream::ComputeStream;
use crate::coords::Resolution;

/// Depth written by a clear; normalized depth, far plane.
pub const CLEAR_DEPTH: f32 = 1.0;

/// Progressive accumulation target written by the rendering engine.
///
/// Color is stored as running sums of linear RGBA samples; depth keeps the most
/// recent sample. One submitted job contributes one sample per pixel, and the
/// sample count advances when the job completes.
///
/// Work is queued on the compositor's [`ComputeStream`]. Readers of the pixel
/// data must call [`await_completion`](Self::await_completion) first; dropping
/// the buffer waits for its outstanding work. [`resolution`](Self::resolution)
/// and [`samples`](Self::samples) never wait on running work.
pub struct AccumulationBuffer {
    storage: Arc<Mutex<AccumulationStorage>>,

    /// Completed sample passes, published by the job that finishes them.
    samples: Arc<AtomicU32>,

    /// Only changed by `resize`, after the stream has drained this buffer.
    resolution: Resolution,

    stream: Arc<ComputeStream>,
    last_submitted: FenceValue,
}

struct AccumulationStorage {
    resolution: Resolution,
    color: Vec<[f32; 4]>,
    depth: Vec<f32>,
}

impl AccumulationStorage {
    fn new(resolution: Resolution) -> Self {
        let n = resolution.pixel_count();
        Self {
            resolution,
            color: vec![[0.0; 4]; n],
            depth: vec![CLEAR_DEPTH; n],
        }
    }

    fn clear(&mut self) {
        self.color.fill([0.0; 4]);
        self.depth.fill(CLEAR_DEPTH);
    }
}

impl AccumulationBuffer {
    pub fn new(resolution: Resolution, stream: Arc<ComputeStream>) -> Self {
        Self {
            storage: Arc::new(Mutex::new(AccumulationStorage::new(resolution))),
            samples: Arc::new(AtomicU32::new(0)),
            resolution,
            stream,
            last_submitted: FenceValue::ZERO,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Samples accumulated by completed work.
    pub fn samples(&self) -> u32 {
        self.samples.load(Ordering::Acquire)
    }

    /// Queues one sample pass. `work` runs on the compute stream and must write
    /// every pixel it wants to contribute through the [`SampleWriter`].
    pub fn submit<F>(&mut self, work: F) -> FenceValue
    where
        F: FnOnce(&mut SampleWriter<'_>) + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        let samples = Arc::clone(&self.samples);
        self.last_submitted = self.stream.submit(move || {
            let mut storage = storage.lock();
            let sample_index = samples.load(Ordering::Acquire);
            let mut writer = SampleWriter {
                storage: &mut storage,
                sample_index,
            };
            work(&mut writer);
            samples.store(sample_index.saturating_add(1), Ordering::Release);
        });
        self.last_submitted
    }

    /// Queues a clear, ordered after any sample work already submitted.
    pub fn reset(&mut self) -> FenceValue {
        let storage = Arc::clone(&self.storage);
        let samples = Arc::clone(&self.samples);
        self.last_submitted = self.stream.submit(move || {
            storage.lock().clear();
            samples.store(0, Ordering::Release);
        });
        self.last_submitted
    }

    /// Blocks until all work submitted against this buffer has completed.
    pub fn await_completion(&self) {
        self.stream.fence().wait(self.last_submitted);
    }

    pub fn is_idle(&self) -> bool {
        self.stream.fence().is_complete(self.last_submitted)
    }

    /// Fence value of the most recent submission against this buffer.
    pub fn pending(&self) -> FenceValue {
        self.last_submitted
    }

    /// Waits for outstanding work, then reallocates and clears to `resolution`.
    pub fn resize(&mut self, resolution: Resolution) {
        self.await_completion();
        if self.resolution != resolution {
            log::debug!("accumulation buffer {} -> {}", self.resolution, resolution);
            *self.storage.lock() = AccumulationStorage::new(resolution);
            self.samples.store(0, Ordering::Release);
            self.resolution = resolution;
        }
    }

    /// Averages the accumulated samples into displayable texels.
    ///
    /// RGB is scaled by `2^exposure`, clamped and sRGB-encoded; alpha stays
    /// linear. Zero samples resolve to transparent black at [`CLEAR_DEPTH`].
    /// Callers are expected to [`await_completion`](Self::await_completion) first.
    pub fn resolve_into(&self, out: &mut ResolvedView, exposure: f32) {
        let storage = self.storage.lock();
        let samples = self.samples();
        out.reset(storage.resolution);

        if samples == 0 {
            out.color.fill([0; 4]);
            out.depth.fill(CLEAR_DEPTH);
            return;
        }

        let inv_samples = 1.0 / samples as f32;
        let scale = exposure.exp2() * inv_samples;

        for (dst, src) in out.color.iter_mut().zip(&storage.color) {
            *dst = [
                encode_srgb(src[0] * scale),
                encode_srgb(src[1] * scale),
                encode_srgb(src[2] * scale),
                encode_unorm(src[3] * inv_samples),
            ];
        }
        out.depth.copy_from_slice(&storage.depth);
    }
}

impl Drop for AccumulationBuffer {
    fn drop(&mut self) {
        if !self.is_idle() {
            log::debug!(
                "waiting on compute stream `{}` before releasing accumulation buffer",
                self.stream.label()
            );
        }
        self.await_completion();
    }
}

/// Write access to the accumulation storage for one sample pass.
pub struct SampleWriter<'a> {
    storage: &'a mut AccumulationStorage,
    sample_index: u32,
}

impl SampleWriter<'_> {
    pub fn resolution(&self) -> Resolution {
        self.storage.resolution
    }

    /// Number of samples already accumulated before this pass.
    pub fn sample_index(&self) -> u32 {
        self.sample_index
    }

    /// Adds a linear RGBA sample and records its depth. Out-of-range pixels are
    /// ignored.
    #[inline]
    pub fn write(&mut self, x: u32, y: u32, color: [f32; 4], depth: f32) {
        let res = self.storage.resolution;
        if x >= res.width || y >= res.height {
            return;
        }
        let i = res.index(x, y);
        let acc = &mut self.storage.color[i];
        for c in 0..4 {
            acc[c] += color[c];
        }
        self.storage.depth[i] = depth;
    }

    /// Writes the same sample to every pixel.
    pub fn fill(&mut self, color: [f32; 4], depth: f32) {
        for acc in &mut self.storage.color {
            for c in 0..4 {
                acc[c] += color[c];
            }
        }
        self.storage.depth.fill(depth);
    }

    /// Calls `shade(x, y)` for every pixel and accumulates the result.
    pub fn shade<F>(&mut self, mut shade: F)
    where
        F: FnMut(u32, u32) -> ([f32; 4], f32),
    {
        let res = self.storage.resolution;
        for y in 0..res.height {
            for x in 0..res.width {
                let (color, depth) = shade(x, y);
                self.write(x, y, color, depth);
            }
        }
    }
}

/// Display-ready copy of one view: 8-bit sRGB color and float depth.
///
/// Kept per view and reused across frames to avoid reallocating.
#[derive(Debug, Clone, Default)]
pub struct ResolvedView {
    pub resolution: Resolution,
    pub color: Vec<[u8; 4]>,
    pub depth: Vec<f32>,
}

impl ResolvedView {
    fn reset(&mut self, resolution: Resolution) {
        let n = resolution.pixel_count();
        self.resolution = resolution;
        self.color.resize(n, [0; 4]);
        self.depth.resize(n, CLEAR_DEPTH);
    }
}

fn encode_unorm(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn encode_srgb(linear: f32) -> u8 {
    let c = if linear.is_nan() { 0.0 } else { linear.clamp(0.0, 1.0) };
    let encoded = if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    encode_unorm(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(w: u32, h: u32) -> AccumulationBuffer {
        let stream = Arc::new(ComputeStream::new("test-accumulation").unwrap());
        AccumulationBuffer::new(Resolution::new(w, h), stream)
    }

    #[test]
    fn empty_buffer_resolves_to_clear() {
        let buf = buffer(2, 2);
        let mut out = ResolvedView::default();
        buf.resolve_into(&mut out, 0.0);
        assert_eq!(out.resolution, Resolution::new(2, 2));
        assert!(out.color.iter().all(|c| *c == [0, 0, 0, 0]));
        assert!(out.depth.iter().all(|d| *d == CLEAR_DEPTH));
    }

    #[test]
    fn samples_are_averaged() {
        let mut buf = buffer(1, 1);
        buf.submit(|w| w.fill([1.0, 0.0, 0.0, 1.0], 0.25));
        buf.submit(|w| w.fill([0.0, 0.0, 0.0, 1.0], 0.5));
        buf.await_completion();

        assert_eq!(buf.samples(), 2);

        let mut out = ResolvedView::default();
        buf.resolve_into(&mut out, 0.0);
        // 0.5 linear encodes to 188 in sRGB.
        assert_eq!(out.color[0], [188, 0, 0, 255]);
        assert_eq!(out.depth[0], 0.5);
    }

    #[test]
    fn exposure_scales_rgb_only() {
        let mut buf = buffer(1, 1);
        buf.submit(|w| w.fill([0.25, 0.25, 0.25, 0.5], 0.0));
        buf.await_completion();

        let mut out = ResolvedView::default();
        buf.resolve_into(&mut out, 1.0);
        assert_eq!(out.color[0], [188, 188, 188, 128]);
    }

    #[test]
    fn reset_is_ordered_after_submitted_work() {
        let mut buf = buffer(2, 1);
        buf.submit(|w| w.fill([1.0; 4], 0.1));
        buf.reset();
        buf.submit(|w| w.write(1, 0, [1.0, 1.0, 1.0, 1.0], 0.3));
        buf.await_completion();

        assert_eq!(buf.samples(), 1);
        let mut out = ResolvedView::default();
        buf.resolve_into(&mut out, 0.0);
        assert_eq!(out.color[0], [0, 0, 0, 0]);
        assert_eq!(out.color[1], [255, 255, 255, 255]);
        assert_eq!(out.depth, vec![CLEAR_DEPTH, 0.3]);
    }

    #[test]
    fn sample_index_counts_previous_passes() {
        let mut buf = buffer(1, 1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..3 {
            let seen = Arc::clone(&seen);
            buf.submit(move |w| seen.lock().push(w.sample_index()));
        }
        buf.await_completion();
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn resize_waits_and_clears() {
        let mut buf = buffer(2, 2);
        buf.submit(|w| {
            std::thread::sleep(std::time::Duration::from_millis(20));
            w.fill([1.0; 4], 0.0);
        });
        buf.resize(Resolution::new(3, 1));
        assert!(buf.is_idle());
        assert_eq!(buf.resolution(), Resolution::new(3, 1));
        assert_eq!(buf.samples(), 0);
    }

    #[test]
    fn metadata_reads_do_not_wait_on_running_work() {
        let mut buf = buffer(4, 4);
        let (started_tx, started_rx) = flume::bounded::<()>(1);
        buf.submit(move |w| {
            let _ = started_tx.send(());
            std::thread::sleep(std::time::Duration::from_millis(300));
            w.fill([1.0; 4], 0.0);
        });
        started_rx.recv().unwrap();

        let start = std::time::Instant::now();
        assert_eq!(buf.resolution(), Resolution::new(4, 4));
        assert_eq!(buf.samples(), 0);
        assert!(!buf.is_idle());
        assert!(
            start.elapsed() < std::time::Duration::from_millis(150),
            "metadata reads blocked for {:?}",
            start.elapsed()
        );

        buf.await_completion();
        assert_eq!(buf.samples(), 1);
    }

    #[test]
    fn out_of_range_writes_are_ignored() {
        let mut buf = buffer(1, 1);
        buf.submit(|w| {
            w.write(5, 5, [1.0; 4], 0.0);
            w.write(0, 0, [0.0, 1.0, 0.0, 1.0], 0.0);
        });
        buf.await_completion();
        let mut out = ResolvedView::default();
        buf.resolve_into(&mut out, 0.0);
        assert_eq!(out.color[0], [0, 255, 0, 255]);
    }

    #[test]
    fn srgb_encoding_endpoints() {
        assert_eq!(encode_srgb(0.0), 0);
        assert_eq!(encode_srgb(1.0), 255);
        assert_eq!(encode_srgb(2.0), 255);
        assert_eq!(encode_srgb(f32::NAN), 0);
        assert_eq!(encode_srgb(0.5), 188);
    }
}
