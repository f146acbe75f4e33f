use std::time::{Duration, Instant};

use crate::coords::Resolution;

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Clamped time since the previous tick, in seconds.
    pub dt: f32,

    /// Exponentially smoothed frames per second.
    pub fps: f32,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Monotonic frame counter.
    pub frame_index: u64,
}

/// Produces `FrameTime` snapshots with clamped delta time and a smoothed rate.
///
/// Delta time is clamped so a debugger pause or a minimized window does not
/// produce pathological values downstream.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
    smoothing: f32,
    fps: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    /// Creates a clock with custom delta-time clamps.
    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            last: Instant::now(),
            frame_index: 0,
            dt_min,
            dt_max,
            smoothing: 0.1,
            fps: 0.0,
        }
    }

    /// Resets the baseline, e.g. after the window was re-created.
    pub fn reset(&mut self) {
        self.last = Instant::now();
        self.fps = 0.0;
    }

    /// Advances the clock and returns a new `FrameTime`.
    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);
        self.last = now;

        let instant_fps = 1.0 / dt.as_secs_f32();
        self.fps = if self.fps == 0.0 {
            instant_fps
        } else {
            self.fps + (instant_fps - self.fps) * self.smoothing
        };

        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            fps: self.fps,
            now,
            frame_index: self.frame_index,
        };

        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-frame diagnostics handed to the overlay.
#[derive(Debug, Copy, Clone, Default)]
pub struct FrameStats {
    pub frame_index: u64,
    pub dt: f32,
    pub fps: f32,
    pub window: Resolution,
    pub view: Resolution,
    pub view_count: usize,

    /// Samples accumulated in the first view at the last present.
    pub samples: u32,

    /// Frames whose blit was skipped because the graphics context was lost.
    pub skipped_frames: u64,

    /// Texture reallocations caused by view-size changes.
    pub reallocations: u64,
}

impl FrameStats {
    pub(crate) fn record_time(&mut self, time: &FrameTime) {
        self.frame_index = time.frame_index;
        self.dt = time.dt;
        self.fps = time.fps;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dt_is_clamped_to_max() {
        let mut clock =
            FrameClock::with_clamps(Duration::from_millis(1), Duration::from_millis(50));
        let start = clock.last;
        let ft = clock.tick_at(start + Duration::from_secs(3));
        assert!((ft.dt - 0.05).abs() < 1e-6);
    }

    #[test]
    fn dt_is_clamped_to_min() {
        let mut clock =
            FrameClock::with_clamps(Duration::from_millis(1), Duration::from_millis(50));
        let start = clock.last;
        let ft = clock.tick_at(start);
        assert!((ft.dt - 0.001).abs() < 1e-6);
    }

    #[test]
    fn frame_index_increments() {
        let mut clock = FrameClock::new();
        let start = clock.last;
        let a = clock.tick_at(start + Duration::from_millis(16));
        let b = clock.tick_at(start + Duration::from_millis(32));
        assert_eq!(a.frame_index, 0);
        assert_eq!(b.frame_index, 1);
    }

    #[test]
    fn fps_converges_towards_steady_rate() {
        let mut clock = FrameClock::new();
        let mut t = clock.last + Duration::from_millis(40);
        let mut last = clock.tick_at(t);
        for _ in 0..200 {
            t += Duration::from_millis(10);
            last = clock.tick_at(t);
        }
        // First tick seeded the average at 25 fps; steady 10 ms frames pull it to 100.
        assert!((last.fps - 100.0).abs() < 1.0, "fps = {}", last.fps);
    }
}
