//! Frame timing.
//!
//! One `FrameClock` per compositor; `tick()` once per frame boundary. The
//! resulting `FrameTime` feeds `FrameStats`, which the overlay displays.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameStats, FrameTime};
