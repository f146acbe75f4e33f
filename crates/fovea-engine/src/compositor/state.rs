use std::fmt;

/// Frame state machine of a compositor.
///
/// `Uninitialized → Ready → FrameActive → Ready → …`; only teardown returns to
/// `Uninitialized`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum FrameState {
    #[default]
    Uninitialized,
    /// Window and resources exist; no frame is open.
    Ready,
    /// Between a successful `begin_frame` and `end_frame`.
    FrameActive,
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::FrameActive => "frame active",
        };
        f.write_str(name)
    }
}
