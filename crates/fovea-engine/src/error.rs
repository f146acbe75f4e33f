//! Error types.
//!
//! Frame-scoped conditions (window closed, transient context loss) are reported
//! through boolean returns on the frame boundary calls. Everything here is a hard
//! failure for the caller, except [`CompositorError::ContextLost`] and
//! [`CompositorError::ResourceMismatch`], which the compositor handles internally
//! and only logs.

use thiserror::Error;

use crate::compositor::FrameState;
use crate::coords::Resolution;

/// Errors raised by the compositor and its collaborators.
#[derive(Debug, Error)]
pub enum CompositorError {
    /// The windowing subsystem could not allocate a window or graphics context.
    #[error("failed to create window: {0}")]
    WindowCreation(String),

    /// The graphics context became invalid while recording or submitting a frame.
    #[error("graphics context lost: {0}")]
    ContextLost(String),

    /// Presentable textures diverged from the view resolution they must match.
    #[error("presentable textures are {actual}, view resolution is {expected}")]
    ResourceMismatch {
        expected: Resolution,
        actual: Resolution,
    },

    /// A compositor already owns the display in this process.
    #[error("a compositor is already initialized in this process")]
    DoubleInit,

    /// A frame-boundary call was made in the wrong state.
    #[error("`{operation}` requires state {expected:?}, compositor is {found:?}")]
    InvalidState {
        operation: &'static str,
        expected: FrameState,
        found: FrameState,
    },

    /// Texel data does not fit the texture it is written to.
    #[error("invalid texture upload: {0}")]
    InvalidUpload(String),

    /// Adapter/device acquisition failed, or the surface hit an unrecoverable error.
    #[error("gpu error: {0}")]
    Gpu(String),

    /// The compute stream worker could not be started.
    #[error("compute stream `{label}` failed: {reason}")]
    ComputeStream { label: String, reason: String },
}

impl CompositorError {
    /// Returns `true` for errors that only invalidate the current frame.
    pub fn is_frame_scoped(&self) -> bool {
        matches!(self, Self::ContextLost(_) | Self::ResourceMismatch { .. })
    }
}

pub type Result<T, E = CompositorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_scoped_classification() {
        assert!(CompositorError::ContextLost("outdated".into()).is_frame_scoped());
        assert!(
            CompositorError::ResourceMismatch {
                expected: Resolution::new(4, 4),
                actual: Resolution::new(2, 2),
            }
            .is_frame_scoped()
        );
        assert!(!CompositorError::DoubleInit.is_frame_scoped());
        assert!(!CompositorError::WindowCreation("no display".into()).is_frame_scoped());
    }

    #[test]
    fn invalid_state_message_names_operation() {
        let err = CompositorError::InvalidState {
            operation: "present",
            expected: FrameState::FrameActive,
            found: FrameState::Ready,
        };
        let msg = err.to_string();
        assert!(msg.contains("present"));
        assert!(msg.contains("FrameActive"));
        assert!(msg.contains("Ready"));
    }
}
