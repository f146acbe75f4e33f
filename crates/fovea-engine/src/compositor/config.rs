use crate::coords::{Resolution, ViewGrid};
use crate::present::{FilterMode, PresentOptions};

/// How view resolution is derived.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ViewSizing {
    /// Each view covers its window tile, scaled by `render_scale`.
    FollowWindow { render_scale: f32 },
    /// Views keep this resolution regardless of the window.
    Fixed(Resolution),
}

impl ViewSizing {
    pub fn resolve(self, window: Resolution, grid: ViewGrid) -> Resolution {
        match self {
            Self::FollowWindow { render_scale } => {
                grid.view_resolution(window).scaled(render_scale)
            }
            Self::Fixed(res) => Resolution::new(res.width.max(1), res.height.max(1)),
        }
    }
}

impl Default for ViewSizing {
    fn default() -> Self {
        Self::FollowWindow { render_scale: 1.0 }
    }
}

/// Compositor configuration.
#[derive(Debug, Clone)]
pub struct CompositorConfig {
    pub title: String,

    /// Packing of views inside the window.
    pub view_grid: ViewGrid,

    pub view_sizing: ViewSizing,

    pub present: PresentOptions,

    /// Color filter used when blitting views.
    pub color_filter: FilterMode,

    /// Exposure in stops applied when resolving accumulated samples.
    pub exposure: f32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            title: "fovea".to_string(),
            view_grid: ViewGrid::SINGLE,
            view_sizing: ViewSizing::default(),
            present: PresentOptions::default(),
            color_filter: FilterMode::Linear,
            exposure: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_window_splits_and_scales() {
        let sizing = ViewSizing::FollowWindow { render_scale: 0.5 };
        assert_eq!(
            sizing.resolve(Resolution::new(800, 600), ViewGrid::STEREO),
            Resolution::new(200, 300)
        );
    }

    #[test]
    fn fixed_ignores_window() {
        let sizing = ViewSizing::Fixed(Resolution::new(64, 32));
        assert_eq!(
            sizing.resolve(Resolution::new(800, 600), ViewGrid::SINGLE),
            Resolution::new(64, 32)
        );
    }

    #[test]
    fn fixed_zero_is_clamped() {
        let sizing = ViewSizing::Fixed(Resolution::new(0, 5));
        assert_eq!(sizing.resolve(Resolution::new(8, 8), ViewGrid::SINGLE), Resolution::new(1, 5));
    }
}
