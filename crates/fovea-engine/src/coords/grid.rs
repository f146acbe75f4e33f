use super::{PixelRect, Resolution};

/// Layout of packed views inside one window: `columns × rows` tiles.
///
/// `ViewGrid::SINGLE` is the common mono case; `ViewGrid::STEREO` packs a left
/// and a right eye side by side.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ViewGrid {
    pub columns: u32,
    pub rows: u32,
}

impl ViewGrid {
    pub const SINGLE: ViewGrid = ViewGrid { columns: 1, rows: 1 };
    pub const STEREO: ViewGrid = ViewGrid { columns: 2, rows: 1 };

    /// Creates a grid, clamping each dimension to at least one tile.
    #[inline]
    pub fn new(columns: u32, rows: u32) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }

    #[inline]
    pub const fn count(self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Nominal per-view resolution for a window of size `window`.
    pub fn view_resolution(self, window: Resolution) -> Resolution {
        Resolution::new(
            (window.width / self.columns.max(1)).max(1),
            (window.height / self.rows.max(1)).max(1),
        )
    }

    /// Destination rectangle of view `index` inside `target`.
    ///
    /// Tiles are laid out row-major. The last column and row absorb the
    /// division remainder so the tiles cover `target` exactly. Returns `None`
    /// when `index` is outside the grid.
    pub fn tile(self, index: usize, target: Resolution) -> Option<PixelRect> {
        if index >= self.count() {
            return None;
        }

        let cols = self.columns.max(1);
        let rows = self.rows.max(1);
        let col = index as u32 % cols;
        let row = index as u32 / cols;

        let base_w = target.width / cols;
        let base_h = target.height / rows;

        let x = col * base_w;
        let y = row * base_h;
        let w = if col + 1 == cols { target.width - x } else { base_w };
        let h = if row + 1 == rows { target.height - y } else { base_h };

        Some(PixelRect::new(x, y, w, h))
    }
}

impl Default for ViewGrid {
    fn default() -> Self {
        Self::SINGLE
    }
}
