use super::Resolution;

/// Axis-aligned pixel rectangle, half-open: `[x, x + width) × [y, y + height)`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle covering all of `res`.
    #[inline]
    pub const fn full(res: Resolution) -> Self {
        Self::new(0, 0, res.width, res.height)
    }

    #[inline]
    pub const fn size(self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn contains(self, px: u32, py: u32) -> bool {
        px >= self.x
            && py >= self.y
            && (px - self.x) < self.width
            && (py - self.y) < self.height
    }

    /// Intersection with `other`, or `None` when they do not overlap.
    pub fn intersect(self, other: PixelRect) -> Option<PixelRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x as u64 + self.width as u64).min(other.x as u64 + other.width as u64);
        let y1 = (self.y as u64 + self.height as u64).min(other.y as u64 + other.height as u64);

        if x1 <= x0 as u64 || y1 <= y0 as u64 {
            None
        } else {
            Some(PixelRect::new(x0, y0, (x1 - x0 as u64) as u32, (y1 - y0 as u64) as u32))
        }
    }

    /// Clips this rectangle to a framebuffer of resolution `bounds`.
    #[inline]
    pub fn clip_to(self, bounds: Resolution) -> Option<PixelRect> {
        self.intersect(PixelRect::full(bounds))
    }
}
