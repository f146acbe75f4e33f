use std::fmt;

/// Width × height in physical pixels.
///
/// Window and view resolutions are both expressed with this type. A valid
/// resolution has both extents non-zero; see [`Resolution::is_valid`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `Some` only for a non-zero resolution.
    #[inline]
    pub const fn checked(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            None
        } else {
            Some(Self { width, height })
        }
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.width > 0 && self.height > 0
    }

    #[inline]
    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Scales both extents, rounding to nearest and never going below 1.
    pub fn scaled(self, factor: f32) -> Self {
        let factor = if factor.is_finite() && factor > 0.0 { factor } else { 1.0 };
        let w = (self.width as f32 * factor).round().max(1.0) as u32;
        let h = (self.height as f32 * factor).round().max(1.0) as u32;
        Self::new(w, h)
    }

    /// Row-major index of pixel `(x, y)`.
    #[inline]
    pub const fn index(self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<winit::dpi::PhysicalSize<u32>> for Resolution {
    fn from(size: winit::dpi::PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

impl From<Resolution> for winit::dpi::PhysicalSize<u32> {
    fn from(res: Resolution) -> Self {
        winit::dpi::PhysicalSize::new(res.width, res.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_rejects_zero_extents() {
        assert_eq!(Resolution::checked(0, 10), None);
        assert_eq!(Resolution::checked(10, 0), None);
        assert_eq!(Resolution::checked(3, 4), Some(Resolution::new(3, 4)));
    }

    #[test]
    fn scaled_rounds_and_clamps() {
        let r = Resolution::new(800, 600);
        assert_eq!(r.scaled(0.5), Resolution::new(400, 300));
        assert_eq!(r.scaled(0.0001), Resolution::new(1, 1));
        // Non-finite or non-positive factors leave the size unchanged.
        assert_eq!(r.scaled(f32::NAN), r);
        assert_eq!(r.scaled(-2.0), r);
    }

    #[test]
    fn index_is_row_major() {
        let r = Resolution::new(4, 3);
        assert_eq!(r.index(0, 0), 0);
        assert_eq!(r.index(3, 0), 3);
        assert_eq!(r.index(0, 1), 4);
        assert_eq!(r.index(3, 2), 11);
        assert_eq!(r.pixel_count(), 12);
    }

    #[test]
    fn display_format() {
        assert_eq!(Resolution::new(1280, 720).to_string(), "1280x720");
    }
}
