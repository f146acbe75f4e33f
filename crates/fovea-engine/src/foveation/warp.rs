use bytemuck::{Pod, Zeroable};

/// Binary search iterations used to centre the linear piece.
const FIT_ITERATIONS: u32 = 20;

/// Piecewise mapping of one normalized axis: left parabola, linear centre,
/// right parabola.
///
/// The mapping is continuous, maps `0 → 0` and `1 → 1`, and has slope `am` on
/// the centre piece. `Default` is the identity.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AxisWarp {
    // left parabola: al * x^2 + bl * x + cl
    al: f32,
    bl: f32,
    cl: f32,
    // centre: am * x + bm
    am: f32,
    bm: f32,
    // right parabola: ar * x^2 + br * x + cr
    ar: f32,
    br: f32,
    cr: f32,

    // switch points in display space
    switch_left: f32,
    switch_right: f32,
    // switch points in buffer space
    inv_switch_left: f32,
    inv_switch_right: f32,
}

impl Default for AxisWarp {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AxisWarp {
    pub const IDENTITY: AxisWarp = AxisWarp {
        al: 0.0,
        bl: 0.0,
        cl: 0.0,
        am: 1.0,
        bm: 0.0,
        ar: 0.0,
        br: 0.0,
        cr: 0.0,
        switch_left: 0.0,
        switch_right: 1.0,
        inv_switch_left: 0.0,
        inv_switch_right: 1.0,
    };

    /// Fits a warp whose centre piece has slope `center_pixel_steepness`, is
    /// centred on `center` in buffer space, and spans `center_radius` of the
    /// display on each side.
    ///
    /// Degenerate inputs (slope 1, or a centre covering the whole axis) yield the
    /// identity.
    pub fn new(center_pixel_steepness: f32, center: f32, center_radius: f32) -> Self {
        let am = center_pixel_steepness;
        if !(am.is_finite() && am > 0.0 && center.is_finite() && center_radius.is_finite()) {
            return Self::IDENTITY;
        }

        let inverse_radius = center_radius * am;
        let left_switch = (center - inverse_radius).max(0.0);
        let right_switch = (center + inverse_radius).min(1.0);

        let half_width = (right_switch - left_switch) / am / 2.0;

        // No closed form for the centre position; bisect on it.
        let mut bm = 0.0;
        let mut m_min = 0.0f32;
        let mut m_max = 1.0f32;
        for _ in 0..FIT_ITERATIONS {
            let m = (m_min + m_max) / 2.0;
            let l = m - half_width;
            let r = m + half_width;

            bm = -((am - 1.0) * l * l) / (r * r - 2.0 * r + l * l + 1.0);

            let l_actual = (left_switch - bm) / am;
            let r_actual = (right_switch - bm) / am;
            let m_actual = (l_actual + r_actual) / 2.0;

            if m_actual > m {
                m_min = m;
            } else {
                m_max = m;
            }
        }

        let l = (left_switch - bm) / am;
        let r = (right_switch - bm) / am;

        if (l == 0.0 && r == 1.0) || am == 1.0 {
            return Self::IDENTITY;
        }

        let denom = r * r - 2.0 * r + l * l + 1.0;
        if !denom.is_finite() || denom.abs() < f32::EPSILON {
            return Self::IDENTITY;
        }

        let bm = -((am - 1.0) * l * l) / denom;
        Self {
            al: (am - 1.0) / denom,
            bl: (am * (r * r - 2.0 * r + 1.0) + am * l * l + (2.0 - 2.0 * am) * l) / denom,
            cl: 0.0,
            am,
            bm,
            ar: -(am - 1.0) / denom,
            br: (am * (r * r + 1.0) - 2.0 * r + am * l * l) / denom,
            cr: -(am * r * r - r * r + (am - 1.0) * l * l) / denom,
            switch_left: l,
            switch_right: r,
            inv_switch_left: am * l + bm,
            inv_switch_right: am * r + bm,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Display coordinate → buffer coordinate.
    pub fn warp(&self, x: f32) -> f32 {
        let x = x.clamp(0.0, 1.0);
        if x < self.switch_left {
            self.al * x * x + self.bl * x + self.cl
        } else if x > self.switch_right {
            self.ar * x * x + self.br * x + self.cr
        } else {
            self.am * x + self.bm
        }
    }

    /// Buffer coordinate → display coordinate.
    pub fn unwarp(&self, y: f32) -> f32 {
        let y = y.clamp(0.0, 1.0);
        if y < self.inv_switch_left {
            solve_quadratic(self.al, self.bl, self.cl, y)
        } else if y > self.inv_switch_right {
            solve_quadratic(self.ar, self.br, self.cr, y)
        } else {
            (y - self.bm) / self.am
        }
    }

    /// Buffer pixels per display pixel at display coordinate `x`.
    pub fn density(&self, x: f32) -> f32 {
        let x = x.clamp(0.0, 1.0);
        if x < self.switch_left {
            2.0 * self.al * x + self.bl
        } else if x > self.switch_right {
            2.0 * self.ar * x + self.br
        } else {
            self.am
        }
    }

    pub fn to_uniform(&self) -> WarpUniform {
        WarpUniform {
            al: self.al,
            bl: self.bl,
            cl: self.cl,
            am: self.am,
            bm: self.bm,
            ar: self.ar,
            br: self.br,
            cr: self.cr,
            switch_left: self.switch_left,
            switch_right: self.switch_right,
            inv_switch_left: self.inv_switch_left,
            inv_switch_right: self.inv_switch_right,
        }
    }
}

/// Positive root of `a x^2 + b x + c = y`, falling back to the linear solution.
fn solve_quadratic(a: f32, b: f32, c: f32, y: f32) -> f32 {
    if a.abs() < f32::EPSILON {
        return if b.abs() < f32::EPSILON { y } else { (y - c) / b };
    }
    let disc = (b * b - 4.0 * a * (c - y)).max(0.0);
    (disc.sqrt() - b) / (2.0 * a)
}

/// Two-axis foveation descriptor.
///
/// Supplied per frame by the rendering engine and consumed by the presenter's
/// blit. It is a plain value; `Default` is the identity (no warp).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Foveation {
    pub x: AxisWarp,
    pub y: AxisWarp,
}

impl Foveation {
    pub const IDENTITY: Foveation = Foveation {
        x: AxisWarp::IDENTITY,
        y: AxisWarp::IDENTITY,
    };

    #[inline]
    pub const fn identity() -> Self {
        Self::IDENTITY
    }

    /// Builds a foveation from per-axis `(x, y)` parameters.
    pub fn new(
        center_pixel_steepness: [f32; 2],
        center: [f32; 2],
        center_radius: [f32; 2],
    ) -> Self {
        Self {
            x: AxisWarp::new(center_pixel_steepness[0], center[0], center_radius[0]),
            y: AxisWarp::new(center_pixel_steepness[1], center[1], center_radius[1]),
        }
    }

    /// Foveation for a buffer rendered at `render_scale` of display resolution
    /// that keeps a full-resolution disc of `full_res_diameter` (normalized)
    /// around `center`.
    ///
    /// A scale of 1 or more needs no warp and yields the identity.
    pub fn from_render_scale(render_scale: f32, center: [f32; 2], full_res_diameter: f32) -> Self {
        if !(render_scale.is_finite() && render_scale > 0.0 && render_scale < 1.0) {
            return Self::IDENTITY;
        }
        let steepness = 1.0 / render_scale;
        let radius = (full_res_diameter * 0.5).clamp(0.0, 0.5);
        Self::new([steepness; 2], center, [radius; 2])
    }

    pub fn is_identity(&self) -> bool {
        self.x.is_identity() && self.y.is_identity()
    }

    pub fn warp(&self, p: [f32; 2]) -> [f32; 2] {
        [self.x.warp(p[0]), self.y.warp(p[1])]
    }

    pub fn unwarp(&self, p: [f32; 2]) -> [f32; 2] {
        [self.x.unwarp(p[0]), self.y.unwarp(p[1])]
    }

    pub fn density(&self, p: [f32; 2]) -> f32 {
        self.x.density(p[0]) * self.y.density(p[1])
    }

    pub fn to_uniform(&self) -> FoveationUniform {
        FoveationUniform {
            warp_x: self.x.to_uniform(),
            warp_y: self.y.to_uniform(),
        }
    }
}

/// GPU layout of one [`AxisWarp`]; mirrors `Warp` in `blit.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct WarpUniform {
    pub al: f32,
    pub bl: f32,
    pub cl: f32,
    pub am: f32,
    pub bm: f32,
    pub ar: f32,
    pub br: f32,
    pub cr: f32,
    pub switch_left: f32,
    pub switch_right: f32,
    pub inv_switch_left: f32,
    pub inv_switch_right: f32,
}

/// GPU layout of a [`Foveation`]; the leading `warp_x`/`warp_y` fields of
/// `BlitParams` in `blit.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct FoveationUniform {
    pub warp_x: WarpUniform,
    pub warp_y: WarpUniform,
}
