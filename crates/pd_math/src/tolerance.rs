/// Absolute tolerance used when comparing field values.
///
/// Values coming back from a renderer or out of a rotation normalization
/// rarely survive bit-exact, so every float comparison in the field system
/// goes through this threshold.
pub const EPSILON: f64 = 1e-6;

/// Returns true if `a` and `b` differ by no more than [`EPSILON`].
#[inline]
pub fn almost_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON
}

/// Extension trait for component-wise tolerant comparison of glam vectors.
pub trait AlmostEq {
    fn almost_eq(&self, other: &Self) -> bool;
}

impl AlmostEq for f64 {
    fn almost_eq(&self, other: &Self) -> bool {
        almost_equal(*self, *other)
    }
}

impl AlmostEq for glam::DVec2 {
    fn almost_eq(&self, other: &Self) -> bool {
        almost_equal(self.x, other.x) && almost_equal(self.y, other.y)
    }
}

impl AlmostEq for glam::DVec3 {
    fn almost_eq(&self, other: &Self) -> bool {
        almost_equal(self.x, other.x)
            && almost_equal(self.y, other.y)
            && almost_equal(self.z, other.z)
    }
}
