// Re-export glam for convenience
pub use glam::*;

// PROTO field math
mod rotation;
mod tolerance;
pub use rotation::Rotation;
pub use tolerance::{almost_equal, AlmostEq, EPSILON};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dvec3_creation() {
        let v = DVec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 2.0);
        assert_eq!(v.z, 3.0);
    }

    #[test]
    fn test_rotation_reexport() {
        let r = Rotation::new(0.0, 1.0, 0.0, 0.5);
        assert!(r.almost_eq(&Rotation::new(0.0, 1.0, 0.0, 0.5 + EPSILON / 10.0)));
    }
}
