// Axis-angle rotations as they appear in PROTO fields
//
// A `Rotation` keeps the four numbers exactly as written (`x y z angle`),
// and converts to glam::DQuat only for orientation comparisons.

use glam::{DQuat, DVec3};

use crate::tolerance::{almost_equal, AlmostEq, EPSILON};

/// An axis-angle rotation (`SFRotation`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub axis: DVec3,
    /// Angle in radians.
    pub angle: f64,
}

impl Rotation {
    /// The default rotation of every PROTO field (`0 0 1 0`).
    pub const IDENTITY: Rotation = Rotation {
        axis: DVec3::Z,
        angle: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64, angle: f64) -> Self {
        Self {
            axis: DVec3::new(x, y, z),
            angle,
        }
    }

    /// Components in file order: `[x, y, z, angle]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.axis.x, self.axis.y, self.axis.z, self.angle]
    }

    /// Quaternion form, or None when the axis cannot be normalized.
    pub fn to_quat(&self) -> Option<DQuat> {
        let axis = self.axis.try_normalize()?;
        Some(DQuat::from_axis_angle(axis, self.angle))
    }

    /// True if both rotations describe the same orientation.
    ///
    /// Component-wise equality is checked first so that rotations with a
    /// degenerate axis can still compare equal to themselves.
    pub fn almost_eq(&self, other: &Rotation) -> bool {
        if self.axis.almost_eq(&other.axis) && almost_equal(self.angle, other.angle) {
            return true;
        }

        match (self.to_quat(), other.to_quat()) {
            // q and -q are the same orientation
            (Some(a), Some(b)) => (1.0 - a.dot(b).abs()) <= EPSILON,
            _ => false,
        }
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::IDENTITY
    }
}
