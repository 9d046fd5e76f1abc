//! Tracked Pose
//!
//! Position + orientation of a tracked device, as carried on the multicast
//! data channel. Orientation is a unit quaternion in `[x, y, z, w]` order.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Position and rotation of a tracked device.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in meters, relative to the playground origin.
    pub position: [f32; 3],
    /// Rotation quaternion `[x, y, z, w]`.
    pub rotation: [f32; 4],
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    /// Origin, no rotation.
    pub const IDENTITY: Self = Self {
        position: [0.0, 0.0, 0.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
    };

    /// Create a pose from components.
    #[inline]
    pub const fn new(position: [f32; 3], rotation: [f32; 4]) -> Self {
        Self { position, rotation }
    }

    /// Pose at `position` with identity rotation.
    #[inline]
    pub const fn at(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Translate by `offset`, keeping rotation.
    #[inline]
    pub fn offset(self, offset: [f32; 3]) -> Self {
        Self {
            position: [
                self.position[0] + offset[0],
                self.position[1] + offset[1],
                self.position[2] + offset[2],
            ],
            rotation: self.rotation,
        }
    }
}

impl fmt::Debug for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.position;
        write!(f, "Pose(({:.3}, {:.3}, {:.3}) {:?})", x, y, z, self.rotation)
    }
}
