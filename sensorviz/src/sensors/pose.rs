use crate::{Iso3, Point3, UnitQuat, Vector3};
use serde::{Deserialize, Serialize};

/// The position and orientation of a sensor in the reference frame. Orientation is roll, pitch
/// and yaw in degrees, applied as intrinsic rotations about X, then the new Y, then the new Z,
/// so the rotation matrix is `Rx(roll) * Ry(pitch) * Rz(yaw)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorPose {
    pub position: [f64; 3],
    #[serde(default)]
    pub roll: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub yaw: f64,
}

impl SensorPose {
    pub fn new(position: [f64; 3], roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            position,
            roll,
            pitch,
            yaw,
        }
    }

    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self::new([x, y, z], 0.0, 0.0, 0.0)
    }

    pub fn point(&self) -> Point3 {
        Point3::from(self.position)
    }

    pub fn rotation(&self) -> UnitQuat {
        let rx = UnitQuat::from_axis_angle(&Vector3::x_axis(), self.roll.to_radians());
        let ry = UnitQuat::from_axis_angle(&Vector3::y_axis(), self.pitch.to_radians());
        let rz = UnitQuat::from_axis_angle(&Vector3::z_axis(), self.yaw.to_radians());
        rx * ry * rz
    }

    /// The transform from the sensor's local frame (X forward, Y left, Z up) to the reference
    /// frame
    pub fn to_iso(&self) -> Iso3 {
        Iso3::from_parts(Vector3::from(self.position).into(), self.rotation())
    }

    /// Returns a copy with any non-finite component replaced by zero
    pub fn sanitized(&self) -> Self {
        let fix = |v: f64| if v.is_finite() { v } else { 0.0 };
        Self {
            position: self.position.map(fix),
            roll: fix(self.roll),
            pitch: fix(self.pitch),
            yaw: fix(self.yaw),
        }
    }
}
