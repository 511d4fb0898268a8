pub mod mesh;
mod point_cloud;

pub use mesh::Mesh;
pub use point_cloud::{FlatPointBuffers, PointCloud};

pub type Point3 = parry3d_f64::na::Point3<f64>;
pub type Vector3 = parry3d_f64::na::Vector3<f64>;
pub type UnitVec3 = parry3d_f64::na::Unit<Vector3>;
pub type UnitQuat = parry3d_f64::na::UnitQuaternion<f64>;
pub type Iso3 = parry3d_f64::na::Isometry3<f64>;
