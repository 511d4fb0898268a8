//! Geometry and simulation core for placing virtual cameras and LIDARs in a 3D scene. Sensors
//! are posed and configured through a [`Visualizer`], which casts each LIDAR's scan pattern
//! against the scene's surfaces to produce a coloured point cloud, builds the meshes used to
//! display each sensor's field of view, and rate-limits recomputation while the pose or
//! configuration is being changed continuously.

pub mod common;
pub mod errors;
pub mod geom3;
pub mod io;
pub mod scene;
pub mod scheduling;
pub mod sensors;

use std::error::Error;

pub use parry3d_f64::na;

pub type Result<T> = std::result::Result<T, Box<dyn Error>>;

pub use errors::{GeometryError, ImportError};
pub use geom3::{Iso3, Mesh, Point3, PointCloud, UnitQuat, UnitVec3, Vector3};
pub use io::settings::EngineSettings;
pub use scene::{IntersectableSurface, ReferenceFrame, Scene, SurfaceId, SurfaceSource, SurfaceTag};
pub use scheduling::{Clock, ManualClock, SystemClock, Throttle, ThrottledCall, Trigger};
pub use sensors::{
    CameraConfig, CameraPreview, ColorMode, LidarScanConfig, SensorId, SensorKind, SensorPose,
    SensorSpec, SensorUpdate, Visualizer,
};
