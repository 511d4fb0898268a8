//! This module contains the simulated sensors: their poses and scan configurations, the ray
//! patterns they emit, the ray casting which turns those rays into point clouds and depth
//! previews, the display volumes of their fields of view, and the registry which owns every
//! sensor instance.

pub mod camera;
pub mod color;
pub mod lidar;
pub mod pose;
pub mod raycast;
mod registry;
pub mod volume;

use crate::errors::GeometryError;
use crate::{Mesh, UnitVec3};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub use camera::{CameraConfig, CameraPreview};
pub use color::{ColorMode, ColorPolicy};
pub use lidar::{LidarScanConfig, ScanPattern, generate_ray_directions};
pub use pose::SensorPose;
pub use raycast::{ScanRequest, ScanStats, build_point_cloud};
pub use registry::{SensorSpec, SensorState, SensorUpdate, Visualizer};
pub use volume::{VolumeSettings, build_camera_frustum_mesh, build_scan_volume_mesh};

/// Identifies one sensor instance for its whole lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SensorId(Uuid);

impl SensorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SensorId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SensorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Something which emits a fixed pattern of rays from its own origin and only registers hits
/// between a minimum and maximum range.
pub trait SimulatedSensor {
    /// Ray directions in the sensor frame, limited to roughly `budget` rays
    fn ray_directions(&self, budget: usize) -> Vec<UnitVec3>;

    /// The (min, max) range window in meters
    fn range(&self) -> (f64, f64);

    /// The closed display mesh of everything the sensor could see, in the sensor frame
    fn volume_mesh(&self, settings: &VolumeSettings) -> Result<Mesh, GeometryError>;
}

impl SimulatedSensor for LidarScanConfig {
    fn ray_directions(&self, budget: usize) -> Vec<UnitVec3> {
        generate_ray_directions(self, budget)
    }

    fn range(&self) -> (f64, f64) {
        let c = self.sanitized();
        (c.min_range, c.max_range)
    }

    fn volume_mesh(&self, settings: &VolumeSettings) -> Result<Mesh, GeometryError> {
        build_scan_volume_mesh(self, settings)
    }
}

impl SimulatedSensor for CameraConfig {
    fn ray_directions(&self, budget: usize) -> Vec<UnitVec3> {
        self.pixel_rays(budget).2
    }

    fn range(&self) -> (f64, f64) {
        let c = self.sanitized();
        (c.min_range, c.max_range)
    }

    fn volume_mesh(&self, _settings: &VolumeSettings) -> Result<Mesh, GeometryError> {
        build_camera_frustum_mesh(self)
    }
}

/// The kind of sensor together with its kind-specific configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorKind {
    Camera(CameraConfig),
    Lidar(LidarScanConfig),
}

impl SensorKind {
    pub fn is_lidar(&self) -> bool {
        matches!(self, SensorKind::Lidar(_))
    }

    pub fn is_camera(&self) -> bool {
        matches!(self, SensorKind::Camera(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SensorKind::Camera(_) => "camera",
            SensorKind::Lidar(_) => "lidar",
        }
    }

    pub fn sanitized(&self) -> Self {
        match self {
            SensorKind::Camera(c) => SensorKind::Camera(c.sanitized()),
            SensorKind::Lidar(c) => SensorKind::Lidar(c.sanitized()),
        }
    }

    pub fn as_sensor(&self) -> &dyn SimulatedSensor {
        match self {
            SensorKind::Camera(c) => c,
            SensorKind::Lidar(c) => c,
        }
    }
}

impl Default for SensorKind {
    fn default() -> Self {
        SensorKind::Lidar(LidarScanConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_ids_are_unique() {
        let a = SensorId::new();
        let b = SensorId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn kind_serializes_with_type_tag() {
        let kind = SensorKind::Lidar(LidarScanConfig::vlp16());
        let text = serde_json::to_string(&kind).unwrap();
        assert!(text.contains("\"type\":\"lidar\""));
        let back: SensorKind = serde_json::from_str(&text).unwrap();
        assert_eq!(back, kind);
    }

    #[test]
    fn camera_kind_defaults_missing_fields() {
        let kind: SensorKind = serde_json::from_str(r#"{"type": "camera", "hFov": 70}"#).unwrap();
        let SensorKind::Camera(c) = kind else {
            panic!("expected a camera");
        };
        assert_eq!(c.horizontal_fov, 70.0);
        assert_eq!(c.vertical_fov, CameraConfig::default().vertical_fov);
    }

    #[test]
    fn trait_ranges_are_sanitized() {
        let lidar = LidarScanConfig::new(360.0, 30.0, 16, 0.2, 2.0, 1.0);
        let (lo, hi) = lidar.range();
        assert!(hi > lo);

        let kind = SensorKind::Lidar(lidar);
        assert_eq!(kind.as_sensor().range(), (lo, hi));
    }

    #[test]
    fn camera_rays_respect_budget() {
        let camera = CameraConfig::default();
        let rays = camera.ray_directions(100);
        assert!(rays.len() <= 100);
        assert!(!rays.is_empty());
    }
}
