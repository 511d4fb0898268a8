//! Scan configuration for spinning and sector LIDARs, and the generation of the structured grid
//! of ray directions (channel by horizontal step) such a sensor emits in one scan cycle.

use crate::common::{finite_or, linear_space, spread_indices};
use crate::{UnitVec3, Vector3};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HORIZONTAL_FOV: f64 = 360.0;
pub const DEFAULT_VERTICAL_FOV: f64 = 30.0;
pub const DEFAULT_CHANNELS: u32 = 16;
pub const DEFAULT_ANGULAR_RESOLUTION: f64 = 0.2;
pub const DEFAULT_MIN_RANGE: f64 = 0.1;
pub const DEFAULT_MAX_RANGE: f64 = 100.0;

/// The smallest horizontal step accepted, in degrees
pub const MIN_ANGULAR_RESOLUTION: f64 = 0.01;

/// The smallest minimum range accepted, in meters
pub const MIN_RANGE: f64 = 0.01;

/// The gap forced between min and max range when a config has them inverted or equal
pub const MIN_RANGE_SPAN: f64 = 0.1;

/// The default number of rays cast per scan cycle before resolution is degraded
pub const DEFAULT_RAY_BUDGET: usize = 10_000;

/// The scan parameters of a LIDAR. Angles are in degrees and ranges in meters. Every field has a
/// default so that documents written before a field existed still load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LidarScanConfig {
    /// Horizontal field of view, 360 for a full rotation
    #[serde(alias = "hFov")]
    pub horizontal_fov: f64,

    /// Vertical field of view spanned by the channels
    #[serde(alias = "vFov")]
    pub vertical_fov: f64,

    /// Number of vertical scan lines, 1 for a planar (2D) scanner
    pub channels: u32,

    /// Degrees between consecutive rays in a channel
    #[serde(alias = "angularResolution")]
    pub angular_resolution: f64,

    #[serde(alias = "minRange")]
    pub min_range: f64,

    #[serde(alias = "maxRange")]
    pub max_range: f64,
}

impl Default for LidarScanConfig {
    fn default() -> Self {
        Self {
            horizontal_fov: DEFAULT_HORIZONTAL_FOV,
            vertical_fov: DEFAULT_VERTICAL_FOV,
            channels: DEFAULT_CHANNELS,
            angular_resolution: DEFAULT_ANGULAR_RESOLUTION,
            min_range: DEFAULT_MIN_RANGE,
            max_range: DEFAULT_MAX_RANGE,
        }
    }
}

impl LidarScanConfig {
    pub fn new(
        horizontal_fov: f64,
        vertical_fov: f64,
        channels: u32,
        angular_resolution: f64,
        min_range: f64,
        max_range: f64,
    ) -> Self {
        Self {
            horizontal_fov,
            vertical_fov,
            channels,
            angular_resolution,
            min_range,
            max_range,
        }
    }

    /// A 16 channel spinning sensor in the class of the Velodyne VLP-16
    pub fn vlp16() -> Self {
        Self::default()
    }

    /// A 64 channel spinning sensor in the class of the Ouster OS1-64
    pub fn os1_64() -> Self {
        Self::new(360.0, 45.0, 64, 0.35, 0.3, 120.0)
    }

    /// A single plane 270 degree safety scanner
    pub fn planar_2d() -> Self {
        Self::new(270.0, 0.0, 1, 0.25, 0.05, 30.0)
    }

    pub fn is_full_rotation(&self) -> bool {
        self.horizontal_fov >= 360.0
    }

    /// Clamp every parameter into its valid range. Values come from free-form user input which
    /// can be transiently invalid while being typed, so nothing here fails.
    ///
    /// * non-finite values fall back to the defaults
    /// * the horizontal FOV is clamped to (0, 360] and the vertical FOV to [0, 180]
    /// * there is at least one channel
    /// * the angular resolution is at least `MIN_ANGULAR_RESOLUTION`
    /// * the minimum range is at least `MIN_RANGE` and the maximum range exceeds it
    pub fn sanitized(&self) -> Self {
        let horizontal_fov =
            finite_or(self.horizontal_fov, DEFAULT_HORIZONTAL_FOV).clamp(MIN_ANGULAR_RESOLUTION, 360.0);
        let vertical_fov = finite_or(self.vertical_fov, DEFAULT_VERTICAL_FOV).clamp(0.0, 180.0);
        let angular_resolution = finite_or(self.angular_resolution, DEFAULT_ANGULAR_RESOLUTION)
            .max(MIN_ANGULAR_RESOLUTION);
        let min_range = finite_or(self.min_range, DEFAULT_MIN_RANGE).max(MIN_RANGE);
        let mut max_range = finite_or(self.max_range, DEFAULT_MAX_RANGE);
        if max_range <= min_range {
            max_range = min_range + MIN_RANGE_SPAN;
        }

        Self {
            horizontal_fov,
            vertical_fov,
            channels: self.channels.max(1),
            angular_resolution,
            min_range,
            max_range,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.sanitized() == *self
    }
}

/// The number of horizontal steps needed to cover `fov` at `resolution`, i.e. the number of
/// angles `-fov/2 + i * resolution` strictly below `fov/2`. A small tolerance keeps exact
/// divisions from picking up an extra step through floating point error.
pub fn steps_for(fov: f64, resolution: f64) -> usize {
    ((fov / resolution) - 1e-9).ceil().max(1.0) as usize
}

/// The fully resolved scan grid for one configuration and ray budget. When the nominal
/// channels x steps grid exceeds the budget the horizontal step is widened so the scan still
/// covers the whole field of view at a lower resolution. If even one ray per channel would
/// exceed the budget, the channels themselves are evenly thinned.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPattern {
    elevations: Vec<f64>,
    azimuth_start: f64,
    azimuth_step: f64,
    steps: usize,
    degraded: bool,
}

impl ScanPattern {
    pub fn plan(config: &LidarScanConfig, ray_budget: usize) -> Self {
        let config = config.sanitized();
        let budget = ray_budget.max(1);

        let half_v = config.vertical_fov / 2.0;
        let mut elevations = if config.channels == 1 {
            vec![0.0]
        } else {
            linear_space(-half_v, half_v, config.channels as usize)
        };

        let mut degraded = false;
        if elevations.len() > budget {
            elevations = spread_indices(elevations.len(), budget)
                .into_iter()
                .map(|i| elevations[i])
                .collect();
            degraded = true;
        }

        let nominal = steps_for(config.horizontal_fov, config.angular_resolution);
        let max_steps = (budget / elevations.len()).max(1);
        let (steps, azimuth_step) = if nominal > max_steps {
            degraded = true;
            (max_steps, config.horizontal_fov / max_steps as f64)
        } else {
            (nominal, config.angular_resolution)
        };

        Self {
            elevations,
            azimuth_start: -config.horizontal_fov / 2.0,
            azimuth_step,
            steps,
            degraded,
        }
    }

    /// The vertical angle of each emitted channel in degrees, lowest first
    pub fn elevations(&self) -> &[f64] {
        &self.elevations
    }

    /// The horizontal angle of each step in degrees, starting at `-hFov/2`
    pub fn azimuths(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.steps).map(|i| self.azimuth_start + i as f64 * self.azimuth_step)
    }

    pub fn steps_per_channel(&self) -> usize {
        self.steps
    }

    /// The horizontal step actually used, which is wider than the configured resolution when
    /// the ray budget forced a degradation
    pub fn effective_resolution(&self) -> f64 {
        self.azimuth_step
    }

    pub fn total_rays(&self) -> usize {
        self.elevations.len() * self.steps
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Unit ray directions in the sensor frame (X forward, Y left, Z up), channel-major
    pub fn directions(&self) -> Vec<UnitVec3> {
        let mut result = Vec::with_capacity(self.total_rays());
        for v in &self.elevations {
            let (sv, cv) = v.to_radians().sin_cos();
            for h in self.azimuths() {
                let (sh, ch) = h.to_radians().sin_cos();
                result.push(UnitVec3::new_normalize(Vector3::new(cv * ch, cv * sh, sv)));
            }
        }
        result
    }
}

/// Generate the ordered sensor-local ray directions for one scan cycle of `config`, honoring
/// the ray budget. The same inputs always produce the same sequence.
pub fn generate_ray_directions(config: &LidarScanConfig, ray_budget: usize) -> Vec<UnitVec3> {
    ScanPattern::plan(config, ray_budget).directions()
}
