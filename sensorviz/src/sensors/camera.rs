//! Pinhole camera configuration and the camera's simulated output, a low resolution depth
//! preview produced by casting one ray per pixel.

use crate::common::finite_or;
use crate::sensors::lidar::{MIN_RANGE, MIN_RANGE_SPAN};
use crate::{UnitVec3, Vector3};
use serde::{Deserialize, Serialize};

pub const MIN_CAMERA_FOV: f64 = 1.0;
pub const MAX_CAMERA_FOV: f64 = 179.0;
pub const DEFAULT_PREVIEW_PIXEL_BUDGET: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    #[serde(alias = "hFov")]
    pub horizontal_fov: f64,

    #[serde(alias = "vFov")]
    pub vertical_fov: f64,

    #[serde(alias = "minRange")]
    pub min_range: f64,

    #[serde(alias = "maxRange")]
    pub max_range: f64,

    /// Preview raster width in pixels
    pub preview_width: u32,

    /// Preview raster height in pixels
    pub preview_height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            horizontal_fov: 90.0,
            vertical_fov: 60.0,
            min_range: 0.1,
            max_range: 20.0,
            preview_width: 64,
            preview_height: 48,
        }
    }
}

impl CameraConfig {
    pub fn new(horizontal_fov: f64, vertical_fov: f64, min_range: f64, max_range: f64) -> Self {
        Self {
            horizontal_fov,
            vertical_fov,
            min_range,
            max_range,
            ..Default::default()
        }
    }

    pub fn sanitized(&self) -> Self {
        let d = Self::default();
        let min_range = finite_or(self.min_range, d.min_range).max(MIN_RANGE);
        let mut max_range = finite_or(self.max_range, d.max_range);
        if max_range <= min_range {
            max_range = min_range + MIN_RANGE_SPAN;
        }

        Self {
            horizontal_fov: finite_or(self.horizontal_fov, d.horizontal_fov)
                .clamp(MIN_CAMERA_FOV, MAX_CAMERA_FOV),
            vertical_fov: finite_or(self.vertical_fov, d.vertical_fov)
                .clamp(MIN_CAMERA_FOV, MAX_CAMERA_FOV),
            min_range,
            max_range,
            preview_width: self.preview_width.max(1),
            preview_height: self.preview_height.max(1),
        }
    }

    /// Half extents of the image plane at unit distance along the forward axis
    pub fn tan_half_extents(&self) -> (f64, f64) {
        (
            (self.horizontal_fov.to_radians() / 2.0).tan(),
            (self.vertical_fov.to_radians() / 2.0).tan(),
        )
    }

    /// The preview raster size after applying the pixel budget. Both sides shrink by the same
    /// factor so the aspect ratio is kept.
    pub fn preview_size(&self, pixel_budget: usize) -> (usize, usize) {
        let w = self.preview_width.max(1) as usize;
        let h = self.preview_height.max(1) as usize;
        let budget = pixel_budget.max(1);
        if w * h <= budget {
            return (w, h);
        }

        let scale = (budget as f64 / (w * h) as f64).sqrt();
        let w = ((w as f64 * scale).floor() as usize).max(1);
        let h = ((h as f64 * scale).floor() as usize).max(1);
        (w, h.min(budget / w).max(1))
    }

    /// One ray per preview pixel through the pixel center, row-major from the top left, in the
    /// sensor frame (X forward, Y left, Z up)
    pub fn pixel_rays(&self, pixel_budget: usize) -> (usize, usize, Vec<UnitVec3>) {
        let config = self.sanitized();
        let (w, h) = config.preview_size(pixel_budget);
        let (tx, ty) = config.tan_half_extents();
        let mut rays = Vec::with_capacity(w * h);
        for row in 0..h {
            let v = (1.0 - 2.0 * (row as f64 + 0.5) / h as f64) * ty;
            for col in 0..w {
                let u = (2.0 * (col as f64 + 0.5) / w as f64 - 1.0) * tx;
                rays.push(UnitVec3::new_normalize(Vector3::new(1.0, -u, v)));
            }
        }
        (w, h, rays)
    }
}

/// The camera's simulated image: the range to the first surface along each pixel ray, or
/// `None` where nothing was hit within range.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CameraPreview {
    width: usize,
    height: usize,
    depths: Vec<Option<f64>>,
}

impl CameraPreview {
    pub fn new(width: usize, height: usize, depths: Vec<Option<f64>>) -> crate::Result<Self> {
        if depths.len() != width * height {
            return Err(format!(
                "preview of {}x{} needs {} depths, got {}",
                width,
                height,
                width * height,
                depths.len()
            )
            .into());
        }
        Ok(Self {
            width,
            height,
            depths,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn depths(&self) -> &[Option<f64>] {
        &self.depths
    }

    pub fn depth_at(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.depths[row * self.width + col]
    }

    pub fn hit_count(&self) -> usize {
        self.depths.iter().filter(|d| d.is_some()).count()
    }

    /// An 8-bit grayscale rendering, near surfaces bright and misses black
    pub fn to_grayscale(&self, min_range: f64, max_range: f64) -> Vec<u8> {
        let span = (max_range - min_range).max(f64::EPSILON);
        self.depths
            .iter()
            .map(|d| match d {
                Some(d) => {
                    let f = ((d - min_range) / span).clamp(0.0, 1.0);
                    (255.0 - 235.0 * f).round() as u8
                }
                None => 0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn center_pixel_looks_forward() {
        let config = CameraConfig {
            preview_width: 3,
            preview_height: 3,
            ..Default::default()
        };
        let (w, h, rays) = config.pixel_rays(DEFAULT_PREVIEW_PIXEL_BUDGET);
        assert_eq!((w, h), (3, 3));
        assert_relative_eq!(rays[4].into_inner(), Vector3::x(), epsilon = 1e-12);
        // Top left pixel looks up and to the left
        assert!(rays[0].y > 0.0 && rays[0].z > 0.0);
        // Bottom right pixel looks down and to the right
        assert!(rays[8].y < 0.0 && rays[8].z < 0.0);
    }

    #[test]
    fn preview_budget_keeps_aspect() {
        let config = CameraConfig {
            preview_width: 640,
            preview_height: 480,
            ..Default::default()
        };
        let (w, h) = config.preview_size(4096);
        assert!(w * h <= 4096);
        assert_eq!((w, h), (73, 55));
    }

    #[test]
    fn sanitize_limits_fov() {
        let config = CameraConfig::new(200.0, 0.0, -1.0, f64::NAN).sanitized();
        assert_eq!(config.horizontal_fov, MAX_CAMERA_FOV);
        assert_eq!(config.vertical_fov, MIN_CAMERA_FOV);
        assert_eq!(config.min_range, MIN_RANGE);
        assert_eq!(config.max_range, 20.0);
    }

    #[test]
    fn preview_requires_matching_depths() {
        assert!(CameraPreview::new(2, 2, vec![None; 3]).is_err());
        let preview = CameraPreview::new(2, 1, vec![Some(1.0), None]).unwrap();
        assert_eq!(preview.depth_at(0, 0), Some(1.0));
        assert_eq!(preview.depth_at(5, 0), None);
        assert_eq!(preview.hit_count(), 1);
        assert_eq!(preview.to_grayscale(1.0, 2.0), vec![255, 0]);
    }
}
