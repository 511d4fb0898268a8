//! Display geometry for a sensor's field of view. These meshes only show where a sensor could
//! see; they are never ray cast by their own sensor and have no effect on the scan itself.

use crate::errors::GeometryError;
use crate::sensors::camera::CameraConfig;
use crate::sensors::lidar::LidarScanConfig;
use crate::{Mesh, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Planar scanners have no vertical extent, so their volume is drawn with this much vertical
/// FOV to give it some thickness
pub const MIN_DISPLAY_VERTICAL_FOV: f64 = 1.0;

/// Keeps the top and bottom rings of a near-hemispherical volume from collapsing to a point
const MAX_DISPLAY_HALF_VERTICAL_FOV: f64 = 89.5;

/// Tessellation of the scan volume meshes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeSettings {
    /// Horizontal segments a full rotation is divided into. Sectors get a proportional share.
    pub horizontal_segments_per_360: u32,
    pub vertical_segments: u32,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            horizontal_segments_per_360: 64,
            vertical_segments: 8,
        }
    }
}

fn direction(h_deg: f64, v_deg: f64) -> Vector3 {
    let (sh, ch) = h_deg.to_radians().sin_cos();
    let (sv, cv) = v_deg.to_radians().sin_cos();
    Vector3::new(cv * ch, cv * sh, sv)
}

/// Push the two triangles of the quad `a, b, c, d`, either as given or with the winding flipped
fn push_quad(faces: &mut Vec<[u32; 3]>, a: u32, b: u32, c: u32, d: u32, flip: bool) {
    if flip {
        faces.push([a, c, b]);
        faces.push([a, d, c]);
    } else {
        faces.push([a, b, c]);
        faces.push([a, c, d]);
    }
}

/// Build the closed volume a LIDAR could detect within, in the sensor frame.
///
/// For a full rotation the result is a shell between the min and max range spanning the
/// vertical FOV, with annular caps top and bottom. The first and last columns of the shell
/// share vertices so there is no seam. For anything narrower than a full rotation the result
/// is a wedge with the same top and bottom caps plus flat caps on the left and right sides.
/// Either way every edge is shared by exactly two outward facing triangles.
///
/// # Arguments
///
/// * `config`: the scan configuration, sanitized before use
/// * `settings`: the tessellation density
///
/// returns: Result<Mesh, GeometryError>
pub fn build_scan_volume_mesh(
    config: &LidarScanConfig,
    settings: &VolumeSettings,
) -> Result<Mesh, GeometryError> {
    let config = config.sanitized();
    let full = config.is_full_rotation();
    let per_360 = settings.horizontal_segments_per_360.max(3) as f64;

    let nh = if full {
        per_360 as usize
    } else {
        ((per_360 * config.horizontal_fov / 360.0).ceil() as usize).max(1)
    };
    let nv = settings.vertical_segments.max(1) as usize;

    // Columns of vertices, the seam column is not duplicated for a full rotation
    let cols = if full { nh } else { nh + 1 };
    let rows = nv + 1;

    let half_v = (config.vertical_fov.max(MIN_DISPLAY_VERTICAL_FOV) / 2.0)
        .min(MAX_DISPLAY_HALF_VERTICAL_FOV);
    let h_start = -config.horizontal_fov / 2.0;
    let h_step = config.horizontal_fov / nh as f64;
    let v_step = 2.0 * half_v / nv as f64;

    let mut vertices = Vec::with_capacity(2 * cols * rows);
    for radius in [config.max_range, config.min_range] {
        for i in 0..cols {
            let h = h_start + i as f64 * h_step;
            for j in 0..rows {
                let v = -half_v + j as f64 * v_step;
                vertices.push(Point3::from(direction(h, v) * radius));
            }
        }
    }

    let outer = |i: usize, j: usize| ((i % cols) * rows + j) as u32;
    let inner = |i: usize, j: usize| (cols * rows + (i % cols) * rows + j) as u32;

    let mut faces = Vec::new();

    // Outer and inner surfaces
    for i in 0..nh {
        for j in 0..nv {
            push_quad(
                &mut faces,
                outer(i, j),
                outer(i + 1, j),
                outer(i + 1, j + 1),
                outer(i, j + 1),
                false,
            );
            push_quad(
                &mut faces,
                inner(i, j),
                inner(i + 1, j),
                inner(i + 1, j + 1),
                inner(i, j + 1),
                true,
            );
        }
    }

    // Top and bottom caps
    for i in 0..nh {
        push_quad(
            &mut faces,
            inner(i, nv),
            outer(i, nv),
            outer(i + 1, nv),
            inner(i + 1, nv),
            false,
        );
        push_quad(
            &mut faces,
            inner(i, 0),
            outer(i, 0),
            outer(i + 1, 0),
            inner(i + 1, 0),
            true,
        );
    }

    // Side caps of a sector
    if !full {
        for j in 0..nv {
            push_quad(
                &mut faces,
                inner(0, j),
                outer(0, j),
                outer(0, j + 1),
                inner(0, j + 1),
                false,
            );
            push_quad(
                &mut faces,
                inner(nh, j),
                outer(nh, j),
                outer(nh, j + 1),
                inner(nh, j + 1),
                true,
            );
        }
    }

    Mesh::try_new(vertices, faces)
}

/// Build the truncated pyramid a camera sees, from its near clip plane to its far clip plane,
/// in the sensor frame. The result has 8 vertices and 12 outward facing triangles.
pub fn build_camera_frustum_mesh(config: &CameraConfig) -> Result<Mesh, GeometryError> {
    let config = config.sanitized();
    let (tx, ty) = config.tan_half_extents();

    let mut vertices = Vec::with_capacity(8);
    for d in [config.min_range, config.max_range] {
        let (y, z) = (d * tx, d * ty);
        vertices.push(Point3::new(d, y, -z));
        vertices.push(Point3::new(d, -y, -z));
        vertices.push(Point3::new(d, -y, z));
        vertices.push(Point3::new(d, y, z));
    }

    let mut faces = vec![[0, 1, 2], [0, 2, 3], [4, 6, 5], [4, 7, 6]];
    for p in 0..4 {
        let q = (p + 1) % 4;
        faces.push([p, q + 4, q]);
        faces.push([p, p + 4, q + 4]);
    }

    Mesh::try_new(vertices, faces)
}
