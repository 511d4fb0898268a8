//! Casting a batch of sensor rays against the filtered scene candidates, and assembling the
//! hits into a point cloud expressed in the reference frame.

use crate::scene::{Candidate, ReferenceFrame};
use crate::sensors::color::ColorPolicy;
use crate::{Iso3, Point3, PointCloud, UnitVec3};
use parry3d_f64::query::Ray;
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Everything needed to run one scan cycle for one sensor.
#[derive(Debug, Clone, Copy)]
pub struct ScanRequest<'a> {
    /// Ray directions in the sensor frame
    pub rays: &'a [UnitVec3],

    /// The sensor pose in the reference frame
    pub pose: &'a Iso3,

    pub frame: &'a ReferenceFrame,
    pub min_range: f64,
    pub max_range: f64,
    pub color: ColorPolicy,
}

impl ScanRequest<'_> {
    /// The sensor pose in world coordinates, where the surfaces live
    pub fn world_pose(&self) -> Iso3 {
        self.frame.to_world() * self.pose
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScanStats {
    pub rays_cast: usize,
    pub candidates: usize,
    pub hits: usize,
    pub elapsed: Duration,
}

/// Find the range to the nearest candidate surface along a world-space ray, considering only
/// the interval `[min_range, max_range]`. The ray is started at `min_range`, so geometry closer
/// than that is passed through rather than blocking the ray.
pub fn cast_nearest(
    origin: &Point3,
    direction: &UnitVec3,
    min_range: f64,
    max_range: f64,
    candidates: &[Candidate],
) -> Option<f64> {
    let span = max_range - min_range;
    if span <= 0.0 {
        return None;
    }

    let ray = Ray::new(origin + direction.into_inner() * min_range, direction.into_inner());
    let mut best: Option<f64> = None;
    for candidate in candidates {
        let limit = best.unwrap_or(span);
        if let Some(toi) = candidate.surface.cast_ray(&ray, limit) {
            best = Some(toi);
        }
    }

    best.map(|toi| toi + min_range)
}

/// Cast every ray of the request and return the hit range (or `None`) per ray, in ray order.
/// With `parallel` set the rays are spread over the rayon pool; the result is identical.
pub fn cast_ranges(
    request: &ScanRequest,
    candidates: &[Candidate],
    parallel: bool,
) -> Vec<Option<f64>> {
    if candidates.is_empty() {
        return vec![None; request.rays.len()];
    }

    let world = request.world_pose();
    let origin = Point3::from(world.translation.vector);
    let cast = |d: &UnitVec3| {
        let dir = world.rotation * *d;
        cast_nearest(&origin, &dir, request.min_range, request.max_range, candidates)
    };

    if parallel {
        request.rays.par_iter().map(cast).collect()
    } else {
        request.rays.iter().map(cast).collect()
    }
}

/// Run one full scan cycle and build the resulting point cloud.
///
/// Each ray is rotated by the sensor's world orientation and cast from the sensor's world
/// position against the candidates. The nearest hit becomes a sample: its world position is
/// brought back into the reference frame (the space the display's root transform is applied
/// to) and colored according to the request's color policy. Rays which miss produce nothing.
/// An empty candidate list returns an empty cloud without casting anything.
///
/// # Arguments
///
/// * `request`: rays, pose, frame, range limits and color policy
/// * `candidates`: the filtered surfaces, nearest first
/// * `parallel`: whether to cast on the rayon pool
///
/// returns: (PointCloud, ScanStats)
pub fn build_point_cloud(
    request: &ScanRequest,
    candidates: &[Candidate],
    parallel: bool,
) -> (PointCloud, ScanStats) {
    let start = Instant::now();
    if candidates.is_empty() || request.rays.is_empty() {
        return (
            PointCloud::empty(),
            ScanStats {
                elapsed: start.elapsed(),
                ..Default::default()
            },
        );
    }

    let ranges = cast_ranges(request, candidates, parallel);
    let world = request.world_pose();
    let to_world = request.frame.to_world();

    let mut cloud = PointCloud::with_capacity(ranges.iter().flatten().count());
    for (dir, range) in request.rays.iter().zip(ranges.iter()) {
        let Some(range) = range else {
            continue;
        };
        let world_hit = world * Point3::from(dir.into_inner() * *range);
        let stored = to_world.inverse_transform_point(&world_hit);
        cloud.push(stored, request.color.color_for(*range));
    }

    let stats = ScanStats {
        rays_cast: request.rays.len(),
        candidates: candidates.len(),
        hits: cloud.len(),
        elapsed: start.elapsed(),
    };

    (cloud, stats)
}
