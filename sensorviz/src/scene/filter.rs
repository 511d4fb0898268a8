//! Pruning of the scene's surfaces down to a bounded, nearest-first list of candidates worth
//! ray casting against from a given sensor position.

use super::{IntersectableSurface, SurfaceTag};
use crate::Point3;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Tuning knobs for the candidate filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Multiplier on the sensor's max range used as the inclusion distance. The margin keeps
    /// large nearby objects whose bounding sphere overstates their extent from being clipped.
    pub range_margin: f64,

    /// Hard cap on the number of candidates kept, nearest first. Surfaces beyond the cap are
    /// dropped even if in range.
    pub max_candidates: usize,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            range_margin: 1.5,
            max_candidates: 500,
        }
    }
}

/// A surface which survived filtering, with the distance from the sensor to its bounding
/// sphere center.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub surface: &'a IntersectableSurface,
    pub distance: f64,
}

/// Select the surfaces a sensor at `position` could plausibly hit within `max_range`.
///
/// Surfaces not tagged as scenario geometry are excluded outright. The remaining surfaces are
/// kept if the near side of their bounding sphere is within `max_range * range_margin`, sorted
/// by center distance (ties keep their input order) and truncated to `max_candidates`.
///
/// # Arguments
///
/// * `surfaces`: every surface currently in the scene
/// * `position`: the sensor origin in world coordinates
/// * `max_range`: the sensor's maximum range in meters
/// * `settings`: margin and cap
///
/// returns: Vec<Candidate, Global>
pub fn filter_candidates<'a>(
    surfaces: impl IntoIterator<Item = &'a IntersectableSurface>,
    position: &Point3,
    max_range: f64,
    settings: &FilterSettings,
) -> Vec<Candidate<'a>> {
    let threshold = max_range * settings.range_margin;

    surfaces
        .into_iter()
        .filter(|s| s.tag() == SurfaceTag::Scenario && !s.mesh().is_empty())
        .filter_map(|surface| {
            let distance = (surface.center() - position).norm();
            if distance - surface.radius() <= threshold {
                Some(Candidate { surface, distance })
            } else {
                None
            }
        })
        .sorted_by(|a, b| a.distance.total_cmp(&b.distance))
        .take(settings.max_candidates)
        .collect()
}
