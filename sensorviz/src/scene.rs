//! This module holds the scene side of the engine: the surfaces rays can hit, the tags which
//! separate real scenario geometry from sensor visualization geometry, and the reference frame
//! the display uses for its root group.

pub mod filter;

use crate::sensors::SensorId;
use crate::{Iso3, Mesh, Point3, Vector3};
use parry3d_f64::query::Ray;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;
use uuid::Uuid;

pub use filter::{Candidate, FilterSettings, filter_candidates};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(Uuid);

impl SurfaceId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// What a surface belongs to. Only `Scenario` surfaces are ever ray cast; the others exist in
/// the scene so a renderer can draw them, but a sensor must never see its own (or another
/// sensor's) markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceTag {
    Scenario,
    SensorVisual(SensorId),
    PointCloud,
}

/// A static triangle-mesh surface with a cached world-space bounding sphere. Surfaces are
/// immutable once created; a scenario change replaces them rather than editing them.
///
/// The mesh is shared and may be stored in its own frame, with `placement` taking it to world
/// coordinates. Re-placing a surface with `placed_at` reuses the mesh and its BVH untouched.
#[derive(Debug, Clone)]
pub struct IntersectableSurface {
    id: SurfaceId,
    tag: SurfaceTag,
    mesh: Arc<Mesh>,
    placement: Iso3,
    center: Point3,
    radius: f64,
}

impl IntersectableSurface {
    /// Create a surface from a mesh whose vertices are already in world coordinates
    pub fn new(tag: SurfaceTag, mesh: Mesh) -> Self {
        let (center, radius) = mesh.bounding_sphere();
        Self {
            id: SurfaceId::new(),
            tag,
            mesh: Arc::new(mesh),
            placement: Iso3::identity(),
            center,
            radius,
        }
    }

    /// A new surface sharing this one's mesh, moved by `placement` on top of its current
    /// placement. Only the bounding sphere center is transformed.
    pub fn placed_at(&self, placement: &Iso3) -> Self {
        Self {
            id: SurfaceId::new(),
            tag: self.tag,
            mesh: Arc::clone(&self.mesh),
            placement: placement * self.placement,
            center: placement * self.center,
            radius: self.radius,
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn tag(&self) -> SurfaceTag {
        self.tag
    }

    /// The mesh in the surface's own frame, see `placement`
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn placement(&self) -> &Iso3 {
        &self.placement
    }

    pub fn center(&self) -> &Point3 {
        &self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Cast a world-space ray against the placed mesh, returning the time of impact
    pub fn cast_ray(&self, ray: &Ray, max_toi: f64) -> Option<f64> {
        let local = ray.inverse_transform_by(&self.placement);
        self.mesh.cast_ray(&local, max_toi)
    }

    /// Whether two surfaces share the same underlying mesh
    pub fn shares_mesh(&self, other: &IntersectableSurface) -> bool {
        Arc::ptr_eq(&self.mesh, &other.mesh)
    }
}

/// Anything that can hand out the current collection of surfaces. The engine asks for the list
/// again on every scan cycle and never holds on to it between cycles.
pub trait SurfaceSource {
    fn surfaces(&self) -> Vec<&IntersectableSurface>;
}

/// The transform from the frame sensors are posed in (and point clouds are stored in) to the
/// world frame the surfaces live in. A web renderer typically rotates its root group so that a
/// Z-up robotics frame displays in a Y-up scene; points must be stored before that rotation so
/// they are not transformed twice on render.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFrame {
    pub to_world: Iso3,
}

impl Default for ReferenceFrame {
    fn default() -> Self {
        Self::identity()
    }
}

impl ReferenceFrame {
    pub fn identity() -> Self {
        Self {
            to_world: Iso3::identity(),
        }
    }

    /// The Z-up (X forward, Y left) to Y-up convention swap, a -90 degree turn about X
    pub fn ros_to_y_up() -> Self {
        Self {
            to_world: Iso3::rotation(Vector3::x() * -FRAC_PI_2),
        }
    }

    pub fn to_world(&self) -> &Iso3 {
        &self.to_world
    }
}

/// The live scene: the current scenario's surfaces, any auxiliary tagged surfaces (sensor
/// volumes and the like), and the reference frame.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    scenario: Vec<IntersectableSurface>,
    auxiliary: Vec<IntersectableSurface>,
    frame: ReferenceFrame,
    generation: u64,
}

impl Scene {
    pub fn new(frame: ReferenceFrame) -> Self {
        Self {
            frame,
            ..Default::default()
        }
    }

    pub fn frame(&self) -> &ReferenceFrame {
        &self.frame
    }

    pub fn set_frame(&mut self, frame: ReferenceFrame) {
        self.frame = frame;
        self.generation += 1;
    }

    /// Changes every time the scenario collection is swapped, so dependents can tell that
    /// anything derived from the previous collection is stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace the entire scenario with a new set of world-space meshes. Returns the ids of the
    /// new surfaces.
    pub fn replace_scenario(&mut self, meshes: Vec<Mesh>) -> Vec<SurfaceId> {
        self.scenario = meshes
            .into_iter()
            .filter(|m| !m.is_empty())
            .map(|m| IntersectableSurface::new(SurfaceTag::Scenario, m))
            .collect();
        self.generation += 1;
        log::info!(
            "scenario replaced with {} surfaces (generation {})",
            self.scenario.len(),
            self.generation
        );
        self.scenario.iter().map(|s| s.id()).collect()
    }

    pub fn clear_scenario(&mut self) {
        self.replace_scenario(Vec::new());
    }

    pub fn scenario_len(&self) -> usize {
        self.scenario.len()
    }

    /// Add a surface which is not part of the scenario, such as a sensor's volume marker
    pub fn insert_auxiliary(&mut self, surface: IntersectableSurface) -> SurfaceId {
        let id = surface.id();
        self.auxiliary.push(surface);
        id
    }

    /// Remove every auxiliary surface carrying the given tag
    pub fn remove_tagged(&mut self, tag: SurfaceTag) -> usize {
        let before = self.auxiliary.len();
        self.auxiliary.retain(|s| s.tag() != tag);
        before - self.auxiliary.len()
    }
}

impl SurfaceSource for Scene {
    fn surfaces(&self) -> Vec<&IntersectableSurface> {
        self.scenario.iter().chain(self.auxiliary.iter()).collect()
    }
}
