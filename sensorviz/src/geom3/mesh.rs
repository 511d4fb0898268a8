//! This module contains the indexed triangle mesh used both for scene surfaces which get ray
//! cast and for the display-only meshes built from sensor fields of view.

use crate::errors::GeometryError;
use crate::{Iso3, Point3};
use parry3d_f64::bounding_volume::Aabb;
use parry3d_f64::query::{Ray, RayCast};
use parry3d_f64::shape::TriMesh;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

/// An indexed triangle mesh. Meshes with at least one face also carry a parry `TriMesh` so that
/// rays can be cast against them through its BVH. An empty mesh is valid but can't be hit.
#[derive(Clone)]
pub struct Mesh {
    vertices: Vec<Point3>,
    faces: Vec<[u32; 3]>,
    shape: Option<TriMesh>,
}

impl Debug for Mesh {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("vertices", &self.vertices.len())
            .field("faces", &self.faces.len())
            .finish()
    }
}

impl Mesh {
    /// Create a new mesh from vertices and triangle faces. Every face index must refer to an
    /// existing vertex and every vertex must be finite.
    ///
    /// # Arguments
    ///
    /// * `vertices`: the vertex positions
    /// * `faces`: triangles as counter-clockwise (outward facing) triples of vertex indices
    ///
    /// returns: Result<Mesh, GeometryError>
    pub fn try_new(vertices: Vec<Point3>, faces: Vec<[u32; 3]>) -> Result<Self, GeometryError> {
        if let Some(i) = vertices
            .iter()
            .position(|v| !v.coords.iter().all(|c| c.is_finite()))
        {
            return Err(GeometryError::NonFiniteVertex(i));
        }

        for (face, indices) in faces.iter().enumerate() {
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
                return Err(GeometryError::FaceIndexOutOfBounds {
                    face,
                    index,
                    count: vertices.len(),
                });
            }
        }

        let shape = if faces.is_empty() {
            None
        } else {
            let tri_mesh = TriMesh::new(vertices.clone(), faces.clone())
                .map_err(|e| GeometryError::TriMesh(format!("{:?}", e)))?;
            Some(tri_mesh)
        };

        Ok(Self {
            vertices,
            faces,
            shape,
        })
    }

    /// Create a mesh with no vertices and no faces
    pub fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            shape: None,
        }
    }

    pub fn vertices(&self) -> &[Point3] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    pub fn tri_mesh(&self) -> Option<&TriMesh> {
        self.shape.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Cast a ray expressed in the same coordinates as the mesh vertices, returning the time of
    /// impact of the first surface crossed. Rays starting inside a closed mesh report the exit
    /// surface rather than zero.
    pub fn cast_ray(&self, ray: &Ray, max_toi: f64) -> Option<f64> {
        self.shape
            .as_ref()
            .and_then(|s| s.cast_local_ray(ray, max_toi, false))
    }

    /// Returns a copy of this mesh with every vertex moved by the transform
    pub fn transformed(&self, iso: &Iso3) -> Result<Self, GeometryError> {
        let vertices = self.vertices.iter().map(|v| iso * v).collect();
        Self::try_new(vertices, self.faces.clone())
    }

    /// Combine this mesh with another one, producing a new mesh which contains both sets of
    /// faces. Vertices are not welded.
    pub fn merged(&self, other: &Mesh) -> Result<Self, GeometryError> {
        let offset = self.vertices.len() as u32;
        let mut vertices = self.vertices.clone();
        vertices.extend_from_slice(&other.vertices);
        let mut faces = self.faces.clone();
        faces.extend(
            other
                .faces
                .iter()
                .map(|f| [f[0] + offset, f[1] + offset, f[2] + offset]),
        );
        Self::try_new(vertices, faces)
    }

    /// The axis aligned bounding box of the vertices, or `None` for a mesh without vertices
    pub fn aabb(&self) -> Option<Aabb> {
        if self.vertices.is_empty() {
            None
        } else {
            Some(Aabb::from_points(&self.vertices))
        }
    }

    /// A bounding sphere centered on the bounding box center, with a radius reaching the
    /// furthest vertex. Not the minimal sphere, but cheap and stable.
    pub fn bounding_sphere(&self) -> (Point3, f64) {
        let Some(aabb) = self.aabb() else {
            return (Point3::origin(), 0.0);
        };

        let center = aabb.center();
        let radius = self
            .vertices
            .iter()
            .map(|v| (v - center).norm())
            .fold(0.0, f64::max);

        (center, radius)
    }

    fn edge_counts(&self) -> HashMap<(u32, u32), usize> {
        let mut counts = HashMap::new();
        for face in &self.faces {
            for k in 0..3 {
                let a = face[k];
                let b = face[(k + 1) % 3];
                let key = if a < b { (a, b) } else { (b, a) };
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Edges which belong to exactly one triangle. A closed mesh has none, and any boundary
    /// edge in a display volume shows up as a see-through gap.
    pub fn boundary_edges(&self) -> Vec<(u32, u32)> {
        let mut edges = self
            .edge_counts()
            .into_iter()
            .filter_map(|(e, c)| if c == 1 { Some(e) } else { None })
            .collect::<Vec<_>>();
        edges.sort_unstable();
        edges
    }

    /// Edges shared by more than two triangles
    pub fn non_manifold_edges(&self) -> Vec<(u32, u32)> {
        let mut edges = self
            .edge_counts()
            .into_iter()
            .filter_map(|(e, c)| if c > 2 { Some(e) } else { None })
            .collect::<Vec<_>>();
        edges.sort_unstable();
        edges
    }

    /// True if the mesh has faces and every edge is shared by exactly two triangles
    pub fn is_closed(&self) -> bool {
        !self.faces.is_empty() && self.edge_counts().values().all(|&c| c == 2)
    }

    /// True if no directed edge is used twice, meaning neighboring triangles agree on winding
    pub fn has_consistent_winding(&self) -> bool {
        let mut seen = HashMap::new();
        for face in &self.faces {
            for k in 0..3 {
                if seen.insert((face[k], face[(k + 1) % 3]), ()).is_some() {
                    return false;
                }
            }
        }
        true
    }

    /// The signed volume enclosed by the mesh, positive when faces wind outward. Only
    /// meaningful for closed meshes.
    pub fn signed_volume(&self) -> f64 {
        self.faces
            .iter()
            .map(|f| {
                let a = self.vertices[f[0] as usize].coords;
                let b = self.vertices[f[1] as usize].coords;
                let c = self.vertices[f[2] as usize].coords;
                a.dot(&b.cross(&c)) / 6.0
            })
            .sum()
    }

    /// Flat `f32` positions and `u32` indices, the layout renderers upload directly
    pub fn to_flat_buffers(&self) -> (Vec<f32>, Vec<u32>) {
        let positions = self
            .vertices
            .iter()
            .flat_map(|v| [v.x as f32, v.y as f32, v.z as f32])
            .collect();
        let indices = self.faces.iter().flatten().copied().collect();
        (positions, indices)
    }

    /// Load a mesh from an STL file, welding the duplicated vertices that STL stores per facet
    #[cfg(feature = "stl")]
    pub fn load_stl(path: &std::path::Path) -> crate::Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let stl = stl_io::read_stl(&mut file)?;
        let vertices = stl
            .vertices
            .iter()
            .map(|v| Point3::new(v[0] as f64, v[1] as f64, v[2] as f64))
            .collect();
        let faces = stl
            .faces
            .iter()
            .map(|f| {
                [
                    f.vertices[0] as u32,
                    f.vertices[1] as u32,
                    f.vertices[2] as u32,
                ]
            })
            .collect();
        Ok(Self::try_new(vertices, faces)?)
    }
}

/// Build an axis aligned box mesh between two corners, with outward facing triangles. Used for
/// test fixtures and simple procedural scenes.
pub fn box_mesh(min: Point3, max: Point3) -> Result<Mesh, GeometryError> {
    let vertices = vec![
        Point3::new(min.x, min.y, min.z),
        Point3::new(max.x, min.y, min.z),
        Point3::new(max.x, max.y, min.z),
        Point3::new(min.x, max.y, min.z),
        Point3::new(min.x, min.y, max.z),
        Point3::new(max.x, min.y, max.z),
        Point3::new(max.x, max.y, max.z),
        Point3::new(min.x, max.y, max.z),
    ];
    let faces = vec![
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [1, 2, 6],
        [1, 6, 5],
        [2, 3, 7],
        [2, 7, 6],
        [3, 0, 4],
        [3, 4, 7],
    ];
    Mesh::try_new(vertices, faces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vector3;
    use approx::assert_relative_eq;

    fn unit_box() -> Mesh {
        box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)).unwrap()
    }

    fn open_quad() -> Mesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        Mesh::try_new(vertices, vec![[0, 1, 2], [0, 2, 3]]).unwrap()
    }

    #[test]
    fn box_is_closed_and_outward() {
        let mesh = unit_box();
        assert!(mesh.is_closed());
        assert!(mesh.boundary_edges().is_empty());
        assert!(mesh.has_consistent_winding());
        assert_relative_eq!(mesh.signed_volume(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn quad_has_four_boundary_edges() {
        let mesh = open_quad();
        assert!(!mesh.is_closed());
        assert_eq!(mesh.boundary_edges(), vec![(0, 1), (0, 3), (1, 2), (2, 3)]);
    }

    #[test]
    fn rejects_bad_index() {
        let result = Mesh::try_new(vec![Point3::origin()], vec![[0, 1, 2]]);
        assert!(matches!(
            result,
            Err(GeometryError::FaceIndexOutOfBounds { index: 1, .. })
        ));
    }

    #[test]
    fn rejects_nan_vertex() {
        let result = Mesh::try_new(vec![Point3::new(0.0, f64::NAN, 0.0)], Vec::new());
        assert!(matches!(result, Err(GeometryError::NonFiniteVertex(0))));
    }

    #[test]
    fn empty_mesh_is_never_hit() {
        let mesh = Mesh::empty();
        let ray = Ray::new(Point3::origin(), Vector3::x());
        assert!(mesh.cast_ray(&ray, 100.0).is_none());
        assert_eq!(mesh.bounding_sphere().1, 0.0);
    }

    #[test]
    fn ray_hits_box_face() {
        let mesh = unit_box();
        let ray = Ray::new(Point3::new(-2.0, 0.5, 0.5), Vector3::x());
        let toi = mesh.cast_ray(&ray, 100.0).unwrap();
        assert_relative_eq!(toi, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn bounding_sphere_contains_vertices() {
        let mesh = unit_box();
        let (center, radius) = mesh.bounding_sphere();
        assert_relative_eq!(center, Point3::new(0.5, 0.5, 0.5), epsilon = 1e-12);
        assert_relative_eq!(radius, 0.75_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn merged_offsets_faces() {
        let a = unit_box();
        let shift = Iso3::translation(5.0, 0.0, 0.0);
        let b = a.transformed(&shift).unwrap();
        let both = a.merged(&b).unwrap();
        assert_eq!(both.vertices().len(), 16);
        assert_eq!(both.faces().len(), 24);
        assert!(both.is_closed());
        assert_relative_eq!(both.signed_volume(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn flat_buffers_match_counts() {
        let (positions, indices) = unit_box().to_flat_buffers();
        assert_eq!(positions.len(), 24);
        assert_eq!(indices.len(), 36);
    }
}
