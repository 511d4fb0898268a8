use crate::errors::GeometryError;
use crate::{Iso3, Point3};
use parry3d_f64::bounding_volume::Aabb;

/// Flat buffers in the layout a renderer uploads: `[x, y, z, x, y, z, ...]` positions and a
/// matching `[r, g, b, r, g, b, ...]` color array normalized to `0.0..=1.0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatPointBuffers {
    pub positions: Vec<f32>,
    pub colors: Vec<f32>,
}

impl FlatPointBuffers {
    pub fn len(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// A point cloud in which every point carries an RGB color. The cloud produced by a scan cycle
/// is never patched in place, it is replaced wholesale by the next cycle's cloud.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    points: Vec<Point3>,
    colors: Vec<[u8; 3]>,
}

impl PointCloud {
    /// Create a new point cloud from points and their colors.
    ///
    /// # Arguments
    ///
    /// * `points`: The points in the point cloud.
    /// * `colors`: One color per point, the number of colors must match the number of points.
    ///
    /// returns: Result<PointCloud, GeometryError>
    pub fn try_new(points: Vec<Point3>, colors: Vec<[u8; 3]>) -> Result<Self, GeometryError> {
        if colors.len() != points.len() {
            return Err(GeometryError::LengthMismatch {
                what: "colors",
                expected: points.len(),
                actual: colors.len(),
            });
        }

        Ok(Self { points, colors })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            colors: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, point: Point3, color: [u8; 3]) {
        self.points.push(point);
        self.colors.push(color);
    }

    /// Merges another point cloud into this one, modifying this point cloud in place and
    /// consuming the other.
    pub fn merge(&mut self, other: PointCloud) {
        self.points.extend(other.points);
        self.colors.extend(other.colors);
    }

    /// Copies the points and colors of another point cloud onto the end of this one
    pub fn append(&mut self, other: &PointCloud) {
        self.points.extend_from_slice(&other.points);
        self.colors.extend_from_slice(&other.colors);
    }

    /// Transform the point cloud by applying a transformation to all points. This modifies the
    /// point cloud in place.
    pub fn transform_by(&mut self, transform: &Iso3) {
        for p in &mut self.points {
            *p = transform * *p;
        }
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn colors(&self) -> &[[u8; 3]] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn aabb(&self) -> Option<Aabb> {
        if self.points.is_empty() {
            None
        } else {
            Some(Aabb::from_points(&self.points))
        }
    }

    pub fn to_flat_buffers(&self) -> FlatPointBuffers {
        let positions = self
            .points
            .iter()
            .flat_map(|p| [p.x as f32, p.y as f32, p.z as f32])
            .collect();
        let colors = self
            .colors
            .iter()
            .flat_map(|c| c.map(|v| v as f32 / 255.0))
            .collect();

        FlatPointBuffers { positions, colors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mismatched_colors_rejected() {
        let result = PointCloud::try_new(vec![Point3::origin()], Vec::new());
        assert!(matches!(
            result,
            Err(GeometryError::LengthMismatch {
                expected: 1,
                actual: 0,
                ..
            })
        ));
    }

    #[test]
    fn flat_buffers_are_parallel() {
        let mut cloud = PointCloud::empty();
        cloud.push(Point3::new(1.0, 2.0, 3.0), [255, 0, 0]);
        cloud.push(Point3::new(4.0, 5.0, 6.0), [0, 255, 51]);

        let flat = cloud.to_flat_buffers();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat.positions, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_relative_eq!(flat.colors[0], 1.0);
        assert_relative_eq!(flat.colors[4], 1.0);
        assert_relative_eq!(flat.colors[5], 0.2);
    }

    #[test]
    fn merge_and_transform() {
        let mut a = PointCloud::try_new(vec![Point3::origin()], vec![[1, 2, 3]]).unwrap();
        let b = PointCloud::try_new(vec![Point3::new(1.0, 0.0, 0.0)], vec![[4, 5, 6]]).unwrap();
        a.merge(b);
        a.transform_by(&Iso3::translation(0.0, 0.0, 2.0));

        assert_eq!(a.len(), 2);
        assert_eq!(a.colors(), &[[1, 2, 3], [4, 5, 6]]);
        assert_relative_eq!(a.points()[1], Point3::new(1.0, 0.0, 2.0));
    }

    #[test]
    fn append_copies_other() {
        let mut a = PointCloud::empty();
        let b = PointCloud::try_new(vec![Point3::new(0.0, 1.0, 0.0)], vec![[7, 7, 7]]).unwrap();
        a.append(&b);
        a.append(&b);
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn aabb_of_empty_is_none() {
        assert!(PointCloud::empty().aabb().is_none());
    }
}
