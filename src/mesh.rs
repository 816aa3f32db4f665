use crate::{
    types::{Point, Value},
    utils::face_normal,
};

/// Floats per triangle in each output buffer: 3 vertices × 3 components.
pub const FLOATS_PER_TRIANGLE: usize = 9;

/// Bounding sphere and axis-aligned box of a mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingVolume {
    /// Centre of the bounding box, also the sphere centre.
    pub center: Point,
    /// Distance from `center` to the farthest vertex.
    pub radius: Value,
    pub min: Point,
    pub max: Point,
}

impl BoundingVolume {
    /// Fits a volume around `vertices`. Returns `None` when there are none.
    pub fn from_vertices(vertices: &[[Value; 3]]) -> Option<Self> {
        let first = Point::from(*vertices.first()?);
        let (min, max) = vertices.iter().fold((first, first), |(min, max), v| {
            let p = Point::from(*v);
            (min.inf(&p), max.sup(&p))
        });
        let center = nalgebra::center(&min, &max);
        let radius = vertices
            .iter()
            .map(|v| nalgebra::distance_squared(&center, &Point::from(*v)))
            .fold(0.0, Value::max)
            .sqrt();
        Some(Self {
            center,
            radius,
            min,
            max,
        })
    }
}

/// Triangle soup produced by the marching cubes extractor.
///
/// Positions and normals are flat float buffers: every 3 floats form a vertex and
/// every 3 consecutive vertices a triangle. Normals are flat-shaded, so the 3
/// normals of a triangle are identical. Both buffers always have the same length,
/// a multiple of [`FLOATS_PER_TRIANGLE`].
///
/// The buffers are reused across frames: [`clear`](TerrainMesh::clear) keeps their
/// capacity.
#[derive(Debug, Clone, Default)]
pub struct TerrainMesh {
    positions: Vec<Value>,
    normals: Vec<Value>,
    bounds: Option<BoundingVolume>,
}

impl TerrainMesh {
    /// Creates an empty mesh with no triangles and no bounds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every triangle and invalidates the bounds.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.bounds = None;
    }

    /// Appends one flat-shaded triangle.
    pub fn push_triangle(&mut self, a: &Point, b: &Point, c: &Point) {
        let n = face_normal(a, b, c);
        for p in [a, b, c] {
            self.positions.extend_from_slice(&[p.x, p.y, p.z]);
            self.normals.extend_from_slice(&[n.x, n.y, n.z]);
        }
    }

    /// Validates the triangles pushed since the last [`clear`](TerrainMesh::clear).
    ///
    /// An empty mesh, or one with any non-finite coordinate, is cleared entirely;
    /// otherwise the bounds are recomputed. Returns whether the mesh holds geometry.
    pub fn finalize(&mut self) -> bool {
        let finite = self
            .positions
            .iter()
            .chain(self.normals.iter())
            .all(|v| v.is_finite());
        if self.positions.is_empty() || !finite {
            if !finite {
                tracing::debug!(
                    "discarding mesh with non-finite vertex data ({} triangles)",
                    self.triangle_count()
                );
            }
            self.clear();
            return false;
        }
        self.bounds = BoundingVolume::from_vertices(self.vertices());
        true
    }

    /// Flat position buffer, `[x0, y0, z0, x1, ...]`.
    pub fn positions(&self) -> &[Value] {
        &self.positions
    }

    /// Flat normal buffer, parallel to [`positions`](TerrainMesh::positions).
    pub fn normals(&self) -> &[Value] {
        &self.normals
    }

    /// Positions grouped per vertex.
    pub fn vertices(&self) -> &[[Value; 3]] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Normals grouped per vertex.
    pub fn vertex_normals(&self) -> &[[Value; 3]] {
        bytemuck::cast_slice(&self.normals)
    }

    /// Bounds of the current geometry, `None` while the mesh is empty or invalid.
    pub fn bounds(&self) -> Option<&BoundingVolume> {
        self.bounds.as_ref()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / FLOATS_PER_TRIANGLE
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
