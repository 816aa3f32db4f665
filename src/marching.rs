use ndarray::ArrayView3;

use crate::{
    error::Result,
    interp::interpolate_edge,
    mesh::TerrainMesh,
    tables::{EDGE_CORNERS, edge_mask, triangles},
    types::{Point, Value},
    utils::{corner_positions, cube_index},
};

/// Marching cubes extractor.
///
/// Holds the per-cell scratch (8 corner positions, 8 corner values, 12 edge
/// crossings) so a full-grid pass performs no per-cell allocation.
#[derive(Debug, Clone)]
pub struct MarchingCubes {
    /// World-space size of each voxel edge.
    pub scale: Value,
    corner_positions: [Point; 8],
    corner_values: [Value; 8],
    edge_points: [Point; 12],
}

impl Default for MarchingCubes {
    fn default() -> Self {
        Self {
            scale: 1.,
            corner_positions: [Point::origin(); 8],
            corner_values: [0.; 8],
            edge_points: [Point::origin(); 12],
        }
    }
}

impl MarchingCubes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the world-space size of each voxel edge.
    pub fn with_scale(mut self, scale: Value) -> Self {
        self.scale = scale;
        self
    }

    /// Rebuilds `out` from the scalar field `field`, indexed `[z, y, x]`.
    ///
    /// The previous contents of `out` are discarded. Vertices are placed in grid
    /// units multiplied by [`scale`](MarchingCubes::scale).
    ///
    /// ```text
    /// Per voxel:
    /// 1. corner_positions / field[[z, y, x]] (×8)  →  8 points and values
    /// 2. cube_index                               →  8-bit inside mask
    /// 3. edge_mask                                →  12-bit crossed edges, 0 = skip
    /// 4. interpolate_edge                         →  up to 12 crossings
    /// 5. triangles                                →  flat-shaded triangles
    /// ```
    pub fn extract(&mut self, field: ArrayView3<'_, Value>, iso_level: Value, out: &mut TerrainMesh) {
        out.clear();
        let (size_z, size_y, size_x) = field.dim();

        for z in 0..size_z.saturating_sub(1) {
            for y in 0..size_y.saturating_sub(1) {
                for x in 0..size_x.saturating_sub(1) {
                    self.march_cell(&field, x, y, z, iso_level, out);
                }
            }
        }

        out.finalize();
    }

    /// Like [`extract`](MarchingCubes::extract), for a flat `size³` buffer laid out
    /// as `x + size * (y + size * z)`.
    pub fn extract_slice(
        &mut self,
        values: &[Value],
        size: usize,
        iso_level: Value,
        out: &mut TerrainMesh,
    ) -> Result<()> {
        let field = ArrayView3::from_shape((size, size, size), values)?;
        self.extract(field, iso_level, out);
        Ok(())
    }

    #[inline]
    fn march_cell(
        &mut self,
        field: &ArrayView3<'_, Value>,
        x: usize,
        y: usize,
        z: usize,
        iso_level: Value,
        out: &mut TerrainMesh,
    ) {
        corner_positions(x, y, z, self.scale, &mut self.corner_positions);
        for (i, value) in self.corner_values.iter_mut().enumerate() {
            *value = field[[z + ((i >> 2) & 1), y + ((i >> 1) & 1), x + (i & 1)]];
        }

        let state = cube_index(&self.corner_values, iso_level);
        let edges = edge_mask(state);
        if edges == 0 {
            return;
        }

        for (edge, &[a, b]) in EDGE_CORNERS.iter().enumerate() {
            if edges & (1 << edge) == 0 {
                continue;
            }
            self.edge_points[edge] = interpolate_edge(
                &self.corner_positions[a],
                &self.corner_positions[b],
                self.corner_values[a],
                self.corner_values[b],
                iso_level,
            );
        }

        for [e0, e1, e2] in triangles(state) {
            out.push_triangle(
                &self.edge_points[e0],
                &self.edge_points[e1],
                &self.edge_points[e2],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::*;

    #[test]
    fn single_corner_case_uses_its_three_edges() {
        let mut field = Array3::from_elem((2, 2, 2), -1.0);
        field[[0, 0, 0]] = 1.0;
        let mut mesh = TerrainMesh::new();
        MarchingCubes::new().extract(field.view(), 0.0, &mut mesh);

        assert_eq!(mesh.triangle_count(), 1);
        let mut vertices = mesh.vertices().to_vec();
        vertices.sort_by(|a, b| a.partial_cmp(b).expect("finite"));
        assert_eq!(
            vertices,
            vec![[0.0, 0.0, 0.5], [0.0, 0.5, 0.0], [0.5, 0.0, 0.0]]
        );
    }

    #[test]
    fn scale_stretches_vertices() {
        let mut field = Array3::from_elem((2, 2, 2), -1.0);
        field[[0, 0, 0]] = 1.0;
        let mut mesh = TerrainMesh::new();
        MarchingCubes::new()
            .with_scale(4.0)
            .extract(field.view(), 0.0, &mut mesh);
        let bounds = mesh.bounds().expect("bounds");
        assert_eq!(bounds.max, Point::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn previous_output_is_overwritten() {
        let mut field = Array3::from_elem((3, 3, 3), -1.0);
        field[[1, 1, 1]] = 1.0;
        let mut mesher = MarchingCubes::new();
        let mut mesh = TerrainMesh::new();
        mesher.extract(field.view(), 0.0, &mut mesh);
        let first = mesh.positions().to_vec();
        mesher.extract(field.view(), 0.0, &mut mesh);
        assert_eq!(mesh.positions(), first.as_slice());

        field.fill(1.0);
        mesher.extract(field.view(), 0.0, &mut mesh);
        assert!(mesh.is_empty());
        assert!(mesh.bounds().is_none());
    }

    #[test]
    fn slice_length_must_match_size() {
        let mut mesh = TerrainMesh::new();
        let result = MarchingCubes::new().extract_slice(&[0.0; 7], 2, 0.0, &mut mesh);
        assert!(result.is_err());
    }

    #[test]
    fn tiny_grids_produce_nothing() {
        let mut mesh = TerrainMesh::new();
        let field = Array3::from_elem((1, 1, 1), -1.0);
        MarchingCubes::new().extract(field.view(), 0.0, &mut mesh);
        assert!(mesh.is_empty());
    }
}
