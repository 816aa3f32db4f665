use crate::{
    tables::CORNER_OFFSETS,
    types::{Point, Value, Vector},
};

/// Lower bound on a face normal's length before normalising.
///
/// Degenerate (collinear) triangles end up with a zero normal rather than NaN.
pub const MIN_NORMAL_LENGTH: Value = 1e-6;

/// Computes the marching cubes state bitmask for a voxel.
///
/// Each of the 8 corners maps to one bit. A bit is set when the corner's value
/// is **strictly below** the iso-level (i.e. "inside" the surface):
///
/// ```text
/// corner index:  7  6  5  4  3  2  1  0
/// state bits:   [_][_][_][_][_][_][_][_]
///                                      ^-- corner 0 inside?
/// ```
#[inline]
pub fn cube_index(corner_values: &[Value; 8], iso_level: Value) -> u8 {
    corner_values
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v < iso_level)
        .fold(0, |state, (i, _)| state | (1 << i))
}

/// Writes the 8 scaled corner positions of the voxel at grid index `(x, y, z)`.
///
/// Corners are bit-decoded from their index: bit0 → +x, bit1 → +y, bit2 → +z.
#[inline]
pub fn corner_positions(x: usize, y: usize, z: usize, scale: Value, out: &mut [Point; 8]) {
    for (corner, [dx, dy, dz]) in out.iter_mut().zip(CORNER_OFFSETS) {
        *corner = Point::new(
            (x + dx) as Value * scale,
            (y + dy) as Value * scale,
            (z + dz) as Value * scale,
        );
    }
}

/// Flat face normal of the triangle `a, b, c` (counter-clockwise front face).
///
/// Returns the zero vector for degenerate triangles.
#[inline]
pub fn face_normal(a: &Point, b: &Point, c: &Point) -> Vector {
    let cross = (b - a).cross(&(c - a));
    cross / cross.norm().max(MIN_NORMAL_LENGTH)
}

/// Maps grid index `i` of an `n`-sample axis into `[-0.5, 0.5)`.
#[inline]
pub fn normalized_coord(i: usize, n: usize) -> Value {
    let n = n as Value;
    (i as Value - 0.5 * n) / n
}

/// Normalised position of grid sample `(x, y, z)` in an `n³` field.
#[inline]
pub fn cell_position(x: usize, y: usize, z: usize, n: usize) -> Point {
    Point::new(
        normalized_coord(x, n),
        normalized_coord(y, n),
        normalized_coord(z, n),
    )
}
