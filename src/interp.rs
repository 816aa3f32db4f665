use crate::types::{Point, Value};

/// Values closer than this are treated as equal when placing an edge vertex.
pub const ISO_EPSILON: Value = 1e-6;

// Return the interpolation factor t corresponding to iso_val
pub fn find_t(v0: Value, v1: Value, iso_val: Value) -> Value {
    (iso_val - v0) / (v1 - v0)
}

// Linear interpolation
pub fn lerp(a: Value, b: Value, t: Value) -> Value {
    a + (b - a) * t
}

/// Places the iso-surface crossing on the edge `p0 → p1`.
///
/// Endpoints sitting on the iso-value are returned as-is, and a near-flat edge
/// (`v0 ≈ v1`) returns `p0`, so the result is always finite for finite inputs.
pub fn interpolate_edge(p0: &Point, p1: &Point, v0: Value, v1: Value, iso_val: Value) -> Point {
    if (iso_val - v0).abs() < ISO_EPSILON {
        return *p0;
    }
    if (iso_val - v1).abs() < ISO_EPSILON {
        return *p1;
    }
    if (v0 - v1).abs() < ISO_EPSILON {
        return *p0;
    }
    let t = find_t(v0, v1, iso_val);
    Point::new(lerp(p0.x, p1.x, t), lerp(p0.y, p1.y, t), lerp(p0.z, p1.z, t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_at_midpoint() {
        let p = interpolate_edge(
            &Point::new(0.0, 0.0, 0.0),
            &Point::new(1.0, 0.0, 0.0),
            -1.0,
            1.0,
            0.0,
        );
        assert!((p.x - 0.5).abs() < 1e-6);
        assert_eq!(p.y, 0.0);
    }

    #[test]
    fn crossing_weighted_by_distance_to_iso() {
        let p = interpolate_edge(
            &Point::new(0.0, 0.0, 0.0),
            &Point::new(0.0, 4.0, 0.0),
            -3.0,
            1.0,
            0.0,
        );
        assert!((p.y - 3.0).abs() < 1e-5);
    }

    #[test]
    fn endpoint_on_iso_is_returned_directly() {
        let p0 = Point::new(0.0, 0.0, 0.0);
        let p1 = Point::new(0.0, 0.0, 1.0);
        assert_eq!(interpolate_edge(&p0, &p1, 0.0, 5.0, 0.0), p0);
        assert_eq!(interpolate_edge(&p0, &p1, 5.0, 0.0, 0.0), p1);
    }

    #[test]
    fn equal_values_pick_first_corner() {
        let p0 = Point::new(2.0, 3.0, 4.0);
        let p1 = Point::new(3.0, 3.0, 4.0);
        let p = interpolate_edge(&p0, &p1, 0.25, 0.25, 0.0);
        assert_eq!(p, p0);
        assert!(p.coords.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn lerp_and_find_t_are_inverse() {
        let t = find_t(2.0, 6.0, 3.0);
        assert_eq!(t, 0.25);
        assert_eq!(lerp(2.0, 6.0, t), 3.0);
    }
}
