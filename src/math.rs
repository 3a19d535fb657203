//! Geometric math utilities.
//!
//! Distances, the segment-point projection kit used by contour
//! simplification, polygon measures (area, perimeter, convex hull) used by
//! the segmenter's shape filters, and small statistics helpers.

use crate::basics::PointD;

// ============================================================================
// Constants
// ============================================================================

/// Coinciding points maximal distance (epsilon).
pub const VERTEX_DIST_EPSILON: f64 = 1e-14;

// ============================================================================
// Cross product and distances
// ============================================================================

/// Cross product of vectors (x2-x1, y2-y1) and (x-x2, y-y2).
/// The sign indicates which side of the line (x1,y1)→(x2,y2) the point (x,y) is on.
#[inline]
pub fn cross_product(x1: f64, y1: f64, x2: f64, y2: f64, x: f64, y: f64) -> f64 {
    (x - x2) * (y2 - y1) - (y - y2) * (x2 - x1)
}

/// Euclidean distance between two points.
#[inline]
pub fn calc_distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let dx = x2 - x1;
    let dy = y2 - y1;
    (dx * dx + dy * dy).sqrt()
}

/// Squared Euclidean distance between two points.
#[inline]
pub fn calc_sq_distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let dx = x2 - x1;
    let dy = y2 - y1;
    dx * dx + dy * dy
}

/// Compute the parameter `u` for the projection of point (x, y) onto
/// the line segment (x1,y1)→(x2,y2). Returns 0 if the segment is degenerate.
#[inline]
pub fn calc_segment_point_u(x1: f64, y1: f64, x2: f64, y2: f64, x: f64, y: f64) -> f64 {
    let dx = x2 - x1;
    let dy = y2 - y1;

    if dx == 0.0 && dy == 0.0 {
        return 0.0;
    }

    let pdx = x - x1;
    let pdy = y - y1;

    (pdx * dx + pdy * dy) / (dx * dx + dy * dy)
}

/// Squared distance from point (x, y) to the closest point on segment
/// (x1,y1)→(x2,y2), given pre-computed parameter `u`.
#[inline]
pub fn calc_segment_point_sq_distance_with_u(
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    x: f64,
    y: f64,
    u: f64,
) -> f64 {
    if u <= 0.0 {
        calc_sq_distance(x, y, x1, y1)
    } else if u >= 1.0 {
        calc_sq_distance(x, y, x2, y2)
    } else {
        calc_sq_distance(x, y, x1 + u * (x2 - x1), y1 + u * (y2 - y1))
    }
}

/// Squared distance from point (x, y) to the closest point on segment
/// (x1,y1)→(x2,y2).
#[inline]
pub fn calc_segment_point_sq_distance(x1: f64, y1: f64, x2: f64, y2: f64, x: f64, y: f64) -> f64 {
    calc_segment_point_sq_distance_with_u(
        x1,
        y1,
        x2,
        y2,
        x,
        y,
        calc_segment_point_u(x1, y1, x2, y2, x, y),
    )
}

// ============================================================================
// Interior angle
// ============================================================================

/// Interior angle at `p1` formed by the segments p1→p0 and p1→p2, in radians.
/// Degenerate (zero-length) arms yield a flat angle.
pub fn vertex_angle(p0: PointD, p1: PointD, p2: PointD) -> f64 {
    let v1x = p0.x - p1.x;
    let v1y = p0.y - p1.y;
    let v2x = p2.x - p1.x;
    let v2y = p2.y - p1.y;

    let len1 = (v1x * v1x + v1y * v1y).sqrt();
    let len2 = (v2x * v2x + v2y * v2y).sqrt();
    if len1 < VERTEX_DIST_EPSILON || len2 < VERTEX_DIST_EPSILON {
        return crate::basics::PI;
    }

    let cos_a = ((v1x * v2x + v1y * v2y) / (len1 * len2)).clamp(-1.0, 1.0);
    cos_a.acos()
}

// ============================================================================
// Polygon measures
// ============================================================================

/// Absolute polygon area (shoelace formula). The polygon is implicitly closed.
pub fn polygon_area(points: &[PointD]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    let n = points.len();
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        sum += p.x * q.y - q.x * p.y;
    }
    sum.abs() / 2.0
}

/// Closed polygon perimeter (arc length including the closing segment).
pub fn polygon_perimeter(points: &[PointD]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let n = points.len();
    let mut sum = 0.0;
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        sum += calc_distance(p.x, p.y, q.x, q.y);
    }
    sum
}

/// Convex hull of a point set (Andrew's monotone chain), counter-clockwise,
/// without the repeated first point. Fewer than 3 input points are returned
/// as-is.
pub fn convex_hull(points: &[PointD]) -> Vec<PointD> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut pts = points.to_vec();
    pts.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });
    pts.dedup_by(|a, b| (a.x - b.x).abs() < VERTEX_DIST_EPSILON && (a.y - b.y).abs() < VERTEX_DIST_EPSILON);
    if pts.len() < 3 {
        return pts;
    }

    fn cross(o: PointD, a: PointD, b: PointD) -> f64 {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    }

    let mut lower: Vec<PointD> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<PointD> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

// ============================================================================
// Statistics helpers
// ============================================================================

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Upper median (element at index n/2 of the sorted values); 0.0 for an
/// empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted[sorted.len() / 2]
}

// ============================================================================
// Tests
// ============================================================================
