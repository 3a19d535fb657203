//! Contour simplification (Douglas–Peucker).
//!
//! Reduces traced boundary chains to their significant vertices before curve
//! fitting. Closed chains are split at the vertex farthest from the first
//! point so both halves keep stable anchors.

use crate::basics::PointD;
use crate::math::{calc_sq_distance, calc_segment_point_sq_distance};

/// Simplify a closed contour with tolerance `epsilon` (maximum perpendicular
/// deviation). `epsilon <= 0` returns the input unchanged.
pub fn simplify_closed(points: &[PointD], epsilon: f64) -> Vec<PointD> {
    if epsilon <= 0.0 || points.len() < 3 {
        return points.to_vec();
    }

    // Split at the vertex farthest from the start so the closing edge is
    // anchored at two genuine extremes.
    let mut far_idx = points.len() / 2;
    let mut far_d = -1.0;
    for (i, p) in points.iter().enumerate().skip(1) {
        let d = calc_sq_distance(points[0].x, points[0].y, p.x, p.y);
        if d > far_d {
            far_d = d;
            far_idx = i;
        }
    }

    let eps_sq = epsilon * epsilon;
    let mut first_half = simplify_open(&points[..=far_idx], eps_sq);
    let mut second: Vec<PointD> = points[far_idx..].to_vec();
    second.push(points[0]);
    let second_half = simplify_open(&second, eps_sq);

    // Join, dropping the duplicated anchors.
    first_half.pop();
    first_half.extend_from_slice(&second_half[..second_half.len() - 1]);
    first_half
}

/// Iterative Douglas–Peucker over an open polyline. Endpoints are always
/// kept.
fn simplify_open(points: &[PointD], eps_sq: f64) -> Vec<PointD> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;

    let mut stack = vec![(0usize, n - 1)];
    while let Some((a, b)) = stack.pop() {
        if b <= a + 1 {
            continue;
        }
        let pa = points[a];
        let pb = points[b];
        let mut max_d = -1.0;
        let mut max_i = a;
        for (i, p) in points.iter().enumerate().take(b).skip(a + 1) {
            let d = calc_segment_point_sq_distance(pa.x, pa.y, pb.x, pb.y, p.x, p.y);
            if d > max_d {
                max_d = d;
                max_i = i;
            }
        }
        if max_d > eps_sq {
            keep[max_i] = true;
            stack.push((a, max_i));
            stack.push((max_i, b));
        }
    }

    points
        .iter()
        .zip(keep.iter())
        .filter_map(|(p, &k)| if k { Some(*p) } else { None })
        .collect()
}
