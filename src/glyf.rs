//! TrueType outline construction: cubic→quadratic conversion, point-flag
//! encoding, and the `glyf` + `loca` pair.
//!
//! Quadratic conversion subdivides each cubic until the single-quad error
//! bound (√3/36 · ‖p₃ − 3p₂ + 3p₁ − p₀‖) fits the tolerance; a recursion
//! cap triggers the midpoint fallback, which the caller reports as a
//! quality warning.

use crate::basics::PointD;
use crate::path::{PathSegment, VectorPath};
use crate::sfnt::{to_i16, ByteWriter};

const ON_CURVE: u8 = 0x01;
const X_SHORT: u8 = 0x02;
const Y_SHORT: u8 = 0x04;
const X_SAME_OR_POSITIVE: u8 = 0x10;
const Y_SAME_OR_POSITIVE: u8 = 0x20;

const MAX_SPLIT_DEPTH: u32 = 8;

// ============================================================================
// Cubic → quadratic
// ============================================================================

/// Approximate a cubic Bezier with quadratics within `tolerance` (same
/// units as the coordinates). Returns `None` when the recursion cap is hit
/// before the bound is met; the caller falls back to a single midpoint
/// quadratic.
pub fn cubic_to_quadratics(
    p0: PointD,
    p1: PointD,
    p2: PointD,
    p3: PointD,
    tolerance: f64,
) -> Option<Vec<(PointD, PointD)>> {
    let mut out = Vec::new();
    if split_cubic(p0, p1, p2, p3, tolerance, 0, &mut out) {
        Some(out)
    } else {
        None
    }
}

fn single_quad_error(p0: PointD, p1: PointD, p2: PointD, p3: PointD) -> f64 {
    let dx = p3.x - 3.0 * p2.x + 3.0 * p1.x - p0.x;
    let dy = p3.y - 3.0 * p2.y + 3.0 * p1.y - p0.y;
    (3.0f64).sqrt() / 36.0 * (dx * dx + dy * dy).sqrt()
}

/// Control point of the quadratic that best matches the cubic's midpoint.
fn mid_control(p0: PointD, p1: PointD, p2: PointD, p3: PointD) -> PointD {
    PointD::new(
        (3.0 * (p1.x + p2.x) - p0.x - p3.x) / 4.0,
        (3.0 * (p1.y + p2.y) - p0.y - p3.y) / 4.0,
    )
}

fn split_cubic(
    p0: PointD,
    p1: PointD,
    p2: PointD,
    p3: PointD,
    tolerance: f64,
    depth: u32,
    out: &mut Vec<(PointD, PointD)>,
) -> bool {
    if single_quad_error(p0, p1, p2, p3) <= tolerance {
        out.push((mid_control(p0, p1, p2, p3), p3));
        return true;
    }
    if depth >= MAX_SPLIT_DEPTH {
        return false;
    }

    // de Casteljau split at t = 0.5
    let mid = |a: PointD, b: PointD| PointD::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
    let p01 = mid(p0, p1);
    let p12 = mid(p1, p2);
    let p23 = mid(p2, p3);
    let p012 = mid(p01, p12);
    let p123 = mid(p12, p23);
    let pm = mid(p012, p123);

    split_cubic(p0, p01, p012, pm, tolerance, depth + 1, out)
        && split_cubic(pm, p123, p23, p3, tolerance, depth + 1, out)
}

// ============================================================================
// Outline construction
// ============================================================================

/// Quadratic-only outline of one glyph, in integer font units.
#[derive(Debug, Default)]
pub struct GlyphOutline {
    /// Per contour: (x, y, on_curve).
    pub contours: Vec<Vec<(i16, i16, bool)>>,
    /// Cubics that needed the midpoint fallback.
    pub fallback_count: usize,
}

/// Convert fitted vector paths into a quadratic outline.
pub fn outline_from_paths(paths: &[VectorPath], tolerance: f64) -> GlyphOutline {
    let mut outline = GlyphOutline::default();

    for path in paths {
        let mut points: Vec<(i16, i16, bool)> = Vec::new();
        let mut current = PointD::new(0.0, 0.0);
        let push = |pts: &mut Vec<(i16, i16, bool)>, p: PointD, on: bool| {
            pts.push((to_i16(p.x), to_i16(p.y), on));
        };

        for seg in &path.segments {
            match *seg {
                PathSegment::MoveTo(p) => {
                    push(&mut points, p, true);
                    current = p;
                }
                PathSegment::LineTo(p) => {
                    push(&mut points, p, true);
                    current = p;
                }
                PathSegment::Curve3(c, p) => {
                    push(&mut points, c, false);
                    push(&mut points, p, true);
                    current = p;
                }
                PathSegment::Curve4(c1, c2, p) => {
                    match cubic_to_quadratics(current, c1, c2, p, tolerance) {
                        Some(quads) => {
                            for (q, e) in quads {
                                push(&mut points, q, false);
                                push(&mut points, e, true);
                            }
                        }
                        None => {
                            let q = PointD::new((c1.x + c2.x) / 2.0, (c1.y + c2.y) / 2.0);
                            push(&mut points, q, false);
                            push(&mut points, p, true);
                            outline.fallback_count += 1;
                        }
                    }
                    current = p;
                }
                PathSegment::Close => {}
            }
        }

        // TrueType contours close implicitly: drop an explicit return to
        // the start point.
        if points.len() > 1 && points.first().map(|&(x, y, _)| (x, y)) == points.last().map(|&(x, y, _)| (x, y)) {
            points.pop();
        }
        if points.len() >= 3 {
            outline.contours.push(points);
        }
    }
    outline
}

// ============================================================================
// Serialization
// ============================================================================

/// One serialized `glyf` entry.
#[derive(Debug, Clone)]
pub struct BuiltGlyph {
    pub data: Vec<u8>,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
    pub point_count: u16,
    pub contour_count: u16,
}

impl BuiltGlyph {
    /// Zero-outline glyph (space, blank cells).
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            x_min: 0,
            y_min: 0,
            x_max: 0,
            y_max: 0,
            point_count: 0,
            contour_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Serialize an outline as a simple glyph (flags with short/same deltas,
/// no instructions).
pub fn build_glyph(outline: &GlyphOutline) -> BuiltGlyph {
    if outline.contours.is_empty() {
        return BuiltGlyph::empty();
    }

    let all: Vec<(i16, i16, bool)> = outline.contours.iter().flatten().copied().collect();
    let x_min = all.iter().map(|p| p.0).min().unwrap_or(0);
    let x_max = all.iter().map(|p| p.0).max().unwrap_or(0);
    let y_min = all.iter().map(|p| p.1).min().unwrap_or(0);
    let y_max = all.iter().map(|p| p.1).max().unwrap_or(0);

    let mut w = ByteWriter::new();
    w.i16(outline.contours.len() as i16);
    w.i16(x_min);
    w.i16(y_min);
    w.i16(x_max);
    w.i16(y_max);

    let mut end = 0usize;
    for contour in &outline.contours {
        end += contour.len();
        w.u16(end as u16 - 1);
    }
    w.u16(0); // instructionLength

    // Flags and deltas
    let mut flags = Vec::with_capacity(all.len());
    let mut x_bytes = ByteWriter::new();
    let mut y_bytes = ByteWriter::new();
    let (mut px, mut py) = (0i16, 0i16);
    for &(x, y, on) in &all {
        let mut flag = if on { ON_CURVE } else { 0 };
        let dx = x as i32 - px as i32;
        let dy = y as i32 - py as i32;

        if dx == 0 {
            flag |= X_SAME_OR_POSITIVE;
        } else if (-255..=255).contains(&dx) {
            flag |= X_SHORT;
            if dx > 0 {
                flag |= X_SAME_OR_POSITIVE;
            }
            x_bytes.u8(dx.unsigned_abs() as u8);
        } else {
            x_bytes.i16(dx as i16);
        }

        if dy == 0 {
            flag |= Y_SAME_OR_POSITIVE;
        } else if (-255..=255).contains(&dy) {
            flag |= Y_SHORT;
            if dy > 0 {
                flag |= Y_SAME_OR_POSITIVE;
            }
            y_bytes.u8(dy.unsigned_abs() as u8);
        } else {
            y_bytes.i16(dy as i16);
        }

        flags.push(flag);
        px = x;
        py = y;
    }
    w.bytes(&flags);
    w.bytes(&x_bytes.into_inner());
    w.bytes(&y_bytes.into_inner());
    w.pad(4);

    BuiltGlyph {
        data: w.into_inner(),
        x_min,
        y_min,
        x_max,
        y_max,
        point_count: all.len() as u16,
        contour_count: outline.contours.len() as u16,
    }
}

/// Concatenate glyph entries into `glyf` and the matching long-format
/// `loca`.
pub fn assemble_glyf_loca(glyphs: &[BuiltGlyph]) -> (Vec<u8>, Vec<u8>) {
    let mut glyf = ByteWriter::new();
    let mut loca = ByteWriter::new();
    loca.u32(0);
    for g in glyphs {
        glyf.bytes(&g.data);
        loca.u32(glyf.len() as u32);
    }
    (glyf.into_inner(), loca.into_inner())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> PointD {
        PointD::new(x, y)
    }

    /// Evaluate the cubic at t.
    fn cubic_at(p0: PointD, p1: PointD, p2: PointD, p3: PointD, t: f64) -> PointD {
        let u = 1.0 - t;
        PointD::new(
            u * u * u * p0.x + 3.0 * u * u * t * p1.x + 3.0 * u * t * t * p2.x + t * t * t * p3.x,
            u * u * u * p0.y + 3.0 * u * u * t * p1.y + 3.0 * u * t * t * p2.y + t * t * t * p3.y,
        )
    }

    /// Evaluate a quadratic at t.
    fn quad_at(p0: PointD, c: PointD, p1: PointD, t: f64) -> PointD {
        let u = 1.0 - t;
        PointD::new(
            u * u * p0.x + 2.0 * u * t * c.x + t * t * p1.x,
            u * u * p0.y + 2.0 * u * t * c.y + t * t * p1.y,
        )
    }

    #[test]
    fn test_near_quadratic_cubic_needs_one_segment() {
        // A cubic that IS a degree-elevated quadratic converts exactly
        let q0 = p(0.0, 0.0);
        let qc = p(50.0, 100.0);
        let q1 = p(100.0, 0.0);
        let c1 = p(q0.x + 2.0 / 3.0 * (qc.x - q0.x), q0.y + 2.0 / 3.0 * (qc.y - q0.y));
        let c2 = p(q1.x + 2.0 / 3.0 * (qc.x - q1.x), q1.y + 2.0 / 3.0 * (qc.y - q1.y));
        let quads = cubic_to_quadratics(q0, c1, c2, q1, 1.0).unwrap();
        assert_eq!(quads.len(), 1);
        let (ctrl, end) = quads[0];
        assert!((ctrl.x - qc.x).abs() < 1e-9);
        assert!((ctrl.y - qc.y).abs() < 1e-9);
        assert_eq!(end, q1);
    }

    #[test]
    fn test_s_curve_splits_and_stays_close() {
        let (p0, p1, p2, p3) = (p(0.0, 0.0), p(0.0, 300.0), p(300.0, -300.0), p(300.0, 0.0));
        let quads = cubic_to_quadratics(p0, p1, p2, p3, 1.0).unwrap();
        assert!(quads.len() > 1);
        // The spline starts where the cubic starts and ends where it ends
        assert_eq!(quads.last().unwrap().1, p3);

        // Sample: every cubic point is within a few units of the spline
        let seg_len = 1.0 / quads.len() as f64;
        for i in 0..quads.len() {
            let start = if i == 0 { p0 } else { quads[i - 1].1 };
            let (c, e) = quads[i];
            for &t in &[0.25, 0.5, 0.75] {
                let on_quad = quad_at(start, c, e, t);
                let global_t = (i as f64 + t) * seg_len;
                let on_cubic = cubic_at(p0, p1, p2, p3, global_t);
                let d = ((on_quad.x - on_cubic.x).powi(2) + (on_quad.y - on_cubic.y).powi(2)).sqrt();
                // Parameterizations differ; allow slack while still
                // catching gross divergence
                assert!(d < 10.0, "divergence {d}");
            }
        }
    }

    fn square_path() -> VectorPath {
        let mut path = VectorPath::new(false);
        path.move_to(0.0, 0.0);
        path.line_to(100.0, 0.0);
        path.line_to(100.0, 100.0);
        path.line_to(0.0, 100.0);
        path.close_polygon();
        path
    }

    #[test]
    fn test_outline_square_all_on_curve() {
        let outline = outline_from_paths(&[square_path()], 1.0);
        assert_eq!(outline.contours.len(), 1);
        let pts = &outline.contours[0];
        assert_eq!(pts.len(), 4);
        assert!(pts.iter().all(|&(_, _, on)| on));
        assert_eq!(outline.fallback_count, 0);
    }

    #[test]
    fn test_outline_drops_explicit_closing_point() {
        let mut path = VectorPath::new(false);
        path.move_to(0.0, 0.0);
        path.line_to(50.0, 0.0);
        path.line_to(50.0, 50.0);
        path.line_to(0.0, 0.0); // returns to start
        path.close_polygon();
        let outline = outline_from_paths(&[path], 1.0);
        assert_eq!(outline.contours[0].len(), 3);
    }

    #[test]
    fn test_outline_quadratic_has_off_curve_point() {
        let mut path = VectorPath::new(false);
        path.move_to(0.0, 0.0);
        path.curve3(50.0, 80.0, 100.0, 0.0);
        path.line_to(0.0, 0.0);
        path.close_polygon();
        let outline = outline_from_paths(&[path], 1.0);
        let offs = outline.contours[0]
            .iter()
            .filter(|&&(_, _, on)| !on)
            .count();
        assert_eq!(offs, 1);
    }

    #[test]
    fn test_outline_cubic_emits_only_quadratic_points() {
        let mut path = VectorPath::new(false);
        path.move_to(0.0, 0.0);
        path.curve4(0.0, 300.0, 300.0, -300.0, 300.0, 0.0);
        path.line_to(0.0, 0.0);
        path.close_polygon();
        let outline = outline_from_paths(&[path], 1.0);
        // Off-curve points alternate with on-curve endpoints: every run of
        // consecutive off-curve points has length 1
        let pts = &outline.contours[0];
        for pair in pts.windows(2) {
            assert!(pair[0].2 || pair[1].2, "two adjacent off-curve points");
        }
        assert_eq!(outline.fallback_count, 0);
    }

    #[test]
    fn test_build_glyph_header_and_bbox() {
        let outline = outline_from_paths(&[square_path()], 1.0);
        let built = build_glyph(&outline);
        assert_eq!(built.contour_count, 1);
        assert_eq!(built.point_count, 4);
        assert_eq!(
            (built.x_min, built.y_min, built.x_max, built.y_max),
            (0, 0, 100, 100)
        );
        // numberOfContours
        assert_eq!(i16::from_be_bytes([built.data[0], built.data[1]]), 1);
        // endPts[0] = 3, instructionLength = 0
        assert_eq!(u16::from_be_bytes([built.data[10], built.data[11]]), 3);
        assert_eq!(u16::from_be_bytes([built.data[12], built.data[13]]), 0);
        assert_eq!(built.data.len() % 4, 0);
    }

    #[test]
    fn test_empty_glyph_and_loca() {
        let glyphs = vec![
            build_glyph(&outline_from_paths(&[square_path()], 1.0)),
            BuiltGlyph::empty(),
            build_glyph(&outline_from_paths(&[square_path()], 1.0)),
        ];
        let (glyf, loca) = assemble_glyf_loca(&glyphs);
        assert_eq!(loca.len(), 4 * 4);
        let off = |i: usize| {
            u32::from_be_bytes([loca[i * 4], loca[i * 4 + 1], loca[i * 4 + 2], loca[i * 4 + 3]])
        };
        assert_eq!(off(0), 0);
        // Empty glyph occupies no bytes: offsets 1 and 2 coincide
        assert_eq!(off(1), off(2));
        assert_eq!(off(3) as usize, glyf.len());
    }
}
