//! Vector path containers for glyph outlines.
//!
//! A [`VectorPath`] is one closed contour as a sequence of path segments
//! (move_to / line_to / curve3 / curve4 / close); a [`VectorGlyph`] owns all
//! contours of one character. After vectorization, coordinates are in font
//! space: origin bottom-left, Y up, baseline at y = 0 once normalized.

use crate::basics::{PointD, RectD};
use crate::trans_affine::TransAffine;

// ============================================================================
// PathSegment
// ============================================================================

/// One command of a glyph outline. `Curve3` is a quadratic Bezier
/// (control, endpoint), `Curve4` a cubic (two controls, endpoint).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    MoveTo(PointD),
    LineTo(PointD),
    Curve3(PointD, PointD),
    Curve4(PointD, PointD, PointD),
    Close,
}

impl PathSegment {
    /// Visit every coordinate this segment carries (controls included).
    pub fn for_each_point<F: FnMut(PointD)>(&self, mut f: F) {
        match *self {
            PathSegment::MoveTo(p) | PathSegment::LineTo(p) => f(p),
            PathSegment::Curve3(c, p) => {
                f(c);
                f(p);
            }
            PathSegment::Curve4(c1, c2, p) => {
                f(c1);
                f(c2);
                f(p);
            }
            PathSegment::Close => {}
        }
    }

    /// The on-curve endpoint, if the segment has one.
    pub fn end_point(&self) -> Option<PointD> {
        match *self {
            PathSegment::MoveTo(p) | PathSegment::LineTo(p) => Some(p),
            PathSegment::Curve3(_, p) | PathSegment::Curve4(_, _, p) => Some(p),
            PathSegment::Close => None,
        }
    }

    fn map_points(self, m: &TransAffine) -> Self {
        let t = |mut p: PointD| {
            m.transform(&mut p.x, &mut p.y);
            p
        };
        match self {
            PathSegment::MoveTo(p) => PathSegment::MoveTo(t(p)),
            PathSegment::LineTo(p) => PathSegment::LineTo(t(p)),
            PathSegment::Curve3(c, p) => PathSegment::Curve3(t(c), t(p)),
            PathSegment::Curve4(c1, c2, p) => PathSegment::Curve4(t(c1), t(c2), t(p)),
            PathSegment::Close => PathSegment::Close,
        }
    }
}

// ============================================================================
// VectorPath
// ============================================================================

/// A single closed contour. `is_hole` marks inner contours (the counter of
/// O, A, ...), which wind opposite to their outer contour.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorPath {
    pub segments: Vec<PathSegment>,
    pub is_hole: bool,
}

impl VectorPath {
    pub fn new(is_hole: bool) -> Self {
        Self {
            segments: Vec::new(),
            is_hole,
        }
    }

    // ---------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.segments.push(PathSegment::MoveTo(PointD::new(x, y)));
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.segments.push(PathSegment::LineTo(PointD::new(x, y)));
    }

    /// Quadratic Bezier to (x, y) with control (cx, cy).
    pub fn curve3(&mut self, cx: f64, cy: f64, x: f64, y: f64) {
        self.segments
            .push(PathSegment::Curve3(PointD::new(cx, cy), PointD::new(x, y)));
    }

    /// Cubic Bezier to (x, y) with controls (c1x, c1y) and (c2x, c2y).
    #[allow(clippy::too_many_arguments)]
    pub fn curve4(&mut self, c1x: f64, c1y: f64, c2x: f64, c2y: f64, x: f64, y: f64) {
        self.segments.push(PathSegment::Curve4(
            PointD::new(c1x, c1y),
            PointD::new(c2x, c2y),
            PointD::new(x, y),
        ));
    }

    pub fn close_polygon(&mut self) {
        self.segments.push(PathSegment::Close);
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Structural invariant: begins with move_to, terminates with close,
    /// no stray move_to in between, and every coordinate is finite.
    pub fn is_well_formed(&self) -> bool {
        if self.segments.len() < 2 {
            return false;
        }
        if !matches!(self.segments.first(), Some(PathSegment::MoveTo(_))) {
            return false;
        }
        if !matches!(self.segments.last(), Some(PathSegment::Close)) {
            return false;
        }
        let mut finite = true;
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 && matches!(seg, PathSegment::MoveTo(_)) {
                return false;
            }
            seg.for_each_point(|p| finite &= p.x.is_finite() && p.y.is_finite());
        }
        finite
    }

    /// Bounding box over every point, controls included.
    pub fn bounds(&self) -> Option<RectD> {
        let mut rect: Option<RectD> = None;
        for seg in &self.segments {
            seg.for_each_point(|p| {
                rect = Some(match rect {
                    None => RectD::new(p.x, p.y, p.x, p.y),
                    Some(r) => RectD::new(
                        r.x1.min(p.x),
                        r.y1.min(p.y),
                        r.x2.max(p.x),
                        r.y2.max(p.y),
                    ),
                });
            });
        }
        rect
    }

    /// Apply an affine transform to every point.
    pub fn transform(&mut self, m: &TransAffine) {
        for seg in &mut self.segments {
            *seg = seg.map_points(m);
        }
    }

    /// SVG path data ("d" attribute) with two-decimal coordinates.
    pub fn to_svg_d(&self) -> String {
        let mut d = String::new();
        for seg in &self.segments {
            if !d.is_empty() {
                d.push(' ');
            }
            match *seg {
                PathSegment::MoveTo(p) => d.push_str(&format!("M {:.2},{:.2}", p.x, p.y)),
                PathSegment::LineTo(p) => d.push_str(&format!("L {:.2},{:.2}", p.x, p.y)),
                PathSegment::Curve3(c, p) => {
                    d.push_str(&format!("Q {:.2},{:.2} {:.2},{:.2}", c.x, c.y, p.x, p.y))
                }
                PathSegment::Curve4(c1, c2, p) => d.push_str(&format!(
                    "C {:.2},{:.2} {:.2},{:.2} {:.2},{:.2}",
                    c1.x, c1.y, c2.x, c2.y, p.x, p.y
                )),
                PathSegment::Close => d.push('Z'),
            }
        }
        d
    }
}

// ============================================================================
// VectorGlyph
// ============================================================================

/// All contours of one character, plus its raster footprint and advance.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorGlyph {
    pub label: char,
    pub paths: Vec<VectorPath>,
    pub width: f64,
    pub height: f64,
    pub advance_width: f64,
}

impl VectorGlyph {
    /// A glyph with no outlines (blank cell).
    pub fn empty(label: char, width: f64, height: f64) -> Self {
        Self {
            label,
            paths: Vec::new(),
            width,
            height,
            advance_width: width,
        }
    }

    /// Combined bounding box of all paths; `None` when there are no points.
    pub fn bounds(&self) -> Option<RectD> {
        let mut rect: Option<RectD> = None;
        for path in &self.paths {
            if let Some(b) = path.bounds() {
                rect = Some(match rect {
                    None => b,
                    Some(r) => RectD::new(
                        r.x1.min(b.x1),
                        r.y1.min(b.y1),
                        r.x2.max(b.x2),
                        r.y2.max(b.y2),
                    ),
                });
            }
        }
        rect
    }

    /// Transform every path and scale the footprint fields by the matrix's
    /// uniform scale components.
    pub fn transform(&mut self, m: &TransAffine) {
        for path in &mut self.paths {
            path.transform(m);
        }
        self.width *= m.sx.abs();
        self.height *= m.sy.abs();
        self.advance_width *= m.sx.abs();
    }
}

// ============================================================================
// Tests
// ============================================================================
