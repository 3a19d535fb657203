//! Glyph vectorization (pipeline stage C5).
//!
//! Turns a glyph cell's raster into smooth closed outlines: binarize the
//! tile, trace contours with hole hierarchy, simplify, detect corners, and
//! fit Bezier curves between them. Output coordinates are in font space
//! (Y up, origin at the tile's lower-left).

use log::debug;

use crate::basics::{deg2rad, PointD};
use crate::config::SmoothingLevel;
use crate::contour::find_contours_with_holes;
use crate::filters::{elliptical_element, gaussian_blur, morph_close, morph_open, otsu_level};
use crate::math::{calc_distance, vertex_angle};
use crate::path::{PathSegment, VectorGlyph, VectorPath};
use crate::raster::{BinaryImage, RasterImage};
use crate::simplify::simplify_closed;

// ============================================================================
// Smoothing parameters
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct SmoothingParams {
    epsilon_factor: f64,
    corner_threshold_deg: f64,
    blur_kernel: usize,
    morph_kernel: usize,
}

fn params_for(level: SmoothingLevel) -> SmoothingParams {
    match level {
        SmoothingLevel::None => SmoothingParams {
            epsilon_factor: 0.0,
            corner_threshold_deg: 180.0,
            blur_kernel: 0,
            morph_kernel: 0,
        },
        SmoothingLevel::Low => SmoothingParams {
            epsilon_factor: 0.0005,
            corner_threshold_deg: 160.0,
            blur_kernel: 3,
            morph_kernel: 0,
        },
        SmoothingLevel::Medium => SmoothingParams {
            epsilon_factor: 0.001,
            corner_threshold_deg: 145.0,
            blur_kernel: 5,
            morph_kernel: 3,
        },
        SmoothingLevel::High => SmoothingParams {
            epsilon_factor: 0.002,
            corner_threshold_deg: 130.0,
            blur_kernel: 7,
            morph_kernel: 5,
        },
        SmoothingLevel::Maximum => SmoothingParams {
            epsilon_factor: 0.004,
            corner_threshold_deg: 110.0,
            blur_kernel: 9,
            morph_kernel: 7,
        },
    }
}

// ============================================================================
// Vectorizer
// ============================================================================

pub struct Vectorizer {
    params: SmoothingParams,
    min_contour_area: f64,
    /// When false, emit straight polylines instead of fitted curves.
    pub use_curves: bool,
}

impl Vectorizer {
    pub fn new(smoothing: SmoothingLevel, min_contour_area: f64) -> Self {
        Self {
            params: params_for(smoothing),
            min_contour_area,
            use_curves: true,
        }
    }

    /// Vectorize one glyph tile. A blank tile yields a glyph with no paths.
    pub fn vectorize(&self, image: &RasterImage, label: char) -> VectorGlyph {
        let (w, h) = (image.width(), image.height());
        let binary = self.prepare_binary(image);

        let contours = find_contours_with_holes(&binary);
        debug!("'{label}': {} contours in {w}x{h} tile", contours.len());

        let mut glyph = VectorGlyph::empty(label, w as f64, h as f64);
        for contour in &contours {
            if contour.area < self.min_contour_area {
                continue;
            }
            let points: Vec<PointD> = contour.points.iter().map(|&p| p.into()).collect();

            // Simplify, keyed to the contour perimeter.
            let simplified = if self.params.epsilon_factor > 0.0 {
                let eps = self.params.epsilon_factor * crate::math::polygon_perimeter(&points);
                simplify_closed(&points, eps)
            } else {
                points
            };
            if simplified.len() < 3 {
                continue;
            }

            // Flip Y into font space.
            let flipped: Vec<PointD> = simplified
                .iter()
                .map(|p| PointD::new(p.x, h as f64 - p.y))
                .collect();

            let path = if self.use_curves {
                self.fit_path(&flipped, contour.is_hole)
            } else {
                polyline_path(&flipped, contour.is_hole)
            };
            if !path.is_empty() {
                glyph.paths.push(path);
            }
        }
        glyph
    }

    /// Tile binarization: alpha-masked grayscale, level-dependent blur, Otsu,
    /// then morphological close + open with an elliptical kernel.
    fn prepare_binary(&self, image: &RasterImage) -> BinaryImage {
        let (w, h) = (image.width(), image.height());
        let gray = image.luma_masked();
        let gray = gaussian_blur(&gray, w, h, self.params.blur_kernel);
        let level = otsu_level(&gray);

        let mut ink: Vec<bool> = gray.iter().map(|&p| p <= level).collect();
        if self.params.morph_kernel >= 3 {
            let element = elliptical_element(self.params.morph_kernel);
            ink = morph_close(&ink, w, h, &element);
            ink = morph_open(&ink, w, h, &element);
        }

        BinaryImage::new(
            w,
            h,
            ink.iter().map(|&i| if i { 0u8 } else { 255u8 }).collect(),
        )
    }

    // ---------------------------------------------------------------
    // Curve fitting
    // ---------------------------------------------------------------

    /// Split the contour at corners and fit each stretch with Bezier
    /// segments.
    fn fit_path(&self, points: &[PointD], is_hole: bool) -> VectorPath {
        let mut path = VectorPath::new(is_hole);
        if points.len() < 2 {
            return path;
        }
        path.segments.push(PathSegment::MoveTo(points[0]));

        let corners = self.detect_corners(points);
        let mut start = 0usize;
        for &corner in corners.iter().chain(std::iter::once(&(points.len() - 1))) {
            if corner > start {
                fit_segment(&points[start..=corner], &mut path.segments);
            }
            start = corner;
        }

        path.close_polygon();
        path
    }

    /// Indices of vertices whose interior angle is sharper than the corner
    /// threshold. Endpoints are never corners.
    fn detect_corners(&self, points: &[PointD]) -> Vec<usize> {
        if points.len() < 3 {
            return Vec::new();
        }
        let threshold = deg2rad(self.params.corner_threshold_deg);
        let mut corners = Vec::new();
        for i in 1..points.len() - 1 {
            let angle = vertex_angle(points[i - 1], points[i], points[i + 1]);
            if angle < threshold {
                corners.push(i);
            }
        }
        corners
    }
}

/// Straight polyline rendition of a contour.
fn polyline_path(points: &[PointD], is_hole: bool) -> VectorPath {
    let mut path = VectorPath::new(is_hole);
    if points.is_empty() {
        return path;
    }
    path.segments.push(PathSegment::MoveTo(points[0]));
    for &p in &points[1..] {
        path.segments.push(PathSegment::LineTo(p));
    }
    path.close_polygon();
    path
}

/// Fit one corner-free stretch:
/// two points emit a line, three a quadratic through the middle, longer
/// stretches cubics with central-difference tangents and control offsets of
/// one third of the chord.
fn fit_segment(points: &[PointD], out: &mut Vec<PathSegment>) {
    match points.len() {
        0 | 1 => {}
        2 => out.push(PathSegment::LineTo(points[1])),
        3 => out.push(PathSegment::Curve3(points[1], points[2])),
        _ => {
            let resampled;
            let points = if points.len() > 20 {
                resampled = resample_by_arc_length(points, ((points.len() + 2) / 3).max(8));
                &resampled[..]
            } else {
                points
            };

            let tangents = unit_tangents(points);
            let n = points.len();
            let mut i = 0usize;
            while i < n - 1 {
                let j = (i + 3).min(n - 1);
                let p0 = points[i];
                let p3 = points[j];
                let dist = calc_distance(p0.x, p0.y, p3.x, p3.y) / 3.0;
                let t0 = tangents[i];
                let t3 = tangents[j];
                out.push(PathSegment::Curve4(
                    PointD::new(p0.x + t0.x * dist, p0.y + t0.y * dist),
                    PointD::new(p3.x - t3.x * dist, p3.y - t3.y * dist),
                    p3,
                ));
                i += (n - i - 1).min(3).max(1);
            }
        }
    }
}

/// Unit tangent at each vertex: forward/backward differences at the ends,
/// central differences inside.
fn unit_tangents(points: &[PointD]) -> Vec<PointD> {
    let n = points.len();
    let mut tangents = Vec::with_capacity(n);
    for i in 0..n {
        let (dx, dy) = if i == 0 {
            (points[1].x - points[0].x, points[1].y - points[0].y)
        } else if i == n - 1 {
            (
                points[n - 1].x - points[n - 2].x,
                points[n - 1].y - points[n - 2].y,
            )
        } else {
            (
                points[i + 1].x - points[i - 1].x,
                points[i + 1].y - points[i - 1].y,
            )
        };
        let len = (dx * dx + dy * dy).sqrt();
        if len > 0.0 {
            tangents.push(PointD::new(dx / len, dy / len));
        } else {
            tangents.push(PointD::new(1.0, 0.0));
        }
    }
    tangents
}

/// Uniform arc-length resampling to `target` points, keeping both ends.
fn resample_by_arc_length(points: &[PointD], target: usize) -> Vec<PointD> {
    if points.len() <= target || target < 2 {
        return points.to_vec();
    }

    let mut arc = Vec::with_capacity(points.len());
    arc.push(0.0f64);
    for i in 1..points.len() {
        let d = calc_distance(points[i - 1].x, points[i - 1].y, points[i].x, points[i].y);
        arc.push(arc[i - 1] + d);
    }
    let last = points[points.len() - 1];
    let total = arc[arc.len() - 1];
    if total == 0.0 {
        return vec![points[0], last];
    }

    let mut resampled = Vec::with_capacity(target);
    resampled.push(points[0]);
    let step = total / (target - 1) as f64;
    for k in 1..target - 1 {
        let want = k as f64 * step;
        let mut j = 1;
        while j < arc.len() && arc[j] < want {
            j += 1;
        }
        let j = j.min(arc.len() - 1);
        let span = arc[j] - arc[j - 1];
        let t = if span > 0.0 { (want - arc[j - 1]) / span } else { 0.0 };
        resampled.push(PointD::new(
            points[j - 1].x + t * (points[j].x - points[j - 1].x),
            points[j - 1].y + t * (points[j].y - points[j - 1].y),
        ));
    }
    resampled.push(last);
    resampled
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Raster with ink ('#') on white ('.').
    fn tile(rows: &[&str]) -> RasterImage {
        let h = rows.len() as u32;
        let w = rows[0].len() as u32;
        let mut luma = vec![255u8; (w * h) as usize];
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                if c == '#' {
                    luma[y * w as usize + x] = 0;
                }
            }
        }
        RasterImage::from_luma(w, h, luma)
    }

    fn solid_tile(w: u32, h: u32, x0: u32, y0: u32, bw: u32, bh: u32) -> RasterImage {
        let mut luma = vec![255u8; (w * h) as usize];
        for y in y0..y0 + bh {
            for x in x0..x0 + bw {
                luma[(y * w + x) as usize] = 0;
            }
        }
        RasterImage::from_luma(w, h, luma)
    }

    #[test]
    fn test_blank_tile_yields_no_paths() {
        let img = RasterImage::from_luma(10, 10, vec![255; 100]);
        let v = Vectorizer::new(SmoothingLevel::None, 1.0);
        let glyph = v.vectorize(&img, 'x');
        assert!(glyph.paths.is_empty());
        assert_eq!(glyph.width, 10.0);
    }

    #[test]
    fn test_solid_block_produces_closed_path() {
        let img = solid_tile(30, 30, 5, 5, 20, 20);
        let v = Vectorizer::new(SmoothingLevel::None, 10.0);
        let glyph = v.vectorize(&img, 'n');
        assert_eq!(glyph.paths.len(), 1);
        assert!(glyph.paths[0].is_well_formed());
    }

    #[test]
    fn test_y_flip_puts_top_ink_at_high_y() {
        // Ink only in the top rows of the tile
        let img = solid_tile(20, 40, 2, 2, 16, 10);
        let v = Vectorizer::new(SmoothingLevel::None, 5.0);
        let glyph = v.vectorize(&img, 't');
        let b = glyph.bounds().unwrap();
        // In font space (Y up), the shape sits near the tile top: y in
        // roughly [28, 38] for a 40-tall tile.
        assert!(b.y1 > 20.0, "yMin {} not in upper half", b.y1);
        assert!(b.y2 <= 40.0);
    }

    #[test]
    fn test_ring_yields_outer_and_hole() {
        let img = tile(&[
            "............",
            ".##########.",
            ".##########.",
            ".##......##.",
            ".##......##.",
            ".##......##.",
            ".##......##.",
            ".##########.",
            ".##########.",
            "............",
        ]);
        let v = Vectorizer::new(SmoothingLevel::None, 4.0);
        let glyph = v.vectorize(&img, 'O');
        assert_eq!(glyph.paths.len(), 2);
        assert_eq!(glyph.paths.iter().filter(|p| p.is_hole).count(), 1);
        for p in &glyph.paths {
            assert!(p.is_well_formed());
        }
    }

    #[test]
    fn test_min_area_filters_specks() {
        let mut img = solid_tile(30, 30, 5, 5, 20, 20);
        // A 2x2 speck cannot pass a 10 px² floor
        let mut luma = img.luma().to_vec();
        luma[1] = 0;
        luma[2] = 0;
        luma[31] = 0;
        luma[32] = 0;
        img = RasterImage::from_luma(30, 30, luma);

        let v = Vectorizer::new(SmoothingLevel::None, 10.0);
        let glyph = v.vectorize(&img, 'a');
        assert_eq!(glyph.paths.len(), 1);
    }

    #[test]
    fn test_polyline_mode_emits_lines_only() {
        let img = solid_tile(30, 30, 5, 5, 20, 20);
        let mut v = Vectorizer::new(SmoothingLevel::None, 10.0);
        v.use_curves = false;
        let glyph = v.vectorize(&img, 'm');
        for seg in &glyph.paths[0].segments {
            assert!(!matches!(
                seg,
                PathSegment::Curve3(..) | PathSegment::Curve4(..)
            ));
        }
    }

    #[test]
    fn test_fit_segment_two_and_three_points() {
        let mut out = Vec::new();
        fit_segment(
            &[PointD::new(0.0, 0.0), PointD::new(5.0, 5.0)],
            &mut out,
        );
        assert_eq!(out, vec![PathSegment::LineTo(PointD::new(5.0, 5.0))]);

        out.clear();
        fit_segment(
            &[
                PointD::new(0.0, 0.0),
                PointD::new(2.0, 3.0),
                PointD::new(4.0, 0.0),
            ],
            &mut out,
        );
        assert_eq!(
            out,
            vec![PathSegment::Curve3(
                PointD::new(2.0, 3.0),
                PointD::new(4.0, 0.0)
            )]
        );
    }

    #[test]
    fn test_fit_segment_long_stretch_emits_cubics() {
        // Points on a shallow arc
        let pts: Vec<PointD> = (0..10)
            .map(|i| {
                let t = i as f64 / 9.0;
                PointD::new(t * 30.0, 10.0 * (t * std::f64::consts::PI).sin())
            })
            .collect();
        let mut out = Vec::new();
        fit_segment(&pts, &mut out);
        assert!(!out.is_empty());
        assert!(out.iter().all(|s| matches!(s, PathSegment::Curve4(..))));
        // The last segment ends exactly at the stretch's endpoint
        assert_eq!(out.last().unwrap().end_point().unwrap(), pts[9]);
    }

    #[test]
    fn test_resample_by_arc_length() {
        let pts: Vec<PointD> = (0..100).map(|i| PointD::new(i as f64, 0.0)).collect();
        let out = resample_by_arc_length(&pts, 8);
        assert_eq!(out.len(), 8);
        assert_eq!(out[0], pts[0]);
        assert_eq!(*out.last().unwrap(), pts[99]);
        // Even spacing along the straight run
        let gap = out[1].x - out[0].x;
        for pair in out.windows(2) {
            assert!((pair[1].x - pair[0].x - gap).abs() < 1e-6);
        }
    }

    #[test]
    fn test_corner_detection_on_right_angle() {
        let v = Vectorizer::new(SmoothingLevel::Medium, 1.0);
        let pts = vec![
            PointD::new(0.0, 0.0),
            PointD::new(10.0, 0.0),
            PointD::new(10.0, 10.0),
        ];
        // 90° < 145° threshold: the middle vertex is a corner
        assert_eq!(v.detect_corners(&pts), vec![1]);

        let straight = vec![
            PointD::new(0.0, 0.0),
            PointD::new(10.0, 0.1),
            PointD::new(20.0, 0.0),
        ];
        assert!(v.detect_corners(&straight).is_empty());
    }
}
