//! Font metric inference (pipeline stage C6).
//!
//! Scales raw glyph outlines into em units, places every glyph on the
//! baseline (descenders hang below it, aligned to the x-height line), and
//! derives cap height, x-height, ascender and descender from whichever
//! character classes the sheet actually contains.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::basics::RectD;
use crate::context::CancelToken;
use crate::error::Result;
use crate::kern::compute_kerning;
use crate::path::VectorGlyph;
use crate::trans_affine::TransAffine;

// ============================================================================
// Character classes
// ============================================================================

/// Uppercase with flat tops, the cap-height reference.
pub const UPPERCASE_FLAT: &str = "EFHILTZ";
/// Uppercase with round tops (slight overshoot).
pub const UPPERCASE_ROUND: &str = "CDGOQS";
/// Lowercase whose top defines the x-height.
pub const LOWERCASE_XHEIGHT: &str = "acemnorsuvwxz";
/// Lowercase with ascenders.
pub const LOWERCASE_ASCENDER: &str = "bdfhklt";
/// Lowercase with descenders.
pub const LOWERCASE_DESCENDER: &str = "gjpqy";

fn in_class(class: &str, c: char) -> bool {
    class.contains(c)
}

// ============================================================================
// FontMetrics
// ============================================================================

/// Calculated font metrics. All values share one em-unit scale.
#[derive(Debug, Clone)]
pub struct FontMetrics {
    pub units_per_em: u16,
    pub ascender: f64,
    /// Negative or zero.
    pub descender: f64,
    pub cap_height: f64,
    pub x_height: f64,
    pub line_gap: f64,
    pub advance_widths: BTreeMap<char, f64>,
    pub kerning: BTreeMap<(char, char), f64>,
    pub bboxes: BTreeMap<char, RectD>,
}

impl FontMetrics {
    pub fn new(units_per_em: u16) -> Self {
        let em = units_per_em as f64;
        Self {
            units_per_em,
            ascender: em * 0.8,
            descender: -em * 0.2,
            cap_height: em * 0.7,
            x_height: em * 0.5,
            line_gap: 0.0,
            advance_widths: BTreeMap::new(),
            kerning: BTreeMap::new(),
            bboxes: BTreeMap::new(),
        }
    }

    /// OS/2 usWinAscent (positive).
    pub fn win_ascent(&self) -> f64 {
        self.ascender.max(self.cap_height)
    }

    /// OS/2 usWinDescent (positive, measured below the baseline).
    pub fn win_descent(&self) -> f64 {
        self.descender.abs()
    }
}

// ============================================================================
// MetricsCalculator
// ============================================================================

pub struct MetricsCalculator {
    units_per_em: u16,
    /// Side bearing in em units (from percent of em).
    side_bearing: f64,
    /// Minimum |kern| worth recording, em units.
    kerning_threshold: f64,
}

impl MetricsCalculator {
    pub fn new(units_per_em: u16, side_bearing_pct: f64, kerning_threshold_pct: f64) -> Self {
        let em = units_per_em as f64;
        Self {
            units_per_em,
            side_bearing: side_bearing_pct * em / 100.0,
            kerning_threshold: kerning_threshold_pct * em / 100.0,
        }
    }

    /// Normalize the glyphs to the em square with the baseline at y = 0 and
    /// derive the vertical metrics, advances and kerning. Returns the
    /// metrics together with the normalized glyph list (same order).
    pub fn calculate(
        &self,
        glyphs: Vec<VectorGlyph>,
        cancel: &CancelToken,
    ) -> Result<(FontMetrics, Vec<VectorGlyph>)> {
        let mut metrics = FontMetrics::new(self.units_per_em);
        if glyphs.is_empty() {
            warn!("no glyphs for metrics calculation");
            return Ok((metrics, glyphs));
        }

        let normalized = self.normalize(glyphs);
        let bounds: BTreeMap<char, RectD> = normalized
            .iter()
            .filter_map(|g| g.bounds().map(|b| (g.label, b)))
            .collect();

        self.derive_vertical_metrics(&mut metrics, &bounds);

        for glyph in &normalized {
            let Some(b) = bounds.get(&glyph.label) else {
                continue;
            };
            metrics.bboxes.insert(glyph.label, *b);
            metrics
                .advance_widths
                .insert(glyph.label, b.width() + 2.0 * self.side_bearing);
        }

        metrics.kerning = compute_kerning(
            &normalized,
            self.units_per_em as f64,
            self.kerning_threshold,
            cancel,
        )?;

        info!(
            "metrics: cap {:.0}, x {:.0}, asc {:.0}, desc {:.0}, {} kern pairs",
            metrics.cap_height,
            metrics.x_height,
            metrics.ascender,
            metrics.descender,
            metrics.kerning.len()
        );
        Ok((metrics, normalized))
    }

    // ---------------------------------------------------------------
    // Normalization
    // ---------------------------------------------------------------

    /// Scale so the tallest uppercase spans 70% of the em, then shift each
    /// glyph vertically by class: baselines sit at y = 0, descender tops
    /// align with the x-height line. Offsets are computed in pixel space
    /// before the scale is applied.
    fn normalize(&self, glyphs: Vec<VectorGlyph>) -> Vec<VectorGlyph> {
        let bounds: BTreeMap<char, RectD> = glyphs
            .iter()
            .filter_map(|g| g.bounds().map(|b| (g.label, b)))
            .collect();

        let height_of = |c: char| bounds.get(&c).map(|b| b.height());

        // Reference cap height, in pixels.
        let mut cap_px: f64 = bounds
            .iter()
            .filter(|(c, _)| in_class(UPPERCASE_FLAT, **c) || in_class(UPPERCASE_ROUND, **c))
            .map(|(_, b)| b.height())
            .fold(0.0, f64::max);
        if cap_px == 0.0 {
            cap_px = bounds
                .iter()
                .filter(|(c, _)| c.is_ascii_uppercase())
                .map(|(_, b)| b.height())
                .fold(0.0, f64::max);
        }
        if cap_px == 0.0 {
            cap_px = bounds.values().map(|b| b.height()).fold(0.0, f64::max);
        }
        if cap_px == 0.0 {
            return glyphs; // nothing has an outline
        }

        let scale = self.units_per_em as f64 * 0.7 / cap_px;

        // Average x-height glyph bbox height, in pixels.
        let xh_samples: Vec<f64> = LOWERCASE_XHEIGHT
            .chars()
            .filter_map(height_of)
            .collect();
        let avg_xheight = if xh_samples.is_empty() {
            cap_px * 0.7
        } else {
            crate::math::mean(&xh_samples)
        };

        let mut normalized = Vec::with_capacity(glyphs.len());
        for mut glyph in glyphs {
            let Some(b) = glyph.bounds() else {
                normalized.push(glyph);
                continue;
            };

            let y_offset = if glyph.label == 'j' {
                // The dot rides above the x-height; estimate its height from
                // the other descenders and keep the hook aligned with them.
                let peer_heights: Vec<f64> =
                    "gpqy".chars().filter_map(height_of).collect();
                if peer_heights.is_empty() {
                    b.y2 - avg_xheight
                } else {
                    let dot = (b.height() - crate::math::mean(&peer_heights)).max(0.0);
                    b.y2 - avg_xheight - dot
                }
            } else if in_class(LOWERCASE_DESCENDER, glyph.label) {
                // Top aligned with the x-height line; the tail goes negative.
                b.y2 - avg_xheight
            } else {
                // Bottom sits on the baseline.
                b.y1
            };

            debug!(
                "normalize '{}': y_offset {y_offset:.1}px, scale {scale:.4}",
                glyph.label
            );
            let mut m = TransAffine::new_translation(0.0, -y_offset);
            m.scale(scale, scale);
            glyph.transform(&m);
            normalized.push(glyph);
        }
        normalized
    }

    // ---------------------------------------------------------------
    // Vertical metric derivation
    // ---------------------------------------------------------------

    fn derive_vertical_metrics(&self, metrics: &mut FontMetrics, bounds: &BTreeMap<char, RectD>) {
        let em = self.units_per_em as f64;
        let tops = |class: &str| -> Vec<f64> {
            class
                .chars()
                .filter_map(|c| bounds.get(&c).map(|b| b.y2))
                .collect()
        };

        let flat_tops = tops(UPPERCASE_FLAT);
        let round_tops = tops(UPPERCASE_ROUND);
        metrics.cap_height = if !flat_tops.is_empty() {
            crate::math::mean(&flat_tops)
        } else if !round_tops.is_empty() {
            crate::math::mean(&round_tops)
        } else {
            em * 0.7
        };

        let x_tops = tops(LOWERCASE_XHEIGHT);
        metrics.x_height = if x_tops.is_empty() {
            em * 0.5
        } else {
            crate::math::mean(&x_tops)
        };

        let asc_tops = tops(LOWERCASE_ASCENDER);
        metrics.ascender = if asc_tops.is_empty() {
            metrics.cap_height * 1.1
        } else {
            asc_tops
                .iter()
                .fold(metrics.cap_height, |acc, &t| acc.max(t))
        };

        let desc_bottoms: Vec<f64> = LOWERCASE_DESCENDER
            .chars()
            .filter_map(|c| bounds.get(&c).map(|b| b.y1))
            .collect();
        metrics.descender = if desc_bottoms.is_empty() {
            -em * 0.2
        } else {
            desc_bottoms.iter().copied().fold(f64::INFINITY, f64::min)
        };

        // descender <= 0 <= x_height <= cap_height <= ascender
        metrics.descender = metrics.descender.min(0.0);
        metrics.x_height = metrics.x_height.clamp(0.0, metrics.cap_height);
        metrics.ascender = metrics.ascender.max(metrics.cap_height);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::VectorPath;

    /// Rectangle glyph in raw (pixel, Y-up) coordinates.
    fn rect_glyph(label: char, x: f64, y: f64, w: f64, h: f64) -> VectorGlyph {
        let mut p = VectorPath::new(false);
        p.move_to(x, y);
        p.line_to(x + w, y);
        p.line_to(x + w, y + h);
        p.line_to(x, y + h);
        p.close_polygon();
        VectorGlyph {
            label,
            paths: vec![p],
            width: w,
            height: h,
            advance_width: w,
        }
    }

    fn calc() -> MetricsCalculator {
        MetricsCalculator::new(1000, 3.0, 0.15)
    }

    #[test]
    fn test_cap_scaling_and_baseline() {
        // 'E' is 100px tall: scale = 0.7 * 1000 / 100 = 7
        let glyphs = vec![rect_glyph('E', 0.0, 0.0, 60.0, 100.0)];
        let (metrics, normalized) = calc().calculate(glyphs, &CancelToken::new()).unwrap();
        let b = normalized[0].bounds().unwrap();
        assert!((b.y1 - 0.0).abs() < 1e-9);
        assert!((b.y2 - 700.0).abs() < 1e-9);
        assert!((metrics.cap_height - 700.0).abs() < 1e-9);
    }

    #[test]
    fn test_descender_alignment() {
        // E 100px; a 70px resting on baseline; g 100px with its top at the
        // x-height line and the rest hanging below.
        let glyphs = vec![
            rect_glyph('E', 0.0, 0.0, 60.0, 100.0),
            rect_glyph('a', 0.0, 0.0, 50.0, 70.0),
            rect_glyph('g', 0.0, 0.0, 50.0, 100.0),
        ];
        let (metrics, normalized) = calc().calculate(glyphs, &CancelToken::new()).unwrap();

        let a = normalized[1].bounds().unwrap();
        assert!((a.y1 - 0.0).abs() < 1e-9);
        assert!((metrics.x_height - 490.0).abs() < 1e-9); // 70 * 7

        // descender ≈ -0.30 * (g height * scale): (70 - 100) * 7 = -210
        let g = normalized[2].bounds().unwrap();
        assert!((g.y1 + 210.0).abs() < 1e-9);
        assert!((metrics.descender + 210.0).abs() < 1e-9);
        assert!(g.y1 < 0.0, "descender must drop below the baseline");
    }

    #[test]
    fn test_j_dot_rule() {
        // Descender peers are 100px tall; j is 120px, so 20px of dot ride
        // above the x-height line.
        let glyphs = vec![
            rect_glyph('E', 0.0, 0.0, 60.0, 100.0),
            rect_glyph('a', 0.0, 0.0, 50.0, 70.0),
            rect_glyph('g', 0.0, 0.0, 50.0, 100.0),
            rect_glyph('j', 0.0, 0.0, 20.0, 120.0),
        ];
        let (_, normalized) = calc().calculate(glyphs, &CancelToken::new()).unwrap();
        let j = normalized[3].bounds().unwrap();
        let g = normalized[2].bounds().unwrap();
        // Hook bottoms align
        assert!((j.y1 - g.y1).abs() < 1e-9);
        // Dot pokes 20px * 7 above g's top
        assert!((j.y2 - (g.y2 + 140.0)).abs() < 1e-9);
    }

    #[test]
    fn test_fallbacks_with_single_unclassified_glyph() {
        let glyphs = vec![rect_glyph('#', 0.0, 0.0, 40.0, 80.0)];
        let (metrics, _) = calc().calculate(glyphs, &CancelToken::new()).unwrap();
        assert!((metrics.cap_height - 700.0).abs() < 1e-9);
        assert!((metrics.x_height - 500.0).abs() < 1e-9);
        assert!((metrics.descender + 200.0).abs() < 1e-9);
        assert!((metrics.ascender - 770.0).abs() < 1e-9); // 1.1 * cap
    }

    #[test]
    fn test_metric_ordering_invariant() {
        let glyphs = vec![
            rect_glyph('E', 0.0, 0.0, 60.0, 100.0),
            rect_glyph('a', 0.0, 0.0, 50.0, 70.0),
            rect_glyph('b', 0.0, 0.0, 50.0, 110.0),
            rect_glyph('g', 0.0, 0.0, 50.0, 100.0),
        ];
        let (m, _) = calc().calculate(glyphs, &CancelToken::new()).unwrap();
        assert!(m.descender <= 0.0);
        assert!(0.0 <= m.x_height);
        assert!(m.x_height <= m.cap_height);
        assert!(m.cap_height <= m.ascender);
        // 'b' is 110px: ascender = 110 * 7 = 770 > cap 700
        assert!((m.ascender - 770.0).abs() < 1e-9);
    }

    #[test]
    fn test_advance_widths_include_side_bearings() {
        let glyphs = vec![rect_glyph('E', 0.0, 0.0, 60.0, 100.0)];
        let (m, _) = calc().calculate(glyphs, &CancelToken::new()).unwrap();
        // 60px * 7 + 2 * 30 (3% of em)
        assert!((m.advance_widths[&'E'] - 480.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input_yields_defaults() {
        let (m, g) = calc().calculate(Vec::new(), &CancelToken::new()).unwrap();
        assert!(g.is_empty());
        assert!((m.cap_height - 700.0).abs() < 1e-9);
        assert!(m.advance_widths.is_empty());
    }

    #[test]
    fn test_cancellation_propagates() {
        let token = CancelToken::new();
        token.cancel();
        let glyphs = vec![
            rect_glyph('A', 0.0, 0.0, 60.0, 100.0),
            rect_glyph('V', 0.0, 0.0, 60.0, 100.0),
        ];
        assert!(calc().calculate(glyphs, &token).is_err());
    }

    #[test]
    fn test_win_metrics() {
        let mut m = FontMetrics::new(1000);
        m.ascender = 750.0;
        m.cap_height = 700.0;
        m.descender = -180.0;
        assert!((m.win_ascent() - 750.0).abs() < 1e-9);
        assert!((m.win_descent() - 180.0).abs() < 1e-9);
    }
}
