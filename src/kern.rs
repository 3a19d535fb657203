//! Kerning pair derivation.
//!
//! For a fixed table of candidate pairs, classifies the facing edges of
//! both glyphs by sampling outline points near that side, then applies
//! shape-class multipliers and per-character overrides to a base kern of
//! −5% of the em.

use std::collections::BTreeMap;

use log::debug;

use crate::context::CancelToken;
use crate::error::Result;
use crate::path::VectorGlyph;

/// Candidate pairs worth inspecting: capital+lowercase, capital+capital,
/// f-ligature shapes, and terminal punctuation.
pub const KERNING_PAIRS: &[(char, char)] = &[
    // Capital + lowercase
    ('A', 'v'),
    ('A', 'w'),
    ('A', 'y'),
    ('F', 'a'),
    ('F', 'e'),
    ('F', 'o'),
    ('L', 'T'),
    ('L', 'V'),
    ('L', 'W'),
    ('L', 'Y'),
    ('P', 'a'),
    ('P', 'e'),
    ('P', 'o'),
    ('T', 'a'),
    ('T', 'e'),
    ('T', 'o'),
    ('T', 'r'),
    ('T', 'y'),
    ('V', 'a'),
    ('V', 'e'),
    ('V', 'o'),
    ('W', 'a'),
    ('W', 'e'),
    ('W', 'o'),
    ('Y', 'a'),
    ('Y', 'e'),
    ('Y', 'o'),
    // Capital + capital
    ('A', 'T'),
    ('A', 'V'),
    ('A', 'W'),
    ('A', 'Y'),
    ('L', 'A'),
    // Lowercase pairs
    ('f', 'f'),
    ('f', 'i'),
    ('f', 'l'),
    ('r', 'a'),
    ('r', 'e'),
    ('r', 'o'),
    ('v', 'a'),
    ('v', 'e'),
    ('v', 'o'),
    ('w', 'a'),
    ('w', 'e'),
    ('w', 'o'),
    ('y', 'a'),
    ('y', 'e'),
    ('y', 'o'),
    // Punctuation
    ('.', '\''),
    (',', '\''),
    ('A', '\''),
    ('T', '\''),
];

// ============================================================================
// Edge classification
// ============================================================================

/// Shape class of a glyph's left or right edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeClass {
    /// Vertical edge (H, I).
    Straight,
    /// Curved edge (O, C).
    Round,
    /// Angled edge (A, V, W).
    Diagonal,
    /// Concave shapes carrying lots of air (L's right side, T's underside);
    /// assigned from a per-character table, not geometry.
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Known concave sides. The geometry classifier cannot tell "open" apart
/// from straight, so these characters override it.
const OPEN_RIGHT: &[char] = &['L', 'E', 'F', 'T'];
const OPEN_LEFT: &[char] = &['T'];

/// Classify one edge by the x-spread of outline points within 20% of the
/// bbox width from that side.
fn classify_edge(glyph: &VectorGlyph, side: Side) -> EdgeClass {
    match side {
        Side::Right if OPEN_RIGHT.contains(&glyph.label) => return EdgeClass::Open,
        Side::Left if OPEN_LEFT.contains(&glyph.label) => return EdgeClass::Open,
        _ => {}
    }

    let Some(bbox) = glyph.bounds() else {
        return EdgeClass::Straight;
    };
    let width = bbox.width();
    if width <= 0.0 {
        return EdgeClass::Straight;
    }
    let band = width * 0.2;

    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut any = false;
    for path in &glyph.paths {
        if path.is_hole {
            continue;
        }
        for seg in &path.segments {
            seg.for_each_point(|p| {
                let in_band = match side {
                    Side::Right => p.x > bbox.x2 - band,
                    Side::Left => p.x < bbox.x1 + band,
                };
                if in_band {
                    any = true;
                    min_x = min_x.min(p.x);
                    max_x = max_x.max(p.x);
                }
            });
        }
    }
    if !any {
        return EdgeClass::Straight;
    }

    let variation = (max_x - min_x) / width;
    if variation < 0.1 {
        EdgeClass::Straight
    } else if variation < 0.3 {
        EdgeClass::Round
    } else {
        EdgeClass::Diagonal
    }
}

// ============================================================================
// Kern value
// ============================================================================

/// Kern for a pair, in em units (negative tightens).
pub fn kern_value(left: &VectorGlyph, right: &VectorGlyph, units_per_em: f64) -> f64 {
    let base = -units_per_em * 0.05;
    let left_edge = classify_edge(left, Side::Right);
    let right_edge = classify_edge(right, Side::Left);

    let mut kern = match (left_edge, right_edge) {
        (EdgeClass::Diagonal, EdgeClass::Diagonal) => base * 2.0,
        (EdgeClass::Diagonal, _) | (_, EdgeClass::Diagonal) => base,
        (EdgeClass::Open, _) | (_, EdgeClass::Open) => base * 0.5,
        _ => 0.0,
    };

    // Pair-specific overrides beat the shape classes.
    if "FPTY".contains(left.label) && "aeo".contains(right.label) {
        kern = base * 2.5;
    }
    if left.label == 'L' && "TVWY".contains(right.label) {
        kern = base * 3.0;
    }
    if left.label == 'A' && "VWY".contains(right.label) {
        kern = base * 2.5;
    }
    kern
}

/// Build the kern table over [`KERNING_PAIRS`] for the glyphs present,
/// suppressing pairs below `threshold` (em units). Checks for cancellation
/// between pairs.
pub fn compute_kerning(
    glyphs: &[VectorGlyph],
    units_per_em: f64,
    threshold: f64,
    cancel: &CancelToken,
) -> Result<BTreeMap<(char, char), f64>> {
    let by_label: BTreeMap<char, &VectorGlyph> =
        glyphs.iter().map(|g| (g.label, g)).collect();

    let mut kerning = BTreeMap::new();
    for &(l, r) in KERNING_PAIRS {
        cancel.check()?;
        let (Some(left), Some(right)) = (by_label.get(&l), by_label.get(&r)) else {
            continue;
        };
        let kern = kern_value(left, right, units_per_em);
        if kern.abs() >= threshold {
            debug!("kern '{l}''{r}' = {kern:.0}");
            kerning.insert((l, r), kern);
        }
    }
    Ok(kerning)
}

// ============================================================================
// Tests
// ============================================================================
