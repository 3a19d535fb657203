//! Glyph labeling (pipeline stage C4).
//!
//! Default strategy assigns the i-th cell the i-th character of the
//! alphabet; an external oracle can override per-glyph with position hints
//! derived from the row geometry. Missing characters with a registered
//! mirror source are synthesized by flipping the source raster.

use log::{debug, info, warn};

use crate::error::Warning;
use crate::config::{DIGITS, LOWERCASE, UPPERCASE};
use crate::oracle::{GlyphOracle, IdentifyRequest, PositionHint};
use crate::row_detector::TextRow;
use crate::segmentation::GlyphCell;

// ============================================================================
// Character-set cardinality heuristic
// ============================================================================

/// Choose the most likely alphabet for `n` detected cells.
pub fn detect_character_set(n: usize) -> (String, &'static str) {
    if n <= 10 {
        (DIGITS.into(), "Digits (0-9)")
    } else if n <= 26 {
        (UPPERCASE.into(), "Uppercase (A-Z)")
    } else if n <= 36 {
        (format!("{UPPERCASE}{DIGITS}"), "Uppercase + Digits")
    } else if n <= 52 {
        (format!("{UPPERCASE}{LOWERCASE}"), "Uppercase + Lowercase")
    } else if n <= 62 {
        (
            format!("{UPPERCASE}{LOWERCASE}{DIGITS}"),
            "Full (A-Z, a-z, 0-9)",
        )
    } else {
        (crate::config::full_alphabet(), "Full Alphabet + Punctuation")
    }
}

// ============================================================================
// Sequential labeling
// ============================================================================

/// Assign alphabet characters in reading order; extra cells get `'?'`.
/// Returns the count-mismatch warning when cells and alphabet disagree.
pub fn label_sequential(cells: &mut [GlyphCell], alphabet: &str) -> Vec<Warning> {
    let chars: Vec<char> = alphabet.chars().collect();
    for (idx, cell) in cells.iter_mut().enumerate() {
        cell.label = chars.get(idx).copied().unwrap_or('?');
    }
    count_mismatch(cells, &chars)
}

fn count_mismatch(cells: &[GlyphCell], chars: &[char]) -> Vec<Warning> {
    if cells.len() == chars.len() {
        return Vec::new();
    }
    let found: std::collections::BTreeSet<char> = cells.iter().map(|c| c.label).collect();
    let missing: Vec<char> = chars.iter().copied().filter(|c| !found.contains(c)).collect();
    warn!(
        "glyph count mismatch: {} cells for {} expected characters",
        cells.len(),
        chars.len()
    );
    vec![Warning::GlyphCountMismatch {
        found: cells.len(),
        expected: chars.len(),
        missing,
    }]
}

// ============================================================================
// Oracle labeling
// ============================================================================

/// Label through the oracle, falling back to sequential characters for
/// failed or low-confidence answers. A transport failure on the first call
/// degrades the whole batch to sequential labeling.
pub fn label_with_oracle(
    cells: &mut [GlyphCell],
    alphabet: &str,
    oracle: &dyn GlyphOracle,
    rows: &[TextRow],
) -> Vec<Warning> {
    let chars: Vec<char> = alphabet.chars().collect();
    let mut warnings = Vec::new();
    let mut transport_down = false;

    for (idx, cell) in cells.iter_mut().enumerate() {
        let fallback = chars.get(idx).copied().unwrap_or('?');
        if transport_down {
            cell.label = fallback;
            continue;
        }

        let hint = rows.get(cell.row).map(|row| position_hint(cell, row));
        let req = IdentifyRequest {
            image: &cell.image,
            hint,
        };
        match oracle.identify(&req) {
            Ok(resp) => match resp.ch {
                Some(ch) if resp.confidence >= 0.5 => {
                    debug!("oracle: cell {idx} -> '{ch}' ({:.0}%)", resp.confidence * 100.0);
                    cell.label = ch;
                    cell.confidence = resp.confidence;
                }
                _ => {
                    debug!("oracle unsure on cell {idx}; sequential fallback");
                    cell.label = fallback;
                }
            },
            Err(e) => {
                warn!("oracle transport failed: {e}");
                warnings.push(Warning::OracleUnavailable(e.to_string()));
                transport_down = true;
                cell.label = fallback;
            }
        }
    }

    warnings.extend(count_mismatch(cells, &chars));
    warnings
}

/// Where the glyph sits relative to its row: small marks high in the row
/// hint at dots and quotes, boxes reaching well under the baseline hint at
/// descenders.
pub fn position_hint(cell: &GlyphCell, row: &TextRow) -> PositionHint {
    let baseline = row.baseline as f64;
    let row_h = row.height as f64;
    let bottom = cell.bbox.y2 as f64;

    if bottom > baseline + row_h * 0.1 {
        PositionHint::HasDescender
    } else if (cell.bbox.height() as f64) < row_h * 0.5 && bottom < baseline - row_h * 0.2 {
        PositionHint::AtTop
    } else {
        PositionHint::OnBaseline
    }
}

// ============================================================================
// Mirror derivation
// ============================================================================

/// Characters derivable by horizontally flipping another glyph.
pub const MIRROR_SOURCES: &[(char, char)] = &[
    ('\\', '/'),
    ('/', '\\'),
    ('(', ')'),
    (')', '('),
    ('[', ']'),
    (']', '['),
    ('{', '}'),
    ('}', '{'),
    ('<', '>'),
    ('>', '<'),
];

/// Synthesize missing alphabet characters from their registered mirror
/// sources. Derived cells carry confidence 1.0 and sit next to their source
/// in reading order.
pub fn derive_mirrors(cells: &mut Vec<GlyphCell>, alphabet: &str) {
    let present: std::collections::BTreeSet<char> = cells.iter().map(|c| c.label).collect();

    let mut derived = Vec::new();
    for ch in alphabet.chars() {
        if present.contains(&ch) {
            continue;
        }
        let Some(&(_, source)) = MIRROR_SOURCES.iter().find(|&&(m, _)| m == ch) else {
            continue;
        };
        let Some(src_cell) = cells.iter().find(|c| c.label == source) else {
            continue;
        };
        info!("deriving '{ch}' by mirroring '{source}'");
        derived.push(GlyphCell {
            label: ch,
            bbox: src_cell.bbox,
            image: src_cell.image.flip_horizontal(),
            row: src_cell.row,
            col: src_cell.col,
            confidence: 1.0,
        });
    }
    if derived.is_empty() {
        return;
    }

    cells.extend(derived);
    cells.sort_by_key(|c| (c.row, c.bbox.x1));
    // Renumber columns after insertion.
    let mut current_row = usize::MAX;
    let mut col = 0usize;
    for cell in cells.iter_mut() {
        if cell.row != current_row {
            current_row = cell.row;
            col = 0;
        }
        cell.col = col;
        col += 1;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basics::RectI;
    use crate::oracle::stub::ScriptedOracle;
    use crate::oracle::IdentifyResponse;
    use crate::raster::RasterImage;

    fn cell_at(x: i32, w: i32, h: i32) -> GlyphCell {
        let image = RasterImage::from_luma(w as u32, h as u32, vec![0; (w * h) as usize]);
        GlyphCell {
            label: '?',
            bbox: RectI::new(x, 0, x + w - 1, h - 1),
            image,
            row: 0,
            col: 0,
            confidence: 1.0,
        }
    }

    #[test]
    fn test_detect_character_set_boundaries() {
        assert_eq!(detect_character_set(8).0, DIGITS);
        assert_eq!(detect_character_set(26).0, UPPERCASE);
        assert_eq!(detect_character_set(30).0.len(), 36);
        assert_eq!(detect_character_set(52).0.len(), 52);
        assert_eq!(detect_character_set(62).0.len(), 62);
        assert!(detect_character_set(80).0.contains('%'));
    }

    #[test]
    fn test_sequential_labels_and_extras() {
        let mut cells = vec![cell_at(0, 10, 10), cell_at(20, 10, 10), cell_at(40, 10, 10)];
        let warnings = label_sequential(&mut cells, "AB");
        assert_eq!(cells[0].label, 'A');
        assert_eq!(cells[1].label, 'B');
        assert_eq!(cells[2].label, '?');
        assert!(matches!(
            warnings.first(),
            Some(Warning::GlyphCountMismatch {
                found: 3,
                expected: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_sequential_reports_missing() {
        let mut cells = vec![cell_at(0, 10, 10)];
        let warnings = label_sequential(&mut cells, "ABC");
        match &warnings[0] {
            Warning::GlyphCountMismatch { missing, .. } => {
                assert_eq!(missing, &vec!['B', 'C']);
            }
            w => panic!("unexpected warning {w:?}"),
        }
    }

    #[test]
    fn test_oracle_labels_with_confidence_gate() {
        let mut cells = vec![cell_at(0, 10, 10), cell_at(20, 10, 10)];
        let oracle = ScriptedOracle::new(vec![
            IdentifyResponse {
                ch: Some('X'),
                confidence: 0.9,
                alternatives: vec![],
            },
            IdentifyResponse {
                ch: Some('Y'),
                confidence: 0.3, // below the gate: sequential fallback
                alternatives: vec![],
            },
        ]);
        let rows = vec![TextRow {
            y: 0,
            height: 10,
            baseline: 7,
        }];
        let warnings = label_with_oracle(&mut cells, "AB", &oracle, &rows);
        assert_eq!(cells[0].label, 'X');
        assert!((cells[0].confidence - 0.9).abs() < 1e-12);
        assert_eq!(cells[1].label, 'B');
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_oracle_transport_failure_degrades_to_sequential() {
        let mut cells = vec![cell_at(0, 10, 10), cell_at(20, 10, 10)];
        let oracle = ScriptedOracle::failing();
        let warnings = label_with_oracle(&mut cells, "AB", &oracle, &[]);
        assert_eq!(cells[0].label, 'A');
        assert_eq!(cells[1].label, 'B');
        assert!(matches!(
            warnings.first(),
            Some(Warning::OracleUnavailable(_))
        ));
    }

    #[test]
    fn test_position_hints() {
        let row = TextRow {
            y: 0,
            height: 100,
            baseline: 70,
        };
        // Body resting on the baseline
        let mut body = cell_at(0, 20, 60);
        body.bbox = RectI::new(0, 10, 19, 69);
        assert_eq!(position_hint(&body, &row), PositionHint::OnBaseline);

        // Small mark high in the row
        let mut dot = cell_at(0, 10, 10);
        dot.bbox = RectI::new(0, 5, 9, 14);
        assert_eq!(position_hint(&dot, &row), PositionHint::AtTop);

        // Reaches well below the baseline
        let mut desc = cell_at(0, 20, 80);
        desc.bbox = RectI::new(0, 10, 19, 89);
        assert_eq!(position_hint(&desc, &row), PositionHint::HasDescender);
    }

    #[test]
    fn test_mirror_derivation_synthesizes_backslash() {
        let mut slash = cell_at(0, 3, 3);
        slash.label = '/';
        // A recognizable asymmetric pattern
        slash.image = RasterImage::from_luma(3, 3, vec![0, 255, 255, 255, 0, 255, 255, 255, 0]);
        let mut cells = vec![slash];

        derive_mirrors(&mut cells, "/\\");
        assert_eq!(cells.len(), 2);
        let back = cells.iter().find(|c| c.label == '\\').expect("derived");
        assert!((back.confidence - 1.0).abs() < 1e-12);
        // Flipped anti-diagonal
        assert_eq!(back.image.luma(), &[255, 255, 0, 255, 0, 255, 0, 255, 255]);
    }

    #[test]
    fn test_mirror_derivation_skips_present_chars() {
        let mut a = cell_at(0, 3, 3);
        a.label = '(';
        let mut b = cell_at(10, 3, 3);
        b.label = ')';
        let mut cells = vec![a, b];
        derive_mirrors(&mut cells, "()");
        assert_eq!(cells.len(), 2);
    }

    #[test]
    fn test_mirror_derivation_renumbers_columns() {
        let mut slash = cell_at(10, 3, 3);
        slash.label = '/';
        let mut z = cell_at(30, 3, 3);
        z.label = 'z';
        let mut cells = vec![slash, z];
        derive_mirrors(&mut cells, "/z\\");
        assert_eq!(cells.len(), 3);
        let cols: Vec<usize> = cells.iter().map(|c| c.col).collect();
        assert_eq!(cols, vec![0, 1, 2]);
    }
}
