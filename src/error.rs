//! Error and warning taxonomy for the font generation pipeline.
//!
//! Anything that renders the output font unusable is an [`Error`]; anything
//! that only reduces quality is a [`Warning`] attached to the result.

use thiserror::Error;

/// Fatal pipeline errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The input raster could not be decoded.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The row detector found zero text bands.
    #[error("no text rows detected in image")]
    NoTextRows,

    /// The segmenter produced zero glyph cells.
    #[error("no glyphs found in image")]
    NoGlyphsFound,

    /// A font table could not be assembled.
    #[error("font assembly failed in table '{table}': {reason}")]
    FontAssembly { table: &'static str, reason: String },

    /// Cooperative cancellation was requested.
    #[error("operation cancelled")]
    Cancelled,
}

/// Non-fatal quality degradations, collected on the pipeline result.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// Cell count differs from the expected alphabet size.
    GlyphCountMismatch {
        found: usize,
        expected: usize,
        missing: Vec<char>,
    },
    /// A glyph produced no contours after simplification and was skipped.
    VectorizationFailed(char),
    /// The labeling oracle was unreachable; sequential labels were used.
    OracleUnavailable(String),
    /// Cubic→quadratic conversion hit its recursion cap; the midpoint
    /// fallback was used for the named glyph.
    CubicToQuadraticFailed(char),
    /// Small orphan components were discarded (small-glyph mode off).
    OrphansDiscarded(usize),
    /// A grid cell held no ink.
    EmptyGridCell { row: usize, col: usize },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::GlyphCountMismatch {
                found,
                expected,
                missing,
            } => {
                write!(
                    f,
                    "detected {found} glyphs but expected {expected}; missing: {}",
                    missing.iter().collect::<String>()
                )
            }
            Warning::VectorizationFailed(c) => {
                write!(f, "no contours survived vectorization for '{c}'; glyph skipped")
            }
            Warning::OracleUnavailable(reason) => {
                write!(f, "glyph oracle unavailable ({reason}); sequential labels used")
            }
            Warning::CubicToQuadraticFailed(c) => {
                write!(f, "cubic-to-quadratic conversion degraded to midpoint for '{c}'")
            }
            Warning::OrphansDiscarded(n) => {
                write!(f, "{n} small orphan components discarded")
            }
            Warning::EmptyGridCell { row, col } => {
                write!(f, "empty grid cell at row {row}, col {col}")
            }
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::FontAssembly {
            table: "glyf",
            reason: "coordinate overflow".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("glyf"));
        assert!(msg.contains("coordinate overflow"));
    }

    #[test]
    fn test_warning_display_lists_missing_chars() {
        let w = Warning::GlyphCountMismatch {
            found: 24,
            expected: 26,
            missing: vec!['Q', 'Z'],
        };
        let msg = w.to_string();
        assert!(msg.contains("24"));
        assert!(msg.contains("QZ"));
    }
}
