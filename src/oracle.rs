//! External glyph oracle interface.
//!
//! The pipeline can delegate two decisions to an external identifier: what
//! character a glyph image shows, and where a too-wide region should be
//! split. The transport (HTTP, local model, rules) is the implementer's
//! business; the core depends only on this trait and degrades gracefully
//! when it fails.

use thiserror::Error;

use crate::raster::RasterImage;

/// Transport-level oracle failure. Callers degrade to sequential labeling
/// and projection-based splitting.
#[derive(Debug, Error)]
#[error("oracle transport failed: {0}")]
pub struct OracleError(pub String);

/// Where the glyph sits relative to its row, as a recognition hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionHint {
    /// Small mark near the top of the row (dots, quotes).
    AtTop,
    /// Body resting on the baseline.
    OnBaseline,
    /// Extends clearly below the baseline.
    HasDescender,
}

/// One glyph image to identify.
pub struct IdentifyRequest<'a> {
    pub image: &'a RasterImage,
    pub hint: Option<PositionHint>,
}

/// Identification answer. `ch == None` means the oracle could not decide.
#[derive(Debug, Clone)]
pub struct IdentifyResponse {
    pub ch: Option<char>,
    /// In `[0, 1]`; below 0.5 the caller falls back to sequential labels.
    pub confidence: f64,
    pub alternatives: Vec<char>,
}

/// A region suspected to hold several touching glyphs.
pub struct SplitRequest<'a> {
    pub region: &'a RasterImage,
    pub expected_width_px: u32,
}

/// Split answer: `count` distinct glyphs, split positions as fractions of
/// the region width in `(0, 1)`. `count <= 1` means "do not split".
#[derive(Debug, Clone)]
pub struct SplitResponse {
    pub count: u32,
    pub splits: Vec<f64>,
}

/// The labeling/splitting oracle. Implementations must be deterministic per
/// request for reproducible pipelines; the core batches calls in glyph
/// order.
pub trait GlyphOracle {
    fn identify(&self, req: &IdentifyRequest<'_>) -> Result<IdentifyResponse, OracleError>;

    fn analyze_region_for_split(
        &self,
        req: &SplitRequest<'_>,
    ) -> Result<SplitResponse, OracleError>;
}

#[cfg(test)]
pub mod stub {
    //! Deterministic rule-based oracle for tests.

    use super::*;

    /// Answers from a fixed script: the i-th identify call returns the i-th
    /// entry. Split requests always report a single glyph.
    pub struct ScriptedOracle {
        script: std::cell::RefCell<std::collections::VecDeque<IdentifyResponse>>,
        pub fail: bool,
    }

    impl ScriptedOracle {
        pub fn new(answers: Vec<IdentifyResponse>) -> Self {
            Self {
                script: std::cell::RefCell::new(answers.into()),
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                script: std::cell::RefCell::new(Default::default()),
                fail: true,
            }
        }
    }

    impl GlyphOracle for ScriptedOracle {
        fn identify(
            &self,
            _req: &IdentifyRequest<'_>,
        ) -> Result<IdentifyResponse, OracleError> {
            if self.fail {
                return Err(OracleError("scripted failure".into()));
            }
            self.script
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| OracleError("script exhausted".into()))
        }

        fn analyze_region_for_split(
            &self,
            _req: &SplitRequest<'_>,
        ) -> Result<SplitResponse, OracleError> {
            if self.fail {
                return Err(OracleError("scripted failure".into()));
            }
            Ok(SplitResponse {
                count: 1,
                splits: Vec::new(),
            })
        }
    }
}
