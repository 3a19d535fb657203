//! The end-to-end pipeline: decode, binarize, detect rows, segment, label,
//! vectorize, infer metrics, assemble fonts.
//!
//! Strictly linear per image; every stage hands an owned value to the next.
//! Cancellation is checked between glyphs and between kern pairs, and glyph
//! tiles are released as soon as their outlines exist.

use log::{info, warn};

use crate::binarize::{binarize, detect_needs_inversion};
use crate::config::{ExportFormat, FontInfo, GeneratorConfig, Invert, SegmentationMethod};
use crate::context::{CancelToken, NullProgress, ProgressSink};
use crate::error::{Error, Result, Warning};
use crate::font_builder::FontBuilder;
use crate::labeler;
use crate::metrics::{FontMetrics, MetricsCalculator};
use crate::oracle::GlyphOracle;
use crate::path::VectorGlyph;
use crate::raster::{ImageSource, RasterImage};
use crate::row_detector::RowDetector;
use crate::segmentation::{GlyphCell, Segmenter};
use crate::vectorizer::Vectorizer;

// ============================================================================
// GeneratedFont
// ============================================================================

/// Everything the pipeline produces for one input image.
#[derive(Debug)]
pub struct GeneratedFont {
    pub ttf: Option<Vec<u8>>,
    pub otf: Option<Vec<u8>>,
    pub metrics: FontMetrics,
    /// Normalized glyphs (baseline at y = 0, em units).
    pub glyphs: Vec<VectorGlyph>,
    /// The alphabet the cells were labeled against.
    pub alphabet: String,
    /// The segmentation method actually used.
    pub method: SegmentationMethod,
    pub warnings: Vec<Warning>,
}

// ============================================================================
// FontGenerator
// ============================================================================

pub struct FontGenerator<'a> {
    config: &'a GeneratorConfig,
    info: &'a FontInfo,
    oracle: Option<&'a dyn GlyphOracle>,
    progress: &'a dyn ProgressSink,
    cancel: CancelToken,
}

impl<'a> FontGenerator<'a> {
    pub fn new(config: &'a GeneratorConfig, info: &'a FontInfo) -> Self {
        Self {
            config,
            info,
            oracle: None,
            progress: &NullProgress,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_oracle(mut self, oracle: &'a dyn GlyphOracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the whole pipeline on one image.
    pub fn generate(&self, source: ImageSource) -> Result<GeneratedFont> {
        let raster = source.decode()?;
        info!("input raster {}x{}", raster.width(), raster.height());
        let mut warnings = Vec::new();

        // Polarity is decided once per image, then every stage sees dark
        // ink on a light ground.
        let inverted = match self.config.invert {
            Invert::Always => true,
            Invert::Never => false,
            Invert::Auto => detect_needs_inversion(&raster),
        };
        let raster = if inverted {
            let luma: Vec<u8> = raster.luma().iter().map(|&p| 255 - p).collect();
            RasterImage::new(
                raster.width(),
                raster.height(),
                luma,
                raster.alpha().map(|a| a.to_vec()),
            )
        } else {
            raster
        };

        let binary = binarize(&raster, Invert::Never);
        self.progress.progress("binarize", 1, 1);
        self.cancel.check()?;

        let detector = RowDetector::new(self.config.min_char_size.max(1));
        let rows = detector.detect(&binary);
        if rows.is_empty() {
            return Err(Error::NoTextRows);
        }
        self.progress.progress("rows", 1, 1);
        self.cancel.check()?;

        let segmenter = Segmenter::new(self.config, self.oracle);
        let outcome = segmenter.segment(&raster, &binary, &rows);
        warnings.extend(outcome.warnings);
        let mut cells = outcome.cells;
        if cells.is_empty() {
            return Err(Error::NoGlyphsFound);
        }
        info!("segmented {} cells ({:?})", cells.len(), outcome.method);
        self.progress.progress("segment", 1, 1);
        self.cancel.check()?;

        // Labeling: configured alphabet, else the cardinality heuristic.
        let alphabet = match &self.config.expected_chars {
            Some(chars) => chars.clone(),
            None => {
                let (set, description) = labeler::detect_character_set(cells.len());
                info!("auto-detected character set: {description}");
                set
            }
        };
        let label_warnings = match self.oracle {
            Some(oracle) => labeler::label_with_oracle(&mut cells, &alphabet, oracle, &rows),
            None => labeler::label_sequential(&mut cells, &alphabet),
        };
        warnings.extend(label_warnings);
        labeler::derive_mirrors(&mut cells, &alphabet);

        // Vectorize, releasing each tile as soon as its outline exists.
        let glyphs = self.vectorize_cells(cells, &mut warnings)?;
        if glyphs.is_empty() {
            return Err(Error::NoGlyphsFound);
        }

        let calculator = MetricsCalculator::new(
            self.config.units_per_em,
            self.config.default_side_bearing_pct,
            self.config.kerning_threshold_pct,
        );
        let (metrics, normalized) = calculator.calculate(glyphs, &self.cancel)?;
        self.progress.progress("metrics", 1, 1);

        // Assemble the requested containers.
        let builder = FontBuilder::new(self.info, &metrics);
        let mut ttf = None;
        let mut otf = None;
        for format in &self.config.export_formats {
            self.cancel.check()?;
            let (bytes, build_warnings) = builder.build(&normalized, *format)?;
            warnings.extend(build_warnings);
            match format {
                ExportFormat::Ttf => ttf = Some(bytes),
                ExportFormat::Otf => otf = Some(bytes),
            }
        }
        self.progress.progress("assemble", 1, 1);

        Ok(GeneratedFont {
            ttf,
            otf,
            metrics,
            glyphs: normalized,
            alphabet,
            method: outcome.method,
            warnings,
        })
    }

    /// Per-glyph vectorization; parallel when the `parallel` feature is on,
    /// with results restored to reading order either way.
    fn vectorize_cells(
        &self,
        cells: Vec<GlyphCell>,
        warnings: &mut Vec<Warning>,
    ) -> Result<Vec<VectorGlyph>> {
        let vectorizer = Vectorizer::new(self.config.smoothing_level, self.config.min_contour_area);
        let total = cells.len();

        #[cfg(feature = "parallel")]
        let traced: Vec<VectorGlyph> = {
            use rayon::prelude::*;
            let cancel = &self.cancel;
            let traced = cells
                .into_par_iter()
                .map(|cell| {
                    cancel.check()?;
                    Ok(vectorizer.vectorize(&cell.image, cell.label))
                })
                .collect::<Result<Vec<_>>>()?;
            self.progress.progress("vectorize", total, total);
            traced
        };

        #[cfg(not(feature = "parallel"))]
        let traced: Vec<VectorGlyph> = {
            let mut traced = Vec::with_capacity(total);
            for (done, cell) in cells.into_iter().enumerate() {
                self.cancel.check()?;
                traced.push(vectorizer.vectorize(&cell.image, cell.label));
                self.progress.progress("vectorize", done + 1, total);
            }
            traced
        };

        let mut glyphs = Vec::with_capacity(traced.len());
        for glyph in traced {
            if glyph.paths.is_empty() {
                warn!("vectorization produced no contours for '{}'", glyph.label);
                warnings.push(Warning::VectorizationFailed(glyph.label));
            } else {
                glyphs.push(glyph);
            }
        }
        Ok(glyphs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Sheet with rectangular "glyphs" at (x, y, w, h).
    fn sheet(w: u32, h: u32, blocks: &[(u32, u32, u32, u32)]) -> RasterImage {
        let mut luma = vec![245u8; (w * h) as usize];
        for &(x0, y0, bw, bh) in blocks {
            for y in y0..y0 + bh {
                for x in x0..x0 + bw {
                    luma[(y * w + x) as usize] = 10;
                }
            }
        }
        RasterImage::from_luma(w, h, luma)
    }

    fn base_config() -> GeneratorConfig {
        GeneratorConfig {
            segmentation_method: SegmentationMethod::Contour,
            expected_chars: Some("AB".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_blank_image_raises_no_text_rows() {
        let raster = RasterImage::from_luma(100, 100, vec![245; 10_000]);
        let config = base_config();
        let info = FontInfo::default();
        let err = FontGenerator::new(&config, &info)
            .generate(ImageSource::Raster(raster))
            .unwrap_err();
        assert!(matches!(err, Error::NoTextRows));
    }

    #[test]
    fn test_two_glyph_pipeline_produces_ttf() {
        let raster = sheet(200, 100, &[(20, 20, 40, 60), (100, 20, 40, 60)]);
        let config = base_config();
        let info = FontInfo::default();
        let font = FontGenerator::new(&config, &info)
            .generate(ImageSource::Raster(raster))
            .unwrap();
        assert!(font.ttf.is_some());
        assert!(font.otf.is_none());
        assert_eq!(font.glyphs.len(), 2);
        assert_eq!(font.glyphs[0].label, 'A');
        assert_eq!(font.glyphs[1].label, 'B');
        assert_eq!(font.alphabet, "AB");
    }

    #[test]
    fn test_cancellation_aborts_pipeline() {
        let raster = sheet(200, 100, &[(20, 20, 40, 60), (100, 20, 40, 60)]);
        let config = base_config();
        let info = FontInfo::default();
        let token = CancelToken::new();
        token.cancel();
        let err = FontGenerator::new(&config, &info)
            .with_cancel_token(token)
            .generate(ImageSource::Raster(raster))
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_inverted_input_auto_detected() {
        let raster = sheet(200, 100, &[(20, 20, 40, 60), (100, 20, 40, 60)]);
        let luma: Vec<u8> = raster.luma().iter().map(|&p| 255 - p).collect();
        let inverted = RasterImage::from_luma(200, 100, luma);

        let config = base_config();
        let info = FontInfo::default();
        let font = FontGenerator::new(&config, &info)
            .generate(ImageSource::Raster(inverted))
            .unwrap();
        assert_eq!(font.glyphs.len(), 2);
    }

    #[test]
    fn test_progress_events_emitted() {
        use std::sync::Mutex;
        struct Recorder(Mutex<Vec<String>>);
        impl ProgressSink for Recorder {
            fn progress(&self, stage: &str, _done: usize, _total: usize) {
                self.0.lock().unwrap().push(stage.to_string());
            }
        }

        let raster = sheet(200, 100, &[(20, 20, 40, 60), (100, 20, 40, 60)]);
        let config = base_config();
        let info = FontInfo::default();
        let recorder = Recorder(Mutex::new(Vec::new()));
        FontGenerator::new(&config, &info)
            .with_progress(&recorder)
            .generate(ImageSource::Raster(raster))
            .unwrap();
        let stages = recorder.0.lock().unwrap();
        for expected in ["binarize", "rows", "segment", "metrics", "assemble"] {
            assert!(stages.iter().any(|s| s == expected), "missing stage {expected}");
        }
    }
}
