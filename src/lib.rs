//! # glyphtrace
//!
//! Converts a raster image of a handwritten or printed alphabet into a
//! working TrueType (`.ttf`) or OpenType/CFF (`.otf`) font, complete with
//! baseline alignment, x-height and ascender/descender inference, and a
//! basic kern table.
//!
//! ## Pipeline
//!
//! One image runs through a strictly linear pipeline:
//!
//! 1. **Binarize** — grayscale (alpha-masked), blur, Otsu threshold,
//!    polarity normalization
//! 2. **Detect rows** — horizontal projection bands with descender-overlap
//!    resolution and small-row absorption
//! 3. **Segment** — connected components (or row-column / grid layout) into
//!    glyph cells, merging multi-part glyphs and splitting touching ones
//! 4. **Label** — sequential alphabet assignment, an optional external
//!    oracle, and mirror derivation for missing characters
//! 5. **Vectorize** — contour tracing with hole hierarchy, simplification,
//!    corner detection, Bezier fitting
//! 6. **Metrics** — em-unit normalization, baseline placement, vertical
//!    metric inference, advances and kerning
//! 7. **Assemble** — `glyf`/`CFF ` outlines plus the full sfnt table set
//!
//! ## Example
//!
//! ```no_run
//! use glyphtrace::{FontGenerator, FontInfo, GeneratorConfig, ImageSource};
//!
//! let config = GeneratorConfig::default();
//! let info = FontInfo::default();
//! let font = FontGenerator::new(&config, &info)
//!     .generate(ImageSource::Path("alphabet.png".into()))?;
//! std::fs::write("alphabet.ttf", font.ttf.as_deref().unwrap_or_default())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Foundation
pub mod basics;
pub mod math;
pub mod trans_affine;

// Raster side
pub mod binarize;
pub mod contour;
pub mod filters;
pub mod raster;
pub mod row_detector;
pub mod segmentation;
pub mod simplify;

// Labeling
pub mod labeler;
pub mod oracle;

// Vector side
pub mod kern;
pub mod metrics;
pub mod path;
pub mod svg;
pub mod vectorizer;

// Font output
pub mod cff;
pub mod font_builder;
pub mod glyf;
pub mod sfnt;
pub mod tables;

// Pipeline
pub mod config;
pub mod context;
pub mod error;
pub mod generator;

pub use config::{
    ExportFormat, FontInfo, GeneratorConfig, Invert, SegmentationMethod, SmoothingLevel,
};
pub use context::{CancelToken, NullProgress, ProgressSink};
pub use error::{Error, Result, Warning};
pub use generator::{FontGenerator, GeneratedFont};
pub use metrics::FontMetrics;
pub use oracle::{
    GlyphOracle, IdentifyRequest, IdentifyResponse, OracleError, PositionHint, SplitRequest,
    SplitResponse,
};
pub use path::{PathSegment, VectorGlyph, VectorPath};
pub use raster::{BinaryImage, ImageSource, RasterImage};
pub use segmentation::{GlyphCell, SegmentationOutcome};
