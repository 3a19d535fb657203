//! Pipeline configuration and font naming metadata.
//!
//! The configuration is plain data passed by reference into each stage;
//! there are no process-wide settings.

use serde::{Deserialize, Serialize};

// ============================================================================
// Character sets
// ============================================================================

pub const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
pub const DIGITS: &str = "0123456789";
/// Extended punctuation covering common symbols found in handwriting samples.
pub const PUNCTUATION: &str = "!@#$%^&*()_+-=[]{}|;':\",./<>?`~\\";

/// Uppercase + lowercase + digits + punctuation.
pub fn full_alphabet() -> String {
    let mut s = String::with_capacity(
        UPPERCASE.len() + LOWERCASE.len() + DIGITS.len() + PUNCTUATION.len(),
    );
    s.push_str(UPPERCASE);
    s.push_str(LOWERCASE);
    s.push_str(DIGITS);
    s.push_str(PUNCTUATION);
    s
}

// ============================================================================
// Enumerated options
// ============================================================================

/// Smoothing levels for vectorization. Each level selects a blur kernel,
/// morphology kernel, simplification epsilon factor, and corner threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingLevel {
    None,
    Low,
    #[default]
    Medium,
    High,
    Maximum,
}

/// Available segmentation methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMethod {
    /// Uniform grid of cells.
    Grid,
    /// Connected components over the whole image.
    Contour,
    /// Row bands first, then columns within each row.
    RowColumn,
    /// Pick between grid and contour from the component layout.
    #[default]
    Auto,
}

/// Polarity handling for binarization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Invert {
    /// Probe the border band vs. the image center once per image.
    #[default]
    Auto,
    /// Force inversion (light ink on dark ground).
    Always,
    /// Never invert.
    Never,
}

/// Output container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// TrueType container with quadratic `glyf` outlines.
    Ttf,
    /// OpenType container with a cubic `CFF ` table.
    Otf,
}

// ============================================================================
// GeneratorConfig
// ============================================================================

/// All knobs of the image-to-font pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Target em-unit scale (typically 1000 or 2048).
    pub units_per_em: u16,
    /// Vectorizer smoothing level.
    pub smoothing_level: SmoothingLevel,
    /// Minimum dimension of a main glyph component, px.
    pub min_char_size: u32,
    /// Minimum dimension of a punctuation component, px.
    pub min_small_glyph_size: u32,
    /// Keep orphan small components as punctuation.
    pub include_small_glyphs: bool,
    /// Polarity override.
    pub invert: Invert,
    /// Segmentation method selector.
    pub segmentation_method: SegmentationMethod,
    /// Explicit grid dimensions (grid method only).
    pub grid_rows: Option<u32>,
    pub grid_cols: Option<u32>,
    /// Expected alphabet in reading order; `None` selects by cardinality.
    pub expected_chars: Option<String>,
    /// Fraction of em below which a kern pair is suppressed, in percent.
    pub kerning_threshold_pct: f64,
    /// Side bearing as percent of em.
    pub default_side_bearing_pct: f64,
    /// Which files to emit.
    pub export_formats: Vec<ExportFormat>,
    /// Pad added around each extracted glyph cell, px.
    pub padding: u32,
    /// Contours below this area are treated as noise by the vectorizer, px².
    pub min_contour_area: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            units_per_em: 1000,
            smoothing_level: SmoothingLevel::Medium,
            min_char_size: 20,
            min_small_glyph_size: 3,
            include_small_glyphs: false,
            invert: Invert::Auto,
            segmentation_method: SegmentationMethod::Auto,
            grid_rows: None,
            grid_cols: None,
            expected_chars: None,
            kerning_threshold_pct: 0.15,
            default_side_bearing_pct: 3.0,
            export_formats: vec![ExportFormat::Ttf],
            padding: 2,
            min_contour_area: 50.0,
        }
    }
}

// ============================================================================
// FontInfo
// ============================================================================

/// Font naming and versioning record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontInfo {
    pub family_name: String,
    pub style_name: String,
    pub version: String,
    pub copyright: String,
    pub designer: String,
}

impl Default for FontInfo {
    fn default() -> Self {
        Self {
            family_name: "CustomFont".into(),
            style_name: "Regular".into(),
            version: "1.0".into(),
            copyright: String::new(),
            designer: String::new(),
        }
    }
}

impl FontInfo {
    /// Family and style joined with a space.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.family_name, self.style_name)
    }

    /// `family-style` with spaces stripped.
    pub fn postscript_name(&self) -> String {
        format!("{}-{}", self.family_name, self.style_name).replace(' ', "")
    }

    /// `version;postscript_name`.
    pub fn unique_id(&self) -> String {
        format!("{};{}", self.version, self.postscript_name())
    }

    /// `Version x.y` string for the name table.
    pub fn version_string(&self) -> String {
        format!("Version {}", self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_documented_defaults() {
        let c = GeneratorConfig::default();
        assert_eq!(c.units_per_em, 1000);
        assert_eq!(c.min_char_size, 20);
        assert_eq!(c.min_small_glyph_size, 3);
        assert!(!c.include_small_glyphs);
        assert_eq!(c.smoothing_level, SmoothingLevel::Medium);
        assert_eq!(c.segmentation_method, SegmentationMethod::Auto);
        assert!((c.kerning_threshold_pct - 0.15).abs() < 1e-12);
        assert!((c.default_side_bearing_pct - 3.0).abs() < 1e-12);
        assert_eq!(c.export_formats, vec![ExportFormat::Ttf]);
    }

    #[test]
    fn test_font_info_derived_names() {
        let info = FontInfo {
            family_name: "My Hand".into(),
            style_name: "Regular".into(),
            version: "1.0".into(),
            ..Default::default()
        };
        assert_eq!(info.full_name(), "My Hand Regular");
        assert_eq!(info.postscript_name(), "MyHand-Regular");
        assert_eq!(info.unique_id(), "1.0;MyHand-Regular");
        assert_eq!(info.version_string(), "Version 1.0");
    }

    #[test]
    fn test_full_alphabet_composition() {
        let a = full_alphabet();
        assert!(a.starts_with(UPPERCASE));
        assert!(a.contains('z'));
        assert!(a.contains('%'));
        assert_eq!(a.chars().count(), 26 + 26 + 10 + PUNCTUATION.chars().count());
    }

}
