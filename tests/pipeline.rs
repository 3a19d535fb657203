//! End-to-end pipeline scenarios over synthetic alphabet sheets.
//!
//! Sheets are drawn programmatically (blocky glyphs on a light ground),
//! run through the full generator, and the produced fonts are read back
//! with `ttf-parser` and the crate's own sfnt reader.

use glyphtrace::sfnt::{assemble, read_tables, SFNT_TRUETYPE};
use glyphtrace::{
    Error, ExportFormat, FontGenerator, FontInfo, GeneratorConfig, ImageSource, RasterImage,
    SegmentationMethod, Warning,
};

const INK: u8 = 12;
const PAPER: u8 = 244;

/// A sheet under construction.
struct Sheet {
    width: u32,
    height: u32,
    luma: Vec<u8>,
}

impl Sheet {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            luma: vec![PAPER; (width * height) as usize],
        }
    }

    fn block(&mut self, x: u32, y: u32, w: u32, h: u32) -> &mut Self {
        for yy in y..y + h {
            for xx in x..x + w {
                self.luma[(yy * self.width + xx) as usize] = INK;
            }
        }
        self
    }

    /// A thick forward slash.
    fn slash(&mut self, x: u32, y: u32, w: u32, h: u32, stroke: u32) -> &mut Self {
        for yy in 0..h {
            // Top of the glyph leans right
            let off = (h - 1 - yy) * (w - stroke) / h.max(1);
            for xx in 0..stroke {
                self.luma[((y + yy) * self.width + x + off + xx) as usize] = INK;
            }
        }
        self
    }

    fn raster(&self) -> RasterImage {
        RasterImage::from_luma(self.width, self.height, self.luma.clone())
    }
}

/// One row of A-Z blocks; 'H' is wide and 'I' narrow so the advance ratio
/// scenario has something to measure.
fn uppercase_sheet() -> RasterImage {
    let mut sheet = Sheet::new(1400, 110);
    let mut x = 20u32;
    for i in 0..26u32 {
        let w = match i {
            7 => 52, // H
            8 => 15, // I
            _ => 30,
        };
        sheet.block(x, 15, w, 70);
        x += w + 14;
    }
    sheet.raster()
}

fn uppercase_config() -> GeneratorConfig {
    GeneratorConfig {
        segmentation_method: SegmentationMethod::Contour,
        min_char_size: 10,
        export_formats: vec![ExportFormat::Ttf, ExportFormat::Otf],
        ..Default::default()
    }
}

fn generate(raster: RasterImage, config: &GeneratorConfig) -> glyphtrace::GeneratedFont {
    let info = FontInfo {
        family_name: "Synthetic".into(),
        ..Default::default()
    };
    FontGenerator::new(config, &info)
        .generate(ImageSource::Raster(raster))
        .expect("pipeline")
}

// ============================================================================
// S1: uppercase sheet
// ============================================================================

#[test]
fn uppercase_sheet_produces_26_letter_font() {
    let font = generate(uppercase_sheet(), &uppercase_config());
    assert_eq!(font.alphabet, "ABCDEFGHIJKLMNOPQRSTUVWXYZ");

    let ttf = font.ttf.as_ref().expect("ttf emitted");
    let face = ttf_parser::Face::parse(ttf, 0).expect("ttf parses");
    // .notdef + space + A-Z
    assert_eq!(face.number_of_glyphs(), 28);
    assert_eq!(face.units_per_em(), 1000);

    // Every letter resolves through cmap (and to a distinct glyph)
    let mut seen = std::collections::BTreeSet::new();
    for c in 'A'..='Z' {
        let gid = face.glyph_index(c).unwrap_or_else(|| panic!("no cmap entry for {c}"));
        assert!(seen.insert(gid.0));
    }

    // Cap height lands on the 70% mark
    let cap = face.capital_height().expect("sCapHeight present");
    assert!((695..=705).contains(&cap), "cap height {cap}");

    // No descender contribution: hhea descent stays at the fallback
    assert!(face.descender() <= 0);

    // Advance of wide H within 20% of 3x narrow I
    let h = face
        .glyph_hor_advance(face.glyph_index('H').unwrap())
        .unwrap() as f64;
    let i = face
        .glyph_hor_advance(face.glyph_index('I').unwrap())
        .unwrap() as f64;
    let ratio = h / (3.0 * i);
    assert!((0.8..=1.2).contains(&ratio), "H/I advance ratio {ratio:.2}");
}

// ============================================================================
// S5: TTF outline integrity
// ============================================================================

struct QuadOnly {
    cubics: usize,
    segments: usize,
}

impl ttf_parser::OutlineBuilder for QuadOnly {
    fn move_to(&mut self, _x: f32, _y: f32) {
        self.segments += 1;
    }
    fn line_to(&mut self, _x: f32, _y: f32) {
        self.segments += 1;
    }
    fn quad_to(&mut self, _x1: f32, _y1: f32, _x: f32, _y: f32) {
        self.segments += 1;
    }
    fn curve_to(&mut self, _x1: f32, _y1: f32, _x2: f32, _y2: f32, _x: f32, _y: f32) {
        self.cubics += 1;
    }
    fn close(&mut self) {}
}

#[test]
fn ttf_outlines_contain_no_cubics() {
    let font = generate(uppercase_sheet(), &uppercase_config());
    let ttf = font.ttf.as_ref().unwrap();
    let face = ttf_parser::Face::parse(ttf, 0).unwrap();

    let mut outlined = 0;
    for gid in 0..face.number_of_glyphs() {
        let mut sink = QuadOnly {
            cubics: 0,
            segments: 0,
        };
        if face
            .outline_glyph(ttf_parser::GlyphId(gid), &mut sink)
            .is_some()
        {
            assert_eq!(sink.cubics, 0, "glyph {gid} contains cubic segments");
            assert!(sink.segments > 0);
            outlined += 1;
        }
    }
    // Everything except space has an outline
    assert_eq!(outlined, 27);
}

// ============================================================================
// S4: kern override
// ============================================================================

#[test]
fn kerning_contains_av_override() {
    let font = generate(uppercase_sheet(), &uppercase_config());
    // In metric space first
    let av = font.metrics.kerning.get(&('A', 'V')).copied().expect("A+V pair");
    assert!((av + 125.0).abs() < 1e-6, "A+V kern {av}");

    // And in the emitted kern table: A = gid 2, V = gid 23
    let (_, tables) = read_tables(font.ttf.as_ref().unwrap()).unwrap();
    let kern = tables.get(b"kern").expect("kern table present");
    let n = u16::from_be_bytes([kern[10], kern[11]]) as usize;
    let mut found = false;
    for i in 0..n {
        let at = 18 + i * 6;
        let left = u16::from_be_bytes([kern[at], kern[at + 1]]);
        let right = u16::from_be_bytes([kern[at + 2], kern[at + 3]]);
        let value = i16::from_be_bytes([kern[at + 4], kern[at + 5]]);
        if left == 2 && right == 23 {
            assert_eq!(value, -125);
            found = true;
        }
    }
    assert!(found, "A+V pair missing from kern table");
}

// ============================================================================
// S2: descender placement
// ============================================================================

#[test]
fn descenders_hang_below_baseline() {
    let mut sheet = Sheet::new(320, 140);
    sheet
        .block(20, 20, 60, 100) // E
        .block(100, 50, 50, 70) // a
        .block(170, 20, 50, 100) // g
        .block(240, 20, 50, 100); // p
    let config = GeneratorConfig {
        segmentation_method: SegmentationMethod::Contour,
        expected_chars: Some("Eagp".into()),
        ..Default::default()
    };
    let font = generate(sheet.raster(), &config);

    // descender ≈ -0.30 * (g bitmap height * scale)
    assert!(
        (-235.0..=-185.0).contains(&font.metrics.descender),
        "descender {}",
        font.metrics.descender
    );

    let a = font.glyphs.iter().find(|g| g.label == 'a').unwrap();
    let ab = a.bounds().unwrap();
    assert!(ab.y1.abs() < 1.0, "a yMin {} not on baseline", ab.y1);

    let g = font.glyphs.iter().find(|g| g.label == 'g').unwrap();
    let gb = g.bounds().unwrap();
    assert!(gb.y1 < -100.0, "g yMin {} not below baseline", gb.y1);

    // Ordering invariant over the derived metrics
    let m = &font.metrics;
    assert!(m.descender <= 0.0 && 0.0 <= m.x_height);
    assert!(m.x_height <= m.cap_height && m.cap_height <= m.ascender);
}

// ============================================================================
// S3: i-dot merging
// ============================================================================

#[test]
fn dot_and_stem_become_one_glyph_with_two_outlines() {
    let mut sheet = Sheet::new(220, 140);
    sheet
        .block(20, 20, 60, 100) // E
        .block(120, 20, 12, 12) // i dot
        .block(120, 60, 12, 60); // i stem
    let config = GeneratorConfig {
        segmentation_method: SegmentationMethod::Contour,
        min_char_size: 10,
        expected_chars: Some("Ei".into()),
        ..Default::default()
    };
    let font = generate(sheet.raster(), &config);

    assert_eq!(font.glyphs.len(), 2);
    let i = font.glyphs.iter().find(|g| g.label == 'i').expect("i glyph");
    let outers = i.paths.iter().filter(|p| !p.is_hole).count();
    assert!(outers >= 2, "expected dot and stem as separate outlines");

    // The dot sits clear of the stem: two disjoint vertical spans
    let bounds: Vec<_> = i.paths.iter().filter_map(|p| p.bounds()).collect();
    let min_top = bounds.iter().map(|b| b.y2).fold(f64::INFINITY, f64::min);
    let max_bottom = bounds.iter().map(|b| b.y1).fold(f64::NEG_INFINITY, f64::max);
    assert!(max_bottom > min_top, "outlines overlap vertically");
}

// ============================================================================
// S6: custom punctuation
// ============================================================================

fn punctuation_sheet() -> RasterImage {
    let mut sheet = Sheet::new(300, 140);
    sheet
        .block(20, 20, 60, 100) // E
        .block(100, 20, 60, 100) // F
        .block(180, 100, 10, 10) // .
        .block(220, 100, 10, 10) // ,
        .block(260, 50, 10, 10); // stray quote
    sheet.raster()
}

#[test]
fn small_glyph_mode_keeps_punctuation() {
    let config = GeneratorConfig {
        segmentation_method: SegmentationMethod::Contour,
        include_small_glyphs: true,
        expected_chars: Some("EF.,'".into()),
        ..Default::default()
    };
    let font = generate(punctuation_sheet(), &config);
    assert_eq!(font.glyphs.len(), 5);
    assert!(!font
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::OrphansDiscarded(_))));
}

#[test]
fn orphans_reported_when_small_glyph_mode_off() {
    let config = GeneratorConfig {
        segmentation_method: SegmentationMethod::Contour,
        include_small_glyphs: false,
        expected_chars: Some("EF".into()),
        ..Default::default()
    };
    let font = generate(punctuation_sheet(), &config);
    assert_eq!(font.glyphs.len(), 2);
    assert!(font
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::OrphansDiscarded(3))));
}

// ============================================================================
// Boundary behaviors
// ============================================================================

#[test]
fn blank_sheet_aborts_with_no_text_rows() {
    let sheet = Sheet::new(200, 200);
    let config = GeneratorConfig::default();
    let info = FontInfo::default();
    let err = FontGenerator::new(&config, &info)
        .generate(ImageSource::Raster(sheet.raster()))
        .unwrap_err();
    assert!(matches!(err, Error::NoTextRows));
}

#[test]
fn single_glyph_font_falls_back_to_default_metrics() {
    let mut sheet = Sheet::new(120, 140);
    sheet.block(30, 20, 50, 100);
    let config = GeneratorConfig {
        segmentation_method: SegmentationMethod::Contour,
        ..Default::default()
    };
    let font = generate(sheet.raster(), &config);

    // Cardinality heuristic picks digits; the one cell is '0'
    assert_eq!(font.glyphs.len(), 1);
    assert_eq!(font.glyphs[0].label, '0');
    assert!(font
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::GlyphCountMismatch { found: 1, expected: 10, .. })));

    let m = &font.metrics;
    assert!((m.cap_height - 700.0).abs() < 1e-6);
    assert!((m.x_height - 500.0).abs() < 1e-6);
    assert!((m.descender + 200.0).abs() < 1e-6);
    assert!((m.ascender - 770.0).abs() < 1e-6);

    let face = ttf_parser::Face::parse(font.ttf.as_ref().unwrap(), 0).unwrap();
    assert_eq!(face.number_of_glyphs(), 3);
}

#[test]
fn glyph_touching_border_is_extracted() {
    let mut sheet = Sheet::new(200, 100);
    sheet.block(0, 0, 40, 80).block(100, 10, 40, 80);
    let config = GeneratorConfig {
        segmentation_method: SegmentationMethod::Contour,
        expected_chars: Some("AB".into()),
        ..Default::default()
    };
    let font = generate(sheet.raster(), &config);
    assert_eq!(font.glyphs.len(), 2);
}

// ============================================================================
// Mirror derivation
// ============================================================================

#[test]
fn missing_backslash_is_mirrored_from_slash() {
    let mut sheet = Sheet::new(200, 140);
    sheet.slash(40, 20, 70, 100, 16);
    let config = GeneratorConfig {
        segmentation_method: SegmentationMethod::Contour,
        expected_chars: Some("/\\".into()),
        ..Default::default()
    };
    let font = generate(sheet.raster(), &config);

    let labels: Vec<char> = font.glyphs.iter().map(|g| g.label).collect();
    assert!(labels.contains(&'/'));
    assert!(labels.contains(&'\\'));

    // The mirrored glyph spans the same footprint as its source
    let slash = font.glyphs.iter().find(|g| g.label == '/').unwrap();
    let back = font.glyphs.iter().find(|g| g.label == '\\').unwrap();
    let sb = slash.bounds().unwrap();
    let bb = back.bounds().unwrap();
    assert!((sb.width() - bb.width()).abs() < 20.0);
    assert!((sb.height() - bb.height()).abs() < 20.0);
}

// ============================================================================
// Round-trips
// ============================================================================

#[test]
fn emitted_ttf_reassembles_byte_identically() {
    let font = generate(uppercase_sheet(), &uppercase_config());
    let ttf = font.ttf.as_ref().unwrap();

    let (version, tables) = read_tables(ttf).unwrap();
    assert_eq!(version, SFNT_TRUETYPE);
    let rebuilt = assemble(version, &tables).unwrap();
    assert_eq!(ttf, &rebuilt);

    // And once more through the reader for good measure
    let (_, tables2) = read_tables(&rebuilt).unwrap();
    assert_eq!(assemble(version, &tables2).unwrap(), rebuilt);
}

#[test]
fn otf_parses_and_exposes_cff_outlines() {
    let font = generate(uppercase_sheet(), &uppercase_config());
    let otf = font.otf.as_ref().expect("otf emitted");
    let face = ttf_parser::Face::parse(otf, 0).expect("otf parses");
    assert_eq!(face.number_of_glyphs(), 28);

    let gid = face.glyph_index('A').expect("cmap entry for A");
    let mut sink = QuadOnly {
        cubics: 0,
        segments: 0,
    };
    let bbox = face.outline_glyph(gid, &mut sink);
    assert!(bbox.is_some(), "A has a CFF outline");
    assert!(sink.segments > 0);
}

#[test]
fn fonts_written_to_disk_are_readable() {
    let font = generate(uppercase_sheet(), &uppercase_config());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("synthetic.ttf");
    std::fs::write(&path, font.ttf.as_ref().unwrap()).unwrap();
    let data = std::fs::read(&path).unwrap();
    assert!(ttf_parser::Face::parse(&data, 0).is_ok());
}
