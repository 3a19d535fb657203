//! Font assembly (pipeline stage C7).
//!
//! Lays out the glyph roster (`.notdef`, `space`, then labels by
//! codepoint), maps codepoints, converts outlines per container (quadratic
//! `glyf` for TrueType, Type 2 charstrings for CFF), and emits the full
//! table set.

use std::collections::BTreeMap;

use log::{info, warn};

use crate::cff::{build_cff, CffGlyph};
use crate::config::{ExportFormat, FontInfo};
use crate::error::{Error, Result, Warning};
use crate::glyf::{assemble_glyf_loca, build_glyph, outline_from_paths, BuiltGlyph};
use crate::metrics::FontMetrics;
use crate::path::{VectorGlyph, VectorPath};
use crate::sfnt::{assemble, to_i16, Tag, SFNT_CFF, SFNT_TRUETYPE};
use crate::tables::{
    build_cmap, build_head, build_hhea, build_hmtx, build_kern, build_maxp_v05, build_maxp_v1,
    build_name, build_os2, build_post, HeadParams, HheaParams, NameStrings, Os2Params,
};

/// Seconds between 1904-01-01 (the sfnt epoch) and 1970-01-01.
pub const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

/// Error budget for cubic→quadratic conversion, em units.
const QUAD_TOLERANCE: f64 = 1.0;

// ============================================================================
// FontBuilder
// ============================================================================

pub struct FontBuilder<'a> {
    info: &'a FontInfo,
    metrics: &'a FontMetrics,
    /// Seconds since the 1904 epoch, for head.created/modified.
    timestamp: i64,
}

struct RosterEntry {
    /// `None` for `.notdef`.
    codepoint: Option<char>,
    advance: u16,
    paths: Vec<VectorPath>,
}

impl<'a> FontBuilder<'a> {
    pub fn new(info: &'a FontInfo, metrics: &'a FontMetrics) -> Self {
        let unix = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self {
            info,
            metrics,
            timestamp: unix + MAC_EPOCH_OFFSET,
        }
    }

    /// Pin the head timestamps (round-trip tests need determinism).
    pub fn with_timestamp(mut self, seconds_since_1904: i64) -> Self {
        self.timestamp = seconds_since_1904;
        self
    }

    /// Emit one font file in the requested container format.
    pub fn build(
        &self,
        glyphs: &[VectorGlyph],
        format: ExportFormat,
    ) -> Result<(Vec<u8>, Vec<Warning>)> {
        let roster = self.roster(glyphs)?;
        info!(
            "building {:?} with {} glyphs ({} kern pairs)",
            format,
            roster.len(),
            self.metrics.kerning.len()
        );
        match format {
            ExportFormat::Ttf => self.build_ttf(&roster),
            ExportFormat::Otf => self.build_otf(&roster),
        }
    }

    // ---------------------------------------------------------------
    // Roster
    // ---------------------------------------------------------------

    fn roster(&self, glyphs: &[VectorGlyph]) -> Result<Vec<RosterEntry>> {
        let em = self.metrics.units_per_em as f64;
        let by_label: BTreeMap<char, &VectorGlyph> = glyphs
            .iter()
            .filter(|g| g.label != ' ')
            .map(|g| (g.label, g))
            .collect();

        let mut roster = Vec::with_capacity(by_label.len() + 2);
        roster.push(RosterEntry {
            codepoint: None,
            advance: (em / 2.0) as u16,
            paths: self.notdef_outline(),
        });
        roster.push(RosterEntry {
            codepoint: Some(' '),
            advance: (em / 4.0) as u16,
            paths: Vec::new(),
        });
        for (&label, glyph) in &by_label {
            let advance = self
                .metrics
                .advance_widths
                .get(&label)
                .copied()
                .unwrap_or(em * 0.6);
            roster.push(RosterEntry {
                codepoint: Some(label),
                advance: advance.round().clamp(0.0, u16::MAX as f64) as u16,
                paths: glyph.paths.clone(),
            });
        }

        if roster.len() > u16::MAX as usize {
            return Err(Error::FontAssembly {
                table: "maxp",
                reason: format!("{} glyphs exceed the sfnt limit", roster.len()),
            });
        }
        Ok(roster)
    }

    /// `.notdef`: a rectangle with a rectangular hole, half an em wide and
    /// cap-height tall, stroke of max(W/10, 20) units.
    fn notdef_outline(&self) -> Vec<VectorPath> {
        let em = self.metrics.units_per_em as f64;
        let w = em / 2.0;
        let h = if self.metrics.cap_height > 0.0 {
            self.metrics.cap_height
        } else {
            em * 0.7
        };
        let t = (w / 10.0).max(20.0);

        let mut outer = VectorPath::new(false);
        outer.move_to(0.0, 0.0);
        outer.line_to(w, 0.0);
        outer.line_to(w, h);
        outer.line_to(0.0, h);
        outer.close_polygon();

        let mut inner = VectorPath::new(true);
        inner.move_to(t, t);
        inner.line_to(t, h - t);
        inner.line_to(w - t, h - t);
        inner.line_to(w - t, t);
        inner.close_polygon();

        vec![outer, inner]
    }

    fn cmap_entries(roster: &[RosterEntry]) -> BTreeMap<u32, u16> {
        let mut map = BTreeMap::new();
        for (gid, entry) in roster.iter().enumerate() {
            if let Some(c) = entry.codepoint {
                map.insert(c as u32, gid as u16);
            }
        }
        map
    }

    /// Kern pairs whose left and right glyphs both exist in the roster,
    /// resolved to glyph ids.
    fn kern_pairs(&self, roster: &[RosterEntry]) -> Vec<(u16, u16, i16)> {
        let gid_of: BTreeMap<char, u16> = roster
            .iter()
            .enumerate()
            .filter_map(|(gid, e)| e.codepoint.map(|c| (c, gid as u16)))
            .collect();
        self.metrics
            .kerning
            .iter()
            .filter_map(|(&(l, r), &v)| {
                Some((*gid_of.get(&l)?, *gid_of.get(&r)?, to_i16(v)))
            })
            .collect()
    }

    // ---------------------------------------------------------------
    // Shared tables
    // ---------------------------------------------------------------

    fn common_tables(
        &self,
        tables: &mut BTreeMap<Tag, Vec<u8>>,
        roster: &[RosterEntry],
        bbox: (i16, i16, i16, i16),
        index_to_loc_format: i16,
    ) {
        let m = self.metrics;
        let cmap = Self::cmap_entries(roster);

        let metrics_list: Vec<(u16, i16)> = roster.iter().map(|e| (e.advance, 0)).collect();
        let advance_width_max = metrics_list.iter().map(|&(a, _)| a).max().unwrap_or(0);
        let x_avg = metrics_list.iter().map(|&(a, _)| a as i32).sum::<i32>()
            / metrics_list.len().max(1) as i32;

        tables.insert(
            *b"head",
            build_head(&HeadParams {
                units_per_em: m.units_per_em,
                created: self.timestamp,
                modified: self.timestamp,
                x_min: bbox.0,
                y_min: bbox.1,
                x_max: bbox.2,
                y_max: bbox.3,
                index_to_loc_format,
            }),
        );
        tables.insert(
            *b"hhea",
            build_hhea(&HheaParams {
                ascent: to_i16(m.ascender),
                descent: to_i16(m.descender),
                line_gap: to_i16(m.line_gap),
                advance_width_max,
                min_left_side_bearing: bbox.0,
                min_right_side_bearing: 0,
                x_max_extent: bbox.2,
                number_of_h_metrics: metrics_list.len() as u16,
            }),
        );
        tables.insert(*b"hmtx", build_hmtx(&metrics_list));
        tables.insert(
            *b"OS/2",
            build_os2(&Os2Params {
                units_per_em: m.units_per_em,
                x_avg_char_width: x_avg as i16,
                typo_ascender: to_i16(m.ascender),
                typo_descender: to_i16(m.descender),
                typo_line_gap: to_i16(m.line_gap),
                win_ascent: to_i16(m.win_ascent()).max(0) as u16,
                win_descent: to_i16(m.win_descent()).max(0) as u16,
                x_height: to_i16(m.x_height),
                cap_height: to_i16(m.cap_height),
                first_char_index: cmap.keys().next().map(|&c| c.min(0xFFFF) as u16).unwrap_or(0x20),
                last_char_index: cmap.keys().last().map(|&c| c.min(0xFFFF) as u16).unwrap_or(0x20),
                has_kerning: !m.kerning.is_empty(),
            }),
        );
        tables.insert(*b"post", build_post(m.units_per_em));
        tables.insert(
            *b"name",
            build_name(&NameStrings {
                family: self.info.family_name.clone(),
                style: self.info.style_name.clone(),
                unique_id: self.info.unique_id(),
                full_name: self.info.full_name(),
                version: self.info.version_string(),
                postscript_name: self.info.postscript_name(),
            }),
        );
        tables.insert(*b"cmap", build_cmap(&cmap));

        let kern_pairs = self.kern_pairs(roster);
        if !kern_pairs.is_empty() {
            tables.insert(*b"kern", build_kern(&kern_pairs));
        }
    }

    // ---------------------------------------------------------------
    // TrueType
    // ---------------------------------------------------------------

    fn build_ttf(&self, roster: &[RosterEntry]) -> Result<(Vec<u8>, Vec<Warning>)> {
        let mut warnings = Vec::new();
        let mut built: Vec<BuiltGlyph> = Vec::with_capacity(roster.len());
        for entry in roster {
            let outline = outline_from_paths(&entry.paths, QUAD_TOLERANCE);
            if outline.fallback_count > 0 {
                let label = entry.codepoint.unwrap_or('\u{FFFD}');
                warn!("midpoint fallback on {} cubics of '{label}'", outline.fallback_count);
                warnings.push(Warning::CubicToQuadraticFailed(label));
            }
            built.push(build_glyph(&outline));
        }

        let bbox = (
            built.iter().filter(|g| !g.is_empty()).map(|g| g.x_min).min().unwrap_or(0),
            built.iter().filter(|g| !g.is_empty()).map(|g| g.y_min).min().unwrap_or(0),
            built.iter().filter(|g| !g.is_empty()).map(|g| g.x_max).max().unwrap_or(0),
            built.iter().filter(|g| !g.is_empty()).map(|g| g.y_max).max().unwrap_or(0),
        );
        let max_points = built.iter().map(|g| g.point_count).max().unwrap_or(0);
        let max_contours = built.iter().map(|g| g.contour_count).max().unwrap_or(0);
        let (glyf, loca) = assemble_glyf_loca(&built);

        let mut tables = BTreeMap::new();
        self.common_tables(&mut tables, roster, bbox, 1);
        tables.insert(
            *b"maxp",
            build_maxp_v1(roster.len() as u16, max_points, max_contours),
        );
        tables.insert(*b"glyf", glyf);
        tables.insert(*b"loca", loca);

        Ok((assemble(SFNT_TRUETYPE, &tables)?, warnings))
    }

    // ---------------------------------------------------------------
    // OpenType/CFF
    // ---------------------------------------------------------------

    fn build_otf(&self, roster: &[RosterEntry]) -> Result<(Vec<u8>, Vec<Warning>)> {
        let cff_glyphs: Vec<CffGlyph> = roster
            .iter()
            .map(|e| CffGlyph {
                codepoint: e.codepoint,
                advance: e.advance,
                paths: e.paths.clone(),
            })
            .collect();
        let cff = build_cff(
            &self.info.postscript_name(),
            &self.info.full_name(),
            &self.info.family_name,
            self.metrics.units_per_em,
            &cff_glyphs,
        )?;

        // Font bbox over the outline points.
        let mut bbox = (0i16, 0i16, 0i16, 0i16);
        let mut first = true;
        for entry in roster {
            for path in &entry.paths {
                if let Some(b) = path.bounds() {
                    let (x1, y1, x2, y2) = (to_i16(b.x1), to_i16(b.y1), to_i16(b.x2), to_i16(b.y2));
                    if first {
                        bbox = (x1, y1, x2, y2);
                        first = false;
                    } else {
                        bbox.0 = bbox.0.min(x1);
                        bbox.1 = bbox.1.min(y1);
                        bbox.2 = bbox.2.max(x2);
                        bbox.3 = bbox.3.max(y2);
                    }
                }
            }
        }

        let mut tables = BTreeMap::new();
        self.common_tables(&mut tables, roster, bbox, 0);
        tables.insert(*b"maxp", build_maxp_v05(roster.len() as u16));
        tables.insert(*b"CFF ", cff);

        Ok((assemble(SFNT_CFF, &tables)?, Vec::new()))
    }
}

// ============================================================================
// Tests
// ============================================================================
