//! Serialization of the fixed-layout font tables: `head`, `hhea`, `hmtx`,
//! `maxp`, `OS/2`, `post`, `name`, `cmap` (format 4) and `kern` (format 0).
//!
//! Each builder returns the raw big-endian table bytes; the sfnt module
//! handles directory, padding and checksums.

use std::collections::BTreeMap;

use crate::sfnt::{search_header, ByteWriter};

// ============================================================================
// head
// ============================================================================

pub struct HeadParams {
    pub units_per_em: u16,
    /// Seconds since 1904-01-01T00:00:00Z.
    pub created: i64,
    pub modified: i64,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
    /// 0 = short loca, 1 = long loca.
    pub index_to_loc_format: i16,
}

pub fn build_head(p: &HeadParams) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.u32(0x0001_0000); // version
    w.u32(0x0001_0000); // fontRevision 1.0
    w.u32(0); // checkSumAdjustment, patched at assembly
    w.u32(0x5F0F_3CF5); // magicNumber
    w.u16(0x0003); // flags: baseline at y=0, lsb at x=0
    w.u16(p.units_per_em);
    w.i64(p.created);
    w.i64(p.modified);
    w.i16(p.x_min);
    w.i16(p.y_min);
    w.i16(p.x_max);
    w.i16(p.y_max);
    w.u16(0); // macStyle
    w.u16(6); // lowestRecPPEM
    w.i16(2); // fontDirectionHint
    w.i16(p.index_to_loc_format);
    w.i16(0); // glyphDataFormat
    w.into_inner()
}

// ============================================================================
// hhea / hmtx
// ============================================================================

pub struct HheaParams {
    pub ascent: i16,
    pub descent: i16,
    pub line_gap: i16,
    pub advance_width_max: u16,
    pub min_left_side_bearing: i16,
    pub min_right_side_bearing: i16,
    pub x_max_extent: i16,
    pub number_of_h_metrics: u16,
}

pub fn build_hhea(p: &HheaParams) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.u32(0x0001_0000);
    w.i16(p.ascent);
    w.i16(p.descent);
    w.i16(p.line_gap);
    w.u16(p.advance_width_max);
    w.i16(p.min_left_side_bearing);
    w.i16(p.min_right_side_bearing);
    w.i16(p.x_max_extent);
    w.i16(1); // caretSlopeRise
    w.i16(0); // caretSlopeRun
    w.i16(0); // caretOffset
    for _ in 0..4 {
        w.i16(0); // reserved
    }
    w.i16(0); // metricDataFormat
    w.u16(p.number_of_h_metrics);
    w.into_inner()
}

/// All metrics long (advance, lsb).
pub fn build_hmtx(metrics: &[(u16, i16)]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    for &(advance, lsb) in metrics {
        w.u16(advance);
        w.i16(lsb);
    }
    w.into_inner()
}

// ============================================================================
// maxp
// ============================================================================

/// Version 1.0 for `glyf` fonts.
pub fn build_maxp_v1(num_glyphs: u16, max_points: u16, max_contours: u16) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.u32(0x0001_0000);
    w.u16(num_glyphs);
    w.u16(max_points);
    w.u16(max_contours);
    w.u16(0); // maxCompositePoints
    w.u16(0); // maxCompositeContours
    w.u16(2); // maxZones
    w.u16(0); // maxTwilightPoints
    w.u16(0); // maxStorage
    w.u16(0); // maxFunctionDefs
    w.u16(0); // maxInstructionDefs
    w.u16(0); // maxStackElements
    w.u16(0); // maxSizeOfInstructions
    w.u16(0); // maxComponentElements
    w.u16(0); // maxComponentDepth
    w.into_inner()
}

/// Version 0.5 for CFF fonts.
pub fn build_maxp_v05(num_glyphs: u16) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.u32(0x0000_5000);
    w.u16(num_glyphs);
    w.into_inner()
}

// ============================================================================
// OS/2
// ============================================================================

pub struct Os2Params {
    pub units_per_em: u16,
    pub x_avg_char_width: i16,
    pub typo_ascender: i16,
    pub typo_descender: i16,
    pub typo_line_gap: i16,
    pub win_ascent: u16,
    pub win_descent: u16,
    pub x_height: i16,
    pub cap_height: i16,
    pub first_char_index: u16,
    pub last_char_index: u16,
    pub has_kerning: bool,
}

pub fn build_os2(p: &Os2Params) -> Vec<u8> {
    let em = p.units_per_em as i32;
    let scaled = |v: i32| -> i16 { (v * em / 1000) as i16 };

    let mut w = ByteWriter::new();
    w.u16(4); // version
    w.i16(p.x_avg_char_width);
    w.u16(400); // usWeightClass: regular
    w.u16(5); // usWidthClass: medium
    w.u16(0); // fsType: installable
    w.i16(scaled(650)); // ySubscriptXSize
    w.i16(scaled(600)); // ySubscriptYSize
    w.i16(0); // ySubscriptXOffset
    w.i16(scaled(75)); // ySubscriptYOffset
    w.i16(scaled(650)); // ySuperscriptXSize
    w.i16(scaled(600)); // ySuperscriptYSize
    w.i16(0); // ySuperscriptXOffset
    w.i16(scaled(350)); // ySuperscriptYOffset
    w.i16(scaled(50)); // yStrikeoutSize
    w.i16(scaled(300)); // yStrikeoutPosition
    w.i16(0); // sFamilyClass
    w.bytes(&[0u8; 10]); // panose: any
    w.u32(0x0000_0001); // ulUnicodeRange1: Basic Latin
    w.u32(0);
    w.u32(0);
    w.u32(0);
    w.bytes(b"NONE"); // achVendID
    w.u16(0x0040); // fsSelection: REGULAR
    w.u16(p.first_char_index);
    w.u16(p.last_char_index);
    w.i16(p.typo_ascender);
    w.i16(p.typo_descender);
    w.i16(p.typo_line_gap);
    w.u16(p.win_ascent);
    w.u16(p.win_descent);
    w.u32(0x0000_0001); // ulCodePageRange1: Latin 1
    w.u32(0);
    w.i16(p.x_height);
    w.i16(p.cap_height);
    w.u16(0); // usDefaultChar
    w.u16(32); // usBreakChar
    w.u16(if p.has_kerning { 2 } else { 1 }); // usMaxContext
    w.into_inner()
}

// ============================================================================
// post
// ============================================================================

/// Version 3.0: no glyph name array.
pub fn build_post(units_per_em: u16) -> Vec<u8> {
    let em = units_per_em as i32;
    let mut w = ByteWriter::new();
    w.u32(0x0003_0000);
    w.u32(0); // italicAngle
    w.i16((-75 * em / 1000) as i16); // underlinePosition
    w.i16((50 * em / 1000) as i16); // underlineThickness
    w.u32(0); // isFixedPitch
    w.u32(0); // minMemType42
    w.u32(0); // maxMemType42
    w.u32(0); // minMemType1
    w.u32(0); // maxMemType1
    w.into_inner()
}

// ============================================================================
// name
// ============================================================================

/// Name IDs 1-6 in both Macintosh (1,0, English) and Windows
/// (3,1, en-US) encodings.
pub struct NameStrings {
    pub family: String,
    pub style: String,
    pub unique_id: String,
    pub full_name: String,
    pub version: String,
    pub postscript_name: String,
}

pub fn build_name(s: &NameStrings) -> Vec<u8> {
    let entries: [(u16, &str); 6] = [
        (1, &s.family),
        (2, &s.style),
        (3, &s.unique_id),
        (4, &s.full_name),
        (5, &s.version),
        (6, &s.postscript_name),
    ];

    // (platform, encoding, language, nameID, bytes)
    let mut records: Vec<(u16, u16, u16, u16, Vec<u8>)> = Vec::with_capacity(12);
    for &(id, text) in &entries {
        let mac: Vec<u8> = text.chars().map(|c| if c.is_ascii() { c as u8 } else { b'?' }).collect();
        records.push((1, 0, 0, id, mac));
        let win: Vec<u8> = text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
        records.push((3, 1, 0x0409, id, win));
    }
    records.sort_by_key(|r| (r.0, r.1, r.2, r.3));

    let mut w = ByteWriter::new();
    w.u16(0); // format
    w.u16(records.len() as u16);
    w.u16(6 + 12 * records.len() as u16); // stringOffset

    let mut string_data = Vec::new();
    for (platform, encoding, language, id, bytes) in &records {
        w.u16(*platform);
        w.u16(*encoding);
        w.u16(*language);
        w.u16(*id);
        w.u16(bytes.len() as u16);
        w.u16(string_data.len() as u16);
        string_data.extend_from_slice(bytes);
    }
    w.bytes(&string_data);
    w.into_inner()
}

// ============================================================================
// cmap (format 4)
// ============================================================================

/// Format-4 subtable behind (0,3) and (3,1) encoding records.
/// `map` is codepoint → glyph id; codepoints must be in the BMP.
pub fn build_cmap(map: &BTreeMap<u32, u16>) -> Vec<u8> {
    // Segments: maximal runs where codepoints and glyph ids both advance
    // by one, so a single idDelta covers the whole run.
    let mut segments: Vec<(u16, u16, u16)> = Vec::new(); // (start, end, start_gid)
    for (&code, &gid) in map {
        debug_assert!(code <= 0xFFFD);
        let code = code as u16;
        if let Some((start, end, start_gid)) = segments.last_mut() {
            if code == *end + 1 && gid as u32 == *start_gid as u32 + (code - *start) as u32 {
                *end = code;
                continue;
            }
        }
        segments.push((code, code, gid));
    }

    let seg_count = segments.len() + 1; // plus the 0xFFFF terminator
    let (search_range, entry_selector, range_shift) = search_header(seg_count, 2);

    let mut sub = ByteWriter::new();
    sub.u16(4); // format
    let length = 16 + 8 * seg_count;
    sub.u16(length as u16);
    sub.u16(0); // language
    sub.u16(seg_count as u16 * 2);
    sub.u16(search_range);
    sub.u16(entry_selector);
    sub.u16(range_shift);

    for &(_, end, _) in &segments {
        sub.u16(end);
    }
    sub.u16(0xFFFF);
    sub.u16(0); // reservedPad
    for &(start, _, _) in &segments {
        sub.u16(start);
    }
    sub.u16(0xFFFF);
    for &(start, _, start_gid) in &segments {
        sub.u16((start_gid as i32 - start as i32) as u16);
    }
    sub.u16(1); // terminator idDelta: 0xFFFF + 1 = 0 (.notdef)
    for _ in 0..seg_count {
        sub.u16(0); // idRangeOffset
    }
    let subtable = sub.into_inner();

    let mut w = ByteWriter::new();
    w.u16(0); // version
    w.u16(2); // numTables
    let offset = 4 + 8 * 2u32;
    w.u16(0); // platform: Unicode
    w.u16(3); // encoding: BMP
    w.u32(offset);
    w.u16(3); // platform: Windows
    w.u16(1); // encoding: Unicode BMP
    w.u32(offset);
    w.bytes(&subtable);
    w.into_inner()
}

/// Resolve a codepoint through a format-4 subtable built by [`build_cmap`].
/// Test aid for round-trip checks.
pub fn cmap_lookup(table: &[u8], code: u16) -> Option<u16> {
    let sub = &table[20..];
    let seg_count = (u16::from_be_bytes([sub[6], sub[7]]) / 2) as usize;
    let ends = 14;
    let starts = ends + seg_count * 2 + 2;
    let deltas = starts + seg_count * 2;
    for i in 0..seg_count {
        let end = u16::from_be_bytes([sub[ends + i * 2], sub[ends + i * 2 + 1]]);
        if code <= end {
            let start = u16::from_be_bytes([sub[starts + i * 2], sub[starts + i * 2 + 1]]);
            if code < start {
                return None;
            }
            let delta = u16::from_be_bytes([sub[deltas + i * 2], sub[deltas + i * 2 + 1]]);
            let gid = code.wrapping_add(delta);
            return if gid == 0 { None } else { Some(gid) };
        }
    }
    None
}

// ============================================================================
// kern (format 0)
// ============================================================================

/// One horizontal format-0 subtable. Pairs are (left gid, right gid, value)
/// and get sorted by the combined key as the format requires.
pub fn build_kern(pairs: &[(u16, u16, i16)]) -> Vec<u8> {
    let mut sorted: Vec<&(u16, u16, i16)> = pairs.iter().collect();
    sorted.sort_by_key(|&&(l, r, _)| ((l as u32) << 16) | r as u32);

    let n = sorted.len();
    let (search_range, entry_selector, range_shift) = search_header(n, 6);

    let mut w = ByteWriter::new();
    w.u16(0); // table version
    w.u16(1); // nTables
    // Subtable header
    w.u16(0); // subtable version
    w.u16((14 + 6 * n) as u16); // length
    w.u16(0x0001); // coverage: horizontal
    w.u16(n as u16);
    w.u16(search_range);
    w.u16(entry_selector);
    w.u16(range_shift);
    for &&(l, r, v) in &sorted {
        w.u16(l);
        w.u16(r);
        w.i16(v);
    }
    w.into_inner()
}

// ============================================================================
// Tests
// ============================================================================
