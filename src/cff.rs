//! Compact Font Format (`CFF `) table construction: INDEX structures,
//! DICT operators, charset, and Type 2 charstrings.
//!
//! The layout is fixed — header, Name INDEX, Top DICT INDEX, String INDEX,
//! empty Global Subr INDEX, charset, CharStrings INDEX, Private DICT — with
//! offset operands written at a fixed width so a single relayout pass
//! resolves them.

use crate::basics::{iround, PointD};
use crate::error::{Error, Result};
use crate::path::{PathSegment, VectorPath};

// ============================================================================
// Primitives
// ============================================================================

/// INDEX: count, offSize, 1-based offsets, data.
fn build_index(items: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(items.len() as u16).to_be_bytes());
    if items.is_empty() {
        return out;
    }

    let data_len: usize = items.iter().map(|i| i.len()).sum();
    let off_size: u8 = if data_len + 1 < 0x100 {
        1
    } else if data_len + 1 < 0x1_0000 {
        2
    } else if data_len + 1 < 0x100_0000 {
        3
    } else {
        4
    };
    out.push(off_size);

    let mut offset = 1usize;
    let push_offset = |out: &mut Vec<u8>, v: usize| {
        let bytes = (v as u32).to_be_bytes();
        out.extend_from_slice(&bytes[4 - off_size as usize..]);
    };
    push_offset(&mut out, offset);
    for item in items {
        offset += item.len();
        push_offset(&mut out, offset);
    }
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

/// DICT operand (integer), shortest encoding.
fn dict_int(out: &mut Vec<u8>, v: i32) {
    if (-107..=107).contains(&v) {
        out.push((v + 139) as u8);
    } else if (108..=1131).contains(&v) {
        let v = v - 108;
        out.push((v >> 8) as u8 + 247);
        out.push((v & 0xFF) as u8);
    } else if (-1131..=-108).contains(&v) {
        let v = -v - 108;
        out.push((v >> 8) as u8 + 251);
        out.push((v & 0xFF) as u8);
    } else if (-32768..=32767).contains(&v) {
        out.push(28);
        out.extend_from_slice(&(v as i16).to_be_bytes());
    } else {
        out.push(29);
        out.extend_from_slice(&v.to_be_bytes());
    }
}

/// DICT operand (integer) at fixed 5-byte width, for offsets resolved by
/// relayout.
fn dict_int_fixed(out: &mut Vec<u8>, v: i32) {
    out.push(29);
    out.extend_from_slice(&v.to_be_bytes());
}

/// DICT real operand, nibble-encoded from its decimal rendering.
fn dict_real(out: &mut Vec<u8>, v: f64) {
    out.push(30);
    let text = format!("{v}");
    let mut nibbles: Vec<u8> = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '0'..='9' => nibbles.push(c as u8 - b'0'),
            '.' => nibbles.push(0xa),
            '-' => nibbles.push(0xe),
            'e' | 'E' => {
                if chars.peek() == Some(&'-') {
                    chars.next();
                    nibbles.push(0xc);
                } else {
                    nibbles.push(0xb);
                }
            }
            _ => {}
        }
    }
    nibbles.push(0xf);
    if nibbles.len() % 2 == 1 {
        nibbles.push(0xf);
    }
    for pair in nibbles.chunks(2) {
        out.push((pair[0] << 4) | pair[1]);
    }
}

/// Type 2 charstring operand.
fn cs_int(out: &mut Vec<u8>, v: i32) {
    if (-107..=107).contains(&v) {
        out.push((v + 139) as u8);
    } else if (108..=1131).contains(&v) {
        let v = v - 108;
        out.push((v >> 8) as u8 + 247);
        out.push((v & 0xFF) as u8);
    } else if (-1131..=-108).contains(&v) {
        let v = -v - 108;
        out.push((v >> 8) as u8 + 251);
        out.push((v & 0xFF) as u8);
    } else {
        out.push(28);
        out.extend_from_slice(&(v.clamp(-32768, 32767) as i16).to_be_bytes());
    }
}

// Charstring operators
const OP_RLINETO: u8 = 5;
const OP_RRCURVETO: u8 = 8;
const OP_ENDCHAR: u8 = 14;
const OP_RMOVETO: u8 = 21;

// ============================================================================
// Glyph naming
// ============================================================================

/// Charset SID for a glyph. Printable ASCII maps straight into the
/// standard-strings range (SID 1 = space ... 95 = asciitilde); everything
/// else becomes a custom `uniXXXX` string.
fn glyph_sid(c: char, custom: &mut Vec<Vec<u8>>) -> u16 {
    let cp = c as u32;
    if (0x20..=0x7E).contains(&cp) {
        (cp - 0x20 + 1) as u16
    } else {
        custom.push(format!("uni{cp:04X}").into_bytes());
        390 + custom.len() as u16
    }
}

fn custom_sid(text: &str, custom: &mut Vec<Vec<u8>>) -> u16 {
    custom.push(text.as_bytes().to_vec());
    390 + custom.len() as u16
}

// ============================================================================
// Charstrings
// ============================================================================

/// Compile one glyph's paths into a Type 2 charstring. Coordinates are
/// rounded to integers before the deltas are taken, so no error
/// accumulates along the contour.
fn charstring(advance: u16, paths: &[VectorPath]) -> Vec<u8> {
    let mut out = Vec::new();
    // nominalWidthX and defaultWidthX are both 0, so the width always
    // precedes the first operator.
    cs_int(&mut out, advance as i32);

    let round = |p: PointD| (iround(p.x), iround(p.y));
    let (mut cx, mut cy) = (0i32, 0i32);

    for path in paths {
        for seg in &path.segments {
            match *seg {
                PathSegment::MoveTo(p) => {
                    let (x, y) = round(p);
                    cs_int(&mut out, x - cx);
                    cs_int(&mut out, y - cy);
                    out.push(OP_RMOVETO);
                    (cx, cy) = (x, y);
                }
                PathSegment::LineTo(p) => {
                    let (x, y) = round(p);
                    cs_int(&mut out, x - cx);
                    cs_int(&mut out, y - cy);
                    out.push(OP_RLINETO);
                    (cx, cy) = (x, y);
                }
                PathSegment::Curve3(c, p) => {
                    // Exact degree elevation to a cubic
                    let c1 = PointD::new(
                        cx as f64 + 2.0 / 3.0 * (c.x - cx as f64),
                        cy as f64 + 2.0 / 3.0 * (c.y - cy as f64),
                    );
                    let c2 = PointD::new(
                        p.x + 2.0 / 3.0 * (c.x - p.x),
                        p.y + 2.0 / 3.0 * (c.y - p.y),
                    );
                    emit_curve(&mut out, &mut cx, &mut cy, c1, c2, p);
                }
                PathSegment::Curve4(c1, c2, p) => {
                    emit_curve(&mut out, &mut cx, &mut cy, c1, c2, p);
                }
                PathSegment::Close => {} // Type 2 contours close implicitly
            }
        }
    }
    out.push(OP_ENDCHAR);
    out
}

fn emit_curve(out: &mut Vec<u8>, cx: &mut i32, cy: &mut i32, c1: PointD, c2: PointD, p: PointD) {
    let (x1, y1) = (iround(c1.x), iround(c1.y));
    let (x2, y2) = (iround(c2.x), iround(c2.y));
    let (x3, y3) = (iround(p.x), iround(p.y));
    cs_int(out, x1 - *cx);
    cs_int(out, y1 - *cy);
    cs_int(out, x2 - x1);
    cs_int(out, y2 - y1);
    cs_int(out, x3 - x2);
    cs_int(out, y3 - y2);
    out.push(OP_RRCURVETO);
    (*cx, *cy) = (x3, y3);
}

// ============================================================================
// Table assembly
// ============================================================================

/// One roster entry for the CFF compiler. Glyph 0 must be `.notdef`.
pub struct CffGlyph {
    /// `None` for `.notdef`; `Some(' ')` for space.
    pub codepoint: Option<char>,
    pub advance: u16,
    pub paths: Vec<VectorPath>,
}

/// Compile the complete `CFF ` table.
pub fn build_cff(
    ps_name: &str,
    full_name: &str,
    family_name: &str,
    units_per_em: u16,
    glyphs: &[CffGlyph],
) -> Result<Vec<u8>> {
    if glyphs.is_empty() || glyphs[0].codepoint.is_some() {
        return Err(Error::FontAssembly {
            table: "CFF ",
            reason: "glyph 0 must be .notdef".into(),
        });
    }

    let mut custom_strings: Vec<Vec<u8>> = Vec::new();
    let full_name_sid = custom_sid(full_name, &mut custom_strings);
    let family_name_sid = custom_sid(family_name, &mut custom_strings);

    // charset (format 0): SIDs for glyphs 1..n
    let mut charset = vec![0u8]; // format
    for g in &glyphs[1..] {
        let sid = match g.codepoint {
            Some(c) => glyph_sid(c, &mut custom_strings),
            None => 0,
        };
        charset.extend_from_slice(&sid.to_be_bytes());
    }

    let charstrings: Vec<Vec<u8>> = glyphs
        .iter()
        .map(|g| charstring(g.advance, &g.paths))
        .collect();
    let charstrings_index = build_index(&charstrings);

    // Private DICT: defaultWidthX = 0, nominalWidthX = 0
    let mut private_dict = Vec::new();
    dict_int(&mut private_dict, 0);
    private_dict.push(20);
    dict_int(&mut private_dict, 0);
    private_dict.push(21);

    let name_index = build_index(&[ps_name.as_bytes().to_vec()]);
    let string_index = build_index(&custom_strings);
    let gsubr_index = build_index(&[]);

    // Top DICT with offsets at fixed width; built twice, identical sizes.
    let top_dict = |charset_off: i32, charstrings_off: i32, private_off: i32| -> Vec<u8> {
        let mut d = Vec::new();
        dict_int(&mut d, full_name_sid as i32);
        d.push(2); // FullName
        dict_int(&mut d, family_name_sid as i32);
        d.push(3); // FamilyName
        if units_per_em != 1000 {
            let s = 1.0 / units_per_em as f64;
            for &v in &[s, 0.0, 0.0, s, 0.0, 0.0] {
                dict_real(&mut d, v);
            }
            d.extend_from_slice(&[12, 7]); // FontMatrix
        }
        dict_int_fixed(&mut d, charset_off);
        d.push(15); // charset
        dict_int_fixed(&mut d, charstrings_off);
        d.push(17); // CharStrings
        dict_int(&mut d, private_dict.len() as i32);
        dict_int_fixed(&mut d, private_off);
        d.push(18); // Private
        d
    };

    let header: [u8; 4] = [1, 0, 4, 4];
    let top_dict_len = top_dict(0, 0, 0).len();
    let top_index_len = build_index(&[vec![0u8; top_dict_len]]).len();

    let charset_off =
        header.len() + name_index.len() + top_index_len + string_index.len() + gsubr_index.len();
    let charstrings_off = charset_off + charset.len();
    let private_off = charstrings_off + charstrings_index.len();

    let top = top_dict(
        charset_off as i32,
        charstrings_off as i32,
        private_off as i32,
    );
    debug_assert_eq!(top.len(), top_dict_len);
    let top_index = build_index(&[top]);

    let mut out = Vec::new();
    out.extend_from_slice(&header);
    out.extend_from_slice(&name_index);
    out.extend_from_slice(&top_index);
    out.extend_from_slice(&string_index);
    out.extend_from_slice(&gsubr_index);
    out.extend_from_slice(&charset);
    out.extend_from_slice(&charstrings_index);
    out.extend_from_slice(&private_dict);
    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================
