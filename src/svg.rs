//! SVG preview font.
//!
//! SVG fonts are long deprecated, but a single self-contained XML document
//! is still the quickest way to eyeball a traced alphabet before committing
//! to a binary build. Not part of the export pipeline.

use crate::path::VectorGlyph;

/// Render the glyph list as an SVG font document.
pub fn glyphs_to_svg_font(glyphs: &[VectorGlyph], font_name: &str, units_per_em: u16) -> String {
    let mut glyph_defs = String::new();
    for glyph in glyphs {
        let d: Vec<String> = glyph.paths.iter().map(|p| p.to_svg_d()).collect();
        let unicode = glyph.label as u32;
        glyph_defs.push_str(&format!(
            "      <glyph unicode=\"&#x{unicode:04X};\" glyph-name=\"{}\" horiz-adv-x=\"{:.0}\" d=\"{}\"/>\n",
            xml_escape(&glyph.label.to_string()),
            glyph.advance_width,
            d.join(" "),
        ));
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <svg xmlns=\"http://www.w3.org/2000/svg\">\n\
         \x20 <defs>\n\
         \x20   <font id=\"{name}\" horiz-adv-x=\"{em}\">\n\
         \x20     <font-face font-family=\"{name}\" units-per-em=\"{em}\"/>\n\
         \x20     <missing-glyph horiz-adv-x=\"{missing}\"/>\n\
         {glyph_defs}\
         \x20   </font>\n\
         \x20 </defs>\n\
         </svg>\n",
        name = xml_escape(font_name),
        em = units_per_em,
        missing = units_per_em / 2,
    )
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::VectorPath;

    #[test]
    fn test_svg_font_document() {
        let mut p = VectorPath::new(false);
        p.move_to(0.0, 0.0);
        p.line_to(100.0, 0.0);
        p.line_to(100.0, 100.0);
        p.close_polygon();
        let glyph = VectorGlyph {
            label: 'A',
            paths: vec![p],
            width: 100.0,
            height: 100.0,
            advance_width: 120.0,
        };

        let svg = glyphs_to_svg_font(&[glyph], "Sample", 1000);
        assert!(svg.contains("units-per-em=\"1000\""));
        assert!(svg.contains("unicode=\"&#x0041;\""));
        assert!(svg.contains("horiz-adv-x=\"120\""));
        assert!(svg.contains("<missing-glyph horiz-adv-x=\"500\"/>"));
        assert!(svg.contains("M 0.00,0.00"));
    }

    #[test]
    fn test_xml_escaping() {
        let glyph = VectorGlyph::empty('<', 10.0, 10.0);
        let svg = glyphs_to_svg_font(&[glyph], "A&B", 1000);
        assert!(svg.contains("font id=\"A&amp;B\""));
        assert!(svg.contains("glyph-name=\"&lt;\""));
    }
}
