//! Glyph segmentation (pipeline stage C3).
//!
//! Carves a binarized alphabet sheet into glyph cells. Three methods:
//!
//! - **Contour**: connected components over the whole image, assigned to
//!   rows, with multi-part glyph merging (i/j dots, quotes, %) and
//!   touching-glyph splitting. Preferred for free handwriting.
//! - **RowColumn**: row bands first, vertical projection columns inside
//!   each row, then the same merge passes. Preferred for deliberate grids
//!   of glyphs.
//! - **Grid**: uniform cells, for strictly regular sheets.
//!
//! `Auto` picks between grid and contour from the component layout.

use log::{debug, info};

use crate::basics::{unite_rectangles, PointD, RectI};
use crate::config::{GeneratorConfig, SegmentationMethod};
use crate::contour::{find_external_contours, Contour};
use crate::error::Warning;
use crate::math::{convex_hull, mean, median, polygon_area};
use crate::oracle::{GlyphOracle, SplitRequest};
use crate::raster::{BinaryImage, RasterImage};
use crate::row_detector::{RowDetector, TextRow};

// ============================================================================
// GlyphCell
// ============================================================================

/// One segmented glyph: its place on the sheet and its cropped raster.
#[derive(Debug, Clone)]
pub struct GlyphCell {
    /// Character label; `'?'` until the labeler runs.
    pub label: char,
    /// Bounding box in source image coordinates (without the crop pad).
    pub bbox: RectI,
    /// Tight crop of the source raster (bbox plus a small pad).
    pub image: RasterImage,
    /// Row index, top to bottom.
    pub row: usize,
    /// Position within the row, left to right.
    pub col: usize,
    /// Labeling confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Segmentation result: cells in reading order plus bookkeeping.
#[derive(Debug)]
pub struct SegmentationOutcome {
    pub cells: Vec<GlyphCell>,
    /// The method actually used (Auto resolves to Grid or Contour).
    pub method: SegmentationMethod,
    pub grid: Option<(u32, u32)>,
    pub warnings: Vec<Warning>,
}

// ============================================================================
// Working component
// ============================================================================

/// A candidate glyph box during merging. `contour` indexes the traced
/// contour that best represents the box (the largest one after merging);
/// boxes created by splitting have none.
#[derive(Debug, Clone, Copy)]
struct Component {
    bbox: RectI,
    contour: Option<usize>,
    row: usize,
}

impl Component {
    #[inline]
    fn w(&self) -> f64 {
        self.bbox.width() as f64
    }

    #[inline]
    fn h(&self) -> f64 {
        self.bbox.height() as f64
    }
}

// ============================================================================
// Segmenter
// ============================================================================

pub struct Segmenter<'a> {
    config: &'a GeneratorConfig,
    oracle: Option<&'a dyn GlyphOracle>,
}

impl<'a> Segmenter<'a> {
    pub fn new(config: &'a GeneratorConfig, oracle: Option<&'a dyn GlyphOracle>) -> Self {
        Self { config, oracle }
    }

    fn expected_len(&self) -> usize {
        self.config
            .expected_chars
            .as_ref()
            .map(|s| s.chars().count())
            .unwrap_or(26)
    }

    /// Segment the sheet. `rows` comes from the row detector and is only
    /// required by the contour and row-column methods.
    pub fn segment(
        &self,
        raster: &RasterImage,
        binary: &BinaryImage,
        rows: &[TextRow],
    ) -> SegmentationOutcome {
        let method = match self.config.segmentation_method {
            SegmentationMethod::Auto => self.auto_select(binary),
            m => m,
        };
        info!("segmenting with method {method:?}");

        match method {
            SegmentationMethod::Grid => self.segment_grid(raster, binary),
            SegmentationMethod::RowColumn => self.segment_row_column(raster, binary, rows),
            _ => self.segment_contour(raster, binary, rows),
        }
    }

    /// Pick grid vs. contour: explicit grid dimensions force grid; too few
    /// size-qualified components force grid; compact row layouts covering
    /// most of the alphabet go to contour.
    fn auto_select(&self, binary: &BinaryImage) -> SegmentationMethod {
        if self.config.grid_rows.is_some() && self.config.grid_cols.is_some() {
            return SegmentationMethod::Grid;
        }

        let min = self.config.min_char_size as i32;
        let qualified: Vec<RectI> = find_external_contours(binary)
            .iter()
            .filter(|c| c.bbox.width() >= min && c.bbox.height() >= min)
            .map(|c| c.bbox)
            .collect();

        if qualified.len() < 5 {
            return SegmentationMethod::Grid;
        }

        // Cluster into rows by top edge; a compact sheet (few rows, most of
        // the alphabet present) reads best as free-form contours.
        let avg_height = mean(&qualified.iter().map(|b| b.height() as f64).collect::<Vec<_>>());
        let mut tops: Vec<i32> = qualified.iter().map(|b| b.y1).collect();
        tops.sort_unstable();
        let mut row_count = 1;
        let mut current = tops[0];
        for &t in &tops[1..] {
            if (t - current) as f64 >= avg_height * 0.5 {
                row_count += 1;
                current = t;
            }
        }

        if row_count <= 6 && qualified.len() as f64 >= self.expected_len() as f64 * 0.8 {
            SegmentationMethod::Contour
        } else {
            SegmentationMethod::Grid
        }
    }

    // ========================================================================
    // Contour method
    // ========================================================================

    fn segment_contour(
        &self,
        raster: &RasterImage,
        binary: &BinaryImage,
        rows: &[TextRow],
    ) -> SegmentationOutcome {
        let mut warnings = Vec::new();
        let contours = find_external_contours(binary);

        // Stage 1: noise filter and size classes.
        let min_dot = if self.config.include_small_glyphs {
            self.config.min_small_glyph_size as i32
        } else {
            5
        };
        let mut components = Vec::new();
        for (idx, c) in contours.iter().enumerate() {
            let (w, h) = (c.bbox.width(), c.bbox.height());
            if w * h < 9 || (w < min_dot && h < min_dot) {
                continue;
            }
            components.push(Component {
                bbox: c.bbox,
                contour: Some(idx),
                row: 0,
            });
        }
        info!("{} components after noise filter", components.len());

        // Stage 2: row assignment.
        for comp in &mut components {
            comp.row = assign_row(comp.bbox, rows);
        }

        // Stage 3: intra-row merges.
        let mut merged = Vec::new();
        for row_idx in 0..rows.len() {
            let mut row_boxes: Vec<Component> = components
                .iter()
                .copied()
                .filter(|c| c.row == row_idx)
                .collect();
            row_boxes.sort_by_key(|c| c.bbox.x1);
            let row_boxes = merge_adjacent_narrow(row_boxes, &contours);
            let row_boxes = merge_vertically_stacked(row_boxes, &contours);
            let row_boxes = merge_diagonal(row_boxes, &contours);
            merged.extend(row_boxes);
        }

        // Stage 4: wide-box splitting.
        let widths: Vec<f64> = merged.iter().map(|c| c.w()).collect();
        let median_width = median(&widths);
        let mut split = Vec::with_capacity(merged.len());
        for comp in merged {
            if median_width > 0.0 && comp.w() > median_width * 1.8 {
                split.extend(self.split_wide(comp, raster, binary, median_width));
            } else {
                split.push(comp);
            }
        }

        // Stage 5: orphan classification.
        let min_char = self.config.min_char_size as i32;
        let (mains, orphans): (Vec<Component>, Vec<Component>) = split
            .into_iter()
            .partition(|c| c.bbox.width() >= min_char && c.bbox.height() >= min_char);

        let mut kept = mains;
        if self.config.include_small_glyphs {
            let mut punct = 0usize;
            for orphan in &orphans {
                if let Some(ci) = orphan.contour {
                    if self.is_likely_punctuation(&contours[ci]) {
                        kept.push(*orphan);
                        punct += 1;
                    }
                }
            }
            info!(
                "{} main glyphs + {punct} punctuation kept of {} orphans",
                kept.len() - punct,
                orphans.len()
            );
        } else if !orphans.is_empty() {
            info!("{} small orphan components discarded", orphans.len());
            warnings.push(Warning::OrphansDiscarded(orphans.len()));
        }

        let cells = self.extract_cells(kept, raster);
        SegmentationOutcome {
            cells,
            method: SegmentationMethod::Contour,
            grid: None,
            warnings,
        }
    }

    /// Split a too-wide box. The oracle, when present, may override the
    /// projection analysis; a transport failure silently falls back.
    fn split_wide(
        &self,
        comp: Component,
        raster: &RasterImage,
        binary: &BinaryImage,
        median_width: f64,
    ) -> Vec<Component> {
        let bbox = comp.bbox;

        let splits = self
            .oracle
            .and_then(|oracle| {
                let region = raster.crop(bbox)?;
                let req = SplitRequest {
                    region: &region,
                    expected_width_px: median_width as u32,
                };
                match oracle.analyze_region_for_split(&req) {
                    Ok(resp) if resp.count <= 1 || resp.splits.is_empty() => Some(Vec::new()),
                    Ok(resp) => Some(
                        resp.splits
                            .iter()
                            .filter(|r| (0.0..1.0).contains(*r))
                            .map(|r| (r * bbox.width() as f64) as i32)
                            .collect(),
                    ),
                    Err(e) => {
                        debug!("oracle split analysis failed: {e}");
                        None
                    }
                }
            })
            .unwrap_or_else(|| find_split_points(binary, bbox, median_width));

        if splits.is_empty() {
            return vec![comp];
        }
        debug!("splitting wide box at x={} into {} parts", bbox.x1, splits.len() + 1);

        let mut boundaries = vec![0i32];
        boundaries.extend(splits);
        boundaries.push(bbox.width());
        let mut out = Vec::new();
        for pair in boundaries.windows(2) {
            let w = pair[1] - pair[0];
            if w < 3 {
                continue;
            }
            out.push(Component {
                bbox: RectI::new(bbox.x1 + pair[0], bbox.y1, bbox.x1 + pair[1] - 1, bbox.y2),
                contour: None,
                row: comp.row,
            });
        }
        if out.is_empty() {
            vec![comp]
        } else {
            out
        }
    }

    /// Shape filter separating punctuation from scanner noise.
    fn is_likely_punctuation(&self, contour: &Contour) -> bool {
        let w = contour.bbox.width();
        let h = contour.bbox.height();
        let min = self.config.min_small_glyph_size as i32;
        if w < min || h < min {
            return false;
        }

        let points: Vec<PointD> = contour.points.iter().map(|&p| p.into()).collect();
        let hull_area = polygon_area(&convex_hull(&points));
        if hull_area == 0.0 {
            return false;
        }
        let solidity = contour.area / hull_area;
        if solidity < 0.35 {
            debug!("orphan rejected: solidity {solidity:.2}");
            return false;
        }

        let aspect = w.max(h) as f64 / w.min(h).max(1) as f64;
        let substantial = w >= 30 || h >= 30;
        if aspect > 8.0 && !substantial {
            debug!("orphan rejected: aspect {aspect:.1} and small");
            return false;
        }
        if aspect > 20.0 {
            debug!("orphan rejected: aspect {aspect:.1}");
            return false;
        }

        let extent = contour.area / (w as f64 * h as f64);
        if extent < 0.15 {
            debug!("orphan rejected: extent {extent:.2}");
            return false;
        }

        let n = contour.point_count();
        if !(4..=500).contains(&n) {
            debug!("orphan rejected: {n} contour points");
            return false;
        }
        true
    }

    // ========================================================================
    // Row-column method
    // ========================================================================

    fn segment_row_column(
        &self,
        raster: &RasterImage,
        binary: &BinaryImage,
        rows: &[TextRow],
    ) -> SegmentationOutcome {
        let detector = RowDetector::default();
        let contours = Vec::new(); // merges run without contour representatives

        let mut boxes = Vec::new();
        for (row_idx, row) in rows.iter().enumerate() {
            let columns = detector.segment_columns(binary, row, 5, 0.03);
            let mut row_boxes = Vec::new();
            for col in columns {
                let region = RectI::new(
                    col.x as i32,
                    row.y as i32,
                    (col.x + col.width) as i32 - 1,
                    row.bottom() as i32 - 1,
                );
                if let Some(tight) = tight_ink_bbox(binary, region) {
                    row_boxes.push(Component {
                        bbox: tight,
                        contour: None,
                        row: row_idx,
                    });
                }
            }
            row_boxes.sort_by_key(|c| c.bbox.x1);
            let row_boxes = merge_adjacent_narrow(row_boxes, &contours);
            let row_boxes = merge_vertically_stacked(row_boxes, &contours);
            let row_boxes = merge_diagonal(row_boxes, &contours);
            debug!("row {row_idx}: {} glyph boxes", row_boxes.len());
            boxes.extend(row_boxes);
        }

        let cells = self.extract_cells(boxes, raster);
        SegmentationOutcome {
            cells,
            method: SegmentationMethod::RowColumn,
            grid: None,
            warnings: Vec::new(),
        }
    }

    // ========================================================================
    // Grid method
    // ========================================================================

    fn segment_grid(&self, raster: &RasterImage, binary: &BinaryImage) -> SegmentationOutcome {
        let mut warnings = Vec::new();
        let expected = self.expected_len();
        let (grid_rows, grid_cols) = match (self.config.grid_rows, self.config.grid_cols) {
            (Some(r), Some(c)) if r > 0 && c > 0 => (r, c),
            _ => detect_grid_size(binary, expected),
        };
        info!("grid {grid_rows} rows x {grid_cols} cols");

        let cell_w = binary.width() / grid_cols;
        let cell_h = binary.height() / grid_rows;
        let mut cells = Vec::new();
        let mut index = 0usize;

        'outer: for row in 0..grid_rows {
            for col in 0..grid_cols {
                if index >= expected {
                    break 'outer;
                }
                index += 1;
                let region = RectI::new(
                    (col * cell_w) as i32,
                    (row * cell_h) as i32,
                    ((col + 1) * cell_w) as i32 - 1,
                    ((row + 1) * cell_h) as i32 - 1,
                );
                let Some(tight) = tight_ink_bbox(binary, region) else {
                    warnings.push(Warning::EmptyGridCell {
                        row: row as usize,
                        col: col as usize,
                    });
                    continue;
                };
                let padded = pad_clipped(tight, self.config.padding as i32, raster);
                if let Some(image) = raster.crop(padded) {
                    cells.push(GlyphCell {
                        label: '?',
                        bbox: tight,
                        image,
                        row: row as usize,
                        col: col as usize,
                        confidence: 1.0,
                    });
                }
            }
        }

        SegmentationOutcome {
            cells,
            method: SegmentationMethod::Grid,
            grid: Some((grid_rows, grid_cols)),
            warnings,
        }
    }

    // ========================================================================
    // Cell extraction
    // ========================================================================

    /// Reading order, crop, and column numbering.
    fn extract_cells(&self, mut boxes: Vec<Component>, raster: &RasterImage) -> Vec<GlyphCell> {
        boxes.sort_by_key(|c| (c.row, c.bbox.x1));

        let mut cells = Vec::with_capacity(boxes.len());
        let mut current_row = usize::MAX;
        let mut col = 0usize;
        for comp in boxes {
            if comp.row != current_row {
                current_row = comp.row;
                col = 0;
            }
            let padded = pad_clipped(comp.bbox, self.config.padding as i32, raster);
            if let Some(image) = raster.crop(padded) {
                cells.push(GlyphCell {
                    label: '?',
                    bbox: comp.bbox,
                    image,
                    row: comp.row,
                    col,
                    confidence: 1.0,
                });
                col += 1;
            }
        }
        cells
    }
}

// ============================================================================
// Row assignment
// ============================================================================

/// Assign a box to a row by vertical center (with a margin of a quarter of
/// the box height); boxes outside every row go to the row with maximal
/// vertical overlap.
fn assign_row(bbox: RectI, rows: &[TextRow]) -> usize {
    let cy = bbox.center_y();
    let margin = bbox.height() as f64 / 4.0;
    for (idx, row) in rows.iter().enumerate() {
        if row.y as f64 - margin <= cy && cy <= row.bottom() as f64 + margin {
            return idx;
        }
    }

    let mut best = 0usize;
    let mut best_overlap = -1i64;
    for (idx, row) in rows.iter().enumerate() {
        let overlap = (bbox.y2 + 1).min(row.bottom() as i32) as i64
            - bbox.y1.max(row.y as i32) as i64;
        if overlap > best_overlap {
            best_overlap = overlap;
            best = idx;
        }
    }
    best
}

// ============================================================================
// Merge passes
// ============================================================================

/// Pick the representative contour for a merged group: the one with the
/// largest traced area.
fn best_contour(indices: &[Option<usize>], contours: &[Contour]) -> Option<usize> {
    indices
        .iter()
        .flatten()
        .copied()
        .max_by(|&a, &b| {
            contours[a]
                .area
                .partial_cmp(&contours[b].area)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

/// Pass 1: merge runs of adjacent narrow boxes (quote pairs, colons,
/// semicolons) while protecting tall narrow neighbors like parentheses.
/// Boxes must arrive sorted by x.
fn merge_adjacent_narrow(boxes: Vec<Component>, contours: &[Contour]) -> Vec<Component> {
    if boxes.len() < 2 {
        return boxes;
    }
    let widths: Vec<f64> = boxes.iter().map(|b| b.w()).collect();
    let heights: Vec<f64> = boxes.iter().map(|b| b.h()).collect();
    let median_w = median(&widths);
    let median_h = median(&heights);
    let narrow = |w: f64| w < median_w * 0.75;

    let mut out = Vec::with_capacity(boxes.len());
    let mut i = 0usize;
    while i < boxes.len() {
        let first = boxes[i];
        if !narrow(first.w()) {
            out.push(first);
            i += 1;
            continue;
        }

        let mut group = first.bbox;
        let mut group_contours = vec![first.contour];
        let mut j = i + 1;
        while j < boxes.len() {
            let next = boxes[j];
            if !narrow(next.w()) {
                break;
            }
            let gap = next.bbox.x1 - (group.x2 + 1);
            let (h1, h2) = (first.h(), next.h());
            let y_centers_close =
                (first.bbox.center_y() - next.bbox.center_y()).abs() < median_h * 0.3;
            let both_short = h1 < median_h * 0.6 && h2 < median_h * 0.6;
            let both_tall = h1 > median_h * 0.7 && h2 > median_h * 0.7;
            let combined_width = (next.bbox.x2 - group.x1 + 1) as f64;

            if both_tall && combined_width > median_w * 1.3 {
                debug!("narrow merge blocked: both tall, combined {combined_width:.0}");
                break;
            }

            let max_gap = if both_short && y_centers_close {
                first.w().min(next.w()) * 1.5
            } else {
                first.w().min(next.w()) * 0.6
            };

            if gap >= 0 && (gap as f64) <= max_gap {
                debug!("narrow merge: gap {gap} <= {max_gap:.0}");
                group = unite_rectangles(&group, &next.bbox);
                group_contours.push(next.contour);
                j += 1;
            } else {
                break;
            }
        }

        out.push(Component {
            bbox: group,
            contour: best_contour(&group_contours, contours),
            row: first.row,
        });
        i = j;
    }
    out
}

/// Pass 2: merge vertically stacked parts (i and j dots over their stems).
fn merge_vertically_stacked(boxes: Vec<Component>, contours: &[Contour]) -> Vec<Component> {
    if boxes.len() < 2 {
        return boxes;
    }
    let mut sorted = boxes;
    sorted.sort_by(|a, b| {
        a.bbox
            .center_x()
            .partial_cmp(&b.bbox.center_x())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut used = vec![false; sorted.len()];
    let mut out = Vec::with_capacity(sorted.len());

    for i in 0..sorted.len() {
        if used[i] {
            continue;
        }
        let a = sorted[i];
        let mut group = a.bbox;
        let mut group_contours = vec![a.contour];

        for j in (i + 1)..sorted.len() {
            if used[j] {
                continue;
            }
            let b = sorted[j];
            let cx_diff = (a.bbox.center_x() - b.bbox.center_x()).abs();
            let min_width = a.w().min(b.w());
            if cx_diff > min_width * 0.8 {
                continue;
            }

            let height_ratio = a.h().min(b.h()) / a.h().max(b.h());
            let x_overlap = a.bbox.x1 <= b.bbox.x2 && b.bbox.x1 <= a.bbox.x2;
            let should_merge = height_ratio < 0.40 || (cx_diff < 10.0 && x_overlap);

            if should_merge {
                debug!(
                    "stack merge: cx diff {cx_diff:.0}, height ratio {height_ratio:.2}"
                );
                group = unite_rectangles(&group, &b.bbox);
                group_contours.push(b.contour);
                used[j] = true;
            }
        }

        used[i] = true;
        out.push(Component {
            bbox: group,
            contour: best_contour(&group_contours, contours),
            row: a.row,
        });
    }
    out
}

/// Pass 3: union-find over boxes with strong horizontal overlap (the two
/// bowls and stroke of `%`).
fn merge_diagonal(boxes: Vec<Component>, contours: &[Contour]) -> Vec<Component> {
    if boxes.len() < 2 {
        return boxes;
    }
    let widths: Vec<f64> = boxes.iter().map(|b| b.w()).collect();
    let median_w = median(&widths);

    let n = boxes.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut Vec<usize>, i: usize) -> usize {
        if parent[i] != i {
            let root = find(parent, parent[i]);
            parent[i] = root;
        }
        parent[i]
    }

    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = (boxes[i].bbox, boxes[j].bbox);
            let overlap = (a.x2.min(b.x2) - a.x1.max(b.x1) + 1).max(0) as f64;
            let min_width = (a.width().min(b.width())) as f64;
            if min_width <= 0.0 || overlap / min_width <= 0.5 {
                continue;
            }
            let v_dist = (a.center_y() - b.center_y()).abs();
            if v_dist < median_w * 2.0 {
                debug!("diagonal merge: overlap {:.2}, v dist {v_dist:.0}", overlap / min_width);
                let (pi, pj) = (find(&mut parent, i), find(&mut parent, j));
                if pi != pj {
                    parent[pi] = pj;
                }
            }
        }
    }

    let mut groups: std::collections::BTreeMap<usize, Vec<usize>> = Default::default();
    for i in 0..n {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }

    let mut out = Vec::with_capacity(groups.len());
    for members in groups.values() {
        let mut bbox = boxes[members[0]].bbox;
        let mut group_contours = Vec::with_capacity(members.len());
        for &m in members {
            bbox = unite_rectangles(&bbox, &boxes[m].bbox);
            group_contours.push(boxes[m].contour);
        }
        out.push(Component {
            bbox,
            contour: best_contour(&group_contours, contours),
            row: boxes[members[0]].row,
        });
    }
    out.sort_by_key(|c| c.bbox.x1);
    out
}

// ============================================================================
// Splitting and extraction helpers
// ============================================================================

/// Valleys of the vertical ink projection inside `bbox`, deepest first,
/// spaced at least half the expected width apart, capped at
/// `ceil(w / expected) - 1` splits. Positions are relative to the box.
fn find_split_points(binary: &BinaryImage, bbox: RectI, expected_width: f64) -> Vec<i32> {
    let projection = binary.column_projection(bbox);
    if projection.is_empty() {
        return Vec::new();
    }
    let min_p = *projection.iter().min().unwrap_or(&0);
    let max_p = *projection.iter().max().unwrap_or(&0);
    if max_p == min_p {
        // Flat profile: there is no valley to split at.
        return Vec::new();
    }
    let threshold = min_p as f64 + (max_p - min_p) as f64 * 0.3;

    // Collect valleys: runs at or below the threshold, keyed by depth.
    let mut valleys: Vec<(i32, u32)> = Vec::new();
    let mut in_valley = false;
    let mut valley_start = 0usize;
    for (i, &v) in projection.iter().enumerate() {
        if (v as f64) <= threshold {
            if !in_valley {
                valley_start = i;
                in_valley = true;
            }
        } else if in_valley {
            let depth = projection[valley_start..i].iter().copied().min().unwrap_or(0);
            valleys.push((((valley_start + i) / 2) as i32, depth));
            in_valley = false;
        }
    }
    if valleys.is_empty() {
        return Vec::new();
    }
    valleys.sort_by_key(|&(_, depth)| depth);

    let max_splits = ((bbox.width() as f64 / expected_width).ceil() as usize).saturating_sub(1);
    let min_spacing = expected_width * 0.5;
    let mut splits: Vec<i32> = Vec::new();
    for (x, _) in valleys {
        if splits.iter().all(|&s| ((x - s).abs() as f64) > min_spacing) {
            splits.push(x);
            if splits.len() >= max_splits {
                break;
            }
        }
    }
    splits.sort_unstable();
    splits
}

/// Tight bounding box of the ink inside `region`, or `None` when the region
/// holds fewer than 10 ink pixels.
fn tight_ink_bbox(binary: &BinaryImage, region: RectI) -> Option<RectI> {
    let mut r = region;
    let full = RectI::new(0, 0, binary.width() as i32 - 1, binary.height() as i32 - 1);
    if !r.clip(&full) {
        return None;
    }
    let mut bbox: Option<RectI> = None;
    let mut count = 0usize;
    for y in r.y1..=r.y2 {
        for x in r.x1..=r.x2 {
            if binary.is_ink(x, y) {
                count += 1;
                bbox = Some(match bbox {
                    None => RectI::new(x, y, x, y),
                    Some(b) => unite_rectangles(&b, &RectI::new(x, y, x, y)),
                });
            }
        }
    }
    if count < 10 {
        return None;
    }
    bbox
}

/// Grow `bbox` by `pad` on every side, clipped to the raster.
fn pad_clipped(bbox: RectI, pad: i32, raster: &RasterImage) -> RectI {
    let mut r = RectI::new(bbox.x1 - pad, bbox.y1 - pad, bbox.x2 + pad, bbox.y2 + pad);
    r.clip(&RectI::new(
        0,
        0,
        raster.width() as i32 - 1,
        raster.height() as i32 - 1,
    ));
    r
}

/// Grid size estimation: count projection gap groups, then widen the column
/// count until the grid covers the expected alphabet.
fn detect_grid_size(binary: &BinaryImage, expected: usize) -> (u32, u32) {
    let (w, h) = (binary.width(), binary.height());
    let row_proj = binary.row_projection();
    let col_proj = binary.column_projection(RectI::new(0, 0, w as i32 - 1, h as i32 - 1));

    fn count_groups(gaps: &[usize]) -> u32 {
        if gaps.is_empty() {
            return 1;
        }
        let mut groups = 1;
        for pair in gaps.windows(2) {
            if pair[1] - pair[0] > 5 {
                groups += 1;
            }
        }
        groups
    }

    let row_gaps: Vec<usize> = row_proj
        .iter()
        .enumerate()
        .filter(|(_, &p)| (p as f64) < w as f64 * 0.05)
        .map(|(i, _)| i)
        .collect();
    let col_gaps: Vec<usize> = col_proj
        .iter()
        .enumerate()
        .filter(|(_, &p)| (p as f64) < h as f64 * 0.05)
        .map(|(i, _)| i)
        .collect();

    let rows = count_groups(&row_gaps).max(1);
    let mut cols = count_groups(&col_gaps).max(1);
    while (rows * cols) < expected as u32 {
        cols += 1;
    }
    (rows, cols)
}

// ============================================================================
// Tests
// ============================================================================
