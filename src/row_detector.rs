//! Text row detection (pipeline stage C2).
//!
//! Finds horizontal text bands from the ink projection profile, resolves
//! descender overlap between neighboring bands, and absorbs undersized
//! fragments (stray descenders, punctuation slivers) into their nearest
//! neighbor.

use log::{debug, info};

use crate::basics::RectI;
use crate::raster::BinaryImage;

// ============================================================================
// TextRow
// ============================================================================

/// A detected row of text, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRow {
    /// Top Y coordinate.
    pub y: u32,
    /// Row height.
    pub height: u32,
    /// Estimated baseline Y position (relative to image top).
    pub baseline: u32,
}

impl TextRow {
    /// Bottom Y coordinate (exclusive).
    #[inline]
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// A glyph column inside a row (row-column segmentation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnBand {
    /// Left X coordinate in image space.
    pub x: u32,
    pub width: u32,
}

// ============================================================================
// RowDetector
// ============================================================================

/// Detects rows of text via horizontal projection analysis.
pub struct RowDetector {
    pub min_row_height: u32,
    pub gap_threshold_ratio: f64,
    pub descender_ratio: f64,
}

impl Default for RowDetector {
    fn default() -> Self {
        Self {
            min_row_height: 20,
            gap_threshold_ratio: 0.05,
            descender_ratio: 0.3,
        }
    }
}

impl RowDetector {
    pub fn new(min_row_height: u32) -> Self {
        Self {
            min_row_height,
            ..Default::default()
        }
    }

    fn baseline_for(&self, y: u32, height: u32) -> u32 {
        y + (height as f64 * (1.0 - self.descender_ratio)) as u32
    }

    /// Detect text rows, top to bottom.
    pub fn detect(&self, binary: &BinaryImage) -> Vec<TextRow> {
        let projection = binary.row_projection();
        let gap_threshold = binary.width() as f64 * self.gap_threshold_ratio;

        let mut rows = Vec::new();
        let mut row_start = 0u32;
        let mut in_row = false;

        for (y, &ink) in projection.iter().enumerate() {
            let y = y as u32;
            if !in_row && ink as f64 > gap_threshold {
                in_row = true;
                row_start = y;
            } else if in_row && ink as f64 <= gap_threshold {
                let height = y - row_start;
                if height >= self.min_row_height {
                    rows.push(TextRow {
                        y: row_start,
                        height,
                        baseline: self.baseline_for(row_start, height),
                    });
                }
                in_row = false;
            }
        }
        // Row still open at the bottom edge
        if in_row {
            let height = binary.height() - row_start;
            if height >= self.min_row_height {
                rows.push(TextRow {
                    y: row_start,
                    height,
                    baseline: self.baseline_for(row_start, height),
                });
            }
        }

        let rows = self.merge_overlapping(rows, &projection);
        let rows = self.absorb_small_rows(rows);
        info!("detected {} text rows", rows.len());
        rows
    }

    /// Merge vertically overlapping rows unless the projection valley
    /// between them drops below 30% of the surrounding peaks.
    fn merge_overlapping(&self, rows: Vec<TextRow>, projection: &[u32]) -> Vec<TextRow> {
        if rows.len() < 2 {
            return rows;
        }

        let mut merged: Vec<TextRow> = Vec::with_capacity(rows.len());
        let mut iter = rows.into_iter();
        let mut current = match iter.next() {
            Some(r) => r,
            None => return Vec::new(),
        };

        for next in iter {
            if next.y >= current.bottom() {
                merged.push(current);
                current = next;
                continue;
            }

            // True overlap: inspect the valley inside the shared span.
            let overlap_start = next.y as usize;
            let overlap_end = (current.bottom() as usize).min(projection.len());
            let valley = projection[overlap_start..overlap_end]
                .iter()
                .copied()
                .min()
                .unwrap_or(0);
            let peak_before = projection[current.y as usize..overlap_start]
                .iter()
                .copied()
                .max()
                .unwrap_or(0);
            let peak_after = projection[overlap_end..(next.bottom() as usize).min(projection.len())]
                .iter()
                .copied()
                .max()
                .unwrap_or(0);
            let peak = peak_before.max(peak_after);

            if peak > 0 && (valley as f64) < peak as f64 * 0.3 {
                debug!(
                    "rows at y={} and y={} overlap but valley {valley} < 0.3*{peak}; kept separate",
                    current.y, next.y
                );
                merged.push(current);
                current = next;
            } else {
                let top = current.y.min(next.y);
                let bottom = current.bottom().max(next.bottom());
                let height = bottom - top;
                debug!("merged overlapping rows at y={} and y={}", current.y, next.y);
                current = TextRow {
                    y: top,
                    height,
                    baseline: self.baseline_for(top, height),
                };
            }
        }
        merged.push(current);
        merged
    }

    /// Absorb rows shorter than 30% of the median height into their nearer
    /// vertical neighbor. Iterates until stable or the iteration cap (the
    /// initial row count) is reached.
    fn absorb_small_rows(&self, rows: Vec<TextRow>) -> Vec<TextRow> {
        if rows.len() < 2 {
            return rows;
        }

        let heights: Vec<f64> = rows.iter().map(|r| r.height as f64).collect();
        let small_threshold = crate::math::median(&heights) * 0.30;
        debug!("small-row threshold {small_threshold:.1}px");

        let max_iterations = rows.len();
        let mut merged = rows;
        let mut iterations = 0;
        let mut changed = true;

        while changed && iterations < max_iterations {
            changed = false;
            iterations += 1;
            let mut result: Vec<TextRow> = Vec::with_capacity(merged.len());
            let mut i = 0;

            while i < merged.len() {
                let current = merged[i];
                if (current.height as f64) >= small_threshold {
                    result.push(current);
                    i += 1;
                    continue;
                }

                let gap_to_prev = result
                    .last()
                    .map(|p| current.y as i64 - p.bottom() as i64)
                    .unwrap_or(i64::MAX);
                let gap_to_next = merged
                    .get(i + 1)
                    .map(|n| n.y as i64 - current.bottom() as i64)
                    .unwrap_or(i64::MAX);

                if let Some(prev) = result
                    .last_mut()
                    .filter(|_| gap_to_prev != i64::MAX && gap_to_prev <= gap_to_next)
                {
                    // Extend the previous row down over this fragment.
                    let bottom = prev.bottom().max(current.bottom());
                    prev.height = bottom - prev.y;
                    prev.baseline = self.baseline_for(prev.y, prev.height);
                    debug!("absorbed small row h={} into previous row", current.height);
                    changed = true;
                } else if gap_to_next != i64::MAX {
                    // Extend the next row up over this fragment.
                    let next = merged[i + 1];
                    let top = current.y.min(next.y);
                    let height = next.bottom() - top;
                    merged[i + 1] = TextRow {
                        y: top,
                        height,
                        baseline: self.baseline_for(top, height),
                    };
                    debug!("absorbed small row h={} into next row", current.height);
                    changed = true;
                } else {
                    result.push(current);
                }
                i += 1;
            }

            merged = result;
        }
        merged
    }

    /// Segment a row into glyph columns by vertical projection. The gap
    /// threshold is 3% of the row height (at least 2 px of ink ends a gap),
    /// columns narrower than `min_column_width` are dropped, and columns
    /// wider than 1.8× the median are split at clear gaps only.
    pub fn segment_columns(
        &self,
        binary: &BinaryImage,
        row: &TextRow,
        min_column_width: u32,
        gap_threshold_pct: f64,
    ) -> Vec<ColumnBand> {
        let region = RectI::new(
            0,
            row.y as i32,
            binary.width() as i32 - 1,
            row.bottom() as i32 - 1,
        );
        let projection = binary.column_projection(region);
        let gap_threshold = ((row.height as f64 * gap_threshold_pct) as u32).max(2);

        let mut columns = Vec::new();
        let mut in_column = false;
        let mut col_start = 0u32;

        for (x, &ink) in projection.iter().enumerate() {
            let x = x as u32;
            if !in_column && ink > gap_threshold {
                in_column = true;
                col_start = x;
            } else if in_column && ink <= gap_threshold {
                let width = x - col_start;
                if width >= min_column_width {
                    columns.push(ColumnBand {
                        x: col_start,
                        width,
                    });
                }
                in_column = false;
            }
        }
        if in_column {
            let width = binary.width() - col_start;
            if width >= min_column_width {
                columns.push(ColumnBand {
                    x: col_start,
                    width,
                });
            }
        }

        let columns = self.split_wide_columns(columns, &projection, gap_threshold);
        debug!(
            "row at y={}: {} columns (gap threshold {gap_threshold})",
            row.y,
            columns.len()
        );
        columns
    }

    /// Split unusually wide columns, but only where the projection shows a
    /// clear gap (ink at or below the threshold over a run of >= 2 px).
    fn split_wide_columns(
        &self,
        columns: Vec<ColumnBand>,
        projection: &[u32],
        gap_threshold: u32,
    ) -> Vec<ColumnBand> {
        if columns.is_empty() {
            return columns;
        }
        let widths: Vec<f64> = columns.iter().map(|c| c.width as f64).collect();
        let median_width = crate::math::median(&widths);

        let mut result = Vec::with_capacity(columns.len());
        for col in columns {
            if (col.width as f64) <= median_width * 1.8 {
                result.push(col);
                continue;
            }
            let window = &projection[col.x as usize..(col.x + col.width) as usize];
            let splits = find_gap_centers(window, gap_threshold);
            if splits.is_empty() {
                result.push(col);
                continue;
            }

            let mut boundaries = vec![0u32];
            boundaries.extend(splits);
            boundaries.push(col.width);
            for pair in boundaries.windows(2) {
                let width = pair[1] - pair[0];
                if width >= 5 {
                    result.push(ColumnBand {
                        x: col.x + pair[0],
                        width,
                    });
                }
            }
        }
        result
    }
}

/// Centers of low-ink runs at least 2 px wide. Short windows yield nothing.
fn find_gap_centers(projection: &[u32], gap_threshold: u32) -> Vec<u32> {
    if projection.len() < 10 {
        return Vec::new();
    }
    let mut gaps = Vec::new();
    let mut in_gap = false;
    let mut gap_start = 0usize;
    for (i, &val) in projection.iter().enumerate() {
        if val <= gap_threshold {
            if !in_gap {
                gap_start = i;
                in_gap = true;
            }
        } else if in_gap {
            if i - gap_start >= 2 {
                gaps.push(((gap_start + i) / 2) as u32);
            }
            in_gap = false;
        }
    }
    gaps
}

// ============================================================================
// Tests
// ============================================================================
