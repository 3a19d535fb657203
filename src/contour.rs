//! Connected components and boundary contour extraction.
//!
//! Ink components are labeled with 8-connectivity and their outer boundaries
//! traced clockwise (image coordinates, Y down) with Moore neighbor
//! tracing. Hole contours come from background regions (4-connectivity) that
//! do not touch the image border; they are reversed after tracing so holes
//! always wind opposite to their outer contour.
//!
//! The hierarchy is flat: contours live in one vector and holes point at
//! their enclosing outer contour through `parent` (an index, not a pointer).

use crate::basics::{PointD, PointI, RectI};
use crate::math::polygon_area;
use crate::raster::BinaryImage;

/// Eight directions in clockwise order (image coordinates, Y down):
/// E, SE, S, SW, W, NW, N, NE.
const DIR8: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

// ============================================================================
// Contour
// ============================================================================

/// A traced boundary with its hierarchy link.
#[derive(Debug, Clone)]
pub struct Contour {
    /// Boundary pixel chain, implicitly closed.
    pub points: Vec<PointI>,
    /// `true` for inner contours (interior of O, A, ...).
    pub is_hole: bool,
    /// Index of the enclosing outer contour for holes.
    pub parent: Option<u32>,
    /// Tight bounding box of the chain.
    pub bbox: RectI,
    /// Absolute enclosed area (shoelace over the chain), px².
    pub area: f64,
}

impl Contour {
    fn from_chain(points: Vec<PointI>, is_hole: bool, parent: Option<u32>) -> Self {
        let mut bbox = RectI::new(points[0].x, points[0].y, points[0].x, points[0].y);
        for p in &points[1..] {
            if p.x < bbox.x1 {
                bbox.x1 = p.x;
            }
            if p.y < bbox.y1 {
                bbox.y1 = p.y;
            }
            if p.x > bbox.x2 {
                bbox.x2 = p.x;
            }
            if p.y > bbox.y2 {
                bbox.y2 = p.y;
            }
        }
        let pts_d: Vec<PointD> = points.iter().map(|&p| p.into()).collect();
        let area = polygon_area(&pts_d);
        Self {
            points,
            is_hole,
            parent,
            bbox,
            area,
        }
    }

    /// Chain length.
    pub fn point_count(&self) -> usize {
        self.points.len()
    }
}

// ============================================================================
// Public entry points
// ============================================================================

/// Trace only the outer boundary of every ink component.
pub fn find_external_contours(bin: &BinaryImage) -> Vec<Contour> {
    let labels = label_ink_components(bin);
    trace_outer_contours(bin, &labels)
}

/// Trace outer boundaries and hole boundaries, linking each hole to its
/// enclosing outer contour.
pub fn find_contours_with_holes(bin: &BinaryImage) -> Vec<Contour> {
    let labels = label_ink_components(bin);
    let mut contours = trace_outer_contours(bin, &labels);
    let outer_count = contours.len() as u32;

    let (w, h) = (bin.width() as i32, bin.height() as i32);
    let holes = label_hole_regions(bin);
    let mut seen = vec![false; holes.region_count as usize + 1];

    for y in 0..h {
        for x in 0..w {
            let region = holes.labels[(y * w + x) as usize];
            if region == 0 || seen[region as usize] {
                continue;
            }
            seen[region as usize] = true;

            // (x, y) is the topmost-leftmost pixel of this hole region, so
            // its left neighbor is ink of the enclosing component. Component
            // ids are 1-based in the same scan order as the outer contours.
            let parent_component = labels.labels[(y * w + x - 1) as usize];
            let parent = (1..=outer_count)
                .contains(&parent_component)
                .then(|| parent_component - 1);

            let in_region = |px: i32, py: i32| {
                px >= 0
                    && py >= 0
                    && px < w
                    && py < h
                    && holes.labels[(py * w + px) as usize] == region
            };
            let mut chain = trace_boundary(x, y, w, h, in_region);
            // Opposite winding relative to the outer contour.
            chain.reverse();
            contours.push(Contour::from_chain(chain, true, parent));
        }
    }
    contours
}

// ============================================================================
// Component labeling
// ============================================================================

struct LabelMap {
    labels: Vec<u32>,
    component_count: u32,
}

/// Label ink pixels with 8-connectivity. Labels are 1-based in scan order
/// of each component's topmost-leftmost pixel.
fn label_ink_components(bin: &BinaryImage) -> LabelMap {
    let (w, h) = (bin.width() as i32, bin.height() as i32);
    let mut labels = vec![0u32; (w * h) as usize];
    let mut next = 0u32;
    let mut stack = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            if !bin.is_ink(x, y) || labels[idx] != 0 {
                continue;
            }
            next += 1;
            labels[idx] = next;
            stack.push((x, y));
            while let Some((cx, cy)) = stack.pop() {
                for &(dx, dy) in &DIR8 {
                    let (nx, ny) = (cx + dx, cy + dy);
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        continue;
                    }
                    let nidx = (ny * w + nx) as usize;
                    if bin.is_ink(nx, ny) && labels[nidx] == 0 {
                        labels[nidx] = next;
                        stack.push((nx, ny));
                    }
                }
            }
        }
    }
    LabelMap {
        labels,
        component_count: next,
    }
}

struct HoleMap {
    labels: Vec<u32>,
    region_count: u32,
}

/// Label enclosed background regions with 4-connectivity. Regions touching
/// the image border get label 0 (they are outside, not holes).
fn label_hole_regions(bin: &BinaryImage) -> HoleMap {
    let (w, h) = (bin.width() as i32, bin.height() as i32);
    let mut labels = vec![u32::MAX; (w * h) as usize]; // MAX = unvisited bg
    for i in 0..labels.len() {
        let (x, y) = (i as i32 % w, i as i32 / w);
        if bin.is_ink(x, y) {
            labels[i] = 0; // ink carries no hole label
        }
    }

    const DIR4: [(i32, i32); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];
    let mut next = 0u32;
    let mut stack = Vec::new();

    for sy in 0..h {
        for sx in 0..w {
            let sidx = (sy * w + sx) as usize;
            if labels[sidx] != u32::MAX {
                continue;
            }
            // Flood this background region, noting border contact.
            let mut region = Vec::new();
            let mut touches_border = false;
            labels[sidx] = 0;
            stack.push((sx, sy));
            while let Some((cx, cy)) = stack.pop() {
                region.push((cx, cy));
                if cx == 0 || cy == 0 || cx == w - 1 || cy == h - 1 {
                    touches_border = true;
                }
                for &(dx, dy) in &DIR4 {
                    let (nx, ny) = (cx + dx, cy + dy);
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        continue;
                    }
                    let nidx = (ny * w + nx) as usize;
                    if labels[nidx] == u32::MAX {
                        labels[nidx] = 0;
                        stack.push((nx, ny));
                    }
                }
            }
            if !touches_border {
                next += 1;
                for (cx, cy) in region {
                    labels[(cy * w + cx) as usize] = next;
                }
            }
        }
    }
    HoleMap {
        labels,
        region_count: next,
    }
}

// ============================================================================
// Boundary tracing
// ============================================================================

fn trace_outer_contours(bin: &BinaryImage, labels: &LabelMap) -> Vec<Contour> {
    let (w, h) = (bin.width() as i32, bin.height() as i32);
    let mut contours = Vec::with_capacity(labels.component_count as usize);
    let mut traced = vec![false; labels.component_count as usize + 1];

    for y in 0..h {
        for x in 0..w {
            let id = labels.labels[(y * w + x) as usize];
            if id == 0 || traced[id as usize] {
                continue;
            }
            traced[id as usize] = true;
            let in_component =
                |px: i32, py: i32| -> bool {
                    px >= 0
                        && py >= 0
                        && px < w
                        && py < h
                        && labels.labels[(py * w + px) as usize] == id
                };
            let chain = trace_boundary(x, y, w, h, in_component);
            contours.push(Contour::from_chain(chain, false, None));
        }
    }
    contours
}

/// Moore neighbor tracing, clockwise, starting from the region's
/// topmost-leftmost pixel. Terminates with Jacob's criterion (the first
/// move out of the start pixel repeats).
fn trace_boundary<F: Fn(i32, i32) -> bool>(
    sx: i32,
    sy: i32,
    w: i32,
    h: i32,
    in_region: F,
) -> Vec<PointI> {
    let start = PointI::new(sx, sy);
    let cap = (4 * w * h + 8) as usize;

    let next_from = |cx: i32, cy: i32, prev_dir: usize| -> Option<(usize, PointI)> {
        for i in 0..8 {
            let dir = (prev_dir + 6 + i) % 8;
            let (dx, dy) = DIR8[dir];
            if in_region(cx + dx, cy + dy) {
                return Some((dir, PointI::new(cx + dx, cy + dy)));
            }
        }
        None
    };

    let mut points = Vec::new();
    let mut cur = start;
    // Virtual arrival heading east; the start pixel has no ink above or to
    // its left, so the sweep begins in known background.
    let mut prev_dir = 0usize;
    let mut first_move: Option<(usize, PointI)> = None;

    loop {
        let step = next_from(cur.x, cur.y, prev_dir);
        let Some((dir, next)) = step else {
            points.push(cur);
            break; // isolated pixel
        };
        match first_move {
            Some((d0, p1)) => {
                if cur == start && dir == d0 && next == p1 {
                    break; // full cycle
                }
            }
            None => first_move = Some((dir, next)),
        }
        points.push(cur);
        if points.len() >= cap {
            break;
        }
        cur = next;
        prev_dir = dir;
    }
    points
}

// ============================================================================
// Tests
// ============================================================================
