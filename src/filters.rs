//! Pixel-plane filters: Gaussian blur, Otsu thresholding, and binary
//! morphology.
//!
//! All filters operate on flat byte planes with replicated borders. The
//! morphology operators work on ink masks (`true` = foreground) with an
//! elliptical structuring element.

// ============================================================================
// Gaussian blur
// ============================================================================

/// Sampled Gaussian kernel of odd size `k`, normalized to sum 1. Sigma is
/// derived from the kernel size the same way OpenCV does when none is given:
/// `0.3 * ((k - 1) * 0.5 - 1) + 0.8`.
pub fn gaussian_kernel(k: usize) -> Vec<f64> {
    debug_assert!(k % 2 == 1);
    let sigma = 0.3 * ((k as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (k / 2) as i32;
    let mut kernel: Vec<f64> = (-half..=half)
        .map(|i| (-(i as f64 * i as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

/// Separable Gaussian blur over a `width × height` byte plane. `k == 0`
/// returns the plane unchanged.
pub fn gaussian_blur(plane: &[u8], width: u32, height: u32, k: usize) -> Vec<u8> {
    if k < 3 {
        return plane.to_vec();
    }
    let kernel = gaussian_kernel(k);
    let half = (k / 2) as i32;
    let (w, h) = (width as i32, height as i32);

    // Horizontal pass
    let mut tmp = vec![0.0f64; plane.len()];
    for y in 0..h {
        let row = (y * w) as usize;
        for x in 0..w {
            let mut acc = 0.0;
            for (i, &weight) in kernel.iter().enumerate() {
                let sx = (x + i as i32 - half).clamp(0, w - 1);
                acc += plane[row + sx as usize] as f64 * weight;
            }
            tmp[row + x as usize] = acc;
        }
    }

    // Vertical pass
    let mut out = vec![0u8; plane.len()];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (i, &weight) in kernel.iter().enumerate() {
                let sy = (y + i as i32 - half).clamp(0, h - 1);
                acc += tmp[(sy * w + x) as usize] * weight;
            }
            out[(y * w + x) as usize] = (acc + 0.5).clamp(0.0, 255.0) as u8;
        }
    }
    out
}

// ============================================================================
// Otsu threshold
// ============================================================================

/// Otsu's threshold: the level maximizing between-class variance over the
/// 256-bin histogram. Pixels strictly above the returned level belong to the
/// bright class.
pub fn otsu_level(plane: &[u8]) -> u8 {
    let mut hist = [0u64; 256];
    for &p in plane {
        hist[p as usize] += 1;
    }
    let total = plane.len() as f64;
    if total == 0.0 {
        return 127;
    }

    let sum_all: f64 = hist
        .iter()
        .enumerate()
        .map(|(v, &n)| v as f64 * n as f64)
        .sum();

    let mut sum_bg = 0.0;
    let mut weight_bg = 0.0;
    let mut best_level = 0u8;
    let mut best_variance = -1.0;

    for level in 0..256usize {
        weight_bg += hist[level] as f64;
        if weight_bg == 0.0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0.0 {
            break;
        }
        sum_bg += level as f64 * hist[level] as f64;

        let mean_bg = sum_bg / weight_bg;
        let mean_fg = (sum_all - sum_bg) / weight_fg;
        let diff = mean_bg - mean_fg;
        let variance = weight_bg * weight_fg * diff * diff;

        if variance > best_variance {
            best_variance = variance;
            best_level = level as u8;
        }
    }
    best_level
}

// ============================================================================
// Morphology
// ============================================================================

/// Elliptical structuring element of size `m × m` as center offsets.
/// `m == 3` degenerates to a cross, matching the usual scan conversion.
pub fn elliptical_element(m: usize) -> Vec<(i32, i32)> {
    debug_assert!(m % 2 == 1 && m >= 3);
    let r = ((m - 1) / 2) as i32;
    let rf = r as f64;
    let mut offsets = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            let nx = dx as f64 / rf;
            let ny = dy as f64 / rf;
            if nx * nx + ny * ny <= 1.0 + 1e-9 {
                offsets.push((dx, dy));
            }
        }
    }
    offsets
}

fn dilate(mask: &[bool], width: u32, height: u32, element: &[(i32, i32)]) -> Vec<bool> {
    let (w, h) = (width as i32, height as i32);
    let mut out = vec![false; mask.len()];
    for y in 0..h {
        for x in 0..w {
            let hit = element.iter().any(|&(dx, dy)| {
                let (sx, sy) = (x + dx, y + dy);
                sx >= 0 && sy >= 0 && sx < w && sy < h && mask[(sy * w + sx) as usize]
            });
            out[(y * w + x) as usize] = hit;
        }
    }
    out
}

fn erode(mask: &[bool], width: u32, height: u32, element: &[(i32, i32)]) -> Vec<bool> {
    let (w, h) = (width as i32, height as i32);
    let mut out = vec![false; mask.len()];
    for y in 0..h {
        for x in 0..w {
            // Outside the image counts as foreground, so shapes touching
            // the border are not eaten away.
            let all = element.iter().all(|&(dx, dy)| {
                let (sx, sy) = (x + dx, y + dy);
                sx < 0 || sy < 0 || sx >= w || sy >= h || mask[(sy * w + sx) as usize]
            });
            out[(y * w + x) as usize] = all;
        }
    }
    out
}

/// Closing (dilate, then erode): fills gaps up to the element size.
pub fn morph_close(mask: &[bool], width: u32, height: u32, element: &[(i32, i32)]) -> Vec<bool> {
    erode(&dilate(mask, width, height, element), width, height, element)
}

/// Opening (erode, then dilate): removes protrusions up to the element size.
pub fn morph_open(mask: &[bool], width: u32, height: u32, element: &[(i32, i32)]) -> Vec<bool> {
    dilate(&erode(mask, width, height, element), width, height, element)
}

// ============================================================================
// Tests
// ============================================================================
