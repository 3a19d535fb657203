//! Raster image containers and decode boundary.
//!
//! [`ImageSource`] is the single entry point for pixel data: a file path, an
//! encoded buffer, or an already-decoded raster. Decoding happens exactly
//! once, at this boundary; everything downstream works on byte planes.
//!
//! [`RasterImage`] is immutable after load (crops and flips produce new
//! images). [`BinaryImage`] carries the pipeline-wide polarity invariant:
//! background = 255, ink = 0.

use std::path::PathBuf;

use image::GenericImageView;

use crate::basics::RectI;
use crate::error::{Error, Result};

// ============================================================================
// ImageSource
// ============================================================================

/// Where the input pixels come from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// A file on disk (PNG, JPEG, BMP, TIFF, ...).
    Path(PathBuf),
    /// An encoded image held in memory.
    Buffer(Vec<u8>),
    /// A raster that has already been decoded.
    Raster(RasterImage),
}

impl ImageSource {
    /// Decode into a [`RasterImage`].
    pub fn decode(self) -> Result<RasterImage> {
        match self {
            ImageSource::Path(p) => {
                let img = image::open(&p)
                    .map_err(|e| Error::InvalidImage(format!("{}: {e}", p.display())))?;
                Ok(RasterImage::from_dynamic(&img))
            }
            ImageSource::Buffer(bytes) => {
                let img = image::load_from_memory(&bytes)
                    .map_err(|e| Error::InvalidImage(e.to_string()))?;
                Ok(RasterImage::from_dynamic(&img))
            }
            ImageSource::Raster(r) => Ok(r),
        }
    }
}

impl From<&std::path::Path> for ImageSource {
    fn from(p: &std::path::Path) -> Self {
        ImageSource::Path(p.to_path_buf())
    }
}

impl From<RasterImage> for ImageSource {
    fn from(r: RasterImage) -> Self {
        ImageSource::Raster(r)
    }
}

// ============================================================================
// RasterImage
// ============================================================================

/// Decoded raster: an 8-bit luma plane plus an optional alpha plane.
/// Origin is top-left, Y increases downward.
#[derive(Debug, Clone)]
pub struct RasterImage {
    width: u32,
    height: u32,
    luma: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

impl RasterImage {
    /// Build from raw planes. `alpha`, when present, must match `luma` in
    /// length.
    pub fn new(width: u32, height: u32, luma: Vec<u8>, alpha: Option<Vec<u8>>) -> Self {
        debug_assert_eq!(luma.len(), (width * height) as usize);
        if let Some(a) = &alpha {
            debug_assert_eq!(a.len(), luma.len());
        }
        Self {
            width,
            height,
            luma,
            alpha,
        }
    }

    /// Build a grayscale image with no alpha.
    pub fn from_luma(width: u32, height: u32, luma: Vec<u8>) -> Self {
        Self::new(width, height, luma, None)
    }

    fn from_dynamic(img: &image::DynamicImage) -> Self {
        let (width, height) = img.dimensions();
        let luma = img.to_luma8().into_raw();
        let alpha = if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            Some(rgba.pixels().map(|p| p.0[3]).collect())
        } else {
            None
        };
        Self::new(width, height, luma, alpha)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Luma value at (x, y). Caller guarantees bounds.
    #[inline]
    pub fn luma_at(&self, x: u32, y: u32) -> u8 {
        self.luma[(y * self.width + x) as usize]
    }

    /// Borrow the raw luma plane.
    pub fn luma(&self) -> &[u8] {
        &self.luma
    }

    /// Borrow the raw alpha plane, if any.
    pub fn alpha(&self) -> Option<&[u8]> {
        self.alpha.as_deref()
    }

    /// Grayscale plane with transparency treated as background: where a
    /// meaningful alpha channel drops below 128, the pixel becomes 255.
    /// A fully opaque alpha plane is ignored.
    pub fn luma_masked(&self) -> Vec<u8> {
        match &self.alpha {
            Some(alpha) if alpha.iter().any(|&a| a < 255) => self
                .luma
                .iter()
                .zip(alpha.iter())
                .map(|(&l, &a)| if a >= 128 { l } else { 255 })
                .collect(),
            _ => self.luma.clone(),
        }
    }

    /// Extract the sub-image covered by `r` (clipped to the image bounds).
    /// Returns `None` if the clipped rectangle is empty.
    pub fn crop(&self, r: RectI) -> Option<RasterImage> {
        let mut r = r;
        let full = RectI::new(0, 0, self.width as i32 - 1, self.height as i32 - 1);
        if !r.clip(&full) {
            return None;
        }
        let w = r.width() as u32;
        let h = r.height() as u32;
        let mut luma = Vec::with_capacity((w * h) as usize);
        let mut alpha = self.alpha.as_ref().map(|_| Vec::with_capacity((w * h) as usize));
        for y in r.y1..=r.y2 {
            let row = (y as u32 * self.width) as usize;
            let x1 = row + r.x1 as usize;
            let x2 = row + r.x2 as usize + 1;
            luma.extend_from_slice(&self.luma[x1..x2]);
            if let (Some(dst), Some(src)) = (alpha.as_mut(), self.alpha.as_ref()) {
                dst.extend_from_slice(&src[x1..x2]);
            }
        }
        Some(RasterImage::new(w, h, luma, alpha))
    }

    /// Mirror around the vertical axis. Used for mirror-derived glyphs.
    pub fn flip_horizontal(&self) -> RasterImage {
        let w = self.width as usize;
        let flip_plane = |plane: &[u8]| -> Vec<u8> {
            let mut out = Vec::with_capacity(plane.len());
            for row in plane.chunks_exact(w) {
                out.extend(row.iter().rev());
            }
            out
        };
        RasterImage::new(
            self.width,
            self.height,
            flip_plane(&self.luma),
            self.alpha.as_ref().map(|a| flip_plane(a)),
        )
    }
}

// ============================================================================
// BinaryImage
// ============================================================================

/// Thresholded raster. Invariant: every pixel is 0 (ink) or 255
/// (background).
#[derive(Debug, Clone)]
pub struct BinaryImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl BinaryImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), (width * height) as usize);
        Self {
            width,
            height,
            data,
        }
    }

    /// All-background image.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(width, height, vec![255; (width * height) as usize])
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, v: u8) {
        self.data[(y * self.width + x) as usize] = v;
    }

    /// `true` when the pixel at (x, y) is ink. Out-of-bounds reads as
    /// background, so border-touching glyphs trace cleanly.
    #[inline]
    pub fn is_ink(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return false;
        }
        self.data[(y as u32 * self.width + x as u32) as usize] == 0
    }

    /// Flip polarity of every pixel in place.
    pub fn invert(&mut self) {
        for p in &mut self.data {
            *p = 255 - *p;
        }
    }

    /// Total ink pixel count.
    pub fn ink_count(&self) -> usize {
        self.data.iter().filter(|&&p| p == 0).count()
    }

    /// Ink pixels per image row (horizontal projection).
    pub fn row_projection(&self) -> Vec<u32> {
        self.data
            .chunks_exact(self.width as usize)
            .map(|row| row.iter().filter(|&&p| p == 0).count() as u32)
            .collect()
    }

    /// Ink pixels per column inside the given region (vertical projection).
    /// The region is clipped to the image.
    pub fn column_projection(&self, r: RectI) -> Vec<u32> {
        let mut r = r;
        let full = RectI::new(0, 0, self.width as i32 - 1, self.height as i32 - 1);
        if !r.clip(&full) {
            return Vec::new();
        }
        let mut proj = vec![0u32; r.width() as usize];
        for y in r.y1..=r.y2 {
            let row = (y as u32 * self.width) as usize;
            for (i, x) in (r.x1..=r.x2).enumerate() {
                if self.data[row + x as usize] == 0 {
                    proj[i] += 1;
                }
            }
        }
        proj
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32) -> RasterImage {
        let luma = (0..width * height)
            .map(|i| {
                let (x, y) = (i % width, i / width);
                if (x + y) % 2 == 0 {
                    0
                } else {
                    255
                }
            })
            .collect();
        RasterImage::from_luma(width, height, luma)
    }

    #[test]
    fn test_decode_rejects_garbage_buffer() {
        let err = ImageSource::Buffer(vec![0, 1, 2, 3]).decode();
        assert!(matches!(err, Err(Error::InvalidImage(_))));
    }

    #[test]
    fn test_decode_png_buffer_roundtrip() {
        // Encode a tiny image with the image crate, then decode through the
        // source boundary.
        let mut png = Vec::new();
        let img = image::GrayImage::from_fn(4, 2, |x, _| image::Luma([(x * 60) as u8]));
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let raster = ImageSource::Buffer(png).decode().unwrap();
        assert_eq!(raster.width(), 4);
        assert_eq!(raster.height(), 2);
        assert_eq!(raster.luma_at(0, 0), 0);
        assert_eq!(raster.luma_at(3, 1), 180);
        assert!(raster.alpha().is_none());
    }

    #[test]
    fn test_luma_masked_applies_alpha_rule() {
        let luma = vec![10, 20, 30, 40];
        let alpha = vec![255, 127, 128, 0];
        let img = RasterImage::new(4, 1, luma, Some(alpha));
        assert_eq!(img.luma_masked(), vec![10, 255, 30, 255]);
    }

    #[test]
    fn test_luma_masked_ignores_opaque_alpha() {
        let img = RasterImage::new(2, 1, vec![10, 20], Some(vec![255, 255]));
        assert_eq!(img.luma_masked(), vec![10, 20]);
    }

    #[test]
    fn test_crop_clips_to_bounds() {
        let img = checker(4, 4);
        let sub = img.crop(RectI::new(2, 2, 10, 10)).unwrap();
        assert_eq!(sub.width(), 2);
        assert_eq!(sub.height(), 2);
        assert_eq!(sub.luma_at(0, 0), img.luma_at(2, 2));

        assert!(img.crop(RectI::new(10, 10, 20, 20)).is_none());
    }

    #[test]
    fn test_flip_horizontal() {
        let img = RasterImage::from_luma(3, 1, vec![1, 2, 3]);
        let flipped = img.flip_horizontal();
        assert_eq!(flipped.luma(), &[3, 2, 1]);
        // Involution
        assert_eq!(flipped.flip_horizontal().luma(), img.luma());
    }

    #[test]
    fn test_binary_projections() {
        // 4x3: ink column at x=1, ink row at y=2
        let mut b = BinaryImage::blank(4, 3);
        for y in 0..3 {
            b.set(1, y, 0);
        }
        for x in 0..4 {
            b.set(x, 2, 0);
        }
        assert_eq!(b.row_projection(), vec![1, 1, 4]);
        assert_eq!(b.column_projection(RectI::new(0, 0, 3, 2)), vec![1, 3, 1, 1]);
        assert_eq!(b.ink_count(), 6);
    }

    #[test]
    fn test_binary_is_ink_out_of_bounds_is_background() {
        let b = BinaryImage::blank(2, 2);
        assert!(!b.is_ink(-1, 0));
        assert!(!b.is_ink(0, 5));
    }

    #[test]
    fn test_binary_invert() {
        let mut b = BinaryImage::new(2, 1, vec![0, 255]);
        b.invert();
        assert_eq!(b.data(), &[255, 0]);
    }
}
