//! Source image representation handed in by the capture collaborator.

use image::{DynamicImage, Rgba32FImage, RgbaImage};

use crate::error::CoreError;

/// A captured frame. Pixels are RGBA in `[0, 1]`, sRGB-encoded, row-major.
///
/// A `SourceImage` is immutable once built; the next capture replaces it.
/// Construction does not validate; the engine calls [`SourceImage::validate`]
/// at its boundary so that a bad frame never reaches the accumulators.
#[derive(Debug, Clone)]
pub struct SourceImage {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl SourceImage {
    /// Wrap an existing row-major RGBA buffer.
    pub fn new(width: u32, height: u32, pixels: Vec<[f32; 4]>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Build an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [f32; 4]) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self::new(width, height, pixels)
    }

    /// A `width`×`height` image where every pixel has the same color.
    pub fn uniform(width: u32, height: u32, rgba: [f32; 4]) -> Self {
        Self::new(width, height, vec![rgba; width as usize * height as usize])
    }

    /// Convert an 8-bit RGBA buffer.
    pub fn from_rgba8(buffer: &RgbaImage) -> Self {
        let pixels = buffer
            .pixels()
            .map(|p| {
                let [r, g, b, a] = p.0;
                [
                    r as f32 / 255.0,
                    g as f32 / 255.0,
                    b as f32 / 255.0,
                    a as f32 / 255.0,
                ]
            })
            .collect();
        Self::new(buffer.width(), buffer.height(), pixels)
    }

    /// Convert a 32-bit float RGBA buffer.
    pub fn from_rgba32f(buffer: &Rgba32FImage) -> Self {
        let pixels = buffer.pixels().map(|p| p.0).collect();
        Self::new(buffer.width(), buffer.height(), pixels)
    }

    /// Convert any decoded image. Integer formats are normalized to `[0, 1]`.
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self::from_rgba32f(&image.to_rgba32f())
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels (`width × height`).
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// All pixels, row-major.
    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.pixels
    }

    /// Pixel at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Iterate over complete rows.
    pub fn rows(&self) -> std::slice::ChunksExact<'_, [f32; 4]> {
        self.pixels.chunks_exact(self.width.max(1) as usize)
    }

    /// Check that the image can be analyzed.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.width == 0 || self.height == 0 {
            return Err(CoreError::InvalidInput(format!(
                "image dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.pixels.len() != self.pixel_count() {
            return Err(CoreError::InvalidInput(format!(
                "expected {} pixels for {}x{}, got {}",
                self.pixel_count(),
                self.width,
                self.height,
                self.pixels.len()
            )));
        }
        Ok(())
    }
}
