//! Center-surround saliency map and tiled min/max reduction.
//!
//! The score of a pixel is the LAB distance between the pixel and the mean
//! of its `(2r + 1)²` neighborhood (clipped at the image border). Flat
//! regions score zero; edges and isolated spots score high.
//!
//! The box mean comes from a summed-area table, so cost is independent of
//! the radius.

use serde::{Deserialize, Serialize};

use crate::color_management::lab::rgb_to_lab;
use crate::error::{CoreError, try_alloc};
use crate::image::SourceImage;
use crate::parallel;

/// Default neighborhood radius in pixels.
pub const DEFAULT_RADIUS: u32 = 4;
/// Default reduction tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 16;

/// Per-pixel saliency scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaliencyMap {
    pub width: u32,
    pub height: u32,
    /// Row-major scores. Raw LAB distances unless `normalized` is set.
    pub values: Vec<f32>,
    /// Whether `values` were rescaled to `[0, 1]`.
    pub normalized: bool,
    /// Range statistics of the raw scores.
    pub stats: MinMaxStats,
}

impl SaliencyMap {
    /// Score at `(x, y)`.
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Raw `f32` bytes, for upload to a renderer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.values)
    }
}

/// Per-tile `(min, max)` pairs and their global fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxStats {
    pub tile_size: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
    /// Row-major `(min, max)` per tile.
    pub tiles: Vec<(f32, f32)>,
    /// Global `(min, max)` over all tiles.
    pub global: (f32, f32),
}

impl MinMaxStats {
    /// True when every score is the same, so normalization is undefined.
    pub fn is_flat(&self) -> bool {
        self.global.0 >= self.global.1
    }
}

const EMPTY_RANGE: (f32, f32) = (f32::INFINITY, f32::NEG_INFINITY);

#[inline]
fn combine(a: (f32, f32), b: (f32, f32)) -> (f32, f32) {
    (a.0.min(b.0), a.1.max(b.1))
}

/// Partition `values` into `tile_size`² tiles, reduce each tile to
/// `(min, max)`, then fold the tiles into one global pair.
pub fn reduce_min_max(values: &[f32], width: u32, height: u32, tile_size: u32) -> MinMaxStats {
    let tile_size = tile_size.max(1);
    let tiles_x = width.div_ceil(tile_size);
    let tiles_y = height.div_ceil(tile_size);
    let w = width as usize;
    let ts = tile_size as usize;

    let tiles = parallel::map_indices((tiles_x * tiles_y) as usize, 64, |t| {
        let tx = t % tiles_x as usize;
        let ty = t / tiles_x as usize;
        let x0 = tx * ts;
        let x1 = (x0 + ts).min(w);
        let y0 = ty * ts;
        let y1 = (y0 + ts).min(height as usize);

        let mut range = EMPTY_RANGE;
        for y in y0..y1 {
            let Some(row) = values.get(y * w + x0..y * w + x1) else {
                continue;
            };
            for &v in row {
                range = combine(range, (v, v));
            }
        }
        range
    });

    // Every tile is complete before this fold reads it.
    let global = tiles.iter().copied().fold(EMPTY_RANGE, combine);
    let global = if global.0 > global.1 { (0.0, 0.0) } else { global };

    MinMaxStats {
        tile_size,
        tiles_x,
        tiles_y,
        tiles,
        global,
    }
}

/// Map `values` to `(v − min) / (max − min)` clamped to `[0, 1]`.
///
/// Returns `false` and leaves `values` untouched when `min == max`.
pub fn normalize(values: &mut [f32], stats: &MinMaxStats) -> bool {
    if stats.is_flat() {
        return false;
    }
    let (min, max) = stats.global;
    let span = max - min;
    parallel::for_each_chunk_mut(values, 4096, |_, chunk| {
        for v in chunk {
            *v = ((*v - min) / span).clamp(0.0, 1.0);
        }
    });
    true
}

/// Reusable saliency scratch buffers, sized to one resolution.
#[derive(Debug, Default)]
pub struct SaliencyGenerator {
    width: u32,
    height: u32,
    lab: Vec<[f32; 3]>,
    /// `(width + 1) × (height + 1)` summed-area table of `lab`.
    integral: Vec<[f64; 3]>,
}

impl SaliencyGenerator {
    /// Allocate scratch for a `width`×`height` image.
    pub fn try_new(width: u32, height: u32) -> Result<Self, CoreError> {
        let mut generator = Self::default();
        generator.resize(width, height)?;
        Ok(generator)
    }

    /// Bytes of scratch needed for a `width`×`height` image.
    pub fn byte_size(width: u32, height: u32) -> u64 {
        let px = width as u64 * height as u64;
        let integral = (width as u64 + 1) * (height as u64 + 1);
        px * 12 + integral * 24
    }

    /// Current `(width, height)`.
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Reallocate for a new resolution. Old buffers are released first.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), CoreError> {
        let px = width as usize * height as usize;
        let integral = (width as usize + 1) * (height as usize + 1);
        if (width, height) == (self.width, self.height)
            && self.lab.len() == px
            && self.integral.len() == integral
        {
            return Ok(());
        }
        self.lab = Vec::new();
        self.integral = Vec::new();
        self.lab = try_alloc("saliency lab plane", px, [0.0; 3])?;
        self.integral = try_alloc("saliency integral", integral, [0.0; 3])?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Score every pixel of `image`.
    ///
    /// `radius` is the neighborhood half-width; `tile_size` drives the
    /// min/max reduction. When `normalize_scores` is set and the map is not
    /// flat, values are rescaled to `[0, 1]`.
    pub fn compute(
        &mut self,
        image: &SourceImage,
        radius: u32,
        tile_size: u32,
        normalize_scores: bool,
    ) -> Result<SaliencyMap, CoreError> {
        let (width, height) = (image.width(), image.height());
        if (width, height) != (self.width, self.height) {
            return Err(CoreError::InvalidInput(format!(
                "saliency buffers are {}x{}, image is {}x{}",
                self.width, self.height, width, height
            )));
        }
        let w = width as usize;
        let h = height as usize;
        if image.pixels().len() != w * h {
            return Err(CoreError::InvalidInput("pixel buffer length mismatch".into()));
        }

        // Phase 1: LAB plane.
        let pixels = image.pixels();
        parallel::for_each_chunk_mut(&mut self.lab, w.max(1), |y, row| {
            let src = &pixels[y * w..(y + 1) * w];
            for (dst, px) in row.iter_mut().zip(src) {
                *dst = rgb_to_lab([px[0], px[1], px[2]]);
            }
        });

        // Phase 2: summed-area table. Sequential; each row depends on the last.
        let iw = w + 1;
        self.integral[..iw].fill([0.0; 3]);
        for y in 0..h {
            let mut row_sum = [0.0f64; 3];
            self.integral[(y + 1) * iw] = [0.0; 3];
            for x in 0..w {
                let lab = self.lab[y * w + x];
                for c in 0..3 {
                    row_sum[c] += lab[c] as f64;
                }
                let above = self.integral[y * iw + x + 1];
                self.integral[(y + 1) * iw + x + 1] = [
                    above[0] + row_sum[0],
                    above[1] + row_sum[1],
                    above[2] + row_sum[2],
                ];
            }
        }

        // Phase 3: center-surround scores.
        let mut values = try_alloc("saliency map", w * h, 0.0f32)?;
        let lab = &self.lab;
        let integral = &self.integral;
        let r = radius as usize;
        parallel::for_each_chunk_mut(&mut values, w.max(1), |y, row| {
            let y0 = y.saturating_sub(r);
            let y1 = (y + r + 1).min(h);
            for (x, out) in row.iter_mut().enumerate() {
                let x0 = x.saturating_sub(r);
                let x1 = (x + r + 1).min(w);
                let count = ((x1 - x0) * (y1 - y0)) as f64;

                let mut dist_sq = 0.0f64;
                for c in 0..3 {
                    let sum = integral[y1 * iw + x1][c] - integral[y0 * iw + x1][c]
                        - integral[y1 * iw + x0][c]
                        + integral[y0 * iw + x0][c];
                    let d = lab[y * w + x][c] as f64 - sum / count;
                    dist_sq += d * d;
                }
                *out = dist_sq.sqrt() as f32;
            }
        });

        // Phase 4: range reduction, then optional rescale.
        let stats = reduce_min_max(&values, width, height, tile_size);
        let normalized = normalize_scores && normalize(&mut values, &stats);

        Ok(SaliencyMap {
            width,
            height,
            values,
            normalized,
            stats,
        })
    }
}

/// Compute a saliency map in one shot.
pub fn compute(
    image: &SourceImage,
    radius: u32,
    tile_size: u32,
    normalize_scores: bool,
) -> Result<SaliencyMap, CoreError> {
    SaliencyGenerator::try_new(image.width(), image.height())?.compute(
        image,
        radius,
        tile_size,
        normalize_scores,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spot_image() -> SourceImage {
        SourceImage::from_fn(21, 21, |x, y| {
            if x == 10 && y == 10 {
                [1.0, 0.0, 0.0, 1.0]
            } else {
                [0.4, 0.4, 0.4, 1.0]
            }
        })
    }

    #[test]
    fn test_uniform_image_all_zero() {
        let image = SourceImage::uniform(17, 9, [0.5, 0.5, 0.5, 1.0]);
        let map = compute(&image, DEFAULT_RADIUS, DEFAULT_TILE_SIZE, false).unwrap();
        assert!(map.values.iter().all(|&v| v == 0.0));
        assert!(map.stats.is_flat());
    }

    #[test]
    fn test_flat_map_skips_normalization() {
        let image = SourceImage::uniform(8, 8, [0.2, 0.7, 0.1, 1.0]);
        let map = compute(&image, 2, 4, true).unwrap();
        assert!(!map.normalized);
        assert!(map.values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_spot_is_most_salient() {
        let map = compute(&spot_image(), 3, 8, false).unwrap();
        let center = map.get(10, 10).unwrap();
        let max = map.values.iter().copied().fold(f32::MIN, f32::max);
        assert_eq!(center, max);
        assert!(center > 0.0);
        // Far corners never see the spot.
        assert_eq!(map.get(0, 0), Some(0.0));
    }

    #[test]
    fn test_normalized_values_in_unit_range() {
        let image = SourceImage::from_fn(40, 30, |x, y| {
            [
                (x as f32 * 0.37).sin().abs(),
                (y as f32 * 0.11).cos().abs(),
                ((x + y) % 5) as f32 / 4.0,
                1.0,
            ]
        });
        let map = compute(&image, 3, 16, true).unwrap();
        assert!(map.normalized);
        assert!(map.values.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(map.values.iter().any(|&v| v == 1.0));
        assert!(map.values.iter().any(|&v| v == 0.0));
    }

    #[test]
    fn test_deterministic() {
        let a = compute(&spot_image(), 4, 8, true).unwrap();
        let b = compute(&spot_image(), 4, 8, true).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_reduce_min_max_tiles() {
        // 5x3 map, 2x2 tiles → 3x2 tile grid.
        let values: Vec<f32> = (0..15).map(|v| v as f32).collect();
        let stats = reduce_min_max(&values, 5, 3, 2);
        assert_eq!((stats.tiles_x, stats.tiles_y), (3, 2));
        assert_eq!(stats.tiles[0], (0.0, 6.0));
        assert_eq!(stats.tiles[2], (4.0, 9.0));
        assert_eq!(stats.tiles[5], (14.0, 14.0));
        assert_eq!(stats.global, (0.0, 14.0));
    }

    #[test]
    fn test_normalize_maps_range() {
        let mut values = vec![2.0, 4.0, 6.0];
        let stats = reduce_min_max(&values, 3, 1, 16);
        assert!(normalize(&mut values, &stats));
        assert_eq!(values, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_resolution_mismatch_rejected() {
        let mut generator = SaliencyGenerator::try_new(4, 4).unwrap();
        let image = SourceImage::uniform(3, 4, [0.5; 4]);
        assert!(generator.compute(&image, 1, 4, false).is_err());
    }
}
