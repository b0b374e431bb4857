//! Vectorscope (chromaticity) scope computation.
//!
//! Projects each pixel's chrominance onto a 2D grid using BT.709 Cb/Cr
//! (blue-difference and red-difference chroma) axes:
//!
//! ```text
//! Y  = 0.2126 R + 0.7152 G + 0.0722 B
//! Cb = (B − Y) / 1.8556        ∈ [−0.5, 0.5] for in-gamut input
//! Cr = (R − Y) / 1.5748        ∈ [−0.5, 0.5] for in-gamut input
//!
//! column = floor((Cb + 0.5) × N)   (blue to the right)
//! row    = floor((0.5 − Cr) × N)   (red at the top)
//! ```
//!
//! The center of the grid represents neutral (achromatic) colors. Pixels
//! outside `[0, 1]` can leave the chroma square; [`ChromaPolicy`] decides
//! whether they are clamped to the nearest edge bucket or dropped.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, try_alloc_atomic};
use crate::image::SourceImage;
use crate::parallel;

/// Default vectorscope grid resolution.
pub const DEFAULT_GRID_SIZE: u32 = 256;

/// Slack allowed past the chroma square before a sample counts as outside.
const RANGE_TOLERANCE: f32 = 1e-4;

/// Fraction of a bucket added before flooring so that neutral input,
/// whose chroma is zero only up to rounding, lands on the center bucket.
const BUCKET_BIAS: f32 = 1e-3;

/// What to do with a chroma sample that falls outside the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChromaPolicy {
    /// Count it in the nearest edge bucket. Totals always equal the pixel count.
    #[default]
    Clamp,
    /// Skip it. Totals may fall short of the pixel count.
    Drop,
}

/// Vectorscope density grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorscopeResult {
    /// Resolution of the square vectorscope grid.
    pub size: u32,
    /// Density values for each grid cell, row-major. Length = size².
    pub counts: Vec<u32>,
    /// Samples discarded under [`ChromaPolicy::Drop`].
    pub dropped: u64,
}

impl VectorscopeResult {
    /// Sum of all buckets.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }

    /// Count at `(column, row)`.
    pub fn get(&self, column: u32, row: u32) -> Option<u32> {
        if column >= self.size || row >= self.size {
            return None;
        }
        self.counts.get(cell_index(self.size, column, row)).copied()
    }

    /// Indices of non-empty buckets.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.counts
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, c)| c > 0)
    }

    /// Raw `u32` bytes, for upload to a renderer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.counts)
    }
}

/// Map an RGB triplet to `(Cb, Cr)`.
#[inline]
pub fn chroma(rgb: [f32; 3]) -> (f32, f32) {
    let y = 0.2126 * rgb[0] + 0.7152 * rgb[1] + 0.0722 * rgb[2];
    ((rgb[2] - y) / 1.8556, (rgb[0] - y) / 1.5748)
}

/// Map an RGB triplet to a `(column, row)` bucket, or `None` when it falls
/// outside the grid and `policy` is [`ChromaPolicy::Drop`].
#[inline]
pub fn bucket(rgb: [f32; 3], size: u32, policy: ChromaPolicy) -> Option<(u32, u32)> {
    let (cb, cr) = chroma(rgb);
    let u = cb + 0.5;
    let v = 0.5 - cr;

    let inside = |t: f32| (-RANGE_TOLERANCE..=1.0 + RANGE_TOLERANCE).contains(&t);
    if policy == ChromaPolicy::Drop && !(inside(u) && inside(v)) {
        return None;
    }

    let n = size as f32;
    let top = size.saturating_sub(1);
    let to_cell = |t: f32| ((t.clamp(0.0, 1.0) * n + BUCKET_BIAS) as u32).min(top);
    Some((to_cell(u), to_cell(v)))
}

/// Atomic N×N occupancy grid.
#[derive(Debug)]
pub struct VectorscopeAccumulator {
    size: u32,
    policy: ChromaPolicy,
    cells: Vec<AtomicU32>,
    dropped: AtomicU64,
}

impl VectorscopeAccumulator {
    /// Allocate a zeroed `size`×`size` grid.
    pub fn try_new(size: u32, policy: ChromaPolicy) -> Result<Self, CoreError> {
        if size == 0 {
            return Err(CoreError::InvalidParameter(
                "vectorscope grid size must be non-zero".into(),
            ));
        }
        Ok(Self {
            size,
            policy,
            cells: try_alloc_atomic("vectorscope grid", cell_count(size))?,
            dropped: AtomicU64::new(0),
        })
    }

    /// Bytes needed for a `size`×`size` grid.
    pub fn byte_size(size: u32) -> u64 {
        cell_count(size) as u64 * 4
    }

    /// Grid resolution.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Out-of-range policy.
    pub fn policy(&self) -> ChromaPolicy {
        self.policy
    }

    /// Change the out-of-range policy. Takes effect on the next gather.
    pub fn set_policy(&mut self, policy: ChromaPolicy) {
        self.policy = policy;
    }

    /// Reallocate for a new grid size. The old grid is released first.
    /// Does nothing when the size is unchanged.
    ///
    /// On failure the grid stays empty: gathers count nothing until a
    /// later resize succeeds.
    pub fn resize(&mut self, size: u32) -> Result<(), CoreError> {
        if size == self.size && self.cells.len() == cell_count(size) {
            return Ok(());
        }
        if size == 0 {
            return Err(CoreError::InvalidParameter(
                "vectorscope grid size must be non-zero".into(),
            ));
        }
        self.cells = Vec::new();
        self.cells = try_alloc_atomic("vectorscope grid", cell_count(size))?;
        self.size = size;
        self.dropped.store(0, Ordering::Relaxed);
        Ok(())
    }

    /// Zero every bucket.
    pub fn clear(&mut self) {
        for c in self.cells.iter_mut() {
            *c.get_mut() = 0;
        }
        *self.dropped.get_mut() = 0;
    }

    /// Add every pixel of `image` to the grid.
    pub fn gather(&mut self, image: &SourceImage) {
        let size = self.size;
        let policy = self.policy;
        let cells = &self.cells;
        let dropped = &self.dropped;
        if cells.len() != cell_count(size) {
            return;
        }

        parallel::for_each_chunk(image.pixels(), image.width().max(1) as usize, |_, row| {
            let mut lost = 0u64;
            for px in row {
                match bucket([px[0], px[1], px[2]], size, policy) {
                    Some((x, y)) => {
                        cells[cell_index(size, x, y)].fetch_add(1, Ordering::Relaxed);
                    }
                    None => lost += 1,
                }
            }
            if lost > 0 {
                dropped.fetch_add(lost, Ordering::Relaxed);
            }
        });
    }

    /// Snapshot the current grid.
    pub fn result(&self) -> VectorscopeResult {
        VectorscopeResult {
            size: self.size,
            counts: self.cells.iter().map(|c| c.load(Ordering::Relaxed)).collect(),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

fn cell_count(size: u32) -> usize {
    size as usize * size as usize
}

#[inline]
fn cell_index(size: u32, column: u32, row: u32) -> usize {
    row as usize * size as usize + column as usize
}

/// Compute a vectorscope in one shot.
pub fn compute(
    image: &SourceImage,
    size: u32,
    policy: ChromaPolicy,
) -> Result<VectorscopeResult, CoreError> {
    let mut acc = VectorscopeAccumulator::try_new(size, policy)?;
    acc.gather(image);
    Ok(acc.result())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vectorscope_neutral_concentrates_at_center() {
        let image = SourceImage::uniform(10, 10, [0.5, 0.5, 0.5, 1.0]);
        let vs = compute(&image, 64, ChromaPolicy::Clamp).unwrap();
        assert_eq!(vs.total(), 100);
        assert_eq!(vs.get(32, 32), Some(100));
    }

    #[test]
    fn test_vectorscope_black_single_bucket() {
        let image = SourceImage::uniform(7, 3, [0.0, 0.0, 0.0, 1.0]);
        let vs = compute(&image, DEFAULT_GRID_SIZE, ChromaPolicy::Clamp).unwrap();
        let occupied: Vec<_> = vs.occupied().collect();
        assert_eq!(occupied.len(), 1);
        assert_eq!(occupied[0].1, 21);
    }

    #[test]
    fn test_vectorscope_primaries_stay_in_range() {
        let primaries = [
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 1.0],
            [1.0, 0.0, 1.0],
        ];
        for rgb in primaries {
            assert!(bucket(rgb, 128, ChromaPolicy::Drop).is_some(), "{rgb:?}");
        }
        // Blue sits on the right edge, red on the top edge.
        assert_eq!(bucket([0.0, 0.0, 1.0], 128, ChromaPolicy::Drop).unwrap().0, 127);
        assert_eq!(bucket([1.0, 0.0, 0.0], 128, ChromaPolicy::Drop).unwrap().1, 0);
    }

    #[test]
    fn test_out_of_range_clamp_keeps_total() {
        let mut pixels = vec![[0.5, 0.5, 0.5, 1.0]; 8];
        pixels.push([0.0, 0.0, 4.0, 1.0]);
        pixels.push([-2.0, 1.0, 0.0, 1.0]);
        let image = SourceImage::new(5, 2, pixels);

        let vs = compute(&image, 32, ChromaPolicy::Clamp).unwrap();
        assert_eq!(vs.total(), 10);
        assert_eq!(vs.dropped, 0);
        // Cb saturates to the right edge; Cr stays inside.
        assert_eq!(vs.get(31, 21), Some(1));
    }

    #[test]
    fn test_out_of_range_drop_loses_samples() {
        let mut pixels = vec![[0.5, 0.5, 0.5, 1.0]; 8];
        pixels.push([0.0, 0.0, 4.0, 1.0]);
        pixels.push([-2.0, 1.0, 0.0, 1.0]);
        let image = SourceImage::new(5, 2, pixels);

        let vs = compute(&image, 32, ChromaPolicy::Drop).unwrap();
        assert_eq!(vs.total(), 8);
        assert_eq!(vs.dropped, 2);
    }

    #[test]
    fn test_resize_releases_and_zeroes() {
        let image = SourceImage::uniform(4, 4, [0.3, 0.6, 0.2, 1.0]);
        let mut acc = VectorscopeAccumulator::try_new(16, ChromaPolicy::Clamp).unwrap();
        acc.gather(&image);
        acc.resize(48).unwrap();
        let vs = acc.result();
        assert_eq!(vs.size, 48);
        assert_eq!(vs.counts.len(), 48 * 48);
        assert_eq!(vs.total(), 0);
    }

    #[test]
    fn test_failed_resize_leaves_empty_grid() {
        let image = SourceImage::uniform(4, 4, [0.3, 0.6, 0.2, 1.0]);
        let mut acc = VectorscopeAccumulator::try_new(16, ChromaPolicy::Clamp).unwrap();
        assert!(matches!(acc.resize(u32::MAX), Err(CoreError::Allocation { .. })));
        acc.clear();
        acc.gather(&image);
        assert_eq!(acc.result().total(), 0);

        acc.resize(16).unwrap();
        acc.gather(&image);
        assert_eq!(acc.result().total(), 16);
    }

    #[test]
    fn test_large_grid_index_does_not_overflow() {
        let vs = VectorscopeResult {
            size: 70_000,
            counts: Vec::new(),
            dropped: 0,
        };
        assert_eq!(vs.get(69_999, 69_999), None);
        assert_eq!(cell_index(70_000, 69_999, 69_999), 70_000 * 70_000 - 1);
    }

    #[test]
    fn test_parallel_gather_loses_no_updates() {
        let image = SourceImage::from_fn(256, 256, |x, y| {
            [x as f32 / 255.0, y as f32 / 255.0, 0.5, 1.0]
        });
        let vs = compute(&image, 64, ChromaPolicy::Clamp).unwrap();
        assert_eq!(vs.total(), 256 * 256);
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(VectorscopeAccumulator::try_new(0, ChromaPolicy::Clamp).is_err());
    }
}
