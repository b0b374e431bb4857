//! RGB + luminance histogram computation.

use serde::{Deserialize, Serialize};

use super::quantize;
use crate::color_management::luma;
use crate::image::SourceImage;
use crate::parallel;

/// Bins per channel.
pub const BINS: usize = 256;

/// Histogram channel, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Red,
    Green,
    Blue,
    Luma,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Red, Channel::Green, Channel::Blue, Channel::Luma];

    /// Index into [`HistogramResult::bins`].
    pub const fn index(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
            Self::Luma => 3,
        }
    }
}

/// Histogram data for R, G, B, and luminance channels (256 bins each).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramResult {
    /// Bin counts for `[R, G, B, Luma]` channels. Each `Vec` has 256 entries.
    pub bins: [Vec<u32>; 4],
    /// Peak bin value across all channels (for normalization).
    pub peak: u32,
}

/// Display-side shaping of histogram counts.
///
/// Visibility does not affect accumulation; every channel is always counted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramDisplay {
    /// Per-channel visibility for `[R, G, B, Luma]`.
    pub visible: [bool; 4],
    /// Use `ln(1 + count)` instead of raw counts.
    pub log_scale: bool,
    /// Gain applied after normalization, before clamping to 1.
    pub amplification: f32,
}

impl Default for HistogramDisplay {
    fn default() -> Self {
        Self {
            visible: [true; 4],
            log_scale: false,
            amplification: 1.0,
        }
    }
}

impl HistogramResult {
    /// Counts for one channel.
    pub fn channel(&self, channel: Channel) -> &[u32] {
        &self.bins[channel.index()]
    }

    /// Sum of one channel's bins. Equals the pixel count of the source image.
    pub fn total(&self, channel: Channel) -> u64 {
        self.channel(channel).iter().map(|&c| c as u64).sum()
    }

    /// Normalized bar heights in `[0, 1]` for each channel.
    ///
    /// Heights are relative to the tallest bin among visible channels.
    /// Hidden channels come back as all zeros.
    pub fn levels(&self, display: &HistogramDisplay) -> [Vec<f32>; 4] {
        let shape = |count: u32| -> f32 {
            if display.log_scale {
                (count as f32).ln_1p()
            } else {
                count as f32
            }
        };

        let peak = Channel::ALL
            .iter()
            .filter(|c| display.visible[c.index()])
            .flat_map(|c| self.channel(*c).iter().copied())
            .max()
            .unwrap_or(0);
        let denom = shape(peak);

        std::array::from_fn(|i| {
            if !display.visible[i] || denom <= 0.0 {
                return vec![0.0; BINS];
            }
            self.bins[i]
                .iter()
                .map(|&c| (shape(c) / denom * display.amplification).clamp(0.0, 1.0))
                .collect()
        })
    }

    /// Raw `u32` bytes in `[R, G, B, Luma]` order, for upload to a renderer.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bins
            .iter()
            .flat_map(|ch| bytemuck::cast_slice::<u32, u8>(ch).iter().copied())
            .collect()
    }
}

type Tally = Box<[[u32; BINS]; 4]>;

fn empty_tally() -> Tally {
    Box::new([[0u32; BINS]; 4])
}

/// Accumulates 256×4 bins.
///
/// Each worker counts into its own tally; tallies are merged by addition,
/// so the result does not depend on how rows were split.
#[derive(Debug, Clone)]
pub struct HistogramAccumulator {
    bins: Tally,
}

impl Default for HistogramAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl HistogramAccumulator {
    /// Create a zeroed accumulator.
    pub fn new() -> Self {
        Self { bins: empty_tally() }
    }

    /// Bytes held by the counters.
    pub const fn byte_size() -> u64 {
        (BINS * 4 * 4) as u64
    }

    /// Zero every counter.
    pub fn clear(&mut self) {
        for ch in self.bins.iter_mut() {
            ch.fill(0);
        }
    }

    /// Add every pixel of `image` to the counters.
    pub fn gather(&mut self, image: &SourceImage) {
        let width = image.width().max(1) as usize;
        let tally = parallel::fold_reduce_chunks(
            image.pixels(),
            width,
            empty_tally,
            |mut acc, _, row| {
                for px in row {
                    let rgb = [px[0], px[1], px[2]];
                    acc[0][quantize(rgb[0], BINS)] += 1;
                    acc[1][quantize(rgb[1], BINS)] += 1;
                    acc[2][quantize(rgb[2], BINS)] += 1;
                    acc[3][quantize(luma(rgb), BINS)] += 1;
                }
                acc
            },
            merge,
        );
        self.bins = merge(std::mem::replace(&mut self.bins, empty_tally()), tally);
    }

    /// Snapshot the current counters.
    pub fn result(&self) -> HistogramResult {
        let bins: [Vec<u32>; 4] = std::array::from_fn(|i| self.bins[i].to_vec());
        let peak = bins
            .iter()
            .flat_map(|ch| ch.iter().copied())
            .max()
            .unwrap_or(0);
        HistogramResult { bins, peak }
    }
}

fn merge(mut a: Tally, b: Tally) -> Tally {
    for (dst, src) in a.iter_mut().zip(b.iter()) {
        for (d, s) in dst.iter_mut().zip(src.iter()) {
            *d += s;
        }
    }
    a
}

/// Compute a histogram in one shot.
pub fn compute(image: &SourceImage) -> HistogramResult {
    let mut acc = HistogramAccumulator::new();
    acc.gather(image);
    acc.result()
}
