//! Waveform scope computation.
//!
//! Plots pixel intensity vs. horizontal position. The buffer has one cell
//! per `(column, row)` of the source image; the row is the quantized
//! intensity, with full intensity at row 0:
//!
//! ```text
//! row = (height − 1) − floor(clamp(v, 0, 1) × (height − 1))
//! cell index = row × width + column
//! ```
//!
//! Each cell carries an independent counter for R, G and B.

use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use super::quantize;
use crate::error::{CoreError, try_alloc_atomic};
use crate::image::SourceImage;
use crate::parallel;

/// Which RGB channels are accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelToggles {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
}

impl Default for ChannelToggles {
    fn default() -> Self {
        Self {
            red: true,
            green: true,
            blue: true,
        }
    }
}

impl ChannelToggles {
    /// Toggles as an array in `[R, G, B]` order.
    pub const fn as_array(self) -> [bool; 3] {
        [self.red, self.green, self.blue]
    }

    /// True when no channel is enabled.
    pub const fn is_empty(self) -> bool {
        !(self.red || self.green || self.blue)
    }
}

/// One waveform cell: per-channel hit counts.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
pub struct WaveformCell {
    pub r: u32,
    pub g: u32,
    pub b: u32,
}

impl WaveformCell {
    /// Counter for channel `ch` (0 = R, 1 = G, 2 = B).
    pub fn channel(&self, ch: usize) -> u32 {
        match ch {
            0 => self.r,
            1 => self.g,
            _ => self.b,
        }
    }
}

/// Waveform scope data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformResult {
    /// Width of the waveform display in columns.
    pub width: u32,
    /// Height of the waveform display in rows.
    pub height: u32,
    /// Channels that were accumulated.
    pub channels: ChannelToggles,
    /// `width × height` cells, row-major.
    pub cells: Vec<WaveformCell>,
}

impl WaveformResult {
    /// Cell at `(column, row)`.
    pub fn cell(&self, column: u32, row: u32) -> Option<WaveformCell> {
        if column >= self.width || row >= self.height {
            return None;
        }
        self.cells
            .get(row as usize * self.width as usize + column as usize)
            .copied()
    }

    /// Sum of channel `ch` over every row of `column`.
    pub fn column_total(&self, ch: usize, column: u32) -> u64 {
        (0..self.height)
            .filter_map(|row| self.cell(column, row))
            .map(|c| c.channel(ch) as u64)
            .sum()
    }

    /// Sum of channel `ch` over the whole buffer.
    pub fn total(&self, ch: usize) -> u64 {
        self.cells.iter().map(|c| c.channel(ch) as u64).sum()
    }

    /// Raw bytes (`[r, g, b]` u32 triplets), for upload to a renderer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.cells)
    }
}

/// Intensity row for a channel value in a waveform of `height` rows.
#[inline]
pub fn intensity_row(value: f32, height: u32) -> u32 {
    let levels = height.max(1) as usize;
    (levels - 1 - quantize(value, levels)) as u32
}

/// Atomic per-`(column, row, channel)` counters sized to the image.
#[derive(Debug)]
pub struct WaveformAccumulator {
    width: u32,
    height: u32,
    channels: ChannelToggles,
    counters: Vec<AtomicU32>,
}

impl WaveformAccumulator {
    /// Allocate zeroed counters for a `width`×`height` image.
    pub fn try_new(width: u32, height: u32, channels: ChannelToggles) -> Result<Self, CoreError> {
        Ok(Self {
            width,
            height,
            channels,
            counters: try_alloc_atomic("waveform buffer", counter_count(width, height))?,
        })
    }

    /// Bytes needed for a `width`×`height` buffer.
    pub fn byte_size(width: u32, height: u32) -> u64 {
        counter_count(width, height) as u64 * 4
    }

    /// Current `(width, height)`.
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Enabled channels.
    pub fn channels(&self) -> ChannelToggles {
        self.channels
    }

    /// Change which channels the next gather accumulates.
    pub fn set_channels(&mut self, channels: ChannelToggles) {
        self.channels = channels;
    }

    /// Reallocate for a new resolution. The old buffer is released first.
    /// Does nothing when the resolution is unchanged.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), CoreError> {
        let needed = counter_count(width, height);
        if (width, height) == (self.width, self.height) && self.counters.len() == needed {
            return Ok(());
        }
        self.counters = Vec::new();
        self.counters = try_alloc_atomic("waveform buffer", needed)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Zero every counter.
    pub fn clear(&mut self) {
        for c in self.counters.iter_mut() {
            *c.get_mut() = 0;
        }
    }

    /// Accumulate the enabled channels of `image`.
    ///
    /// The image must match the buffer resolution; call
    /// [`resize`](Self::resize) first.
    pub fn gather(&mut self, image: &SourceImage) -> Result<(), CoreError> {
        if (image.width(), image.height()) != (self.width, self.height)
            || self.counters.len() != counter_count(self.width, self.height)
        {
            return Err(CoreError::InvalidInput(format!(
                "waveform buffer is {}x{}, image is {}x{}",
                self.width,
                self.height,
                image.width(),
                image.height()
            )));
        }

        let enabled = self.channels.as_array();
        if !enabled.contains(&true) {
            return Ok(());
        }

        let width = self.width as usize;
        let height = self.height;
        let counters = &self.counters;

        parallel::for_each_chunk(image.pixels(), width, |_, row| {
            for (x, px) in row.iter().enumerate() {
                for ch in 0..3 {
                    if !enabled[ch] {
                        continue;
                    }
                    let wf_row = intensity_row(px[ch], height) as usize;
                    counters[(wf_row * width + x) * 3 + ch].fetch_add(1, Ordering::Relaxed);
                }
            }
        });
        Ok(())
    }

    /// Snapshot the current counters.
    pub fn result(&self) -> WaveformResult {
        let cells = self
            .counters
            .chunks_exact(3)
            .map(|c| WaveformCell {
                r: c[0].load(Ordering::Relaxed),
                g: c[1].load(Ordering::Relaxed),
                b: c[2].load(Ordering::Relaxed),
            })
            .collect();
        WaveformResult {
            width: self.width,
            height: self.height,
            channels: self.channels,
            cells,
        }
    }
}

fn counter_count(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

/// Compute a waveform in one shot.
pub fn compute(image: &SourceImage, channels: ChannelToggles) -> Result<WaveformResult, CoreError> {
    let mut acc = WaveformAccumulator::try_new(image.width(), image.height(), channels)?;
    acc.gather(image)?;
    Ok(acc.result())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_pixel_counts_match() {
        let image = SourceImage::uniform(4, 5, [0.3, 0.6, 0.9, 1.0]);
        let wf = compute(&image, ChannelToggles::default()).unwrap();
        assert_eq!(wf.cells.len(), 20);
        for ch in 0..3 {
            assert_eq!(wf.total(ch), 20);
            for column in 0..4 {
                assert_eq!(wf.column_total(ch, column), 5);
            }
        }
    }

    #[test]
    fn test_waveform_full_intensity_at_top() {
        let image = SourceImage::uniform(3, 10, [1.0, 0.0, 0.5, 1.0]);
        let wf = compute(&image, ChannelToggles::default()).unwrap();
        assert_eq!(wf.cell(0, 0).unwrap().r, 10);
        assert_eq!(wf.cell(0, 9).unwrap().g, 10);
        // 0.5 * 9 = 4.5 → floor 4 → row 5
        assert_eq!(wf.cell(2, 5).unwrap().b, 10);
    }

    #[test]
    fn test_disabled_channel_not_accumulated() {
        let image = SourceImage::uniform(4, 4, [0.2, 0.4, 0.6, 1.0]);
        let channels = ChannelToggles {
            red: true,
            green: false,
            blue: true,
        };
        let wf = compute(&image, channels).unwrap();
        assert_eq!(wf.total(0), 16);
        assert_eq!(wf.total(1), 0);
        assert_eq!(wf.total(2), 16);
        assert_eq!(wf.channels, channels);
    }

    #[test]
    fn test_toggle_takes_effect_on_next_gather() {
        let image = SourceImage::uniform(2, 2, [0.2, 0.4, 0.6, 1.0]);
        let mut acc = WaveformAccumulator::try_new(2, 2, ChannelToggles::default()).unwrap();
        acc.gather(&image).unwrap();
        assert_eq!(acc.result().total(1), 4);

        acc.set_channels(ChannelToggles {
            green: false,
            ..Default::default()
        });
        acc.clear();
        acc.gather(&image).unwrap();
        assert_eq!(acc.result().total(1), 0);
        assert_eq!(acc.result().total(0), 4);
    }

    #[test]
    fn test_resolution_mismatch_rejected() {
        let mut acc = WaveformAccumulator::try_new(4, 4, ChannelToggles::default()).unwrap();
        let image = SourceImage::uniform(5, 4, [0.5; 4]);
        assert!(acc.gather(&image).is_err());

        acc.resize(5, 4).unwrap();
        assert!(acc.gather(&image).is_ok());
        assert_eq!(acc.result().total(0), 20);
    }

    #[test]
    fn test_parallel_gather_loses_no_updates() {
        let image = SourceImage::from_fn(200, 150, |x, y| {
            [x as f32 / 199.0, y as f32 / 149.0, 0.5, 1.0]
        });
        let wf = compute(&image, ChannelToggles::default()).unwrap();
        for ch in 0..3 {
            assert_eq!(wf.total(ch), 30_000);
        }
    }

    #[test]
    fn test_cell_bytes_are_packed() {
        let wf = compute(&SourceImage::uniform(2, 3, [0.0; 4]), ChannelToggles::default()).unwrap();
        assert_eq!(wf.as_bytes().len(), 2 * 3 * 12);
    }
}
