//! Scope computation: histogram, vectorscope, waveform, and saliency.
//!
//! Each accumulator owns its counters and runs in two phases: `clear`
//! zeroes the buffer, `gather` folds a [`SourceImage`](crate::SourceImage)
//! into it. Both take `&mut self`, so a gather can never overlap the clear
//! that precedes it.

pub mod histogram;
pub mod saliency;
pub mod vectorscope;
pub mod waveform;

pub use histogram::{Channel, HistogramAccumulator, HistogramDisplay, HistogramResult};
pub use saliency::{MinMaxStats, SaliencyGenerator, SaliencyMap};
pub use vectorscope::{ChromaPolicy, VectorscopeAccumulator, VectorscopeResult};
pub use waveform::{ChannelToggles, WaveformAccumulator, WaveformCell, WaveformResult};

/// Quantize a `[0, 1]` value into one of `levels` bins by flooring.
///
/// Values outside the range land in the first or last bin.
#[inline]
pub(crate) fn quantize(value: f32, levels: usize) -> usize {
    let top = levels.saturating_sub(1);
    let v = value.clamp(0.0, 1.0) * top as f32;
    // NaN casts to 0.
    (v as usize).min(top)
}
