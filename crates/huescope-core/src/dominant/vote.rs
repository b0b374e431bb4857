//! Parallel color voting into a fixed-size palette buffer.
//!
//! Every visible pixel votes for the slot of its quantized RGB color. A
//! slot tracks its vote count, an importance score, and the running color
//! sum so the slot can report the mean color of its voters. All tallies are
//! integers (colors and importance in fixed point), so merging per-thread
//! tallies gives the same bits whatever the split.

use crate::error::{CoreError, try_alloc};
use crate::parallel;

/// Quantization bits per RGB channel.
pub const SLOT_BITS: u32 = 4;
/// Palette buffer slots (`2^(3 × SLOT_BITS)`).
pub const SLOTS: usize = 1 << (3 * SLOT_BITS);

const COLOR_SCALE: f32 = 65_535.0;
const IMPORTANCE_SCALE: f32 = 1_024.0;
/// Importance a fully neutral pixel still contributes.
const IMPORTANCE_BASE: f32 = 0.25;

/// Tally for one palette slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteSlot {
    pub votes: u32,
    /// Sum of per-vote importance in `1 / 1024` units.
    pub importance: u64,
    /// Sum of voter colors in `1 / 65535` units.
    pub color_sum: [u64; 3],
}

impl VoteSlot {
    fn merge(&mut self, other: &VoteSlot) {
        self.votes += other.votes;
        self.importance += other.importance;
        for c in 0..3 {
            self.color_sum[c] += other.color_sum[c];
        }
    }

    /// Mean color of the voters.
    pub fn mean_color(&self) -> [f32; 3] {
        let n = self.votes.max(1) as f64;
        self.color_sum
            .map(|s| (s as f64 / n / COLOR_SCALE as f64) as f32)
    }

    /// Mean importance per vote.
    pub fn mean_importance(&self) -> f32 {
        (self.importance as f64 / self.votes.max(1) as f64 / IMPORTANCE_SCALE as f64) as f32
    }

    /// Ranking key: votes × mean importance.
    pub fn score(&self) -> f64 {
        self.importance as f64 / IMPORTANCE_SCALE as f64
    }
}

/// A ranked slot ready for diversity filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub slot: usize,
    pub rgb: [f32; 3],
    pub votes: u32,
    pub importance: f32,
    pub score: f64,
}

/// Slot index for an RGB color.
#[inline]
pub fn slot_of(rgb: [f32; 3]) -> usize {
    let levels = 1usize << SLOT_BITS;
    let q = |c: f32| crate::scopes::quantize(c, levels);
    (q(rgb[0]) << (2 * SLOT_BITS)) | (q(rgb[1]) << SLOT_BITS) | q(rgb[2])
}

/// Per-vote importance: chroma-weighted so saturated colors outrank
/// equally common grays.
#[inline]
pub fn importance_of(rgb: [f32; 3]) -> f32 {
    let max = rgb[0].max(rgb[1]).max(rgb[2]).clamp(0.0, 1.0);
    let min = rgb[0].min(rgb[1]).min(rgb[2]).clamp(0.0, 1.0);
    IMPORTANCE_BASE + (max - min)
}

fn vote(slots: &mut [VoteSlot], px: &[f32; 4]) {
    if px[3] <= 0.0 {
        return;
    }
    let rgb = [px[0], px[1], px[2]].map(|c| c.clamp(0.0, 1.0));
    let slot = &mut slots[slot_of(rgb)];
    slot.votes += 1;
    slot.importance += (importance_of(rgb) * IMPORTANCE_SCALE).round() as u64;
    for c in 0..3 {
        slot.color_sum[c] += (rgb[c] * COLOR_SCALE).round() as u64;
    }
}

/// The palette buffer.
#[derive(Debug, Clone)]
pub struct VoteAccumulator {
    slots: Vec<VoteSlot>,
}

impl VoteAccumulator {
    /// Allocate a zeroed buffer.
    pub fn try_new() -> Result<Self, CoreError> {
        Ok(Self {
            slots: try_alloc("palette vote buffer", SLOTS, VoteSlot::default())?,
        })
    }

    /// Bytes held by the buffer.
    pub fn byte_size() -> u64 {
        (SLOTS * std::mem::size_of::<VoteSlot>()) as u64
    }

    /// Zero every slot.
    pub fn clear(&mut self) {
        self.slots.fill(VoteSlot::default());
    }

    /// Cast one vote per visible pixel of a row-major plane.
    pub fn gather(&mut self, pixels: &[[f32; 4]], width: usize) {
        let tally = parallel::fold_reduce_chunks(
            pixels,
            width.max(1),
            || vec![VoteSlot::default(); SLOTS],
            |mut acc, _, row| {
                for px in row {
                    vote(&mut acc, px);
                }
                acc
            },
            |mut a, b| {
                for (dst, src) in a.iter_mut().zip(&b) {
                    dst.merge(src);
                }
                a
            },
        );
        for (dst, src) in self.slots.iter_mut().zip(&tally) {
            dst.merge(src);
        }
    }

    /// Total votes cast.
    pub fn total_votes(&self) -> u64 {
        self.slots.iter().map(|s| s.votes as u64).sum()
    }

    /// Slots with at least `min_votes` votes, best first.
    ///
    /// Ties on score fall back to slot order.
    pub fn ranked(&self, min_votes: u32) -> Vec<Candidate> {
        let mut out: Vec<Candidate> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.votes > 0 && s.votes >= min_votes)
            .map(|(slot, s)| Candidate {
                slot,
                rgb: s.mean_color(),
                votes: s.votes,
                importance: s.mean_importance(),
                score: s.score(),
            })
            .collect();
        out.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.slot.cmp(&b.slot)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_of_corners() {
        assert_eq!(slot_of([0.0, 0.0, 0.0]), 0);
        assert_eq!(slot_of([1.0, 1.0, 1.0]), SLOTS - 1);
        assert_ne!(slot_of([1.0, 0.0, 0.0]), slot_of([0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_votes_and_mean_color() {
        let mut acc = VoteAccumulator::try_new().unwrap();
        let pixels = vec![[0.8, 0.1, 0.1, 1.0]; 10];
        acc.gather(&pixels, 5);
        let ranked = acc.ranked(1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].votes, 10);
        for (a, b) in ranked[0].rgb.iter().zip([0.8, 0.1, 0.1]) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_saturated_outranks_equal_gray() {
        let mut pixels = vec![[0.5, 0.5, 0.5, 1.0]; 10];
        pixels.extend(vec![[0.9, 0.1, 0.1, 1.0]; 10]);
        let mut acc = VoteAccumulator::try_new().unwrap();
        acc.gather(&pixels, 4);
        let ranked = acc.ranked(1);
        assert_eq!(ranked[0].votes, 10);
        assert!(ranked[0].rgb[0] > 0.8);
    }

    #[test]
    fn test_transparent_pixels_do_not_vote() {
        let mut acc = VoteAccumulator::try_new().unwrap();
        acc.gather(&[[0.3, 0.3, 0.3, 0.0]; 8], 4);
        assert_eq!(acc.total_votes(), 0);
        assert!(acc.ranked(1).is_empty());
    }

    #[test]
    fn test_min_votes_filters() {
        let mut pixels = vec![[0.1, 0.2, 0.9, 1.0]; 5];
        pixels.push([0.9, 0.9, 0.1, 1.0]);
        let mut acc = VoteAccumulator::try_new().unwrap();
        acc.gather(&pixels, 6);
        assert_eq!(acc.ranked(1).len(), 2);
        assert_eq!(acc.ranked(2).len(), 1);
    }

    #[test]
    fn test_parallel_tally_matches_sequential() {
        let pixels: Vec<[f32; 4]> = (0..40_000)
            .map(|i| {
                let t = i as f32 / 40_000.0;
                [t, 1.0 - t, (t * 7.0).fract(), 1.0]
            })
            .collect();
        let mut par = VoteAccumulator::try_new().unwrap();
        par.gather(&pixels, 200);

        let mut seq = VoteAccumulator::try_new().unwrap();
        for row in pixels.chunks(200) {
            seq.gather(row, 200);
        }
        assert_eq!(par.total_votes(), 40_000);
        assert_eq!(par.slots, seq.slots);
    }

    #[test]
    fn test_clear_resets() {
        let mut acc = VoteAccumulator::try_new().unwrap();
        acc.gather(&[[0.5, 0.2, 0.1, 1.0]; 4], 2);
        acc.clear();
        assert_eq!(acc.total_votes(), 0);
    }
}
