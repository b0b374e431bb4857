//! Greedy diversity filtering with an adaptively relaxed threshold.

use serde::{Deserialize, Serialize};

/// Threshold schedule: start high, relax by `step` until `floor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiversitySchedule {
    pub start: f32,
    pub step: f32,
    pub floor: f32,
}

impl Default for DiversitySchedule {
    fn default() -> Self {
        Self {
            start: 0.15,
            step: 0.03,
            floor: 0.05,
        }
    }
}

impl DiversitySchedule {
    /// Check the schedule terminates and stays positive.
    pub fn is_valid(&self) -> bool {
        self.floor > 0.0 && self.start >= self.floor && self.step > 0.0
    }

    /// Every threshold tried, strictly decreasing, ending at `floor`.
    ///
    /// The defaults give `0.15, 0.12, 0.09, 0.06, 0.05`.
    pub fn thresholds(&self) -> Vec<f32> {
        if !self.is_valid() {
            return vec![self.floor.max(0.0)];
        }
        let (start, step, floor) = (self.start as f64, self.step as f64, self.floor as f64);
        let mut out = Vec::new();
        let mut i = 0u32;
        loop {
            let t = start - step * i as f64;
            if t <= floor + 1e-6 {
                out.push(self.floor);
                break;
            }
            out.push(t as f32);
            i += 1;
        }
        out
    }
}

/// Outcome of [`select`].
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Indices into the ranked candidate list, in selection order.
    pub indices: Vec<usize>,
    /// Last threshold tried.
    pub threshold: f32,
    /// Whether some picks ignored the threshold to reach `k`.
    pub backfilled: bool,
}

#[inline]
pub(crate) fn rgb_distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
}

fn greedy(colors: &[[f32; 3]], k: usize, threshold: f32) -> Vec<usize> {
    let mut picked: Vec<usize> = Vec::with_capacity(k);
    for (i, c) in colors.iter().enumerate() {
        if picked.len() == k {
            break;
        }
        if picked
            .iter()
            .all(|&j| rgb_distance(*c, colors[j]) >= threshold)
        {
            picked.push(i);
        }
    }
    picked
}

/// Pick up to `k` colors from `colors` (best first) so that every pair is at
/// least the current threshold apart in RGB.
///
/// Each threshold of the schedule is tried from scratch until one yields
/// `k` picks. Never backfills: when even the floor falls short, fewer than
/// `k` indices come back.
pub fn filter(colors: &[[f32; 3]], k: usize, schedule: &DiversitySchedule) -> Selection {
    let mut threshold = schedule.start;
    let mut picked = Vec::new();

    for t in schedule.thresholds() {
        threshold = t;
        picked = greedy(colors, k, t);
        if picked.len() >= k {
            break;
        }
    }

    Selection {
        indices: picked,
        threshold,
        backfilled: false,
    }
}

/// [`filter`], then append the best remaining candidates regardless of
/// distance until `k` are picked or the candidates run out.
pub fn select(colors: &[[f32; 3]], k: usize, schedule: &DiversitySchedule) -> Selection {
    let mut selection = filter(colors, k, schedule);
    if selection.indices.len() < k {
        let mut taken = vec![false; colors.len()];
        for &i in &selection.indices {
            taken[i] = true;
        }
        for (i, used) in taken.iter().enumerate() {
            if selection.indices.len() == k {
                break;
            }
            if !used {
                selection.indices.push(i);
                selection.backfilled = true;
            }
        }
    }
    selection
}
