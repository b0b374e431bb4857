//! Dominant color extraction.
//!
//! Two strategies share one contract: at most `K` colors, deterministic for
//! a given image, parameters and seed.
//!
//! **K-means** (default)
//! 1. Box-downsample by a fixed factor per axis.
//! 2. Stride-sample up to `max_samples` pixels.
//! 3. Convert samples to LAB.
//! 4. If there are no more distinct samples than `K`, return them as-is.
//! 5. Otherwise seed with K-means++ and run capped Lloyd iterations.
//! 6. Convert centroids back to RGB.
//! 7. Greedy diversity filter with a relaxing threshold, no backfill: a
//!    centroid too close to a better one is merged into its nearest kept
//!    neighbour.
//!
//! **Vote**
//! 1. Every downsampled pixel votes for its quantized slot in a palette
//!    buffer (parallel, integer tallies).
//! 2. Rank slots by votes × importance.
//! 3. Greedy diversity filter with a relaxing threshold, then backfill.
//! 4. With no candidates at all, sample a 3×3 grid of the full image.

pub mod diversity;
pub mod kmeans;
pub mod sampling;
pub mod vote;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::color_management::lab::lab_to_rgb;
use crate::error::CoreError;
use crate::image::SourceImage;

pub use diversity::DiversitySchedule;
use sampling::Sample;
use vote::VoteAccumulator;

/// Smallest accepted palette size.
pub const MIN_PALETTE_SIZE: usize = 4;
/// Largest accepted palette size.
pub const MAX_PALETTE_SIZE: usize = 8;

/// Which extraction strategy to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteStrategy {
    #[default]
    #[serde(rename = "kmeans")]
    KMeans,
    Vote,
}

/// Which path actually produced a [`DominantColors`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteSource {
    /// Distinct samples returned directly; no clustering needed.
    Samples,
    /// K-means centroids.
    #[serde(rename = "kmeans")]
    KMeans,
    /// Ranked votes after diversity filtering.
    Diversity,
    /// 3×3 grid of the full-resolution image.
    GridFallback,
}

/// Extraction parameters. The seed is part of the parameters so runs are
/// reproducible without any ambient RNG state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteParams {
    /// Requested number of colors (`K`).
    pub size: usize,
    pub strategy: PaletteStrategy,
    pub seed: u64,
    /// Linear downsampling factor per axis.
    pub downsample_factor: u32,
    pub max_samples: usize,
    pub max_iterations: usize,
    /// Stop once no centroid moves this far in LAB.
    pub convergence: f32,
    pub diversity: DiversitySchedule,
    /// Votes a slot needs to become a candidate.
    pub min_votes: u32,
}

impl Default for PaletteParams {
    fn default() -> Self {
        Self {
            size: 5,
            strategy: PaletteStrategy::KMeans,
            seed: 0x5EED,
            downsample_factor: 15,
            max_samples: 1000,
            max_iterations: 20,
            convergence: 1.0,
            diversity: DiversitySchedule::default(),
            min_votes: 1,
        }
    }
}

impl PaletteParams {
    /// Range-check every field.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(MIN_PALETTE_SIZE..=MAX_PALETTE_SIZE).contains(&self.size) {
            return Err(CoreError::InvalidParameter(format!(
                "palette size must be in {MIN_PALETTE_SIZE}..={MAX_PALETTE_SIZE}, got {}",
                self.size
            )));
        }
        if self.downsample_factor == 0 {
            return Err(CoreError::InvalidParameter(
                "downsample factor must be at least 1".into(),
            ));
        }
        if self.max_samples == 0 || self.max_iterations == 0 {
            return Err(CoreError::InvalidParameter(
                "sample and iteration caps must be non-zero".into(),
            ));
        }
        if self.convergence.is_nan() || self.convergence < 0.0 {
            return Err(CoreError::InvalidParameter(
                "convergence tolerance must be non-negative".into(),
            ));
        }
        if !self.diversity.is_valid() {
            return Err(CoreError::InvalidParameter(format!(
                "diversity schedule needs start >= floor > 0 and step > 0, got {:?}",
                self.diversity
            )));
        }
        Ok(())
    }
}

/// One extracted color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorCluster {
    /// sRGB-encoded color in `[0, 1]`.
    pub rgb: [f32; 3],
    /// The same color in LAB.
    pub lab: [f32; 3],
    /// Samples or pixels represented by this color.
    pub votes: u32,
    /// Strategy-specific weight: share of samples for K-means, mean
    /// per-vote importance for voting, zero for grid samples.
    pub importance: f32,
}

impl ColorCluster {
    fn from_sample(sample: &Sample, votes: u32, importance: f32) -> Self {
        Self {
            rgb: sample.rgb,
            lab: sample.lab.to_array(),
            votes,
            importance,
        }
    }
}

/// An ordered palette of at most `requested` colors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DominantColors {
    pub colors: Vec<ColorCluster>,
    pub requested: usize,
    pub source: PaletteSource,
    /// Final diversity threshold, for [`PaletteSource::KMeans`] and
    /// [`PaletteSource::Diversity`].
    pub threshold: Option<f32>,
    /// Whether diversity backfill added colors closer than `threshold`.
    pub backfilled: bool,
}

impl DominantColors {
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Colors as RGB triplets, in palette order.
    pub fn rgb(&self) -> Vec<[f32; 3]> {
        self.colors.iter().map(|c| c.rgb).collect()
    }
}

/// Extracts [`DominantColors`] and owns the palette vote buffer.
#[derive(Debug, Clone)]
pub struct PaletteExtractor {
    params: PaletteParams,
    votes: Option<VoteAccumulator>,
}

impl PaletteExtractor {
    /// Validate `params` and allocate the vote buffer if the strategy needs it.
    pub fn new(params: PaletteParams) -> Result<Self, CoreError> {
        params.validate()?;
        let votes = match params.strategy {
            PaletteStrategy::Vote => Some(VoteAccumulator::try_new()?),
            PaletteStrategy::KMeans => None,
        };
        Ok(Self { params, votes })
    }

    /// Bytes of buffer the given parameters need.
    pub fn byte_size(params: &PaletteParams) -> u64 {
        let samples = params.max_samples as u64 * std::mem::size_of::<Sample>() as u64;
        match params.strategy {
            PaletteStrategy::Vote => samples + VoteAccumulator::byte_size(),
            PaletteStrategy::KMeans => samples,
        }
    }

    pub fn params(&self) -> &PaletteParams {
        &self.params
    }

    /// Run the configured strategy.
    pub fn extract(&mut self, image: &SourceImage) -> DominantColors {
        match self.params.strategy {
            PaletteStrategy::KMeans => self.extract_kmeans(image),
            PaletteStrategy::Vote => self.extract_vote(image),
        }
    }

    /// Sampling + K-means++ path, diversity filtered.
    pub fn extract_kmeans(&self, image: &SourceImage) -> DominantColors {
        let p = &self.params;
        let k = p.size;
        let plane = sampling::downsample(image, p.downsample_factor, p.max_samples);
        let samples = sampling::stride_sample(&plane, p.max_samples);
        if samples.is_empty() {
            tracing::debug!("no visible samples, using grid fallback");
            return self.grid_fallback(image);
        }
        let total = samples.len() as f32;

        let distinct = sampling::distinct(&samples);
        if distinct.len() <= k {
            let mut colors: Vec<ColorCluster> = distinct
                .iter()
                .map(|(s, n)| ColorCluster::from_sample(s, *n, *n as f32 / total))
                .collect();
            sort_by_votes(&mut colors);
            return DominantColors {
                colors,
                requested: k,
                source: PaletteSource::Samples,
                threshold: None,
                backfilled: false,
            };
        }

        let points: Vec<_> = samples.iter().map(|s| s.lab).collect();
        let mut rng = StdRng::seed_from_u64(p.seed);
        let clusters = kmeans::kmeans(&points, k, p.max_iterations, p.convergence, &mut rng);
        tracing::debug!(
            samples = points.len(),
            clusters = clusters.centroids.len(),
            iterations = clusters.iterations,
            "k-means finished"
        );

        let mut colors: Vec<ColorCluster> = clusters
            .centroids
            .iter()
            .zip(&clusters.counts)
            .filter(|(_, n)| **n > 0)
            .map(|(c, &n)| {
                let lab = c.to_array();
                ColorCluster {
                    rgb: lab_to_rgb(lab),
                    lab,
                    votes: n,
                    importance: n as f32 / total,
                }
            })
            .collect();
        sort_by_votes(&mut colors);
        let (colors, threshold) = merge_near_duplicates(colors, k, &p.diversity);

        DominantColors {
            colors,
            requested: k,
            source: PaletteSource::KMeans,
            threshold: Some(threshold),
            backfilled: false,
        }
    }

    /// Parallel vote + diversity filter path.
    pub fn extract_vote(&mut self, image: &SourceImage) -> DominantColors {
        let p = self.params.clone();
        if self.votes.is_none() {
            match VoteAccumulator::try_new() {
                Ok(v) => self.votes = Some(v),
                Err(e) => {
                    tracing::warn!("vote buffer unavailable ({e}), using grid fallback");
                    return self.grid_fallback(image);
                }
            }
        }
        let Some(votes) = self.votes.as_mut() else {
            return self.grid_fallback(image);
        };

        let plane = sampling::downsample(image, p.downsample_factor, p.max_samples);
        votes.clear();
        votes.gather(&plane.pixels, plane.width as usize);
        let candidates = votes.ranked(p.min_votes);
        if candidates.is_empty() {
            tracing::debug!("no palette candidates qualified, using grid fallback");
            return self.grid_fallback(image);
        }

        let colors: Vec<[f32; 3]> = candidates.iter().map(|c| c.rgb).collect();
        let selection = diversity::select(&colors, p.size, &p.diversity);
        let colors = selection
            .indices
            .iter()
            .map(|&i| {
                let c = &candidates[i];
                ColorCluster::from_sample(&Sample::new(c.rgb), c.votes, c.importance)
            })
            .collect();

        DominantColors {
            colors,
            requested: p.size,
            source: PaletteSource::Diversity,
            threshold: Some(selection.threshold),
            backfilled: selection.backfilled,
        }
    }

    fn grid_fallback(&self, image: &SourceImage) -> DominantColors {
        let colors = sampling::grid_sample(image)
            .iter()
            .take(self.params.size)
            .map(|s| ColorCluster::from_sample(s, 1, 0.0))
            .collect();
        DominantColors {
            colors,
            requested: self.params.size,
            source: PaletteSource::GridFallback,
            threshold: None,
            backfilled: false,
        }
    }
}

/// Keep the centroids that pass the diversity filter and fold every dropped
/// centroid's votes into its nearest kept one. Returns the kept colors, most
/// votes first, and the final threshold.
fn merge_near_duplicates(
    colors: Vec<ColorCluster>,
    k: usize,
    schedule: &DiversitySchedule,
) -> (Vec<ColorCluster>, f32) {
    let rgb: Vec<[f32; 3]> = colors.iter().map(|c| c.rgb).collect();
    let selection = diversity::filter(&rgb, k, schedule);
    let mut kept: Vec<ColorCluster> = selection.indices.iter().map(|&i| colors[i]).collect();

    for (i, c) in colors.iter().enumerate() {
        if selection.indices.contains(&i) {
            continue;
        }
        let nearest = kept.iter_mut().min_by(|a, b| {
            let da = diversity::rgb_distance(a.rgb, c.rgb);
            let db = diversity::rgb_distance(b.rgb, c.rgb);
            da.total_cmp(&db)
        });
        if let Some(target) = nearest {
            target.votes += c.votes;
            target.importance += c.importance;
        }
    }
    if kept.len() < colors.len() {
        tracing::debug!(
            centroids = colors.len(),
            kept = kept.len(),
            threshold = selection.threshold,
            "merged near-duplicate centroids"
        );
    }

    sort_by_votes(&mut kept);
    (kept, selection.threshold)
}

/// Most votes first; equal counts keep their order.
fn sort_by_votes(colors: &mut [ColorCluster]) {
    colors.sort_by(|a, b| b.votes.cmp(&a.votes));
}

/// Extract dominant colors in one shot.
pub fn extract(image: &SourceImage, params: PaletteParams) -> Result<DominantColors, CoreError> {
    Ok(PaletteExtractor::new(params)?.extract(image))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(size: usize, strategy: PaletteStrategy) -> PaletteParams {
        PaletteParams {
            size,
            strategy,
            ..Default::default()
        }
    }

    fn quadrants() -> SourceImage {
        SourceImage::from_fn(120, 90, |x, y| match (x < 60, y < 45) {
            (true, true) => [0.9, 0.1, 0.1, 1.0],
            (false, true) => [0.1, 0.8, 0.2, 1.0],
            (true, false) => [0.1, 0.2, 0.9, 1.0],
            (false, false) => [0.95, 0.9, 0.2, 1.0],
        })
    }

    fn assert_close(a: [f32; 3], b: [f32; 3], eps: f32) {
        for c in 0..3 {
            assert!((a[c] - b[c]).abs() <= eps, "{a:?} vs {b:?}");
        }
    }

    fn min_pair_distance(rgb: &[[f32; 3]]) -> f32 {
        let mut min = f32::INFINITY;
        for i in 0..rgb.len() {
            for j in i + 1..rgb.len() {
                min = min.min(diversity::rgb_distance(rgb[i], rgb[j]));
            }
        }
        min
    }

    #[test]
    fn test_rgbw_2x2_returns_all_four() {
        let colors = [
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
        ];
        let pixels = colors.iter().map(|c| [c[0], c[1], c[2], 1.0]).collect();
        let image = SourceImage::new(2, 2, pixels);
        let result = extract(&image, params(4, PaletteStrategy::KMeans)).unwrap();
        assert_eq!(result.len(), 4);
        for expected in colors {
            assert!(
                result.colors.iter().any(|c| {
                    (0..3).all(|i| (c.rgb[i] - expected[i]).abs() <= 1e-3)
                }),
                "missing {expected:?} in {:?}",
                result.rgb()
            );
        }
    }

    #[test]
    fn test_uniform_gray_single_cluster() {
        let image = SourceImage::uniform(64, 48, [0.42, 0.42, 0.42, 1.0]);
        let result = extract(&image, params(5, PaletteStrategy::KMeans)).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.source, PaletteSource::Samples);
        assert_close(result.colors[0].rgb, [0.42, 0.42, 0.42], 1e-6);
    }

    #[test]
    fn test_distinct_at_most_k_is_exact() {
        let palette = [
            [0.1, 0.2, 0.3],
            [0.7, 0.1, 0.5],
            [0.3, 0.9, 0.2],
            [0.6, 0.6, 0.0],
            [0.0, 0.5, 0.5],
        ];
        let image = SourceImage::from_fn(10, 10, |x, y| {
            let c = palette[((x + y) % 5) as usize];
            [c[0], c[1], c[2], 1.0]
        });
        let result = extract(&image, params(8, PaletteStrategy::KMeans)).unwrap();
        assert_eq!(result.len(), 5);
        for expected in palette {
            assert!(result.rgb().contains(&expected));
        }
    }

    #[test]
    fn test_kmeans_quadrants() {
        let result = extract(&quadrants(), params(4, PaletteStrategy::KMeans)).unwrap();
        assert!(result.len() <= 4);
        for expected in [[0.9, 0.1, 0.1], [0.1, 0.8, 0.2], [0.1, 0.2, 0.9], [0.95, 0.9, 0.2]] {
            assert!(
                result.rgb().iter().any(|c| (0..3).all(|i| (c[i] - expected[i]).abs() < 0.1)),
                "missing {expected:?} in {:?}",
                result.rgb()
            );
        }
    }

    #[test]
    fn test_kmeans_deterministic() {
        let image = SourceImage::from_fn(200, 120, |x, y| {
            [
                (x as f32 / 199.0).powf(1.3),
                (y as f32 / 119.0),
                ((x ^ y) % 17) as f32 / 16.0,
                1.0,
            ]
        });
        let p = params(6, PaletteStrategy::KMeans);
        let a = extract(&image, p.clone()).unwrap();
        let b = extract(&image, p).unwrap();
        assert_eq!(a, b);
        assert!(a.len() <= 6);
    }

    #[test]
    fn test_kmeans_noisy_gray_merges_near_duplicates() {
        let image = SourceImage::from_fn(30, 30, |x, y| {
            let v = 0.5 + ((x * 7 + y * 13) % 21) as f32 * 0.001;
            [v, v, v, 1.0]
        });
        let result = extract(&image, params(5, PaletteStrategy::KMeans)).unwrap();
        assert_eq!(result.source, PaletteSource::KMeans);
        assert!(!result.backfilled);
        let threshold = result.threshold.unwrap();
        assert!((threshold - 0.05).abs() < 1e-6);
        assert_eq!(result.len(), 1);
        assert_eq!(result.colors[0].votes, 900);
        assert!((result.colors[0].importance - 1.0).abs() < 1e-4);
        for c in result.colors[0].rgb {
            assert!((0.499..=0.521).contains(&c), "{:?}", result.rgb());
        }
    }

    #[test]
    fn test_kmeans_colors_respect_final_threshold() {
        let image = SourceImage::from_fn(160, 120, |x, y| {
            let jitter = ((x * 31 + y * 17) % 11) as f32 * 0.004;
            match (x < 80, y < 60) {
                (true, true) => [0.8 + jitter, 0.1, 0.1, 1.0],
                (false, true) => [0.82, 0.12 + jitter, 0.1, 1.0],
                (true, false) => [0.1, 0.2 + jitter, 0.9, 1.0],
                (false, false) => [0.1 + jitter, 0.7, 0.3, 1.0],
            }
        });
        let result = extract(&image, params(6, PaletteStrategy::KMeans)).unwrap();
        assert_eq!(result.source, PaletteSource::KMeans);
        assert!(!result.is_empty() && result.len() <= 6);
        let threshold = result.threshold.unwrap();
        assert!(min_pair_distance(&result.rgb()) >= threshold);
        // Merging keeps every downsampled pixel accounted for (11 × 8 blocks).
        let votes: u32 = result.colors.iter().map(|c| c.votes).sum();
        assert_eq!(votes, 11 * 8);
    }

    #[test]
    fn test_vote_quadrants_are_diverse() {
        let result = extract(&quadrants(), params(4, PaletteStrategy::Vote)).unwrap();
        assert_eq!(result.source, PaletteSource::Diversity);
        assert_eq!(result.len(), 4);
        let threshold = result.threshold.unwrap();
        if !result.backfilled {
            assert!(min_pair_distance(&result.rgb()) >= threshold);
        }
    }

    #[test]
    fn test_vote_deterministic() {
        let image = SourceImage::from_fn(300, 200, |x, y| {
            [x as f32 / 299.0, y as f32 / 199.0, 0.5, 1.0]
        });
        let p = params(5, PaletteStrategy::Vote);
        assert_eq!(extract(&image, p.clone()).unwrap(), extract(&image, p).unwrap());
    }

    #[test]
    fn test_vote_no_candidates_uses_grid_fallback() {
        let image =
            SourceImage::from_fn(30, 30, |x, y| [x as f32 / 29.0, y as f32 / 29.0, 0.3, 0.0]);
        let result = extract(&image, params(4, PaletteStrategy::Vote)).unwrap();
        assert_eq!(result.source, PaletteSource::GridFallback);
        assert_eq!(result.len(), 4);
        let px = image.pixel(5, 5).unwrap();
        assert_eq!(result.colors[0].rgb, [px[0], px[1], px[2]]);
    }

    #[test]
    fn test_vote_min_votes_forces_fallback() {
        let image = quadrants();
        let mut p = params(5, PaletteStrategy::Vote);
        p.min_votes = u32::MAX;
        let result = extract(&image, p).unwrap();
        assert_eq!(result.source, PaletteSource::GridFallback);
        assert!(result.len() <= 5);
    }

    #[test]
    fn test_params_validation() {
        assert!(params(3, PaletteStrategy::KMeans).validate().is_err());
        assert!(params(9, PaletteStrategy::KMeans).validate().is_err());
        assert!(params(4, PaletteStrategy::KMeans).validate().is_ok());
        let mut p = PaletteParams::default();
        p.diversity.floor = 0.0;
        assert!(p.validate().is_err());
    }
}
