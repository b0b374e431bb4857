//! K-means clustering in LAB with K-means++ seeding.
//!
//! Runs single-threaded: both the sample count and the iteration count are
//! capped, so the worst case is bounded. All randomness comes from the
//! caller's seeded RNG.

use glam::Vec3;
use rand::Rng;
use rand::distr::{Distribution, weighted::WeightedIndex};

/// Clustering output. `centroids[i]` owns `counts[i]` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Clusters {
    pub centroids: Vec<Vec3>,
    pub counts: Vec<u32>,
    /// Assign/update rounds actually run.
    pub iterations: usize,
}

/// Pick up to `k` initial centroids with K-means++.
///
/// The first centroid is uniform over `points`; each later one is drawn
/// with probability proportional to its squared distance from the nearest
/// centroid chosen so far. Stops early when every point coincides with an
/// existing centroid.
pub fn seed_plus_plus<R: Rng>(points: &[Vec3], k: usize, rng: &mut R) -> Vec<Vec3> {
    if points.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.random_range(0..points.len())]);

    let mut nearest: Vec<f32> = points
        .iter()
        .map(|p| p.distance_squared(centroids[0]))
        .collect();

    while centroids.len() < k {
        // Fails once every distance is zero: nothing left to separate.
        let Ok(dist) = WeightedIndex::new(nearest.iter().map(|&d| d as f64)) else {
            break;
        };
        let c = points[dist.sample(rng)];
        centroids.push(c);
        for (n, p) in nearest.iter_mut().zip(points) {
            *n = n.min(p.distance_squared(c));
        }
    }

    centroids
}

/// Index of the centroid closest to `p`. Ties go to the lower index.
#[inline]
pub fn nearest_centroid(p: Vec3, centroids: &[Vec3]) -> usize {
    let mut best = 0;
    let mut best_d = f32::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = p.distance_squared(*c);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

/// Lloyd iterations from K-means++ seeds.
///
/// Each round assigns every point to its nearest centroid and moves each
/// centroid to the mean of its points; a centroid with no points stays put.
/// Stops after `max_iterations` rounds or once no centroid moves by
/// `tolerance` or more.
pub fn kmeans<R: Rng>(
    points: &[Vec3],
    k: usize,
    max_iterations: usize,
    tolerance: f32,
    rng: &mut R,
) -> Clusters {
    let mut centroids = seed_plus_plus(points, k, rng);
    let mut counts = vec![0u32; centroids.len()];
    let mut iterations = 0;
    if centroids.is_empty() {
        return Clusters {
            centroids,
            counts,
            iterations,
        };
    }

    let mut sums = vec![Vec3::ZERO; centroids.len()];
    for _ in 0..max_iterations.max(1) {
        iterations += 1;
        counts.fill(0);
        sums.fill(Vec3::ZERO);

        for p in points {
            let c = nearest_centroid(*p, &centroids);
            counts[c] += 1;
            sums[c] += *p;
        }

        let mut max_shift = 0.0f32;
        for ((centroid, sum), &n) in centroids.iter_mut().zip(&sums).zip(&counts) {
            if n == 0 {
                continue;
            }
            let next = *sum / n as f32;
            max_shift = max_shift.max(centroid.distance(next));
            *centroid = next;
        }

        if max_shift < tolerance {
            break;
        }
    }

    Clusters {
        centroids,
        counts,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn blobs() -> Vec<Vec3> {
        let mut pts = Vec::new();
        for i in 0..30 {
            let j = i as f32 * 0.1;
            pts.push(Vec3::new(20.0 + j, 10.0, -10.0));
            pts.push(Vec3::new(80.0, -40.0 + j, 30.0));
            pts.push(Vec3::new(50.0, 60.0, 60.0 - j));
        }
        pts
    }

    #[test]
    fn test_seed_stops_on_identical_points() {
        let pts = vec![Vec3::splat(5.0); 10];
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(seed_plus_plus(&pts, 4, &mut rng).len(), 1);
    }

    #[test]
    fn test_seed_picks_distinct_points() {
        let pts = vec![Vec3::ZERO, Vec3::X * 10.0, Vec3::Y * 10.0];
        let mut rng = StdRng::seed_from_u64(1);
        let seeds = seed_plus_plus(&pts, 3, &mut rng);
        assert_eq!(seeds.len(), 3);
        for p in &pts {
            assert!(seeds.contains(p));
        }
    }

    #[test]
    fn test_seed_never_draws_covered_points() {
        // Duplicates of a chosen centroid carry zero weight.
        let mut pts = vec![Vec3::ZERO; 50];
        pts.push(Vec3::X * 10.0);
        for seed in 0..32 {
            let seeds = seed_plus_plus(&pts, 3, &mut StdRng::seed_from_u64(seed));
            assert_eq!(seeds.len(), 2, "seed {seed}");
            assert!(seeds.contains(&Vec3::ZERO));
            assert!(seeds.contains(&(Vec3::X * 10.0)));
        }
    }

    #[test]
    fn test_seed_deterministic_for_seed() {
        let pts = blobs();
        let a = seed_plus_plus(&pts, 3, &mut StdRng::seed_from_u64(11));
        let b = seed_plus_plus(&pts, 3, &mut StdRng::seed_from_u64(11));
        assert_eq!(a, b);
    }

    #[test]
    fn test_kmeans_separates_blobs() {
        let pts = blobs();
        let mut rng = StdRng::seed_from_u64(42);
        let clusters = kmeans(&pts, 3, 20, 1.0, &mut rng);
        let mut counts = clusters.counts.clone();
        counts.sort_unstable();
        assert_eq!(counts, vec![30, 30, 30]);
        assert!(clusters.iterations <= 20);
    }

    #[test]
    fn test_kmeans_deterministic_for_seed() {
        let pts = blobs();
        let a = kmeans(&pts, 3, 20, 1.0, &mut StdRng::seed_from_u64(9));
        let b = kmeans(&pts, 3, 20, 1.0, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_kmeans_respects_iteration_cap() {
        let pts = blobs();
        let clusters = kmeans(&pts, 3, 1, 0.0, &mut StdRng::seed_from_u64(3));
        assert_eq!(clusters.iterations, 1);
    }

    #[test]
    fn test_nearest_centroid_tie_goes_low() {
        let centroids = [Vec3::X, -Vec3::X];
        assert_eq!(nearest_centroid(Vec3::ZERO, &centroids), 0);
    }
}
