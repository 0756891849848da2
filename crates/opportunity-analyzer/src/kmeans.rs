//! Seeded k-means with k-means++ initialization and restarts.

use analysis_core::AnalysisError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_RESTARTS: usize = 10;
pub const DEFAULT_MAX_ITERATIONS: usize = 300;

/// Result of a k-means fit. `labels[i]` is the cluster of point `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
}

impl Clustering {
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

/// Lloyd's algorithm over dense points.
///
/// Every fit returns exactly `k` non-empty clusters. The same seed, restart
/// count and input always give the same labels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeans {
    k: usize,
    seed: u64,
    restarts: usize,
    max_iterations: usize,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            seed: DEFAULT_SEED,
            restarts: DEFAULT_RESTARTS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_restarts(mut self, restarts: usize) -> Self {
        self.restarts = restarts;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn restarts(&self) -> usize {
        self.restarts
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn fit(&self, points: &[Vec<f64>]) -> Result<Clustering, AnalysisError> {
        self.check_input(points)?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<Clustering> = None;

        for _ in 0..self.restarts.max(1) {
            let candidate = self.fit_once(points, &mut rng);
            let better = best.as_ref().map_or(true, |b| candidate.inertia < b.inertia);
            if better {
                best = Some(candidate);
            }
        }

        best.ok_or_else(|| AnalysisError::CalculationError("k-means produced no clustering".to_string()))
    }

    fn check_input(&self, points: &[Vec<f64>]) -> Result<(), AnalysisError> {
        if self.k == 0 {
            return Err(AnalysisError::InvalidData("k-means needs k >= 1".to_string()));
        }
        if points.len() < self.k {
            return Err(AnalysisError::InsufficientData(format!(
                "k-means needs at least {} points, got {}",
                self.k,
                points.len()
            )));
        }
        let dims = points[0].len();
        if dims == 0 {
            return Err(AnalysisError::InvalidData("k-means points have no features".to_string()));
        }
        for (i, point) in points.iter().enumerate() {
            if point.len() != dims {
                return Err(AnalysisError::InvalidData(format!(
                    "point {} has {} features, expected {}",
                    i,
                    point.len(),
                    dims
                )));
            }
            if point.iter().any(|v| !v.is_finite()) {
                return Err(AnalysisError::InvalidData(format!("point {} has a non-finite feature", i)));
            }
        }
        Ok(())
    }

    fn fit_once(&self, points: &[Vec<f64>], rng: &mut StdRng) -> Clustering {
        let mut centroids = self.init_centroids(points, rng);
        let mut labels: Vec<usize> = Vec::new();

        for _ in 0..self.max_iterations.max(1) {
            let mut next = assign(points, &centroids);
            repair_empty(points, &mut next, &mut centroids);
            let converged = next == labels;
            labels = next;
            if converged {
                break;
            }
            centroids = recompute_centroids(points, &labels, self.k);
        }

        let inertia = points
            .iter()
            .zip(&labels)
            .map(|(p, &l)| squared_distance(p, &centroids[l]))
            .sum();

        Clustering {
            labels,
            centroids,
            inertia,
        }
    }

    /// k-means++ seeding.
    fn init_centroids(&self, points: &[Vec<f64>], rng: &mut StdRng) -> Vec<Vec<f64>> {
        let n = points.len();
        let mut centroids = vec![points[rng.gen_range(0..n)].clone()];

        while centroids.len() < self.k {
            let distances: Vec<f64> = points
                .iter()
                .map(|p| {
                    centroids
                        .iter()
                        .map(|c| squared_distance(p, c))
                        .fold(f64::INFINITY, f64::min)
                })
                .collect();
            let total: f64 = distances.iter().sum();

            let chosen = if total > 0.0 {
                let target = rng.gen::<f64>() * total;
                let mut acc = 0.0;
                distances
                    .iter()
                    .position(|d| {
                        acc += d;
                        acc > target
                    })
                    .unwrap_or(n - 1)
            } else {
                rng.gen_range(0..n)
            };
            centroids.push(points[chosen].clone());
        }

        centroids
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Nearest centroid per point; ties go to the lower cluster index.
fn assign(points: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<usize> {
    points
        .iter()
        .map(|p| {
            let mut best = 0;
            let mut best_distance = f64::INFINITY;
            for (c, centroid) in centroids.iter().enumerate() {
                let d = squared_distance(p, centroid);
                if d < best_distance {
                    best = c;
                    best_distance = d;
                }
            }
            best
        })
        .collect()
}

/// Give each empty cluster the point farthest from its centroid, taken from a
/// cluster that has more than one member.
fn repair_empty(points: &[Vec<f64>], labels: &mut [usize], centroids: &mut [Vec<f64>]) {
    let k = centroids.len();
    let mut sizes = vec![0usize; k];
    for &l in labels.iter() {
        sizes[l] += 1;
    }

    for cluster in 0..k {
        if sizes[cluster] > 0 {
            continue;
        }
        let donor = (0..points.len())
            .filter(|&i| sizes[labels[i]] > 1)
            .map(|i| (i, squared_distance(&points[i], &centroids[labels[i]])))
            .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                Some((_, bd)) if bd >= d => best,
                _ => Some((i, d)),
            });

        // n >= k guarantees a cluster with more than one member
        if let Some((i, _)) = donor {
            sizes[labels[i]] -= 1;
            labels[i] = cluster;
            sizes[cluster] = 1;
            centroids[cluster] = points[i].clone();
        }
    }
}

fn recompute_centroids(points: &[Vec<f64>], labels: &[usize], k: usize) -> Vec<Vec<f64>> {
    let dims = points[0].len();
    let mut sums = vec![vec![0.0; dims]; k];
    let mut counts = vec![0usize; k];

    for (point, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for (s, v) in sums[label].iter_mut().zip(point) {
            *s += v;
        }
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| sum.into_iter().map(|s| s / count.max(1) as f64).collect())
        .collect()
}
