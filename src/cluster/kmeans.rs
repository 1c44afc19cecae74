use super::{assign_labels, squared_distance, Init};
use crate::{Error, Matrix, Result};
use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Clone, Debug)]
pub struct KMeans {
    pub cluster_centers: Option<Matrix>,
    pub labels: Option<Vec<usize>>,
    pub inertia: Option<f64>,
    pub n_iter: Option<usize>,
    n_clusters: usize,
    max_iter: usize,
    tolerance: f64,
    n_init: usize,
    random_state: Option<u64>,
    init: Init,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            cluster_centers: None,
            labels: None,
            inertia: None,
            n_iter: None,
            n_clusters,
            max_iter: 300,
            tolerance: 1e-4,
            n_init: 10,
            random_state: None,
            init: Init::KMeansPlusPlus,
        }
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    pub fn init(mut self, init: Init) -> Self {
        self.init = init;
        self
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Run Lloyd's algorithm `n_init` times and keep the lowest-inertia run.
    pub fn fit(&mut self, x: &Matrix) -> Result<()> {
        super::check_fit_input(x, self.n_clusters)?;
        if self.n_init == 0 || self.max_iter == 0 {
            return Err(Error::InvalidParameter(
                "n_init and max_iter must be > 0".to_string(),
            ));
        }

        let mut rng = seeded_rng(self.random_state);
        let mut best: Option<(Matrix, Vec<usize>, f64, usize)> = None;

        for run in 0..self.n_init {
            let initial = initial_centers(x.view(), self.n_clusters, self.init, &mut rng);
            let (centers, labels, inertia, n_iter) = self.lloyd(x, initial)?;
            tracing::trace!(run, inertia, n_iter, "k-means run finished");

            if best.as_ref().is_none_or(|(_, _, best_inertia, _)| inertia < *best_inertia) {
                best = Some((centers, labels, inertia, n_iter));
            }
        }

        let (centers, labels, inertia, n_iter) =
            best.ok_or_else(|| Error::Numerical("k-means produced no run".to_string()))?;

        self.cluster_centers = Some(centers);
        self.labels = Some(labels);
        self.inertia = Some(inertia);
        self.n_iter = Some(n_iter);

        Ok(())
    }

    pub fn predict(&self, x: &Matrix) -> Result<Vec<usize>> {
        let centroids = self.cluster_centers.as_ref().ok_or(Error::NotFitted("KMeans"))?;
        super::check_width(x, centroids)?;
        Ok(assign_labels(x, centroids).0)
    }

    pub fn fit_predict(&mut self, x: &Matrix) -> Result<Vec<usize>> {
        self.fit(x)?;
        self.labels.clone().ok_or(Error::NotFitted("KMeans"))
    }

    /// Distance from every sample to every center.
    pub fn transform(&self, x: &Matrix) -> Result<Matrix> {
        let centroids = self.cluster_centers.as_ref().ok_or(Error::NotFitted("KMeans"))?;
        super::check_width(x, centroids)?;

        let mut distances = Matrix::zeros((x.nrows(), self.n_clusters));
        for i in 0..x.nrows() {
            for k in 0..self.n_clusters {
                distances[[i, k]] = squared_distance(x.row(i), centroids.row(k)).sqrt();
            }
        }

        Ok(distances)
    }

    fn lloyd(&self, x: &Matrix, mut centroids: Matrix) -> Result<(Matrix, Vec<usize>, f64, usize)> {
        let mut n_iter = 0;

        for iteration in 0..self.max_iter {
            n_iter = iteration + 1;
            let old_centroids = centroids.clone();

            let (mut labels, distances) = assign_labels(x, &centroids);

            let mut sums = Matrix::zeros(centroids.dim());
            let mut counts = vec![0usize; self.n_clusters];
            for (i, &label) in labels.iter().enumerate() {
                let mut sum = sums.row_mut(label);
                sum += &x.row(i);
                counts[label] += 1;
            }

            for k in 0..self.n_clusters {
                if counts[k] > 0 {
                    let mean = &sums.row(k) / counts[k] as f64;
                    centroids.row_mut(k).assign(&mean);
                } else {
                    // empty cluster: move it onto the worst-served sample
                    let far = farthest_sample(&distances, &labels, &counts);
                    centroids.row_mut(k).assign(&x.row(far));
                    counts[labels[far]] -= 1;
                    labels[far] = k;
                    counts[k] = 1;
                }
            }

            if !centroids.iter().all(|v| v.is_finite()) {
                return Err(Error::Numerical("k-means centers became non-finite".to_string()));
            }

            let centroid_shift = max_centroid_shift(&old_centroids, &centroids);
            if centroid_shift < self.tolerance {
                break;
            }
        }

        let (labels, distances) = assign_labels(x, &centroids);
        let inertia = distances.iter().sum();

        Ok((centroids, labels, inertia, n_iter))
    }
}

pub(crate) fn seeded_rng(random_state: Option<u64>) -> StdRng {
    match random_state {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Pick starting centers by the requested strategy.
pub(crate) fn initial_centers(x: ArrayView2<f64>, n_clusters: usize, init: Init, rng: &mut StdRng) -> Matrix {
    let mut centroids = Matrix::zeros((n_clusters, x.ncols()));

    match init {
        Init::Random => {
            let picks = rand::seq::index::sample(rng, x.nrows(), n_clusters);
            for (k, idx) in picks.iter().enumerate() {
                centroids.row_mut(k).assign(&x.row(idx));
            }
        }
        Init::KMeansPlusPlus => {
            let first_idx = rng.gen_range(0..x.nrows());
            centroids.row_mut(0).assign(&x.row(first_idx));

            // squared distance to the nearest chosen center
            let mut closest: Vec<f64> = x
                .rows()
                .into_iter()
                .map(|row| squared_distance(row, centroids.row(0)))
                .collect();

            for k in 1..n_clusters {
                let total: f64 = closest.iter().sum();
                let next_idx = if total > 0.0 {
                    let target = rng.gen_range(0.0..total);
                    let mut cumulative = 0.0;
                    closest
                        .iter()
                        .position(|d| {
                            cumulative += d;
                            cumulative > target
                        })
                        .unwrap_or(x.nrows() - 1)
                } else {
                    rng.gen_range(0..x.nrows())
                };

                centroids.row_mut(k).assign(&x.row(next_idx));
                for (i, row) in x.rows().into_iter().enumerate() {
                    closest[i] = closest[i].min(squared_distance(row, centroids.row(k)));
                }
            }
        }
    }

    centroids
}

fn farthest_sample(distances: &[f64], labels: &[usize], counts: &[usize]) -> usize {
    distances
        .iter()
        .enumerate()
        .filter(|(i, _)| counts[labels[*i]] > 1)
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn max_centroid_shift(old_centroids: &Matrix, new_centroids: &Matrix) -> f64 {
    old_centroids
        .rows()
        .into_iter()
        .zip(new_centroids.rows())
        .map(|(old, new)| squared_distance(old, new).sqrt())
        .fold(0.0, f64::max)
}
