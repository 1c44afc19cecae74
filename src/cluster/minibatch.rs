use super::kmeans::{initial_centers, seeded_rng};
use super::{assign_labels, nearest_center, squared_distance, Init};
use crate::{Error, Matrix, Result};
use ndarray::Axis;
use rand::seq::index;

/// K-Means trained on random mini-batches with per-center learning rates.
///
/// Trades exact reproducibility of cluster boundaries against full-batch
/// K-Means for bounded work per iteration. Results are still deterministic
/// for a fixed `random_state`.
#[derive(Clone, Debug)]
pub struct MiniBatchKMeans {
    pub cluster_centers: Option<Matrix>,
    pub labels: Option<Vec<usize>>,
    pub inertia: Option<f64>,
    pub n_iter: Option<usize>,
    n_clusters: usize,
    batch_size: usize,
    max_iter: usize,
    n_init: usize,
    tolerance: f64,
    max_no_improvement: usize,
    random_state: Option<u64>,
    init: Init,
}

impl MiniBatchKMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            cluster_centers: None,
            labels: None,
            inertia: None,
            n_iter: None,
            n_clusters,
            batch_size: 1000,
            max_iter: 300,
            n_init: 3,
            tolerance: 0.0,
            max_no_improvement: 10,
            random_state: None,
            init: Init::KMeansPlusPlus,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Stop once no center moves further than this between batches; 0 disables.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn max_no_improvement(mut self, max_no_improvement: usize) -> Self {
        self.max_no_improvement = max_no_improvement;
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

    pub fn fit(&mut self, x: &Matrix) -> Result<()> {
        super::check_fit_input(x, self.n_clusters)?;
        if self.batch_size == 0 || self.n_init == 0 || self.max_iter == 0 {
            return Err(Error::InvalidParameter(
                "batch_size, n_init and max_iter must be > 0".to_string(),
            ));
        }

        let mut rng = seeded_rng(self.random_state);
        let n_samples = x.nrows();
        let batch_len = self.batch_size.min(n_samples);
        let init_size = (3 * self.batch_size).clamp(self.n_clusters, n_samples);
        // weight of each batch in the smoothed inertia used for early stopping
        let alpha = (2.0 * batch_len as f64 / (n_samples + 1) as f64).min(1.0);

        let mut best: Option<(Matrix, Vec<usize>, f64, usize)> = None;

        for run in 0..self.n_init {
            let init_rows = index::sample(&mut rng, n_samples, init_size).into_vec();
            let x_init = x.select(Axis(0), &init_rows);
            let mut centers = initial_centers(x_init.view(), self.n_clusters, self.init, &mut rng);
            let mut counts = vec![0usize; self.n_clusters];

            let mut smoothed: Option<f64> = None;
            let mut best_smoothed = f64::INFINITY;
            let mut stale = 0;
            let mut n_iter = 0;

            for step in 0..self.max_iter {
                n_iter = step + 1;
                let batch = index::sample(&mut rng, n_samples, batch_len);
                let old_centers = centers.clone();

                let assigned: Vec<(usize, usize, f64)> = batch
                    .iter()
                    .map(|idx| {
                        let (label, distance) = nearest_center(x.row(idx), &centers);
                        (idx, label, distance)
                    })
                    .collect();

                let mut batch_inertia = 0.0;
                for &(idx, label, distance) in &assigned {
                    batch_inertia += distance;
                    counts[label] += 1;
                    let eta = 1.0 / counts[label] as f64;
                    let mut center = centers.row_mut(label);
                    center.zip_mut_with(&x.row(idx), |c, &v| *c += eta * (v - *c));
                }
                batch_inertia /= batch_len as f64;

                let ewa = match smoothed {
                    Some(previous) => previous * (1.0 - alpha) + batch_inertia * alpha,
                    None => batch_inertia,
                };
                smoothed = Some(ewa);

                if ewa < best_smoothed {
                    best_smoothed = ewa;
                    stale = 0;
                } else {
                    stale += 1;
                    if self.max_no_improvement > 0 && stale >= self.max_no_improvement {
                        tracing::trace!(run, step, "mini-batch k-means stopped without improvement");
                        break;
                    }
                }

                if self.tolerance > 0.0 {
                    let shift = old_centers
                        .rows()
                        .into_iter()
                        .zip(centers.rows())
                        .map(|(old, new)| squared_distance(old, new).sqrt())
                        .fold(0.0, f64::max);
                    if shift < self.tolerance {
                        break;
                    }
                }
            }

            if !centers.iter().all(|v| v.is_finite()) {
                return Err(Error::Numerical(
                    "mini-batch k-means centers became non-finite".to_string(),
                ));
            }

            let (labels, distances) = assign_labels(x, &centers);
            let inertia: f64 = distances.iter().sum();
            tracing::trace!(run, inertia, n_iter, "mini-batch k-means run finished");

            if best.as_ref().is_none_or(|(_, _, best_inertia, _)| inertia < *best_inertia) {
                best = Some((centers, labels, inertia, n_iter));
            }
        }

        let (centers, labels, inertia, n_iter) =
            best.ok_or_else(|| Error::Numerical("mini-batch k-means produced no run".to_string()))?;

        self.cluster_centers = Some(centers);
        self.labels = Some(labels);
        self.inertia = Some(inertia);
        self.n_iter = Some(n_iter);

        Ok(())
    }

    pub fn predict(&self, x: &Matrix) -> Result<Vec<usize>> {
        let centers = self
            .cluster_centers
            .as_ref()
            .ok_or(Error::NotFitted("MiniBatchKMeans"))?;
        super::check_width(x, centers)?;
        Ok(assign_labels(x, centers).0)
    }

    pub fn fit_predict(&mut self, x: &Matrix) -> Result<Vec<usize>> {
        self.fit(x)?;
        self.labels.clone().ok_or(Error::NotFitted("MiniBatchKMeans"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Four tight groups of 250 rows each around the corners of a square.
    fn corners() -> Matrix {
        let offsets = [[0.0, 0.0], [20.0, 0.0], [0.0, 20.0], [20.0, 20.0]];
        Matrix::from_shape_fn((1000, 2), |(i, j)| {
            let jitter = ((i * 7 + j * 13) % 10) as f64 * 0.1;
            offsets[i % 4][j] + jitter
        })
    }

    #[test]
    fn test_minibatch_separates_corners() {
        let x = corners();
        let mut model = MiniBatchKMeans::new(4).batch_size(100).random_state(42);
        let labels = model.fit_predict(&x).unwrap();

        assert_eq!(labels.len(), 1000);
        for i in 4..1000 {
            assert_eq!(labels[i], labels[i % 4]);
        }
        let distinct: std::collections::HashSet<usize> = labels[..4].iter().copied().collect();
        assert_eq!(distinct.len(), 4);
    }

    #[test]
    fn test_minibatch_reproducible() {
        let x = corners();
        let first = MiniBatchKMeans::new(3).batch_size(64).random_state(9).fit_predict(&x).unwrap();
        let second = MiniBatchKMeans::new(3).batch_size(64).random_state(9).fit_predict(&x).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_minibatch_batch_larger_than_data() {
        let x = array![[0.0], [0.1], [5.0], [5.1], [9.0], [9.2]];
        let mut model = MiniBatchKMeans::new(3).random_state(1);
        let labels = model.fit_predict(&x).unwrap();
        assert!(labels.iter().all(|&l| l < 3));
        assert!(model.inertia.unwrap() >= 0.0);
        assert!(model.n_iter.unwrap() >= 1);
    }

    #[test]
    fn test_minibatch_rejects_zero_batch() {
        let x = array![[0.0], [1.0]];
        let mut model = MiniBatchKMeans::new(2).batch_size(0);
        assert!(matches!(model.fit(&x), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_minibatch_predict_without_fit() {
        let model = MiniBatchKMeans::new(2);
        assert!(matches!(model.predict(&array![[1.0]]), Err(Error::NotFitted(_))));
    }
}
