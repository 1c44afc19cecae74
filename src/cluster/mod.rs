//! Partitioning clustering for content segmentation.
//!
//! This module provides:
//! - `KMeans`: Lloyd's algorithm with k-means++ seeding and multiple restarts
//! - `MiniBatchKMeans`: streaming-style K-Means for large tables
//!
//! Both estimators are reproducible when given a `random_state`.
//!
//! # Examples
//!
//! ## K-Means Clustering
//! ```rust
//! use engagement_segments::KMeans;
//! use ndarray::array;
//!
//! let x = array![
//!     [1.0, 1.0],
//!     [1.5, 2.0],
//!     [3.0, 4.0],
//!     [5.0, 7.0],
//!     [3.5, 5.0],
//!     [4.5, 5.0]
//! ];
//!
//! let mut kmeans = KMeans::new(2).max_iter(100).random_state(42);
//! let labels = kmeans.fit_predict(&x).unwrap();
//! assert_eq!(labels.len(), 6);
//!
//! let inertia = kmeans.inertia.unwrap();
//! assert!(inertia >= 0.0);
//! ```
//!
//! ## Mini-Batch K-Means
//! ```rust
//! use engagement_segments::{Matrix, MiniBatchKMeans};
//!
//! let x = Matrix::from_shape_fn((200, 2), |(i, j)| ((i % 4) * 10 + j) as f64);
//! let mut model = MiniBatchKMeans::new(4).batch_size(32).random_state(42);
//! let labels = model.fit_predict(&x).unwrap();
//! assert!(labels.iter().all(|&l| l < 4));
//! ```

mod kmeans;
mod minibatch;

pub use kmeans::KMeans;
pub use minibatch::MiniBatchKMeans;

pub(crate) use kmeans::seeded_rng;

use crate::{Error, Matrix, Result};
use ndarray::ArrayView1;
use serde::Serialize;

/// Center seeding strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Init {
    /// Sample centers with probability proportional to squared distance
    #[default]
    KMeansPlusPlus,
    /// Distinct rows chosen uniformly
    Random,
}

pub(crate) fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the nearest center and its squared distance.
pub(crate) fn nearest_center(row: ArrayView1<f64>, centers: &Matrix) -> (usize, f64) {
    let mut closest = (0, f64::INFINITY);
    for (k, center) in centers.rows().into_iter().enumerate() {
        let distance = squared_distance(row, center);
        if distance < closest.1 {
            closest = (k, distance);
        }
    }
    closest
}

/// Nearest-center label and squared distance for every row.
pub(crate) fn assign_labels(x: &Matrix, centers: &Matrix) -> (Vec<usize>, Vec<f64>) {
    x.rows().into_iter().map(|row| nearest_center(row, centers)).unzip()
}

fn check_fit_input(x: &Matrix, n_clusters: usize) -> Result<()> {
    if n_clusters == 0 {
        return Err(Error::InvalidParameter("n_clusters must be > 0".to_string()));
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(Error::InvalidParameter(
            "input matrix must have at least one sample and one feature".to_string(),
        ));
    }
    if x.nrows() < n_clusters {
        return Err(Error::InvalidParameter(format!(
            "n_samples={} should be >= n_clusters={}",
            x.nrows(),
            n_clusters
        )));
    }
    if !x.iter().all(|v| v.is_finite()) {
        return Err(Error::Numerical("input contains NaN or infinite values".to_string()));
    }
    Ok(())
}

fn check_width(x: &Matrix, centers: &Matrix) -> Result<()> {
    if x.ncols() != centers.ncols() {
        return Err(Error::DimensionMismatch {
            expected: centers.ncols(),
            actual: x.ncols(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_assign_labels_picks_nearest() {
        let centers = array![[0.0, 0.0], [10.0, 10.0]];
        let x = array![[1.0, 1.0], [9.0, 8.0], [5.0, 5.1]];
        let (labels, distances) = assign_labels(&x, &centers);
        assert_eq!(labels, vec![0, 1, 1]);
        assert_eq!(distances[0], 2.0);
        assert_eq!(distances[1], 5.0);
    }

    #[test]
    fn test_fit_input_rejects_nan() {
        let x = array![[1.0], [f64::NAN]];
        assert!(matches!(check_fit_input(&x, 2), Err(Error::Numerical(_))));
    }
}
