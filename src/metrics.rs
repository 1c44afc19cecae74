//! Partition quality measures.

use crate::cluster::squared_distance;
use crate::{Error, Matrix, Result};
use rand::seq::index;

fn check_labels(x: &Matrix, labels: &[usize]) -> Result<usize> {
    if x.nrows() != labels.len() {
        return Err(Error::DimensionMismatch {
            expected: x.nrows(),
            actual: labels.len(),
        });
    }
    let n_labels = distinct_labels(labels);
    if n_labels < 2 || n_labels >= x.nrows() {
        return Err(Error::InvalidParameter(format!(
            "number of labels is {}, valid values are 2 to n_samples - 1 ({})",
            n_labels,
            x.nrows().saturating_sub(1)
        )));
    }
    Ok(labels.iter().max().map_or(0, |m| m + 1))
}

pub fn distinct_labels(labels: &[usize]) -> usize {
    let mut seen: Vec<usize> = labels.to_vec();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

/// Mean silhouette coefficient with Euclidean distance, in `[-1, 1]`.
///
/// Rows alone in their cluster score 0.
pub fn silhouette_score(x: &Matrix, labels: &[usize]) -> Result<f64> {
    let n_slots = check_labels(x, labels)?;
    let sizes = cluster_sizes(labels, n_slots);
    let n = x.nrows();

    let mut total = 0.0;
    let mut sums = vec![0.0; n_slots];
    for i in 0..n {
        sums.iter_mut().for_each(|s| *s = 0.0);
        for j in 0..n {
            if i != j {
                sums[labels[j]] += squared_distance(x.row(i), x.row(j)).sqrt();
            }
        }

        let own = labels[i];
        if sizes[own] <= 1 {
            continue;
        }
        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..n_slots)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    let score = total / n as f64;
    if !score.is_finite() {
        return Err(Error::Numerical("silhouette score is not finite".to_string()));
    }
    Ok(score)
}

/// Davies-Bouldin index, `>= 0`, lower is better.
pub fn davies_bouldin_score(x: &Matrix, labels: &[usize]) -> Result<f64> {
    let n_slots = check_labels(x, labels)?;
    let sizes = cluster_sizes(labels, n_slots);

    let mut centroids = Matrix::zeros((n_slots, x.ncols()));
    for (i, &label) in labels.iter().enumerate() {
        let mut row = centroids.row_mut(label);
        row += &x.row(i);
    }
    for (k, mut row) in centroids.rows_mut().into_iter().enumerate() {
        if sizes[k] > 0 {
            row /= sizes[k] as f64;
        }
    }

    // mean distance of members to their centroid
    let mut scatter = vec![0.0; n_slots];
    for (i, &label) in labels.iter().enumerate() {
        scatter[label] += squared_distance(x.row(i), centroids.row(label)).sqrt();
    }
    for k in 0..n_slots {
        if sizes[k] > 0 {
            scatter[k] /= sizes[k] as f64;
        }
    }

    let present: Vec<usize> = (0..n_slots).filter(|&k| sizes[k] > 0).collect();
    let mut total = 0.0;
    for &i in &present {
        let worst = present
            .iter()
            .filter(|&&j| j != i)
            .map(|&j| {
                let separation = squared_distance(centroids.row(i), centroids.row(j)).sqrt();
                if separation > 0.0 {
                    (scatter[i] + scatter[j]) / separation
                } else {
                    0.0
                }
            })
            .fold(0.0, f64::max);
        total += worst;
    }

    let score = total / present.len() as f64;
    if !score.is_finite() {
        return Err(Error::Numerical("Davies-Bouldin score is not finite".to_string()));
    }
    Ok(score)
}

/// Sum of squared distances from each row to its assigned center.
pub fn inertia(x: &Matrix, labels: &[usize], centers: &Matrix) -> Result<f64> {
    if x.nrows() != labels.len() {
        return Err(Error::DimensionMismatch {
            expected: x.nrows(),
            actual: labels.len(),
        });
    }
    if x.ncols() != centers.ncols() {
        return Err(Error::DimensionMismatch {
            expected: centers.ncols(),
            actual: x.ncols(),
        });
    }
    if let Some(&bad) = labels.iter().find(|&&l| l >= centers.nrows()) {
        return Err(Error::InvalidParameter(format!(
            "label {bad} has no center ({} centers)",
            centers.nrows()
        )));
    }

    Ok(labels
        .iter()
        .enumerate()
        .map(|(i, &label)| squared_distance(x.row(i), centers.row(label)))
        .sum())
}

/// Row count per label, with `n_clusters` slots.
pub fn cluster_sizes(labels: &[usize], n_clusters: usize) -> Vec<usize> {
    let slots = labels.iter().max().map_or(n_clusters, |m| n_clusters.max(m + 1));
    let mut sizes = vec![0; slots];
    for &label in labels {
        sizes[label] += 1;
    }
    sizes
}

/// Population standard deviation of the sizes over their mean.
pub fn balance_ratio(sizes: &[usize]) -> f64 {
    if sizes.is_empty() {
        return 0.0;
    }
    let n = sizes.len() as f64;
    let mean = sizes.iter().sum::<usize>() as f64 / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = sizes
        .iter()
        .map(|&s| (s as f64 - mean) * (s as f64 - mean))
        .sum::<f64>()
        / n;
    variance.sqrt() / mean
}

/// Sorted random row indices when `n_rows` exceeds `max_rows`, else `None`.
pub fn subsample_indices(n_rows: usize, max_rows: usize, seed: u64) -> Option<Vec<usize>> {
    if n_rows <= max_rows {
        return None;
    }
    let mut rng = crate::cluster::seeded_rng(Some(seed));
    let mut picked = index::sample(&mut rng, n_rows, max_rows).into_vec();
    picked.sort_unstable();
    Some(picked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_groups() -> (Matrix, Vec<usize>) {
        let x = array![[0.0, 0.0], [0.0, 1.0], [10.0, 0.0], [10.0, 1.0]];
        (x, vec![0, 0, 1, 1])
    }

    #[test]
    fn test_silhouette_well_separated() {
        let (x, labels) = two_groups();
        let score = silhouette_score(&x, &labels).unwrap();
        // a = 1, b = mean(10, sqrt(101)) for every row
        let b = (10.0 + 101f64.sqrt()) / 2.0;
        assert!((score - (b - 1.0) / b).abs() < 1e-12);
    }

    #[test]
    fn test_silhouette_bad_partition_is_negative() {
        let (x, _) = two_groups();
        let score = silhouette_score(&x, &[0, 1, 0, 1]).unwrap();
        assert!(score < 0.0 && score >= -1.0);
    }

    #[test]
    fn test_silhouette_singleton_scores_zero() {
        let x = array![[0.0], [0.1], [5.0]];
        let score = silhouette_score(&x, &[0, 0, 1]).unwrap();
        let expected = ((5.0 - 0.1) / 5.0 + (4.9 - 0.1) / 4.9) / 3.0;
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_silhouette_needs_two_labels() {
        let (x, _) = two_groups();
        assert!(silhouette_score(&x, &[0, 0, 0, 0]).is_err());
        assert!(silhouette_score(&x, &[0, 1, 2, 3]).is_err());
        assert!(silhouette_score(&x, &[0, 1]).is_err());
    }

    #[test]
    fn test_davies_bouldin() {
        let (x, labels) = two_groups();
        let score = davies_bouldin_score(&x, &labels).unwrap();
        // scatter 0.5 per cluster, centroids 10 apart
        assert!((score - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_inertia() {
        let (x, labels) = two_groups();
        let centers = array![[0.0, 0.5], [10.0, 0.5]];
        assert!((inertia(&x, &labels, &centers).unwrap() - 1.0).abs() < 1e-12);
        assert!(inertia(&x, &[0, 0, 2, 2], &centers).is_err());
    }

    #[test]
    fn test_cluster_sizes_keeps_empty_slots() {
        assert_eq!(cluster_sizes(&[0, 0, 2], 4), vec![2, 0, 1, 0]);
        assert_eq!(cluster_sizes(&[], 2), vec![0, 0]);
    }

    #[test]
    fn test_balance_ratio() {
        assert_eq!(balance_ratio(&[5, 5, 5]), 0.0);
        assert!((balance_ratio(&[2, 6]) - 0.5).abs() < 1e-12);
        assert_eq!(balance_ratio(&[]), 0.0);
        assert_eq!(balance_ratio(&[0, 0]), 0.0);
    }

    #[test]
    fn test_subsample_indices() {
        assert_eq!(subsample_indices(10, 20, 42), None);
        let picked = subsample_indices(100, 10, 42).unwrap();
        assert_eq!(picked.len(), 10);
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(Some(picked), subsample_indices(100, 10, 42));
    }
}
