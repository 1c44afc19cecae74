//! Help choose the number of clusters.

use crate::config::PipelineConfig;
use crate::metrics::{distinct_labels, inertia, silhouette_score, subsample_indices};
use crate::pipeline::ClusteringPipeline;
use crate::{Error, Matrix, Result};
use ndarray::Axis;
use serde::Serialize;

/// Heuristic cluster counts derived from table shape alone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClusterSuggestion {
    pub based_on_size: usize,
    pub based_on_features: usize,
    /// The smaller of the two heuristics
    pub recommended: usize,
    /// Inclusive range, only for tables above 100 rows
    pub recommended_range: Option<(usize, usize)>,
    pub warnings: Vec<String>,
}

pub fn suggest_cluster_count(n_rows: usize, n_features: usize) -> ClusterSuggestion {
    let mut based_on_size = (n_rows / 100).clamp(2, 10);
    let based_on_features = (n_features * 2).clamp(2, 8);
    let mut warnings = Vec::new();

    if n_rows < 50 {
        based_on_size = (n_rows / 10).clamp(2, 5);
        warnings.push(format!("small table ({n_rows} rows)"));
    }
    if n_features < 3 {
        warnings.push(format!("only {n_features} features"));
    }

    let recommended_range = (n_rows > 100).then(|| {
        let max_k = (n_rows / 50).min(8);
        let min_k = n_features.max(2);
        if min_k <= max_k { (min_k, max_k) } else { (2, max_k) }
    });

    ClusterSuggestion {
        based_on_size,
        based_on_features,
        recommended: based_on_size.min(based_on_features),
        recommended_range,
        warnings,
    }
}

/// Fit quality for one candidate cluster count.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KEvaluation {
    pub k: usize,
    pub inertia: f64,
    /// Absent when the fit produced fewer than two clusters
    pub silhouette: Option<f64>,
}

/// Fit each candidate `k` on already standardized data.
pub fn evaluate_cluster_counts(
    x: &Matrix,
    ks: impl IntoIterator<Item = usize>,
    config: &PipelineConfig,
) -> Result<Vec<KEvaluation>> {
    config.validate()?;
    let pipeline = ClusteringPipeline::new(config.clone());
    let sample = subsample_indices(x.nrows(), config.metric_sample_size, config.random_state);

    let mut evaluations = Vec::new();
    for k in ks {
        if k < 2 || k >= x.nrows() {
            return Err(Error::InvalidParameter(format!(
                "candidate k={k} must be between 2 and {}",
                x.nrows().saturating_sub(1)
            )));
        }

        let (_, labels, centers, _) = pipeline.fit_partition(x, k)?;
        let total_inertia = inertia(x, &labels, &centers)?;

        let (x_eval, labels_eval) = match &sample {
            Some(rows) => (x.select(Axis(0), rows), rows.iter().map(|&i| labels[i]).collect()),
            None => (x.clone(), labels),
        };
        let silhouette = if (2..x_eval.nrows()).contains(&distinct_labels(&labels_eval)) {
            Some(silhouette_score(&x_eval, &labels_eval)?)
        } else {
            None
        };

        tracing::debug!(k, inertia = total_inertia, silhouette = ?silhouette, "evaluated cluster count");
        evaluations.push(KEvaluation {
            k,
            inertia: total_inertia,
            silhouette,
        });
    }
    Ok(evaluations)
}

/// `(k, inertia)` pairs for an elbow plot.
pub fn elbow_curve(
    x: &Matrix,
    ks: impl IntoIterator<Item = usize>,
    config: &PipelineConfig,
) -> Result<Vec<(usize, f64)>> {
    Ok(evaluate_cluster_counts(x, ks, config)?
        .into_iter()
        .map(|e| (e.k, e.inertia))
        .collect())
}

/// Candidate with the highest silhouette, ties going to the smaller `k`.
pub fn best_k_by_silhouette(
    x: &Matrix,
    ks: impl IntoIterator<Item = usize>,
    config: &PipelineConfig,
) -> Result<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for eval in evaluate_cluster_counts(x, ks, config)? {
        if let Some(score) = eval.silhouette {
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((eval.k, score));
            }
        }
    }
    best.ok_or_else(|| Error::InvalidParameter("no candidate produced a silhouette score".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::scale_features;

    fn four_blobs() -> Matrix {
        let corners = [[0.0, 0.0], [0.0, 10.0], [10.0, 0.0], [10.0, 10.0]];
        Matrix::from_shape_fn((40, 2), |(i, j)| corners[i % 4][j] + ((i * 7 + j * 3) % 5) as f64 * 0.1)
    }

    #[test]
    fn test_suggestion_for_small_table() {
        let s = suggest_cluster_count(30, 2);
        assert_eq!(s.based_on_size, 3);
        assert_eq!(s.based_on_features, 4);
        assert_eq!(s.recommended, 3);
        assert_eq!(s.recommended_range, None);
        assert_eq!(s.warnings.len(), 2);
    }

    #[test]
    fn test_suggestion_for_large_table() {
        let s = suggest_cluster_count(1000, 4);
        assert_eq!(s.based_on_size, 10);
        assert_eq!(s.based_on_features, 8);
        assert_eq!(s.recommended, 8);
        assert_eq!(s.recommended_range, Some((4, 8)));
        assert!(s.warnings.is_empty());
    }

    #[test]
    fn test_suggestion_range_falls_back_to_two() {
        let s = suggest_cluster_count(120, 5);
        assert_eq!(s.recommended, 2);
        assert_eq!(s.recommended_range, Some((2, 2)));
    }

    #[test]
    fn test_elbow_curve_decreases() {
        let (x, _) = scale_features(&four_blobs()).unwrap();
        let curve = elbow_curve(&x, 2..=6, &PipelineConfig::default()).unwrap();
        assert_eq!(curve.iter().map(|p| p.0).collect::<Vec<_>>(), vec![2, 3, 4, 5, 6]);
        assert!(curve.windows(2).all(|w| w[1].1 <= w[0].1 + 1e-9));
    }

    #[test]
    fn test_best_k_finds_four_blobs() {
        let (x, _) = scale_features(&four_blobs()).unwrap();
        let (k, score) = best_k_by_silhouette(&x, 2..=6, &PipelineConfig::default()).unwrap();
        assert_eq!(k, 4);
        assert!(score > 0.9);
    }

    #[test]
    fn test_rejects_impossible_candidates() {
        let (x, _) = scale_features(&four_blobs()).unwrap();
        assert!(elbow_curve(&x, [1], &PipelineConfig::default()).is_err());
        assert!(elbow_curve(&x, [40], &PipelineConfig::default()).is_err());
        assert!(best_k_by_silhouette(&x, Vec::<usize>::new(), &PipelineConfig::default()).is_err());
    }
}
