//! The clustering request: validate, prepare, fit, measure, project.
//!
//! [`ClusteringPipeline::cluster`] never fails outright. Every error,
//! including rejected input, becomes a [`ClusterOutcome::Failed`] carrying a
//! single fallback partition so a caller always has something to show.

use crate::cluster::{assign_labels, KMeans, MiniBatchKMeans};
use crate::config::PipelineConfig;
use crate::dataset::Table;
use crate::decomposition::PCA;
use crate::error::FailureReason;
use crate::metrics::{
    balance_ratio, cluster_sizes, davies_bouldin_score, distinct_labels, inertia, silhouette_score,
    subsample_indices,
};
use crate::preprocessing::{fill_non_finite, impute_median, scale_features, ScalerParams};
use crate::validation::validate;
use crate::{Error, Matrix, Result, Vector};
use ndarray::{s, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    KMeans,
    MiniBatchKMeans,
}

/// Everything needed to place new rows into the learned segments.
///
/// Round-trips through serde, so a model fitted once can be stored and
/// reloaded to label later uploads.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FittedModel {
    pub algorithm: Algorithm,
    pub features: Vec<String>,
    /// Cluster centers in standardized space, one row per cluster
    pub centers: Matrix,
    pub scaler: ScalerParams,
    /// Values used to fill missing or infinite cells, per feature
    pub fill_values: Vector,
    pub n_iter: usize,
}

impl FittedModel {
    pub fn n_clusters(&self) -> usize {
        self.centers.nrows()
    }

    /// Centers mapped back to the original feature units.
    pub fn centers_original_units(&self) -> Result<Matrix> {
        self.scaler.inverse_transform(&self.centers)
    }

    /// Assign rows of `table` to the nearest learned center.
    pub fn predict(&self, table: &Table) -> Result<Vec<usize>> {
        let mut x = table.feature_matrix(&self.features)?;
        fill_non_finite(&mut x, &self.fill_values)?;
        let scaled = self.scaler.transform(&x)?;
        Ok(assign_labels(&scaled, &self.centers).0)
    }
}

/// Partition quality; optional scores are absent when fewer than two
/// clusters could be evaluated.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub silhouette: Option<f64>,
    pub davies_bouldin: Option<f64>,
    pub inertia: f64,
    pub cluster_sizes: Vec<usize>,
    pub balance_ratio: f64,
    /// Rows the scores were computed on, when subsampled
    pub sampled_rows: Option<usize>,
}

/// Two-dimensional view of the standardized features.
#[derive(Clone, Debug, Serialize)]
pub struct Projection {
    pub points: Matrix,
    pub explained_variance_ratio: Vector,
    /// Source row of each point when the table was subsampled
    pub row_indices: Option<Vec<usize>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunInfo {
    pub n_samples: usize,
    pub n_features: usize,
    pub features_used: Vec<String>,
    pub clusters_requested: usize,
    pub clusters_formed: usize,
    pub imputed_cells: usize,
    pub warnings: Vec<String>,
}

/// A successful clustering run.
#[derive(Clone, Debug, Serialize)]
pub struct Segmentation {
    pub labels: Vec<usize>,
    pub model: FittedModel,
    pub metrics: QualityMetrics,
    pub projection: Option<Projection>,
    pub info: RunInfo,
}

/// Fallback returned when a run cannot complete.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DegradedResult {
    /// Every row in partition 0
    pub labels: Vec<usize>,
    pub reason: FailureReason,
    pub error: String,
    pub n_samples: usize,
    pub features_used: Vec<String>,
    pub clusters_requested: usize,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClusterOutcome {
    Clustered(Box<Segmentation>),
    Failed(DegradedResult),
}

impl ClusterOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ClusterOutcome::Clustered(_))
    }

    pub fn labels(&self) -> &[usize] {
        match self {
            ClusterOutcome::Clustered(seg) => &seg.labels,
            ClusterOutcome::Failed(degraded) => &degraded.labels,
        }
    }

    pub fn segmentation(&self) -> Option<&Segmentation> {
        match self {
            ClusterOutcome::Clustered(seg) => Some(seg),
            ClusterOutcome::Failed(_) => None,
        }
    }

    pub fn degraded(&self) -> Option<&DegradedResult> {
        match self {
            ClusterOutcome::Clustered(_) => None,
            ClusterOutcome::Failed(degraded) => Some(degraded),
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.degraded().map(|d| d.error.as_str())
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            ClusterOutcome::Clustered(seg) => &seg.info.warnings,
            ClusterOutcome::Failed(degraded) => &degraded.warnings,
        }
    }

    pub fn clusters_requested(&self) -> usize {
        match self {
            ClusterOutcome::Clustered(seg) => seg.info.clusters_requested,
            ClusterOutcome::Failed(degraded) => degraded.clusters_requested,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Imputed and scaled feature matrix.
#[derive(Clone, Debug)]
pub struct PreparedFeatures {
    pub scaled: Matrix,
    pub scaler: ScalerParams,
    pub fill_values: Vector,
    pub imputed_cells: usize,
}

#[derive(Clone, Debug, Default)]
pub struct ClusteringPipeline {
    config: PipelineConfig,
}

/// Cluster `table` with the default configuration.
pub fn cluster<S: AsRef<str>>(table: &Table, k: usize, features: &[S]) -> ClusterOutcome {
    ClusteringPipeline::default().cluster(table, k, features)
}

impl ClusteringPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cluster<S: AsRef<str>>(&self, table: &Table, k: usize, features: &[S]) -> ClusterOutcome {
        let features: Vec<String> = features.iter().map(|f| f.as_ref().to_string()).collect();
        info!(k, n_features = features.len(), n_samples = table.n_rows(), "starting clustering");

        let mut warnings = Vec::new();
        match self.run(table, k, &features, &mut warnings) {
            Ok(segmentation) => {
                info!(
                    silhouette = ?segmentation.metrics.silhouette,
                    clusters_formed = segmentation.info.clusters_formed,
                    "clustering finished"
                );
                ClusterOutcome::Clustered(Box::new(segmentation))
            }
            Err(err) => {
                error!(error = %err, reason = ?err.reason(), "clustering failed, returning fallback partition");
                ClusterOutcome::Failed(DegradedResult {
                    labels: vec![0; table.n_rows()],
                    reason: err.reason(),
                    error: err.to_string(),
                    n_samples: table.n_rows(),
                    features_used: features,
                    clusters_requested: k,
                    warnings,
                })
            }
        }
    }

    /// Median-impute and scale the selected columns.
    pub fn prepare_features<S: AsRef<str>>(&self, table: &Table, features: &[S]) -> Result<PreparedFeatures> {
        let mut x = table.feature_matrix(features)?;
        let (fill_values, imputed_cells) = impute_median(&mut x)?;
        if imputed_cells > 0 {
            debug!(imputed_cells, "filled missing or infinite values with column medians");
        }
        let (scaled, scaler) = scale_features(&x)?;
        Ok(PreparedFeatures {
            scaled,
            scaler,
            fill_values,
            imputed_cells,
        })
    }

    fn run(
        &self,
        table: &Table,
        k: usize,
        features: &[String],
        warnings: &mut Vec<String>,
    ) -> Result<Segmentation> {
        self.config.validate()?;
        let report = validate(table, k, features, &self.config)?;
        warnings.extend(report.warnings.iter().cloned());

        let prepared = self.prepare_features(table, features)?;
        let (algorithm, labels, centers, n_iter) = self.fit_partition(&prepared.scaled, k)?;

        let clusters_formed = distinct_labels(&labels);
        if clusters_formed != k {
            let message = format!("only {clusters_formed} of {k} requested clusters formed");
            warn!(%message);
            warnings.push(message);
        }

        let metrics = self.quality_metrics(&prepared.scaled, &labels, &centers, k, warnings)?;

        let projection = match self.project(&prepared.scaled) {
            Ok(projection) => Some(projection),
            Err(err) => {
                warn!(error = %err, "projection unavailable");
                warnings.push(format!("projection unavailable: {err}"));
                None
            }
        };

        Ok(Segmentation {
            labels,
            model: FittedModel {
                algorithm,
                features: features.to_vec(),
                centers,
                scaler: prepared.scaler,
                fill_values: prepared.fill_values,
                n_iter,
            },
            metrics,
            projection,
            info: RunInfo {
                n_samples: report.n_rows,
                n_features: report.n_features,
                features_used: features.to_vec(),
                clusters_requested: k,
                clusters_formed,
                imputed_cells: prepared.imputed_cells,
                warnings: warnings.clone(),
            },
        })
    }

    /// K-Means below the mini-batch threshold, Mini-Batch K-Means above it.
    pub(crate) fn fit_partition(&self, x: &Matrix, k: usize) -> Result<(Algorithm, Vec<usize>, Matrix, usize)> {
        let config = &self.config;
        if x.nrows() > config.minibatch_threshold {
            debug!(n_samples = x.nrows(), batch_size = config.batch_size, "using mini-batch k-means");
            let mut model = MiniBatchKMeans::new(k)
                .batch_size(config.batch_size)
                .n_init(config.minibatch_n_init)
                .max_iter(config.max_iter)
                .random_state(config.random_state);
            let labels = model.fit_predict(x)?;
            let centers = model
                .cluster_centers
                .ok_or(Error::NotFitted("MiniBatchKMeans"))?;
            Ok((Algorithm::MiniBatchKMeans, labels, centers, model.n_iter.unwrap_or(0)))
        } else {
            let mut model = KMeans::new(k)
                .n_init(config.n_init)
                .max_iter(config.max_iter)
                .tolerance(config.tolerance)
                .random_state(config.random_state);
            let labels = model.fit_predict(x)?;
            let centers = model.cluster_centers.ok_or(Error::NotFitted("KMeans"))?;
            Ok((Algorithm::KMeans, labels, centers, model.n_iter.unwrap_or(0)))
        }
    }

    fn quality_metrics(
        &self,
        x: &Matrix,
        labels: &[usize],
        centers: &Matrix,
        k: usize,
        warnings: &mut Vec<String>,
    ) -> Result<QualityMetrics> {
        let sizes = cluster_sizes(labels, k);
        let balance = balance_ratio(&sizes);
        let total_inertia = inertia(x, labels, centers)?;

        let sample = subsample_indices(x.nrows(), self.config.metric_sample_size, self.config.random_state);
        let (x_eval, labels_eval) = match &sample {
            Some(rows) => (
                x.select(Axis(0), rows),
                rows.iter().map(|&i| labels[i]).collect::<Vec<_>>(),
            ),
            None => (x.clone(), labels.to_vec()),
        };

        let evaluable = distinct_labels(&labels_eval);
        let (silhouette, davies_bouldin) = if (2..x_eval.nrows()).contains(&evaluable) {
            (
                Some(silhouette_score(&x_eval, &labels_eval)?),
                Some(davies_bouldin_score(&x_eval, &labels_eval)?),
            )
        } else {
            let message = format!("quality scores skipped: {evaluable} distinct clusters in evaluated rows");
            warn!(%message);
            warnings.push(message);
            (None, None)
        };

        Ok(QualityMetrics {
            silhouette,
            davies_bouldin,
            inertia: total_inertia,
            cluster_sizes: sizes,
            balance_ratio: balance,
            sampled_rows: sample.map(|rows| rows.len()),
        })
    }

    fn project(&self, x: &Matrix) -> Result<Projection> {
        let sample = subsample_indices(
            x.nrows(),
            self.config.projection_sample_size,
            self.config.random_state,
        );
        let x_fit = match &sample {
            Some(rows) => x.select(Axis(0), rows),
            None => x.clone(),
        };

        let n_components = x_fit.ncols().min(2);
        let mut pca = PCA::new().n_components(n_components);
        let reduced = pca.fit_transform(&x_fit)?;
        let ratio = pca
            .explained_variance_ratio
            .ok_or(Error::NotFitted("PCA"))?;

        // a single feature projects onto one axis; the second stays at zero
        let mut points = Matrix::zeros((reduced.nrows(), 2));
        points.slice_mut(s![.., ..n_components]).assign(&reduced);
        let mut explained_variance_ratio = Vector::zeros(2);
        explained_variance_ratio
            .slice_mut(s![..n_components])
            .assign(&ratio);

        Ok(Projection {
            points,
            explained_variance_ratio,
            row_indices: sample,
        })
    }
}
