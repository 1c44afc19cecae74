//! Segment social-media content records by engagement with K-Means.
//!
//! A request names a [`Table`], the number of clusters and the numeric
//! feature columns to use. [`cluster`] validates the input, imputes and
//! standardizes the features, fits K-Means (Mini-Batch for large tables),
//! scores the partition and projects it to two dimensions. It never fails:
//! unusable input yields [`ClusterOutcome::Failed`] with every row in one
//! partition and a [`FailureReason`].
//!
//! ```rust
//! use engagement_segments::{cluster, Table};
//!
//! let likes: Vec<f64> = (0..20).map(|i| if i < 10 { 10.0 + i as f64 } else { 500.0 + i as f64 }).collect();
//! let views: Vec<f64> = (0..20).map(|i| if i < 10 { 100.0 + i as f64 } else { 9000.0 - i as f64 }).collect();
//! let table = Table::new()
//!     .with_column("Likes", likes)
//!     .unwrap()
//!     .with_column("Views", views)
//!     .unwrap();
//!
//! let outcome = cluster(&table, 2, &["Likes", "Views"]);
//! assert!(outcome.is_success());
//! assert_eq!(outcome.labels().len(), 20);
//! ```

pub use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

pub mod cluster;
pub mod config;
pub mod dataset;
pub mod decomposition;
pub mod diagnostics;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod preprocessing;
pub mod profiling;
pub mod selection;
pub mod validation;

pub type Vector = Array1<f64>;
pub type Matrix = Array2<f64>;

pub use cluster::{Init, KMeans, MiniBatchKMeans};
pub use config::PipelineConfig;
pub use dataset::{Column, Table};
pub use decomposition::PCA;
pub use diagnostics::{diagnose, Diagnostics};
pub use error::{Error, FailureReason, Result, ValidationError};
pub use pipeline::{
    cluster, Algorithm, ClusterOutcome, ClusteringPipeline, DegradedResult, FittedModel, Projection,
    QualityMetrics, Segmentation,
};
pub use preprocessing::{RobustScaler, ScalerKind, ScalerParams, StandardScaler};
pub use profiling::{cluster_profile, crosstab, segment_insights};
pub use selection::{best_k_by_silhouette, elbow_curve, suggest_cluster_count};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_types_work() {
        let vec = Vector::zeros(5);
        let mat = Matrix::zeros((3, 4));
        assert_eq!(vec.len(), 5);
        assert_eq!(mat.shape(), &[3, 4]);
    }
}
