//! Data and partition quality summary for display next to a clustering run.

use crate::dataset::Table;
use crate::pipeline::ClusterOutcome;
use crate::preprocessing::is_constant;
use serde::Serialize;

/// Clusters below this many rows are reported.
pub const SMALL_CLUSTER_ROWS: usize = 5;
/// Tables below this many rows are flagged as small.
pub const SMALL_TABLE_ROWS: usize = 100;
/// Balance ratios below this are considered balanced.
pub const BALANCED_RATIO: f64 = 0.5;

const IMPROVEMENT_TIPS: [&str; 5] = [
    "try fewer clusters",
    "check the data for outliers",
    "make sure every feature varies enough",
    "try a different feature selection",
    "sample large tables while experimenting",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SilhouetteQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl SilhouetteQuality {
    pub fn from_score(score: f64) -> Self {
        if score > 0.7 {
            SilhouetteQuality::Excellent
        } else if score > 0.5 {
            SilhouetteQuality::Good
        } else if score > 0.3 {
            SilhouetteQuality::Fair
        } else {
            SilhouetteQuality::Poor
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataQuality {
    pub missing_pct: f64,
    pub zero_variance_features: Vec<String>,
    pub n_rows: usize,
    pub small_table: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusteringQuality {
    pub balance_ratio: Option<f64>,
    pub balanced: Option<bool>,
    pub silhouette: Option<f64>,
    pub silhouette_quality: Option<SilhouetteQuality>,
    pub clusters_formed: usize,
    pub clusters_requested: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Diagnostics {
    pub data: DataQuality,
    pub clustering: ClusteringQuality,
    pub warnings: Vec<String>,
    /// Suggestions shown when the partition is weak or degraded
    pub tips: Vec<String>,
}

pub fn diagnose<S: AsRef<str>>(table: &Table, features: &[S], outcome: &ClusterOutcome) -> Diagnostics {
    let data = data_quality(table, features);

    let segmentation = outcome.segmentation();
    let metrics = segmentation.map(|seg| &seg.metrics);
    let silhouette = metrics.and_then(|m| m.silhouette);
    let balance_ratio = metrics.map(|m| m.balance_ratio);

    let mut formed = outcome.labels().to_vec();
    formed.sort_unstable();
    formed.dedup();

    let clustering = ClusteringQuality {
        balance_ratio,
        balanced: balance_ratio.map(|b| b < BALANCED_RATIO),
        silhouette,
        silhouette_quality: silhouette.map(SilhouetteQuality::from_score),
        clusters_formed: formed.len(),
        clusters_requested: outcome.clusters_requested(),
    };

    let mut warnings = Vec::new();
    if let Some(m) = metrics {
        let small = m.cluster_sizes.iter().filter(|&&s| s < SMALL_CLUSTER_ROWS).count();
        if small > 0 {
            warnings.push(format!("{small} clusters have fewer than {SMALL_CLUSTER_ROWS} rows"));
        }
    }
    if let Some(score) = silhouette.filter(|s| *s < 0.1) {
        warnings.push(format!("low silhouette score ({score:.3})"));
    }
    if let Some(degraded) = outcome.degraded() {
        warnings.push("fallback clustering in use".to_string());
        warnings.extend(degraded.warnings.iter().cloned());
        warnings.push(format!("error: {}", degraded.error));
    } else {
        warnings.extend(outcome.warnings().iter().cloned());
    }

    let weak = outcome.degraded().is_some() || silhouette.is_none_or(|s| s < 0.3);
    let tips = if weak {
        IMPROVEMENT_TIPS.iter().map(|t| t.to_string()).collect()
    } else {
        Vec::new()
    };

    Diagnostics {
        data,
        clustering,
        warnings,
        tips,
    }
}

fn data_quality<S: AsRef<str>>(table: &Table, features: &[S]) -> DataQuality {
    let columns: Vec<(&str, &[Option<f64>])> = features
        .iter()
        .filter_map(|f| table.numeric(f.as_ref()).ok().map(|values| (f.as_ref(), values)))
        .collect();

    let cells = table.n_rows() * columns.len();
    let missing: usize = columns
        .iter()
        .map(|(_, values)| values.iter().filter(|v| v.is_none_or(f64::is_nan)).count())
        .sum();
    let missing_pct = if cells > 0 { missing as f64 / cells as f64 * 100.0 } else { 0.0 };

    let zero_variance_features = columns
        .iter()
        .filter(|(_, values)| {
            let dense: Vec<f64> = values.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
            is_constant(&dense)
        })
        .map(|(name, _)| name.to_string())
        .collect();

    DataQuality {
        missing_pct,
        zero_variance_features,
        n_rows: table.n_rows(),
        small_table: table.n_rows() < SMALL_TABLE_ROWS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::cluster;

    fn groups(n: usize) -> Table {
        Table::new()
            .with_column("a", (0..n).map(|i| (i % 2) as f64 * 100.0 + (i % 3) as f64).collect::<Vec<_>>())
            .unwrap()
            .with_column("b", (0..n).map(|i| (i % 2) as f64 * 50.0 + (i % 5) as f64).collect::<Vec<_>>())
            .unwrap()
            .with_column("flat", vec![1.0; n])
            .unwrap()
    }

    #[test]
    fn quality_bands() {
        assert_eq!(SilhouetteQuality::from_score(0.8), SilhouetteQuality::Excellent);
        assert_eq!(SilhouetteQuality::from_score(0.6), SilhouetteQuality::Good);
        assert_eq!(SilhouetteQuality::from_score(0.4), SilhouetteQuality::Fair);
        assert_eq!(SilhouetteQuality::from_score(0.3), SilhouetteQuality::Poor);
    }

    #[test]
    fn diagnoses_good_run() {
        let table = groups(40);
        let outcome = cluster(&table, 2, &["a"]);
        let report = diagnose(&table, &["a"], &outcome);

        assert_eq!(report.data.missing_pct, 0.0);
        assert!(report.data.zero_variance_features.is_empty());
        assert!(report.data.small_table);
        assert_eq!(report.clustering.clusters_formed, 2);
        assert_eq!(report.clustering.balanced, Some(true));
        assert_eq!(report.clustering.silhouette_quality, Some(SilhouetteQuality::Excellent));
        assert!(report.warnings.is_empty());
        assert!(report.tips.is_empty());
    }

    #[test]
    fn diagnoses_degraded_run() {
        let table = groups(40);
        let outcome = cluster(&table, 2, &["flat"]);
        let report = diagnose(&table, &["flat"], &outcome);

        assert_eq!(report.data.zero_variance_features, vec!["flat".to_string()]);
        assert_eq!(report.clustering.clusters_formed, 1);
        assert_eq!(report.clustering.silhouette, None);
        assert_eq!(report.warnings[0], "fallback clustering in use");
        assert!(report.warnings.last().unwrap().starts_with("error: "));
        assert_eq!(report.tips.len(), IMPROVEMENT_TIPS.len());
    }

    #[test]
    fn reports_small_clusters() {
        let table = groups(12);
        let outcome = cluster(&table, 4, &["a", "b"]);
        let report = diagnose(&table, &["a", "b"], &outcome);
        assert!(report.warnings.iter().any(|w| w.contains("fewer than 5 rows")));
        // a and b move together, so validation also flagged them
        assert!(report.warnings.iter().any(|w| w.contains("a-b")));
    }
}
