//! Input checks run before any model is fitted.

use crate::config::PipelineConfig;
use crate::dataset::Table;
use crate::error::ValidationError;
use crate::preprocessing::{is_constant, quantile};
use serde::Serialize;

/// Outcome of a successful validation pass.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidationReport {
    pub n_rows: usize,
    pub n_features: usize,
    /// Fraction of selected cells that are missing
    pub missing_fraction: f64,
    /// Non-fatal data quality findings
    pub warnings: Vec<String>,
}

/// Check `table` against the clustering preconditions.
///
/// The first violated rule is returned; rules are evaluated in a fixed
/// order (cluster count, row counts, column presence, column types,
/// missing data, variance).
pub fn validate<S: AsRef<str>>(
    table: &Table,
    k: usize,
    features: &[S],
    config: &PipelineConfig,
) -> Result<ValidationReport, ValidationError> {
    let n_rows = table.n_rows();

    if k < 2 || k > config.max_clusters {
        return Err(ValidationError::InvalidClusterCount { k, max: config.max_clusters });
    }
    if n_rows < config.min_rows {
        return Err(ValidationError::TooFewRows { rows: n_rows, min: config.min_rows });
    }
    if n_rows < k {
        return Err(ValidationError::FewerRowsThanClusters { rows: n_rows, k });
    }
    if features.is_empty() {
        return Err(ValidationError::NoFeatures);
    }

    let missing: Vec<String> = features
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| !table.contains(name))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingColumns(missing));
    }

    let mut columns = Vec::with_capacity(features.len());
    let mut non_numeric = Vec::new();
    for name in features.iter().map(AsRef::as_ref) {
        match table.column(name).and_then(|c| c.as_numeric()) {
            Some(values) => columns.push((name, values)),
            None => non_numeric.push(name.to_string()),
        }
    }
    if !non_numeric.is_empty() {
        return Err(ValidationError::NonNumericColumns(non_numeric));
    }

    let missing_cells: usize = columns
        .iter()
        .map(|(_, values)| values.iter().filter(|v| v.is_none_or(f64::is_nan)).count())
        .sum();
    let missing_fraction = missing_cells as f64 / (n_rows * columns.len()) as f64;
    if missing_fraction > config.max_missing_fraction {
        return Err(ValidationError::ExcessiveMissing {
            fraction: missing_fraction,
            max: config.max_missing_fraction,
        });
    }

    let dense: Vec<(&str, Vec<f64>)> = columns
        .iter()
        .map(|(name, values)| (*name, values.iter().map(|v| v.unwrap_or(f64::NAN)).collect()))
        .collect();

    let zero_variance: Vec<String> = dense
        .iter()
        .filter(|(_, values)| is_constant(values))
        .map(|(name, _)| name.to_string())
        .collect();
    if !zero_variance.is_empty() {
        return Err(ValidationError::ZeroVariance(zero_variance));
    }

    let mut warnings = Vec::new();
    if missing_fraction > config.missing_warning_fraction {
        warnings.push(format!("missing values: {:.1}%", missing_fraction * 100.0));
    }

    let outliers: Vec<&str> = dense
        .iter()
        .filter(|(_, values)| has_extreme_outliers(values, config.outlier_iqr_factor))
        .map(|(name, _)| *name)
        .collect();
    if !outliers.is_empty() {
        warnings.push(format!(
            "extreme outliers detected in: {}",
            outliers.iter().take(3).copied().collect::<Vec<_>>().join(", ")
        ));
    }

    let mut correlated = Vec::new();
    for (i, (name_a, a)) in dense.iter().enumerate() {
        for (name_b, b) in dense.iter().skip(i + 1) {
            if let Some(r) = pearson(a, b).filter(|r| r.abs() > config.correlation_warning) {
                correlated.push(format!("{name_a}-{name_b}: {:.2}", r.abs()));
            }
        }
    }
    if !correlated.is_empty() {
        warnings.push(format!(
            "high correlation (>{}): {}",
            config.correlation_warning,
            correlated.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
        ));
    }

    for warning in &warnings {
        tracing::warn!(%warning, "data quality warning");
    }

    Ok(ValidationReport {
        n_rows,
        n_features: columns.len(),
        missing_fraction,
        warnings,
    })
}

/// Any finite value outside `[Q1 - f*IQR, Q3 + f*IQR]`.
fn has_extreme_outliers(values: &[f64], factor: f64) -> bool {
    let mut sorted = values.to_vec();
    let (Some(q1), Some(q3)) = (quantile(&mut sorted, 0.25), quantile(&mut sorted, 0.75)) else {
        return false;
    };
    let iqr = q3 - q1;
    if iqr <= 0.0 {
        return false;
    }
    let (lower, upper) = (q1 - factor * iqr, q3 + factor * iqr);
    sorted.iter().any(|&v| v < lower || v > upper)
}

/// Pearson correlation over rows where both values are finite.
pub(crate) fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(&x, &y)| (x, y))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a) * (x - mean_a);
        var_b += (y - mean_b) * (y - mean_b);
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}
