//! Pipeline thresholds and their TOML loading.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable limits for validation, fitting and subsampling.
///
/// Every field has a default, so a TOML file only needs the keys it
/// overrides:
///
/// ```toml
/// max_clusters = 12
/// random_state = 7
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Largest accepted cluster count
    pub max_clusters: usize,
    /// Smallest accepted row count
    pub min_rows: usize,
    /// Missing-cell fraction above which validation fails
    pub max_missing_fraction: f64,
    /// Missing-cell fraction above which validation warns
    pub missing_warning_fraction: f64,
    /// Row count above which Mini-Batch K-Means is used
    pub minibatch_threshold: usize,
    pub batch_size: usize,
    pub n_init: usize,
    pub minibatch_n_init: usize,
    pub max_iter: usize,
    pub tolerance: f64,
    pub random_state: u64,
    /// Rows used for silhouette and Davies-Bouldin on large tables
    pub metric_sample_size: usize,
    /// Rows used to fit the 2-D projection on large tables
    pub projection_sample_size: usize,
    /// IQR multiplier for the extreme-outlier warning
    pub outlier_iqr_factor: f64,
    /// Absolute correlation above which a feature pair is flagged
    pub correlation_warning: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_clusters: 20,
            min_rows: 10,
            max_missing_fraction: 0.5,
            missing_warning_fraction: 0.1,
            minibatch_threshold: 10_000,
            batch_size: 1000,
            n_init: 10,
            minibatch_n_init: 3,
            max_iter: 300,
            tolerance: 1e-4,
            random_state: 42,
            metric_sample_size: 5000,
            projection_sample_size: 5000,
            outlier_iqr_factor: 10.0,
            correlation_warning: 0.95,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "loading pipeline config");
        Self::from_toml_str(&content)
    }

    /// Reject settings the pipeline cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_clusters < 2 {
            return Err(Error::Config(format!(
                "max_clusters must be >= 2, got {}",
                self.max_clusters
            )));
        }
        if self.min_rows < 2 {
            return Err(Error::Config(format!("min_rows must be >= 2, got {}", self.min_rows)));
        }
        for (name, value) in [
            ("max_missing_fraction", self.max_missing_fraction),
            ("missing_warning_fraction", self.missing_warning_fraction),
            ("correlation_warning", self.correlation_warning),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{name} must be within [0, 1], got {value}")));
            }
        }
        for (name, value) in [
            ("batch_size", self.batch_size),
            ("n_init", self.n_init),
            ("minibatch_n_init", self.minibatch_n_init),
            ("max_iter", self.max_iter),
            ("metric_sample_size", self.metric_sample_size),
            ("projection_sample_size", self.projection_sample_size),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be > 0")));
            }
        }
        if !(self.tolerance >= 0.0) {
            return Err(Error::Config(format!("tolerance must be >= 0, got {}", self.tolerance)));
        }
        if !(self.outlier_iqr_factor > 0.0) {
            return Err(Error::Config(format!(
                "outlier_iqr_factor must be > 0, got {}",
                self.outlier_iqr_factor
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_clusters, 20);
        assert_eq!(config.random_state, 42);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str("max_clusters = 8\nrandom_state = 7\n").unwrap();
        assert_eq!(config.max_clusters, 8);
        assert_eq!(config.random_state, 7);
        assert_eq!(config.min_rows, 10);
        assert_eq!(config.batch_size, 1000);
    }

    #[test]
    fn rejects_out_of_range_fraction() {
        let err = PipelineConfig::from_toml_str("max_missing_fraction = 1.5").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_zero_batch_size() {
        let config = PipelineConfig { batch_size: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = PipelineConfig::from_toml_str("max_clusters = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "minibatch_threshold = 500").unwrap();
        let config = PipelineConfig::from_path(file.path()).unwrap();
        assert_eq!(config.minibatch_threshold, 500);
    }
}
