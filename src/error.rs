//! Error types shared by every stage of the segmentation pipeline.

use serde::Serialize;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable code describing why a clustering request failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum FailureReason {
    InvalidClusterCount,
    TooFewRows,
    FewerRowsThanClusters,
    NoFeatures,
    MissingColumns,
    NonNumericColumns,
    ExcessiveMissing,
    ZeroVariance,
    InvalidParameter,
    InvalidTable,
    Scaling,
    Numerical,
    NotFitted,
    DimensionMismatch,
    Config,
    Serialization,
}

impl FailureReason {
    /// Short advice to show next to the error message.
    pub fn hint(&self) -> &'static str {
        match self {
            FailureReason::InvalidClusterCount => "choose between 2 and the configured maximum clusters",
            FailureReason::TooFewRows => "clustering needs at least the configured minimum of rows",
            FailureReason::FewerRowsThanClusters => "reduce the number of clusters",
            FailureReason::NoFeatures | FailureReason::MissingColumns => "select existing numeric feature columns",
            FailureReason::NonNumericColumns => "make sure every selected feature is numeric",
            FailureReason::ExcessiveMissing => "impute or drop rows with missing values",
            FailureReason::ZeroVariance => "drop features where every row has the same value",
            FailureReason::Scaling => "check the data for outliers or missing values",
            FailureReason::Numerical => "try fewer clusters or a different feature selection",
            FailureReason::InvalidParameter
            | FailureReason::InvalidTable
            | FailureReason::NotFitted
            | FailureReason::DimensionMismatch => "check the request arguments",
            FailureReason::Config => "fix the pipeline configuration",
            FailureReason::Serialization => "check that the saved model or result is intact",
        }
    }
}

/// Precondition failures detected before any model is fitted.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum ValidationError {
    #[error("cluster count {k} must be between 2 and {max}")]
    InvalidClusterCount { k: usize, max: usize },

    #[error("table has {rows} rows, at least {min} are required")]
    TooFewRows { rows: usize, min: usize },

    #[error("table has {rows} rows, fewer than the {k} requested clusters")]
    FewerRowsThanClusters { rows: usize, k: usize },

    #[error("no feature columns selected")]
    NoFeatures,

    #[error("feature columns not found: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("feature columns are not numeric: {}", .0.join(", "))]
    NonNumericColumns(Vec<String>),

    #[error("missing values too high ({:.1}%, limit {:.1}%)", .fraction * 100.0, .max * 100.0)]
    ExcessiveMissing { fraction: f64, max: f64 },

    #[error("feature columns have zero variance: {}", .0.join(", "))]
    ZeroVariance(Vec<String>),
}

impl ValidationError {
    pub fn reason(&self) -> FailureReason {
        match self {
            ValidationError::InvalidClusterCount { .. } => FailureReason::InvalidClusterCount,
            ValidationError::TooFewRows { .. } => FailureReason::TooFewRows,
            ValidationError::FewerRowsThanClusters { .. } => FailureReason::FewerRowsThanClusters,
            ValidationError::NoFeatures => FailureReason::NoFeatures,
            ValidationError::MissingColumns(_) => FailureReason::MissingColumns,
            ValidationError::NonNumericColumns(_) => FailureReason::NonNumericColumns,
            ValidationError::ExcessiveMissing { .. } => FailureReason::ExcessiveMissing,
            ValidationError::ZeroVariance(_) => FailureReason::ZeroVariance,
        }
    }
}

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before fitting
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Estimator or helper called with an unusable argument
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Table construction or lookup problem
    #[error("invalid table: {0}")]
    InvalidTable(String),

    /// Both standard and robust scaling produced unusable output
    #[error("scaling failed: {0}")]
    Scaling(String),

    /// Non-finite intermediate values or degenerate geometry
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Estimator used before `fit`
    #[error("{0} not fitted, call fit() first")]
    NotFitted(&'static str),

    #[error("expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Configuration loading or validation error
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn reason(&self) -> FailureReason {
        match self {
            Error::Validation(err) => err.reason(),
            Error::InvalidParameter(_) => FailureReason::InvalidParameter,
            Error::InvalidTable(_) => FailureReason::InvalidTable,
            Error::Scaling(_) => FailureReason::Scaling,
            Error::Numerical(_) => FailureReason::Numerical,
            Error::NotFitted(_) => FailureReason::NotFitted,
            Error::DimensionMismatch { .. } => FailureReason::DimensionMismatch,
            Error::Config(_) | Error::Io(_) | Error::Toml(_) => FailureReason::Config,
            Error::Json(_) => FailureReason::Serialization,
        }
    }
}
