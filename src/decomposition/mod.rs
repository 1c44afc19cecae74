//! Dimensionality reduction for plotting standardized features.
//!
//! - `PCA`: Principal Component Analysis via a symmetric eigen-decomposition
//!   of the covariance matrix
//!
//! # Examples
//!
//! ```rust
//! use engagement_segments::PCA;
//! use ndarray::array;
//!
//! let x = array![
//!     [1.0, 2.0, 3.0],
//!     [4.0, 5.0, 7.0],
//!     [7.0, 8.0, 8.0],
//!     [2.0, 1.0, 0.0]
//! ];
//!
//! let mut pca = PCA::new().n_components(2);
//! let transformed = pca.fit_transform(&x).unwrap();
//! assert_eq!(transformed.shape(), &[4, 2]);
//!
//! let explained_var = pca.explained_variance_ratio.as_ref().unwrap();
//! assert!(explained_var.sum() <= 1.0 + 1e-9);
//! ```

mod pca;

pub use pca::PCA;
