use crate::{Error, Matrix, Result, Vector};
use ndarray::Axis;
use std::cmp::Ordering;

const JACOBI_MAX_SWEEPS: usize = 100;
const JACOBI_EPS: f64 = 1e-12;

#[derive(Clone, Debug)]
pub struct PCA {
    pub components: Option<Matrix>,
    pub explained_variance: Option<Vector>,
    pub explained_variance_ratio: Option<Vector>,
    pub mean: Option<Vector>,
    n_components: Option<usize>,
}

impl PCA {
    pub fn new() -> Self {
        Self {
            components: None,
            explained_variance: None,
            explained_variance_ratio: None,
            mean: None,
            n_components: None,
        }
    }

    pub fn n_components(mut self, n_components: usize) -> Self {
        self.n_components = Some(n_components);
        self
    }

    pub fn fit(&mut self, x: &Matrix) -> Result<()> {
        if x.nrows() < 2 || x.ncols() == 0 {
            return Err(Error::InvalidParameter(
                "PCA needs at least two samples and one feature".to_string(),
            ));
        }
        if !x.iter().all(|v| v.is_finite()) {
            return Err(Error::Numerical("PCA input contains non-finite values".to_string()));
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let n_components = self.n_components.unwrap_or(n_features.min(n_samples));

        if n_components == 0 || n_components > n_features.min(n_samples) {
            return Err(Error::InvalidParameter(format!(
                "n_components={} must be in 1..={}",
                n_components,
                n_features.min(n_samples)
            )));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::Numerical("cannot compute feature means".to_string()))?;
        let x_centered = x - &mean.view().insert_axis(Axis(0));

        let cov = x_centered.t().dot(&x_centered) / (n_samples as f64 - 1.0);
        let (eigenvalues, eigenvectors) = symmetric_eigen(&cov)?;

        // Sort by eigenvalues (descending)
        let mut order: Vec<usize> = (0..n_features).collect();
        order.sort_by(|&a, &b| {
            eigenvalues[b].partial_cmp(&eigenvalues[a]).unwrap_or(Ordering::Equal)
        });

        let mut components = Matrix::zeros((n_components, n_features));
        let mut explained_variance = Vector::zeros(n_components);
        for (i, &idx) in order.iter().take(n_components).enumerate() {
            let mut component = eigenvectors.column(idx).to_owned();
            // deterministic sign: largest-magnitude loading is positive
            let pivot = component
                .iter()
                .copied()
                .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                .unwrap_or(0.0);
            if pivot < 0.0 {
                component.mapv_inplace(|v| -v);
            }
            components.row_mut(i).assign(&component);
            explained_variance[i] = eigenvalues[idx].max(0.0);
        }

        let total_variance: f64 = eigenvalues.iter().map(|v| v.max(0.0)).sum();
        let explained_variance_ratio = if total_variance > 0.0 {
            &explained_variance / total_variance
        } else {
            Vector::zeros(n_components)
        };

        self.components = Some(components);
        self.explained_variance = Some(explained_variance);
        self.explained_variance_ratio = Some(explained_variance_ratio);
        self.mean = Some(mean);

        Ok(())
    }

    pub fn transform(&self, x: &Matrix) -> Result<Matrix> {
        let components = self.components.as_ref().ok_or(Error::NotFitted("PCA"))?;
        let mean = self.mean.as_ref().ok_or(Error::NotFitted("PCA"))?;

        if x.ncols() != mean.len() {
            return Err(Error::DimensionMismatch {
                expected: mean.len(),
                actual: x.ncols(),
            });
        }

        let x_centered = x - &mean.view().insert_axis(Axis(0));
        Ok(x_centered.dot(&components.t()))
    }

    pub fn fit_transform(&mut self, x: &Matrix) -> Result<Matrix> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn inverse_transform(&self, x: &Matrix) -> Result<Matrix> {
        let components = self.components.as_ref().ok_or(Error::NotFitted("PCA"))?;
        let mean = self.mean.as_ref().ok_or(Error::NotFitted("PCA"))?;

        if x.ncols() != components.nrows() {
            return Err(Error::DimensionMismatch {
                expected: components.nrows(),
                actual: x.ncols(),
            });
        }

        Ok(x.dot(components) + &mean.view().insert_axis(Axis(0)))
    }
}

impl Default for PCA {
    fn default() -> Self {
        Self::new()
    }
}

/// Cyclic Jacobi eigen-decomposition of a symmetric matrix.
///
/// Returns eigenvalues and the matching eigenvectors as columns.
fn symmetric_eigen(matrix: &Matrix) -> Result<(Vector, Matrix)> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(Error::InvalidParameter(
            "matrix must be square for eigenvalue decomposition".to_string(),
        ));
    }

    let mut a = matrix.clone();
    let mut v = Matrix::eye(n);
    let scale = a.iter().map(|x| x * x).sum::<f64>().sqrt().max(f64::MIN_POSITIVE);

    for _ in 0..JACOBI_MAX_SWEEPS {
        let off_diagonal: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[[p, q]] * a[[p, q]])
            .sum::<f64>()
            .sqrt();
        if off_diagonal <= JACOBI_EPS * scale {
            return Ok((a.diag().to_owned(), v));
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[[p, q]].abs() <= f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * a[[p, q]]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    Err(Error::Numerical("eigen decomposition did not converge".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pca_basic() {
        let x = array![
            [1.0, 2.0, 3.0],
            [4.0, 5.0, 6.0],
            [7.0, 8.0, 9.0],
            [10.0, 11.0, 12.0]
        ];

        let mut pca = PCA::new().n_components(2);
        let transformed = pca.fit_transform(&x).unwrap();

        assert_eq!(transformed.shape(), &[4, 2]);
        assert!(pca.components.is_some());
        assert!(pca.explained_variance.is_some());
        assert!(pca.explained_variance_ratio.is_some());
        assert!(pca.mean.is_some());
    }

    #[test]
    fn test_pca_reconstruction() {
        let x = array![
            [1.0, 0.0],
            [0.0, 1.0],
            [-1.0, 0.0],
            [0.0, -1.0]
        ];

        let mut pca = PCA::new().n_components(2);
        let transformed = pca.fit_transform(&x).unwrap();
        let reconstructed = pca.inverse_transform(&transformed).unwrap();

        let diff = &x - &reconstructed;
        let max_error = diff.mapv(|x| x.abs()).into_iter().fold(0.0, f64::max);
        assert!(max_error < 1e-10);
    }

    #[test]
    fn test_pca_explained_variance() {
        let x = array![
            [1.0, 1.0],
            [2.0, 2.0],
            [3.0, 3.0],
            [4.0, 4.0]
        ];

        let mut pca = PCA::new();
        pca.fit(&x).unwrap();

        let explained_variance_ratio = pca.explained_variance_ratio.as_ref().unwrap();
        let total_ratio: f64 = explained_variance_ratio.sum();

        assert!((total_ratio - 1.0).abs() < 1e-10);
        assert!((explained_variance_ratio[0] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_pca_components_are_orthonormal() {
        let x = array![
            [2.5, 2.4, 0.5],
            [0.5, 0.7, 1.5],
            [2.2, 2.9, 0.1],
            [1.9, 2.2, 0.9],
            [3.1, 3.0, 0.3],
            [2.3, 2.7, 1.1]
        ];

        let mut pca = PCA::new();
        pca.fit(&x).unwrap();
        let components = pca.components.as_ref().unwrap();
        let gram = components.dot(&components.t());
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((gram[[i, j]] - expected).abs() < 1e-8);
            }
        }

        let variance = pca.explained_variance.as_ref().unwrap();
        assert!(variance[0] >= variance[1] && variance[1] >= variance[2]);
    }

    #[test]
    fn test_pca_invalid_components() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let mut pca = PCA::new().n_components(5);

        assert!(pca.fit(&x).is_err());
    }

    #[test]
    fn test_pca_transform_without_fit() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let pca = PCA::new();

        assert!(matches!(pca.transform(&x), Err(Error::NotFitted("PCA"))));
    }

    #[test]
    fn test_pca_dimension_mismatch() {
        let x_train = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let x_test = array![[1.0, 2.0], [3.0, 4.0]];

        let mut pca = PCA::new();
        pca.fit(&x_train).unwrap();

        assert!(pca.transform(&x_test).is_err());
    }

    #[test]
    fn test_pca_single_component() {
        let x = array![
            [1.0, 2.0, 3.0],
            [2.0, 4.0, 6.0],
            [3.0, 6.0, 9.0]
        ];

        let mut pca = PCA::new().n_components(1);
        let transformed = pca.fit_transform(&x).unwrap();

        assert_eq!(transformed.shape(), &[3, 1]);

        let explained_variance_ratio = pca.explained_variance_ratio.as_ref().unwrap();
        assert!(explained_variance_ratio[0] > 0.9);
    }
}
