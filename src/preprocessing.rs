use crate::{Error, Matrix, Result, Vector};
use ndarray::Axis;
use serde::{Deserialize, Serialize};

/// Which scaler produced a [`ScalerParams`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalerKind {
    Standard,
    Robust,
}

/// Fitted per-feature centering and scaling: `(x - center) / scale`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub kind: ScalerKind,
    pub center: Vector,
    pub scale: Vector,
}

impl ScalerParams {
    pub fn transform(&self, data: &Matrix) -> Result<Matrix> {
        self.check_width(data)?;
        let mut result = data.clone();
        for mut row in result.axis_iter_mut(Axis(0)) {
            row -= &self.center;
            row /= &self.scale;
        }
        Ok(result)
    }

    pub fn inverse_transform(&self, data: &Matrix) -> Result<Matrix> {
        self.check_width(data)?;
        let mut result = data.clone();
        for mut row in result.axis_iter_mut(Axis(0)) {
            row *= &self.scale;
            row += &self.center;
        }
        Ok(result)
    }

    fn check_width(&self, data: &Matrix) -> Result<()> {
        if data.ncols() != self.center.len() {
            return Err(Error::DimensionMismatch {
                expected: self.center.len(),
                actual: data.ncols(),
            });
        }
        Ok(())
    }
}

/// Zero-mean, unit-variance scaling with the population standard deviation.
#[derive(Clone, Debug, Default)]
pub struct StandardScaler {
    mean: Option<Vector>,
    std: Option<Vector>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self { mean: None, std: None }
    }

    pub fn fit(&mut self, data: &Matrix) -> Result<()> {
        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::Scaling("cannot compute mean of an empty matrix".to_string()))?;
        // constant features keep their offset but are not rescaled
        let std = data
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s == 0.0 { 1.0 } else { s });

        self.mean = Some(mean);
        self.std = Some(std);
        Ok(())
    }

    pub fn transform(&self, data: &Matrix) -> Result<Matrix> {
        self.params()?.transform(data)
    }

    pub fn fit_transform(&mut self, data: &Matrix) -> Result<Matrix> {
        self.fit(data)?;
        self.transform(data)
    }

    pub fn params(&self) -> Result<ScalerParams> {
        match (&self.mean, &self.std) {
            (Some(mean), Some(std)) => Ok(ScalerParams {
                kind: ScalerKind::Standard,
                center: mean.clone(),
                scale: std.clone(),
            }),
            _ => Err(Error::NotFitted("StandardScaler")),
        }
    }
}

/// Median-centered scaling by the interquartile range.
#[derive(Clone, Debug, Default)]
pub struct RobustScaler {
    center: Option<Vector>,
    scale: Option<Vector>,
}

impl RobustScaler {
    pub fn new() -> Self {
        Self { center: None, scale: None }
    }

    pub fn fit(&mut self, data: &Matrix) -> Result<()> {
        if data.nrows() == 0 {
            return Err(Error::Scaling("cannot fit RobustScaler on an empty matrix".to_string()));
        }

        let mut center = Vector::zeros(data.ncols());
        let mut scale = Vector::ones(data.ncols());
        for (j, column) in data.axis_iter(Axis(1)).enumerate() {
            let mut values = column.to_vec();
            let median = quantile(&mut values, 0.5)
                .ok_or_else(|| Error::Scaling(format!("feature {j} has no finite values")))?;
            let iqr = quantile(&mut values, 0.75).unwrap_or(median)
                - quantile(&mut values, 0.25).unwrap_or(median);
            center[j] = median;
            if iqr > 0.0 {
                scale[j] = iqr;
            }
        }

        self.center = Some(center);
        self.scale = Some(scale);
        Ok(())
    }

    pub fn transform(&self, data: &Matrix) -> Result<Matrix> {
        self.params()?.transform(data)
    }

    pub fn fit_transform(&mut self, data: &Matrix) -> Result<Matrix> {
        self.fit(data)?;
        self.transform(data)
    }

    pub fn params(&self) -> Result<ScalerParams> {
        match (&self.center, &self.scale) {
            (Some(center), Some(scale)) => Ok(ScalerParams {
                kind: ScalerKind::Robust,
                center: center.clone(),
                scale: scale.clone(),
            }),
            _ => Err(Error::NotFitted("RobustScaler")),
        }
    }
}

/// Standardize, falling back to robust scaling when the standard output is
/// not entirely finite.
pub fn scale_features(data: &Matrix) -> Result<(Matrix, ScalerParams)> {
    let mut standard = StandardScaler::new();
    match standard.fit_transform(data) {
        Ok(scaled) if all_finite(&scaled) => return Ok((scaled, standard.params()?)),
        Ok(_) => tracing::warn!("standard scaling produced non-finite values, using robust scaling"),
        Err(err) => tracing::warn!(error = %err, "standard scaling failed, using robust scaling"),
    }

    let mut robust = RobustScaler::new();
    let scaled = robust
        .fit_transform(data)
        .map_err(|err| Error::Scaling(format!("standard and robust scaling both failed: {err}")))?;
    if !all_finite(&scaled) {
        return Err(Error::Scaling(
            "standard and robust scaling both produced non-finite values".to_string(),
        ));
    }
    Ok((scaled, robust.params()?))
}

/// Median of each column's finite values.
pub fn column_medians(data: &Matrix) -> Result<Vector> {
    let mut medians = Vector::zeros(data.ncols());
    for (j, column) in data.axis_iter(Axis(1)).enumerate() {
        let mut values = column.to_vec();
        medians[j] = quantile(&mut values, 0.5)
            .ok_or_else(|| Error::Numerical(format!("feature {j} has no finite values to impute from")))?;
    }
    Ok(medians)
}

/// Overwrite NaN and infinite cells with the given per-column values.
/// Returns the number of cells replaced.
pub fn fill_non_finite(data: &mut Matrix, fill: &Vector) -> Result<usize> {
    if data.ncols() != fill.len() {
        return Err(Error::DimensionMismatch {
            expected: fill.len(),
            actual: data.ncols(),
        });
    }
    let mut replaced = 0;
    for (mut column, &value) in data.axis_iter_mut(Axis(1)).zip(fill.iter()) {
        for cell in column.iter_mut().filter(|v| !v.is_finite()) {
            *cell = value;
            replaced += 1;
        }
    }
    Ok(replaced)
}

/// Replace NaN and infinite cells with the median of each column's finite
/// values. Returns the medians and the number of cells replaced.
pub fn impute_median(data: &mut Matrix) -> Result<(Vector, usize)> {
    let medians = column_medians(data)?;
    let replaced = fill_non_finite(data, &medians)?;
    Ok((medians, replaced))
}

pub fn all_finite(data: &Matrix) -> bool {
    data.iter().all(|v| v.is_finite())
}

/// Linear-interpolated quantile of the finite values, `q` in `[0, 1]`.
///
/// Reorders `values`; non-finite entries are ignored.
pub fn quantile(values: &mut Vec<f64>, q: f64) -> Option<f64> {
    values.retain(|v| v.is_finite());
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let pos = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(values[lower] + (values[upper] - values[lower]) * frac)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(&mut values.to_vec(), 0.5)
}

/// True when the finite values hold fewer than two distinct numbers.
///
/// A column with a single observation, or none at all, has nothing to
/// cluster on once imputed.
pub fn is_constant(values: &[f64]) -> bool {
    let mut finite = values.iter().copied().filter(|v| v.is_finite());
    match finite.next() {
        Some(first) => finite.all(|v| v == first),
        None => true,
    }
}
