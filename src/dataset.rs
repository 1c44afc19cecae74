use crate::{Error, Matrix, Result};
use serde::{Deserialize, Serialize};

/// Name of the derived engagement column.
pub const ENGAGEMENT_RATE: &str = "Engagement_Rate";

/// Source columns of the engagement rate, numerator first, `Views` last.
pub const ENGAGEMENT_SOURCES: [&str; 4] = ["Likes", "Comments", "Shares", "Views"];

/// One named column of a [`Table`].
///
/// Numeric cells are missing when `None` or NaN; infinite values count as
/// present but non-finite.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(values) => values.len(),
            Column::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Numeric(_))
    }

    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match self {
            Column::Numeric(values) => Some(values),
            Column::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&[Option<String>]> {
        match self {
            Column::Text(values) => Some(values),
            Column::Numeric(_) => None,
        }
    }

    pub fn missing_count(&self) -> usize {
        match self {
            Column::Numeric(values) => values.iter().filter(|v| is_missing(**v)).count(),
            Column::Text(values) => values.iter().filter(|v| v.is_none()).count(),
        }
    }
}

fn is_missing(value: Option<f64>) -> bool {
    value.is_none_or(f64::is_nan)
}

impl From<Vec<f64>> for Column {
    fn from(values: Vec<f64>) -> Self {
        Column::Numeric(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<f64>>> for Column {
    fn from(values: Vec<Option<f64>>) -> Self {
        Column::Numeric(values)
    }
}

impl From<Vec<&str>> for Column {
    fn from(values: Vec<&str>) -> Self {
        Column::Text(values.into_iter().map(|v| Some(v.to_string())).collect())
    }
}

impl From<Vec<Option<&str>>> for Column {
    fn from(values: Vec<Option<&str>>) -> Self {
        Column::Text(values.into_iter().map(|v| v.map(str::to_string)).collect())
    }
}

impl From<Vec<String>> for Column {
    fn from(values: Vec<String>) -> Self {
        Column::Text(values.into_iter().map(Some).collect())
    }
}

/// Column-oriented table of content records.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| &self.columns[idx])
    }

    pub fn push_column(&mut self, name: impl Into<String>, column: impl Into<Column>) -> Result<()> {
        let name = name.into();
        let column = column.into();

        if self.contains(&name) {
            return Err(Error::InvalidTable(format!("duplicate column '{name}'")));
        }
        if !self.columns.is_empty() && column.len() != self.n_rows() {
            return Err(Error::InvalidTable(format!(
                "column '{}' has {} rows, table has {}",
                name,
                column.len(),
                self.n_rows()
            )));
        }

        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    pub fn with_column(mut self, name: impl Into<String>, column: impl Into<Column>) -> Result<Self> {
        self.push_column(name, column)?;
        Ok(self)
    }

    /// Names of text columns, in table order.
    pub fn categorical_columns(&self) -> Vec<&str> {
        self.names
            .iter()
            .zip(&self.columns)
            .filter(|(_, c)| !c.is_numeric())
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn numeric_columns(&self) -> Vec<&str> {
        self.names
            .iter()
            .zip(&self.columns)
            .filter(|(_, c)| c.is_numeric())
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn numeric(&self, name: &str) -> Result<&[Option<f64>]> {
        let column = self
            .column(name)
            .ok_or_else(|| Error::InvalidTable(format!("column '{name}' not found")))?;
        column
            .as_numeric()
            .ok_or_else(|| Error::InvalidTable(format!("column '{name}' is not numeric")))
    }

    /// Selected numeric columns as an `n x d` matrix, missing cells as NaN.
    pub fn feature_matrix<S: AsRef<str>>(&self, features: &[S]) -> Result<Matrix> {
        let mut matrix = Matrix::zeros((self.n_rows(), features.len()));
        for (j, feature) in features.iter().enumerate() {
            let values = self.numeric(feature.as_ref())?;
            for (i, value) in values.iter().enumerate() {
                matrix[[i, j]] = value.unwrap_or(f64::NAN);
            }
        }
        Ok(matrix)
    }

    /// Add `Engagement_Rate = (Likes + Comments + Shares) / max(Views, 1)`.
    ///
    /// Leaves the table unchanged when the column already exists or a
    /// source column is absent.
    pub fn with_engagement_rate(mut self) -> Result<Self> {
        if self.contains(ENGAGEMENT_RATE)
            || !ENGAGEMENT_SOURCES.iter().all(|name| self.contains(name))
        {
            return Ok(self);
        }

        let [likes, comments, shares, views] = ENGAGEMENT_SOURCES.map(|name| self.numeric(name));
        let (likes, comments, shares, views) = (likes?, comments?, shares?, views?);

        let rate: Vec<Option<f64>> = (0..self.n_rows())
            .map(|i| {
                let interactions = likes[i]? + comments[i]? + shares[i]?;
                Some(interactions / views[i]?.max(1.0))
            })
            .collect();

        tracing::debug!(rows = rate.len(), "derived engagement rate column");
        self.push_column(ENGAGEMENT_RATE, Column::Numeric(rate))?;
        Ok(self)
    }
}

/// Bin a numeric column into equal-width, right-closed intervals.
///
/// One bin per label; missing cells stay missing.
pub fn discretize(values: &[Option<f64>], labels: &[&str]) -> Result<Column> {
    if labels.is_empty() {
        return Err(Error::InvalidParameter("at least one bin label required".to_string()));
    }

    let finite: Vec<f64> = values.iter().flatten().copied().filter(|v| v.is_finite()).collect();
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let n_bins = labels.len();
    let width = (max - min) / n_bins as f64;

    let binned = values
        .iter()
        .map(|value| {
            let v = value.filter(|v| v.is_finite())?;
            let idx = if width > 0.0 {
                ((v - min) / width).ceil() as usize
            } else {
                n_bins / 2 + 1
            };
            Some(labels[idx.clamp(1, n_bins) - 1].to_string())
        })
        .collect();

    Ok(Column::Text(binned))
}
