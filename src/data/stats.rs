//! Descriptive statistics: correlation, per-column summaries, grouped
//! distributions and the dataset overview.

use std::collections::BTreeMap;

use serde::Serialize;

use super::filter::DatasetView;
use super::model::{CellValue, Column};
use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

/// Symmetric Pearson matrix; `None` marks an undefined coefficient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<Column>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: Column, b: Column) -> Option<f64> {
        let i = self.columns.iter().position(|&c| c == a)?;
        let j = self.columns.iter().position(|&c| c == b)?;
        self.values[i][j]
    }
}

/// Pearson correlation over pairwise-complete observations.
///
/// A row missing either value is left out of that cell only. The diagonal is
/// 1.0; other cells are `None` with fewer than two pairs or zero variance.
pub fn correlation_matrix(
    view: &DatasetView<'_>,
    columns: &[Column],
) -> Result<CorrelationMatrix, ConfigError> {
    if let Some(&bad) = columns.iter().find(|c| !c.is_numeric()) {
        return Err(ConfigError::NonNumericColumn(bad));
    }

    let data: Vec<Vec<Option<f64>>> = columns
        .iter()
        .map(|&col| view.iter().map(|a| a.number(col)).collect())
        .collect();

    let n = columns.len();
    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        values[i][i] = Some(1.0);
        for j in (i + 1)..n {
            let pairs = data[i]
                .iter()
                .zip(&data[j])
                .filter_map(|(x, y)| Some(((*x)?, (*y)?)));
            let r = pearson(pairs);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    Ok(CorrelationMatrix {
        columns: columns.to_vec(),
        values,
    })
}

fn pearson(pairs: impl Iterator<Item = (f64, f64)>) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = pairs.collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

// ---------------------------------------------------------------------------
// Numeric summary (describe)
// ---------------------------------------------------------------------------

/// Count, moments and quartiles of a set of values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; undefined for a single value.
    pub std_dev: Option<f64>,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl NumericSummary {
    /// `None` for an empty slice.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let std_dev = (count > 1).then(|| {
            let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        });

        Some(NumericSummary {
            count,
            mean,
            std_dev,
            min: sorted[0],
            q1: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q3: quantile(&sorted, 0.75),
            max: sorted[count - 1],
        })
    }
}

/// Linear-interpolated quantile of sorted, non-empty data.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Summary of one numeric column; `None` when it has no values in the view.
pub fn describe(view: &DatasetView<'_>, column: Column) -> Result<Option<NumericSummary>, ConfigError> {
    if !column.is_numeric() {
        return Err(ConfigError::NonNumericColumn(column));
    }
    let values: Vec<f64> = view.iter().filter_map(|a| a.number(column)).collect();
    Ok(NumericSummary::from_values(&values))
}

// ---------------------------------------------------------------------------
// Grouped distribution (categorical vs numeric)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: CellValue,
    pub summary: NumericSummary,
}

/// One numeric summary per category value, ordered by category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedDistribution {
    pub category: Column,
    pub numeric: Column,
    pub groups: Vec<GroupSummary>,
}

pub fn grouped_distribution(
    view: &DatasetView<'_>,
    category: Column,
    numeric: Column,
) -> Result<GroupedDistribution, ConfigError> {
    if !numeric.is_numeric() {
        return Err(ConfigError::NonNumericColumn(numeric));
    }

    let mut buckets: BTreeMap<CellValue, Vec<f64>> = BTreeMap::new();
    for a in view.iter() {
        if let (Some(key), Some(v)) = (a.value(category), a.number(numeric)) {
            buckets.entry(key).or_default().push(v);
        }
    }

    let groups = buckets
        .into_iter()
        .filter_map(|(key, values)| {
            NumericSummary::from_values(&values).map(|summary| GroupSummary { key, summary })
        })
        .collect();

    Ok(GroupedDistribution {
        category,
        numeric,
        groups,
    })
}

// ---------------------------------------------------------------------------
// Scatter (numeric vs numeric)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterSeries {
    pub x: Column,
    pub y: Column,
    pub points: Vec<[f64; 2]>,
}

/// Complete `(x, y)` pairs of two numeric columns, in view order.
pub fn scatter(view: &DatasetView<'_>, x: Column, y: Column) -> Result<ScatterSeries, ConfigError> {
    for col in [x, y] {
        if !col.is_numeric() {
            return Err(ConfigError::NonNumericColumn(col));
        }
    }
    let points = view
        .iter()
        .filter_map(|a| Some([a.number(x)?, a.number(y)?]))
        .collect();
    Ok(ScatterSeries { x, y, points })
}

// ---------------------------------------------------------------------------
// Dataset overview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMissing {
    pub column: Column,
    pub missing: usize,
    pub missing_pct: f64,
}

/// Shape and missing-value report of a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: usize,
    pub missing_cells: usize,
    /// Highest missing percentage first.
    pub per_column: Vec<ColumnMissing>,
}

pub fn summarize(view: &DatasetView<'_>) -> DatasetSummary {
    let rows = view.len();
    let columns = &view.dataset().columns;

    let mut per_column: Vec<ColumnMissing> = columns
        .iter()
        .map(|&column| {
            let missing = view.iter().filter(|a| a.value(column).is_none()).count();
            let missing_pct = if rows == 0 {
                0.0
            } else {
                missing as f64 * 100.0 / rows as f64
            };
            ColumnMissing {
                column,
                missing,
                missing_pct,
            }
        })
        .collect();
    per_column.sort_by(|a, b| b.missing_pct.total_cmp(&a.missing_pct));

    DatasetSummary {
        rows,
        columns: columns.len(),
        missing_cells: per_column.iter().map(|c| c.missing).sum(),
        per_column,
    }
}
