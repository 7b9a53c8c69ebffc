//! Counting reductions over a filtered view: frequency tables, histograms,
//! calendar time series and cross-tabulations.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use serde::Serialize;
use strum::{Display, EnumIter};

use super::filter::DatasetView;
use super::model::{CellValue, Column};
use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Frequency table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyEntry {
    pub value: CellValue,
    pub count: usize,
}

/// Most frequent values of one column, highest count first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyTable {
    pub column: Column,
    pub entries: Vec<FrequencyEntry>,
}

/// The `k` most frequent non-missing values of `column`.
///
/// Ties keep the order in which values were first seen.
pub fn top_k(view: &DatasetView<'_>, column: Column, k: usize) -> Result<FrequencyTable, ConfigError> {
    if k == 0 {
        return Err(ConfigError::InvalidTopK);
    }

    let mut counts: HashMap<CellValue, usize> = HashMap::new();
    let mut first_seen: Vec<CellValue> = Vec::new();
    for value in view.iter().filter_map(|a| a.value(column)) {
        match counts.entry(value) {
            Entry::Occupied(mut e) => *e.get_mut() += 1,
            Entry::Vacant(e) => {
                first_seen.push(e.key().clone());
                e.insert(1);
            }
        }
    }

    let mut entries: Vec<FrequencyEntry> = first_seen
        .into_iter()
        .map(|value| {
            let count = counts.get(&value).copied().unwrap_or_default();
            FrequencyEntry { value, count }
        })
        .collect();
    // Stable sort: equal counts stay in first-seen order.
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries.truncate(k);

    Ok(FrequencyTable { column, entries })
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

/// Half-open bucket `[lower, upper)`; the last bucket also includes `upper`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub column: Column,
    pub bins: Vec<HistogramBin>,
}

impl Histogram {
    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

/// Upper bound on histogram resolution.
pub const MAX_BINS: usize = 10_000;

/// Equal-width histogram over the non-missing values of a numeric column.
///
/// Reports no bins when the column has fewer than two distinct values.
pub fn histogram(view: &DatasetView<'_>, column: Column, n_bins: usize) -> Result<Histogram, ConfigError> {
    if n_bins == 0 || n_bins > MAX_BINS {
        return Err(ConfigError::InvalidBinCount);
    }
    if !column.is_numeric() {
        return Err(ConfigError::NonNumericColumn(column));
    }

    let values: Vec<f64> = view.iter().filter_map(|a| a.number(column)).collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if values.len() < 2 || min >= max {
        return Ok(Histogram {
            column,
            bins: Vec::new(),
        });
    }

    let width = (max - min) / n_bins as f64;
    let mut counts = vec![0usize; n_bins];
    for v in &values {
        let idx = (((v - min) / width) as usize).min(n_bins - 1);
        counts[idx] += 1;
    }

    let bins = counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: min + i as f64 * width,
            upper: if i + 1 == n_bins {
                max
            } else {
                min + (i + 1) as f64 * width
            },
            count,
        })
        .collect();

    Ok(Histogram { column, bins })
}

// ---------------------------------------------------------------------------
// Time series
// ---------------------------------------------------------------------------

/// Calendar bucket size for [`period_counts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize)]
pub enum Granularity {
    Year,
    Month,
    Day,
}

impl Granularity {
    /// First day of the period containing `t`.
    pub fn truncate(self, t: NaiveDateTime) -> NaiveDate {
        let d = t.date();
        match self {
            Granularity::Year => d.with_ordinal(1).unwrap_or(d),
            Granularity::Month => d.with_day(1).unwrap_or(d),
            Granularity::Day => d,
        }
    }

    /// First day of the following period.
    pub fn next(self, period: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Year => NaiveDate::from_ymd_opt(period.year() + 1, 1, 1),
            Granularity::Month => period.checked_add_months(Months::new(1)),
            Granularity::Day => period.succ_opt(),
        }
    }

    pub fn label(self, period: NaiveDate) -> String {
        let fmt = match self {
            Granularity::Year => "%Y",
            Granularity::Month => "%Y-%m",
            Granularity::Day => "%Y-%m-%d",
        };
        period.format(fmt).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodCount {
    /// First day of the period.
    pub period: NaiveDate,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub granularity: Granularity,
    pub points: Vec<PeriodCount>,
}

/// Accidents per calendar period, oldest first.
///
/// Every period between the first and last observed start time is present;
/// empty periods are reported with a zero count.
pub fn period_counts(view: &DatasetView<'_>, granularity: Granularity) -> TimeSeries {
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for t in view.iter().filter_map(|a| a.start_time) {
        *counts.entry(granularity.truncate(t)).or_default() += 1;
    }

    let mut points = Vec::new();
    if let (Some((&first, _)), Some((&last, _))) = (counts.first_key_value(), counts.last_key_value()) {
        let mut cursor = Some(first);
        while let Some(period) = cursor.filter(|p| *p <= last) {
            points.push(PeriodCount {
                period,
                label: granularity.label(period),
                count: counts.get(&period).copied().unwrap_or(0),
            });
            cursor = granularity.next(period);
        }
    }

    TimeSeries { granularity, points }
}

// ---------------------------------------------------------------------------
// Cross-tabulation
// ---------------------------------------------------------------------------

/// Co-occurrence counts of two columns. `counts[r][c]` pairs
/// `row_values[r]` with `col_values[c]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossTab {
    pub row_column: Column,
    pub col_column: Column,
    pub row_values: Vec<CellValue>,
    pub col_values: Vec<CellValue>,
    pub counts: Vec<Vec<usize>>,
}

impl CrossTab {
    pub fn count(&self, row: &CellValue, col: &CellValue) -> usize {
        let r = self.row_values.binary_search(row);
        let c = self.col_values.binary_search(col);
        match (r, c) {
            (Ok(r), Ok(c)) => self.counts[r][c],
            _ => 0,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().flatten().copied().max().unwrap_or(0)
    }
}

/// Count co-occurring value pairs; rows missing either value are skipped.
pub fn cross_tab(view: &DatasetView<'_>, row_column: Column, col_column: Column) -> CrossTab {
    let mut pairs: BTreeMap<(CellValue, CellValue), usize> = BTreeMap::new();
    let mut rows = BTreeSet::new();
    let mut cols = BTreeSet::new();

    for a in view.iter() {
        let (Some(r), Some(c)) = (a.value(row_column), a.value(col_column)) else {
            continue;
        };
        rows.insert(r.clone());
        cols.insert(c.clone());
        *pairs.entry((r, c)).or_default() += 1;
    }

    let row_values: Vec<CellValue> = rows.into_iter().collect();
    let col_values: Vec<CellValue> = cols.into_iter().collect();
    let counts = row_values
        .iter()
        .map(|r| {
            col_values
                .iter()
                .map(|c| pairs.get(&(r.clone(), c.clone())).copied().unwrap_or(0))
                .collect()
        })
        .collect();

    CrossTab {
        row_column,
        col_column,
        row_values,
        col_values,
        counts,
    }
}
