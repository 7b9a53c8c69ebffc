use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use strum::{Display, EnumIter};

use accident_lens::config::DashboardConfig;
use accident_lens::data::aggregate::{
    self, CrossTab, FrequencyTable, Granularity, Histogram, TimeSeries,
};
use accident_lens::data::cache::DatasetCache;
use accident_lens::data::filter::{self, DatasetView, FilterSpec};
use accident_lens::data::model::{AccidentDataset, CellValue, Column};
use accident_lens::data::spatial::{self, ClusterAssignment, DbscanParams, GeoPoint, Hotspot};
use accident_lens::data::stats::{
    self, CorrelationMatrix, DatasetSummary, GroupedDistribution, NumericSummary, ScatterSeries,
};
use accident_lens::ConfigError;

use crate::color::ColorMap;

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum Page {
    #[strum(serialize = "Dataset Information")]
    DatasetInfo,
    #[strum(serialize = "Univariate Analysis")]
    Univariate,
    #[strum(serialize = "Bivariate Analysis")]
    Bivariate,
    #[strum(serialize = "Time Series Analysis")]
    TimeSeries,
    #[strum(serialize = "Geospatial Analysis")]
    Geospatial,
    #[strum(serialize = "Accident Hotspots")]
    Hotspots,
    #[strum(serialize = "Correlation Analysis")]
    Correlation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum BivariateMode {
    #[strum(serialize = "Numeric vs Numeric")]
    NumericNumeric,
    #[strum(serialize = "Categorical vs Numeric")]
    CategoricalNumeric,
    #[strum(serialize = "Categorical vs Categorical")]
    CategoricalCategorical,
}

impl BivariateMode {
    /// Whether `column` may sit on the x / y axis in this mode.
    pub fn accepts(self, column: Column, x_axis: bool) -> bool {
        match (self, x_axis) {
            (BivariateMode::NumericNumeric, _) | (BivariateMode::CategoricalNumeric, false) => {
                column.is_numeric()
            }
            (BivariateMode::CategoricalNumeric, true) | (BivariateMode::CategoricalCategorical, _) => {
                column.is_categorical()
            }
        }
    }

    fn defaults(self) -> (Column, Column) {
        match self {
            BivariateMode::NumericNumeric => (Column::Temperature, Column::Visibility),
            BivariateMode::CategoricalNumeric => (Column::Severity, Column::Visibility),
            BivariateMode::CategoricalCategorical => (Column::Severity, Column::SunriseSunset),
        }
    }
}

/// Widget selections that drive the current page's computation.
#[derive(Debug, Clone)]
pub struct Selections {
    pub univariate: Column,
    pub bivariate_mode: BivariateMode,
    pub x: Column,
    pub y: Column,
    pub granularity: Granularity,
    pub hotspot: DbscanParams,
}

// ---------------------------------------------------------------------------
// Computed page content
// ---------------------------------------------------------------------------

/// Everything a page needs to draw, recomputed whenever filters or
/// selections change.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageResult {
    Info {
        summary: DatasetSummary,
        numeric: Vec<(Column, NumericSummary)>,
    },
    Frequency(FrequencyTable),
    Histogram {
        histogram: Histogram,
        summary: Option<NumericSummary>,
    },
    Scatter(ScatterSeries),
    Grouped(GroupedDistribution),
    CrossTab(CrossTab),
    TimeSeries(TimeSeries),
    Map {
        points: Vec<GeoPoint>,
    },
    Hotspots {
        points: Vec<[f64; 2]>,
        assignment: ClusterAssignment,
        hotspots: Vec<Hotspot>,
    },
    Correlation(CorrelationMatrix),
}

fn compute_page(
    view: &DatasetView<'_>,
    page: Page,
    sel: &Selections,
    config: &DashboardConfig,
) -> Result<PageResult, ConfigError> {
    let dataset = view.dataset();
    let present_numeric = || Column::numeric().filter(move |c| dataset.has_column(*c));

    let result = match page {
        Page::DatasetInfo => PageResult::Info {
            summary: stats::summarize(view),
            numeric: present_numeric()
                .filter_map(|c| Some((c, stats::describe(view, c).ok()??)))
                .collect(),
        },
        Page::Univariate if sel.univariate.is_categorical() => {
            PageResult::Frequency(aggregate::top_k(view, sel.univariate, config.top_k)?)
        }
        Page::Univariate => PageResult::Histogram {
            histogram: aggregate::histogram(view, sel.univariate, config.histogram_bins)?,
            summary: stats::describe(view, sel.univariate)?,
        },
        Page::Bivariate => {
            let sampled = filter::sample(view, config.scatter_sample_size, config.sample_seed);
            match sel.bivariate_mode {
                BivariateMode::NumericNumeric => {
                    PageResult::Scatter(stats::scatter(&sampled, sel.x, sel.y)?)
                }
                BivariateMode::CategoricalNumeric => {
                    PageResult::Grouped(stats::grouped_distribution(view, sel.x, sel.y)?)
                }
                BivariateMode::CategoricalCategorical => {
                    PageResult::CrossTab(aggregate::cross_tab(view, sel.x, sel.y))
                }
            }
        }
        Page::TimeSeries => PageResult::TimeSeries(aggregate::period_counts(view, sel.granularity)),
        Page::Geospatial => PageResult::Map {
            points: spatial::sample_points(view, config.map_sample_size, config.sample_seed),
        },
        Page::Hotspots => {
            let points: Vec<[f64; 2]> =
                spatial::sample_points(view, config.hotspot.sample_size, config.sample_seed)
                    .iter()
                    .map(GeoPoint::coords)
                    .collect();
            let assignment = spatial::dbscan(&points, &sel.hotspot)?;
            let hotspots = spatial::hotspots(&points, &assignment);
            PageResult::Hotspots {
                points,
                assignment,
                hotspots,
            }
        }
        Page::Correlation => {
            let columns: Vec<Column> = present_numeric().collect();
            PageResult::Correlation(stats::correlation_matrix(view, &columns)?)
        }
    };
    Ok(result)
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: DashboardConfig,

    /// Datasets already read this session, keyed by path.
    pub cache: DatasetCache,

    /// Loaded dataset (None until user loads a file).
    pub dataset: Option<Arc<AccidentDataset>>,

    /// Per-column filter selections.
    pub filters: FilterSpec,

    /// Indices of accidents passing the current filters (cached).
    pub visible_indices: Vec<usize>,

    pub page: Page,
    pub selections: Selections,

    /// Content of the current page; rebuilt when `dirty`.
    pub result: Option<PageResult>,
    dirty: bool,

    /// Severity colours for the map.
    pub severity_colors: Option<ColorMap>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        let (x, y) = BivariateMode::NumericNumeric.defaults();
        let selections = Selections {
            univariate: Column::Severity,
            bivariate_mode: BivariateMode::NumericNumeric,
            x,
            y,
            granularity: Granularity::Month,
            hotspot: config.hotspot.params(),
        };
        Self {
            config,
            cache: DatasetCache::new(),
            dataset: None,
            filters: FilterSpec::new(),
            visible_indices: Vec::new(),
            page: Page::DatasetInfo,
            selections,
            result: None,
            dirty: false,
            severity_colors: None,
            status_message: None,
        }
    }

    /// Load (or fetch from the cache) and show the dataset at `path`.
    pub fn open(&mut self, path: &Path) {
        match self.cache.get_or_load(path) {
            Ok(dataset) => self.set_dataset(dataset),
            Err(e) => {
                log::error!("Failed to load file: {e}");
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// Read the current dataset's source again, bypassing the cache.
    pub fn reload(&mut self) {
        let Some(path) = self.dataset.as_ref().and_then(|ds| ds.source.clone()) else {
            return;
        };
        self.cache.invalidate(&path);
        self.open(&path);
    }

    /// Ingest a newly loaded dataset, reset filters and colours.
    pub fn set_dataset(&mut self, dataset: Arc<AccidentDataset>) {
        self.filters = FilterSpec::new();
        self.visible_indices = (0..dataset.len()).collect();
        self.severity_colors = Some(ColorMap::for_severity(&dataset));

        self.dataset = Some(dataset);
        self.status_message = None;
        self.dirty = true;
    }

    /// The currently visible rows.
    pub fn view(&self) -> Option<DatasetView<'_>> {
        self.dataset
            .as_deref()
            .map(|ds| DatasetView::from_indices(ds, self.visible_indices.clone()))
    }

    /// Columns of the loaded dataset matching `pred`, in schema order.
    pub fn columns_where(&self, pred: impl Fn(Column) -> bool) -> Vec<Column> {
        self.dataset
            .as_deref()
            .map(|ds| ds.columns.iter().copied().filter(|c| pred(*c)).collect())
            .unwrap_or_default()
    }

    /// Recompute `visible_indices` after filter change.
    pub fn refilter(&mut self) {
        if let Some(ds) = self.dataset.as_deref() {
            let visible = filter::apply(&DatasetView::full(ds), &self.filters);
            self.visible_indices = visible.indices().to_vec();
        }
        self.dirty = true;
    }

    /// Toggle a single value in a column's filter.
    pub fn toggle_filter_value(&mut self, column: Column, value: &CellValue) {
        self.filters.toggle(column, value);
        self.refilter();
    }

    /// Drop every constraint on a column.
    pub fn clear_filter(&mut self, column: Column) {
        self.filters.clear_column(column);
        self.refilter();
    }

    pub fn set_page(&mut self, page: Page) {
        if self.page != page {
            self.page = page;
            self.dirty = true;
        }
    }

    pub fn set_bivariate_mode(&mut self, mode: BivariateMode) {
        let (x, y) = mode.defaults();
        self.selections.bivariate_mode = mode;
        self.selections.x = x;
        self.selections.y = y;
        self.dirty = true;
    }

    /// Call after editing `selections` directly.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Rebuild the page result if anything changed since the last frame.
    pub fn refresh(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;

        let outcome = self
            .view()
            .map(|view| compute_page(&view, self.page, &self.selections, &self.config));
        match outcome {
            None => self.result = None,
            Some(Ok(result)) => {
                self.result = Some(result);
                self.status_message = None;
            }
            Some(Err(e)) => {
                log::warn!("Cannot compute {}: {e}", self.page);
                self.status_message = Some(format!("Error: {e}"));
                self.result = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accident_lens::data::model::Accident;

    fn state_with(rows: Vec<Accident>) -> AppState {
        let ds = AccidentDataset::from_accidents(
            vec![Column::Id, Column::Severity, Column::State, Column::StartLat, Column::StartLng],
            rows,
        );
        let mut state = AppState::new(DashboardConfig::default());
        state.set_dataset(Arc::new(ds));
        state
    }

    fn row(id: &str, state: &str, severity: u8) -> Accident {
        Accident {
            id: id.into(),
            state: Some(state.into()),
            severity: Some(severity),
            start_lat: Some(34.0),
            start_lng: Some(-118.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_filter_toggle_updates_visible_rows() {
        let mut state = state_with(vec![row("1", "CA", 2), row("2", "OH", 3), row("3", "CA", 4)]);
        state.toggle_filter_value(Column::State, &CellValue::from("CA"));
        assert_eq!(state.visible_indices, vec![0, 2]);
        state.clear_filter(Column::State);
        assert_eq!(state.visible_indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_univariate_page_picks_chart_by_column_kind() {
        let mut state = state_with(vec![row("1", "CA", 2), row("2", "OH", 2)]);
        state.set_page(Page::Univariate);
        state.refresh();
        assert!(matches!(state.result, Some(PageResult::Frequency(_))));

        state.selections.univariate = Column::StartLat;
        state.mark_dirty();
        state.refresh();
        assert!(matches!(state.result, Some(PageResult::Histogram { .. })));
    }

    #[test]
    fn test_bad_hotspot_params_surface_as_status() {
        let mut state = state_with(vec![row("1", "CA", 2)]);
        state.selections.hotspot.eps = 0.0;
        state.set_page(Page::Hotspots);
        state.refresh();
        assert!(state.result.is_none());
        assert!(state.status_message.as_deref().unwrap_or("").contains("eps"));
    }

    #[test]
    fn test_failed_open_keeps_current_dataset() {
        let mut state = state_with(vec![row("1", "CA", 2), row("2", "OH", 3)]);
        state.open(Path::new("no/such/accidents.csv"));
        assert_eq!(state.dataset.as_ref().map(|ds| ds.len()), Some(2));
        assert!(state.status_message.as_deref().unwrap_or("").starts_with("Error:"));
        assert!(state.cache.is_empty());
    }

    #[test]
    fn test_bivariate_mode_resets_axes() {
        let mut state = state_with(vec![row("1", "CA", 2)]);
        state.set_bivariate_mode(BivariateMode::CategoricalCategorical);
        let mode = state.selections.bivariate_mode;
        assert!(mode.accepts(state.selections.x, true));
        assert!(mode.accepts(state.selections.y, false));
    }
}
