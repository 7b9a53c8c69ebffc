use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::model::{Accident, AccidentDataset, CellValue, Column};

// ---------------------------------------------------------------------------
// Filter predicate: which values are accepted per column
// ---------------------------------------------------------------------------

/// Per-column selection state: maps column → set of accepted values.
/// If a column is absent or its set is empty, it imposes no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    accepted: BTreeMap<Column, BTreeSet<CellValue>>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: accept `values` for `column` (replacing any previous set).
    pub fn with<I, V>(mut self, column: Column, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<CellValue>,
    {
        self.accepted
            .insert(column, values.into_iter().map(Into::into).collect());
        self
    }

    /// Add `value` to the column's accepted set, or remove it if already there.
    pub fn toggle(&mut self, column: Column, value: &CellValue) {
        let selected = self.accepted.entry(column).or_default();
        if !selected.remove(value) {
            selected.insert(value.clone());
        }
    }

    pub fn clear_column(&mut self, column: Column) {
        self.accepted.remove(&column);
    }

    pub fn is_selected(&self, column: Column, value: &CellValue) -> bool {
        self.accepted
            .get(&column)
            .is_some_and(|set| set.contains(value))
    }

    pub fn selected(&self, column: Column) -> Option<&BTreeSet<CellValue>> {
        self.accepted.get(&column).filter(|set| !set.is_empty())
    }

    /// Columns with a non-empty accepted set.
    pub fn active_columns(&self) -> impl Iterator<Item = (Column, &BTreeSet<CellValue>)> {
        self.accepted
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(col, set)| (*col, set))
    }

    /// True when no column constrains anything.
    pub fn is_empty(&self) -> bool {
        self.active_columns().next().is_none()
    }

    /// Whether a single accident passes every active predicate.
    ///
    /// A missing value in a constrained column fails that predicate.
    pub fn matches(&self, accident: &Accident) -> bool {
        self.active_columns().all(|(col, accepted)| {
            accident
                .value(col)
                .is_some_and(|value| accepted.contains(&value))
        })
    }
}

// ---------------------------------------------------------------------------
// DatasetView – a filtered window onto the loaded rows
// ---------------------------------------------------------------------------

/// Ordered row indices into a borrowed dataset. Never copies accidents.
#[derive(Debug, Clone)]
pub struct DatasetView<'a> {
    dataset: &'a AccidentDataset,
    indices: Vec<usize>,
}

impl<'a> DatasetView<'a> {
    /// Every row, in load order.
    pub fn full(dataset: &'a AccidentDataset) -> Self {
        Self {
            dataset,
            indices: (0..dataset.len()).collect(),
        }
    }

    /// A view over explicit row indices (must be in range and ascending).
    pub fn from_indices(dataset: &'a AccidentDataset, indices: Vec<usize>) -> Self {
        debug_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(indices.last().map_or(true, |&i| i < dataset.len()));
        Self { dataset, indices }
    }

    pub fn dataset(&self) -> &'a AccidentDataset {
        self.dataset
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Iterate the visible accidents in order.
    pub fn iter(&self) -> impl Iterator<Item = &'a Accident> + '_ {
        self.indices.iter().map(|&i| &self.dataset.accidents[i])
    }

    /// Iterate `(row index, accident)` pairs in order.
    pub fn iter_indexed(&self) -> impl Iterator<Item = (usize, &'a Accident)> + '_ {
        self.indices.iter().map(|&i| (i, &self.dataset.accidents[i]))
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Keep only the rows of `view` that pass every active predicate in `spec`.
///
/// Relative order is preserved; an empty spec returns the same rows.
pub fn apply<'a>(view: &DatasetView<'a>, spec: &FilterSpec) -> DatasetView<'a> {
    if spec.is_empty() {
        return view.clone();
    }
    let indices: Vec<usize> = view
        .iter_indexed()
        .filter(|(_, accident)| spec.matches(accident))
        .map(|(i, _)| i)
        .collect();
    log::debug!(
        "Filter over {:?} kept {} of {} rows",
        spec.active_columns().map(|(c, _)| c).collect::<Vec<_>>(),
        indices.len(),
        view.len()
    );
    DatasetView {
        dataset: view.dataset,
        indices,
    }
}

/// Seeded uniform subsample of at most `n` rows, keeping relative order.
///
/// Used by callers to bound the cost of scatter plots and clustering.
pub fn sample<'a>(view: &DatasetView<'a>, n: usize, seed: u64) -> DatasetView<'a> {
    if n >= view.len() {
        return view.clone();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, view.len(), n).into_vec();
    picked.sort_unstable();
    DatasetView {
        dataset: view.dataset,
        indices: picked.into_iter().map(|i| view.indices[i]).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> AccidentDataset {
        let states = ["CA", "OH", "CA", "TX", "FL", "CA", "OH", "NY", "TX", "WA"];
        let accidents = states
            .iter()
            .enumerate()
            .map(|(i, st)| Accident {
                id: format!("A-{i}"),
                state: Some(st.to_string()),
                severity: if i == 9 { None } else { Some((i % 4 + 1) as u8) },
                ..Default::default()
            })
            .collect();
        AccidentDataset::from_accidents(vec![Column::Id, Column::State, Column::Severity], accidents)
    }

    fn ids(view: &DatasetView<'_>) -> Vec<String> {
        view.iter().map(|a| a.id.clone()).collect()
    }

    #[test]
    fn test_empty_spec_is_identity() {
        let ds = fixture();
        let full = DatasetView::full(&ds);
        let out = apply(&full, &FilterSpec::new());
        assert_eq!(out.indices(), full.indices());
    }

    #[test]
    fn test_state_filter_keeps_order() {
        let ds = fixture();
        let spec = FilterSpec::new().with(Column::State, ["CA"]);
        let out = apply(&DatasetView::full(&ds), &spec);
        assert_eq!(ids(&out), vec!["A-0", "A-2", "A-5"]);
    }

    #[test]
    fn test_missing_value_fails_constrained_column() {
        let ds = fixture();
        let spec = FilterSpec::new().with(Column::Severity, [2_i64]);
        let out = apply(&DatasetView::full(&ds), &spec);
        // Severity for i=1 and i=5 is 2; i=9 is missing and must not sneak in.
        assert_eq!(ids(&out), vec!["A-1", "A-5"]);
    }

    #[test]
    fn test_unknown_value_yields_empty_view() {
        let ds = fixture();
        let spec = FilterSpec::new().with(Column::State, ["ZZ"]);
        assert!(apply(&DatasetView::full(&ds), &spec).is_empty());
    }

    #[test]
    fn test_empty_set_imposes_no_constraint() {
        let ds = fixture();
        let spec = FilterSpec::new().with(Column::State, Vec::<CellValue>::new());
        assert!(spec.is_empty());
        assert_eq!(apply(&DatasetView::full(&ds), &spec).len(), ds.len());
    }

    #[test]
    fn test_toggle_adds_then_removes() {
        let mut spec = FilterSpec::new();
        let ca = CellValue::from("CA");
        spec.toggle(Column::State, &ca);
        assert!(spec.is_selected(Column::State, &ca));
        spec.toggle(Column::State, &ca);
        assert!(!spec.is_selected(Column::State, &ca));
        assert!(spec.is_empty());
    }

    #[test]
    fn test_conjunction_across_columns() {
        let ds = fixture();
        let spec = FilterSpec::new()
            .with(Column::State, ["CA", "OH"])
            .with(Column::Severity, [1_i64, 3]);
        let out = apply(&DatasetView::full(&ds), &spec);
        // CA/OH rows: 0(sev1) 1(sev2) 2(sev3) 5(sev2) 6(sev3)
        assert_eq!(ids(&out), vec!["A-0", "A-2", "A-6"]);
    }

    #[test]
    fn test_sample_is_seeded_ordered_subset() {
        let ds = fixture();
        let full = DatasetView::full(&ds);
        let a = sample(&full, 4, 42);
        let b = sample(&full, 4, 42);
        assert_eq!(a.len(), 4);
        assert_eq!(a.indices(), b.indices());
        assert!(a.indices().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_sample_larger_than_view_returns_view() {
        let ds = fixture();
        let ca = apply(&DatasetView::full(&ds), &FilterSpec::new().with(Column::State, ["CA"]));
        assert_eq!(sample(&ca, 100, 7).indices(), ca.indices());
    }
}
