//! Density-based hotspot detection over accident coordinates.
//!
//! Distances are plain Euclidean distances in degrees of latitude/longitude,
//! so `eps = 0.05` is roughly a 5 km radius at mid latitudes.

use std::collections::{BTreeMap, VecDeque};

use rstar::primitives::GeomWithData;
use rstar::RTree;
use serde::Serialize;

use super::filter::{self, DatasetView};
use crate::error::ConfigError;

/// Label given to points that belong to no cluster.
pub const NOISE: i32 = -1;

/// A point stored in the R-tree, tagged with its position in the input slice.
type IndexedPoint = GeomWithData<[f64; 2], usize>;

// ---------------------------------------------------------------------------
// Points
// ---------------------------------------------------------------------------

/// An accident location with usable coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    /// Row index in the source dataset.
    pub row: usize,
    pub lat: f64,
    pub lng: f64,
    pub severity: Option<u8>,
}

impl GeoPoint {
    pub fn coords(&self) -> [f64; 2] {
        [self.lat, self.lng]
    }
}

/// Rows of the view whose coordinates are present and on the globe.
pub fn geo_points(view: &DatasetView<'_>) -> Vec<GeoPoint> {
    view.iter_indexed()
        .filter_map(|(row, a)| {
            let lat = a.start_lat.filter(|v| (-90.0..=90.0).contains(v))?;
            let lng = a.start_lng.filter(|v| (-180.0..=180.0).contains(v))?;
            Some(GeoPoint {
                row,
                lat,
                lng,
                severity: a.severity,
            })
        })
        .collect()
}

/// At most `n` located points drawn from `view` with a fixed seed.
///
/// Rows without usable coordinates are dropped before sampling, so the
/// sample size is not eaten up by unmappable rows.
pub fn sample_points(view: &DatasetView<'_>, n: usize, seed: u64) -> Vec<GeoPoint> {
    let located = geo_points(view);
    if located.len() <= n {
        return located;
    }
    let rows = located.iter().map(|p| p.row).collect();
    let located_view = DatasetView::from_indices(view.dataset(), rows);
    geo_points(&filter::sample(&located_view, n, seed))
}

// ---------------------------------------------------------------------------
// DBSCAN
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DbscanParams {
    /// Neighbourhood radius, in degrees.
    pub eps: f64,
    /// Points (including the point itself) needed within `eps` to be core.
    pub min_samples: usize,
}

impl Default for DbscanParams {
    fn default() -> Self {
        Self {
            eps: 0.05,
            min_samples: 50,
        }
    }
}

impl DbscanParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(ConfigError::InvalidEps(self.eps));
        }
        if self.min_samples < 1 {
            return Err(ConfigError::InvalidMinSamples);
        }
        Ok(())
    }
}

/// Cluster label per input point, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterAssignment {
    pub labels: Vec<i32>,
    pub n_clusters: usize,
}

impl ClusterAssignment {
    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == NOISE).count()
    }

    /// Indices of the points carrying `label`.
    pub fn members(&self, label: i32) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == label)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Density-based clustering of `[lat, lng]` points.
///
/// Border points join the first cluster that reaches them; with a fixed
/// input order and fixed parameters the result is fully deterministic.
pub fn dbscan(points: &[[f64; 2]], params: &DbscanParams) -> Result<ClusterAssignment, ConfigError> {
    params.validate()?;
    if let Some(index) = points
        .iter()
        .position(|p| !(p[0].is_finite() && p[1].is_finite()))
    {
        return Err(ConfigError::NonFinitePoint { index });
    }

    let tree: RTree<IndexedPoint> = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(i, p)| IndexedPoint::new(*p, i))
            .collect(),
    );
    let eps2 = params.eps * params.eps;
    let neighbours = |i: usize| -> Vec<usize> {
        let mut found: Vec<usize> = tree
            .locate_within_distance(points[i], eps2)
            .map(|p| p.data)
            .collect();
        found.sort_unstable();
        found
    };

    // None = not yet visited.
    let mut labels: Vec<Option<i32>> = vec![None; points.len()];
    let mut next_label = 0;

    for i in 0..points.len() {
        if labels[i].is_some() {
            continue;
        }
        let seeds = neighbours(i);
        if seeds.len() < params.min_samples {
            labels[i] = Some(NOISE);
            continue;
        }

        let cluster = next_label;
        next_label += 1;
        labels[i] = Some(cluster);

        let mut queue: VecDeque<usize> = seeds.into_iter().filter(|&j| j != i).collect();
        while let Some(j) = queue.pop_front() {
            match labels[j] {
                // Already known not to be core: becomes a border point.
                Some(NOISE) => labels[j] = Some(cluster),
                Some(_) => {}
                None => {
                    labels[j] = Some(cluster);
                    let reach = neighbours(j);
                    if reach.len() >= params.min_samples {
                        queue.extend(
                            reach
                                .into_iter()
                                .filter(|&k| matches!(labels[k], None | Some(NOISE))),
                        );
                    }
                }
            }
        }
    }

    let labels: Vec<i32> = labels.into_iter().map(|l| l.unwrap_or(NOISE)).collect();
    let assignment = ClusterAssignment {
        labels,
        n_clusters: next_label as usize,
    };
    log::debug!(
        "DBSCAN eps={} min_samples={}: {} points, {} clusters, {} noise",
        params.eps,
        params.min_samples,
        points.len(),
        assignment.n_clusters,
        assignment.noise_count()
    );
    Ok(assignment)
}

// ---------------------------------------------------------------------------
// Hotspots
// ---------------------------------------------------------------------------

/// Size and centre of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hotspot {
    pub label: i32,
    pub size: usize,
    pub centroid_lat: f64,
    pub centroid_lng: f64,
}

/// Summarise each cluster of `assignment`, largest first. Noise is left out.
pub fn hotspots(points: &[[f64; 2]], assignment: &ClusterAssignment) -> Vec<Hotspot> {
    let mut sums: BTreeMap<i32, (usize, f64, f64)> = BTreeMap::new();
    for (p, &label) in points.iter().zip(&assignment.labels) {
        if label == NOISE {
            continue;
        }
        let entry = sums.entry(label).or_insert((0, 0.0, 0.0));
        entry.0 += 1;
        entry.1 += p[0];
        entry.2 += p[1];
    }

    let mut spots: Vec<Hotspot> = sums
        .into_iter()
        .map(|(label, (size, lat, lng))| Hotspot {
            label,
            size,
            centroid_lat: lat / size as f64,
            centroid_lng: lng / size as f64,
        })
        .collect();
    spots.sort_by(|a, b| b.size.cmp(&a.size));
    spots
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::data::model::{Accident, AccidentDataset, Column};

    fn params(eps: f64, min_samples: usize) -> DbscanParams {
        DbscanParams { eps, min_samples }
    }

    /// Partition as a set of member sets, independent of label numbering.
    fn partition(a: &ClusterAssignment) -> BTreeSet<Vec<usize>> {
        (0..a.n_clusters as i32).map(|l| a.members(l)).collect()
    }

    #[test]
    fn test_three_close_points_and_one_outlier() {
        let points = [[40.0, -75.0], [40.001, -75.001], [40.002, -75.0], [50.0, -65.0]];
        let out = dbscan(&points, &params(0.01, 3)).unwrap();
        assert_eq!(out.n_clusters, 1);
        assert_ne!(out.labels[0], NOISE);
        assert_eq!(out.labels[0], out.labels[1]);
        assert_eq!(out.labels[1], out.labels[2]);
        assert_eq!(out.labels[3], NOISE);
    }

    #[test]
    fn test_fewer_points_than_min_samples_is_all_noise() {
        let points = [[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let out = dbscan(&points, &params(0.5, 4)).unwrap();
        assert_eq!(out.labels, vec![NOISE; 3]);
        assert_eq!(out.n_clusters, 0);

        let single = dbscan(&[[0.0, 0.0]], &params(0.5, 2)).unwrap();
        assert_eq!(single.labels, vec![NOISE]);
    }

    #[test]
    fn test_min_samples_one_makes_every_point_a_cluster() {
        let points = [[0.0, 0.0], [10.0, 10.0]];
        let out = dbscan(&points, &params(0.1, 1)).unwrap();
        assert_eq!(out.n_clusters, 2);
        assert_eq!(out.noise_count(), 0);
    }

    #[test]
    fn test_empty_input() {
        let out = dbscan(&[], &params(0.1, 3)).unwrap();
        assert!(out.labels.is_empty());
        assert_eq!(out.n_clusters, 0);
    }

    #[test]
    fn test_border_point_joins_cluster() {
        // Chain of core points plus one border point reachable only from the end.
        let points = [[0.0, 0.0], [0.0, 0.1], [0.0, 0.2], [0.0, 0.3], [0.0, 0.42]];
        let out = dbscan(&points, &params(0.15, 3)).unwrap();
        assert_eq!(out.n_clusters, 1);
        assert_eq!(out.noise_count(), 0);
    }

    #[test]
    fn test_two_separate_clusters_are_stable_across_runs() {
        let mut points = Vec::new();
        for i in 0..10 {
            let d = i as f64 * 0.001;
            points.push([34.0 + d, -118.0]);
            points.push([40.7, -74.0 + d]);
        }
        points.push([0.0, 0.0]);

        let first = dbscan(&points, &params(0.01, 5)).unwrap();
        let second = dbscan(&points, &params(0.01, 5)).unwrap();
        assert_eq!(first.n_clusters, 2);
        assert_eq!(partition(&first), partition(&second));
        assert_eq!(first.labels[20], NOISE);
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        let pts = [[0.0, 0.0]];
        assert_eq!(dbscan(&pts, &params(0.0, 3)), Err(ConfigError::InvalidEps(0.0)));
        assert_eq!(dbscan(&pts, &params(-1.0, 3)), Err(ConfigError::InvalidEps(-1.0)));
        assert!(matches!(dbscan(&pts, &params(f64::NAN, 3)), Err(ConfigError::InvalidEps(_))));
        assert_eq!(dbscan(&pts, &params(0.1, 0)), Err(ConfigError::InvalidMinSamples));
        assert_eq!(
            dbscan(&[[0.0, 0.0], [f64::INFINITY, 1.0]], &params(0.1, 1)),
            Err(ConfigError::NonFinitePoint { index: 1 })
        );
    }

    #[test]
    fn test_hotspots_sorted_by_size() {
        let points = [[0.0, 0.0], [0.0, 0.0], [5.0, 5.0], [5.0, 5.0], [5.0, 5.0], [9.0, 9.0]];
        let out = dbscan(&points, &params(0.1, 2)).unwrap();
        let spots = hotspots(&points, &out);
        assert_eq!(spots.len(), 2);
        assert_eq!(spots[0].size, 3);
        assert_eq!(spots[0].centroid_lat, 5.0);
        assert_eq!(spots[1].size, 2);
    }

    #[test]
    fn test_geo_points_drop_missing_and_out_of_range() {
        let coords = [
            (Some(34.0), Some(-118.0)),
            (None, Some(-118.0)),
            (Some(95.0), Some(10.0)),
            (Some(10.0), Some(-200.0)),
            (Some(-33.9), Some(151.2)),
        ];
        let accidents = coords
            .iter()
            .enumerate()
            .map(|(i, &(lat, lng))| Accident {
                id: i.to_string(),
                start_lat: lat,
                start_lng: lng,
                ..Default::default()
            })
            .collect();
        let ds = AccidentDataset::from_accidents(vec![Column::Id, Column::StartLat, Column::StartLng], accidents);
        let pts = geo_points(&DatasetView::full(&ds));
        let rows: Vec<usize> = pts.iter().map(|p| p.row).collect();
        assert_eq!(rows, vec![0, 4]);

        let one = sample_points(&DatasetView::full(&ds), 1, 42);
        assert_eq!(one.len(), 1);
        assert!(one[0].row == 0 || one[0].row == 4);
        assert_eq!(sample_points(&DatasetView::full(&ds), 10, 42).len(), 2);
    }
}
