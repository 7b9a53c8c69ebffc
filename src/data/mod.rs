/// Data layer: core types, loading, filtering and reductions.
///
/// Architecture:
/// ```text
///  .csv / .parquet / .json
///        │
///        ▼
///   ┌──────────┐      ┌───────┐
///   │  loader   │ ◄─── │ cache │  one AccidentDataset per source path
///   └──────────┘      └───────┘
///        │
///        ▼
///   ┌─────────────────┐
///   │ AccidentDataset  │  Vec<Accident>, distinct values per column
///   └─────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  FilterSpec → DatasetView (row indices)
///   └──────────┘
///        │
///        ├──────────────┬───────────────┐
///        ▼              ▼               ▼
///   ┌───────────┐  ┌─────────┐  ┌───────────┐
///   │ aggregate  │  │  stats   │  │  spatial   │  DBSCAN hotspots
///   └───────────┘  └─────────┘  └───────────┘
/// ```

pub mod aggregate;
pub mod cache;
pub mod filter;
pub mod loader;
pub mod model;
pub mod spatial;
pub mod stats;
