use std::path::PathBuf;

use thiserror::Error;

use crate::data::model::Column;

/// Failure to turn a source file into an [`AccidentDataset`](crate::data::model::AccidentDataset).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("parsing JSON {path}: {message}")]
    Json { path: PathBuf, message: String },

    #[error("reading parquet {path}: {message}")]
    Parquet { path: PathBuf, message: String },

    #[error("{path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: Column },

    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),
}

/// Invalid parameters for an aggregation or clustering call.
///
/// Raised before any work is done; there is never a partial result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("top-k size must be at least 1")]
    InvalidTopK,

    #[error("histogram bin count must be between 1 and {}", crate::data::aggregate::MAX_BINS)]
    InvalidBinCount,

    #[error("eps must be a positive finite number, got {0}")]
    InvalidEps(f64),

    #[error("min_samples must be at least 1")]
    InvalidMinSamples,

    #[error("column '{0}' is not numeric")]
    NonNumericColumn(Column),

    #[error("point {index} has a non-finite coordinate")]
    NonFinitePoint { index: usize },
}
