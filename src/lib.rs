//! Filter-and-aggregate pipeline for road-accident datasets.
//!
//! The dashboard binary is one caller; the pipeline itself has no UI
//! dependency and every reduction returns a plain serializable value.

pub mod config;
pub mod data;
pub mod error;

pub use error::{ConfigError, LoadError};

pub const APP_NAME: &str = "accident-lens";
