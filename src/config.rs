use std::path::{Path, PathBuf};

use anyhow::Context;
use directories::ProjectDirs;
use serde::Deserialize;

use crate::data::spatial::DbscanParams;

/// Dashboard configuration loaded from a TOML config file.
/// Every field has a default and the file itself is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Dataset opened at start-up when no path is given on the command line.
    pub data_path: Option<PathBuf>,
    /// Rows shown in frequency bar charts.
    pub top_k: usize,
    pub histogram_bins: usize,
    /// Points drawn on the accident map.
    pub map_sample_size: usize,
    /// Points drawn in numeric-vs-numeric scatter plots.
    pub scatter_sample_size: usize,
    /// Seed shared by every subsample so redraws are stable.
    pub sample_seed: u64,
    pub hotspot: HotspotConfig,
}

/// Hotspot (DBSCAN) settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HotspotConfig {
    /// Neighbourhood radius in degrees.
    pub eps: f64,
    pub min_samples: usize,
    /// Points clustered per run; the filtered view is subsampled to this.
    pub sample_size: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            top_k: 20,
            histogram_bins: 50,
            map_sample_size: 50_000,
            scatter_sample_size: 50_000,
            sample_seed: 42,
            hotspot: HotspotConfig::default(),
        }
    }
}

impl Default for HotspotConfig {
    fn default() -> Self {
        let params = DbscanParams::default();
        Self {
            eps: params.eps,
            min_samples: params.min_samples,
            sample_size: 50_000,
        }
    }
}

impl HotspotConfig {
    pub fn params(&self) -> DbscanParams {
        DbscanParams {
            eps: self.eps,
            min_samples: self.min_samples,
        }
    }
}

impl DashboardConfig {
    /// Config from `<config dir>/accident-lens/config.toml`, or defaults
    /// when the file is absent or unusable (logged as a warning).
    pub fn load() -> Self {
        let Some(path) = Self::config_path().filter(|p| p.exists()) else {
            log::debug!("No config file found, using defaults");
            return Self::default();
        };
        Self::load_from(&path)
            .inspect(|_| log::info!("Loaded config from {}", path.display()))
            .unwrap_or_else(|e| {
                log::warn!("{e:#}. Using defaults.");
                Self::default()
            })
    }

    /// Read and parse one config file.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))
            .and_then(|contents| {
                Self::from_toml(&contents).with_context(|| format!("parsing {}", path.display()))
            })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = DashboardConfig::from_toml("").unwrap();
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.hotspot.params(), DbscanParams::default());
    }

    #[test]
    fn test_partial_override() {
        let config = DashboardConfig::from_toml(
            r#"
            data_path = "data/us_accidents_1M.csv"
            top_k = 10

            [hotspot]
            eps = 0.02
            "#,
        )
        .unwrap();
        assert_eq!(config.top_k, 10);
        assert_eq!(config.histogram_bins, 50);
        assert_eq!(config.hotspot.eps, 0.02);
        assert_eq!(config.hotspot.min_samples, 50);
        assert_eq!(config.data_path, Some(PathBuf::from("data/us_accidents_1M.csv")));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "histogram_bins = 30\n").unwrap();
        assert_eq!(DashboardConfig::load_from(&path).unwrap().histogram_bins, 30);

        std::fs::write(&path, "histogram_bins = [").unwrap();
        let err = DashboardConfig::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").starts_with("parsing"));

        let err = DashboardConfig::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(format!("{err:#}").starts_with("reading"));
    }

    #[test]
    fn test_wrong_type_is_an_error() {
        assert!(DashboardConfig::from_toml("top_k = \"many\"").is_err());
    }
}
