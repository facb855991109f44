//! Pipeline configuration.
//!
//! Loaded from an optional TOML file. Every field has a default matching
//! the conventional data layout, so an absent file or a partial one is
//! fine. Relative table paths resolve against `data_dir`.

use std::path::{Path, PathBuf};

use cchf_map_analytics_models::MissingPolicy;
use cchf_map_climate_models::{ClimateVariable, SentinelFilter, VEGETATION_FILL_THRESHOLD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config file read when `--config` is not given, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "cchf_map.toml";

/// Environment variable overriding `data_dir`.
pub const DATA_DIR_ENV: &str = "CCHF_MAP_DATA_DIR";

/// Errors loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`PipelineConfig`].
    #[error("Invalid config {path}: {source}")]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
}

/// Input table locations, relative to `data_dir` unless absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablePaths {
    /// Directory holding `<id>/<id>-districts.geojson`.
    pub geodata: PathBuf,
    /// Annotated notifications.
    pub notifications: PathBuf,
    /// Annotated notifications with a `district` column.
    pub district_notifications: PathBuf,
    /// Livestock counts.
    pub cattle: PathBuf,
    /// Population with one column per year.
    pub population: PathBuf,
    /// Yearly district vegetation averages.
    pub vegetation: PathBuf,
    /// Yearly district precipitation averages.
    pub precipitation: PathBuf,
    /// Yearly district temperature averages.
    pub temperature: PathBuf,
}

impl Default for TablePaths {
    fn default() -> Self {
        let sets = Path::new("individual_data_sets");
        Self {
            geodata: PathBuf::from("geodata"),
            notifications: sets.join("CCHF_data/cchf_data.csv"),
            district_notifications: sets.join("CCHF_data/cchf_district_data.csv"),
            cattle: sets.join("cattle_data/cattle-livestock-count-heads.csv"),
            population: sets.join("population_data/population_data_countries.csv"),
            vegetation: sets.join("vegetation_data/vgi_data.csv"),
            precipitation: sets
                .join("precipitation_data/yearly_precipitation_data_by_district.csv"),
            temperature: sets.join("temperature_data/yearly_temperature_data_by_district.csv"),
        }
    }
}

/// Settings shared by every subcommand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the input data.
    pub data_dir: PathBuf,
    /// Where merged tables and the map export are written.
    pub output_dir: PathBuf,
    /// Where correlation heatmaps are written.
    pub plots_dir: PathBuf,
    /// Input tables.
    pub tables: TablePaths,
    /// Vegetation values below this are raster fill.
    pub vegetation_sentinel: f64,
    /// Whether the country report includes cattle counts.
    pub include_cattle: bool,
    /// Missing-data policy of the district report.
    pub district_policy: MissingPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("data"),
            plots_dir: PathBuf::from("plots"),
            tables: TablePaths::default(),
            vegetation_sentinel: VEGETATION_FILL_THRESHOLD,
            include_cattle: true,
            district_policy: MissingPolicy::Drop,
        }
    }
}

impl PipelineConfig {
    /// Loads the configuration.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`]
    /// is used if present, otherwise the defaults. [`DATA_DIR_ENV`] is
    /// applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if default_path.is_file() => Self::from_file(default_path)?,
            None => Self::default(),
        };
        Ok(config.with_data_dir_override(std::env::var(DATA_DIR_ENV).ok()))
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parses a TOML document; omitted fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Replaces `data_dir` when an override is set and non-empty.
    #[must_use]
    pub fn with_data_dir_override(mut self, value: Option<String>) -> Self {
        if let Some(dir) = value.filter(|v| !v.trim().is_empty()) {
            log::debug!("{DATA_DIR_ENV} overrides data directory: {dir}");
            self.data_dir = PathBuf::from(dir);
        }
        self
    }

    /// Resolves a table path against `data_dir`.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.data_dir.join(path)
    }

    /// Directory of district GeoJSON files.
    #[must_use]
    pub fn geodata_dir(&self) -> PathBuf {
        self.resolve(&self.tables.geodata)
    }

    /// Average table of a climate variable.
    #[must_use]
    pub fn climate_table(&self, variable: ClimateVariable) -> PathBuf {
        self.resolve(match variable {
            ClimateVariable::Vegetation => &self.tables.vegetation,
            ClimateVariable::Precipitation => &self.tables.precipitation,
            ClimateVariable::Temperature => &self.tables.temperature,
        })
    }

    /// Sentinel filter used when averaging a variable.
    #[must_use]
    pub fn sentinel_for(&self, variable: ClimateVariable) -> SentinelFilter {
        match variable.default_sentinel() {
            SentinelFilter::Below(_) => SentinelFilter::Below(self.vegetation_sentinel),
            SentinelFilter::None => SentinelFilter::None,
        }
    }
}
