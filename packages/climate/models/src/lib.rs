#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Climate and vegetation measurement point types.
//!
//! Raster products are flattened into [`MeasurementPoint`]s, binned onto
//! districts, and reduced to one [`DistrictAverage`] per
//! `(country, district, year)`.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Vegetation index values strictly below this are raster "no data".
pub const VEGETATION_FILL_THRESHOLD: f64 = -12000.0;

/// The measured quantity a point cloud carries.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ClimateVariable {
    /// Monthly NDVI on a 0.05 degree grid.
    Vegetation,
    /// Land precipitation flux.
    Precipitation,
    /// Near-surface air temperature.
    Temperature,
}

impl ClimateVariable {
    /// All variables, in output order.
    pub const ALL: &[Self] = &[Self::Vegetation, Self::Precipitation, Self::Temperature];

    /// Column header of the yearly average table.
    #[must_use]
    pub const fn value_column(self) -> &'static str {
        match self {
            Self::Vegetation => "Avg. NVDI Val",
            Self::Precipitation => "PRECTOTLAND kg m-2 s-1",
            Self::Temperature => "temperature in (K)",
        }
    }

    /// Sentinel filter conventionally applied before averaging.
    #[must_use]
    pub const fn default_sentinel(self) -> SentinelFilter {
        match self {
            Self::Vegetation => SentinelFilter::Below(VEGETATION_FILL_THRESHOLD),
            Self::Precipitation | Self::Temperature => SentinelFilter::None,
        }
    }
}

/// Which raw values count as "no data" and are left out of averages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "kind", content = "threshold")]
pub enum SentinelFilter {
    /// Every value contributes.
    #[default]
    None,
    /// Values strictly below the threshold are excluded. NaN is always
    /// excluded under this filter.
    Below(f64),
}

impl SentinelFilter {
    /// Returns `true` if the value must be left out of an average.
    #[must_use]
    pub fn excludes(&self, value: f64) -> bool {
        match self {
            Self::None => false,
            Self::Below(threshold) => value.is_nan() || value < *threshold,
        }
    }
}

/// A single raster sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPoint {
    /// Country the sample was extracted for.
    pub country: String,
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Measured value in the product's native unit.
    pub value: f64,
    /// Year of the granule.
    pub year: i32,
    /// Month of the granule (1-12).
    pub month: u32,
    /// District assigned by binning. `None` until binned, and after
    /// binning if no district contains the point.
    pub district: Option<String>,
}

/// Grouping key of the yearly averages.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DistrictYear {
    /// Country name.
    pub country: String,
    /// District name.
    pub district: String,
    /// Calendar year.
    pub year: i32,
}

/// The yearly mean of a variable over one district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictAverage {
    /// Group the mean was computed over.
    pub key: DistrictYear,
    /// Arithmetic mean of the non-excluded values.
    pub value: f64,
}
