#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Raster point binning and yearly per-district averaging.
//!
//! Vegetation, precipitation and temperature products arrive as point
//! clouds of `(lat, lon, value, year, month)` samples. Each sample is
//! binned onto a district with [`cchf_map_spatial`], then reduced to one
//! mean per `(country, district, year)`.

pub mod average;
pub mod grid;
pub mod points;
pub mod table;

use thiserror::Error;

/// Errors that can occur while producing climate averages.
#[derive(Debug, Error)]
pub enum ClimateError {
    /// A group had no contributing value after sentinel exclusion.
    #[error("No usable values for {country}/{district} in {year}")]
    EmptyGroup {
        /// Country of the group.
        country: String,
        /// District of the group.
        district: String,
        /// Year of the group.
        year: i32,
    },

    /// The spatial index rejected a country.
    #[error(transparent)]
    Spatial(#[from] cchf_map_spatial::SpatialError),

    /// A file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The average table is missing a required column.
    #[error("Average table is missing column '{column}'")]
    MissingColumn {
        /// Header that was expected.
        column: String,
    },

    /// Raster values do not match the declared grid shape.
    #[error("Grid has {actual} values but {rows}x{cols} were declared")]
    GridShape {
        /// Declared rows.
        rows: usize,
        /// Declared columns.
        cols: usize,
        /// Number of values supplied.
        actual: usize,
    },
}
