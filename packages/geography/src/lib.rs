#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Country registry and district boundary loading.
//!
//! Countries are defined as TOML files embedded at compile time. Each one
//! names a bounding box and a district `GeoJSON` file which is parsed into
//! an ordered list of [`boundaries::GeoPolygon`] values for point binning.

pub mod boundaries;
pub mod registry;

use thiserror::Error;

/// Errors that can occur while resolving countries or loading boundaries.
///
/// Every variant is a configuration error: the run cannot proceed for a
/// country whose registry entry or polygon set is unavailable.
#[derive(Debug, Error)]
pub enum GeographyError {
    /// The country has no registry entry (and therefore no bounding box).
    #[error("Country '{country}' is not registered; known countries: {known}")]
    UnknownCountry {
        /// Country name as requested.
        country: String,
        /// Comma-separated list of registered country ids.
        known: String,
    },

    /// The district boundary file for a country could not be read.
    #[error("Missing boundary file for {country} at {path}: {source}")]
    MissingBoundaries {
        /// Country id.
        country: String,
        /// Path that was attempted.
        path: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The boundary file was read but is not usable `GeoJSON`.
    #[error("Invalid boundary GeoJSON for {country}: {message}")]
    InvalidBoundaries {
        /// Country id.
        country: String,
        /// Description of what went wrong.
        message: String,
    },
}
