#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Country registry and district boundary metadata types.
//!
//! Each analysed country has a manually curated bounding box used as a
//! fast pre-filter before any polygon containment test, plus the location
//! of its district boundary `GeoJSON`.

use serde::{Deserialize, Serialize};

/// Axis-aligned latitude/longitude rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern edge in decimal degrees.
    pub min_lat: f64,
    /// Northern edge in decimal degrees.
    pub max_lat: f64,
    /// Western edge in decimal degrees.
    pub min_lon: f64,
    /// Eastern edge in decimal degrees.
    pub max_lon: f64,
}

impl BoundingBox {
    /// Returns `true` if the point lies inside the box (edges included).
    ///
    /// NaN coordinates are never inside.
    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }

    /// Returns `true` if the box has a positive extent on both axes.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min_lat < self.max_lat
            && self.min_lon < self.max_lon
            && (-90.0..=90.0).contains(&self.min_lat)
            && (-90.0..=90.0).contains(&self.max_lat)
            && (-180.0..=180.0).contains(&self.min_lon)
            && (-180.0..=180.0).contains(&self.max_lon)
    }
}

/// A registered country, deserialized from an embedded TOML definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryDefinition {
    /// Lowercase identifier (e.g. `"pakistan"`).
    pub id: String,
    /// Display name as it appears in the input tables (e.g. `"Pakistan"`).
    pub name: String,
    /// Pre-filter rectangle enclosing every district of the country.
    pub bounding_box: BoundingBox,
    /// District boundary `GeoJSON`, relative to the geodata directory.
    pub boundaries: String,
}

impl CountryDefinition {
    /// Returns `true` if `name` refers to this country, ignoring case and
    /// surrounding whitespace.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim();
        self.id.eq_ignore_ascii_case(name) || self.name.eq_ignore_ascii_case(name)
    }
}

/// Representative coordinate of a district, taken from the first city
/// reported in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictCoordinate {
    /// Country the district belongs to.
    pub country: String,
    /// District name.
    pub district: String,
    /// Latitude of the first reported city, if it had one.
    pub lat: Option<f64>,
    /// Longitude of the first reported city, if it had one.
    pub lon: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOX: BoundingBox = BoundingBox {
        min_lat: 29.0,
        max_lat: 39.0,
        min_lon: 63.0,
        max_lon: 70.0,
    };

    #[test]
    fn contains_interior_and_edges() {
        assert!(BOX.contains(34.5, 69.2));
        assert!(BOX.contains(29.0, 63.0));
        assert!(BOX.contains(39.0, 70.0));
    }

    #[test]
    fn rejects_outside_and_nan() {
        assert!(!BOX.contains(40.0, 65.0));
        assert!(!BOX.contains(30.0, 71.0));
        assert!(!BOX.contains(f64::NAN, 65.0));
        assert!(!BOX.contains(30.0, f64::NAN));
    }

    #[test]
    fn validity() {
        assert!(BOX.is_valid());
        let inverted = BoundingBox {
            min_lat: 39.0,
            max_lat: 29.0,
            ..BOX
        };
        assert!(!inverted.is_valid());
    }

    #[test]
    fn country_matching_ignores_case_and_whitespace() {
        let def = CountryDefinition {
            id: "afghanistan".to_string(),
            name: "Afghanistan".to_string(),
            bounding_box: BOX,
            boundaries: "afghanistan/afghanistan-districts.geojson".to_string(),
        };
        assert!(def.matches("AFGHANISTAN"));
        assert!(def.matches(" Afghanistan "));
        assert!(!def.matches("Pakistan"));
    }
}
