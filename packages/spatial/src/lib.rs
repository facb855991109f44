#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory district index for point binning.
//!
//! Loads each country's district polygons once, builds an R-tree over
//! their envelopes, and assigns geocoded points to the district that
//! contains them. A point is first checked against the country's curated
//! bounding box so that the bulk of out-of-region raster samples never
//! reach a polygon test.

pub mod progress;

use std::path::Path;

use cchf_map_geography::GeographyError;
use cchf_map_geography::boundaries::{GeoPolygon, load_boundaries};
use cchf_map_geography::registry::find_country;
use cchf_map_geography_models::CountryDefinition;
use geo::{BoundingRect, Intersects, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

/// Errors raised while building or querying district indexes.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// Country registry or boundary loading failed.
    #[error(transparent)]
    Geography(#[from] GeographyError),

    /// A point was binned for a country whose index was never loaded.
    #[error("No district index loaded for country '{country}'")]
    UnregisteredCountry {
        /// Country name as requested.
        country: String,
    },
}

/// A district polygon stored in the R-tree with its registry position.
struct BoundaryEntry {
    /// Position in the source feature list; lower wins on overlap.
    ordinal: usize,
    name: String,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// How a single point was classified by [`DistrictIndex::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinResult<'a> {
    /// A coordinate was NaN.
    InvalidCoordinate,
    /// The point lies outside the country's bounding box.
    OutsideBounds,
    /// Inside the bounding box but inside no district.
    NoMatch,
    /// Contained by the named district.
    Matched(&'a str),
}

impl<'a> BinResult<'a> {
    /// The matched district, if any.
    #[must_use]
    pub const fn district(self) -> Option<&'a str> {
        match self {
            Self::Matched(name) => Some(name),
            Self::InvalidCoordinate | Self::OutsideBounds | Self::NoMatch => None,
        }
    }
}

/// Running tally of binning outcomes, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinningStats {
    /// Points assigned to a district.
    pub matched: u64,
    /// Points with a NaN coordinate.
    pub invalid: u64,
    /// Points rejected by the bounding box.
    pub outside_bounds: u64,
    /// Points inside the bounding box but in no district.
    pub unmatched: u64,
}

impl BinningStats {
    /// Adds one classification to the tally.
    pub fn record(&mut self, result: &BinResult<'_>) {
        match result {
            BinResult::Matched(_) => self.matched += 1,
            BinResult::InvalidCoordinate => self.invalid += 1,
            BinResult::OutsideBounds => self.outside_bounds += 1,
            BinResult::NoMatch => self.unmatched += 1,
        }
    }

    /// Total points classified.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.matched + self.invalid + self.outside_bounds + self.unmatched
    }
}

/// Spatial index over one country's districts.
pub struct DistrictIndex {
    country: CountryDefinition,
    districts: RTree<BoundaryEntry>,
}

impl DistrictIndex {
    /// Builds an index from an ordered polygon set.
    #[must_use]
    pub fn new(country: CountryDefinition, polygons: Vec<GeoPolygon>) -> Self {
        let entries: Vec<BoundaryEntry> = polygons
            .into_iter()
            .enumerate()
            .filter_map(|(ordinal, polygon)| {
                let Some(envelope) = compute_envelope(&polygon.boundary) else {
                    log::warn!("Skipping empty boundary '{}' in {}", polygon.name, country.id);
                    return None;
                };
                Some(BoundaryEntry {
                    ordinal,
                    name: polygon.name,
                    envelope,
                    polygon: polygon.boundary,
                })
            })
            .collect();

        Self {
            country,
            districts: RTree::bulk_load(entries),
        }
    }

    /// Loads the country's boundary file from `geodata_dir` and indexes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the boundary file is missing or invalid.
    pub fn load(country: CountryDefinition, geodata_dir: &Path) -> Result<Self, GeographyError> {
        let polygons = load_boundaries(&country, geodata_dir)?;
        Ok(Self::new(country, polygons))
    }

    /// The country this index covers.
    #[must_use]
    pub const fn country(&self) -> &CountryDefinition {
        &self.country
    }

    /// Number of indexed districts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.districts.size()
    }

    /// Returns `true` if no district is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.districts.size() == 0
    }

    /// Classifies a point against the bounding box and districts.
    ///
    /// Containment is boundary-inclusive. When districts overlap, the one
    /// listed first in the boundary file wins.
    #[must_use]
    pub fn classify(&self, lat: f64, lon: f64) -> BinResult<'_> {
        if lat.is_nan() || lon.is_nan() {
            return BinResult::InvalidCoordinate;
        }
        if !self.country.bounding_box.contains(lat, lon) {
            return BinResult::OutsideBounds;
        }

        let point = geo::Point::new(lon, lat);
        let query_env = AABB::from_point([lon, lat]);

        self.districts
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.intersects(&point))
            .min_by_key(|entry| entry.ordinal)
            .map_or(BinResult::NoMatch, |entry| BinResult::Matched(&entry.name))
    }

    /// Returns the district containing the point, if any.
    #[must_use]
    pub fn bin(&self, lat: f64, lon: f64) -> Option<&str> {
        self.classify(lat, lon).district()
    }
}

/// District indexes for every country in a run.
pub struct DistrictBinner {
    indexes: Vec<DistrictIndex>,
}

impl DistrictBinner {
    /// Resolves each country in the registry and loads its boundaries.
    ///
    /// # Errors
    ///
    /// Fails on the first unregistered country or unreadable boundary
    /// file. Both are fatal configuration errors.
    pub fn load<S: AsRef<str>>(countries: &[S], geodata_dir: &Path) -> Result<Self, SpatialError> {
        let mut indexes: Vec<DistrictIndex> = Vec::with_capacity(countries.len());
        for name in countries {
            let country = find_country(name.as_ref())?;
            if indexes.iter().any(|i| i.country.id == country.id) {
                continue;
            }
            let index = DistrictIndex::load(country, geodata_dir)?;
            log::info!(
                "Indexed {} districts for {}",
                index.len(),
                index.country.name
            );
            indexes.push(index);
        }
        Ok(Self { indexes })
    }

    /// Wraps already-built indexes.
    #[must_use]
    pub const fn from_indexes(indexes: Vec<DistrictIndex>) -> Self {
        Self { indexes }
    }

    /// The index for a country (case-insensitive id or name).
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::UnregisteredCountry`] if the country was not
    /// loaded.
    pub fn index_for(&self, country: &str) -> Result<&DistrictIndex, SpatialError> {
        self.indexes
            .iter()
            .find(|index| index.country.matches(country))
            .ok_or_else(|| SpatialError::UnregisteredCountry {
                country: country.to_string(),
            })
    }

    /// Bins a point for a country.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::UnregisteredCountry`] if the country was not
    /// loaded.
    pub fn bin(&self, lat: f64, lon: f64, country: &str) -> Result<Option<&str>, SpatialError> {
        Ok(self.index_for(country)?.bin(lat, lon))
    }

    /// Countries covered by this binner, in load order.
    pub fn countries(&self) -> impl Iterator<Item = &CountryDefinition> {
        self.indexes.iter().map(DistrictIndex::country)
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
/// Empty polygons have no envelope.
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cchf_map_geography_models::BoundingBox;
    use geo::{LineString, Polygon};

    fn square(name: &str, min_lon: f64, min_lat: f64, size: f64) -> GeoPolygon {
        let ring = LineString::from(vec![
            (min_lon, min_lat),
            (min_lon + size, min_lat),
            (min_lon + size, min_lat + size),
            (min_lon, min_lat + size),
            (min_lon, min_lat),
        ]);
        GeoPolygon {
            name: name.to_string(),
            boundary: MultiPolygon(vec![Polygon::new(ring, vec![])]),
        }
    }

    fn afghanistan() -> CountryDefinition {
        CountryDefinition {
            id: "afghanistan".to_string(),
            name: "Afghanistan".to_string(),
            bounding_box: BoundingBox {
                min_lat: 29.0,
                max_lat: 39.0,
                min_lon: 63.0,
                max_lon: 70.0,
            },
            boundaries: "afghanistan/afghanistan-districts.geojson".to_string(),
        }
    }

    fn index() -> DistrictIndex {
        DistrictIndex::new(
            afghanistan(),
            vec![
                square("Herat", 63.0, 33.0, 2.0),
                square("Kabul", 68.0, 34.0, 1.0),
                // Overlaps the east half of Kabul; listed later so loses.
                square("Overlap", 68.5, 34.0, 1.0),
                // Extends past the bounding box to the east.
                square("Border", 69.5, 30.0, 2.0),
            ],
        )
    }

    #[test]
    fn centroid_is_assigned_to_its_district() {
        let index = index();
        assert_eq!(index.bin(34.0, 64.0), Some("Herat"));
        assert_eq!(index.bin(34.5, 68.5), Some("Kabul"));
    }

    #[test]
    fn far_outside_point_is_rejected_by_bounding_box() {
        let index = index();
        assert_eq!(index.classify(51.5, -0.1), BinResult::OutsideBounds);
        assert_eq!(index.bin(51.5, -0.1), None);
    }

    #[test]
    fn nan_coordinates_are_rejected() {
        let index = index();
        assert_eq!(index.classify(f64::NAN, 64.0), BinResult::InvalidCoordinate);
        assert_eq!(index.classify(34.0, f64::NAN), BinResult::InvalidCoordinate);
    }

    #[test]
    fn point_inside_bounds_but_no_district_is_unmatched() {
        let index = index();
        assert_eq!(index.classify(37.0, 66.0), BinResult::NoMatch);
    }

    #[test]
    fn overlapping_districts_resolve_to_first_listed() {
        let index = index();
        assert_eq!(index.bin(34.5, 68.75), Some("Kabul"));
        assert_eq!(index.bin(34.5, 69.25), Some("Overlap"));
    }

    #[test]
    fn containment_includes_district_edges() {
        let index = index();
        assert_eq!(index.bin(33.0, 64.0), Some("Herat"));
        assert_eq!(index.bin(35.0, 65.0), Some("Herat"));
    }

    #[test]
    fn bounding_box_prefilters_polygon_overhang() {
        let index = index();
        assert_eq!(index.bin(31.0, 69.8), Some("Border"));
        assert_eq!(index.classify(31.0, 71.0), BinResult::OutsideBounds);
    }

    #[test]
    fn binner_requires_loaded_country() {
        let binner = DistrictBinner::from_indexes(vec![index()]);
        assert_eq!(binner.bin(34.0, 64.0, "AFGHANISTAN").unwrap(), Some("Herat"));
        assert!(matches!(
            binner.bin(44.0, 20.0, "Serbia"),
            Err(SpatialError::UnregisteredCountry { .. })
        ));
    }

    #[test]
    fn binner_load_fails_for_unknown_country() {
        let result = DistrictBinner::load(&["Atlantis"], Path::new("geodata"));
        assert!(matches!(
            result,
            Err(SpatialError::Geography(GeographyError::UnknownCountry { .. }))
        ));
    }

    #[test]
    fn stats_tally_each_outcome() {
        let index = index();
        let mut stats = BinningStats::default();
        for (lat, lon) in [(34.0, 64.0), (51.5, -0.1), (f64::NAN, 1.0), (37.0, 66.0)] {
            stats.record(&index.classify(lat, lon));
        }
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.outside_bounds, 1);
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.unmatched, 1);
        assert_eq!(stats.total(), 4);
    }
}
