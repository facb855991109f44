//! District assignment of notifications and the per-district coordinate
//! lookup exported to the map layer.

use std::collections::BTreeMap;

use cchf_map_geography_models::DistrictCoordinate;
use cchf_map_outbreak_models::{NotificationRow, YearlyRow};
use cchf_map_spatial::progress::ProgressCallback;
use cchf_map_spatial::{BinningStats, DistrictBinner};

use crate::OutbreakError;
use crate::notifications::parse_number;

/// Bins every row's `region/city` coordinate onto a district of the row's
/// country. Rows that match nothing get no district.
///
/// # Errors
///
/// Returns [`OutbreakError::Spatial`] if a row names a country the binner
/// was not loaded for.
pub fn assign_districts(
    rows: &mut [NotificationRow],
    binner: &DistrictBinner,
    progress: &dyn ProgressCallback,
) -> Result<BinningStats, OutbreakError> {
    progress.set_total(rows.len() as u64);
    progress.set_message("Assigning districts".to_string());

    let mut stats = BinningStats::default();
    for row in rows.iter_mut() {
        let index = binner.index_for(row.country.trim())?;
        let lat = parse_number(row.region_city_lat.as_deref()).unwrap_or(f64::NAN);
        let lon = parse_number(row.region_city_lon.as_deref()).unwrap_or(f64::NAN);

        let result = index.classify(lat, lon);
        stats.record(&result);
        row.district = result.district().map(ToString::to_string);
        progress.inc(1);
    }

    progress.finish(format!(
        "Assigned {} of {} notifications",
        stats.matched,
        stats.total()
    ));
    log::info!(
        "District assignment: {} matched, {} outside bounds, {} unmatched, {} without coordinates",
        stats.matched,
        stats.outside_bounds,
        stats.unmatched,
        stats.invalid
    );
    Ok(stats)
}

/// First known city coordinate per `(country, district)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistrictCoordinates {
    entries: BTreeMap<(String, String), DistrictCoordinate>,
}

impl DistrictCoordinates {
    /// Records the first `region/city` coordinate seen for each district,
    /// in row order. Rows without a district are ignored.
    #[must_use]
    pub fn from_rows(rows: &[NotificationRow]) -> Self {
        let mut entries = BTreeMap::new();
        for row in rows {
            let Some(district) = row.district.as_deref().map(str::trim) else {
                continue;
            };
            if district.is_empty() {
                continue;
            }
            let country = row.country.trim();
            entries
                .entry((country.to_string(), district.to_string()))
                .or_insert_with(|| DistrictCoordinate {
                    country: country.to_string(),
                    district: district.to_string(),
                    lat: parse_number(row.region_city_lat.as_deref()),
                    lon: parse_number(row.region_city_lon.as_deref()),
                });
        }
        Self { entries }
    }

    /// Number of districts with a recorded coordinate.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no district was seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Coordinate for a district.
    #[must_use]
    pub fn get(&self, country: &str, district: &str) -> Option<&DistrictCoordinate> {
        self.entries
            .get(&(country.to_string(), district.to_string()))
    }

    /// Fills `lat`/`lon` on district rows from the lookup.
    pub fn attach(&self, rows: &mut [YearlyRow]) {
        for row in rows {
            let Some(district) = &row.district else {
                continue;
            };
            if let Some(coord) = self.get(&row.country, district) {
                row.lat = coord.lat;
                row.lon = coord.lon;
            }
        }
    }

    /// All coordinates, sorted by country then district.
    #[must_use]
    pub fn to_vec(&self) -> Vec<DistrictCoordinate> {
        self.entries.values().cloned().collect()
    }
}
