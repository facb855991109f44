//! Point-cloud loading and district binning.
//!
//! The raster readers upstream flatten each granule into a CSV of
//! `latitude, longitude, value, year, month` rows. A file that cannot be
//! read contributes zero points rather than aborting the run.

use std::io::Read;
use std::path::Path;

use cchf_map_climate_models::MeasurementPoint;
use cchf_map_spatial::progress::ProgressCallback;
use cchf_map_spatial::{BinningStats, DistrictBinner};
use serde::Deserialize;

use crate::ClimateError;

/// Points binned between progress updates.
const PROGRESS_CHUNK: u64 = 10_000;

#[derive(Debug, Deserialize)]
struct PointRow {
    latitude: f64,
    longitude: f64,
    #[serde(alias = "NVDI Val")]
    value: f64,
    year: i32,
    month: u32,
}

/// Reads unbinned points for a country from CSV.
///
/// Malformed rows are skipped.
///
/// # Errors
///
/// Returns an error if the CSV header cannot be read.
pub fn read_points(reader: impl Read, country: &str) -> Result<Vec<MeasurementPoint>, ClimateError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    csv_reader.headers()?;

    let mut points = Vec::new();
    for result in csv_reader.deserialize::<PointRow>() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                log::trace!("  skipping malformed point row: {e}");
                continue;
            }
        };
        points.push(MeasurementPoint {
            country: country.to_string(),
            lat: row.latitude,
            lon: row.longitude,
            value: row.value,
            year: row.year,
            month: row.month,
            district: None,
        });
    }
    Ok(points)
}

/// Loads a point-cloud file, returning no points if it cannot be read.
#[must_use]
pub fn load_points(path: &Path, country: &str) -> Vec<MeasurementPoint> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) => {
            log::warn!("Skipping unreadable point file {}: {e}", path.display());
            return Vec::new();
        }
    };
    match read_points(file, country) {
        Ok(points) => {
            log::info!("Read {} points from {}", points.len(), path.display());
            points
        }
        Err(e) => {
            log::warn!("Skipping unparsable point file {}: {e}", path.display());
            Vec::new()
        }
    }
}

/// Assigns a district to every point; unmatched points keep `None`.
///
/// # Errors
///
/// Returns an error if a point's country has no loaded district index.
pub fn bin_points(
    points: &mut [MeasurementPoint],
    binner: &DistrictBinner,
    progress: &dyn ProgressCallback,
) -> Result<BinningStats, ClimateError> {
    progress.set_total(points.len() as u64);
    progress.set_message("Binning points".to_string());

    let mut stats = BinningStats::default();
    let mut pending = 0u64;

    for point in points.iter_mut() {
        let index = binner.index_for(&point.country)?;
        let result = index.classify(point.lat, point.lon);
        stats.record(&result);
        point.district = result.district().map(ToString::to_string);

        pending += 1;
        if pending == PROGRESS_CHUNK {
            progress.inc(pending);
            pending = 0;
        }
    }
    progress.inc(pending);

    progress.finish(format!(
        "Binned {} of {} points",
        stats.matched,
        stats.total()
    ));
    log::info!(
        "Binning: {} matched, {} outside bounds, {} unmatched, {} invalid",
        stats.matched,
        stats.outside_bounds,
        stats.unmatched,
        stats.invalid
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cchf_map_geography::boundaries::GeoPolygon;
    use cchf_map_geography_models::{BoundingBox, CountryDefinition};
    use cchf_map_spatial::DistrictIndex;
    use cchf_map_spatial::progress::NullProgress;
    use geo::{LineString, MultiPolygon, Polygon};

    fn binner() -> DistrictBinner {
        let ring = LineString::from(vec![
            (20.0, 44.0),
            (22.0, 44.0),
            (22.0, 46.0),
            (20.0, 46.0),
            (20.0, 44.0),
        ]);
        let country = CountryDefinition {
            id: "serbia".to_string(),
            name: "Serbia".to_string(),
            bounding_box: BoundingBox {
                min_lat: 40.0,
                max_lat: 48.0,
                min_lon: 18.0,
                max_lon: 25.0,
            },
            boundaries: "serbia/serbia-districts.geojson".to_string(),
        };
        DistrictBinner::from_indexes(vec![DistrictIndex::new(
            country,
            vec![GeoPolygon {
                name: "Vojvodina".to_string(),
                boundary: MultiPolygon(vec![Polygon::new(ring, vec![])]),
            }],
        )])
    }

    #[test]
    fn reads_points_and_skips_malformed_rows() {
        let csv = "latitude,longitude,NVDI Val,year,month\n\
                   45.0,21.0,3200,2015,3\n\
                   bad,21.0,3200,2015,3\n\
                   41.0,19.0,-3000,2015,4\n";
        let points = read_points(csv.as_bytes(), "Serbia").unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].country, "Serbia");
        assert!((points[1].value + 3000.0).abs() < f64::EPSILON);
        assert_eq!(points[1].month, 4);
    }

    #[test]
    fn missing_file_contributes_zero_points() {
        assert!(load_points(Path::new("/nonexistent/points.csv"), "Serbia").is_empty());
    }

    #[test]
    fn bins_points_and_counts_outcomes() {
        let csv = "latitude,longitude,value,year,month\n\
                   45.0,21.0,1.0,2015,1\n\
                   41.0,19.0,2.0,2015,1\n\
                   10.0,10.0,3.0,2015,1\n";
        let mut points = read_points(csv.as_bytes(), "Serbia").unwrap();
        let stats = bin_points(&mut points, &binner(), &NullProgress).unwrap();
        assert_eq!(points[0].district.as_deref(), Some("Vojvodina"));
        assert_eq!(points[1].district, None);
        assert_eq!(points[2].district, None);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.unmatched, 1);
        assert_eq!(stats.outside_bounds, 1);
    }

    #[test]
    fn binning_an_unloaded_country_fails() {
        let mut points = read_points(
            "latitude,longitude,value,year,month\n34.0,69.0,1.0,2015,1\n".as_bytes(),
            "Afghanistan",
        )
        .unwrap();
        assert!(bin_points(&mut points, &binner(), &NullProgress).is_err());
    }
}
