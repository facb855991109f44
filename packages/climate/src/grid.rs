//! Global regular lat/lon grids.
//!
//! Gridded products (e.g. the 0.05 degree monthly vegetation index, a
//! 3600 x 7200 matrix) index rows from the north pole and columns from the
//! antimeridian. Converting a country's bounding box into an index window
//! avoids walking the whole matrix.

use std::io::Read;
use std::ops::Range;
use std::path::Path;

use cchf_map_climate_models::MeasurementPoint;
use cchf_map_geography_models::{BoundingBox, CountryDefinition};

use crate::ClimateError;

/// Cell size of the monthly vegetation index product, in degrees.
pub const VEGETATION_CELL_DEGREES: f64 = 0.05;

/// Absorbs binary rounding so that cell edges land on their own index.
const INDEX_SNAP: f64 = 1e-9;

/// A north-up global grid with square cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterGrid {
    /// Cell edge length in degrees.
    pub cell_degrees: f64,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl RasterGrid {
    /// A grid covering the whole globe at the given resolution.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn global(cell_degrees: f64) -> Self {
        Self {
            cell_degrees,
            rows: (180.0 / cell_degrees).round() as usize,
            cols: (360.0 / cell_degrees).round() as usize,
        }
    }

    /// Coordinate `(lat, lon)` of a cell's north-west corner.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coordinate(&self, row: usize, col: usize) -> (f64, f64) {
        let lat = (row as f64).mul_add(-self.cell_degrees, 90.0);
        let lon = (col as f64).mul_add(self.cell_degrees, -180.0);
        (lat, lon)
    }

    /// Row index for a latitude, truncated toward the north pole and
    /// clamped to the grid.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn row_index(&self, lat: f64) -> usize {
        let idx = ((90.0 - lat) / self.cell_degrees + INDEX_SNAP).max(0.0) as usize;
        idx.min(self.rows.saturating_sub(1))
    }

    /// Column index for a longitude, truncated toward the antimeridian and
    /// clamped to the grid.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn col_index(&self, lon: f64) -> usize {
        let idx = ((lon + 180.0) / self.cell_degrees + INDEX_SNAP).max(0.0) as usize;
        idx.min(self.cols.saturating_sub(1))
    }

    /// Row and column ranges covering a bounding box.
    #[must_use]
    pub fn window(&self, bbox: &BoundingBox) -> (Range<usize>, Range<usize>) {
        let rows = self.row_index(bbox.max_lat)..self.row_index(bbox.min_lat) + 1;
        let cols = self.col_index(bbox.min_lon)..self.col_index(bbox.max_lon) + 1;
        (rows, cols)
    }

    /// Turns the cells of a row-major value matrix that fall inside a
    /// bounding box into unbinned measurement points.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError::GridShape`] if `values` does not hold
    /// `rows * cols` entries.
    pub fn points_in_box(
        &self,
        values: &[f64],
        bbox: &BoundingBox,
        country: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<MeasurementPoint>, ClimateError> {
        if values.len() != self.rows * self.cols {
            return Err(ClimateError::GridShape {
                rows: self.rows,
                cols: self.cols,
                actual: values.len(),
            });
        }

        let (rows, cols) = self.window(bbox);
        let mut points = Vec::new();
        for row in rows {
            for col in cols.clone() {
                let (lat, lon) = self.coordinate(row, col);
                if !bbox.contains(lat, lon) {
                    continue;
                }
                points.push(MeasurementPoint {
                    country: country.to_string(),
                    lat,
                    lon,
                    value: values[row * self.cols + col],
                    year,
                    month,
                    district: None,
                });
            }
        }
        Ok(points)
    }
}

/// Parses a granule date label of the form `YYYY.MM[.DD]` into
/// `(year, month)`.
#[must_use]
pub fn parse_recorded_date(label: &str) -> Option<(i32, u32)> {
    let mut parts = label.trim().split('.');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = parts.next()?.parse::<u32>().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

/// Reads a headerless CSV matrix of cell values in row-major order.
///
/// Cells that do not parse as numbers become NaN so that the matrix
/// keeps its shape.
///
/// # Errors
///
/// Returns an error if the CSV cannot be read.
pub fn read_grid_values(reader: impl Read) -> Result<Vec<f64>, ClimateError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut values = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        values.extend(
            record
                .iter()
                .map(|cell| cell.trim().parse::<f64>().unwrap_or(f64::NAN)),
        );
    }
    Ok(values)
}

/// `(year, month)` of a granule file, from its directory label or,
/// failing that, its file stem.
#[must_use]
pub fn granule_date(path: &Path) -> Option<(i32, u32)> {
    let label = |part: Option<&std::ffi::OsStr>| {
        part.and_then(|s| s.to_str())
            .and_then(parse_recorded_date)
    };
    label(path.parent().and_then(Path::file_name)).or_else(|| label(path.file_stem()))
}

/// Loads the cells of one granule matrix that fall inside a country's
/// bounding box.
///
/// Like point files, a granule that cannot be read, dated or shaped
/// contributes no points. Cells without a finite value are dropped.
#[must_use]
pub fn load_granule(path: &Path, grid: &RasterGrid, country: &CountryDefinition) -> Vec<MeasurementPoint> {
    let Some((year, month)) = granule_date(path) else {
        log::warn!("Skipping granule {} with no YYYY.MM date label", path.display());
        return Vec::new();
    };
    let values = match std::fs::File::open(path)
        .map_err(ClimateError::from)
        .and_then(read_grid_values)
    {
        Ok(values) => values,
        Err(e) => {
            log::warn!("Skipping unreadable granule {}: {e}", path.display());
            return Vec::new();
        }
    };
    match grid.points_in_box(&values, &country.bounding_box, &country.name, year, month) {
        Ok(points) => {
            let points: Vec<MeasurementPoint> =
                points.into_iter().filter(|p| p.value.is_finite()).collect();
            log::info!(
                "Read {} {year}-{month:02} cells for {} from {}",
                points.len(),
                country.name,
                path.display()
            );
            points
        }
        Err(e) => {
            log::warn!("Skipping granule {}: {e}", path.display());
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn global_vegetation_grid_dimensions() {
        let grid = RasterGrid::global(VEGETATION_CELL_DEGREES);
        assert_eq!(grid.rows, 3600);
        assert_eq!(grid.cols, 7200);
        assert_eq!(grid.row_index(34.0), 1120);
        assert_eq!(grid.col_index(69.0), 4980);
    }

    #[test]
    fn index_and_coordinate_conversions_agree() {
        let grid = RasterGrid::global(0.25);
        assert_eq!(grid.row_index(34.0), 224);
        assert_eq!(grid.col_index(69.0), 996);
        let (lat, lon) = grid.coordinate(224, 996);
        assert!((lat - 34.0).abs() < EPS);
        assert!((lon - 69.0).abs() < EPS);
        let (lat, lon) = grid.coordinate(0, 0);
        assert!((lat - 90.0).abs() < EPS);
        assert!((lon + 180.0).abs() < EPS);
    }

    #[test]
    fn indices_are_clamped_to_the_grid() {
        let grid = RasterGrid::global(1.0);
        assert_eq!(grid.row_index(95.0), 0);
        assert_eq!(grid.row_index(-95.0), 179);
        assert_eq!(grid.col_index(200.0), 359);
    }

    #[test]
    fn extracts_only_cells_inside_the_box() {
        let grid = RasterGrid::global(10.0);
        #[allow(clippy::cast_precision_loss)]
        let values: Vec<f64> = (0..grid.rows * grid.cols).map(|i| i as f64).collect();
        let bbox = BoundingBox {
            min_lat: 20.0,
            max_lat: 40.0,
            min_lon: 60.0,
            max_lon: 70.0,
        };
        let points = grid.points_in_box(&values, &bbox, "Pakistan", 2015, 3).unwrap();
        // Latitudes 40, 30, 20 by longitudes 60, 70.
        assert_eq!(points.len(), 6);
        assert!(points.iter().all(|p| bbox.contains(p.lat, p.lon)));
        assert!(points.iter().all(|p| p.district.is_none() && p.month == 3));
        let first = &points[0];
        assert!((first.lat - 40.0).abs() < EPS);
        assert!((first.lon - 60.0).abs() < EPS);
        assert!((first.value - (5.0 * 36.0 + 24.0)).abs() < EPS);
    }

    #[test]
    fn rejects_mis_shaped_values() {
        let grid = RasterGrid::global(10.0);
        let bbox = BoundingBox {
            min_lat: 0.0,
            max_lat: 1.0,
            min_lon: 0.0,
            max_lon: 1.0,
        };
        assert!(matches!(
            grid.points_in_box(&[1.0, 2.0], &bbox, "Serbia", 2015, 1),
            Err(ClimateError::GridShape { actual: 2, .. })
        ));
    }

    #[test]
    fn reads_matrix_keeping_shape() {
        let values = read_grid_values("1,2,3\n4,x,6\n".as_bytes()).unwrap();
        assert_eq!(values.len(), 6);
        assert!(values[4].is_nan());
        assert!((values[5] - 6.0).abs() < EPS);
    }

    #[test]
    fn granule_date_prefers_the_directory_label() {
        assert_eq!(
            granule_date(Path::new("MOD13C2/2015.03.01/ndvi.csv")),
            Some((2015, 3))
        );
        assert_eq!(granule_date(Path::new("grids/2016.07.csv")), Some((2016, 7)));
        assert_eq!(granule_date(Path::new("grids/ndvi.csv")), None);
    }

    #[test]
    fn missing_granule_contributes_zero_points() {
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
        let grid = RasterGrid::global(10.0);
        let path = Path::new("/nonexistent/2015.03.01/ndvi.csv");
        assert!(load_granule(path, &grid, &country).is_empty());
    }

    #[test]
    fn parses_granule_dates() {
        assert_eq!(parse_recorded_date("2015.03.01"), Some((2015, 3)));
        assert_eq!(parse_recorded_date("2001.12"), Some((2001, 12)));
        assert_eq!(parse_recorded_date("2001.13.01"), None);
        assert_eq!(parse_recorded_date("MOD13C2"), None);
    }
}
