//! Subcommand flows.
//!
//! Each flow resolves its countries (and loads district polygons where it
//! bins points) before writing anything, so configuration errors abort
//! with no partial output.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr as _;

use cchf_map_analytics::report::{Grouping, ReportRequest, report};
use cchf_map_analytics_models::{ColumnId, GroupReport, JoinedRow, MissingPolicy};
use cchf_map_cli_utils::{IndicatifProgress, MultiProgress};
use cchf_map_climate::grid::{RasterGrid, load_granule};
use cchf_map_climate::{average, points, table as climate_table};
use cchf_map_climate_models::{ClimateVariable, DistrictYear};
use cchf_map_geography::GeographyError;
use cchf_map_geography::registry::{all_countries, resolve_countries};
use cchf_map_geography_models::{CountryDefinition, DistrictCoordinate};
use cchf_map_merge::cattle::{CattleTable, augment_cattle};
use cchf_map_merge::join::join_all;
use cchf_map_merge::population::{PopulationTable, augment_population};
use cchf_map_outbreak::aggregate::aggregate;
use cchf_map_outbreak::districts::{DistrictCoordinates, assign_districts};
use cchf_map_outbreak::notifications::{
    Granularity, filter_countries, load_notifications, to_records, write_notifications,
};
use cchf_map_outbreak::table::to_rows;
use cchf_map_outbreak_models::NotificationRow;
use cchf_map_spatial::DistrictBinner;
use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, PipelineConfig};

/// Merged country table written by the country flow.
pub const COUNTRY_TABLE: &str = "complete_data.csv";

/// Merged district table written by the district flow.
pub const DISTRICT_TABLE: &str = "combined_district_data.csv";

/// Map-layer export written by `map-export`.
pub const MAP_EXPORT: &str = "map_data.json";

/// Errors from a subcommand flow.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unknown country or unreadable boundaries.
    #[error(transparent)]
    Geography(#[from] GeographyError),

    /// District index lookup failed.
    #[error(transparent)]
    Spatial(#[from] cchf_map_spatial::SpatialError),

    /// Notification processing failed.
    #[error(transparent)]
    Outbreak(#[from] cchf_map_outbreak::OutbreakError),

    /// Climate averaging failed.
    #[error(transparent)]
    Climate(#[from] cchf_map_climate::ClimateError),

    /// Table merging failed.
    #[error(transparent)]
    Merge(#[from] cchf_map_merge::MergeError),

    /// Report artifacts could not be written.
    #[error(transparent)]
    Analytics(#[from] cchf_map_analytics::AnalyticsError),

    /// A file could not be opened or created.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The map export could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Arguments do not fit together.
    #[error("{message}")]
    Usage {
        /// What is wrong.
        message: String,
    },
}

fn create_output(path: &Path) -> Result<BufWriter<File>, PipelineError> {
    let to_error = |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(to_error)?;
    }
    Ok(BufWriter::new(File::create(path).map_err(to_error)?))
}

fn distinct_countries(rows: &[NotificationRow]) -> Vec<String> {
    rows.iter()
        .map(|row| row.country.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Prints the country registry.
pub fn list_countries() {
    println!(
        "{:<12} {:<12} {:>8} {:>8} {:>8} {:>8}",
        "ID", "NAME", "MIN_LAT", "MAX_LAT", "MIN_LON", "MAX_LON"
    );
    println!("{}", "-".repeat(62));
    for country in all_countries() {
        let bbox = &country.bounding_box;
        println!(
            "{:<12} {:<12} {:>8} {:>8} {:>8} {:>8}",
            country.id, country.name, bbox.min_lat, bbox.max_lat, bbox.min_lon, bbox.max_lon
        );
    }
}

/// Bins each notification's city coordinate onto a district and writes
/// the table with a `district` column.
///
/// # Errors
///
/// Fails before writing if any notification names an unregistered
/// country or a boundary file is missing.
pub fn assign(
    config: &PipelineConfig,
    input: Option<&Path>,
    output: Option<&Path>,
    multi: &MultiProgress,
) -> Result<PathBuf, PipelineError> {
    let input = input.map_or_else(|| config.resolve(&config.tables.notifications), Path::to_path_buf);
    let output = output.map_or_else(
        || config.resolve(&config.tables.district_notifications),
        Path::to_path_buf,
    );

    let mut rows = load_notifications(&input)?;
    let binner = DistrictBinner::load(&distinct_countries(&rows), &config.geodata_dir())?;

    let progress = IndicatifProgress::points_bar(multi, "Assigning districts");
    assign_districts(&mut rows, &binner, progress.as_ref())?;

    write_notifications(create_output(&output)?, &rows)?;
    log::info!("Wrote {} notifications to {}", rows.len(), output.display());
    Ok(output)
}

/// Pairs point files with countries: one country covers every file,
/// otherwise the lists pair up by position.
///
/// # Errors
///
/// Returns [`PipelineError::Usage`] if the lists cannot be paired.
pub fn pair_points(
    countries: Vec<CountryDefinition>,
    files: &[PathBuf],
) -> Result<Vec<(CountryDefinition, PathBuf)>, PipelineError> {
    match countries.as_slice() {
        [only] => Ok(files.iter().map(|f| (only.clone(), f.clone())).collect()),
        _ if countries.len() == files.len() => {
            Ok(countries.into_iter().zip(files.iter().cloned()).collect())
        }
        _ => Err(PipelineError::Usage {
            message: format!(
                "{} countries cannot be paired with {} point files",
                countries.len(),
                files.len()
            ),
        }),
    }
}

/// Parses a climate variable name, ignoring case.
///
/// # Errors
///
/// Returns [`PipelineError::Usage`] naming the accepted variables.
pub fn parse_variable(name: &str) -> Result<ClimateVariable, PipelineError> {
    ClimateVariable::from_str(name.trim()).map_err(|_| PipelineError::Usage {
        message: format!(
            "Unknown climate variable '{name}' (expected one of: {})",
            ClimateVariable::ALL
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    })
}

/// Global grid for a cell size that divides the globe evenly.
///
/// # Errors
///
/// Returns [`PipelineError::Usage`] for any other cell size.
pub fn grid_for(cell_degrees: f64) -> Result<RasterGrid, PipelineError> {
    let grid = RasterGrid::global(cell_degrees);
    #[allow(clippy::cast_precision_loss)]
    let spans_globe = (grid.cols as f64 * cell_degrees - 360.0).abs() < 1e-6;
    if cell_degrees.is_finite() && cell_degrees > 0.0 && grid.rows > 0 && spans_globe {
        Ok(grid)
    } else {
        Err(PipelineError::Usage {
            message: format!("Grid cell size {cell_degrees} does not tile the globe"),
        })
    }
}

/// Bins point clouds onto districts and writes yearly district averages
/// for one variable.
///
/// With `grid_degrees`, each file is a headerless granule matrix on a
/// global grid of that cell size, dated by its `YYYY.MM[.DD]` directory
/// label. Otherwise each file is a point CSV.
///
/// # Errors
///
/// Fails before writing on an unregistered country, a missing boundary
/// file, or mismatched argument lists. A group left empty by sentinel
/// exclusion is dropped, not an error.
pub fn climate(
    config: &PipelineConfig,
    variable: &str,
    countries: &[String],
    files: &[PathBuf],
    grid_degrees: Option<f64>,
    output: Option<&Path>,
    multi: &MultiProgress,
) -> Result<PathBuf, PipelineError> {
    let variable = parse_variable(variable)?;
    let grid = grid_degrees.map(grid_for).transpose()?;
    let resolved = resolve_countries(countries)?;
    let binner = DistrictBinner::load(countries, &config.geodata_dir())?;
    let pairs = pair_points(resolved, files)?;

    let mut all_points = Vec::new();
    for (country, file) in &pairs {
        match &grid {
            Some(grid) => all_points.extend(load_granule(file, grid, country)),
            None => all_points.extend(points::load_points(file, &country.name)),
        }
    }

    let progress = IndicatifProgress::points_bar(multi, &format!("Binning {variable} points"));
    points::bin_points(&mut all_points, &binner, progress.as_ref())?;

    let filter = config.sentinel_for(variable);
    let kept = average::drop_excluded(all_points, filter);
    let averages = average::average_with_filter(&kept, filter)?;
    let rows = average::into_rows(averages);

    let output = output.map_or_else(|| config.climate_table(variable), Path::to_path_buf);
    climate_table::write_averages(create_output(&output)?, variable, &rows)?;
    log::info!(
        "Wrote {} {variable} district-year averages to {}",
        rows.len(),
        output.display()
    );
    Ok(output)
}

/// Loads a notification table, keeping only `only` when it is non-empty,
/// and checks every remaining country against the registry.
fn load_selected(path: &Path, only: &[String]) -> Result<Vec<NotificationRow>, PipelineError> {
    let mut rows = load_notifications(path)?;
    if !only.is_empty() {
        let names: Vec<String> = resolve_countries(only)?
            .into_iter()
            .map(|c| c.name)
            .collect();
        rows = filter_countries(rows, &names);
    }
    resolve_countries(&distinct_countries(&rows))?;
    Ok(rows)
}

fn country_rows(
    config: &PipelineConfig,
    include_cattle: bool,
    only: &[String],
) -> Result<Vec<JoinedRow>, PipelineError> {
    let notifications = load_selected(&config.resolve(&config.tables.notifications), only)?;

    let records = aggregate(&to_records(&notifications, Granularity::Country));
    let mut rows: Vec<JoinedRow> = to_rows(&records, None)
        .into_iter()
        .map(JoinedRow::from)
        .collect();

    if include_cattle {
        let cattle = CattleTable::load(&config.resolve(&config.tables.cattle))?;
        augment_cattle(&mut rows, &cattle);
    }
    let population = PopulationTable::load(&config.resolve(&config.tables.population))?;
    augment_population(&mut rows, &population);

    Ok(rows)
}

fn district_rows(
    config: &PipelineConfig,
    only: &[String],
) -> Result<(Vec<JoinedRow>, DistrictCoordinates), PipelineError> {
    let notifications =
        load_selected(&config.resolve(&config.tables.district_notifications), only)?;

    let coordinates = DistrictCoordinates::from_rows(&notifications);
    let records = aggregate(&to_records(&notifications, Granularity::District));
    let rows = to_rows(&records, Some(&coordinates))
        .into_iter()
        .map(JoinedRow::from)
        .collect();
    Ok((rows, coordinates))
}

type ClimateTables = Vec<(ClimateVariable, BTreeMap<DistrictYear, f64>)>;

fn read_climate_tables(config: &PipelineConfig) -> Result<ClimateTables, PipelineError> {
    ClimateVariable::ALL
        .iter()
        .map(|variable| {
            let path = config.climate_table(*variable);
            let file = File::open(&path).map_err(|source| PipelineError::Io {
                path: path.clone(),
                source,
            })?;
            let averages = climate_table::read_averages(file, *variable)?;
            Ok((*variable, averages))
        })
        .collect()
}

/// Country flow: aggregate per country, augment with cattle and
/// population, write the merged table, and report per country.
///
/// An empty `only` keeps every country in the notification table.
///
/// # Errors
///
/// Fails on an unregistered country or an unreadable input table.
pub fn country_report(
    config: &PipelineConfig,
    include_cattle: bool,
    only: &[String],
) -> Result<Vec<GroupReport>, PipelineError> {
    let rows = country_rows(config, include_cattle, only)?;

    let output = config.output_dir.join(COUNTRY_TABLE);
    cchf_map_merge::write_joined(create_output(&output)?, &rows)?;
    log::info!("Wrote {} country-year rows to {}", rows.len(), output.display());

    let request = ReportRequest {
        columns: ColumnId::country_set(include_cattle),
        policy: MissingPolicy::Drop,
        grouping: Grouping::Country { include_cattle },
    };
    Ok(report(&rows, &request, &config.plots_dir)?)
}

/// District flow: aggregate per district, inner-join the climate
/// averages, write the merged table, and report per district.
///
/// # Errors
///
/// Fails on an unregistered country or an unreadable input table.
pub fn district_report(
    config: &PipelineConfig,
    policy: MissingPolicy,
    only: &[String],
) -> Result<Vec<GroupReport>, PipelineError> {
    let (rows, _) = district_rows(config, only)?;
    let tables = read_climate_tables(config)?;
    let joined = join_all(rows, &tables);

    let output = config.output_dir.join(DISTRICT_TABLE);
    cchf_map_merge::write_joined(create_output(&output)?, &joined)?;
    log::info!("Wrote {} district-year rows to {}", joined.len(), output.display());

    let request = ReportRequest {
        columns: ColumnId::DISTRICT_SET.to_vec(),
        policy,
        grouping: Grouping::District,
    };
    Ok(report(&joined, &request, &config.plots_dir)?)
}

/// Document consumed by the map layer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapExport {
    /// Merged country-year rows.
    pub countries: Vec<JoinedRow>,
    /// District-year rows with their district coordinate.
    pub districts: Vec<JoinedRow>,
    /// First known city coordinate per district.
    pub district_coordinates: Vec<DistrictCoordinate>,
}

/// Writes the merged yearly tables and district coordinate lookup as
/// JSON.
///
/// # Errors
///
/// Fails on an unregistered country or an unreadable input table.
pub fn map_export(config: &PipelineConfig, output: Option<&Path>) -> Result<PathBuf, PipelineError> {
    let countries = country_rows(config, config.include_cattle, &[])?;
    let (districts, coordinates) = district_rows(config, &[])?;
    let export = MapExport {
        countries,
        districts,
        district_coordinates: coordinates.to_vec(),
    };

    let output = output.map_or_else(|| config.output_dir.join(MAP_EXPORT), Path::to_path_buf);
    serde_json::to_writer_pretty(create_output(&output)?, &export)?;
    log::info!(
        "Wrote map export ({} country rows, {} district rows) to {}",
        export.countries.len(),
        export.districts.len(),
        output.display()
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TablePaths;
    use cchf_map_geography::registry::find_country;

    const NOTIFICATION_HEADER: &str = "diseasename,country,issue_date,region/city lat,\
                                       region/city lon,cases,deaths,total cases,total deaths,district";

    /// Fresh data directory under the system temp dir.
    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("cchf_map_pipeline_{name}_{}", std::process::id()));
        if dir.exists() {
            std::fs::remove_dir_all(&dir).unwrap();
        }
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config_in(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            data_dir: dir.to_path_buf(),
            output_dir: dir.join("out"),
            plots_dir: dir.join("plots"),
            tables: TablePaths {
                geodata: PathBuf::from("geodata"),
                notifications: PathBuf::from("notifications.csv"),
                district_notifications: PathBuf::from("district_notifications.csv"),
                cattle: PathBuf::from("cattle.csv"),
                population: PathBuf::from("population.csv"),
                vegetation: PathBuf::from("vegetation.csv"),
                precipitation: PathBuf::from("precipitation.csv"),
                temperature: PathBuf::from("temperature.csv"),
            },
            ..PipelineConfig::default()
        }
    }

    fn write_table(dir: &Path, name: &str, lines: &[&str]) {
        std::fs::write(dir.join(name), lines.join("\n") + "\n").unwrap();
    }

    fn files(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("points_{i}.csv"))).collect()
    }

    #[test]
    fn one_country_covers_every_file() {
        let pairs = pair_points(vec![find_country("serbia").unwrap()], &files(3)).unwrap();
        assert_eq!(pairs.len(), 3);
        assert!(pairs.iter().all(|(c, _)| c.id == "serbia"));
    }

    #[test]
    fn countries_pair_with_files_by_position() {
        let countries = vec![
            find_country("Pakistan").unwrap(),
            find_country("Afghanistan").unwrap(),
        ];
        let pairs = pair_points(countries, &files(2)).unwrap();
        assert_eq!(pairs[1].0.id, "afghanistan");
        assert_eq!(pairs[1].1, PathBuf::from("points_1.csv"));
    }

    #[test]
    fn mismatched_lists_are_a_usage_error() {
        let countries = vec![
            find_country("Pakistan").unwrap(),
            find_country("Afghanistan").unwrap(),
        ];
        assert!(matches!(
            pair_points(countries, &files(3)),
            Err(PipelineError::Usage { .. })
        ));
    }

    #[test]
    fn distinct_countries_are_trimmed_and_sorted() {
        let row = |c: &str| NotificationRow {
            country: c.to_string(),
            ..NotificationRow::default()
        };
        assert_eq!(
            distinct_countries(&[row("Serbia "), row("Afghanistan"), row("Serbia"), row("")]),
            vec!["Afghanistan".to_string(), "Serbia".to_string()]
        );
    }

    #[test]
    fn variable_names_parse_case_insensitively() {
        assert_eq!(parse_variable(" Vegetation").unwrap(), ClimateVariable::Vegetation);
        assert_eq!(parse_variable("temperature").unwrap(), ClimateVariable::Temperature);
        let Err(PipelineError::Usage { message }) = parse_variable("humidity") else {
            panic!("an unknown variable must be a usage error");
        };
        assert!(message.contains("vegetation, precipitation, temperature"), "{message}");
    }

    #[test]
    fn grid_cell_size_must_tile_the_globe() {
        let grid = grid_for(0.05).unwrap();
        assert_eq!((grid.rows, grid.cols), (3600, 7200));
        assert!(matches!(grid_for(0.0), Err(PipelineError::Usage { .. })));
        assert!(matches!(grid_for(7.0), Err(PipelineError::Usage { .. })));
        assert!(matches!(grid_for(f64::NAN), Err(PipelineError::Usage { .. })));
    }

    #[test]
    fn unregistered_country_aborts_country_flow_before_writing() {
        let dir = scratch("unregistered");
        let config = config_in(&dir);
        write_table(
            &dir,
            "notifications.csv",
            &[
                NOTIFICATION_HEADER,
                "CCHF,Pakistan,2015-03-01,,,4,1,,,",
                "CCHF,Narnia,2015-03-02,,,2,0,,,",
            ],
        );

        let result = country_report(&config, false, &[]);

        assert!(
            matches!(
                result,
                Err(PipelineError::Geography(GeographyError::UnknownCountry { .. }))
            ),
            "{result:?}"
        );
        assert!(!config.output_dir.join(COUNTRY_TABLE).exists());
        assert!(!config.plots_dir.exists());
    }

    #[test]
    fn district_flow_keeps_only_fully_covered_district_years() {
        let dir = scratch("district_join");
        let config = config_in(&dir);
        write_table(
            &dir,
            "district_notifications.csv",
            &[
                NOTIFICATION_HEADER,
                "CCHF,Pakistan,2015-03-01,30.18,66.99,4,1,,,Quetta",
                "CCHF,Pakistan,2016-05-01,30.18,66.99,6,2,,,Quetta",
                "CCHF,Pakistan,2015-04-01,24.86,67.01,3,0,,,Karachi",
                "CCHF,Pakistan,2015-04-02,25.39,68.37,9,1,,,",
            ],
        );
        write_table(
            &dir,
            "vegetation.csv",
            &[
                "country,district,year,Avg. NVDI Val",
                "Pakistan,Quetta,2015,1200",
                "Pakistan,Quetta,2016,1500",
                "Pakistan,Karachi,2015,800",
            ],
        );
        write_table(
            &dir,
            "precipitation.csv",
            &[
                "country,district,year,PRECTOTLAND kg m-2 s-1",
                "Pakistan,Quetta,2015,0.00002",
                "Pakistan,Quetta,2016,0.00003",
            ],
        );
        write_table(
            &dir,
            "temperature.csv",
            &[
                "country,district,year,temperature in (K)",
                "Pakistan,Quetta,2015,291.5",
                "Pakistan,Quetta,2016,292.0",
                "Pakistan,Karachi,2015,300.1",
            ],
        );

        let reports = district_report(&config, MissingPolicy::Drop, &[]).unwrap();

        let file = File::open(config.output_dir.join(DISTRICT_TABLE)).unwrap();
        let rows = cchf_map_merge::read_joined(file).unwrap();
        assert_eq!(rows.len(), 2, "Karachi has no precipitation: {rows:?}");
        assert!(rows.iter().all(|r| r.district.as_deref() == Some("Quetta")));
        assert_eq!(rows.iter().map(|r| r.year).collect::<Vec<_>>(), vec![2015, 2016]);
        assert_eq!(rows[1].vegetation, Some(1500.0));
        assert!(rows[0].lat.is_some_and(|lat| (lat - 30.18).abs() < 1e-9));

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].rows, 2);
    }

    #[test]
    fn missing_boundaries_abort_assignment_before_writing() {
        let dir = scratch("missing_geojson");
        let config = config_in(&dir);
        write_table(
            &dir,
            "notifications.csv",
            &[NOTIFICATION_HEADER, "CCHF,Pakistan,2015-03-01,30.18,66.99,4,1,,,"],
        );
        let output = dir.join("assigned.csv");

        let result = assign(&config, None, Some(&output), &MultiProgress::new());

        assert!(
            matches!(
                result,
                Err(PipelineError::Spatial(cchf_map_spatial::SpatialError::Geography(
                    GeographyError::MissingBoundaries { .. }
                )))
            ),
            "{result:?}"
        );
        assert!(!output.exists());
    }
}
