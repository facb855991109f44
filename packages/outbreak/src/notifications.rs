//! Reading the annotated notification table and turning rows into
//! [`NotificationRecord`]s.

use std::io::{Read, Write};
use std::path::Path;

use cchf_map_outbreak_models::{EntityKey, NotificationRecord, NotificationRow};
use chrono::NaiveDate;

use crate::OutbreakError;

/// Issue-date layouts seen in annotated tables.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Whether notifications are keyed by country or by district.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// One record per `(country, disease, year)`.
    Country,
    /// One record per `(country, disease, district, year)`.
    District,
}

/// Parses an issue date in any of the accepted layouts.
#[must_use]
pub fn parse_issue_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parses a numeric cell. Empty and unparsable cells are missing.
///
/// `NaN` parses to a NaN value, which the aggregator treats as invalid.
#[must_use]
pub fn parse_number(cell: Option<&str>) -> Option<f64> {
    let s = cell?.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Reads notification rows from CSV. Malformed rows are skipped.
///
/// # Errors
///
/// Returns an error if the CSV header cannot be read.
pub fn read_notifications(reader: impl Read) -> Result<Vec<NotificationRow>, OutbreakError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    csv_reader.headers()?;

    let mut rows = Vec::new();
    let mut skipped = 0u64;
    for result in csv_reader.deserialize::<NotificationRow>() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                log::trace!("  skipping malformed notification row: {e}");
            }
        }
    }
    if skipped > 0 {
        log::warn!("Skipped {skipped} malformed notification rows");
    }
    Ok(rows)
}

/// Reads a notification table from disk.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or its header read.
pub fn load_notifications(path: &Path) -> Result<Vec<NotificationRow>, OutbreakError> {
    let file = std::fs::File::open(path)?;
    let rows = read_notifications(file)?;
    log::info!("Read {} notifications from {}", rows.len(), path.display());
    Ok(rows)
}

/// Writes notification rows, including the `district` column.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_notifications(writer: impl Write, rows: &[NotificationRow]) -> Result<(), OutbreakError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Keeps rows whose country matches one of `countries`, ignoring case.
#[must_use]
pub fn filter_countries<S: AsRef<str>>(
    rows: Vec<NotificationRow>,
    countries: &[S],
) -> Vec<NotificationRow> {
    let wanted: Vec<String> = countries
        .iter()
        .map(|c| c.as_ref().trim().to_lowercase())
        .collect();
    let before = rows.len();
    let kept: Vec<NotificationRow> = rows
        .into_iter()
        .filter(|row| wanted.contains(&row.country.trim().to_lowercase()))
        .collect();
    log::debug!("Country filter kept {} of {before} notifications", kept.len());
    kept
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Converts a row into a notification record.
///
/// Returns `None` if the issue date cannot be parsed, or if `granularity`
/// is [`Granularity::District`] and the row has no district.
#[must_use]
pub fn to_record(row: &NotificationRow, granularity: Granularity) -> Option<NotificationRecord> {
    let Some(issue_date) = parse_issue_date(&row.issue_date) else {
        log::warn!(
            "Skipping {} notification with unparsable date '{}'",
            row.country,
            row.issue_date
        );
        return None;
    };

    let country = row.country.trim();
    let disease = non_empty(row.disease.as_ref());
    let entity_key = match granularity {
        Granularity::Country => EntityKey::country(country, disease),
        Granularity::District => {
            EntityKey::district(country, disease, non_empty(row.district.as_ref())?)
        }
    };

    Some(NotificationRecord {
        entity_key,
        issue_date,
        incremental_cases: parse_number(row.cases.as_deref()),
        incremental_deaths: parse_number(row.deaths.as_deref()),
        cumulative_cases_this_year: parse_number(row.total_cases.as_deref()),
        cumulative_deaths_this_year: parse_number(row.total_deaths.as_deref()),
    })
}

/// Converts every usable row.
#[must_use]
pub fn to_records(rows: &[NotificationRow], granularity: Granularity) -> Vec<NotificationRecord> {
    let records: Vec<NotificationRecord> = rows
        .iter()
        .filter_map(|row| to_record(row, granularity))
        .collect();
    if records.len() < rows.len() {
        log::info!(
            "Using {} of {} notifications at {granularity:?} level",
            records.len(),
            rows.len()
        );
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
diseasename,place,country,lat,lon,summary,issue_date,region/city,region/city lat,region/city lon,cases,deaths,total cases,total deaths
CCHF,Balochistan,Pakistan,30.0,70.0,summary one,2020-01-10,Quetta,30.18,66.99,5,,,
CCHF,Sindh,pakistan ,30.0,70.0,summary two,02/01/2020,Karachi,24.86,67.01,,1,50,NaN
CCHF,Kosovo,Serbia,44.0,21.0,summary three,not a date,Pristina,42.66,21.16,2,0,,
";

    #[test]
    fn parses_both_date_layouts() {
        assert_eq!(
            parse_issue_date("2020-01-10"),
            NaiveDate::from_ymd_opt(2020, 1, 10)
        );
        assert_eq!(
            parse_issue_date(" 02/01/2020 "),
            NaiveDate::from_ymd_opt(2020, 2, 1)
        );
        assert_eq!(parse_issue_date("2020/01/10"), None);
    }

    #[test]
    fn parses_numeric_cells() {
        assert_eq!(parse_number(Some(" 12 ")), Some(12.0));
        assert_eq!(parse_number(Some("")), None);
        assert_eq!(parse_number(Some("many")), None);
        assert_eq!(parse_number(None), None);
        assert!(parse_number(Some("NaN")).is_some_and(f64::is_nan));
    }

    #[test]
    fn reads_rows_without_a_district_column() {
        let rows = read_notifications(TABLE.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].region_city.as_deref(), Some("Quetta"));
        assert_eq!(rows[0].deaths, None);
        assert_eq!(rows[1].total_cases.as_deref(), Some("50"));
        assert!(rows.iter().all(|r| r.district.is_none()));
    }

    #[test]
    fn filters_countries_case_insensitively() {
        let rows = read_notifications(TABLE.as_bytes()).unwrap();
        let kept = filter_countries(rows, &["PAKISTAN"]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn converts_rows_at_country_level() {
        let rows = read_notifications(TABLE.as_bytes()).unwrap();
        let records = to_records(&rows, Granularity::Country);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].incremental_cases, Some(5.0));
        assert_eq!(records[0].incremental_deaths, None);

        let second = &records[1];
        assert_eq!(second.entity_key.country, "pakistan");
        assert_eq!(second.entity_key.disease.as_deref(), Some("CCHF"));
        assert_eq!(second.cumulative_cases_this_year, Some(50.0));
        assert!(second.cumulative_deaths_this_year.is_some_and(f64::is_nan));
    }

    #[test]
    fn district_level_drops_rows_without_district() {
        let mut rows = read_notifications(TABLE.as_bytes()).unwrap();
        rows[0].district = Some("Quetta".to_string());
        rows[1].district = Some("  ".to_string());
        let records = to_records(&rows, Granularity::District);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entity_key.district.as_deref(), Some("Quetta"));
    }

    #[test]
    fn written_rows_gain_a_district_column() {
        let mut rows = read_notifications(TABLE.as_bytes()).unwrap();
        rows[0].district = Some("Quetta".to_string());
        let mut buf = Vec::new();
        write_notifications(&mut buf, &rows).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.lines().next().unwrap().ends_with(",district"));

        let back = read_notifications(buf.as_slice()).unwrap();
        assert_eq!(back[0].district.as_deref(), Some("Quetta"));
        assert_eq!(back[1].district, None);
    }
}
