//! Yearly district average tables.
//!
//! One CSV per variable with columns `country, district, year, <value>`,
//! where `<value>` is [`ClimateVariable::value_column`].

use std::collections::BTreeMap;
use std::io::{Read, Write};

use cchf_map_climate_models::{ClimateVariable, DistrictAverage, DistrictYear};

use crate::ClimateError;

const COUNTRY_COL: &str = "country";
const DISTRICT_COL: &str = "district";
const YEAR_COL: &str = "year";

/// Writes averages for a variable.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_averages(
    writer: impl Write,
    variable: ClimateVariable,
    rows: &[DistrictAverage],
) -> Result<(), ClimateError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([COUNTRY_COL, DISTRICT_COL, YEAR_COL, variable.value_column()])?;
    for row in rows {
        csv_writer.write_record([
            row.key.country.as_str(),
            row.key.district.as_str(),
            &row.key.year.to_string(),
            &row.value.to_string(),
        ])?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Reads an average table for a variable into a keyed map.
///
/// Rows with an unparsable year or value are skipped. Extra columns are
/// ignored.
///
/// # Errors
///
/// Returns [`ClimateError::MissingColumn`] if a required header is absent.
pub fn read_averages(
    reader: impl Read,
    variable: ClimateVariable,
) -> Result<BTreeMap<DistrictYear, f64>, ClimateError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let position = |column: &str| {
        headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| ClimateError::MissingColumn {
                column: column.to_string(),
            })
    };
    let country_idx = position(COUNTRY_COL)?;
    let district_idx = position(DISTRICT_COL)?;
    let year_idx = position(YEAR_COL)?;
    let value_idx = position(variable.value_column())?;

    let mut averages = BTreeMap::new();
    for result in csv_reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                log::trace!("  skipping malformed average row: {e}");
                continue;
            }
        };
        let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or_default();

        let (Ok(year), Ok(value)) = (field(year_idx).parse::<i32>(), field(value_idx).parse::<f64>())
        else {
            log::trace!("  skipping average row with bad year/value: {record:?}");
            continue;
        };

        averages.insert(
            DistrictYear {
                country: field(country_idx).to_string(),
                district: field(district_idx).to_string(),
                year,
            },
            value,
        );
    }

    log::debug!("Read {} {variable} averages", averages.len());
    Ok(averages)
}
