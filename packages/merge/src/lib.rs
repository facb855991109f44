#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Joining yearly tables onto reconciled outbreak totals.
//!
//! Two modes:
//!
//! - lookup augmentation ([`cattle`], [`population`]): every primary row
//!   is kept, and a lookup miss leaves the field `None`;
//! - strict inner join ([`join`]): climate averages are attached by exact
//!   `(country, district, year)` and unmatched rows are dropped.

pub mod cattle;
pub mod join;
pub mod population;

use std::io::{Read, Write};

use cchf_map_analytics_models::JoinedRow;
use thiserror::Error;

/// Errors that can occur while merging tables.
#[derive(Debug, Error)]
pub enum MergeError {
    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An input table lacks a required column.
    #[error("{table} table is missing column '{column}'")]
    MissingColumn {
        /// Which table.
        table: &'static str,
        /// Header that was expected.
        column: String,
    },
}

/// Writes joined rows as CSV.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_joined(writer: impl Write, rows: &[JoinedRow]) -> Result<(), MergeError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Reads joined rows written by [`write_joined`].
///
/// # Errors
///
/// Returns an error on the first row that does not deserialize.
pub fn read_joined(reader: impl Read) -> Result<Vec<JoinedRow>, MergeError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let rows = csv_reader
        .deserialize::<JoinedRow>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cchf_map_outbreak_models::YearlyRow;

    #[test]
    fn missing_fields_stay_missing_through_the_table() {
        let mut row = JoinedRow::from(YearlyRow {
            disease: Some("CCHF".to_string()),
            country: "Afghanistan".to_string(),
            district: None,
            lat: None,
            lon: None,
            year: 2017,
            total_cases: 237.0,
            total_deaths: 41.0,
        });
        row.population = Some(36_296_113.0);

        let mut buf = Vec::new();
        write_joined(&mut buf, std::slice::from_ref(&row)).unwrap();
        let back = read_joined(buf.as_slice()).unwrap();
        assert_eq!(back, vec![row]);
        assert_eq!(back[0].cattle, None);
    }
}
