//! Yearly output tables.

use std::io::{Read, Write};

use cchf_map_outbreak_models::{YearlyRecord, YearlyRow};

use crate::OutbreakError;
use crate::districts::DistrictCoordinates;

/// Flattens records into output rows, attaching district coordinates when
/// a lookup is given.
#[must_use]
pub fn to_rows(records: &[YearlyRecord], coordinates: Option<&DistrictCoordinates>) -> Vec<YearlyRow> {
    let mut rows: Vec<YearlyRow> = records.iter().map(YearlyRow::from).collect();
    if let Some(coordinates) = coordinates {
        coordinates.attach(&mut rows);
    }
    rows
}

/// Writes yearly rows as CSV.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_yearly(writer: impl Write, rows: &[YearlyRow]) -> Result<(), OutbreakError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Reads yearly rows written by [`write_yearly`].
///
/// # Errors
///
/// Returns an error on the first row that does not deserialize.
pub fn read_yearly(reader: impl Read) -> Result<Vec<YearlyRow>, OutbreakError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let rows = csv_reader
        .deserialize::<YearlyRow>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
