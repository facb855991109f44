//! Strict `(country, district, year)` joins with climate averages.

use std::collections::BTreeMap;

use cchf_map_analytics_models::{ColumnId, JoinedRow};
use cchf_map_climate_models::{ClimateVariable, DistrictYear};

/// Inner-joins one climate variable onto district rows.
///
/// Rows without a district, or whose key has no average, are dropped.
#[must_use]
pub fn join_climate(
    rows: Vec<JoinedRow>,
    variable: ClimateVariable,
    averages: &BTreeMap<DistrictYear, f64>,
) -> Vec<JoinedRow> {
    let column = ColumnId::climate(variable);
    let before = rows.len();

    let joined: Vec<JoinedRow> = rows
        .into_iter()
        .filter_map(|mut row| {
            let key = DistrictYear {
                country: row.country.clone(),
                district: row.district.clone()?,
                year: row.year,
            };
            let value = *averages.get(&key)?;
            if let Some(slot) = row.slot_mut(column) {
                *slot = Some(value);
            }
            Some(row)
        })
        .collect();

    log::info!(
        "Joined {variable}: kept {} of {before} district rows",
        joined.len()
    );
    joined
}

/// Inner-joins every supplied climate table in turn.
#[must_use]
pub fn join_all(
    rows: Vec<JoinedRow>,
    tables: &[(ClimateVariable, BTreeMap<DistrictYear, f64>)],
) -> Vec<JoinedRow> {
    tables
        .iter()
        .fold(rows, |rows, (variable, averages)| {
            join_climate(rows, *variable, averages)
        })
}
