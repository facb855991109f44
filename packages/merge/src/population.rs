//! Population by country with one column per year.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use cchf_map_analytics_models::JoinedRow;

use crate::MergeError;

const COUNTRY_COL: &str = "Country Name";

/// Population keyed by trimmed country name, then year.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationTable {
    by_country: BTreeMap<String, BTreeMap<i32, f64>>,
}

impl PopulationTable {
    /// Reads a wide population table.
    ///
    /// Headers that parse as a year become year columns; any other
    /// header besides `Country Name` is ignored. Only the first row for a
    /// country is used.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::MissingColumn`] if there is no `Country Name`
    /// column.
    pub fn read(reader: impl Read) -> Result<Self, MergeError> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let country_idx = headers
            .iter()
            .position(|h| h.trim() == COUNTRY_COL)
            .ok_or_else(|| MergeError::MissingColumn {
                table: "population",
                column: COUNTRY_COL.to_string(),
            })?;
        let year_columns: Vec<(usize, i32)> = headers
            .iter()
            .enumerate()
            .filter_map(|(idx, h)| h.trim().parse::<i32>().ok().map(|year| (idx, year)))
            .collect();

        let mut by_country = BTreeMap::new();
        for result in csv_reader.records() {
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    log::trace!("  skipping malformed population row: {e}");
                    continue;
                }
            };
            let Some(country) = record.get(country_idx).map(str::trim) else {
                continue;
            };
            if by_country.contains_key(country) {
                continue;
            }

            let years: BTreeMap<i32, f64> = year_columns
                .iter()
                .filter_map(|(idx, year)| {
                    let value = record.get(*idx)?.trim().parse::<f64>().ok()?;
                    value.is_finite().then_some((*year, value))
                })
                .collect();
            by_country.insert(country.to_string(), years);
        }

        Ok(Self { by_country })
    }

    /// Reads the population table from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or lacks the country
    /// column.
    pub fn load(path: &Path) -> Result<Self, MergeError> {
        let table = Self::read(std::fs::File::open(path)?)?;
        log::info!(
            "Read population for {} countries from {}",
            table.by_country.len(),
            path.display()
        );
        Ok(table)
    }

    /// Population of a country in a year. Surrounding whitespace in the
    /// country name is ignored.
    #[must_use]
    pub fn get(&self, country: &str, year: i32) -> Option<f64> {
        self.by_country.get(country.trim())?.get(&year).copied()
    }
}

/// Sets each row's population, leaving it `None` on a miss. Returns the
/// number of misses.
pub fn augment_population(rows: &mut [JoinedRow], table: &PopulationTable) -> usize {
    let mut misses = 0;
    for row in rows.iter_mut() {
        row.population = table.get(&row.country, row.year);
        if row.population.is_none() {
            misses += 1;
        }
    }
    if misses > 0 {
        log::info!("No population for {misses} of {} rows", rows.len());
    }
    misses
}

#[cfg(test)]
mod tests {
    use super::*;
    use cchf_map_outbreak_models::YearlyRow;

    const TABLE: &str = "\
Country Name,Country Code,Indicator Name,2015,2016,2017
 Pakistan ,PAK,\"Population, total\",199426964,203631353,
Serbia,SRB,\"Population, total\",7095383,7058322,7020858
Serbia,SRB,\"Population, total\",1,1,1
";

    fn row(country: &str, year: i32) -> JoinedRow {
        JoinedRow::from(YearlyRow {
            disease: None,
            country: country.to_string(),
            district: None,
            lat: None,
            lon: None,
            year,
            total_cases: 0.0,
            total_deaths: 0.0,
        })
    }

    #[test]
    fn reads_year_columns_and_trims_country_names() {
        let table = PopulationTable::read(TABLE.as_bytes()).unwrap();
        assert_eq!(table.get("Pakistan", 2016), Some(203_631_353.0));
        assert_eq!(table.get("Pakistan ", 2015), Some(199_426_964.0));
        assert_eq!(table.get("Pakistan", 2017), None);
        assert_eq!(table.get("Serbia", 2017), Some(7_020_858.0));
    }

    #[test]
    fn requires_a_country_column() {
        let err = PopulationTable::read("Country,2015\nSerbia,1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MergeError::MissingColumn { table: "population", .. }));
    }

    #[test]
    fn misses_are_marked_missing() {
        let table = PopulationTable::read(TABLE.as_bytes()).unwrap();
        let mut rows = vec![row(" Serbia", 2016), row("Afghanistan", 2016), row("Serbia", 1990)];
        assert_eq!(augment_population(&mut rows, &table), 2);
        assert_eq!(rows[0].population, Some(7_058_322.0));
        assert_eq!(rows[1].population, None);
        assert_eq!(rows.len(), 3);
    }
}
