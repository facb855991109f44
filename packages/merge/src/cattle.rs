//! Cattle head counts by `(country, year)`.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use cchf_map_analytics_models::JoinedRow;
use serde::Deserialize;

use crate::MergeError;

#[derive(Debug, Deserialize)]
struct CattleRow {
    #[serde(rename = "Entity")]
    entity: String,
    #[serde(rename = "Year")]
    year: i32,
    #[serde(
        rename = "Live Animals - Cattle - 866 - Stocks - 5111 - Head",
        deserialize_with = "csv::invalid_option"
    )]
    head: Option<f64>,
}

/// Cattle counts keyed by exact country name and year.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CattleTable {
    counts: BTreeMap<(String, i32), f64>,
}

impl CattleTable {
    /// Reads the livestock table. The first row for a key wins; rows with
    /// no count are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be read.
    pub fn read(reader: impl Read) -> Result<Self, MergeError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        csv_reader.headers()?;

        let mut counts = BTreeMap::new();
        for result in csv_reader.deserialize::<CattleRow>() {
            let row = match result {
                Ok(r) => r,
                Err(e) => {
                    log::trace!("  skipping malformed cattle row: {e}");
                    continue;
                }
            };
            let Some(head) = row.head else {
                continue;
            };
            counts.entry((row.entity, row.year)).or_insert(head);
        }
        Ok(Self { counts })
    }

    /// Reads the livestock table from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its header read.
    pub fn load(path: &Path) -> Result<Self, MergeError> {
        let table = Self::read(std::fs::File::open(path)?)?;
        log::info!("Read {} cattle counts from {}", table.len(), path.display());
        Ok(table)
    }

    /// Number of `(country, year)` counts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Count for a country and year.
    #[must_use]
    pub fn get(&self, country: &str, year: i32) -> Option<f64> {
        self.counts.get(&(country.to_string(), year)).copied()
    }
}

/// Sets each row's cattle count, leaving it `None` on a miss. Returns the
/// number of misses.
pub fn augment_cattle(rows: &mut [JoinedRow], table: &CattleTable) -> usize {
    let mut misses = 0;
    for row in rows.iter_mut() {
        row.cattle = table.get(&row.country, row.year);
        if row.cattle.is_none() {
            misses += 1;
        }
    }
    if misses > 0 {
        log::info!("No cattle count for {misses} of {} rows", rows.len());
    }
    misses
}
