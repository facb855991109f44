#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Disease notification and reconciled yearly record types.
//!
//! A [`NotificationRecord`] is one raw outbreak report as resolved by the
//! upstream text annotator. The aggregator collapses many of them into a
//! single [`YearlyRecord`] per [`EntityKey`] and calendar year.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Composite identity that every yearly record is grouped under.
///
/// Field order drives the derived ordering, which is the canonical output
/// sort: country, disease, district.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    /// Country name as it appears in the notification table.
    pub country: String,
    /// Disease name, absent when the source does not distinguish diseases.
    pub disease: Option<String>,
    /// District name for district-level aggregation, absent for
    /// country-level aggregation.
    pub district: Option<String>,
}

impl EntityKey {
    /// Creates a country-level key.
    #[must_use]
    pub fn country(country: impl Into<String>, disease: Option<String>) -> Self {
        Self {
            country: country.into(),
            disease,
            district: None,
        }
    }

    /// Creates a district-level key.
    #[must_use]
    pub fn district(
        country: impl Into<String>,
        disease: Option<String>,
        district: impl Into<String>,
    ) -> Self {
        Self {
            country: country.into(),
            disease,
            district: Some(district.into()),
        }
    }
}

/// Flat `(entity, year)` key of the aggregation state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    /// Entity the record belongs to.
    pub entity: EntityKey,
    /// Calendar year.
    pub year: i32,
}

/// One raw disease report.
///
/// Counts are optional because a report states either a delta since the
/// previous report, a running yearly total, both, or neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Entity the report is about.
    pub entity_key: EntityKey,
    /// Date the report was issued.
    pub issue_date: NaiveDate,
    /// New cases reported since the previous report.
    pub incremental_cases: Option<f64>,
    /// New deaths reported since the previous report.
    pub incremental_deaths: Option<f64>,
    /// Running total of cases for the calendar year of `issue_date`.
    pub cumulative_cases_this_year: Option<f64>,
    /// Running total of deaths for the calendar year of `issue_date`.
    pub cumulative_deaths_this_year: Option<f64>,
}

impl NotificationRecord {
    /// Calendar year the report counts toward.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.issue_date.year()
    }

    /// Aggregation key for this report.
    #[must_use]
    pub fn record_key(&self) -> RecordKey {
        RecordKey {
            entity: self.entity_key.clone(),
            year: self.year(),
        }
    }
}

/// Returns the count if it is present, finite and non-negative.
///
/// Anything else is treated as "no data" by the aggregator.
#[must_use]
pub fn valid_count(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

/// The reconciled total for one entity in one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyRecord {
    /// Entity the totals belong to.
    pub entity_key: EntityKey,
    /// Calendar year.
    pub year: i32,
    /// Reconciled case total, never negative.
    pub total_cases: f64,
    /// Reconciled death total, never negative.
    pub total_deaths: f64,
    /// Latest issue date folded into this record.
    pub last_issue_date: NaiveDate,
}

impl YearlyRecord {
    /// Aggregation key for this record.
    #[must_use]
    pub fn record_key(&self) -> RecordKey {
        RecordKey {
            entity: self.entity_key.clone(),
            year: self.year,
        }
    }
}

/// One row of the annotated notification table.
///
/// Cells are kept as text so a table can be re-written with a `district`
/// column added without disturbing the annotator's formatting. Parsing
/// into a [`NotificationRecord`] happens in the behaviour crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRow {
    /// Disease name.
    #[serde(rename = "diseasename", default)]
    pub disease: Option<String>,
    /// Free-text place of the outbreak.
    #[serde(default)]
    pub place: Option<String>,
    /// Country name.
    pub country: String,
    /// Country latitude.
    #[serde(default)]
    pub lat: Option<String>,
    /// Country longitude.
    #[serde(default)]
    pub lon: Option<String>,
    /// Report summary.
    #[serde(default)]
    pub summary: Option<String>,
    /// Issue date, `%Y-%m-%d` or `%m/%d/%Y`.
    pub issue_date: String,
    /// Region or city named in the report.
    #[serde(rename = "region/city", default)]
    pub region_city: Option<String>,
    /// Latitude of the region or city.
    #[serde(rename = "region/city lat", default)]
    pub region_city_lat: Option<String>,
    /// Longitude of the region or city.
    #[serde(rename = "region/city lon", default)]
    pub region_city_lon: Option<String>,
    /// Incremental cases.
    #[serde(default)]
    pub cases: Option<String>,
    /// Incremental deaths.
    #[serde(default)]
    pub deaths: Option<String>,
    /// Cumulative cases this year.
    #[serde(rename = "total cases", default)]
    pub total_cases: Option<String>,
    /// Cumulative deaths this year.
    #[serde(rename = "total deaths", default)]
    pub total_deaths: Option<String>,
    /// District assigned by point-in-polygon binning.
    #[serde(default)]
    pub district: Option<String>,
}

/// A reconciled yearly record as written to the output table.
///
/// Column names match the historical analysis tables so downstream
/// consumers keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyRow {
    /// Disease name.
    #[serde(rename = "diseasename")]
    pub disease: Option<String>,
    /// Country name.
    pub country: String,
    /// District name (district-level tables only).
    pub district: Option<String>,
    /// Latitude of the first city seen in the district.
    #[serde(rename = "region/city lat")]
    pub lat: Option<f64>,
    /// Longitude of the first city seen in the district.
    #[serde(rename = "region/city lon")]
    pub lon: Option<f64>,
    /// Calendar year.
    pub year: i32,
    /// Reconciled case total.
    #[serde(rename = "total cases")]
    pub total_cases: f64,
    /// Reconciled death total.
    #[serde(rename = "total deaths")]
    pub total_deaths: f64,
}

impl From<&YearlyRecord> for YearlyRow {
    fn from(record: &YearlyRecord) -> Self {
        Self {
            disease: record.entity_key.disease.clone(),
            country: record.entity_key.country.clone(),
            district: record.entity_key.district.clone(),
            lat: None,
            lon: None,
            year: record.year,
            total_cases: record.total_cases,
            total_deaths: record.total_deaths,
        }
    }
}

impl YearlyRow {
    /// Entity key this row was produced for.
    #[must_use]
    pub fn entity_key(&self) -> EntityKey {
        EntityKey {
            country: self.country.clone(),
            disease: self.disease.clone(),
            district: self.district.clone(),
        }
    }
}
