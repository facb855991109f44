#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Joined yearly rows and correlation report types.
//!
//! A [`JoinedRow`] combines reconciled case and death totals with the
//! optional augmentation columns. Missing augmentation data stays `None`
//! until a [`MissingPolicy`] decides whether to drop or zero it.

use std::fmt;
use std::path::PathBuf;

use cchf_map_climate_models::ClimateVariable;
use cchf_map_outbreak_models::YearlyRow;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A numeric column of [`JoinedRow`] that can enter a correlation.
///
/// String forms are the table headers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum ColumnId {
    /// Calendar year.
    #[strum(serialize = "year")]
    #[serde(rename = "year")]
    Year,
    /// Reconciled case total.
    #[strum(serialize = "total cases")]
    #[serde(rename = "total cases")]
    TotalCases,
    /// Reconciled death total.
    #[strum(serialize = "total deaths")]
    #[serde(rename = "total deaths")]
    TotalDeaths,
    /// Live cattle head count.
    #[strum(serialize = "Num of cattle")]
    #[serde(rename = "Num of cattle")]
    Cattle,
    /// Country population.
    #[strum(serialize = "Population")]
    #[serde(rename = "Population")]
    Population,
    /// Yearly mean vegetation index.
    #[strum(serialize = "Avg. NVDI Val")]
    #[serde(rename = "Avg. NVDI Val")]
    Vegetation,
    /// Yearly mean precipitation flux.
    #[strum(serialize = "PRECTOTLAND kg m-2 s-1")]
    #[serde(rename = "PRECTOTLAND kg m-2 s-1")]
    Precipitation,
    /// Yearly mean temperature.
    #[strum(serialize = "temperature in (K)")]
    #[serde(rename = "temperature in (K)")]
    Temperature,
}

impl ColumnId {
    /// Column holding a climate variable's yearly average.
    #[must_use]
    pub const fn climate(variable: ClimateVariable) -> Self {
        match variable {
            ClimateVariable::Vegetation => Self::Vegetation,
            ClimateVariable::Precipitation => Self::Precipitation,
            ClimateVariable::Temperature => Self::Temperature,
        }
    }

    /// Columns correlated per country.
    #[must_use]
    pub fn country_set(include_cattle: bool) -> Vec<Self> {
        let mut columns = vec![
            Self::Year,
            Self::TotalCases,
            Self::TotalDeaths,
            Self::Population,
        ];
        if include_cattle {
            columns.push(Self::Cattle);
        }
        columns
    }

    /// Columns correlated per district.
    pub const DISTRICT_SET: &[Self] = &[
        Self::TotalCases,
        Self::TotalDeaths,
        Self::Vegetation,
        Self::Temperature,
        Self::Precipitation,
    ];
}

/// One `(entity, year)` row after augmentation and joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRow {
    /// Disease name.
    #[serde(rename = "diseasename")]
    pub disease: Option<String>,
    /// Country name.
    pub country: String,
    /// District name for district-level rows.
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
    /// Cattle head count, `None` on a lookup miss.
    #[serde(rename = "Num of cattle")]
    pub cattle: Option<f64>,
    /// Population, `None` on a lookup miss.
    #[serde(rename = "Population")]
    pub population: Option<f64>,
    /// Yearly mean vegetation index.
    #[serde(rename = "Avg. NVDI Val")]
    pub vegetation: Option<f64>,
    /// Yearly mean precipitation flux.
    #[serde(rename = "PRECTOTLAND kg m-2 s-1")]
    pub precipitation: Option<f64>,
    /// Yearly mean temperature.
    #[serde(rename = "temperature in (K)")]
    pub temperature: Option<f64>,
}

impl From<YearlyRow> for JoinedRow {
    fn from(row: YearlyRow) -> Self {
        Self {
            disease: row.disease,
            country: row.country,
            district: row.district,
            lat: row.lat,
            lon: row.lon,
            year: row.year,
            total_cases: row.total_cases,
            total_deaths: row.total_deaths,
            cattle: None,
            population: None,
            vegetation: None,
            precipitation: None,
            temperature: None,
        }
    }
}

impl JoinedRow {
    /// Value of a numeric column.
    #[must_use]
    pub fn value(&self, column: ColumnId) -> Option<f64> {
        match column {
            ColumnId::Year => Some(f64::from(self.year)),
            ColumnId::TotalCases => Some(self.total_cases),
            ColumnId::TotalDeaths => Some(self.total_deaths),
            ColumnId::Cattle => self.cattle,
            ColumnId::Population => self.population,
            ColumnId::Vegetation => self.vegetation,
            ColumnId::Precipitation => self.precipitation,
            ColumnId::Temperature => self.temperature,
        }
    }

    /// Mutable slot of an optional column; `None` for always-present ones.
    pub const fn slot_mut(&mut self, column: ColumnId) -> Option<&mut Option<f64>> {
        match column {
            ColumnId::Year | ColumnId::TotalCases | ColumnId::TotalDeaths => None,
            ColumnId::Cattle => Some(&mut self.cattle),
            ColumnId::Population => Some(&mut self.population),
            ColumnId::Vegetation => Some(&mut self.vegetation),
            ColumnId::Precipitation => Some(&mut self.precipitation),
            ColumnId::Temperature => Some(&mut self.temperature),
        }
    }

    /// Whether every listed column has a finite value.
    #[must_use]
    pub fn is_complete(&self, columns: &[ColumnId]) -> bool {
        columns
            .iter()
            .all(|c| self.value(*c).is_some_and(f64::is_finite))
    }
}

/// What to do with rows that miss a selected column before correlating.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MissingPolicy {
    /// Drop rows with any missing selected value.
    #[default]
    Drop,
    /// Treat missing selected values as zero.
    FillZero,
}

/// Identity of one correlation group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId {
    /// Country of the group.
    pub country: String,
    /// District, for per-district groups.
    pub district: Option<String>,
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.district {
            Some(district) => write!(f, "{}'s {district}", self.country),
            None => write!(f, "{}", self.country),
        }
    }
}

/// Pearson correlation over a fixed column list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    /// Row and column labels, in order.
    pub columns: Vec<ColumnId>,
    /// Row-major coefficients, `columns.len()` squared.
    pub values: Vec<f64>,
}

impl CorrelationMatrix {
    /// Number of columns.
    #[must_use]
    pub fn size(&self) -> usize {
        self.columns.len()
    }

    /// Coefficient between columns `i` and `j`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.size() + j]
    }

    /// Coefficient between two named columns, if both are present.
    #[must_use]
    pub fn between(&self, a: ColumnId, b: ColumnId) -> Option<f64> {
        let i = self.columns.iter().position(|c| *c == a)?;
        let j = self.columns.iter().position(|c| *c == b)?;
        Some(self.get(i, j))
    }
}

impl fmt::Display for CorrelationMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .columns
            .iter()
            .map(|c| c.as_ref().len())
            .max()
            .unwrap_or(0);
        write!(f, "{:width$}", "")?;
        for column in &self.columns {
            write!(f, "  {:>width$}", column.as_ref())?;
        }
        for (i, row) in self.columns.iter().enumerate() {
            writeln!(f)?;
            write!(f, "{:<width$}", row.as_ref())?;
            for j in 0..self.size() {
                write!(f, "  {:>width$.6}", self.get(i, j))?;
            }
        }
        Ok(())
    }
}

/// Why a group produced no matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Fewer than two rows survived the missing-data policy.
    TooFewRows {
        /// Rows available.
        rows: usize,
    },
    /// A column is constant, so its correlation is undefined.
    ZeroVariance {
        /// The constant column.
        column: ColumnId,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewRows { rows } => write!(f, "only {rows} usable rows"),
            Self::ZeroVariance { column } => write!(f, "column '{column}' has zero variance"),
        }
    }
}

/// Result of reporting one group.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// A matrix was computed and its heatmap written.
    Rendered {
        /// The computed matrix.
        matrix: CorrelationMatrix,
        /// Path of the heatmap artifact.
        artifact: PathBuf,
    },
    /// The group was degenerate and no artifact was written.
    Skipped {
        /// Why the group was skipped.
        reason: SkipReason,
    },
}

/// Outcome for one group, with the rows it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupReport {
    /// The group.
    pub group: GroupId,
    /// Rows in the group after the missing-data policy.
    pub rows: usize,
    /// What happened.
    pub outcome: ReportOutcome,
}
