#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Correlation reporting over joined yearly rows.
//!
//! Rows are passed through a missing-data policy, split into per-country
//! or per-district groups, and reduced to a Pearson matrix per group.
//! Degenerate groups come back as [`ReportOutcome::Skipped`] instead of
//! failing the run.
//!
//! [`ReportOutcome::Skipped`]: cchf_map_analytics_models::ReportOutcome::Skipped

pub mod correlation;
pub mod heatmap;
pub mod report;

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while writing reports.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// An artifact could not be written.
    #[error("Failed to write {path}: {source}")]
    Artifact {
        /// Target path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}
