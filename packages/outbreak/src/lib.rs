#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Outbreak notification reconciliation.
//!
//! Annotated notifications are read from CSV, optionally assigned to a
//! district, and folded into one [`YearlyRecord`] per entity and year by
//! the [`aggregate`] state machine.
//!
//! [`YearlyRecord`]: cchf_map_outbreak_models::YearlyRecord

pub mod aggregate;
pub mod districts;
pub mod notifications;
pub mod table;

use thiserror::Error;

/// Errors that can occur while reconciling notifications.
#[derive(Debug, Error)]
pub enum OutbreakError {
    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A notification names a country with no loaded district index.
    #[error(transparent)]
    Spatial(#[from] cchf_map_spatial::SpatialError),
}
