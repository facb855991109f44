//! Grouped correlation reports and their artifacts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cchf_map_analytics_models::{
    ColumnId, GroupId, GroupReport, JoinedRow, MissingPolicy, ReportOutcome,
};

use crate::AnalyticsError;
use crate::correlation::{apply_policy, correlate};
use crate::heatmap::render_svg;

/// How rows are split into report groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// One group per country. `include_cattle` only affects artifact names.
    Country {
        /// Whether the cattle column is part of the analysis.
        include_cattle: bool,
    },
    /// One group per `(country, district)`. Rows without a district are
    /// left out.
    District,
}

/// A correlation report to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    /// Columns to correlate, in matrix order.
    pub columns: Vec<ColumnId>,
    /// Missing-data policy applied before grouping.
    pub policy: MissingPolicy,
    /// Grouping and naming.
    pub grouping: Grouping,
}

fn file_component(name: &str) -> String {
    name.trim().replace(['/', '\\'], "-")
}

/// Artifact path for a group. Depends only on the group and request.
#[must_use]
pub fn artifact_path(plots_dir: &Path, group: &GroupId, request: &ReportRequest) -> PathBuf {
    let country = file_component(&group.country);
    let file_name = match (request.grouping, &group.district) {
        (Grouping::District, Some(district)) => {
            let suffix = match request.policy {
                MissingPolicy::Drop => "_removed_nas",
                MissingPolicy::FillZero => "",
            };
            format!(
                "{country}_{}_district_data_correlation_matrix{suffix}.svg",
                file_component(district)
            )
        }
        (Grouping::Country { include_cattle: true }, _) => {
            format!("{country}_includes_cattle_data_data_correlation_matrix.svg")
        }
        _ => format!("{country}_data_correlation_matrix.svg"),
    };
    plots_dir.join(file_name)
}

/// Splits rows into report groups, ordered by group id.
#[must_use]
pub fn group_rows(rows: Vec<JoinedRow>, grouping: Grouping) -> BTreeMap<GroupId, Vec<JoinedRow>> {
    let mut groups: BTreeMap<GroupId, Vec<JoinedRow>> = BTreeMap::new();
    for row in rows {
        let district = match grouping {
            Grouping::Country { .. } => None,
            Grouping::District => match &row.district {
                Some(d) => Some(d.clone()),
                None => continue,
            },
        };
        groups
            .entry(GroupId {
                country: row.country.clone(),
                district,
            })
            .or_default()
            .push(row);
    }
    groups
}

/// Runs a report: applies the missing-data policy to all rows, then
/// computes and renders one matrix per group.
///
/// Degenerate groups are returned as [`ReportOutcome::Skipped`] and write
/// nothing.
///
/// # Errors
///
/// Returns [`AnalyticsError::Artifact`] if the plots directory or an
/// artifact cannot be written.
pub fn report(
    rows: &[JoinedRow],
    request: &ReportRequest,
    plots_dir: &Path,
) -> Result<Vec<GroupReport>, AnalyticsError> {
    let prepared = apply_policy(rows, &request.columns, request.policy);
    let groups = group_rows(prepared, request.grouping);

    let mut reports = Vec::with_capacity(groups.len());
    for (group, members) in groups {
        let outcome = match correlate(&members, &request.columns) {
            Ok(matrix) => {
                log::info!("{group} correlation matrix:\n{matrix}");
                let artifact = artifact_path(plots_dir, &group, request);
                let svg = render_svg(&format!("{group} Correlation Matrix"), &matrix);
                write_artifact(&artifact, &svg)?;
                ReportOutcome::Rendered { matrix, artifact }
            }
            Err(reason) => {
                log::warn!("Skipping {group}: {reason}");
                ReportOutcome::Skipped { reason }
            }
        };
        reports.push(GroupReport {
            group,
            rows: members.len(),
            outcome,
        });
    }

    let rendered = reports
        .iter()
        .filter(|r| matches!(r.outcome, ReportOutcome::Rendered { .. }))
        .count();
    log::info!(
        "Rendered {rendered} of {} correlation groups",
        reports.len()
    );
    Ok(reports)
}

fn write_artifact(path: &Path, contents: &str) -> Result<(), AnalyticsError> {
    let to_error = |source| AnalyticsError::Artifact {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(to_error)?;
    }
    std::fs::write(path, contents).map_err(to_error)
}
