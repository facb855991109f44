//! Missing-data policy and Pearson correlation.

use cchf_map_analytics_models::{
    ColumnId, CorrelationMatrix, JoinedRow, MissingPolicy, SkipReason,
};

/// Applies `policy` to the selected columns of every row.
///
/// Columns outside `columns` are left alone, so a missing cattle count
/// does not drop a row from a correlation that ignores cattle.
#[must_use]
pub fn apply_policy(rows: &[JoinedRow], columns: &[ColumnId], policy: MissingPolicy) -> Vec<JoinedRow> {
    let out: Vec<JoinedRow> = match policy {
        MissingPolicy::Drop => rows
            .iter()
            .filter(|row| row.is_complete(columns))
            .cloned()
            .collect(),
        MissingPolicy::FillZero => rows
            .iter()
            .cloned()
            .map(|mut row| {
                for column in columns {
                    if let Some(slot) = row
                        .slot_mut(*column)
                        .filter(|slot| !slot.is_some_and(f64::is_finite))
                    {
                        *slot = Some(0.0);
                    }
                }
                row
            })
            .collect(),
    };
    log::debug!(
        "Missing-data policy {policy}: {} of {} rows remain",
        out.len(),
        rows.len()
    );
    out
}

fn mean(values: &[f64]) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    values.iter().sum::<f64>() / n
}

/// Pearson coefficient of two equal-length series.
///
/// Returns `None` for fewer than two samples or when either series is
/// constant.
#[must_use]
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs);
    let my = mean(ys);

    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        cov = dx.mul_add(dy, cov);
        vx = dx.mul_add(dx, vx);
        vy = dy.mul_add(dy, vy);
    }
    if vx <= 0.0 || vy <= 0.0 {
        return None;
    }
    Some((cov / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0))
}

fn has_variance(values: &[f64]) -> bool {
    values
        .first()
        .is_some_and(|first| values.iter().any(|v| v != first))
}

/// Computes the correlation matrix of `columns` over complete rows.
///
/// # Errors
///
/// Returns a [`SkipReason`] if fewer than two rows are complete or a
/// column is constant.
pub fn correlate(rows: &[JoinedRow], columns: &[ColumnId]) -> Result<CorrelationMatrix, SkipReason> {
    let complete: Vec<&JoinedRow> = rows.iter().filter(|r| r.is_complete(columns)).collect();
    if complete.len() < 2 {
        return Err(SkipReason::TooFewRows {
            rows: complete.len(),
        });
    }

    let series: Vec<Vec<f64>> = columns
        .iter()
        .map(|column| {
            complete
                .iter()
                .filter_map(|row| row.value(*column))
                .collect()
        })
        .collect();

    if let Some(constant) = columns
        .iter()
        .zip(&series)
        .find(|(_, values)| !has_variance(values))
    {
        return Err(SkipReason::ZeroVariance { column: *constant.0 });
    }

    let n = columns.len();
    let mut values = vec![0.0; n * n];
    for i in 0..n {
        values[i * n + i] = 1.0;
        for j in (i + 1)..n {
            let r = pearson(&series[i], &series[j]).ok_or(SkipReason::ZeroVariance {
                column: columns[j],
            })?;
            values[i * n + j] = r;
            values[j * n + i] = r;
        }
    }

    Ok(CorrelationMatrix {
        columns: columns.to_vec(),
        values,
    })
}
