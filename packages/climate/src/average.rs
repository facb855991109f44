//! Yearly per-district averaging of binned measurement points.

use std::collections::BTreeMap;

use cchf_map_climate_models::{DistrictAverage, DistrictYear, MeasurementPoint, SentinelFilter};

use crate::ClimateError;

#[derive(Default)]
struct Accumulator {
    sum: f64,
    count: u64,
}

/// Averages point values per `(country, district, year)`.
///
/// Points without a district are ignored. Within a group, values for
/// which `exclude` returns `true` do not contribute; with no predicate
/// every value does.
///
/// # Errors
///
/// Returns [`ClimateError::EmptyGroup`] if a group has points but none
/// survive exclusion. Callers that want such groups silently dropped run
/// [`drop_excluded`] first.
pub fn average_by_district(
    points: &[MeasurementPoint],
    exclude: Option<&dyn Fn(f64) -> bool>,
) -> Result<BTreeMap<DistrictYear, f64>, ClimateError> {
    let mut groups: BTreeMap<DistrictYear, Accumulator> = BTreeMap::new();

    for point in points {
        let Some(district) = &point.district else {
            continue;
        };

        let acc = groups
            .entry(DistrictYear {
                country: point.country.clone(),
                district: district.clone(),
                year: point.year,
            })
            .or_default();

        if exclude.is_some_and(|excluded| excluded(point.value)) {
            continue;
        }
        acc.sum += point.value;
        acc.count += 1;
    }

    groups
        .into_iter()
        .map(|(key, acc)| {
            if acc.count == 0 {
                return Err(ClimateError::EmptyGroup {
                    country: key.country,
                    district: key.district,
                    year: key.year,
                });
            }
            #[allow(clippy::cast_precision_loss)]
            let mean = acc.sum / acc.count as f64;
            Ok((key, mean))
        })
        .collect()
}

/// Averages with a [`SentinelFilter`] as the exclusion predicate.
///
/// # Errors
///
/// See [`average_by_district`].
pub fn average_with_filter(
    points: &[MeasurementPoint],
    filter: SentinelFilter,
) -> Result<BTreeMap<DistrictYear, f64>, ClimateError> {
    match filter {
        SentinelFilter::None => average_by_district(points, None),
        SentinelFilter::Below(_) => {
            let predicate: &dyn Fn(f64) -> bool = &move |value| filter.excludes(value);
            average_by_district(points, Some(predicate))
        }
    }
}

/// Removes points the filter excludes, so that every group left has at
/// least one contributing value.
#[must_use]
pub fn drop_excluded(points: Vec<MeasurementPoint>, filter: SentinelFilter) -> Vec<MeasurementPoint> {
    let before = points.len();
    let kept: Vec<MeasurementPoint> = points
        .into_iter()
        .filter(|p| !filter.excludes(p.value))
        .collect();
    if kept.len() < before {
        log::debug!("Dropped {} sentinel values", before - kept.len());
    }
    kept
}

/// Flattens an average map into rows, in key order.
#[must_use]
pub fn into_rows(averages: BTreeMap<DistrictYear, f64>) -> Vec<DistrictAverage> {
    averages
        .into_iter()
        .map(|(key, value)| DistrictAverage { key, value })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(district: Option<&str>, year: i32, value: f64) -> MeasurementPoint {
        MeasurementPoint {
            country: "Pakistan".to_string(),
            lat: 30.0,
            lon: 70.0,
            value,
            year,
            month: 1,
            district: district.map(ToString::to_string),
        }
    }

    fn key(district: &str, year: i32) -> DistrictYear {
        DistrictYear {
            country: "Pakistan".to_string(),
            district: district.to_string(),
            year,
        }
    }

    #[test]
    fn sentinel_values_are_excluded_from_the_mean() {
        let points = vec![
            point(Some("Quetta"), 2015, -15000.0),
            point(Some("Quetta"), 2015, 20.0),
            point(Some("Quetta"), 2015, 30.0),
        ];
        let averages = average_with_filter(&points, SentinelFilter::Below(-12000.0)).unwrap();
        assert!((averages[&key("Quetta", 2015)] - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn no_predicate_averages_everything() {
        let points = vec![
            point(Some("Quetta"), 2015, -15000.0),
            point(Some("Quetta"), 2015, 20.0),
            point(Some("Quetta"), 2015, 30.0),
        ];
        let averages = average_by_district(&points, None).unwrap();
        let expected = (-15000.0 + 20.0 + 30.0) / 3.0;
        assert!((averages[&key("Quetta", 2015)] - expected).abs() < 1e-9);
    }

    #[test]
    fn groups_by_district_and_year_and_drops_unbinned_points() {
        let points = vec![
            point(Some("Quetta"), 2015, 10.0),
            point(Some("Quetta"), 2016, 40.0),
            point(Some("Karachi"), 2015, 2.0),
            point(Some("Karachi"), 2015, 4.0),
            point(None, 2015, 1000.0),
        ];
        let averages = average_by_district(&points, None).unwrap();
        assert_eq!(averages.len(), 3);
        assert!((averages[&key("Quetta", 2015)] - 10.0).abs() < f64::EPSILON);
        assert!((averages[&key("Quetta", 2016)] - 40.0).abs() < f64::EPSILON);
        assert!((averages[&key("Karachi", 2015)] - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn all_excluded_group_is_an_error() {
        let points = vec![
            point(Some("Quetta"), 2015, -15000.0),
            point(Some("Karachi"), 2015, 5.0),
        ];
        let err = average_with_filter(&points, SentinelFilter::Below(-12000.0)).unwrap_err();
        assert!(matches!(err, ClimateError::EmptyGroup { ref district, .. } if district == "Quetta"));
    }

    #[test]
    fn dropping_excluded_points_first_avoids_empty_groups() {
        let points = vec![
            point(Some("Quetta"), 2015, -15000.0),
            point(Some("Karachi"), 2015, 5.0),
        ];
        let filter = SentinelFilter::Below(-12000.0);
        let kept = drop_excluded(points, filter);
        let rows = into_rows(average_with_filter(&kept, filter).unwrap());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key.district, "Karachi");
    }
}
