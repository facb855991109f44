//! Folding notifications into yearly records.
//!
//! State is a flat map from `(entity, year)` to the record built so far.
//! For each incoming notification:
//!
//! - no record yet: seed each count from the cumulative total if valid,
//!   else the incremental count if valid, else zero;
//! - issued on or before the record's last issue date: discard;
//! - newer: a valid cumulative total overwrites, otherwise the incremental
//!   count (missing counts as zero) is added.
//!
//! Cases and deaths follow the rule independently. The discard rule
//! assumes a later-dated yearly total already absorbs every earlier
//! incremental report. That is a reporting heuristic, not a proven merge.

use std::collections::BTreeMap;

use cchf_map_outbreak_models::{NotificationRecord, RecordKey, YearlyRecord, valid_count};

/// What a single notification did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A new yearly record was seeded.
    Created,
    /// An existing record was overwritten or incremented.
    Updated,
    /// The notification was not newer than the record and was discarded.
    Stale,
}

/// Aggregation state keyed by `(entity, year)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationState {
    records: BTreeMap<RecordKey, YearlyRecord>,
}

impl AggregationState {
    /// Creates empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of yearly records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no notification has been folded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record for a key, if one exists.
    #[must_use]
    pub fn get(&self, key: &RecordKey) -> Option<&YearlyRecord> {
        self.records.get(key)
    }

    /// Applies one notification in place.
    pub fn apply(&mut self, notification: &NotificationRecord) -> Transition {
        let key = notification.record_key();

        let Some(existing) = self.records.get_mut(&key) else {
            let record = seed(notification, key.year);
            self.records.insert(key, record);
            return Transition::Created;
        };

        if notification.issue_date <= existing.last_issue_date {
            return Transition::Stale;
        }

        existing.total_cases = advance(
            existing.total_cases,
            notification.cumulative_cases_this_year,
            notification.incremental_cases,
        );
        existing.total_deaths = advance(
            existing.total_deaths,
            notification.cumulative_deaths_this_year,
            notification.incremental_deaths,
        );
        existing.last_issue_date = notification.issue_date;
        Transition::Updated
    }

    /// Consumes the state, yielding records sorted by country, disease,
    /// district and year.
    #[must_use]
    pub fn into_records(self) -> Vec<YearlyRecord> {
        self.records.into_values().collect()
    }
}

fn seed(notification: &NotificationRecord, year: i32) -> YearlyRecord {
    let first = |cumulative: Option<f64>, incremental: Option<f64>| {
        valid_count(cumulative)
            .or_else(|| valid_count(incremental))
            .unwrap_or(0.0)
    };

    YearlyRecord {
        entity_key: notification.entity_key.clone(),
        year,
        total_cases: first(
            notification.cumulative_cases_this_year,
            notification.incremental_cases,
        ),
        total_deaths: first(
            notification.cumulative_deaths_this_year,
            notification.incremental_deaths,
        ),
        last_issue_date: notification.issue_date,
    }
}

fn advance(current: f64, cumulative: Option<f64>, incremental: Option<f64>) -> f64 {
    valid_count(cumulative).unwrap_or_else(|| current + valid_count(incremental).unwrap_or(0.0))
}

/// Pure fold step: returns the state after applying one notification.
#[must_use]
pub fn fold(mut state: AggregationState, notification: &NotificationRecord) -> AggregationState {
    state.apply(notification);
    state
}

/// Folds a stream of notifications into sorted yearly records.
pub fn aggregate<'a, I>(notifications: I) -> Vec<YearlyRecord>
where
    I: IntoIterator<Item = &'a NotificationRecord>,
{
    let mut state = AggregationState::new();
    let mut created = 0u64;
    let mut updated = 0u64;
    let mut stale = 0u64;

    for notification in notifications {
        match state.apply(notification) {
            Transition::Created => created += 1,
            Transition::Updated => updated += 1,
            Transition::Stale => stale += 1,
        }
    }

    log::info!(
        "Aggregated {} yearly records ({created} seeded, {updated} updates)",
        state.len()
    );
    if stale > 0 {
        log::debug!("Discarded {stale} stale notifications");
    }

    state.into_records()
}
