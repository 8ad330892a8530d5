use crate::domain::models::CycleEntry;
use chrono::{Duration, NaiveDate};

pub const MAX_HISTORY_ENTRIES: usize = 24;

// Gaps and durations outside these exclusive bounds are treated as logging
// noise and excluded from the averages.
const MIN_CYCLE_GAP_DAYS: i64 = 15;
const MAX_CYCLE_GAP_DAYS: i64 = 60;
const MIN_PERIOD_DAYS: i64 = 1;
const MAX_PERIOD_DAYS: i64 = 15;

/// Insert one entry into the ledger: newest-first order, one entry per start
/// date, capped to the most recent `MAX_HISTORY_ENTRIES`. When two entries
/// share a start date the kept one absorbs the end date and plan snapshot the
/// other carries.
pub fn merge_history(history: &[CycleEntry], entry: CycleEntry) -> Vec<CycleEntry> {
    let mut merged = Vec::with_capacity(history.len() + 1);
    merged.push(entry);
    merged.extend(history.iter().cloned());
    merged.sort_by(|left, right| right.start_date.cmp(&left.start_date));
    merged.dedup_by(|removed, kept| {
        if removed.start_date != kept.start_date {
            return false;
        }
        if kept.end_date.is_none() {
            kept.end_date = removed.end_date.take();
        }
        if kept.plan_snapshot.is_none() {
            kept.plan_snapshot = removed.plan_snapshot.take();
        }
        true
    });
    merged.truncate(MAX_HISTORY_ENTRIES);
    merged
}

/// Attach an end date to the most recent entry that started on or before it.
/// Returns `None` when no entry qualifies.
pub fn attach_period_end(history: &[CycleEntry], end_date: NaiveDate) -> Option<Vec<CycleEntry>> {
    let index = history
        .iter()
        .position(|entry| entry.start_date <= end_date)?;
    let mut updated = history.to_vec();
    updated[index].end_date = Some(end_date);
    Some(updated)
}

/// Rounded mean of the gaps between consecutive period starts, ignoring
/// outliers. `None` when no gap qualifies.
pub fn average_cycle_length(history: &[CycleEntry]) -> Option<u32> {
    let gaps = history
        .windows(2)
        .map(|pair| (pair[0].start_date - pair[1].start_date).num_days())
        .filter(|gap| *gap > MIN_CYCLE_GAP_DAYS && *gap < MAX_CYCLE_GAP_DAYS)
        .collect::<Vec<_>>();
    rounded_mean(&gaps)
}

/// Rounded mean of recorded period durations, ignoring outliers.
pub fn average_period_length(history: &[CycleEntry]) -> Option<u32> {
    let durations = history
        .iter()
        .filter_map(CycleEntry::period_days)
        .filter(|days| *days > MIN_PERIOD_DAYS && *days < MAX_PERIOD_DAYS)
        .collect::<Vec<_>>();
    rounded_mean(&durations)
}

/// 1-indexed day within the recurring cycle, always in `[1, cycle_length]`
/// whichever side of the start date the target date falls on.
pub fn current_cycle_day(date: NaiveDate, last_start: NaiveDate, cycle_length: u32) -> u32 {
    let length = i64::from(cycle_length.max(1));
    let diff = (date - last_start).num_days();
    (diff.rem_euclid(length) + 1) as u32
}

pub fn days_since_start(date: NaiveDate, last_start: NaiveDate) -> i64 {
    (date - last_start).num_days()
}

/// First projected period start strictly after the given date, assuming the
/// cycle keeps its current length.
pub fn next_period_estimate(
    date: NaiveDate,
    last_start: NaiveDate,
    cycle_length: u32,
) -> NaiveDate {
    let length = i64::from(cycle_length.max(1));
    let completed = (date - last_start).num_days().div_euclid(length);
    last_start + Duration::days((completed + 1) * length)
}

fn rounded_mean(values: &[i64]) -> Option<u32> {
    if values.is_empty() {
        return None;
    }
    let sum: i64 = values.iter().sum();
    Some((sum as f64 / values.len() as f64).round() as u32)
}
