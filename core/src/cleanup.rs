//! User-invoked history reduction.
//!
//! Passes run in a fixed order: by age, then duplicates, then by size, so
//! duplicate counts only reflect entries that survived the age cut.

use crate::entry::{Entry, Timestamp};
use chrono::{Months, TimeDelta};
use log::{info, warn};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().trim_end_matches('s') {
            "minute" => Ok(Self::Minutes),
            "hour" => Ok(Self::Hours),
            "day" => Ok(Self::Days),
            "week" => Ok(Self::Weeks),
            "month" => Ok(Self::Months),
            "year" => Ok(Self::Years),
            other => Err(format!("unknown time unit: {other}")),
        }
    }
}

/// How old an entry must be to be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeCriterion {
    /// Absolute cutoff.
    Before(Timestamp),
    /// Relative cutoff, `amount` units before now.
    Ago { amount: u32, unit: TimeUnit },
}

impl AgeCriterion {
    /// `None` when the criterion is unusable (zero amount, overflow).
    pub fn cutoff(&self, now: Timestamp) -> Option<Timestamp> {
        let (amount, unit) = match *self {
            AgeCriterion::Before(at) => return Some(at),
            AgeCriterion::Ago { amount: 0, .. } => return None,
            AgeCriterion::Ago { amount, unit } => (amount, unit),
        };

        let now = now.as_datetime();
        let amount_i64 = i64::from(amount);
        let cutoff = match unit {
            TimeUnit::Minutes => now.checked_sub_signed(TimeDelta::try_minutes(amount_i64)?),
            TimeUnit::Hours => now.checked_sub_signed(TimeDelta::try_hours(amount_i64)?),
            TimeUnit::Days => now.checked_sub_signed(TimeDelta::try_days(amount_i64)?),
            TimeUnit::Weeks => now.checked_sub_signed(TimeDelta::try_weeks(amount_i64)?),
            TimeUnit::Months => now.checked_sub_months(Months::new(amount)),
            TimeUnit::Years => now.checked_sub_months(Months::new(amount.checked_mul(12)?)),
        }?;
        Some(Timestamp::from_datetime(cutoff))
    }
}

/// Result of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    pub entries: Vec<Entry>,
    pub removed: usize,
}

/// Drops entries older than `cutoff`.
///
/// Input must be newest first: the scan stops at the first older entry and
/// everything after it is discarded unchecked. [`run`] re-sorts before
/// calling this.
pub fn by_age(mut entries: Vec<Entry>, cutoff: Timestamp) -> PassOutcome {
    let before = entries.len();
    if let Some(pos) = entries.iter().position(|e| e.timestamp < cutoff) {
        entries.truncate(pos);
    }
    PassOutcome {
        removed: before - entries.len(),
        entries,
    }
}

/// Keeps the first (newest) occurrence of every value.
pub fn dedupe(mut entries: Vec<Entry>) -> PassOutcome {
    let before = entries.len();
    let mut seen = HashSet::new();
    entries.retain(|e| seen.insert(e.value.clone()));
    PassOutcome {
        removed: before - entries.len(),
        entries,
    }
}

/// Drops entries longer than `threshold` characters.
pub fn by_size(mut entries: Vec<Entry>, threshold: usize) -> PassOutcome {
    let before = entries.len();
    entries.retain(|e| e.value.chars().count() <= threshold);
    PassOutcome {
        removed: before - entries.len(),
        entries,
    }
}

/// Stable-sorts newest first if needed. Returns true when a sort happened.
pub fn ensure_newest_first(entries: &mut [Entry]) -> bool {
    if entries.windows(2).all(|w| w[0].timestamp >= w[1].timestamp) {
        return false;
    }
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupOptions {
    pub remove_old: bool,
    pub age: Option<AgeCriterion>,
    pub remove_duplicates: bool,
    pub remove_big: bool,
    pub size_threshold: Option<usize>,
    /// Ask the caller to keep a copy of the history before it is reduced.
    pub backup: bool,
}

impl CleanupOptions {
    pub fn any_requested(&self) -> bool {
        self.remove_old || self.remove_duplicates || self.remove_big
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupWarning {
    /// Age cleanup requested without a usable criterion.
    MissingAgeCriterion,
    /// Size cleanup requested without a threshold.
    MissingSizeThreshold,
}

impl fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupWarning::MissingAgeCriterion => {
                write!(f, "age cleanup skipped: no valid date or period given")
            }
            CleanupWarning::MissingSizeThreshold => {
                write!(f, "size cleanup skipped: no threshold given")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub entries: Vec<Entry>,
    pub removed_old: usize,
    pub removed_duplicates: usize,
    pub removed_big: usize,
    pub warnings: Vec<CleanupWarning>,
}

impl CleanupReport {
    pub fn total_removed(&self) -> usize {
        self.removed_old + self.removed_duplicates + self.removed_big
    }

    pub fn summary(&self) -> String {
        format!(
            "removed {} old entries, {} duplicates, {} big entries",
            self.removed_old, self.removed_duplicates, self.removed_big
        )
    }
}

/// Runs every requested pass. A pass missing its parameter is skipped with a
/// warning; the others still run.
pub fn run(mut entries: Vec<Entry>, options: &CleanupOptions, now: Timestamp) -> CleanupReport {
    let mut report = CleanupReport::default();

    if options.remove_old {
        match options.age.and_then(|age| age.cutoff(now)) {
            Some(cutoff) => {
                if ensure_newest_first(&mut entries) {
                    warn!("history was out of order; re-sorted before age cleanup");
                }
                let outcome = by_age(entries, cutoff);
                report.removed_old = outcome.removed;
                entries = outcome.entries;
            }
            None => report.warnings.push(CleanupWarning::MissingAgeCriterion),
        }
    }

    if options.remove_duplicates {
        let outcome = dedupe(entries);
        report.removed_duplicates = outcome.removed;
        entries = outcome.entries;
    }

    if options.remove_big {
        match options.size_threshold {
            Some(threshold) => {
                let outcome = by_size(entries, threshold);
                report.removed_big = outcome.removed;
                entries = outcome.entries;
            }
            None => report.warnings.push(CleanupWarning::MissingSizeThreshold),
        }
    }

    for warning in &report.warnings {
        warn!("{warning}");
    }
    info!("cleanup finished: {}", report.summary());

    report.entries = entries;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ts;

    fn entry(value: &str, day: u32) -> Entry {
        Entry::new(value, ts(day, 12, 0))
    }

    fn all_passes(age: AgeCriterion, threshold: usize) -> CleanupOptions {
        CleanupOptions {
            remove_old: true,
            age: Some(age),
            remove_duplicates: true,
            remove_big: true,
            size_threshold: Some(threshold),
            backup: false,
        }
    }

    #[test]
    fn by_size_is_strictly_greater() {
        let entries = vec![Entry::new("abc", ts(1, 1, 0)), Entry::new("abcdef", ts(2, 1, 0))];
        let outcome = by_size(entries, 4);
        assert_eq!(outcome.entries, vec![Entry::new("abc", ts(1, 1, 0))]);
        assert_eq!(outcome.removed, 1);

        let kept = by_size(vec![entry("abcd", 1)], 4);
        assert_eq!(kept.removed, 0);
    }

    #[test]
    fn by_size_counts_characters() {
        let outcome = by_size(vec![entry("ééé", 1)], 3);
        assert_eq!(outcome.removed, 0);
    }

    #[test]
    fn dedupe_keeps_newest_copy() {
        let entries = vec![entry("a", 5), entry("b", 4), entry("a", 3), entry("b", 2)];
        let outcome = dedupe(entries);
        assert_eq!(outcome.entries, vec![entry("a", 5), entry("b", 4)]);
        assert_eq!(outcome.removed, 2);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let entries = vec![entry("x", 6), entry("y", 5), entry("x", 4), entry("z", 3)];
        let once = dedupe(entries).entries;
        let twice = dedupe(once.clone()).entries;
        assert_eq!(once, twice);
    }

    #[test]
    fn by_age_stops_at_first_older_entry() {
        let entries = vec![entry("new", 20), entry("old", 5), entry("newer but misplaced", 25)];
        let outcome = by_age(entries, ts(10, 0, 0));
        assert_eq!(outcome.entries, vec![entry("new", 20)]);
        assert_eq!(outcome.removed, 2);
    }

    #[test]
    fn pipeline_resorts_before_age_scan() {
        let entries = vec![entry("new", 20), entry("old", 5), entry("misplaced", 25)];
        let options = CleanupOptions {
            remove_old: true,
            age: Some(AgeCriterion::Before(ts(10, 0, 0))),
            ..Default::default()
        };
        let report = run(entries, &options, ts(30, 0, 0));
        assert_eq!(report.entries, vec![entry("misplaced", 25), entry("new", 20)]);
        assert_eq!(report.removed_old, 1);
    }

    #[test]
    fn relative_cutoffs() {
        let now = ts(15, 12, 0);
        let days = AgeCriterion::Ago { amount: 3, unit: TimeUnit::Days };
        assert_eq!(days.cutoff(now), Some(ts(12, 12, 0)));

        let weeks = AgeCriterion::Ago { amount: 1, unit: TimeUnit::Weeks };
        assert_eq!(weeks.cutoff(now), Some(ts(8, 12, 0)));

        let minutes = AgeCriterion::Ago { amount: 90, unit: TimeUnit::Minutes };
        assert_eq!(minutes.cutoff(now), Some(ts(15, 10, 30)));

        let months = AgeCriterion::Ago { amount: 1, unit: TimeUnit::Months };
        assert_eq!(months.cutoff(now), Timestamp::from_ymd_hm(2024, 2, 15, 12, 0));

        let years = AgeCriterion::Ago { amount: 2, unit: TimeUnit::Years };
        assert_eq!(years.cutoff(now), Timestamp::from_ymd_hm(2022, 3, 15, 12, 0));

        let zero = AgeCriterion::Ago { amount: 0, unit: TimeUnit::Days };
        assert_eq!(zero.cutoff(now), None);
    }

    #[test]
    fn clean_input_passes_through_unchanged() {
        let entries = vec![entry("c", 20), entry("b", 19), entry("a", 18)];
        let options = all_passes(AgeCriterion::Before(ts(1, 0, 0)), 100);
        let report = run(entries.clone(), &options, ts(21, 0, 0));
        assert_eq!(report.entries, entries);
        assert_eq!(report.total_removed(), 0);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn duplicate_counts_only_see_survivors_of_age_cut() {
        let entries = vec![entry("a", 20), entry("a", 2), entry("b", 1)];
        let options = all_passes(AgeCriterion::Before(ts(10, 0, 0)), 100);
        let report = run(entries, &options, ts(21, 0, 0));
        assert_eq!(report.removed_old, 2);
        assert_eq!(report.removed_duplicates, 0);
        assert_eq!(report.entries, vec![entry("a", 20)]);
    }

    #[test]
    fn missing_parameters_skip_pass_with_warning() {
        let entries = vec![entry("a", 3), entry("a", 2), entry("long value", 1)];
        let options = CleanupOptions {
            remove_old: true,
            age: None,
            remove_duplicates: true,
            remove_big: true,
            size_threshold: None,
            backup: false,
        };
        let report = run(entries, &options, ts(21, 0, 0));
        assert_eq!(
            report.warnings,
            vec![CleanupWarning::MissingAgeCriterion, CleanupWarning::MissingSizeThreshold]
        );
        assert_eq!(report.removed_duplicates, 1);
        assert_eq!(report.entries.len(), 2);
    }

    #[test]
    fn parses_time_units() {
        assert_eq!("days".parse::<TimeUnit>(), Ok(TimeUnit::Days));
        assert_eq!("Month".parse::<TimeUnit>(), Ok(TimeUnit::Months));
        assert!("fortnights".parse::<TimeUnit>().is_err());
    }
}
