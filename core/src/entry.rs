use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Layout written by the current format, e.g. `14:05 31-12-2024`.
pub const DATE_FORMAT: &str = "%H:%M %d-%m-%Y";
/// Layout written by older releases, e.g. `14:05 12-31-2024`.
pub const LEGACY_DATE_FORMAT: &str = "%H:%M %m-%d-%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLayout {
    Current,
    Legacy,
}

impl DateLayout {
    pub fn format(self) -> &'static str {
        match self {
            DateLayout::Current => DATE_FORMAT,
            DateLayout::Legacy => LEGACY_DATE_FORMAT,
        }
    }

    fn other(self) -> Self {
        match self {
            DateLayout::Current => DateLayout::Legacy,
            DateLayout::Legacy => DateLayout::Current,
        }
    }

    /// Picks the layout a whole document was written in.
    ///
    /// A layout that reads every date wins, `preferred` first. Otherwise any
    /// date that only reads as month-first marks the document as legacy.
    pub fn detect(dates: &[&str], preferred: DateLayout) -> DateLayout {
        let reads_all = |layout: DateLayout| {
            dates
                .iter()
                .all(|d| Timestamp::parse_exact(d, layout).is_some())
        };
        if reads_all(preferred) {
            return preferred;
        }
        if reads_all(preferred.other()) {
            return preferred.other();
        }
        let legacy_only = dates.iter().any(|d| {
            Timestamp::parse_exact(d, DateLayout::Current).is_none()
                && Timestamp::parse_exact(d, DateLayout::Legacy).is_some()
        });
        if legacy_only {
            DateLayout::Legacy
        } else {
            DateLayout::Current
        }
    }
}

/// Capture time of an entry, truncated to the minute.
///
/// The interchange format only carries minutes, so truncating on
/// construction keeps an entry equal to itself after a save/load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        let truncated = dt
            .with_second(0)
            .and_then(|d| d.with_nanosecond(0))
            .unwrap_or(dt);
        Self(truncated)
    }

    pub fn from_ymd_hm(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day)?
            .and_hms_opt(hour, minute, 0)
            .map(Self)
    }

    pub fn now() -> Self {
        Self::from_datetime(Local::now().naive_local())
    }

    /// Parses either date layout. The current layout wins when a string is
    /// valid in both (day and month both <= 12).
    pub fn parse(s: &str) -> Option<Self> {
        Self::parse_preferring(s, DateLayout::Current)
    }

    pub fn parse_preferring(s: &str, layout: DateLayout) -> Option<Self> {
        Self::parse_exact(s, layout).or_else(|| Self::parse_exact(s, layout.other()))
    }

    pub fn parse_exact(s: &str, layout: DateLayout) -> Option<Self> {
        NaiveDateTime::parse_from_str(s.trim(), layout.format())
            .ok()
            .map(Self::from_datetime)
    }

    pub fn as_datetime(&self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Timestamp::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognised date: {raw}")))
    }
}

/// Source of capture times.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// One recorded clipboard value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    pub value: String,
    #[serde(rename = "date")]
    pub timestamp: Timestamp,
}

impl Entry {
    pub fn new(value: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            value: value.into(),
            timestamp,
        }
    }

    /// Entries with an empty or whitespace-only value are never stored.
    pub fn is_valid(&self) -> bool {
        !self.value.trim().is_empty()
    }

    /// Reads one persisted record, tolerating the field names older
    /// releases used. Returns `None` for anything unusable.
    pub fn from_record(record: &Value) -> Option<Self> {
        Self::from_record_as(record, DateLayout::Current)
    }

    /// Like [`Entry::from_record`], trying `layout` before the other one.
    pub fn from_record_as(record: &Value, layout: DateLayout) -> Option<Self> {
        let value = record_value(record)?;
        let timestamp = Timestamp::parse_preferring(record_date(record)?, layout)?;
        Some(Self::new(value, timestamp))
    }

    pub fn to_record(&self) -> Value {
        serde_json::json!({
            "value": self.value,
            "date": self.timestamp.to_string(),
        })
    }
}

fn record_value(record: &Value) -> Option<&str> {
    record
        .get("value")?
        .as_str()
        .filter(|value| !value.trim().is_empty())
}

fn record_date(record: &Value) -> Option<&str> {
    record
        .get("date")
        .or_else(|| record.get("timestamp"))?
        .as_str()
}

/// Health check applied wherever records enter the engine.
/// Returns the usable entries and how many records were dropped.
pub fn entries_from_records(records: &[Value]) -> (Vec<Entry>, usize) {
    entries_from_records_preferring(records, DateLayout::Current)
}

/// Health check with the date layout detected over the whole batch, so an
/// ambiguous date reads the same way as its unambiguous neighbours.
pub fn entries_from_records_preferring(
    records: &[Value],
    preferred: DateLayout,
) -> (Vec<Entry>, usize) {
    let dates: Vec<&str> = records
        .iter()
        .filter(|r| record_value(r).is_some())
        .filter_map(record_date)
        .filter(|d| Timestamp::parse_preferring(d, preferred).is_some())
        .collect();
    let layout = DateLayout::detect(&dates, preferred);

    let entries: Vec<Entry> = records
        .iter()
        .filter_map(|r| Entry::from_record_as(r, layout))
        .collect();
    let dropped = records.len() - entries.len();
    (entries, dropped)
}

pub fn entries_to_records(entries: &[Entry]) -> Value {
    Value::Array(entries.iter().map(Entry::to_record).collect())
}

#[cfg(test)]
pub(crate) fn ts(day: u32, hour: u32, minute: u32) -> Timestamp {
    Timestamp::from_ymd_hm(2024, 3, day, hour, minute).unwrap()
}
