//! Backup documents: a bare array of `{value, date}` records, or the same
//! array wrapped under `clipboardHistory` as older releases wrote it.

use crate::cleanup::PassOutcome;
use crate::entry::{DateLayout, Entry, entries_from_records_preferring, entries_to_records};
use crate::error::{Error, Result};
use anyhow::Context;
use log::{info, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub const LEGACY_KEY: &str = "clipboardHistory";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub entries: Vec<Entry>,
    pub dropped: usize,
}

pub fn encode(entries: &[Entry]) -> Value {
    entries_to_records(entries)
}

pub fn decode(document: &Value) -> Result<Decoded> {
    // the wrapped shape comes from releases that wrote month-first dates
    let (records, layout) = match document {
        Value::Array(records) => (records, DateLayout::Current),
        Value::Object(map) => match map.get(LEGACY_KEY) {
            Some(Value::Array(records)) => (records, DateLayout::Legacy),
            _ => return Err(Error::InvalidBackup { dropped: 0 }),
        },
        _ => return Err(Error::InvalidBackup { dropped: 0 }),
    };

    let (entries, dropped) = entries_from_records_preferring(records, layout);
    if dropped > 0 {
        warn!("backup: dropped {dropped} malformed records");
    }
    if entries.is_empty() {
        return Err(Error::InvalidBackup { dropped });
    }
    Ok(Decoded { entries, dropped })
}

/// Drops repeated `(value, timestamp)` pairs, keeping the first.
pub fn dedupe_exact(mut entries: Vec<Entry>) -> PassOutcome {
    let before = entries.len();
    let mut seen = HashSet::new();
    entries.retain(|e| seen.insert((e.value.clone(), e.timestamp)));
    PassOutcome {
        removed: before - entries.len(),
        entries,
    }
}

/// Combines an existing history with imported entries.
///
/// With `override_all` the import replaces everything. Otherwise both sets
/// are merged newest first and exact duplicates collapse; the same value at
/// a different time is kept.
pub fn merge(existing: Vec<Entry>, incoming: Vec<Entry>, override_all: bool) -> Vec<Entry> {
    if override_all {
        return incoming;
    }
    let mut merged = existing;
    merged.extend(incoming);
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    dedupe_exact(merged).entries
}

pub fn write_file(path: &Path, entries: &[Entry]) -> anyhow::Result<()> {
    write_document(path, &encode(entries))?;
    info!("backup of {} entries written to {}", entries.len(), path.display());
    Ok(())
}

pub fn write_document(path: &Path, document: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(document)?;
    fs::write(path, json).with_context(|| format!("Failed to write backup {}", path.display()))
}

pub fn read_file(path: &Path) -> anyhow::Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read backup {}", path.display()))?;
    serde_json::from_str(&content).context("Backup is not valid JSON")
}
