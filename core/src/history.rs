use crate::entry::{Entry, Timestamp};

/// An entry with its case-folded value cached for search.
#[derive(Debug, Clone)]
pub(crate) struct Indexed {
    pub entry: Entry,
    lower: String,
}

impl Indexed {
    pub fn new(entry: Entry) -> Self {
        let lower = entry.value.to_lowercase();
        Self { entry, lower }
    }

    /// `query` must already be lowercase.
    pub fn matches(&self, query: &str) -> bool {
        self.lower.contains(query)
    }
}

/// Case-insensitive substring filter shared by committed and session data.
pub(crate) fn filter<'a>(
    records: impl Iterator<Item = &'a Indexed>,
    query: &str,
) -> Vec<&'a Entry> {
    if query.is_empty() {
        return records.map(|r| &r.entry).collect();
    }
    let query = query.to_lowercase();
    records
        .filter(|r| r.matches(&query))
        .map(|r| &r.entry)
        .collect()
}

/// Committed history of one profile, newest first.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    records: Vec<Indexed>,
    max_entries: Option<usize>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that evicts the oldest entries beyond `max_entries` on merge.
    pub fn with_limit(max_entries: usize) -> Self {
        Self {
            records: Vec::new(),
            max_entries: Some(max_entries),
        }
    }

    /// Replaces the committed set. Input order is trusted; entries without
    /// a value are dropped and the size limit applies.
    pub fn record_committed(&mut self, entries: Vec<Entry>) {
        self.records = entries
            .into_iter()
            .filter(Entry::is_valid)
            .map(Indexed::new)
            .collect();
        self.enforce_limit();
    }

    /// Keeps the newest `len` entries. Returns how many were evicted.
    pub fn truncate(&mut self, len: usize) -> usize {
        let evicted = self.records.len().saturating_sub(len);
        self.records.truncate(len);
        evicted
    }

    pub fn search(&self, query: &str) -> Vec<&Entry> {
        filter(self.records.iter(), query)
    }

    /// Removes the first entry matching both fields.
    pub fn delete_entry(&mut self, value: &str, timestamp: Timestamp) -> bool {
        match self
            .records
            .iter()
            .position(|r| r.entry.value == value && r.entry.timestamp == timestamp)
        {
            Some(pos) => {
                self.records.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Prepends newest-first session entries. Returns how many old entries
    /// were evicted by the size limit.
    pub fn merge_session(&mut self, session: Vec<Entry>) -> usize {
        if session.is_empty() {
            return 0;
        }
        let mut merged: Vec<Indexed> = session
            .into_iter()
            .filter(Entry::is_valid)
            .map(Indexed::new)
            .collect();
        merged.append(&mut self.records);
        self.records = merged;
        self.enforce_limit()
    }

    fn enforce_limit(&mut self) -> usize {
        match self.max_entries {
            Some(max) if self.records.len() > max => {
                let evicted = self.records.len() - max;
                self.records.truncate(max);
                evicted
            }
            _ => 0,
        }
    }

    /// Drops consecutive exact duplicates left behind by merge races.
    pub fn cleanup(&mut self) -> usize {
        let before = self.records.len();
        self.records.dedup_by(|a, b| a.entry == b.entry);
        before - self.records.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn first(&self) -> Option<&Entry> {
        self.records.first().map(|r| &r.entry)
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.records.get(index).map(|r| &r.entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.records.iter().map(|r| &r.entry)
    }

    pub(crate) fn records(&self) -> &[Indexed] {
        &self.records
    }

    pub fn to_vec(&self) -> Vec<Entry> {
        self.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
