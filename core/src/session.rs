use crate::entry::Entry;
use crate::history::{HistoryStore, Indexed};

/// What an open view should do with a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewUpdate {
    /// Complete `session ++ committed` view, sent on first open.
    Full(Vec<Entry>),
    /// Entries captured since the previous delivery, newest first.
    New(Vec<Entry>),
    /// History was cleared.
    Reset,
    /// Existing view must be replaced (cleanup, delete, import).
    Replaced(Vec<Entry>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryState {
    #[default]
    NotSent,
    SentFull,
    SentIncrementalPending,
}

/// Entries captured since the last commit, plus the delivery state of the
/// view they are shown in.
///
/// Every delivery commits what it hands out, so `entries` is always the
/// set the view has not seen yet.
#[derive(Debug, Clone, Default)]
pub struct SessionBuffer {
    entries: Vec<Indexed>,
    state: DeliveryState,
}

impl SessionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores entries from a snapshot written before a restart.
    pub fn restore(entries: Vec<Entry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .filter(Entry::is_valid)
                .map(Indexed::new)
                .collect(),
            state: DeliveryState::NotSent,
        }
    }

    /// Stages a capture. Returns false when `value` repeats the most recent
    /// entry across session and committed history.
    pub fn capture(&mut self, entry: Entry, committed: &HistoryStore) -> bool {
        if !entry.is_valid() {
            return false;
        }
        let latest = self.latest().or_else(|| committed.first());
        if latest.is_some_and(|last| last.value == entry.value) {
            return false;
        }

        self.entries.insert(0, Indexed::new(entry));
        if self.state == DeliveryState::SentFull {
            self.state = DeliveryState::SentIncrementalPending;
        }
        true
    }

    /// Hands the view what it is missing and commits it into `history`.
    /// `None` means the view is already current.
    pub fn deliver(&mut self, history: &mut HistoryStore) -> Option<ViewUpdate> {
        match self.state {
            DeliveryState::NotSent => {
                self.commit(history);
                self.state = DeliveryState::SentFull;
                Some(ViewUpdate::Full(history.to_vec()))
            }
            DeliveryState::SentIncrementalPending => {
                let fresh = self.to_vec();
                self.commit(history);
                self.state = DeliveryState::SentFull;
                Some(ViewUpdate::New(fresh))
            }
            DeliveryState::SentFull => None,
        }
    }

    /// Moves staged entries into committed history.
    pub fn commit(&mut self, history: &mut HistoryStore) -> usize {
        let staged: Vec<Entry> = self.entries.drain(..).map(|r| r.entry).collect();
        let count = staged.len();
        history.merge_session(staged);
        count
    }

    /// View closed; the next delivery is a full one.
    pub fn reset(&mut self) {
        self.state = DeliveryState::NotSent;
    }

    /// Drops staged entries. Returns the reset signal if a view is open.
    pub fn clear(&mut self) -> Option<ViewUpdate> {
        self.entries.clear();
        match self.state {
            DeliveryState::NotSent => None,
            _ => {
                self.state = DeliveryState::SentFull;
                Some(ViewUpdate::Reset)
            }
        }
    }

    pub fn delete_entry(&mut self, entry: &Entry) -> bool {
        match self.entries.iter().position(|r| r.entry == *entry) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state != DeliveryState::NotSent
    }

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    pub fn latest(&self) -> Option<&Entry> {
        self.entries.first().map(|r| &r.entry)
    }

    pub(crate) fn records(&self) -> &[Indexed] {
        &self.entries
    }

    pub fn to_vec(&self) -> Vec<Entry> {
        self.entries.iter().map(|r| r.entry.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
