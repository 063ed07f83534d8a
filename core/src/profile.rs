use crate::config::Config;
use crate::entry::{
    DateLayout, Entry, Timestamp, entries_from_records_preferring, entries_to_records,
};
use crate::error::{Error, Result};
use crate::history::{self, HistoryStore};
use crate::macros::MacroRegistry;
use crate::session::{SessionBuffer, ViewUpdate};
use crate::storage::{BlobStore, keys};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::BTreeMap;

/// History, staged captures and macros of one profile.
#[derive(Debug)]
pub struct ProfileState {
    pub name: String,
    pub history: HistoryStore,
    pub session: SessionBuffer,
    pub macros: MacroRegistry,
}

/// Owns the profile list and the single mutable active profile.
pub struct ProfileManager {
    store: Box<dyn BlobStore>,
    profiles: Vec<String>,
    active: ProfileState,
    default_profile: String,
    max_entries: usize,
}

impl ProfileManager {
    /// Loads profiles from `store`, creating and migrating the default
    /// profile on first run and repairing a dangling active name.
    pub fn open(store: Box<dyn BlobStore>, config: &Config) -> Result<Self> {
        let default_profile = config.default_profile.clone();
        let mut profiles = load_profile_names(store.as_ref())?;

        if profiles.is_empty() {
            migrate_legacy_history(store.as_ref(), &default_profile)?;
            profiles.push(default_profile.clone());
            store.save_blob(keys::PROFILES, &names_to_value(&profiles))?;
        }

        let stored_active = store
            .load_blob(keys::ACTIVE_PROFILE)?
            .and_then(|v| v.as_str().map(str::to_string));
        let active_name = match stored_active {
            Some(name) if profiles.contains(&name) => name,
            other => {
                let fallback = if profiles.contains(&default_profile) {
                    default_profile.clone()
                } else {
                    profiles[0].clone()
                };
                if let Some(missing) = other {
                    warn!("active profile `{missing}` is missing; falling back to `{fallback}`");
                }
                store.save_blob(keys::ACTIVE_PROFILE, &Value::String(fallback.clone()))?;
                fallback
            }
        };

        let active = load_state(store.as_ref(), &active_name, config.max_entries)?;
        info!(
            "profile `{}` loaded with {} entries ({} staged)",
            active.name,
            active.history.len(),
            active.session.len()
        );

        Ok(Self {
            store,
            profiles,
            active,
            default_profile,
            max_entries: config.max_entries,
        })
    }

    pub fn active_name(&self) -> &str {
        &self.active.name
    }

    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    pub fn default_profile(&self) -> &str {
        &self.default_profile
    }

    pub fn active(&self) -> &ProfileState {
        &self.active
    }

    pub fn history(&self) -> &HistoryStore {
        &self.active.history
    }

    pub fn session(&self) -> &SessionBuffer {
        &self.active.session
    }

    pub fn macros(&self) -> &MacroRegistry {
        &self.active.macros
    }

    /// Creates an empty profile and switches to it.
    pub fn create(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::EmptyProfileName);
        }
        if self.profiles.iter().any(|p| p == name) {
            return Err(Error::DuplicateProfile(name.to_string()));
        }

        self.flush();
        self.profiles.push(name.to_string());
        self.persist(keys::PROFILES, names_to_value(&self.profiles));
        self.active = empty_state(name, self.max_entries);
        self.persist_history();
        self.persist_macros();
        self.persist(keys::ACTIVE_PROFILE, Value::String(name.to_string()));
        info!("created profile `{name}`");
        Ok(())
    }

    /// Flushes staged captures of the outgoing profile, then loads `name`.
    pub fn switch_to(&mut self, name: &str) -> Result<()> {
        if !self.profiles.iter().any(|p| p == name) {
            return Err(Error::UnknownProfile(name.to_string()));
        }
        if self.active.name == name {
            return Ok(());
        }

        let incoming = load_state(self.store.as_ref(), name, self.max_entries)?;
        self.flush();
        let outgoing = std::mem::replace(&mut self.active, incoming);
        self.persist(keys::ACTIVE_PROFILE, Value::String(name.to_string()));
        info!("switched profile `{}` -> `{name}`", outgoing.name);
        Ok(())
    }

    /// Deletes an inactive profile and its persisted data.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        if self.active.name == name {
            return Err(Error::ActiveProfileRemoval(name.to_string()));
        }
        let Some(pos) = self.profiles.iter().position(|p| p == name) else {
            return Err(Error::UnknownProfile(name.to_string()));
        };

        self.profiles.remove(pos);
        self.persist(keys::PROFILES, names_to_value(&self.profiles));
        for key in [
            keys::history(name),
            keys::macros(name),
            keys::macros_enabled(name),
            keys::session(name),
        ] {
            if let Err(e) = self.store.remove_blob(&key) {
                warn!("failed to remove {key}: {e:#}");
            }
        }
        info!("removed profile `{name}`");
        Ok(())
    }

    /// Records a capture. Returns whether a new entry was recorded.
    ///
    /// Captures are only staged while a view is open and waiting for them;
    /// otherwise they commit at once. Either way `max_entries` bounds
    /// `session ++ committed`, evicting the oldest committed entries first.
    pub fn capture(&mut self, value: String, timestamp: Timestamp) -> bool {
        let state = &mut self.active;
        if !state.session.capture(Entry::new(value, timestamp), &state.history) {
            return false;
        }
        let limit = self.max_entries;
        if !state.session.is_open() || (limit > 0 && state.session.len() > limit) {
            self.flush();
            return true;
        }

        if limit > 0 {
            let room = limit - state.session.len();
            if state.history.truncate(room) > 0 {
                self.persist_history();
            }
        }
        self.persist_session();
        true
    }

    /// Re-reads state other processes sharing the store may have written:
    /// the profile list, the active profile and its history and macros.
    /// Staged captures are kept; if another process switched profiles they
    /// are committed into the profile they were captured in.
    pub fn reload(&mut self) -> Result<()> {
        let profiles = load_profile_names(self.store.as_ref())?;
        if !profiles.is_empty() {
            self.profiles = profiles;
        }
        let stored_active = self
            .store
            .load_blob(keys::ACTIVE_PROFILE)?
            .and_then(|v| v.as_str().map(str::to_string));
        let target = match stored_active {
            Some(name) if self.profiles.contains(&name) => name,
            _ if self.profiles.contains(&self.active.name) => self.active.name.clone(),
            _ if self.profiles.contains(&self.default_profile) => self.default_profile.clone(),
            _ => self.profiles.first().cloned().unwrap_or_else(|| self.active.name.clone()),
        };

        let mut fresh = load_state(self.store.as_ref(), &target, self.max_entries)?;
        if target == self.active.name {
            fresh.session = std::mem::take(&mut self.active.session);
            self.active = fresh;
            return Ok(());
        }

        let outgoing = std::mem::replace(&mut self.active, fresh);
        if !outgoing.session.is_empty() && self.profiles.contains(&outgoing.name) {
            let staged = outgoing.session.to_vec();
            let mut stored = load_state(self.store.as_ref(), &outgoing.name, self.max_entries)?;
            stored.history.merge_session(staged);
            stored.history.cleanup();
            self.persist_history_of(&stored);
            self.persist_session_of(&empty_state(&outgoing.name, self.max_entries));
        }
        info!(
            "profile changed elsewhere: `{}` -> `{}`",
            outgoing.name, self.active.name
        );
        Ok(())
    }

    /// Delivers to the view; commits and persists whatever was handed out.
    pub fn deliver(&mut self) -> Option<ViewUpdate> {
        let staged = !self.active.session.is_empty();
        let state = &mut self.active;
        let update = state.session.deliver(&mut state.history);
        if staged {
            self.persist_history();
            self.persist_session();
        }
        update
    }

    pub fn view_open(&self) -> bool {
        self.active.session.is_open()
    }

    pub fn close_view(&mut self) {
        self.active.session.reset();
    }

    /// Commits staged captures into history and persists both.
    pub fn flush(&mut self) {
        let state = &mut self.active;
        let committed = state.session.commit(&mut state.history);
        if committed > 0 {
            debug!("flushed {committed} staged entries for `{}`", state.name);
            self.persist_history();
            self.persist_session();
        }
    }

    /// `session ++ committed`, newest first.
    pub fn full_entries(&self) -> Vec<Entry> {
        let mut entries = self.active.session.to_vec();
        entries.extend(self.active.history.iter().cloned());
        entries
    }

    pub fn search(&self, query: &str) -> Vec<&Entry> {
        let state = &self.active;
        history::filter(
            state.session.records().iter().chain(state.history.records()),
            query,
        )
    }

    pub fn delete_entry(&mut self, entry: &Entry) -> bool {
        if self.active.session.delete_entry(entry) {
            self.persist_session();
            return true;
        }
        if self
            .active
            .history
            .delete_entry(&entry.value, entry.timestamp)
        {
            self.persist_history();
            return true;
        }
        false
    }

    /// Replaces the whole history (cleanup, import). Staged captures are
    /// expected to be part of `entries`.
    pub fn replace_history(&mut self, entries: Vec<Entry>) -> Option<ViewUpdate> {
        let state = &mut self.active;
        state.session.clear();
        state.history.record_committed(entries);
        state.history.cleanup();
        self.persist_history();
        self.persist_session();
        self.view_open()
            .then(|| ViewUpdate::Replaced(self.active.history.to_vec()))
    }

    pub fn clear_history(&mut self) -> Option<ViewUpdate> {
        self.active.history.clear();
        let update = self.active.session.clear();
        self.persist_history();
        self.persist_session();
        update
    }

    pub fn assign_macro(&mut self, slot: u8, value: &str) -> Result<()> {
        self.active.macros.assign(slot, value)?;
        self.persist_macros();
        Ok(())
    }

    pub fn resolve_macro(&self, slot: u8) -> Option<&str> {
        self.active.macros.resolve(slot)
    }

    pub fn set_macros_enabled(&mut self, enabled: bool) {
        self.active.macros.set_enabled(enabled);
        self.persist(
            keys::macros_enabled(&self.active.name),
            Value::Bool(enabled),
        );
    }

    pub fn clear_macros(&mut self) {
        self.active.macros.clear();
        self.persist_macros();
    }

    fn persist_history(&self) {
        self.persist_history_of(&self.active);
    }

    fn persist_session(&self) {
        self.persist_session_of(&self.active);
    }

    fn persist_history_of(&self, state: &ProfileState) {
        let value = entries_to_records(&state.history.to_vec());
        self.persist(keys::history(&state.name), value);
    }

    fn persist_session_of(&self, state: &ProfileState) {
        let key = keys::session(&state.name);
        if state.session.is_empty() {
            if let Err(e) = self.store.remove_blob(&key) {
                warn!("failed to clear {key}: {e:#}");
            }
            return;
        }
        self.persist(key, entries_to_records(&state.session.to_vec()));
    }

    fn persist_macros(&self) {
        let value = serde_json::to_value(self.active.macros.slots()).unwrap_or(Value::Null);
        self.persist(keys::macros(&self.active.name), value);
    }

    // In-memory state is already updated; a failed write only narrows
    // durability and is never surfaced to the caller.
    fn persist(&self, key: impl AsRef<str>, value: Value) {
        let key = key.as_ref();
        if let Err(e) = self.store.save_blob(key, &value) {
            warn!("failed to persist {key}: {e:#}");
        }
    }
}

fn empty_state(name: &str, max_entries: usize) -> ProfileState {
    ProfileState {
        name: name.to_string(),
        history: new_history(max_entries),
        session: SessionBuffer::new(),
        macros: MacroRegistry::new(),
    }
}

fn new_history(max_entries: usize) -> HistoryStore {
    if max_entries == 0 {
        HistoryStore::new()
    } else {
        HistoryStore::with_limit(max_entries)
    }
}

fn names_to_value(names: &[String]) -> Value {
    Value::Array(names.iter().cloned().map(Value::String).collect())
}

fn load_profile_names(store: &dyn BlobStore) -> Result<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    if let Some(Value::Array(items)) = store.load_blob(keys::PROFILES)? {
        for name in items.iter().filter_map(Value::as_str) {
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

fn load_entries(store: &dyn BlobStore, key: &str, layout: DateLayout) -> Result<Vec<Entry>> {
    match store.load_blob(key)? {
        Some(Value::Array(records)) => {
            let (entries, dropped) = entries_from_records_preferring(&records, layout);
            if dropped > 0 {
                warn!("{key}: dropped {dropped} malformed records");
            }
            Ok(entries)
        }
        Some(_) => {
            warn!("{key}: expected a list of entries; ignoring");
            Ok(Vec::new())
        }
        None => Ok(Vec::new()),
    }
}

fn load_state(store: &dyn BlobStore, name: &str, max_entries: usize) -> Result<ProfileState> {
    let mut history = new_history(max_entries);
    history.record_committed(load_entries(store, &keys::history(name), DateLayout::Current)?);
    let repaired = history.cleanup();
    if repaired > 0 {
        debug!("removed {repaired} exact duplicates from `{name}`");
    }

    let session = SessionBuffer::restore(load_entries(
        store,
        &keys::session(name),
        DateLayout::Current,
    )?);

    let slots: BTreeMap<u8, String> = match store.load_blob(&keys::macros(name))? {
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!("macros for `{name}` are unreadable: {e}");
            BTreeMap::new()
        }),
        None => BTreeMap::new(),
    };
    let enabled = store
        .load_blob(&keys::macros_enabled(name))?
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    Ok(ProfileState {
        name: name.to_string(),
        history,
        session,
        macros: MacroRegistry::from_slots(slots, enabled),
    })
}

/// Moves history stored before profiles existed into `profile`. Runs only
/// while the profile list is empty, so it happens at most once.
fn migrate_legacy_history(store: &dyn BlobStore, profile: &str) -> Result<()> {
    let mut legacy = load_entries(store, keys::LEGACY_HISTORY, DateLayout::Legacy)?;
    if !legacy.is_empty() {
        legacy.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        store.save_blob(&keys::history(profile), &entries_to_records(&legacy))?;
        info!(
            "migrated {} legacy entries into profile `{profile}`",
            legacy.len()
        );
    }
    store.remove_blob(keys::LEGACY_HISTORY)?;
    Ok(())
}
