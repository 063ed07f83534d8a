use crate::backup;
use crate::cleanup::{self, CleanupOptions, CleanupReport};
use crate::config::Config;
use crate::entry::{Clock, Entry};
use crate::error::Result;
use crate::macros::validate_slot;
use crate::profile::ProfileManager;
use crate::session::ViewUpdate;
use crate::storage::BlobStore;
use log::{debug, info};
use serde_json::Value;

/// Everything the watcher and the overlay can ask of the engine.
#[derive(Debug, Clone)]
pub enum Command {
    ClipboardChanged(String),
    OpenView,
    CloseView,
    Search(String),
    ClearSearch,
    /// Drops the last space-separated word of the search text.
    ClearLastWord,
    AppendNewline,
    NavigateUp(usize),
    NavigateDown(usize),
    Select(usize),
    SelectCurrent,
    /// 1-based position in the filtered view.
    PasteNth(usize),
    DeleteCurrent,
    AssignMacro(u8),
    PlayMacro(u8),
    SetMacrosEnabled(bool),
    ClearMacros,
    CreateProfile(String),
    SwitchProfile(String),
    RemoveProfile(String),
    Cleanup(CleanupOptions),
    ImportBackup { document: Value, override_all: bool },
    ClearHistory,
}

/// Outcomes the caller forwards to collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    View(ViewUpdate),
    /// Write this value to the OS clipboard and paste it.
    Paste(String),
    ProfileChanged(String),
    /// Macro slots changed; menus listing them need a refresh.
    MacrosChanged,
    CleanupFinished(CleanupReport),
    /// History as it was before a cleanup that asked for a backup.
    BackupCreated(Value),
    BackupImported { imported: usize, dropped: usize },
}

/// Search text, filtered entries and highlighted row of the overlay.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    search: String,
    active_index: usize,
    filtered: Vec<Entry>,
}

impl ViewState {
    pub fn search_text(&self) -> &str {
        &self.search
    }

    pub fn filtered(&self) -> &[Entry] {
        &self.filtered
    }

    /// `None` while the filtered view is empty.
    pub fn active_index(&self) -> Option<usize> {
        (!self.filtered.is_empty()).then_some(self.active_index)
    }

    pub fn current(&self) -> Option<&Entry> {
        self.filtered.get(self.active_index)
    }

    fn up(&mut self, amount: usize) {
        self.active_index = self.active_index.saturating_sub(amount);
    }

    fn down(&mut self, amount: usize) {
        let max = self.filtered.len().saturating_sub(1);
        self.active_index = self.active_index.saturating_add(amount).min(max);
    }

    fn clamp(&mut self) {
        if self.active_index >= self.filtered.len() {
            self.active_index = self.filtered.len().saturating_sub(1);
        }
    }
}

pub struct ClipboardManager {
    config: Config,
    profiles: ProfileManager,
    clock: Box<dyn Clock>,
    view: ViewState,
}

impl ClipboardManager {
    pub fn new(config: Config, store: Box<dyn BlobStore>, clock: Box<dyn Clock>) -> Result<Self> {
        let profiles = ProfileManager::open(store, &config)?;
        Ok(Self {
            config,
            profiles,
            clock,
            view: ViewState::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn profiles(&self) -> &ProfileManager {
        &self.profiles
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Full history of the active profile, newest first.
    pub fn entries(&self) -> Vec<Entry> {
        self.profiles.full_entries()
    }

    pub fn search(&self, query: &str) -> Vec<&Entry> {
        self.profiles.search(query)
    }

    pub fn export(&self) -> Value {
        backup::encode(&self.profiles.full_entries())
    }

    /// Commits staged captures; call before shutting down.
    pub fn flush(&mut self) {
        self.profiles.flush();
    }

    /// Picks up what other processes sharing the store changed since the
    /// last read. Long-running callers do this before acting on the store.
    pub fn reload(&mut self) -> Result<Vec<Notification>> {
        let mut out = Vec::new();
        let before = self.profiles.active_name().to_string();
        let was_open = self.profiles.view_open();
        self.profiles.reload()?;

        if self.profiles.active_name() != before {
            self.after_profile_change(was_open, &mut out);
        } else if was_open {
            self.refilter_keeping_index();
            out.push(Notification::View(ViewUpdate::Replaced(self.entries())));
        }
        Ok(out)
    }

    /// Applies one command. Validation failures leave every piece of state
    /// as it was.
    pub fn handle(&mut self, command: Command) -> Result<Vec<Notification>> {
        debug!("command: {command:?}");
        let mut out = Vec::new();

        match command {
            Command::ClipboardChanged(text) => self.ingest(text, &mut out),
            Command::OpenView => {
                if let Some(update) = self.profiles.deliver() {
                    if matches!(update, ViewUpdate::Full(_)) {
                        self.view.search.clear();
                    }
                    self.refresh_view();
                    out.push(Notification::View(update));
                }
            }
            Command::CloseView => {
                self.profiles.close_view();
                self.view = ViewState::default();
            }
            Command::Search(text) => self.set_search(text),
            Command::ClearSearch => self.set_search(String::new()),
            Command::ClearLastWord => {
                let mut words: Vec<&str> = self.view.search.split(' ').collect();
                words.pop();
                let text = words.join(" ");
                self.set_search(text);
            }
            Command::AppendNewline => {
                let text = format!("{}\n", self.view.search);
                self.set_search(text);
            }
            Command::NavigateUp(amount) => self.view.up(amount),
            Command::NavigateDown(amount) => self.view.down(amount),
            Command::Select(index) => self.paste_at(index, &mut out),
            Command::SelectCurrent => self.paste_at(self.view.active_index, &mut out),
            Command::PasteNth(position) => {
                if (1..=9).contains(&position) {
                    self.paste_at(position - 1, &mut out);
                }
            }
            Command::DeleteCurrent => {
                if let Some(entry) = self.view.current().cloned() {
                    if self.profiles.delete_entry(&entry) {
                        self.refilter_keeping_index();
                        out.push(Notification::View(ViewUpdate::Replaced(self.entries())));
                    }
                }
            }
            Command::AssignMacro(slot) => {
                validate_slot(slot)?;
                if let Some(entry) = self.view.current().cloned() {
                    self.profiles.assign_macro(slot, &entry.value)?;
                    out.push(Notification::MacrosChanged);
                }
            }
            Command::PlayMacro(slot) => {
                validate_slot(slot)?;
                if let Some(value) = self.profiles.resolve_macro(slot) {
                    out.push(Notification::Paste(value.to_string()));
                }
            }
            Command::SetMacrosEnabled(enabled) => {
                self.profiles.set_macros_enabled(enabled);
                out.push(Notification::MacrosChanged);
            }
            Command::ClearMacros => {
                self.profiles.clear_macros();
                out.push(Notification::MacrosChanged);
            }
            Command::CreateProfile(name) => {
                let was_open = self.profiles.view_open();
                self.profiles.create(&name)?;
                self.after_profile_change(was_open, &mut out);
            }
            Command::SwitchProfile(name) => {
                let was_open = self.profiles.view_open();
                self.profiles.switch_to(&name)?;
                self.after_profile_change(was_open, &mut out);
            }
            Command::RemoveProfile(name) => self.profiles.remove(&name)?,
            Command::Cleanup(options) => self.cleanup(options, &mut out),
            Command::ImportBackup {
                document,
                override_all,
            } => {
                let decoded = backup::decode(&document)?;
                let imported = decoded.entries.len();
                let merged = backup::merge(self.entries(), decoded.entries, override_all);
                self.replace_history(merged, &mut out);
                info!("imported {imported} entries ({} dropped)", decoded.dropped);
                out.push(Notification::BackupImported {
                    imported,
                    dropped: decoded.dropped,
                });
            }
            Command::ClearHistory => {
                let update = self.profiles.clear_history();
                self.refresh_view();
                if let Some(update) = update {
                    out.push(Notification::View(update));
                }
                info!("history of `{}` cleared", self.profiles.active_name());
            }
        }

        Ok(out)
    }

    fn ingest(&mut self, text: String, out: &mut Vec<Notification>) {
        let value = if self.config.trim_whitespace {
            text.trim().to_string()
        } else {
            text
        };
        if value.trim().is_empty() {
            return;
        }

        let now = self.clock.now();
        if !self.profiles.capture(value, now) || !self.profiles.view_open() {
            return;
        }
        if let Some(update) = self.profiles.deliver() {
            self.refresh_view();
            out.push(Notification::View(update));
        }
    }

    fn set_search(&mut self, text: String) {
        self.view.search = text;
        self.refresh_view();
    }

    fn refresh_view(&mut self) {
        self.view.filtered = self
            .profiles
            .search(&self.view.search)
            .into_iter()
            .cloned()
            .collect();
        self.view.active_index = 0;
    }

    fn refilter_keeping_index(&mut self) {
        let index = self.view.active_index;
        self.refresh_view();
        self.view.active_index = index;
        self.view.clamp();
    }

    fn paste_at(&mut self, index: usize, out: &mut Vec<Notification>) {
        let Some(entry) = self.view.filtered.get(index) else {
            return;
        };
        out.push(Notification::Paste(entry.value.clone()));
        self.profiles.close_view();
        self.view = ViewState::default();
    }

    fn after_profile_change(&mut self, was_open: bool, out: &mut Vec<Notification>) {
        self.view = ViewState::default();
        out.push(Notification::ProfileChanged(
            self.profiles.active_name().to_string(),
        ));
        out.push(Notification::MacrosChanged);
        if was_open {
            if let Some(update) = self.profiles.deliver() {
                self.refresh_view();
                out.push(Notification::View(update));
            }
        }
    }

    fn cleanup(&mut self, mut options: CleanupOptions, out: &mut Vec<Notification>) {
        if !options.any_requested() {
            return;
        }
        if options.remove_big && options.size_threshold.is_none() {
            options.size_threshold = Some(self.config.big_entry_threshold);
        }

        let entries = self.entries();
        if options.backup {
            out.push(Notification::BackupCreated(backup::encode(&entries)));
        }
        let report = cleanup::run(entries, &options, self.clock.now());
        self.replace_history(report.entries.clone(), out);
        out.push(Notification::CleanupFinished(report));
    }

    fn replace_history(&mut self, entries: Vec<Entry>, out: &mut Vec<Notification>) {
        let update = self.profiles.replace_history(entries);
        self.refilter_keeping_index();
        if let Some(update) = update {
            out.push(Notification::View(update));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::AgeCriterion;
    use crate::entry::{Timestamp, ts};
    use crate::error::Error;
    use crate::storage::{MemoryStore, keys};
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Advances one minute per reading.
    struct StepClock(Cell<u32>);

    impl Clock for StepClock {
        fn now(&self) -> Timestamp {
            let minute = self.0.get();
            self.0.set(minute + 1);
            ts(10, minute / 60, minute % 60)
        }
    }

    fn manager() -> ClipboardManager {
        ClipboardManager::new(
            Config::default(),
            Box::new(MemoryStore::new()),
            Box::new(StepClock(Cell::new(0))),
        )
        .unwrap()
    }

    fn copy(manager: &mut ClipboardManager, values: &[&str]) {
        for value in values {
            manager
                .handle(Command::ClipboardChanged(value.to_string()))
                .unwrap();
        }
    }

    fn values(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.value.as_str()).collect()
    }

    fn full_view(notifications: &[Notification]) -> Vec<Entry> {
        match notifications {
            [Notification::View(ViewUpdate::Full(entries))] => entries.clone(),
            other => panic!("expected a full delivery, got {other:?}"),
        }
    }

    #[test]
    fn repeated_polls_record_one_entry() {
        let mut manager = manager();
        copy(&mut manager, &["same", "same", "same"]);
        assert_eq!(manager.entries().len(), 1);
    }

    #[test]
    fn blank_values_are_ignored() {
        let mut manager = manager();
        copy(&mut manager, &["", "   ", "\n\t"]);
        assert!(manager.entries().is_empty());
    }

    #[test]
    fn trimming_follows_config() {
        let config = Config {
            trim_whitespace: true,
            ..Config::default()
        };
        let mut manager = ClipboardManager::new(
            config,
            Box::new(MemoryStore::new()),
            Box::new(StepClock(Cell::new(0))),
        )
        .unwrap();
        copy(&mut manager, &["  padded  ", "padded"]);
        assert_eq!(values(&manager.entries()), vec!["padded"]);
    }

    #[test]
    fn open_then_incremental_then_no_change() {
        let mut manager = manager();
        copy(&mut manager, &["a", "b"]);

        let first = manager.handle(Command::OpenView).unwrap();
        assert_eq!(values(&full_view(&first)), vec!["b", "a"]);

        let fresh = manager
            .handle(Command::ClipboardChanged("c".into()))
            .unwrap();
        match fresh.as_slice() {
            [Notification::View(ViewUpdate::New(entries))] => {
                assert_eq!(values(entries), vec!["c"])
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(values(manager.view().filtered()), vec!["c", "b", "a"]);

        assert!(manager.handle(Command::OpenView).unwrap().is_empty());

        manager.handle(Command::CloseView).unwrap();
        let reopened = manager.handle(Command::OpenView).unwrap();
        assert_eq!(full_view(&reopened).len(), 3);
    }

    #[test]
    fn empty_search_matches_full_view() {
        let mut manager = manager();
        copy(&mut manager, &["x", "y"]);
        manager.handle(Command::OpenView).unwrap();
        copy(&mut manager, &["z"]);
        manager.handle(Command::Search(String::new())).unwrap();
        assert_eq!(manager.view().filtered(), manager.entries().as_slice());
    }

    #[test]
    fn search_and_navigation() {
        let mut manager = manager();
        copy(&mut manager, &["apple", "Banana", "apricot", "grape", "APPLE pie"]);
        manager.handle(Command::OpenView).unwrap();

        manager.handle(Command::Search("ap".into())).unwrap();
        assert_eq!(
            values(manager.view().filtered()),
            vec!["APPLE pie", "grape", "apricot", "apple"]
        );
        assert_eq!(manager.view().active_index(), Some(0));

        manager.handle(Command::NavigateDown(10)).unwrap();
        assert_eq!(manager.view().active_index(), Some(3));
        manager.handle(Command::NavigateUp(1)).unwrap();
        assert_eq!(manager.view().active_index(), Some(2));
        manager.handle(Command::NavigateUp(10)).unwrap();
        assert_eq!(manager.view().active_index(), Some(0));

        manager.handle(Command::NavigateDown(1)).unwrap();
        manager.handle(Command::Search("APP".into())).unwrap();
        assert_eq!(manager.view().active_index(), Some(0));

        manager.handle(Command::Search("nothing".into())).unwrap();
        assert_eq!(manager.view().active_index(), None);
        manager.handle(Command::NavigateDown(1)).unwrap();
        assert_eq!(manager.view().active_index(), None);
    }

    #[test]
    fn search_editing_commands() {
        let mut manager = manager();
        manager.handle(Command::OpenView).unwrap();
        manager.handle(Command::Search("foo bar baz".into())).unwrap();
        manager.handle(Command::ClearLastWord).unwrap();
        assert_eq!(manager.view().search_text(), "foo bar");
        manager.handle(Command::AppendNewline).unwrap();
        assert_eq!(manager.view().search_text(), "foo bar\n");
        manager.handle(Command::ClearSearch).unwrap();
        assert_eq!(manager.view().search_text(), "");
    }

    #[test]
    fn select_current_pastes_and_closes() {
        let mut manager = manager();
        copy(&mut manager, &["one", "two"]);
        manager.handle(Command::OpenView).unwrap();
        manager.handle(Command::NavigateDown(1)).unwrap();

        let out = manager.handle(Command::SelectCurrent).unwrap();
        assert_eq!(out, vec![Notification::Paste("one".into())]);
        assert!(!manager.profiles().view_open());
    }

    #[test]
    fn paste_nth_uses_filtered_positions() {
        let mut manager = manager();
        copy(&mut manager, &["a1", "b1", "a2"]);
        manager.handle(Command::OpenView).unwrap();
        manager.handle(Command::Search("a".into())).unwrap();

        assert!(manager.handle(Command::PasteNth(3)).unwrap().is_empty());
        assert!(manager.handle(Command::PasteNth(0)).unwrap().is_empty());
        let out = manager.handle(Command::PasteNth(2)).unwrap();
        assert_eq!(out, vec![Notification::Paste("a1".into())]);
    }

    #[test]
    fn select_out_of_range_is_noop() {
        let mut manager = manager();
        manager.handle(Command::OpenView).unwrap();
        assert!(manager.handle(Command::Select(4)).unwrap().is_empty());
        assert!(manager.handle(Command::SelectCurrent).unwrap().is_empty());
    }

    #[test]
    fn delete_current_replaces_view_and_clamps_index() {
        let mut manager = manager();
        copy(&mut manager, &["a", "b", "c"]);
        manager.handle(Command::OpenView).unwrap();
        manager.handle(Command::NavigateDown(2)).unwrap();

        let out = manager.handle(Command::DeleteCurrent).unwrap();
        match out.as_slice() {
            [Notification::View(ViewUpdate::Replaced(entries))] => {
                assert_eq!(values(entries), vec!["c", "b"])
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(manager.view().active_index(), Some(1));
    }

    #[test]
    fn macros_from_selection() {
        let mut manager = manager();
        copy(&mut manager, &["foo"]);
        manager.handle(Command::OpenView).unwrap();

        let out = manager.handle(Command::AssignMacro(3)).unwrap();
        assert_eq!(out, vec![Notification::MacrosChanged]);
        assert!(matches!(
            manager.handle(Command::AssignMacro(11)),
            Err(Error::InvalidMacroSlot(11))
        ));

        manager.handle(Command::SetMacrosEnabled(false)).unwrap();
        assert!(manager.handle(Command::PlayMacro(3)).unwrap().is_empty());

        manager.handle(Command::SetMacrosEnabled(true)).unwrap();
        let out = manager.handle(Command::PlayMacro(3)).unwrap();
        assert_eq!(out, vec![Notification::Paste("foo".into())]);

        assert!(manager.handle(Command::PlayMacro(4)).unwrap().is_empty());
        manager.handle(Command::ClearMacros).unwrap();
        assert!(manager.handle(Command::PlayMacro(3)).unwrap().is_empty());
    }

    #[test]
    fn profile_switch_while_open_redelivers() {
        let mut manager = manager();
        copy(&mut manager, &["home"]);
        manager.handle(Command::OpenView).unwrap();

        let out = manager
            .handle(Command::CreateProfile("work".into()))
            .unwrap();
        assert_eq!(out[0], Notification::ProfileChanged("work".into()));
        assert_eq!(out[2], Notification::View(ViewUpdate::Full(Vec::new())));

        let err = manager.handle(Command::CreateProfile("work".into()));
        assert!(matches!(err, Err(Error::DuplicateProfile(_))));

        let out = manager
            .handle(Command::SwitchProfile("default".into()))
            .unwrap();
        assert!(matches!(out.last(), Some(Notification::View(ViewUpdate::Full(e))) if e.len() == 1));

        assert!(matches!(
            manager.handle(Command::RemoveProfile("default".into())),
            Err(Error::ActiveProfileRemoval(_))
        ));
        manager.handle(Command::RemoveProfile("work".into())).unwrap();
    }

    #[test]
    fn cleanup_reports_and_replaces() {
        let mut manager = manager();
        copy(&mut manager, &["dup", "long value here", "x", "dup"]);
        manager.handle(Command::OpenView).unwrap();

        let out = manager
            .handle(Command::Cleanup(CleanupOptions {
                remove_duplicates: true,
                remove_big: true,
                size_threshold: Some(5),
                backup: true,
                ..Default::default()
            }))
            .unwrap();

        assert!(matches!(&out[0], Notification::BackupCreated(Value::Array(a)) if a.len() == 4));
        assert!(matches!(&out[1], Notification::View(ViewUpdate::Replaced(e)) if e.len() == 2));
        match &out[2] {
            Notification::CleanupFinished(report) => {
                assert_eq!(report.removed_duplicates, 1);
                assert_eq!(report.removed_big, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(values(&manager.entries()), vec!["dup", "x"]);
    }

    #[test]
    fn cleanup_uses_configured_threshold_and_age() {
        let mut manager = manager();
        copy(&mut manager, &["old", "new"]);
        let big = "b".repeat(10_001);
        copy(&mut manager, &[big.as_str()]);

        manager
            .handle(Command::Cleanup(CleanupOptions {
                remove_old: true,
                age: Some(AgeCriterion::Before(ts(10, 0, 1))),
                remove_big: true,
                ..Default::default()
            }))
            .unwrap();
        assert_eq!(values(&manager.entries()), vec!["new"]);
    }

    #[test]
    fn cleanup_with_nothing_requested_is_noop() {
        let mut manager = manager();
        copy(&mut manager, &["a", "b", "a"]);
        let out = manager
            .handle(Command::Cleanup(CleanupOptions::default()))
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(manager.entries().len(), 3);
    }

    #[test]
    fn import_merges_or_overrides() {
        let mut manager = manager();
        copy(&mut manager, &["local"]);

        let document = json!({"clipboardHistory": [
            {"value": "imported", "date": "09:00 01-01-2030"},
            {"value": "broken"},
        ]});
        let out = manager
            .handle(Command::ImportBackup {
                document: document.clone(),
                override_all: false,
            })
            .unwrap();
        assert_eq!(
            out.last(),
            Some(&Notification::BackupImported {
                imported: 1,
                dropped: 1
            })
        );
        assert_eq!(values(&manager.entries()), vec!["imported", "local"]);

        manager
            .handle(Command::ImportBackup {
                document,
                override_all: true,
            })
            .unwrap();
        assert_eq!(values(&manager.entries()), vec!["imported"]);
    }

    #[test]
    fn invalid_import_leaves_history_alone() {
        let mut manager = manager();
        copy(&mut manager, &["keep"]);
        let result = manager.handle(Command::ImportBackup {
            document: json!([{"value": ""}]),
            override_all: true,
        });
        assert!(matches!(result, Err(Error::InvalidBackup { dropped: 1 })));
        assert_eq!(values(&manager.entries()), vec!["keep"]);
    }

    #[test]
    fn clear_history_resets_open_view() {
        let mut manager = manager();
        copy(&mut manager, &["a"]);
        assert!(manager.handle(Command::ClearHistory).unwrap().is_empty());

        copy(&mut manager, &["b"]);
        manager.handle(Command::OpenView).unwrap();
        let out = manager.handle(Command::ClearHistory).unwrap();
        assert_eq!(out, vec![Notification::View(ViewUpdate::Reset)]);
        assert!(manager.view().filtered().is_empty());
    }

    #[test]
    fn deleting_unknown_entry_keeps_history() {
        let mut manager = manager();
        manager.handle(Command::OpenView).unwrap();
        assert!(manager.handle(Command::DeleteCurrent).unwrap().is_empty());
        assert!(manager.entries().is_empty());
    }

    #[test]
    fn watching_without_view_stays_bounded() {
        let store = Rc::new(MemoryStore::new());
        let config = Config {
            max_entries: 3,
            ..Config::default()
        };
        let mut manager = ClipboardManager::new(
            config,
            Box::new(Rc::clone(&store)),
            Box::new(StepClock(Cell::new(0))),
        )
        .unwrap();

        for n in 0..50 {
            copy(&mut manager, &[format!("value {n}").as_str()]);
        }
        assert_eq!(
            values(&manager.entries()),
            vec!["value 49", "value 48", "value 47"]
        );
        assert_eq!(store.load_blob(&keys::session("default")).unwrap(), None);
    }

    #[test]
    fn reload_keeps_clear_from_another_process() {
        let store = Rc::new(MemoryStore::new());
        let open = |store: &Rc<MemoryStore>, start: u32| {
            ClipboardManager::new(
                Config::default(),
                Box::new(Rc::clone(store)),
                Box::new(StepClock(Cell::new(start))),
            )
            .unwrap()
        };

        let mut watcher = open(&store, 0);
        copy(&mut watcher, &["secret"]);
        watcher.flush();

        let mut other = open(&store, 10);
        other.handle(Command::ClearHistory).unwrap();
        assert!(other.entries().is_empty());

        watcher.reload().unwrap();
        copy(&mut watcher, &["later"]);
        watcher.flush();

        assert_eq!(values(&open(&store, 20).entries()), vec!["later"]);
    }

    #[test]
    fn reload_reports_profile_switched_elsewhere() {
        let store = Rc::new(MemoryStore::new());
        let open = |store: &Rc<MemoryStore>| {
            ClipboardManager::new(
                Config::default(),
                Box::new(Rc::clone(store)),
                Box::new(StepClock(Cell::new(0))),
            )
            .unwrap()
        };

        let mut overlay = open(&store);
        copy(&mut overlay, &["home"]);
        overlay.handle(Command::OpenView).unwrap();
        assert!(overlay.reload().unwrap().iter().all(|n| matches!(
            n,
            Notification::View(ViewUpdate::Replaced(e)) if e.len() == 1
        )));

        let mut other = open(&store);
        other.handle(Command::CreateProfile("work".into())).unwrap();

        let out = overlay.reload().unwrap();
        assert_eq!(out[0], Notification::ProfileChanged("work".into()));
        assert_eq!(out.last(), Some(&Notification::View(ViewUpdate::Full(Vec::new()))));
        assert!(overlay.entries().is_empty());
    }

    #[test]
    fn state_survives_restart_through_store() {
        let store = Rc::new(MemoryStore::new());
        let open = |store: &Rc<MemoryStore>| {
            ClipboardManager::new(
                Config::default(),
                Box::new(Rc::clone(store)),
                Box::new(StepClock(Cell::new(0))),
            )
            .unwrap()
        };

        let mut manager = open(&store);
        copy(&mut manager, &["first", "second"]);
        manager.handle(Command::OpenView).unwrap();
        manager.handle(Command::AssignMacro(1)).unwrap();
        drop(manager);

        let manager = open(&store);
        assert_eq!(values(&manager.entries()), vec!["second", "first"]);
        assert_eq!(manager.profiles().resolve_macro(1), Some("second"));
    }
}
