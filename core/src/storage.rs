use anyhow::{Context, Result};
use parking_lot::RwLock;
use rusqlite::{Connection as SqliteConnection, OptionalExtension, params};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Key-value persistence the engine writes through.
pub trait BlobStore {
    fn load_blob(&self, key: &str) -> Result<Option<Value>>;
    fn save_blob(&self, key: &str, value: &Value) -> Result<()>;
    fn remove_blob(&self, key: &str) -> Result<()>;
}

pub mod keys {
    pub const PROFILES: &str = "profiles";
    pub const ACTIVE_PROFILE: &str = "active_profile";
    /// Unscoped history written before profiles existed.
    pub const LEGACY_HISTORY: &str = "clipboardHistory";

    pub fn history(profile: &str) -> String {
        format!("history:{profile}")
    }

    pub fn macros(profile: &str) -> String {
        format!("macros:{profile}")
    }

    pub fn macros_enabled(profile: &str) -> String {
        format!("macros_enabled:{profile}")
    }

    pub fn session(profile: &str) -> String {
        format!("session:{profile}")
    }
}

pub struct SqliteStore {
    db: SqliteConnection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = SqliteConnection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Self::init_db(&db)?;
        Ok(Self { db })
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = SqliteConnection::open_in_memory()?;
        Self::init_db(&db)?;
        Ok(Self { db })
    }

    fn init_db(db: &SqliteConnection) -> Result<()> {
        db.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;",
        )?;

        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS blobs (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER DEFAULT 0
            );",
        )?;

        // schema migration for databases created without updated_at
        let has_updated_at: bool = db.query_row(
            "SELECT COUNT(*) FROM pragma_table_info('blobs') WHERE name='updated_at'",
            [],
            |row| row.get::<_, i64>(0).map(|count| count > 0),
        )?;

        if !has_updated_at {
            db.execute(
                "ALTER TABLE blobs ADD COLUMN updated_at INTEGER DEFAULT 0",
                [],
            )?;
        }

        Ok(())
    }
}

impl BlobStore for SqliteStore {
    fn load_blob(&self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = self
            .db
            .query_row(
                "SELECT value FROM blobs WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(text) => Ok(Some(
                serde_json::from_str(&text).with_context(|| format!("Corrupt blob {key}"))?,
            )),
            None => Ok(None),
        }
    }

    fn save_blob(&self, key: &str, value: &Value) -> Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        self.db.execute(
            "INSERT OR REPLACE INTO blobs (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, serde_json::to_string(value)?, now],
        )?;
        Ok(())
    }

    fn remove_blob(&self, key: &str) -> Result<()> {
        self.db
            .execute("DELETE FROM blobs WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl BlobStore for MemoryStore {
    fn load_blob(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn save_blob(&self, key: &str, value: &Value) -> Result<()> {
        self.inner.write().insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove_blob(&self, key: &str) -> Result<()> {
        self.inner.write().remove(key);
        Ok(())
    }
}

impl<T: BlobStore + ?Sized> BlobStore for std::rc::Rc<T> {
    fn load_blob(&self, key: &str) -> Result<Option<Value>> {
        (**self).load_blob(key)
    }

    fn save_blob(&self, key: &str, value: &Value) -> Result<()> {
        (**self).save_blob(key, value)
    }

    fn remove_blob(&self, key: &str) -> Result<()> {
        (**self).remove_blob(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exercise(store: &dyn BlobStore) {
        assert_eq!(store.load_blob("missing").unwrap(), None);

        store.save_blob("k", &json!({"a": [1, 2]})).unwrap();
        assert_eq!(store.load_blob("k").unwrap(), Some(json!({"a": [1, 2]})));

        store.save_blob("k", &json!("replaced")).unwrap();
        assert_eq!(store.load_blob("k").unwrap(), Some(json!("replaced")));

        store.remove_blob("k").unwrap();
        assert_eq!(store.load_blob("k").unwrap(), None);
    }

    #[test]
    fn memory_store_contract() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn sqlite_store_contract() {
        exercise(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("cliplog.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_blob(&keys::history("work"), &json!([])).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load_blob("history:work").unwrap(), Some(json!([])));
    }

    #[test]
    fn scoped_keys() {
        assert_eq!(keys::history("p"), "history:p");
        assert_eq!(keys::macros("p"), "macros:p");
        assert_eq!(keys::macros_enabled("p"), "macros_enabled:p");
        assert_eq!(keys::session("p"), "session:p");
    }
}
