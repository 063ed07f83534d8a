pub mod backup;
pub mod cleanup;
pub mod config;
pub mod display;
pub mod entry;
pub mod error;
pub mod history;
pub mod macros;
pub mod manager;
pub mod profile;
pub mod session;
pub mod storage;

pub use cleanup::{AgeCriterion, CleanupOptions, CleanupReport, TimeUnit};
pub use config::Config;
pub use entry::{Clock, Entry, SystemClock, Timestamp};
pub use error::{Error, Result};
pub use history::HistoryStore;
pub use macros::MacroRegistry;
pub use manager::{ClipboardManager, Command, Notification};
pub use profile::ProfileManager;
pub use session::{SessionBuffer, ViewUpdate};
pub use storage::{BlobStore, MemoryStore, SqliteStore};
