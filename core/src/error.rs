use thiserror::Error;

/// Failures reported to callers of the history engine.
///
/// Validation variants leave all state untouched.
#[derive(Debug, Error)]
pub enum Error {
    #[error("macro slot {0} is out of range (expected 1-9)")]
    InvalidMacroSlot(u8),

    #[error("profile `{0}` already exists")]
    DuplicateProfile(String),

    #[error("profile `{0}` does not exist")]
    UnknownProfile(String),

    #[error("profile `{0}` is active; switch to another profile first")]
    ActiveProfileRemoval(String),

    #[error("profile name must not be empty")]
    EmptyProfileName,

    #[error("backup contains no usable entries ({dropped} malformed records dropped)")]
    InvalidBackup { dropped: usize },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
