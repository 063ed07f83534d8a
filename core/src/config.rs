use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Oldest entries beyond this are evicted on commit; 0 disables the bound.
    pub max_entries: usize,
    pub poll_interval_ms: u64,
    pub trim_whitespace: bool,
    pub default_profile: String,
    /// Characters; entries longer than this count as big for cleanup.
    pub big_entry_threshold: usize,
    pub max_display_length: usize,
    pub max_print_entries: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("cliplog");

        Self {
            data_dir,
            max_entries: 10000,
            poll_interval_ms: 500,
            trim_whitespace: false,
            default_profile: "default".to_string(),
            big_entry_threshold: 10000,
            max_display_length: 200,
            max_print_entries: 1000,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = dirs::config_dir()
            .unwrap_or_default()
            .join("cliplog")
            .join("config.toml");
        Self::load_from(&config_path)
    }

    /// Reads `path`, writing defaults there first if it does not exist.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path)?;
            toml::from_str(&content)
                .with_context(|| format!("Invalid config {}", config_path.display()))
        } else {
            let config = Self::default();
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(config_path, toml::to_string_pretty(&config)?)?;
            Ok(config)
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("history.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cliplog").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.max_entries, 10000);
        assert_eq!(config.default_profile, "default");
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_entries = 50\ntrim_whitespace = true\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.max_entries, 50);
        assert!(config.trim_whitespace);
        assert_eq!(config.big_entry_threshold, 10000);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_entries = \"lots\"").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
