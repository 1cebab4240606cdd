//! Search engine settings
//!
//! Loaded from `search.json` in the shared Murmur config directory. Every
//! field has a default, so a partial file (or none at all) is valid.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::search::{DEFAULT_HEAP_SIZE, IndexKind, MIN_HEAP_SIZE};

/// Settings filename in the Murmur config directory
const SETTINGS_FILE: &str = "search.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Keep the indexes up to date as entities change
    pub enable_indexing: bool,
    /// Serve post searches from the indexes
    pub enable_searching: bool,
    /// Serve user and channel autocomplete from the indexes
    pub enable_autocomplete: bool,
    /// Directory holding one sub-directory per index
    pub index_dir: String,
    /// Memory budget of each index writer in bytes
    pub writer_heap_bytes: usize,
    /// Callers should wait for indexing to finish before returning
    pub index_sync: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            enable_indexing: false,
            enable_searching: false,
            enable_autocomplete: false,
            index_dir: String::new(),
            writer_heap_bytes: DEFAULT_HEAP_SIZE,
            index_sync: false,
        }
    }
}

impl SearchSettings {
    /// Settings with everything enabled and indexes under `index_dir`
    pub fn enabled(index_dir: impl AsRef<Path>) -> Self {
        Self {
            enable_indexing: true,
            enable_searching: true,
            enable_autocomplete: true,
            index_dir: index_dir.as_ref().to_string_lossy().into_owned(),
            ..Default::default()
        }
    }

    /// Load `search.json` from the config directory, defaulting when absent
    pub fn load() -> Result<Self> {
        let settings: Self = config::load_json_or_default(SETTINGS_FILE)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings: Self = config::load_json_file(path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self =
            serde_json::from_str(json).context("Failed to parse search settings JSON")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Persist settings to `search.json` in the config directory
    pub fn save(&self) -> Result<PathBuf> {
        config::save_json(SETTINGS_FILE, self)
    }

    /// Reject settings the engine could not start with
    pub fn validate(&self) -> Result<()> {
        if self.enable_indexing && self.index_dir.trim().is_empty() {
            bail!("Indexing is enabled but no index directory is configured");
        }
        if self.writer_heap_bytes < MIN_HEAP_SIZE {
            bail!(
                "writer_heap_bytes must be at least {} (got {})",
                MIN_HEAP_SIZE,
                self.writer_heap_bytes
            );
        }
        Ok(())
    }

    /// Indexing is on and there is somewhere to put the indexes
    pub fn is_active(&self) -> bool {
        self.enable_indexing && !self.index_dir.is_empty()
    }

    /// On-disk location of one index
    pub fn index_path(&self, kind: IndexKind) -> PathBuf {
        Path::new(&self.index_dir).join(kind.dir_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_inactive() {
        let settings = SearchSettings::default();
        assert!(!settings.is_active());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = SearchSettings::from_json(
            r#"{ "enable_indexing": true, "index_dir": "/var/lib/murmur/index" }"#,
        )
        .unwrap();
        assert!(settings.is_active());
        assert!(!settings.enable_searching);
        assert_eq!(settings.writer_heap_bytes, DEFAULT_HEAP_SIZE);
        assert_eq!(
            settings.index_path(IndexKind::Posts),
            PathBuf::from("/var/lib/murmur/index/posts")
        );
    }

    #[test]
    fn test_indexing_without_dir_is_invalid() {
        let result = SearchSettings::from_json(r#"{ "enable_indexing": true }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_small_heap_is_invalid() {
        let settings = SearchSettings {
            writer_heap_bytes: 1024,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_dir_without_indexing_is_inactive() {
        let settings = SearchSettings {
            index_dir: "/tmp/index".to_string(),
            ..Default::default()
        };
        assert!(!settings.is_active());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.json");
        std::fs::write(&path, r#"{ "enable_autocomplete": true }"#).unwrap();

        let settings = SearchSettings::from_file(&path).unwrap();
        assert!(settings.enable_autocomplete);
        assert!(!settings.enable_indexing);
    }
}
