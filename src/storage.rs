//! Durable key/value storage for hustle
//!
//! A directory plays the role of browser local storage: each key is one
//! JSON file, written atomically under a lock.
//!
//! # Directory Structure
//!
//! ```text
//! <data dir>/
//!   hustle.toml                 # Configuration
//!   hustle_flow_v2.json         # Current workspace blob
//!   hustle_flow_v2.json.lock    # Writer lock
//!   hustle_flow_v1.json         # Legacy blob (read once for migration)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::{Error, Result};
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};

/// Name of the configuration file inside the data directory
pub const CONFIG_FILE: &str = "hustle.toml";

/// Storage manager for hustle state
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    lock_timeout_ms: u64,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    /// Storage in the platform data directory (e.g. `~/.local/share/hustle-flow`).
    pub fn platform_default() -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "hustle-flow").ok_or_else(|| {
            Error::InvalidConfig("could not determine a data directory; pass --dir".to_string())
        })?;
        Ok(Self::new(dirs.data_dir()))
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// File backing `key`. Keys are restricted to `[A-Za-z0-9_-]`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.json")))
    }

    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    // =========================================================================
    // Key/value access
    // =========================================================================

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        lock::read_locked_str(&path, self.lock_timeout_ms)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        lock::write_atomic_locked(&path, value.as_bytes(), self.lock_timeout_ms)?;
        tracing::trace!(key, bytes = value.len(), "storage write");
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!("invalid storage key '{key}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn set_then_get_round_trips() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());

        assert_eq!(storage.get("hustle_flow_v2").unwrap(), None);
        storage.set("hustle_flow_v2", "{\"tasks\":[]}").unwrap();
        assert_eq!(
            storage.get("hustle_flow_v2").unwrap().as_deref(),
            Some("{\"tasks\":[]}")
        );
    }

    #[test]
    fn keys_cannot_escape_root() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        assert!(storage.path_for("../etc/passwd").is_err());
        assert!(storage.path_for("").is_err());
        assert!(storage.path_for("hustle-flow_v2").is_ok());
    }
}
