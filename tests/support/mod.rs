#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use hustle::config::StorageConfig;
use hustle::storage::Storage;
use hustle::store::{SharedStore, WorkspaceStore};
use serde_json::Value;
use tempfile::TempDir;

/// A throwaway data directory.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn storage(&self) -> Storage {
        Storage::new(self.dir.path())
    }

    /// File holding the current workspace blob.
    pub fn blob_path(&self) -> PathBuf {
        self.dir
            .path()
            .join(format!("{}.json", StorageConfig::default().key))
    }

    pub fn shared_store(&self) -> SharedStore {
        let store = WorkspaceStore::open(self.storage(), StorageConfig::default())
            .expect("open store");
        SharedStore::new(store)
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join("hustle.toml");
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// `hf` pointed at this directory, with remote and assist overrides
    /// cleared from the environment.
    pub fn hf(&self) -> Command {
        let mut cmd = Command::cargo_bin("hf").expect("hf binary");
        cmd.arg("--dir")
            .arg(self.dir.path())
            .env_remove("HUSTLE_DIR")
            .env_remove("HUSTLE_REMOTE_URL")
            .env_remove("HUSTLE_REMOTE_KEY")
            .env_remove("HUSTLE_WORKSPACE_ID")
            .env_remove("HUSTLE_ASSIST_URL")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Run `hf <args> --json` and return the `data` field of the envelope.
    pub fn hf_json(&self, args: &[&str]) -> Value {
        let output = self
            .hf()
            .args(args)
            .arg("--json")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let value: Value = serde_json::from_slice(&output).expect("json envelope");
        value["data"].clone()
    }
}
