//! Configuration loading and management
//!
//! Handles parsing of `hustle.toml` in the data directory, plus a handful of
//! environment overrides for credentials.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;

/// Environment variables that override file settings.
pub const ENV_REMOTE_URL: &str = "HUSTLE_REMOTE_URL";
pub const ENV_REMOTE_KEY: &str = "HUSTLE_REMOTE_KEY";
pub const ENV_WORKSPACE_ID: &str = "HUSTLE_WORKSPACE_ID";
pub const ENV_ASSIST_URL: &str = "HUSTLE_ASSIST_URL";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub assist: AssistConfig,
}

/// Local durable storage keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Key holding the current workspace blob
    #[serde(default = "default_storage_key")]
    pub key: String,

    /// Key of the previous format, migrated once when `key` is absent
    #[serde(default = "default_legacy_key")]
    pub legacy_key: String,

    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_storage_key() -> String {
    "hustle_flow_v2".to_string()
}

fn default_legacy_key() -> String {
    "hustle_flow_v1".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key: default_storage_key(),
            legacy_key: default_legacy_key(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Remote table store used by push/pull
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the REST table store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// API key, sent as `apikey` and bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Every remote row is scoped to this identifier
    #[serde(default = "default_workspace_id")]
    pub workspace_id: String,

    /// Blob bucket for uploaded documents
    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_workspace_id() -> String {
    "primary".to_string()
}

fn default_bucket() -> String {
    "documents".to_string()
}

fn default_remote_timeout_secs() -> u64 {
    30
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            workspace_id: default_workspace_id(),
            bucket: default_bucket(),
            timeout_secs: default_remote_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    /// Both endpoint and credentials are present.
    pub fn is_configured(&self) -> bool {
        non_blank(self.url.as_deref()).is_some() && non_blank(self.api_key.as_deref()).is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Agent run simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Offsets from run start of the three simulated steps
    #[serde(default = "default_step_offsets_ms")]
    pub step_offsets_ms: Vec<u64>,

    /// Timeout for the skill collaborator call
    #[serde(default = "default_agent_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_step_offsets_ms() -> Vec<u64> {
    vec![900, 1800, 2700]
}

fn default_agent_timeout_secs() -> u64 {
    20
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            step_offsets_ms: default_step_offsets_ms(),
            timeout_secs: default_agent_timeout_secs(),
        }
    }
}

impl AgentConfig {
    pub fn step_offsets(&self) -> [Duration; 3] {
        let mut offsets = [Duration::ZERO; 3];
        for (slot, ms) in offsets.iter_mut().zip(&self.step_offsets_ms) {
            *slot = Duration::from_millis(*ms);
        }
        offsets
    }
}

/// AI text-generation collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_assist_model")]
    pub model: String,

    #[serde(default = "default_assist_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_assist_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_assist_timeout_secs() -> u64 {
    60
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_assist_model(),
            timeout_secs: default_assist_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a `hustle.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `hustle.toml` from `dir` if it exists, defaults otherwise.
    ///
    /// An invalid file is an error here: silently ignoring it would also
    /// silently drop remote credentials.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(crate::storage::CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply process environment overrides.
    pub fn with_env(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup` (environment-shaped).
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(url) = get(ENV_REMOTE_URL) {
            self.remote.url = Some(url);
        }
        if let Some(key) = get(ENV_REMOTE_KEY) {
            self.remote.api_key = Some(key);
        }
        if let Some(id) = get(ENV_WORKSPACE_ID) {
            self.remote.workspace_id = id;
        }
        if let Some(url) = get(ENV_ASSIST_URL) {
            self.assist.endpoint = Some(url);
        }
        self
    }

    fn validate(&self) -> Result<()> {
        self.storage.validate()?;
        self.remote.validate()?;
        self.agent.validate()?;
        Ok(())
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        for (field, key) in [("storage.key", &self.key), ("storage.legacy_key", &self.legacy_key)] {
            if key.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("{field} cannot be empty")));
            }
        }
        if self.key == self.legacy_key {
            return Err(Error::InvalidConfig(
                "storage.key and storage.legacy_key must differ".to_string(),
            ));
        }
        Ok(())
    }
}

impl RemoteConfig {
    fn validate(&self) -> Result<()> {
        if self.workspace_id.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "remote.workspace_id cannot be empty".to_string(),
            ));
        }
        if let Some(url) = non_blank(self.url.as_deref()) {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::InvalidConfig(format!(
                    "remote.url must be an http(s) URL, got '{url}'"
                )));
            }
        }
        if self.timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "remote.timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl AgentConfig {
    fn validate(&self) -> Result<()> {
        if self.step_offsets_ms.len() != 3 {
            return Err(Error::InvalidConfig(
                "agent.step_offsets_ms must have exactly 3 entries".to_string(),
            ));
        }
        if self.step_offsets_ms.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(Error::InvalidConfig(
                "agent.step_offsets_ms must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_expected() {
        let config = Config::default();
        assert_eq!(config.storage.key, "hustle_flow_v2");
        assert_eq!(config.storage.legacy_key, "hustle_flow_v1");
        assert_eq!(config.remote.workspace_id, "primary");
        assert!(!config.remote.is_configured());
        assert_eq!(config.agent.step_offsets_ms, vec![900, 1800, 2700]);
        assert_eq!(config.assist.model, "gemini-2.5-flash");
    }

    #[test]
    fn load_parses_overrides() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hustle.toml");
        fs::write(
            &path,
            r#"
[remote]
url = "https://db.example.com"
api_key = "anon"
workspace_id = "team"

[agent]
step_offsets_ms = [10, 20, 30]
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.remote.is_configured());
        assert_eq!(config.remote.workspace_id, "team");
        assert_eq!(config.remote.bucket, "documents");
        assert_eq!(config.agent.step_offsets()[2], Duration::from_millis(30));
    }

    #[test]
    fn non_increasing_offsets_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hustle.toml");
        fs::write(&path, "[agent]\nstep_offsets_ms = [10, 10, 30]\n").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn non_http_remote_url_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hustle.toml");
        fs::write(&path, "[remote]\nurl = \"ftp://x\"\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from_dir(temp.path()).unwrap();
        assert_eq!(config.storage.key, "hustle_flow_v2");
    }

    #[test]
    fn env_overrides_take_precedence() {
        let config = Config::default().with_overrides(|name| match name {
            ENV_REMOTE_URL => Some("https://env.example.com".to_string()),
            ENV_REMOTE_KEY => Some("secret".to_string()),
            ENV_ASSIST_URL => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(config.remote.url.as_deref(), Some("https://env.example.com"));
        assert!(config.remote.is_configured());
        assert_eq!(config.assist.endpoint, None);
    }

    #[test]
    fn save_writes_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hustle.toml");
        let mut config = Config::default();
        config.remote.workspace_id = "saved".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.remote.workspace_id, "saved");
    }
}
