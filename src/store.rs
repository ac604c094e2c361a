//! Local state store.
//!
//! [`WorkspaceStore`] owns the in-memory workspace and mirrors it to durable
//! storage. Every change goes through [`WorkspaceStore::mutate`], which works
//! on a clone and only commits it after the whole blob has been written.
//!
//! Loading never fails because of bad data: an unparsable blob falls back to
//! the seeded workspace, a collection with the wrong shape falls back to its
//! own default while the other collections are kept, and inside a list only
//! the records that cannot be read at all are dropped. What happened is
//! reported as [`LoadIssue`]s.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Local, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::migrate::{migrate_legacy, skills_from_agents};
use crate::model::{IntegrationConfig, WorkItem};
use crate::storage::Storage;
use crate::workspace::{self, Workspace};

/// Something load had to repair. Never surfaced as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum LoadIssue {
    /// The blob is not JSON; the seeded workspace was used.
    ParseFailure { message: String },
    /// One collection had the wrong shape and was reset to its default.
    ShapeInvalid { collection: &'static str },
    /// Records of a list that could not be read; the rest were kept.
    RecordsDropped {
        collection: &'static str,
        dropped: usize,
    },
    /// Work items sharing an id; later duplicates were dropped.
    DuplicateIds { dropped: usize },
    /// The workspace was migrated from the legacy key.
    Migrated { from: String },
}

impl std::fmt::Display for LoadIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadIssue::ParseFailure { message } => {
                write!(f, "stored workspace was unreadable ({message}); started from defaults")
            }
            LoadIssue::ShapeInvalid { collection } => {
                write!(f, "stored '{collection}' had the wrong shape and was reset")
            }
            LoadIssue::RecordsDropped {
                collection,
                dropped,
            } => {
                write!(f, "dropped {dropped} unreadable record(s) from '{collection}'")
            }
            LoadIssue::DuplicateIds { dropped } => {
                write!(f, "dropped {dropped} work item(s) with duplicate ids")
            }
            LoadIssue::Migrated { from } => write!(f, "migrated workspace from '{from}'"),
        }
    }
}

/// Rebuild a workspace from a parsed blob, collection by collection.
pub fn recover_workspace(value: Value, today: NaiveDate) -> (Workspace, Vec<LoadIssue>) {
    let Value::Object(mut root) = value else {
        return (
            Workspace::seeded(today),
            vec![LoadIssue::ShapeInvalid {
                collection: "workspace",
            }],
        );
    };

    // Blobs written by the board UI keep an agent roster instead of a
    // skill catalog.
    if !root.contains_key("skills") {
        if let Some(Value::Array(agents)) = root.remove("agents") {
            root.insert(
                "skills".to_string(),
                Value::Array(skills_from_agents(&agents)),
            );
        }
    }

    let mut issues = Vec::new();
    let mut work_items: Vec<WorkItem> =
        list(&mut root, "tasks", &mut issues, || workspace::seed_work_items(today));
    let mut boards: Vec<String> = list(&mut root, "boards", &mut issues, workspace::seed_boards);
    if boards.is_empty() {
        boards = workspace::seed_boards();
    }

    let dropped = dedupe_ids(&mut work_items);
    if dropped > 0 {
        tracing::warn!(dropped, "dropped work items with duplicate ids");
        issues.push(LoadIssue::DuplicateIds { dropped });
    }

    let ws = Workspace {
        work_items,
        boards,
        documents: list(&mut root, "documents", &mut issues, Vec::new),
        wiki: list(&mut root, "wiki", &mut issues, Vec::new),
        time_entries: list(&mut root, "timeEntries", &mut issues, Vec::new),
        skills: list(&mut root, "skills", &mut issues, workspace::seed_skills),
        projects: list(&mut root, "projects", &mut issues, workspace::seed_projects),
        integration: collection(
            &mut root,
            "openClaw",
            &mut issues,
            IntegrationConfig::default,
        ),
    };
    (ws, issues)
}

fn collection<T, F>(
    root: &mut Map<String, Value>,
    name: &'static str,
    issues: &mut Vec<LoadIssue>,
    fallback: F,
) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match root.remove(name) {
        None | Some(Value::Null) => fallback(),
        Some(value) => match serde_json::from_value(value) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(collection = name, error = %err, "collection has the wrong shape, using default");
                issues.push(LoadIssue::ShapeInvalid { collection: name });
                fallback()
            }
        },
    }
}

/// A list collection, read record by record.
fn list<T, F>(
    root: &mut Map<String, Value>,
    name: &'static str,
    issues: &mut Vec<LoadIssue>,
    fallback: F,
) -> Vec<T>
where
    T: DeserializeOwned,
    F: FnOnce() -> Vec<T>,
{
    let records = match root.remove(name) {
        None | Some(Value::Null) => return fallback(),
        Some(Value::Array(records)) => records,
        Some(_) => {
            tracing::warn!(collection = name, "collection is not a list, using default");
            issues.push(LoadIssue::ShapeInvalid { collection: name });
            return fallback();
        }
    };

    let total = records.len();
    let kept: Vec<T> = records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!(collection = name, error = %err, "dropping unreadable record");
                None
            }
        })
        .collect();
    let dropped = total - kept.len();
    if dropped > 0 {
        issues.push(LoadIssue::RecordsDropped {
            collection: name,
            dropped,
        });
    }
    kept
}

/// Drop later work items that reuse an id. Returns how many were dropped.
pub(crate) fn dedupe_ids(items: &mut Vec<WorkItem>) -> usize {
    let before = items.len();
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.id.clone()));
    before - items.len()
}

fn decode_blob(raw: &str, today: NaiveDate) -> (Workspace, Vec<LoadIssue>) {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => recover_workspace(value, today),
        Err(err) => {
            tracing::warn!(error = %err, "workspace blob is not valid JSON, using defaults");
            (
                Workspace::seeded(today),
                vec![LoadIssue::ParseFailure {
                    message: err.to_string(),
                }],
            )
        }
    }
}

/// Owner of the in-memory workspace and its durable mirror.
#[derive(Debug)]
pub struct WorkspaceStore {
    storage: Storage,
    config: StorageConfig,
    state: Workspace,
    issues: Vec<LoadIssue>,
    /// Blob last read from or written to storage.
    last_seen: Option<String>,
}

impl WorkspaceStore {
    /// Open the store and load the current workspace.
    pub fn open(storage: Storage, config: StorageConfig) -> Result<Self> {
        let storage = storage.with_lock_timeout(config.lock_timeout_ms);
        let mut store = Self {
            storage,
            config,
            state: Workspace::empty(),
            issues: Vec::new(),
            last_seen: None,
        };
        store.load()?;
        Ok(store)
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn storage_key(&self) -> &str {
        &self.config.key
    }

    pub fn workspace(&self) -> &Workspace {
        &self.state
    }

    /// Repairs made by the most recent load.
    pub fn issues(&self) -> &[LoadIssue] {
        &self.issues
    }

    /// (Re)load from durable storage, replacing the in-memory workspace.
    ///
    /// Only I/O failures are errors; bad content falls back to defaults.
    pub fn load(&mut self) -> Result<&Workspace> {
        let today = Local::now().date_naive();
        let (state, issues, seen) = match self.storage.get(&self.config.key)? {
            Some(raw) => {
                let (ws, issues) = decode_blob(&raw, today);
                (ws, issues, Some(raw))
            }
            None => match self.storage.get(&self.config.legacy_key)? {
                Some(legacy) => self.migrate(&legacy, today)?,
                None => (Workspace::seeded(today), Vec::new(), None),
            },
        };

        tracing::debug!(
            key = %self.config.key,
            items = state.work_items.len(),
            issues = issues.len(),
            "workspace loaded"
        );
        self.state = state;
        self.issues = issues;
        self.last_seen = seen;
        Ok(&self.state)
    }

    fn migrate(
        &self,
        legacy: &str,
        today: NaiveDate,
    ) -> Result<(Workspace, Vec<LoadIssue>, Option<String>)> {
        let value = match serde_json::from_str::<Value>(legacy) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "legacy blob is not valid JSON, skipping migration");
                let issues = vec![LoadIssue::ParseFailure {
                    message: err.to_string(),
                }];
                return Ok((Workspace::seeded(today), issues, None));
            }
        };

        let (ws, mut issues) = recover_workspace(migrate_legacy(value, today), today);
        issues.insert(
            0,
            LoadIssue::Migrated {
                from: self.config.legacy_key.clone(),
            },
        );
        // A lossy migration is not saved: the legacy blob stays the only
        // copy on disk until the next mutation writes the current key.
        let lossy = issues.iter().any(|issue| {
            matches!(
                issue,
                LoadIssue::ShapeInvalid { .. } | LoadIssue::RecordsDropped { .. }
            )
        });
        if lossy {
            tracing::warn!(from = %self.config.legacy_key, "legacy workspace needed repairs, not saving the migration");
            return Ok((ws, issues, None));
        }

        let json = ws.to_json()?;
        self.storage.set(&self.config.key, &json)?;
        tracing::info!(from = %self.config.legacy_key, to = %self.config.key, "migrated legacy workspace");
        Ok((ws, issues, Some(json)))
    }

    /// Apply `f` to a copy of the workspace and commit it.
    ///
    /// If `f` fails the copy is dropped and nothing is written. If the write
    /// fails the previous workspace stays current. Exactly one write happens
    /// per successful call.
    pub fn mutate<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Workspace) -> Result<T>,
    {
        let mut next = self.state.clone();
        let value = f(&mut next)?;
        let json = next.to_json()?;
        self.storage.set(&self.config.key, &json)?;
        self.state = next;
        self.last_seen = Some(json);
        Ok(value)
    }

    /// Write the whole current workspace to durable storage.
    pub fn persist(&mut self) -> Result<()> {
        let json = self.state.to_json()?;
        self.storage.set(&self.config.key, &json)?;
        self.last_seen = Some(json);
        Ok(())
    }

    /// Reload if durable storage no longer holds what this store last saw.
    ///
    /// Another instance wrote in between: its blob wins wholesale.
    pub fn refresh_if_changed(&mut self) -> Result<bool> {
        let current = self.storage.get(&self.config.key)?;
        if current == self.last_seen {
            return Ok(false);
        }
        tracing::info!(key = %self.config.key, "workspace changed by another instance, reloading");
        self.load()?;
        Ok(true)
    }
}

/// Cloneable handle to one store, shared by the CLI, agent runs and the
/// change watcher. The lock is never held across an `.await`.
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<WorkspaceStore>>,
}

impl SharedStore {
    pub fn new(store: WorkspaceStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, WorkspaceStore>> {
        self.inner
            .lock()
            .map_err(|_| Error::OperationFailed("workspace store lock poisoned".to_string()))
    }

    pub fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Workspace) -> Result<T>,
    {
        self.lock()?.mutate(f)
    }

    /// Independent copy of the current workspace.
    pub fn snapshot(&self) -> Result<Workspace> {
        Ok(self.lock()?.workspace().clone())
    }

    /// Run `f` against the current workspace without copying it.
    pub fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Workspace) -> T,
    {
        Ok(f(self.lock()?.workspace()))
    }

    pub fn persist(&self) -> Result<()> {
        self.lock()?.persist()
    }

    pub fn issues(&self) -> Result<Vec<LoadIssue>> {
        Ok(self.lock()?.issues().to_vec())
    }

    pub fn refresh_if_changed(&self) -> Result<bool> {
        self.lock()?.refresh_if_changed()
    }

    pub fn storage_path(&self) -> Result<std::path::PathBuf> {
        let store = self.lock()?;
        store.storage().path_for(store.storage_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    #[test]
    fn wrong_shaped_collections_default_independently() {
        let blob = json!({
            "tasks": [{"id": "t1", "title": "Keep me", "status": "Review"}],
            "boards": "not-a-list",
            "documents": [{"id": "d1", "name": "Brief", "url": "docs/brief.md"}],
            "wiki": {"oops": true},
            "timeEntries": [],
            "openClaw": {"url": "https://agents.local", "token": "t"}
        });

        let (ws, issues) = recover_workspace(blob, today());
        assert_eq!(ws.work_items.len(), 1);
        assert_eq!(ws.work_items[0].title, "Keep me");
        assert_eq!(ws.boards, workspace::seed_boards());
        assert_eq!(ws.documents.len(), 1);
        assert!(ws.wiki.is_empty());
        assert_eq!(ws.integration.url, "https://agents.local");
        assert_eq!(
            issues,
            vec![
                LoadIssue::ShapeInvalid { collection: "boards" },
                LoadIssue::ShapeInvalid { collection: "wiki" },
            ]
        );
    }

    #[test]
    fn one_unreadable_record_keeps_its_siblings() {
        let blob = json!({
            "tasks": [
                {"id": "a", "title": "Mine A"},
                {"id": "b", "title": "Mine B", "status": "Shipped"},
                {"id": "c", "title": "Mine C", "estimateHours": null},
                {"title": "No id"},
                42
            ],
            "projects": [{"id": "p1", "name": "Core", "budget": null}]
        });

        let (ws, issues) = recover_workspace(blob, today());
        let titles: Vec<_> = ws.work_items.iter().map(|item| item.title.as_str()).collect();
        assert_eq!(titles, vec!["Mine A", "Mine B", "Mine C"]);
        assert_eq!(ws.work_items[2].estimate_hours, 0.0);
        assert_eq!(ws.projects[0].budget, 0.0);
        assert_eq!(
            issues,
            vec![LoadIssue::RecordsDropped {
                collection: "tasks",
                dropped: 2
            }]
        );
    }

    #[test]
    fn agent_roster_becomes_the_skill_catalog() {
        let blob = json!({
            "tasks": [],
            "agents": [
                {"id": "x1", "name": "FlowBot", "skills": ["planning", "research"], "status": "Available", "load": 35},
                {"id": "x2", "name": "MarketPilot", "skills": ["marketing", "content"], "status": "Busy", "load": 75}
            ]
        });

        let (ws, issues) = recover_workspace(blob, today());
        let names: Vec<_> = ws.skills.iter().map(|skill| skill.name.as_str()).collect();
        assert_eq!(names, vec!["planning", "research", "marketing", "content"]);
        assert!(issues.is_empty());
    }

    #[test]
    fn missing_collections_use_defaults_without_issues() {
        let (ws, issues) = recover_workspace(json!({"tasks": []}), today());
        assert!(ws.work_items.is_empty());
        assert_eq!(ws.projects.len(), 1);
        assert!(!ws.skills.is_empty());
        assert!(issues.is_empty());
    }

    #[test]
    fn non_object_blob_is_reseeded() {
        let (ws, issues) = recover_workspace(json!([1, 2, 3]), today());
        assert_eq!(ws.work_items.len(), 2);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn duplicate_ids_are_dropped() {
        let blob = json!({
            "tasks": [
                {"id": "same", "title": "First"},
                {"id": "same", "title": "Second"}
            ]
        });
        let (ws, issues) = recover_workspace(blob, today());
        assert_eq!(ws.work_items.len(), 1);
        assert_eq!(ws.work_items[0].title, "First");
        assert_eq!(issues, vec![LoadIssue::DuplicateIds { dropped: 1 }]);
    }

    #[test]
    fn garbage_blob_is_a_parse_failure() {
        let (ws, issues) = decode_blob("{not json", today());
        assert_eq!(ws.boards, workspace::seed_boards());
        assert!(matches!(issues[0], LoadIssue::ParseFailure { .. }));
    }
}
