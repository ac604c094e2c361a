//! In-process remote store.
//!
//! Behaves like the REST store (rows scoped by workspace id, upsert keyed
//! by scope) and supports injected failures for exercising partial pushes.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use super::{BlobStore, RemoteStore, Table, SCOPE_COLUMN};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct State {
    tables: HashMap<Table, Vec<Value>>,
    blobs: BTreeMap<String, Vec<u8>>,
    failing_inserts: Option<Table>,
    offline: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: Mutex<State>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::OperationFailed("memory remote lock poisoned".to_string()))
    }

    /// Make every insert into `table` fail until cleared.
    pub fn fail_inserts_into(&self, table: Option<Table>) -> Result<()> {
        self.lock()?.failing_inserts = table;
        Ok(())
    }

    /// Make every call fail with `message` (`None` restores service).
    pub fn set_offline(&self, message: Option<&str>) -> Result<()> {
        self.lock()?.offline = message.map(str::to_string);
        Ok(())
    }

    /// Rows of `table` for `workspace_id`, as stored.
    pub fn rows(&self, table: Table, workspace_id: &str) -> Result<Vec<Value>> {
        let state = self.lock()?;
        Ok(scoped(&state, table, workspace_id).cloned().collect())
    }

    /// Drop all rows of `table`, whatever their scope.
    pub fn clear(&self, table: Table) -> Result<()> {
        self.lock()?.tables.remove(&table);
        Ok(())
    }

    pub fn blob(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.blobs.get(path).cloned())
    }

    fn check_online(state: &State, stage: String) -> Result<()> {
        match &state.offline {
            Some(message) => Err(Error::remote(stage, message)),
            None => Ok(()),
        }
    }
}

fn scope_of(row: &Value) -> Option<&str> {
    row.get(SCOPE_COLUMN).and_then(Value::as_str)
}

fn scoped<'a>(
    state: &'a State,
    table: Table,
    workspace_id: &'a str,
) -> impl Iterator<Item = &'a Value> + 'a {
    state
        .tables
        .get(&table)
        .into_iter()
        .flatten()
        .filter(move |row| scope_of(row) == Some(workspace_id))
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn select(&self, table: Table, workspace_id: &str) -> Result<Vec<Value>> {
        let state = self.lock()?;
        Self::check_online(&state, format!("select {table}"))?;
        Ok(scoped(&state, table, workspace_id).cloned().collect())
    }

    async fn delete_scope(&self, table: Table, workspace_id: &str) -> Result<()> {
        let mut state = self.lock()?;
        Self::check_online(&state, format!("delete {table}"))?;
        if let Some(rows) = state.tables.get_mut(&table) {
            rows.retain(|row| scope_of(row) != Some(workspace_id));
        }
        Ok(())
    }

    async fn insert(&self, table: Table, rows: &[Value]) -> Result<()> {
        let mut state = self.lock()?;
        Self::check_online(&state, format!("insert {table}"))?;
        if state.failing_inserts == Some(table) {
            return Err(Error::remote(format!("insert {table}"), "injected failure"));
        }
        state
            .tables
            .entry(table)
            .or_default()
            .extend(rows.iter().cloned());
        Ok(())
    }

    async fn upsert(&self, table: Table, row: &Value) -> Result<()> {
        let mut state = self.lock()?;
        Self::check_online(&state, format!("upsert {table}"))?;
        let scope = scope_of(row).map(str::to_string);
        let rows = state.tables.entry(table).or_default();
        match rows
            .iter_mut()
            .find(|existing| scope_of(existing).map(str::to_string) == scope)
        {
            Some(existing) => *existing = row.clone(),
            None => rows.push(row.clone()),
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryRemote {
    async fn upload(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        let mut state = self.lock()?;
        Self::check_online(&state, format!("upload {path}"))?;
        if state.blobs.contains_key(path) {
            return Err(Error::remote(format!("upload {path}"), "object already exists"));
        }
        state.blobs.insert(path.to_string(), bytes);
        Ok(format!("memory://public/{path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn delete_scope_leaves_other_workspaces() {
        let remote = MemoryRemote::new();
        remote
            .insert(
                Table::WorkItems,
                &[
                    json!({"workspace_id": "a", "id": "1"}),
                    json!({"workspace_id": "b", "id": "2"}),
                ],
            )
            .await
            .unwrap();

        remote.delete_scope(Table::WorkItems, "a").await.unwrap();
        assert!(remote.rows(Table::WorkItems, "a").unwrap().is_empty());
        assert_eq!(remote.rows(Table::WorkItems, "b").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upsert_replaces_row_with_same_scope() {
        let remote = MemoryRemote::new();
        let table = Table::IntegrationConfigs;
        remote
            .upsert(table, &json!({"workspace_id": "a", "url": "one"}))
            .await
            .unwrap();
        remote
            .upsert(table, &json!({"workspace_id": "a", "url": "two"}))
            .await
            .unwrap();

        let rows = remote.rows(table, "a").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["url"], json!("two"));
    }

    #[tokio::test]
    async fn offline_remote_fails_every_call() {
        let remote = MemoryRemote::new();
        remote.set_offline(Some("network unreachable")).unwrap();
        let err = remote.select(Table::Documents, "a").await.unwrap_err();
        assert!(err.to_string().contains("network unreachable"));
    }
}
