//! Remote reconciler: full-replace push and pull.
//!
//! There is no diffing and no merge. A push deletes every remote row of the
//! workspace scope and reinserts the local set, table by table; a pull reads
//! every table and, when it found work items, overwrites the matching local
//! collections wholesale.
//!
//! Tables are pushed sequentially with no cross-table transaction: if table
//! N fails, tables before it are already replaced and the rest are
//! untouched. Nothing is retried.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::model::{Document, IntegrationConfig, SkillAssignment, WikiPage, WorkItem};
use crate::remote::{BlobStore, RemoteStore, RestRemote, Table};
use crate::rows;
use crate::store::{dedupe_ids, SharedStore};
use crate::workspace::Workspace;

/// Rows written by a successful push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub work_items: usize,
    pub documents: usize,
    pub wiki_pages: usize,
    pub integration: bool,
}

/// Everything read by a pull, already mapped back to entities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteSnapshot {
    pub work_items: Vec<WorkItem>,
    pub documents: Vec<Document>,
    pub wiki: Vec<WikiPage>,
    pub integration: Option<IntegrationConfig>,
}

/// What applying a pull did to local state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PullOutcome {
    Applied {
        work_items: usize,
        documents: usize,
        wiki_pages: usize,
        boards_added: Vec<String>,
        /// Remote work items dropped for reusing an earlier row's id.
        duplicates_dropped: usize,
    },
    /// The remote had no work items; local state was left alone.
    KeptLocal,
}

pub struct Reconciler {
    remote: Option<Arc<dyn RemoteStore>>,
    blobs: Option<Arc<dyn BlobStore>>,
    workspace_id: String,
}

impl Reconciler {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        blobs: Option<Arc<dyn BlobStore>>,
        workspace_id: impl Into<String>,
    ) -> Self {
        Self {
            remote: Some(remote),
            blobs,
            workspace_id: workspace_id.into(),
        }
    }

    /// A reconciler that refuses every operation with `ConfigurationMissing`.
    pub fn unconfigured(workspace_id: impl Into<String>) -> Self {
        Self {
            remote: None,
            blobs: None,
            workspace_id: workspace_id.into(),
        }
    }

    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        match RestRemote::from_config(config)? {
            Some(rest) => {
                let rest = Arc::new(rest);
                Ok(Self::new(
                    rest.clone(),
                    Some(rest as Arc<dyn BlobStore>),
                    config.workspace_id.clone(),
                ))
            }
            None => Ok(Self::unconfigured(config.workspace_id.clone())),
        }
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    fn remote(&self) -> Result<&dyn RemoteStore> {
        self.remote
            .as_deref()
            .ok_or(Error::ConfigurationMissing("remote store"))
    }

    /// Replace the remote copy of `ws` table by table, then upsert the
    /// integration row.
    pub async fn push(&self, ws: &Workspace) -> Result<PushReport> {
        let remote = self.remote()?;
        let scope = self.workspace_id.as_str();

        let mut report = PushReport::default();
        let mut replaced = Vec::new();
        for table in Table::REPLACED {
            let batch = table_rows(ws, table, scope);
            let result = match remote.delete_scope(table, scope).await {
                Ok(()) => remote.insert(table, &batch).await,
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                tracing::warn!(
                    table = %table,
                    replaced = ?replaced,
                    error = %err,
                    "push stopped; earlier tables were already replaced"
                );
                return Err(err);
            }
            tracing::debug!(table = %table, rows = batch.len(), "table replaced");
            match table {
                Table::WorkItems => report.work_items = batch.len(),
                Table::Documents => report.documents = batch.len(),
                Table::WikiPages => report.wiki_pages = batch.len(),
                Table::IntegrationConfigs => {}
            }
            replaced.push(table.name());
        }

        remote
            .upsert(
                Table::IntegrationConfigs,
                &rows::integration_row(&ws.integration, scope),
            )
            .await?;

        report.integration = true;
        tracing::info!(scope, ?report, "push complete");
        Ok(report)
    }

    /// Read all four tables concurrently.
    pub async fn pull(&self) -> Result<RemoteSnapshot> {
        let remote = self.remote()?;
        let scope = self.workspace_id.as_str();

        let (items, documents, wiki, integration) = tokio::try_join!(
            remote.select(Table::WorkItems, scope),
            remote.select(Table::Documents, scope),
            remote.select(Table::WikiPages, scope),
            remote.select(Table::IntegrationConfigs, scope),
        )?;

        let snapshot = RemoteSnapshot {
            work_items: items.iter().map(rows::work_item_from_row).collect(),
            documents: documents.iter().map(rows::document_from_row).collect(),
            wiki: wiki.iter().map(rows::wiki_from_row).collect(),
            integration: integration.first().map(rows::integration_from_row),
        };
        tracing::info!(
            scope,
            work_items = snapshot.work_items.len(),
            documents = snapshot.documents.len(),
            wiki_pages = snapshot.wiki.len(),
            "pull complete"
        );
        Ok(snapshot)
    }

    /// Upload a file and record it as a document.
    ///
    /// The blob path is `<workspace id>/<unix millis>-<file name>`.
    pub async fn upload_document(
        &self,
        store: &SharedStore,
        name: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Document> {
        let blobs = self
            .blobs
            .as_deref()
            .ok_or(Error::ConfigurationMissing("blob storage"))?;
        if name.trim().is_empty() {
            return Err(Error::InvalidArgument("document name is required".to_string()));
        }

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        let path = format!(
            "{}/{}-{}",
            self.workspace_id,
            millis,
            sanitize_file_name(file_name)
        );
        let url = blobs
            .upload(&path, bytes, content_type_for(file_name))
            .await?;

        let id = store.mutate(|ws| ws.add_document_at(name, &url, Some(path.clone())))?;
        tracing::info!(%path, "document uploaded");
        Ok(Document {
            id,
            name: name.trim().to_string(),
            url,
            storage_path: Some(path),
        })
    }
}

/// Outbound rows of one table for `ws`.
fn table_rows(ws: &Workspace, table: Table, scope: &str) -> Vec<Value> {
    match table {
        Table::WorkItems => ws
            .work_items
            .iter()
            .map(|item| rows::work_item_row(item, scope))
            .collect(),
        Table::Documents => ws
            .documents
            .iter()
            .map(|doc| rows::document_row(doc, scope))
            .collect(),
        Table::WikiPages => ws
            .wiki
            .iter()
            .map(|page| rows::wiki_row(page, scope))
            .collect(),
        Table::IntegrationConfigs => vec![rows::integration_row(&ws.integration, scope)],
    }
}

/// Overwrite local collections with `snapshot`, unless it has no work items.
pub fn apply_pull(store: &SharedStore, mut snapshot: RemoteSnapshot) -> Result<PullOutcome> {
    if snapshot.work_items.is_empty() {
        tracing::warn!("remote returned no work items, keeping local state");
        return Ok(PullOutcome::KeptLocal);
    }

    let duplicates_dropped = dedupe_ids(&mut snapshot.work_items);
    if duplicates_dropped > 0 {
        tracing::warn!(dropped = duplicates_dropped, "remote work items share ids, keeping the first of each");
    }

    store.mutate(move |ws| {
        let boards_before = ws.boards.len();
        for item in &snapshot.work_items {
            ws.ensure_board(&item.board);
        }
        let boards_added = ws.boards[boards_before..].to_vec();

        let outcome = PullOutcome::Applied {
            work_items: snapshot.work_items.len(),
            documents: snapshot.documents.len(),
            wiki_pages: snapshot.wiki.len(),
            boards_added,
            duplicates_dropped,
        };
        ws.work_items = snapshot.work_items;
        ws.documents = snapshot.documents;
        ws.wiki = snapshot.wiki;
        if let Some(integration) = snapshot.integration {
            ws.integration = integration;
        }
        rebind_skills(ws);
        Ok(outcome)
    })
}

/// Point pulled skill assignments at local skill ids. Remote ids that do
/// not exist here are matched by name, or become `Removed`.
fn rebind_skills(ws: &mut Workspace) {
    let skills = ws.skills.clone();
    for item in &mut ws.work_items {
        let name = match &item.agent.skill {
            SkillAssignment::Unassigned => continue,
            SkillAssignment::Assigned { name, .. } | SkillAssignment::Removed { name } => {
                name.clone()
            }
        };
        let by_id = item
            .agent
            .skill
            .skill_id()
            .and_then(|id| skills.iter().find(|skill| skill.id == id));
        let by_name = || skills.iter().find(|skill| skill.name.eq_ignore_ascii_case(&name));

        item.agent.skill = match by_id.or_else(by_name) {
            Some(skill) => SkillAssignment::Assigned {
                id: skill.id.clone(),
                name: skill.name.clone(),
            },
            None => SkillAssignment::Removed { name },
        };
    }
}

fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    let cleaned: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.trim_matches(['.', '-']).is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "md" | "markdown" => "text/markdown",
        "txt" => "text/plain",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "csv" => "text/csv",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_reconciler_fails_before_io() {
        let reconciler = Reconciler::unconfigured("primary");
        let err = reconciler.pull().await.unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing("remote store")));
        let err = reconciler.push(&Workspace::empty()).await.unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing(_)));
    }

    #[test]
    fn file_names_are_flattened_for_blob_paths() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("Q3 plan (final).pdf"), "Q3-plan--final-.pdf");
        assert_eq!(sanitize_file_name("..."), "file");
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for("brief.PDF"), "application/pdf");
        assert_eq!(content_type_for("notes"), "application/octet-stream");
    }

    #[test]
    fn pulled_assignments_rebind_by_name() {
        let mut ws = Workspace::empty();
        let local = ws.add_skill("research", "").unwrap();
        let mut item = WorkItem::new("Pulled", "Core");
        item.agent.skill = SkillAssignment::Assigned {
            id: "remote-only".to_string(),
            name: "Research".to_string(),
        };
        let mut orphan = WorkItem::new("Orphan", "Core");
        orphan.agent.skill = SkillAssignment::Assigned {
            id: "gone".to_string(),
            name: "legal".to_string(),
        };
        ws.work_items = vec![item, orphan];

        rebind_skills(&mut ws);
        assert_eq!(ws.work_items[0].agent.skill.skill_id(), Some(local.as_str()));
        assert_eq!(
            ws.work_items[1].agent.skill,
            SkillAssignment::Removed {
                name: "legal".to_string()
            }
        );
    }
}
