//! Remote table store and blob storage seams.
//!
//! The reconciler only talks to these traits. [`rest::RestRemote`] speaks
//! the PostgREST/storage HTTP dialect; [`memory::MemoryRemote`] keeps rows
//! in memory and can be told to fail, which is what the sync tests use.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub mod memory;
pub mod rest;

pub use memory::MemoryRemote;
pub use rest::RestRemote;

/// Column every remote row is scoped by.
pub const SCOPE_COLUMN: &str = "workspace_id";

/// The four logical remote tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    WorkItems,
    Documents,
    WikiPages,
    IntegrationConfigs,
}

impl Table {
    /// Tables replaced wholesale by a push, in push order.
    pub const REPLACED: [Table; 3] = [Table::WorkItems, Table::Documents, Table::WikiPages];

    pub fn name(self) -> &'static str {
        match self {
            Table::WorkItems => "work_items",
            Table::Documents => "documents",
            Table::WikiPages => "wiki_pages",
            Table::IntegrationConfigs => "integration_configs",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Row-oriented remote store. Rows are JSON objects carrying
/// [`SCOPE_COLUMN`].
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All rows of `table` scoped to `workspace_id`.
    async fn select(&self, table: Table, workspace_id: &str) -> Result<Vec<Value>>;

    /// Delete every row of `table` scoped to `workspace_id`.
    async fn delete_scope(&self, table: Table, workspace_id: &str) -> Result<()>;

    async fn insert(&self, table: Table, rows: &[Value]) -> Result<()>;

    /// Insert or replace the single row keyed by its scope column.
    async fn upsert(&self, table: Table, row: &Value) -> Result<()>;
}

/// Object storage for uploaded documents.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `path` and return the public URL.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
}
