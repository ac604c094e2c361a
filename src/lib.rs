//! hustle - Hustle Flow Library
//!
//! This library provides the core functionality for the hf CLI tool: a
//! local project board with time and budget tracking, simulated agent
//! runs, and an optional full-replace sync to a remote table store.
//!
//! # Core Concepts
//!
//! - **Workspace**: One JSON document holding every collection
//! - **Work items**: Tasks on boards, advanced through a fixed status flow
//! - **Agent runs**: A skill applied to an item, via an HTTP endpoint or
//!   a local three-step simulation
//! - **Sync**: Push replaces the remote rows, pull replaces local ones
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `hustle.toml` and the environment
//! - `error`: Error types and result aliases
//! - `model`: Entities and their serde shapes
//! - `workspace`: The workspace aggregate and its mutations
//! - `store`: Load/recover/persist of the workspace blob
//! - `migrate`: Upgrade of the legacy single-board blob
//! - `storage`: Keyed blob files in the data directory
//! - `lock`: File locking and atomic writes
//! - `remote`: Remote table and blob store clients
//! - `rows`: Row shapes exchanged with the remote store
//! - `sync`: Push/pull reconciliation
//! - `agent`: Agent run orchestration
//! - `ai`: AI assist client
//! - `query`: Item filtering and sorting
//! - `report`: Dashboard, finance and calendar summaries
//! - `watch`: Cross-instance change detection
//! - `output`: Human and JSON command output

pub mod agent;
pub mod ai;
pub mod cli;
pub mod config;
pub mod error;
pub mod lock;
pub mod migrate;
pub mod model;
pub mod output;
pub mod query;
pub mod remote;
pub mod report;
pub mod rows;
pub mod storage;
pub mod store;
pub mod sync;
pub mod watch;
pub mod workspace;

pub use error::{Error, Result};
