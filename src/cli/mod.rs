//! Command-line interface for hf
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::future::Future;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;
use crate::output::{HumanOutput, OutputOptions};
use crate::storage::Storage;
use crate::store::{SharedStore, WorkspaceStore};

mod agent;
mod ask;
mod board;
mod init;
mod item;
mod project;
mod sync;
mod workspace;

/// hf - Hustle Flow
///
/// A local project board with time and budget tracking, simulated agent
/// runs, and optional full-replace sync to a remote table store.
#[derive(Parser, Debug)]
#[command(name = "hf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to the platform data directory)
    #[arg(long, global = true, env = "HUSTLE_DIR")]
    pub dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory and a default hustle.toml
    Init,

    /// Work items
    #[command(subcommand)]
    Item(ItemCommands),

    /// Boards
    #[command(subcommand)]
    Board(BoardCommands),

    /// Documents
    #[command(subcommand)]
    Doc(DocCommands),

    /// Wiki pages
    #[command(subcommand)]
    Wiki(WikiCommands),

    /// Time tracking
    #[command(subcommand)]
    Time(TimeCommands),

    /// Projects and budgets
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Dashboard, finance and calendar summaries
    #[command(subcommand)]
    Report(ReportCommands),

    /// Agent skills
    #[command(subcommand)]
    Skill(SkillCommands),

    /// Agent runs
    #[command(subcommand)]
    Agent(AgentCommands),

    /// Skill endpoint integration
    #[command(subcommand)]
    Integration(IntegrationCommands),

    /// Remote sync
    #[command(subcommand)]
    Sync(SyncCommands),

    /// Add the product launch template items
    Template,

    /// Print the whole workspace as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Ask the AI assistant about the workspace
    Ask {
        /// The question or request
        prompt: String,

        /// Context: planning, marketing, scheduling, research
        #[arg(long, default_value = "planning")]
        context: String,
    },

    /// Reload whenever another instance changes the workspace
    Watch,
}

#[derive(Subcommand, Debug)]
pub enum ItemCommands {
    /// Create a work item
    Add {
        title: String,

        #[arg(long)]
        board: Option<String>,

        /// task, feature, bug, risk
        #[arg(long = "type", default_value = "task")]
        kind: String,

        #[arg(long, default_value = "backlog")]
        status: String,

        /// critical, high, medium, low
        #[arg(long, default_value = "medium")]
        priority: String,

        #[arg(long)]
        assignee: Option<String>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        #[arg(long, default_value = "")]
        details: String,

        #[arg(long, default_value_t = 0.0)]
        estimate: f64,

        /// Hourly cost rate
        #[arg(long, default_value_t = 0.0)]
        rate: f64,

        #[arg(long)]
        milestone: bool,

        /// Custom attributes as "key:value, key2:value2"
        #[arg(long)]
        attrs: Option<String>,
    },

    /// List work items
    List {
        /// Match title or assignee
        #[arg(short, long)]
        search: Option<String>,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        priority: Option<String>,

        #[arg(long)]
        board: Option<String>,

        /// due-date, priority, status, title
        #[arg(long, default_value = "due-date")]
        sort: String,
    },

    /// Show one work item
    Show { id: String },

    /// Move to the next status (Done wraps to Backlog)
    Advance { id: String },

    /// Move to an explicit status
    Move { id: String, status: String },

    /// Add a comment
    Comment { id: String, text: String },

    /// Delete a work item and its time entries
    Rm { id: String },
}

#[derive(Subcommand, Debug)]
pub enum BoardCommands {
    List,
    Add { name: String },
    /// Remove a board name; items keep their tag
    Rm { name: String },
}

#[derive(Subcommand, Debug)]
pub enum DocCommands {
    List,
    /// Record a document by URL or local path
    Add { name: String, url: String },
    /// Upload a file to blob storage and record it
    Upload {
        file: PathBuf,

        /// Display name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum WikiCommands {
    List,
    Add { title: String, content: String },
}

#[derive(Subcommand, Debug)]
pub enum TimeCommands {
    /// Log hours against a work item
    Log {
        item: String,

        #[arg(long)]
        hours: f64,

        #[arg(long, default_value_t = 0.0)]
        rate: f64,

        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
    List,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a project or update the one with the same name
    Set {
        name: String,

        #[arg(long)]
        budget: f64,

        /// green, amber, red
        #[arg(long, default_value = "green")]
        health: String,
    },
    List,
}

#[derive(Subcommand, Debug)]
pub enum ReportCommands {
    Dashboard,
    Finance,
    Calendar,
}

#[derive(Subcommand, Debug)]
pub enum SkillCommands {
    List,
    Add {
        name: String,

        #[arg(long, default_value = "")]
        description: String,
    },
    /// Rename a skill (by id or name)
    Rename { skill: String, name: String },
    /// Delete a skill; assigned items keep a "removed" marker
    Rm { skill: String },
    /// Assign a skill to a work item
    Assign { item: String, skill: String },
}

#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// Run the assigned skill against a work item and wait for it
    Run { item: String },
    /// Show the run log of a work item
    Log { item: String },
}

#[derive(Subcommand, Debug)]
pub enum IntegrationCommands {
    /// Set the skill endpoint URL and bearer token
    Set {
        url: String,

        #[arg(long, default_value = "")]
        token: String,
    },
    Show,
}

#[derive(Subcommand, Debug)]
pub enum SyncCommands {
    /// Replace remote rows with the local workspace
    Push,
    /// Overwrite local collections with the remote rows
    Pull,
}

/// Everything a command needs: where data lives, configuration, and how to
/// print.
pub(crate) struct Context {
    pub storage: Storage,
    pub config: Config,
    pub output: OutputOptions,
}

impl Context {
    fn load(dir: Option<PathBuf>, json: bool, quiet: bool) -> Result<Self> {
        let storage = match dir {
            Some(dir) => Storage::new(dir),
            None => Storage::platform_default()?,
        };
        let config = Config::load_from_dir(storage.root())?.with_env();
        Ok(Self {
            storage,
            config,
            output: OutputOptions { json, quiet },
        })
    }

    pub fn open_store(&self) -> Result<SharedStore> {
        let store = WorkspaceStore::open(self.storage.clone(), self.config.storage.clone())?;
        Ok(SharedStore::new(store))
    }
}

/// Add load repairs to a human block as warnings.
pub(crate) fn push_load_warnings(store: &SharedStore, human: &mut HumanOutput) -> Result<()> {
    for issue in store.issues()? {
        human.push_warning(issue.to_string());
    }
    Ok(())
}

/// Run async work on a fresh runtime; the CLI itself stays synchronous.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let ctx = Context::load(self.dir, self.json, self.quiet)?;
        match self.command {
            Commands::Init => init::run(&ctx),
            Commands::Item(cmd) => item::run(&ctx, cmd),
            Commands::Board(cmd) => board::run_board(&ctx, cmd),
            Commands::Doc(cmd) => board::run_doc(&ctx, cmd),
            Commands::Wiki(cmd) => board::run_wiki(&ctx, cmd),
            Commands::Time(cmd) => project::run_time(&ctx, cmd),
            Commands::Project(cmd) => project::run_project(&ctx, cmd),
            Commands::Report(cmd) => project::run_report(&ctx, cmd),
            Commands::Skill(cmd) => agent::run_skill(&ctx, cmd),
            Commands::Agent(cmd) => agent::run_agent(&ctx, cmd),
            Commands::Integration(cmd) => agent::run_integration(&ctx, cmd),
            Commands::Sync(cmd) => sync::run(&ctx, cmd),
            Commands::Template => workspace::run_template(&ctx),
            Commands::Export { out } => workspace::run_export(&ctx, out),
            Commands::Ask { prompt, context } => ask::run(&ctx, &prompt, &context),
            Commands::Watch => workspace::run_watch(&ctx),
        }
    }
}
