//! hf init command implementation
//!
//! Creates the data directory, a default hustle.toml and the first
//! workspace blob (migrating a legacy blob if one is present).

use std::path::PathBuf;

use crate::cli::{push_load_warnings, Context};
use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};

#[derive(serde::Serialize)]
struct InitReport {
    dir: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    workspace: bool,
}

pub fn run(ctx: &Context) -> Result<()> {
    ctx.storage.init()?;

    let config_path = ctx.storage.config_file();
    let created_config = if config_path.exists() {
        false
    } else {
        Config::default().save(&config_path)?;
        true
    };

    let had_workspace = ctx.storage.get(&ctx.config.storage.key)?.is_some();
    let store = ctx.open_store()?;
    // Opening may already have written a migrated blob.
    let created_workspace = if ctx.storage.get(&ctx.config.storage.key)?.is_some() {
        !had_workspace
    } else {
        store.persist()?;
        true
    };

    let report = InitReport {
        dir: ctx.storage.root().to_path_buf(),
        created: InitCreated {
            config: created_config,
            workspace: created_workspace,
        },
    };

    let mut human = HumanOutput::new("hf init: ready");
    human.push_summary("dir", report.dir.display().to_string());
    let mut created = Vec::new();
    if created_config {
        created.push(crate::storage::CONFIG_FILE.to_string());
    }
    if created_workspace {
        created.push(format!("{}.json", ctx.config.storage.key));
    }
    if created.is_empty() {
        human.push_summary("created", "nothing (already initialized)");
    } else {
        human.push_summary("created", created.join(", "));
    }
    push_load_warnings(&store, &mut human)?;
    human.push_next_step("hf item add \"First task\"");

    emit_success(ctx.output, "init", &report, Some(&human))
}
