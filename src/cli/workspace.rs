//! hf template, export and watch command implementations.

use std::path::PathBuf;
use std::sync::mpsc;

use chrono::Local;

use crate::cli::{push_load_warnings, Context};
use crate::error::Result;
use crate::lock::write_atomic;
use crate::output::{emit_success, HumanOutput};
use crate::watch::{spawn_watch, StoreChange};

pub fn run_template(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let today = Local::now().date_naive();
    let ids = store.mutate(|ws| Ok(ws.apply_template(today)))?;

    let mut human = HumanOutput::new(format!("hf template: added {} item(s)", ids.len()));
    push_load_warnings(&store, &mut human)?;
    human.push_next_step("hf item list --board Marketing");
    emit_success(
        ctx.output,
        "template",
        &serde_json::json!({ "added": ids }),
        Some(&human),
    )
}

pub fn run_export(ctx: &Context, out: Option<PathBuf>) -> Result<()> {
    let store = ctx.open_store()?;
    let ws = store.snapshot()?;

    match out {
        Some(path) => {
            write_atomic(&path, ws.to_json()?.as_bytes())?;
            let mut human = HumanOutput::new(format!("hf export: wrote {}", path.display()));
            human.push_summary("work items", ws.work_items.len().to_string());
            push_load_warnings(&store, &mut human)?;
            emit_success(
                ctx.output,
                "export",
                &serde_json::json!({ "path": path, "work_items": ws.work_items.len() }),
                Some(&human),
            )
        }
        None if ctx.output.json => emit_success(ctx.output, "export", &ws, None),
        None => {
            println!("{}", ws.to_json()?);
            Ok(())
        }
    }
}

/// Block until interrupted, reporting each reload caused by another
/// instance.
pub fn run_watch(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let path = store.storage_path()?;
    let (tx, rx) = mpsc::channel();
    let _handle = spawn_watch(store.clone(), tx)?;

    if !ctx.output.quiet && !ctx.output.json {
        println!("hf watch: watching {}", path.display());
    }
    tracing::info!(path = %path.display(), "watch started");

    for change in rx {
        match change {
            StoreChange::Reloaded => {
                let items = store.read(|ws| ws.work_items.len())?;
                let human = HumanOutput::new(format!("hf watch: reloaded ({items} work items)"));
                emit_success(
                    ctx.output,
                    "watch",
                    &serde_json::json!({ "event": "reloaded", "work_items": items }),
                    Some(&human),
                )?;
            }
            StoreChange::Error(message) => {
                tracing::warn!(error = %message, "watch error");
                let mut human = HumanOutput::new("hf watch: error");
                human.push_warning(message.clone());
                emit_success(
                    ctx.output,
                    "watch",
                    &serde_json::json!({ "event": "error", "message": message }),
                    Some(&human),
                )?;
            }
        }
    }
    Ok(())
}
