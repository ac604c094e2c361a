//! hf sync command implementations.

use crate::cli::{block_on, push_load_warnings, Context, SyncCommands};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::sync::{apply_pull, PullOutcome, Reconciler};

pub fn run(ctx: &Context, cmd: SyncCommands) -> Result<()> {
    let store = ctx.open_store()?;
    let reconciler = Reconciler::from_config(&ctx.config.remote)?;

    match cmd {
        SyncCommands::Push => {
            let ws = store.snapshot()?;
            let report = block_on(reconciler.push(&ws))??;

            let mut human = HumanOutput::new("hf sync push: remote replaced");
            human.push_summary("workspace", reconciler.workspace_id().to_string());
            human.push_summary("work items", report.work_items.to_string());
            human.push_summary("documents", report.documents.to_string());
            human.push_summary("wiki pages", report.wiki_pages.to_string());
            push_load_warnings(&store, &mut human)?;
            emit_success(ctx.output, "sync push", &report, Some(&human))
        }
        SyncCommands::Pull => {
            let snapshot = block_on(reconciler.pull())??;
            let outcome = apply_pull(&store, snapshot)?;

            let mut human = match &outcome {
                PullOutcome::Applied {
                    work_items,
                    documents,
                    wiki_pages,
                    boards_added,
                    duplicates_dropped,
                } => {
                    let mut human = HumanOutput::new("hf sync pull: local collections replaced");
                    human.push_summary("work items", work_items.to_string());
                    human.push_summary("documents", documents.to_string());
                    human.push_summary("wiki pages", wiki_pages.to_string());
                    if !boards_added.is_empty() {
                        human.push_summary("boards added", boards_added.join(", "));
                    }
                    if *duplicates_dropped > 0 {
                        human.push_warning(format!(
                            "dropped {duplicates_dropped} remote work item(s) with duplicate ids"
                        ));
                    }
                    human
                }
                PullOutcome::KeptLocal => {
                    let mut human = HumanOutput::new("hf sync pull: kept local state");
                    human.push_warning("the remote has no work items for this workspace");
                    human.push_next_step("hf sync push");
                    human
                }
            };
            human.push_summary("workspace", reconciler.workspace_id().to_string());
            emit_success(ctx.output, "sync pull", &outcome, Some(&human))
        }
    }
}
