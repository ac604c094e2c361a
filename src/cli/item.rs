//! hf item command implementations.

use chrono::Local;

use crate::cli::{push_load_warnings, Context, ItemCommands};
use crate::error::Result;
use crate::model::{parse_custom_attrs, parse_date, Kind, Priority, Status, WorkItem};
use crate::output::{emit_success, HumanOutput};
use crate::query::ItemQuery;
use crate::workspace::WorkItemDraft;

#[derive(serde::Serialize)]
struct ItemCreated {
    id: String,
    title: String,
    board: String,
}

#[derive(serde::Serialize)]
struct ItemList<'a> {
    total: usize,
    items: Vec<&'a WorkItem>,
}

#[derive(serde::Serialize)]
struct StatusChange {
    id: String,
    status: Status,
}

#[derive(serde::Serialize)]
struct ItemRemoved {
    id: String,
    title: String,
    time_entries_removed: usize,
}

pub fn run(ctx: &Context, cmd: ItemCommands) -> Result<()> {
    match cmd {
        ItemCommands::Add {
            title,
            board,
            kind,
            status,
            priority,
            assignee,
            start,
            due,
            details,
            estimate,
            rate,
            milestone,
            attrs,
        } => {
            let draft = WorkItemDraft {
                title,
                board,
                kind: kind.parse::<Kind>()?,
                status: status.parse::<Status>()?,
                priority: priority.parse::<Priority>()?,
                assignee,
                start_date: start.as_deref().map(parse_date).transpose()?,
                due_date: due.as_deref().map(parse_date).transpose()?,
                details,
                estimate_hours: estimate,
                cost_rate: rate,
                milestone,
                custom_attrs: attrs.as_deref().map(parse_custom_attrs).unwrap_or_default(),
            };
            run_add(ctx, draft)
        }
        ItemCommands::List {
            search,
            status,
            priority,
            board,
            sort,
        } => {
            let query = ItemQuery {
                search,
                status: status.as_deref().map(str::parse).transpose()?,
                priority: priority.as_deref().map(str::parse).transpose()?,
                board,
                sort: sort.parse()?,
            };
            run_list(ctx, query)
        }
        ItemCommands::Show { id } => run_show(ctx, &id),
        ItemCommands::Advance { id } => run_status_change(ctx, "item advance", &id, None),
        ItemCommands::Move { id, status } => {
            let status = status.parse::<Status>()?;
            run_status_change(ctx, "item move", &id, Some(status))
        }
        ItemCommands::Comment { id, text } => run_comment(ctx, &id, &text),
        ItemCommands::Rm { id } => run_rm(ctx, &id),
    }
}

fn run_add(ctx: &Context, draft: WorkItemDraft) -> Result<()> {
    let store = ctx.open_store()?;
    let output = store.mutate(|ws| {
        let id = ws.add_work_item(draft)?;
        let board = ws.find_item(&id).map(|item| item.board.clone()).unwrap_or_default();
        let title = ws.find_item(&id).map(|item| item.title.clone()).unwrap_or_default();
        Ok(ItemCreated { id, title, board })
    })?;

    let mut human = HumanOutput::new(format!("hf item add: created \"{}\"", output.title));
    human.push_summary("id", output.id.clone());
    human.push_summary("board", output.board.clone());
    push_load_warnings(&store, &mut human)?;
    human.push_next_step(format!("hf item advance {}", short_id(&output.id)));
    emit_success(ctx.output, "item add", &output, Some(&human))
}

fn run_list(ctx: &Context, query: ItemQuery) -> Result<()> {
    let store = ctx.open_store()?;
    let ws = store.snapshot()?;
    let today = Local::now().date_naive();
    let items = query.run(&ws.work_items);

    let mut human = HumanOutput::new(format!("hf item list: {} item(s)", items.len()));
    for item in &items {
        let due = item
            .due_date
            .map(|date| format!(" due {date}"))
            .unwrap_or_default();
        let overdue = if item.is_overdue(today) { " OVERDUE" } else { "" };
        human.push_detail(format!(
            "{} [{}] {} ({}, {}){}{}",
            short_id(&item.id),
            item.status,
            item.title,
            item.board,
            item.priority,
            due,
            overdue
        ));
    }
    push_load_warnings(&store, &mut human)?;

    let output = ItemList {
        total: items.len(),
        items,
    };
    emit_success(ctx.output, "item list", &output, Some(&human))
}

fn run_show(ctx: &Context, key: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let ws = store.snapshot()?;
    let id = ws.resolve_item(key)?;
    let Some(item) = ws.find_item(&id) else {
        return Err(crate::error::Error::not_found("work item", key));
    };

    let mut human = HumanOutput::new(format!("{} ({})", item.title, item.id));
    human.push_summary("status", item.status.to_string());
    human.push_summary("priority", item.priority.to_string());
    human.push_summary("board", item.board.clone());
    if let Some(assignee) = &item.assignee {
        human.push_summary("assignee", assignee.clone());
    }
    if let Some(start) = item.start_date {
        human.push_summary("start", start.to_string());
    }
    if let Some(due) = item.due_date {
        human.push_summary("due", due.to_string());
    }
    if item.estimate_hours > 0.0 {
        human.push_summary("estimate", format!("{}h @ {}", item.estimate_hours, item.cost_rate));
    }
    if let Some(skill) = item.agent.skill.name() {
        human.push_summary("skill", skill.to_string());
    }
    if !item.details.is_empty() {
        human.push_detail(item.details.clone());
    }
    for (key, value) in &item.custom_attrs {
        human.push_detail(format!("{key}: {value}"));
    }
    for comment in &item.comments {
        human.push_detail(format!("comment: {comment}"));
    }

    emit_success(ctx.output, "item show", item, Some(&human))
}

fn run_status_change(
    ctx: &Context,
    command: &str,
    key: &str,
    target: Option<Status>,
) -> Result<()> {
    let store = ctx.open_store()?;
    let output = store.mutate(|ws| {
        let id = ws.resolve_item(key)?;
        let status = match target {
            Some(status) => {
                ws.move_item(&id, status)?;
                status
            }
            None => ws.advance(&id)?,
        };
        Ok(StatusChange { id, status })
    })?;

    let mut human = HumanOutput::new(format!("hf {command}: now {}", output.status));
    human.push_summary("id", output.id.clone());
    emit_success(ctx.output, command, &output, Some(&human))
}

fn run_comment(ctx: &Context, key: &str, text: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let id = store.mutate(|ws| {
        let id = ws.resolve_item(key)?;
        ws.comment(&id, text)?;
        Ok(id)
    })?;

    let human = HumanOutput::new(format!("hf item comment: added to {}", short_id(&id)));
    emit_success(
        ctx.output,
        "item comment",
        &serde_json::json!({ "id": id }),
        Some(&human),
    )
}

fn run_rm(ctx: &Context, key: &str) -> Result<()> {
    let store = ctx.open_store()?;
    let output = store.mutate(|ws| {
        let id = ws.resolve_item(key)?;
        let before = ws.time_entries.len();
        let removed = ws.delete_work_item(&id)?;
        Ok(ItemRemoved {
            id,
            title: removed.title,
            time_entries_removed: before - ws.time_entries.len(),
        })
    })?;

    let mut human = HumanOutput::new(format!("hf item rm: deleted \"{}\"", output.title));
    if output.time_entries_removed > 0 {
        human.push_summary(
            "time entries removed",
            output.time_entries_removed.to_string(),
        );
    }
    emit_success(ctx.output, "item rm", &output, Some(&human))
}

/// First eight characters of an id, enough for prefix resolution.
pub(crate) fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
