//! hf board, doc and wiki command implementations.

use std::path::Path;

use crate::cli::{block_on, push_load_warnings, BoardCommands, Context, DocCommands, WikiCommands};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::sync::Reconciler;

#[derive(serde::Serialize)]
struct BoardList {
    boards: Vec<BoardCount>,
}

#[derive(serde::Serialize)]
struct BoardCount {
    name: String,
    items: usize,
}

#[derive(serde::Serialize)]
struct Created {
    id: String,
}

pub fn run_board(ctx: &Context, cmd: BoardCommands) -> Result<()> {
    let store = ctx.open_store()?;
    match cmd {
        BoardCommands::List => {
            let ws = store.snapshot()?;
            let boards: Vec<BoardCount> = ws
                .boards
                .iter()
                .map(|name| BoardCount {
                    name: name.clone(),
                    items: ws
                        .work_items
                        .iter()
                        .filter(|item| &item.board == name)
                        .count(),
                })
                .collect();

            let mut human = HumanOutput::new(format!("hf board list: {} board(s)", boards.len()));
            for board in &boards {
                human.push_detail(format!("{} ({} items)", board.name, board.items));
            }
            push_load_warnings(&store, &mut human)?;
            emit_success(ctx.output, "board list", &BoardList { boards }, Some(&human))
        }
        BoardCommands::Add { name } => {
            store.mutate(|ws| ws.add_board(&name))?;
            let human = HumanOutput::new(format!("hf board add: added \"{}\"", name.trim()));
            emit_success(
                ctx.output,
                "board add",
                &serde_json::json!({ "name": name.trim() }),
                Some(&human),
            )
        }
        BoardCommands::Rm { name } => {
            let tagged = store.mutate(|ws| {
                ws.remove_board(&name)?;
                Ok(ws.work_items.iter().filter(|item| item.board == name).count())
            })?;
            let mut human = HumanOutput::new(format!("hf board rm: removed \"{name}\""));
            if tagged > 0 {
                human.push_warning(format!("{tagged} item(s) still carry the \"{name}\" tag"));
            }
            emit_success(
                ctx.output,
                "board rm",
                &serde_json::json!({ "name": name, "items_still_tagged": tagged }),
                Some(&human),
            )
        }
    }
}

pub fn run_doc(ctx: &Context, cmd: DocCommands) -> Result<()> {
    let store = ctx.open_store()?;
    match cmd {
        DocCommands::List => {
            let ws = store.snapshot()?;
            let mut human =
                HumanOutput::new(format!("hf doc list: {} document(s)", ws.documents.len()));
            for doc in &ws.documents {
                human.push_detail(format!("{}  {}", doc.name, doc.url));
            }
            push_load_warnings(&store, &mut human)?;
            emit_success(ctx.output, "doc list", &ws.documents, Some(&human))
        }
        DocCommands::Add { name, url } => {
            let id = store.mutate(|ws| ws.add_document(&name, &url))?;
            let human = HumanOutput::new(format!("hf doc add: recorded \"{}\"", name.trim()));
            emit_success(ctx.output, "doc add", &Created { id }, Some(&human))
        }
        DocCommands::Upload { file, name } => {
            let file_name = file_name_of(&file)?;
            let name = name.unwrap_or_else(|| file_name.clone());
            let bytes = std::fs::read(&file)?;

            let reconciler = Reconciler::from_config(&ctx.config.remote)?;
            let doc = block_on(reconciler.upload_document(&store, &name, &file_name, bytes))??;

            let mut human = HumanOutput::new(format!("hf doc upload: stored \"{}\"", doc.name));
            human.push_summary("url", doc.url.clone());
            if let Some(path) = &doc.storage_path {
                human.push_summary("path", path.clone());
            }
            emit_success(ctx.output, "doc upload", &doc, Some(&human))
        }
    }
}

pub fn run_wiki(ctx: &Context, cmd: WikiCommands) -> Result<()> {
    let store = ctx.open_store()?;
    match cmd {
        WikiCommands::List => {
            let ws = store.snapshot()?;
            let mut human = HumanOutput::new(format!("hf wiki list: {} page(s)", ws.wiki.len()));
            for page in &ws.wiki {
                human.push_detail(format!("{}: {}", page.title, page.content));
            }
            push_load_warnings(&store, &mut human)?;
            emit_success(ctx.output, "wiki list", &ws.wiki, Some(&human))
        }
        WikiCommands::Add { title, content } => {
            let id = store.mutate(|ws| ws.add_wiki_page(&title, &content))?;
            let human = HumanOutput::new(format!("hf wiki add: added \"{}\"", title.trim()));
            emit_success(ctx.output, "wiki add", &Created { id }, Some(&human))
        }
    }
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidArgument(format!("{} is not a file", path.display())))
}
