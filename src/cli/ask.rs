//! hf ask command implementation.

use chrono::Local;

use crate::ai::{project_snapshot, AssistClient, AssistContext};
use crate::cli::{block_on, Context};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};

#[derive(serde::Serialize)]
struct Answer {
    context: AssistContext,
    model: String,
    text: String,
}

pub fn run(ctx: &Context, prompt: &str, context: &str) -> Result<()> {
    let context = AssistContext::from_tag(context);
    let client = AssistClient::new(&ctx.config.assist)?;

    let store = ctx.open_store()?;
    let today = Local::now().date_naive();
    let snapshot = store.read(|ws| project_snapshot(ws, today))?;

    let text = block_on(client.ask(prompt, context, &snapshot))??;

    let mut human = HumanOutput::new(format!("hf ask ({context})"));
    human.push_detail(text.clone());
    let answer = Answer {
        context,
        model: client.model().to_string(),
        text,
    };
    emit_success(ctx.output, "ask", &answer, Some(&human))
}
