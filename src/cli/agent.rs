//! hf skill, agent and integration command implementations.

use crate::agent::{AgentRunner, RunOutcome};
use crate::cli::item::short_id;
use crate::cli::{
    block_on, push_load_warnings, AgentCommands, Context, IntegrationCommands, SkillCommands,
};
use crate::error::{Error, Result};
use crate::model::{AgentRun, AgentSkill};
use crate::output::{emit_success, HumanOutput};

#[derive(serde::Serialize)]
struct SkillView<'a> {
    #[serde(flatten)]
    skill: &'a AgentSkill,
    assigned_items: usize,
}

#[derive(serde::Serialize)]
struct RunReport {
    item_id: String,
    #[serde(flatten)]
    outcome: RunOutcome,
    agent: AgentRun,
}

#[derive(serde::Serialize)]
struct IntegrationView {
    url: String,
    token_set: bool,
}

pub fn run_skill(ctx: &Context, cmd: SkillCommands) -> Result<()> {
    let store = ctx.open_store()?;
    match cmd {
        SkillCommands::List => {
            let ws = store.snapshot()?;
            let skills: Vec<SkillView> = ws
                .skills
                .iter()
                .map(|skill| SkillView {
                    skill,
                    assigned_items: ws
                        .work_items
                        .iter()
                        .filter(|item| item.agent.skill.skill_id() == Some(skill.id.as_str()))
                        .count(),
                })
                .collect();

            let mut human = HumanOutput::new(format!("hf skill list: {} skill(s)", skills.len()));
            for view in &skills {
                let description = if view.skill.description.is_empty() {
                    String::new()
                } else {
                    format!(" - {}", view.skill.description)
                };
                human.push_detail(format!(
                    "{} ({} item(s)){}",
                    view.skill.name, view.assigned_items, description
                ));
            }
            push_load_warnings(&store, &mut human)?;
            emit_success(ctx.output, "skill list", &skills, Some(&human))
        }
        SkillCommands::Add { name, description } => {
            let id = store.mutate(|ws| ws.add_skill(&name, &description))?;
            let human = HumanOutput::new(format!("hf skill add: added \"{}\"", name.trim()));
            emit_success(
                ctx.output,
                "skill add",
                &serde_json::json!({ "id": id, "name": name.trim() }),
                Some(&human),
            )
        }
        SkillCommands::Rename { skill, name } => {
            let id = store.mutate(|ws| {
                let id = ws.resolve_skill(&skill)?;
                ws.rename_skill(&id, &name)?;
                Ok(id)
            })?;
            let human = HumanOutput::new(format!("hf skill rename: now \"{}\"", name.trim()));
            emit_success(
                ctx.output,
                "skill rename",
                &serde_json::json!({ "id": id, "name": name.trim() }),
                Some(&human),
            )
        }
        SkillCommands::Rm { skill } => {
            let (id, affected) = store.mutate(|ws| {
                let id = ws.resolve_skill(&skill)?;
                let affected = ws.remove_skill(&id)?;
                Ok((id, affected))
            })?;
            let mut human = HumanOutput::new(format!("hf skill rm: removed \"{}\"", skill.trim()));
            if affected > 0 {
                human.push_warning(format!(
                    "{affected} item(s) now reference a removed skill"
                ));
                human.push_next_step("hf skill assign <item> <skill>");
            }
            emit_success(
                ctx.output,
                "skill rm",
                &serde_json::json!({ "id": id, "items_affected": affected }),
                Some(&human),
            )
        }
        SkillCommands::Assign { item, skill } => {
            let (item_id, skill_id) = store.mutate(|ws| {
                let item_id = ws.resolve_item(&item)?;
                let skill_id = ws.resolve_skill(&skill)?;
                ws.assign_skill(&item_id, &skill_id)?;
                Ok((item_id, skill_id))
            })?;
            let mut human = HumanOutput::new("hf skill assign: assigned");
            human.push_summary("item", short_id(&item_id).to_string());
            human.push_summary("skill", skill.trim().to_string());
            human.push_next_step(format!("hf agent run {}", short_id(&item_id)));
            emit_success(
                ctx.output,
                "skill assign",
                &serde_json::json!({ "item_id": item_id, "skill_id": skill_id }),
                Some(&human),
            )
        }
    }
}

pub fn run_agent(ctx: &Context, cmd: AgentCommands) -> Result<()> {
    let store = ctx.open_store()?;
    match cmd {
        AgentCommands::Run { item } => {
            let item_id = store.read(|ws| ws.resolve_item(&item))??;
            let runner = AgentRunner::from_config(store.clone(), &ctx.config.agent)?;
            let outcome = block_on(run_to_end(&runner, &item_id))??;
            let agent = store
                .read(|ws| ws.find_item(&item_id).map(|item| item.agent.clone()))?
                .unwrap_or_default();

            let mut human = HumanOutput::new(format!("hf agent run: {}", outcome_label(&outcome)));
            for entry in &agent.log {
                human.push_detail(format!("{} {}", entry.at.format("%H:%M:%S"), entry.text));
            }
            if !agent.output.is_empty() && outcome == RunOutcome::Completed {
                human.push_detail(String::new());
                human.push_detail(agent.output.clone());
            }
            if let RunOutcome::Failed { reason } = &outcome {
                human.push_warning(reason.clone());
            }
            let report = RunReport {
                item_id,
                outcome,
                agent,
            };
            emit_success(ctx.output, "agent run", &report, Some(&human))
        }
        AgentCommands::Log { item } => {
            let agent = store.read(|ws| {
                let id = ws.resolve_item(&item)?;
                Ok::<_, Error>(
                    ws.find_item(&id)
                        .map(|item| item.agent.clone())
                        .unwrap_or_default(),
                )
            })??;

            let mut human = HumanOutput::new(format!("hf agent log: {} entr(ies)", agent.log.len()));
            if let Some(skill) = agent.skill.name() {
                human.push_summary("skill", skill.to_string());
            }
            if let Some(at) = agent.last_run_at {
                human.push_summary("last run", at.to_rfc3339());
            }
            for entry in &agent.log {
                human.push_detail(format!("{} {}", entry.at.to_rfc3339(), entry.text));
            }
            emit_success(ctx.output, "agent log", &agent, Some(&human))
        }
    }
}

/// Start a run and wait for it; Ctrl-C cancels it.
async fn run_to_end(runner: &AgentRunner, item_id: &str) -> Result<RunOutcome> {
    let handle = runner.start(item_id)?;
    let wait = handle.wait();
    tokio::pin!(wait);

    tokio::select! {
        outcome = &mut wait => Ok(outcome),
        _ = tokio::signal::ctrl_c() => {
            runner.cancel(item_id)?;
            Ok(wait.await)
        }
    }
}

fn outcome_label(outcome: &RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Completed => "completed",
        RunOutcome::Aborted => "aborted",
        RunOutcome::Vanished => "item was deleted during the run",
        RunOutcome::Failed { .. } => "failed",
    }
}

pub fn run_integration(ctx: &Context, cmd: IntegrationCommands) -> Result<()> {
    let store = ctx.open_store()?;
    match cmd {
        IntegrationCommands::Set { url, token } => {
            store.mutate(|ws| {
                ws.set_integration(&url, &token);
                Ok(())
            })?;
            let view = IntegrationView {
                url: url.trim().to_string(),
                token_set: !token.trim().is_empty(),
            };
            let mut human = HumanOutput::new("hf integration set: saved");
            human.push_summary("url", view.url.clone());
            human.push_warning("the token is stored in plaintext in the workspace file");
            emit_success(ctx.output, "integration set", &view, Some(&human))
        }
        IntegrationCommands::Show => {
            let integration = store.read(|ws| ws.integration.clone())?;
            let view = IntegrationView {
                url: integration.url.clone(),
                token_set: !integration.token.is_empty(),
            };
            let mut human = HumanOutput::new("hf integration show");
            if integration.is_configured() {
                human.push_summary("url", view.url.clone());
                human.push_summary("token", if view.token_set { "set" } else { "none" });
            } else {
                human.push_summary("url", "not configured");
                human.push_next_step("hf integration set <url> --token <token>");
            }
            emit_success(ctx.output, "integration show", &view, Some(&human))
        }
    }
}
