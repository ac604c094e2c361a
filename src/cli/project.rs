//! hf time, project and report command implementations.

use chrono::Local;

use crate::cli::item::short_id;
use crate::cli::{
    push_load_warnings, Context, ProjectCommands, ReportCommands, TimeCommands,
};
use crate::error::Result;
use crate::model::{parse_date, Health};
use crate::output::{emit_success, HumanOutput};
use crate::report;

#[derive(serde::Serialize)]
struct TimeLogged {
    id: String,
    work_item_id: String,
    hours: f64,
    cost: f64,
}

#[derive(serde::Serialize)]
struct ProjectSaved {
    id: String,
    name: String,
    budget: f64,
    health: Health,
}

pub fn run_time(ctx: &Context, cmd: TimeCommands) -> Result<()> {
    let store = ctx.open_store()?;
    match cmd {
        TimeCommands::Log {
            item,
            hours,
            rate,
            date,
        } => {
            let date = match date.as_deref() {
                Some(raw) => parse_date(raw)?,
                None => Local::now().date_naive(),
            };
            let output = store.mutate(|ws| {
                let work_item_id = ws.resolve_item(&item)?;
                let id = ws.log_time(&work_item_id, date, hours, rate)?;
                Ok(TimeLogged {
                    id,
                    work_item_id,
                    hours,
                    cost: hours * rate,
                })
            })?;

            let mut human = HumanOutput::new(format!("hf time log: {}h on {date}", output.hours));
            human.push_summary("item", short_id(&output.work_item_id).to_string());
            human.push_summary("cost", format!("{:.2}", output.cost));
            emit_success(ctx.output, "time log", &output, Some(&human))
        }
        TimeCommands::List => {
            let ws = store.snapshot()?;
            let mut human =
                HumanOutput::new(format!("hf time list: {} entr(ies)", ws.time_entries.len()));
            for entry in &ws.time_entries {
                let title = ws
                    .find_item(&entry.work_item_id)
                    .map(|item| item.title.as_str())
                    .unwrap_or("(deleted item)");
                let date = entry
                    .date
                    .map(|date| date.to_string())
                    .unwrap_or_else(|| "(no date)".to_string());
                human.push_detail(format!(
                    "{} {}h x {} = {:.2}  {}",
                    date,
                    entry.hours,
                    entry.rate,
                    entry.cost(),
                    title
                ));
            }
            push_load_warnings(&store, &mut human)?;
            emit_success(ctx.output, "time list", &ws.time_entries, Some(&human))
        }
    }
}

pub fn run_project(ctx: &Context, cmd: ProjectCommands) -> Result<()> {
    let store = ctx.open_store()?;
    match cmd {
        ProjectCommands::Set {
            name,
            budget,
            health,
        } => {
            let health = health.parse::<Health>()?;
            let id = store.mutate(|ws| ws.upsert_project(&name, budget, health))?;
            let output = ProjectSaved {
                id,
                name: name.trim().to_string(),
                budget,
                health,
            };
            let mut human = HumanOutput::new(format!("hf project set: saved \"{}\"", output.name));
            human.push_summary("budget", format!("{budget:.2}"));
            human.push_summary("health", format!("{health:?}"));
            emit_success(ctx.output, "project set", &output, Some(&human))
        }
        ProjectCommands::List => {
            let ws = store.snapshot()?;
            let mut human =
                HumanOutput::new(format!("hf project list: {} project(s)", ws.projects.len()));
            for project in &ws.projects {
                human.push_detail(format!(
                    "{}  budget {:.2}  {:?}",
                    project.name, project.budget, project.health
                ));
            }
            push_load_warnings(&store, &mut human)?;
            emit_success(ctx.output, "project list", &ws.projects, Some(&human))
        }
    }
}

pub fn run_report(ctx: &Context, cmd: ReportCommands) -> Result<()> {
    let store = ctx.open_store()?;
    let ws = store.snapshot()?;
    match cmd {
        ReportCommands::Dashboard => {
            let today = Local::now().date_naive();
            let dashboard = report::dashboard(&ws, today);

            let mut human = HumanOutput::new("hf report dashboard");
            human.push_summary("items", dashboard.total.to_string());
            human.push_summary("completed", dashboard.completed.to_string());
            human.push_summary("overdue", dashboard.overdue.to_string());
            human.push_summary(
                "tracked",
                format!(
                    "{}h, {:.2} of {:.2}",
                    dashboard.tracked_hours, dashboard.tracked_cost, dashboard.total_budget
                ),
            );
            for milestone in &dashboard.milestones {
                let due = milestone
                    .due_date
                    .map(|date| date.to_string())
                    .unwrap_or_else(|| "no date".to_string());
                human.push_detail(format!(
                    "milestone: {} ({}, {})",
                    milestone.title, due, milestone.status
                ));
            }
            for load in &dashboard.loads {
                human.push_detail(format!(
                    "load: {} {} item(s), {}h",
                    load.assignee, load.items, load.estimate_hours
                ));
            }
            if dashboard.overdue > 0 {
                human.push_warning(format!("{} item(s) overdue", dashboard.overdue));
            }
            push_load_warnings(&store, &mut human)?;
            emit_success(ctx.output, "report dashboard", &dashboard, Some(&human))
        }
        ReportCommands::Finance => {
            let finance = report::finance(&ws);

            let mut human = HumanOutput::new("hf report finance");
            human.push_summary("budget", format!("{:.2}", finance.total_budget));
            human.push_summary("cost", format!("{:.2}", finance.total_cost));
            human.push_summary("hours", finance.total_hours.to_string());
            human.push_summary("consumed", format!("{:.0}%", finance.consumption_pct));
            for project in &finance.projects {
                human.push_detail(format!(
                    "{}  {:.2}  {:.0}% used  {:?}",
                    project.name, project.budget, project.used_pct, project.health
                ));
            }
            push_load_warnings(&store, &mut human)?;
            emit_success(ctx.output, "report finance", &finance, Some(&human))
        }
        ReportCommands::Calendar => {
            let days = report::calendar(&ws);

            let mut human = HumanOutput::new(format!("hf report calendar: {} day(s)", days.len()));
            for (date, items) in &days {
                let titles: Vec<&str> = items.iter().map(|item| item.title.as_str()).collect();
                human.push_detail(format!("{date}: {}", titles.join(", ")));
            }
            push_load_warnings(&store, &mut human)?;
            emit_success(ctx.output, "report calendar", &days, Some(&human))
        }
    }
}
