//! Read-only summaries: dashboard, finance and calendar.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{Health, Status, WorkItem};
use crate::workspace::Workspace;

/// Milestones shown on the dashboard.
const DASHBOARD_MILESTONES: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub total: usize,
    pub completed: usize,
    pub overdue: usize,
    pub tracked_hours: f64,
    pub tracked_cost: f64,
    pub total_budget: f64,
    pub milestones: Vec<MilestoneView>,
    pub loads: Vec<AssigneeLoad>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestoneView {
    pub id: String,
    pub title: String,
    pub due_date: Option<NaiveDate>,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssigneeLoad {
    pub assignee: String,
    pub items: usize,
    pub estimate_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finance {
    pub total_budget: f64,
    pub total_cost: f64,
    pub total_hours: f64,
    /// Percent of the total budget consumed, capped at 100.
    pub consumption_pct: f64,
    pub projects: Vec<ProjectBudget>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectBudget {
    pub name: String,
    pub health: Health,
    pub budget: f64,
    pub used_pct: f64,
}

/// `cost / budget` as a percentage, capped at 100; 0 without a budget.
pub fn consumption(cost: f64, budget: f64) -> f64 {
    if budget <= 0.0 {
        return 0.0;
    }
    (cost / budget * 100.0).min(100.0)
}

pub fn total_cost(ws: &Workspace) -> f64 {
    ws.time_entries.iter().map(|entry| entry.cost()).sum()
}

pub fn dashboard(ws: &Workspace, today: NaiveDate) -> Dashboard {
    let mut milestones: Vec<&WorkItem> = ws.work_items.iter().filter(|item| item.milestone).collect();
    // Undated milestones sort first, as an empty date string would.
    milestones.sort_by_key(|item| item.due_date);

    let mut loads: BTreeMap<String, AssigneeLoad> = BTreeMap::new();
    for item in &ws.work_items {
        let assignee = item.assignee.as_deref().unwrap_or("Unassigned");
        let load = loads
            .entry(assignee.to_string())
            .or_insert_with(|| AssigneeLoad {
                assignee: assignee.to_string(),
                items: 0,
                estimate_hours: 0.0,
            });
        load.items += 1;
        load.estimate_hours += item.estimate_hours;
    }

    Dashboard {
        total: ws.work_items.len(),
        completed: ws
            .work_items
            .iter()
            .filter(|item| item.status == Status::Done)
            .count(),
        overdue: ws
            .work_items
            .iter()
            .filter(|item| item.is_overdue(today))
            .count(),
        tracked_hours: ws.time_entries.iter().map(|entry| entry.hours).sum(),
        tracked_cost: total_cost(ws),
        total_budget: ws.projects.iter().map(|project| project.budget).sum(),
        milestones: milestones
            .into_iter()
            .take(DASHBOARD_MILESTONES)
            .map(|item| MilestoneView {
                id: item.id.clone(),
                title: item.title.clone(),
                due_date: item.due_date,
                status: item.status,
            })
            .collect(),
        loads: loads.into_values().collect(),
    }
}

pub fn finance(ws: &Workspace) -> Finance {
    let total_cost = total_cost(ws);
    let total_budget: f64 = ws.projects.iter().map(|project| project.budget).sum();
    Finance {
        total_budget,
        total_cost,
        total_hours: ws.time_entries.iter().map(|entry| entry.hours).sum(),
        consumption_pct: consumption(total_cost, total_budget),
        projects: ws
            .projects
            .iter()
            .map(|project| ProjectBudget {
                name: project.name.clone(),
                health: project.health,
                budget: project.budget,
                used_pct: consumption(total_cost, project.budget),
            })
            .collect(),
    }
}

/// Items grouped by due date, dates ascending.
pub fn calendar(ws: &Workspace) -> BTreeMap<NaiveDate, Vec<&WorkItem>> {
    let mut days: BTreeMap<NaiveDate, Vec<&WorkItem>> = BTreeMap::new();
    for item in &ws.work_items {
        if let Some(due) = item.due_date {
            days.entry(due).or_default().push(item);
        }
    }
    days
}
