//! Mapping between workspace entities and remote table rows.
//!
//! Outbound rows are plain serde output plus the scope column. Inbound rows
//! come from a store other clients also write to, so they are read field by
//! field: a missing or malformed field takes its default instead of
//! rejecting the row. Nested JSON (custom attributes, agent state) may
//! arrive either as an object or as a JSON-encoded string.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Map, Value};

use crate::model::{
    new_id, parse_date, AgentRun, Document, IntegrationConfig, LogEntry, SkillAssignment,
    WikiPage, WorkItem, DATE_FORMAT,
};
use crate::remote::SCOPE_COLUMN;

pub fn work_item_row(item: &WorkItem, workspace_id: &str) -> Value {
    json!({
        SCOPE_COLUMN: workspace_id,
        "id": item.id,
        "title": item.title,
        "board": item.board,
        "type": item.kind,
        "status": item.status,
        "priority": item.priority,
        "assignee": item.assignee,
        "start_date": item.start_date.map(|date| date.format(DATE_FORMAT).to_string()),
        "due_date": item.due_date.map(|date| date.format(DATE_FORMAT).to_string()),
        "details": item.details,
        "estimate_hours": item.estimate_hours,
        "cost_rate": item.cost_rate,
        "milestone": item.milestone,
        "custom_attrs": item.custom_attrs,
        "comments": item.comments,
        "agent": item.agent,
    })
}

pub fn document_row(doc: &Document, workspace_id: &str) -> Value {
    json!({
        SCOPE_COLUMN: workspace_id,
        "id": doc.id,
        "name": doc.name,
        "url": doc.url,
        "storage_path": doc.storage_path,
    })
}

pub fn wiki_row(page: &WikiPage, workspace_id: &str) -> Value {
    json!({
        SCOPE_COLUMN: workspace_id,
        "id": page.id,
        "title": page.title,
        "content": page.content,
    })
}

pub fn integration_row(config: &IntegrationConfig, workspace_id: &str) -> Value {
    json!({
        SCOPE_COLUMN: workspace_id,
        "url": config.url,
        "token": config.token,
    })
}

pub fn work_item_from_row(row: &Value) -> WorkItem {
    let mut item = WorkItem::new(
        text(row, "title").unwrap_or_else(|| "Untitled".to_string()),
        text(row, "board").unwrap_or_default(),
    );
    if let Some(id) = text(row, "id") {
        item.id = id;
    }
    item.kind = parsed(row, "type").unwrap_or_default();
    item.status = parsed(row, "status").unwrap_or_default();
    item.priority = parsed(row, "priority").unwrap_or_default();
    item.assignee = text(row, "assignee");
    item.start_date = date(row, "start_date");
    item.due_date = date(row, "due_date");
    item.details = text(row, "details").unwrap_or_default();
    item.estimate_hours = amount(row, "estimate_hours");
    item.cost_rate = amount(row, "cost_rate");
    item.milestone = row.get("milestone").and_then(Value::as_bool).unwrap_or(false);
    item.custom_attrs = nested(row, "custom_attrs")
        .as_ref()
        .and_then(Value::as_object)
        .map(string_map)
        .unwrap_or_default();
    item.comments = row
        .get("comments")
        .and_then(Value::as_array)
        .map(|comments| {
            comments
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    item.agent = nested(row, "agent")
        .as_ref()
        .and_then(Value::as_object)
        .map(agent_from_object)
        .unwrap_or_default();
    item
}

pub fn document_from_row(row: &Value) -> Document {
    Document {
        id: text(row, "id").unwrap_or_else(new_id),
        name: text(row, "name").unwrap_or_else(|| "Untitled".to_string()),
        url: text(row, "url").unwrap_or_default(),
        storage_path: text(row, "storage_path"),
    }
}

pub fn wiki_from_row(row: &Value) -> WikiPage {
    WikiPage {
        id: text(row, "id").unwrap_or_else(new_id),
        title: text(row, "title").unwrap_or_else(|| "Untitled".to_string()),
        content: text(row, "content").unwrap_or_default(),
    }
}

pub fn integration_from_row(row: &Value) -> IntegrationConfig {
    IntegrationConfig {
        url: text(row, "url").unwrap_or_default(),
        token: text(row, "token").unwrap_or_default(),
    }
}

fn agent_from_object(agent: &Map<String, Value>) -> AgentRun {
    let skill = match agent.get("skill") {
        // Older clients stored the bare skill name.
        Some(Value::String(name)) if !name.trim().is_empty() => SkillAssignment::Removed {
            name: name.trim().to_string(),
        },
        Some(value @ Value::Object(_)) => {
            serde_json::from_value(value.clone()).unwrap_or_default()
        }
        _ => SkillAssignment::Unassigned,
    };

    let mut run = AgentRun {
        skill,
        status: agent
            .get("status")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default(),
        log: Vec::new(),
        output: agent
            .get("output")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        last_run_at: agent
            .get("lastRunAt")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse::<DateTime<Utc>>().ok()),
    };
    for entry in agent.get("log").and_then(Value::as_array).into_iter().flatten() {
        if let Ok(entry) = serde_json::from_value::<LogEntry>(entry.clone()) {
            run.push_entry(entry);
        }
    }
    run
}

fn text(row: &Value, field: &str) -> Option<String> {
    row.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parsed<T: std::str::FromStr>(row: &Value, field: &str) -> Option<T> {
    row.get(field)
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse().ok())
}

fn date(row: &Value, field: &str) -> Option<NaiveDate> {
    row.get(field)
        .and_then(Value::as_str)
        .and_then(|raw| parse_date(raw).ok())
}

fn amount(row: &Value, field: &str) -> f64 {
    let value = match row.get(field) {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(raw)) => raw.trim().parse().ok(),
        _ => None,
    };
    value
        .filter(|value| value.is_finite() && *value >= 0.0)
        .unwrap_or(0.0)
}

fn nested(row: &Value, field: &str) -> Option<Value> {
    match row.get(field)? {
        Value::String(raw) => serde_json::from_str(raw).ok(),
        other => Some(other.clone()),
    }
}

fn string_map(object: &Map<String, Value>) -> BTreeMap<String, String> {
    object
        .iter()
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, value)| {
            let value = match value {
                Value::String(raw) => raw.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, RunStatus, Status};

    #[test]
    fn outbound_row_carries_scope_and_dates() {
        let mut item = WorkItem::new("Ship beta", "Core");
        item.due_date = NaiveDate::from_ymd_opt(2025, 7, 1);
        let row = work_item_row(&item, "primary");
        assert_eq!(row[SCOPE_COLUMN], json!("primary"));
        assert_eq!(row["due_date"], json!("2025-07-01"));
        assert_eq!(row["start_date"], Value::Null);
        assert_eq!(row["status"], json!("Backlog"));
    }

    #[test]
    fn inbound_row_defaults_field_by_field() {
        let row = json!({
            "id": "remote-1",
            "title": "Pulled",
            "status": "In Progress",
            "priority": "urgent",
            "due_date": "not a date",
            "estimate_hours": "3.5",
            "custom_attrs": "{broken json",
            "agent": "{\"output\": \"from string\"}"
        });

        let item = work_item_from_row(&row);
        assert_eq!(item.id, "remote-1");
        assert_eq!(item.status, Status::InProgress);
        assert_eq!(item.priority, Priority::Medium);
        assert_eq!(item.due_date, None);
        assert_eq!(item.estimate_hours, 3.5);
        assert!(item.custom_attrs.is_empty());
        assert_eq!(item.agent.output, "from string");
        assert_eq!(item.agent.status, RunStatus::Idle);
    }

    #[test]
    fn bare_skill_name_becomes_removed_sentinel() {
        let row = json!({"id": "x", "title": "T", "agent": {"skill": "research", "status": "running"}});
        let item = work_item_from_row(&row);
        assert_eq!(
            item.agent.skill,
            SkillAssignment::Removed {
                name: "research".to_string()
            }
        );
        assert_eq!(item.agent.status, RunStatus::Running);
    }

    #[test]
    fn agent_state_survives_a_round_trip() {
        let mut item = WorkItem::new("Research", "Core");
        item.agent.skill = SkillAssignment::Assigned {
            id: "s1".to_string(),
            name: "research".to_string(),
        };
        item.agent.push_log("Run started with research");
        item.agent.last_run_at = Some(Utc::now());

        let back = work_item_from_row(&work_item_row(&item, "primary"));
        assert_eq!(back.agent, item.agent);
        assert_eq!(back.id, item.id);
    }

    #[test]
    fn non_string_attr_values_are_stringified() {
        let row = json!({"id": "x", "title": "T", "custom_attrs": {"points": 5, "": "skip"}});
        let item = work_item_from_row(&row);
        assert_eq!(item.custom_attrs.len(), 1);
        assert_eq!(item.custom_attrs["points"], "5");
    }
}
