//! One-time migration of the legacy (`hustle_flow_v1`) blob.
//!
//! The legacy format differs in two ways:
//! - items carried a boolean `done` flag instead of a status/completion pair;
//! - agents were `{name, skills: [..], status, load}` records instead of a
//!   flat skill catalog.
//!
//! The output is a JSON value in the current shape, which then goes through
//! the regular per-collection recovery in [`crate::store`].

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use crate::model::{new_id, DATE_FORMAT};

/// Rewrite a legacy blob into the current shape.
///
/// `today` is the date recorded for items that were flagged done.
pub fn migrate_legacy(mut legacy: Value, today: NaiveDate) -> Value {
    let Some(root) = legacy.as_object_mut() else {
        return legacy;
    };

    if let Some(Value::Array(tasks)) = root.get_mut("tasks") {
        for task in tasks.iter_mut().filter_map(Value::as_object_mut) {
            flatten_done_flag(task, today);
        }
    }

    let agents = root.remove("agents");
    if !root.contains_key("skills") {
        if let Some(Value::Array(agents)) = agents {
            root.insert(
                "skills".to_string(),
                Value::Array(skills_from_agents(&agents)),
            );
        }
    }

    legacy
}

fn flatten_done_flag(task: &mut Map<String, Value>, today: NaiveDate) {
    let Some(done) = task.remove("done") else {
        return;
    };
    if done.as_bool() != Some(true) {
        return;
    }

    let key = today.format(DATE_FORMAT).to_string();
    let completions = task
        .entry("completions")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(map) = completions.as_object_mut() {
        map.insert(key, Value::Bool(true));
    }
    task.insert("status".to_string(), Value::String("Done".to_string()));
}

/// One skill per distinct agent skill name, case-insensitively.
pub(crate) fn skills_from_agents(agents: &[Value]) -> Vec<Value> {
    let mut seen = BTreeSet::new();
    let mut skills = Vec::new();
    for agent in agents {
        let owner = agent
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("an agent");
        let Some(names) = agent.get("skills").and_then(Value::as_array) else {
            continue;
        };
        for name in names.iter().filter_map(Value::as_str) {
            let name = name.trim();
            if name.is_empty() || !seen.insert(name.to_lowercase()) {
                continue;
            }
            skills.push(json!({
                "id": new_id(),
                "name": name,
                "description": format!("Imported from {owner}"),
            }));
        }
    }
    skills
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    #[test]
    fn done_flag_becomes_completion_for_today() {
        let legacy = json!({
            "tasks": [
                {"id": "a", "title": "Ship", "status": "Review", "done": true},
                {"id": "b", "title": "Plan", "status": "Backlog", "done": false}
            ]
        });

        let migrated = migrate_legacy(legacy, today());
        let tasks = migrated["tasks"].as_array().unwrap();
        assert_eq!(tasks[0]["completions"]["2025-01-15"], json!(true));
        assert_eq!(tasks[0]["status"], json!("Done"));
        assert!(tasks[0].get("done").is_none());
        assert!(tasks[1].get("completions").is_none());
        assert_eq!(tasks[1]["status"], json!("Backlog"));
    }

    #[test]
    fn agents_flatten_into_unique_skills() {
        let legacy = json!({
            "agents": [
                {"name": "FlowBot", "skills": ["planning", "research"]},
                {"name": "MarketPilot", "skills": ["Research", "marketing"]}
            ]
        });

        let migrated = migrate_legacy(legacy, today());
        let skills = migrated["skills"].as_array().unwrap();
        let names: Vec<_> = skills.iter().map(|s| s["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["planning", "research", "marketing"]);
        assert_eq!(skills[0]["description"], json!("Imported from FlowBot"));
        assert!(migrated.get("agents").is_none());
    }

    #[test]
    fn non_object_passes_through() {
        let migrated = migrate_legacy(json!([1, 2]), today());
        assert_eq!(migrated, json!([1, 2]));
    }
}
