//! The workspace aggregate and its in-place mutations.
//!
//! `Workspace` is the only persisted document. The methods below are the
//! mutations the rest of the crate performs; they are meant to be called on
//! the copy handed out by [`crate::store::WorkspaceStore::mutate`], which
//! discards the copy if a method returns an error.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    new_id, AgentSkill, Document, Health, IntegrationConfig, Kind, Priority, Project,
    SkillAssignment, Status, TimeEntry, WikiPage, WorkItem,
};

/// Board used when a new item names none and the workspace has no boards.
pub const FALLBACK_BOARD: &str = "Core";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    #[serde(rename = "tasks")]
    pub work_items: Vec<WorkItem>,
    pub boards: Vec<String>,
    pub documents: Vec<Document>,
    pub wiki: Vec<WikiPage>,
    pub time_entries: Vec<TimeEntry>,
    pub skills: Vec<AgentSkill>,
    pub projects: Vec<Project>,
    #[serde(rename = "openClaw")]
    pub integration: IntegrationConfig,
}

/// Input for creating a work item.
#[derive(Debug, Clone, Default)]
pub struct WorkItemDraft {
    pub title: String,
    pub board: Option<String>,
    pub kind: Kind,
    pub status: Status,
    pub priority: Priority,
    pub assignee: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub details: String,
    pub estimate_hours: f64,
    pub cost_rate: f64,
    pub milestone: bool,
    pub custom_attrs: std::collections::BTreeMap<String, String>,
}

impl Workspace {
    /// An empty workspace with no seed data.
    pub fn empty() -> Self {
        Self {
            work_items: Vec::new(),
            boards: Vec::new(),
            documents: Vec::new(),
            wiki: Vec::new(),
            time_entries: Vec::new(),
            skills: Vec::new(),
            projects: Vec::new(),
            integration: IntegrationConfig::default(),
        }
    }

    /// The built-in starting workspace, with dates relative to `today`.
    pub fn seeded(today: NaiveDate) -> Self {
        Self {
            work_items: seed_work_items(today),
            boards: seed_boards(),
            documents: vec![Document {
                id: new_id(),
                name: "MVP PRD".to_string(),
                url: "docs/mvp-prd.md".to_string(),
                storage_path: None,
            }],
            wiki: vec![WikiPage {
                id: new_id(),
                title: "Operating Rhythm".to_string(),
                content: "Weekly planning on Monday, review Friday.".to_string(),
            }],
            time_entries: Vec::new(),
            skills: seed_skills(),
            projects: seed_projects(),
            integration: IntegrationConfig::default(),
        }
    }

    // =========================================================================
    // Work items
    // =========================================================================

    pub fn find_item(&self, id: &str) -> Option<&WorkItem> {
        self.work_items.iter().find(|item| item.id == id)
    }

    pub fn find_item_mut(&mut self, id: &str) -> Option<&mut WorkItem> {
        self.work_items.iter_mut().find(|item| item.id == id)
    }

    /// Resolve a full id or a unique id prefix to an item id.
    pub fn resolve_item(&self, key: &str) -> Result<String> {
        let key = key.trim();
        if let Some(item) = self.find_item(key) {
            return Ok(item.id.clone());
        }
        let matches: Vec<&WorkItem> = if key.is_empty() {
            Vec::new()
        } else {
            self.work_items
                .iter()
                .filter(|item| item.id.starts_with(key))
                .collect()
        };
        match matches.as_slice() {
            [item] => Ok(item.id.clone()),
            [] => Err(Error::not_found("work item", key)),
            _ => Err(Error::InvalidArgument(format!(
                "'{key}' matches {} work items; use a longer prefix",
                matches.len()
            ))),
        }
    }

    /// Resolve a skill id or name (case-insensitive) to a skill id.
    pub fn resolve_skill(&self, key: &str) -> Result<String> {
        self.skills
            .iter()
            .find(|skill| skill.id == key.trim())
            .or_else(|| self.skill_by_name(key))
            .map(|skill| skill.id.clone())
            .ok_or_else(|| Error::not_found("skill", key.trim()))
    }

    /// Like [`Self::find_item_mut`], but a missing item is an error.
    pub fn item_mut(&mut self, id: &str) -> Result<&mut WorkItem> {
        self.find_item_mut(id)
            .ok_or_else(|| Error::not_found("work item", id))
    }

    pub fn add_work_item(&mut self, draft: WorkItemDraft) -> Result<String> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(Error::InvalidArgument("title cannot be empty".to_string()));
        }
        if let (Some(start), Some(due)) = (draft.start_date, draft.due_date) {
            if due < start {
                return Err(Error::InvalidArgument(format!(
                    "due date {due} is before start date {start}"
                )));
            }
        }
        check_amount("estimate hours", draft.estimate_hours)?;
        check_amount("cost rate", draft.cost_rate)?;

        let board = match draft.board.as_deref().map(str::trim) {
            Some(board) if !board.is_empty() => board.to_string(),
            _ => self
                .boards
                .first()
                .cloned()
                .unwrap_or_else(|| FALLBACK_BOARD.to_string()),
        };
        self.ensure_board(&board);

        let mut item = WorkItem::new(title, board);
        item.kind = draft.kind;
        item.status = draft.status;
        item.priority = draft.priority;
        item.assignee = draft
            .assignee
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        item.start_date = draft.start_date;
        item.due_date = draft.due_date;
        item.details = draft.details.trim().to_string();
        item.estimate_hours = draft.estimate_hours;
        item.cost_rate = draft.cost_rate;
        item.milestone = draft.milestone;
        item.custom_attrs = draft.custom_attrs;

        let id = item.id.clone();
        self.work_items.push(item);
        Ok(id)
    }

    /// Move an item to the cyclic next status and return it.
    pub fn advance(&mut self, id: &str) -> Result<Status> {
        let item = self.item_mut(id)?;
        item.status = item.status.next();
        Ok(item.status)
    }

    pub fn move_item(&mut self, id: &str, status: Status) -> Result<()> {
        self.item_mut(id)?.status = status;
        Ok(())
    }

    pub fn comment(&mut self, id: &str, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidArgument("comment cannot be empty".to_string()));
        }
        self.item_mut(id)?.comments.push(text.to_string());
        Ok(())
    }

    /// Remove an item together with the time logged against it.
    pub fn delete_work_item(&mut self, id: &str) -> Result<WorkItem> {
        let idx = self
            .work_items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| Error::not_found("work item", id))?;
        let removed = self.work_items.remove(idx);
        self.time_entries.retain(|entry| entry.work_item_id != id);
        Ok(removed)
    }

    // =========================================================================
    // Boards
    // =========================================================================

    pub fn add_board(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument("board name cannot be empty".to_string()));
        }
        if self.boards.iter().any(|board| board == name) {
            return Err(Error::InvalidArgument(format!("board '{name}' already exists")));
        }
        self.boards.push(name.to_string());
        Ok(())
    }

    /// Drop a board name. Items tagged with it keep their tag.
    pub fn remove_board(&mut self, name: &str) -> Result<()> {
        let before = self.boards.len();
        self.boards.retain(|board| board != name);
        if self.boards.len() == before {
            return Err(Error::not_found("board", name));
        }
        Ok(())
    }

    pub(crate) fn ensure_board(&mut self, name: &str) {
        if !name.is_empty() && !self.boards.iter().any(|board| board == name) {
            self.boards.push(name.to_string());
        }
    }

    // =========================================================================
    // Documents and wiki
    // =========================================================================

    pub fn add_document(&mut self, name: &str, url: &str) -> Result<String> {
        self.add_document_at(name, url, None)
    }

    /// Record a document, with its blob path when it was uploaded.
    pub fn add_document_at(
        &mut self,
        name: &str,
        url: &str,
        storage_path: Option<String>,
    ) -> Result<String> {
        let (name, url) = (name.trim(), url.trim());
        if name.is_empty() || url.is_empty() {
            return Err(Error::InvalidArgument(
                "document name and url are required".to_string(),
            ));
        }
        let id = new_id();
        self.documents.insert(
            0,
            Document {
                id: id.clone(),
                name: name.to_string(),
                url: url.to_string(),
                storage_path,
            },
        );
        Ok(id)
    }

    pub fn add_wiki_page(&mut self, title: &str, content: &str) -> Result<String> {
        let (title, content) = (title.trim(), content.trim());
        if title.is_empty() || content.is_empty() {
            return Err(Error::InvalidArgument(
                "wiki title and content are required".to_string(),
            ));
        }
        let id = new_id();
        self.wiki.insert(
            0,
            WikiPage {
                id: id.clone(),
                title: title.to_string(),
                content: content.to_string(),
            },
        );
        Ok(id)
    }

    // =========================================================================
    // Time and budget
    // =========================================================================

    pub fn log_time(
        &mut self,
        work_item_id: &str,
        date: NaiveDate,
        hours: f64,
        rate: f64,
    ) -> Result<String> {
        if self.find_item(work_item_id).is_none() {
            return Err(Error::not_found("work item", work_item_id));
        }
        if !(hours.is_finite() && hours > 0.0) {
            return Err(Error::InvalidArgument("hours must be positive".to_string()));
        }
        check_amount("rate", rate)?;

        let id = new_id();
        self.time_entries.insert(
            0,
            TimeEntry {
                id: id.clone(),
                work_item_id: work_item_id.to_string(),
                date: Some(date),
                hours,
                rate,
            },
        );
        Ok(id)
    }

    /// Create a project, or update budget and health of the project with
    /// the same name (case-insensitive).
    pub fn upsert_project(&mut self, name: &str, budget: f64, health: Health) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument("project name cannot be empty".to_string()));
        }
        check_amount("budget", budget)?;

        if let Some(existing) = self
            .projects
            .iter_mut()
            .find(|project| project.name.eq_ignore_ascii_case(name))
        {
            existing.budget = budget;
            existing.health = health;
            return Ok(existing.id.clone());
        }

        let id = new_id();
        self.projects.push(Project {
            id: id.clone(),
            name: name.to_string(),
            budget,
            health,
        });
        Ok(id)
    }

    // =========================================================================
    // Skills and agent assignment
    // =========================================================================

    pub fn add_skill(&mut self, name: &str, description: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument("skill name cannot be empty".to_string()));
        }
        if self.skill_by_name(name).is_some() {
            return Err(Error::InvalidArgument(format!("skill '{name}' already exists")));
        }
        let id = new_id();
        self.skills.push(AgentSkill {
            id: id.clone(),
            name: name.to_string(),
            description: description.trim().to_string(),
        });
        Ok(id)
    }

    pub fn skill_by_name(&self, name: &str) -> Option<&AgentSkill> {
        self.skills
            .iter()
            .find(|skill| skill.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Rename a skill and refresh the cached name on every assignment.
    pub fn rename_skill(&mut self, skill_id: &str, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(Error::InvalidArgument("skill name cannot be empty".to_string()));
        }
        if self
            .skills
            .iter()
            .any(|skill| skill.id != skill_id && skill.name.eq_ignore_ascii_case(new_name))
        {
            return Err(Error::InvalidArgument(format!("skill '{new_name}' already exists")));
        }
        let skill = self
            .skills
            .iter_mut()
            .find(|skill| skill.id == skill_id)
            .ok_or_else(|| Error::not_found("skill", skill_id))?;
        skill.name = new_name.to_string();

        for item in &mut self.work_items {
            if let SkillAssignment::Assigned { id, name } = &mut item.agent.skill {
                if id == skill_id {
                    *name = new_name.to_string();
                }
            }
        }
        Ok(())
    }

    /// Delete a skill. Assignments pointing at it become `Removed`.
    /// Returns how many work items were affected.
    pub fn remove_skill(&mut self, skill_id: &str) -> Result<usize> {
        let idx = self
            .skills
            .iter()
            .position(|skill| skill.id == skill_id)
            .ok_or_else(|| Error::not_found("skill", skill_id))?;
        self.skills.remove(idx);

        let mut affected = 0;
        for item in &mut self.work_items {
            if item.agent.skill.skill_id() == Some(skill_id) {
                let name = item.agent.skill.name().unwrap_or_default().to_string();
                item.agent.skill = SkillAssignment::Removed { name };
                affected += 1;
            }
        }
        Ok(affected)
    }

    /// Attach a skill to an item; a backlog item is pulled into progress.
    pub fn assign_skill(&mut self, item_id: &str, skill_id: &str) -> Result<()> {
        let skill = self
            .skills
            .iter()
            .find(|skill| skill.id == skill_id)
            .cloned()
            .ok_or_else(|| Error::not_found("skill", skill_id))?;
        let item = self.item_mut(item_id)?;
        item.agent.skill = SkillAssignment::Assigned {
            id: skill.id,
            name: skill.name,
        };
        if item.status == Status::Backlog {
            item.status = Status::InProgress;
        }
        Ok(())
    }

    pub fn set_integration(&mut self, url: &str, token: &str) {
        self.integration = IntegrationConfig {
            url: url.trim().to_string(),
            token: token.trim().to_string(),
        };
    }

    // =========================================================================
    // Bulk
    // =========================================================================

    /// Add the product-launch template items. Returns the new item ids.
    pub fn apply_template(&mut self, today: NaiveDate) -> Vec<String> {
        let template = [
            ("Brand positioning brief", Kind::Task, Priority::High, 5, "Marketing", false),
            ("Landing page copy", Kind::Feature, Priority::Medium, 9, "Marketing", false),
            ("QA regression checklist", Kind::Task, Priority::High, 7, "Core", false),
            ("Launch milestone", Kind::Risk, Priority::Critical, 14, "Core", true),
        ];

        let mut ids = Vec::with_capacity(template.len());
        for (title, kind, priority, due_in, board, milestone) in template {
            self.ensure_board(board);
            let mut item = WorkItem::new(title, board);
            item.assignee = Some("Founder".to_string());
            item.kind = kind;
            item.priority = priority;
            item.start_date = Some(today);
            item.due_date = Some(today + Duration::days(due_in));
            item.estimate_hours = 4.0;
            item.cost_rate = 85.0;
            item.details = "Added from template".to_string();
            item.milestone = milestone;
            item.custom_attrs
                .insert("template".to_string(), "Product Launch".to_string());
            ids.push(item.id.clone());
            self.work_items.push(item);
        }
        ids
    }

    /// Pretty JSON of the whole workspace, as written to durable storage.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn check_amount(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "{field} must be a non-negative number"
        )))
    }
}

pub(crate) fn seed_boards() -> Vec<String> {
    vec!["Core".to_string(), "Marketing".to_string()]
}

pub(crate) fn seed_work_items(today: NaiveDate) -> Vec<WorkItem> {
    let mut scope = WorkItem::new("Define launch scope", "Core");
    scope.assignee = Some("Founder".to_string());
    scope.status = Status::InProgress;
    scope.priority = Priority::High;
    scope.start_date = Some(today - Duration::days(2));
    scope.due_date = Some(today + Duration::days(4));
    scope.estimate_hours = 8.0;
    scope.cost_rate = 95.0;
    scope.details = "Finalize MVP boundary for v1 release.".to_string();
    scope
        .custom_attrs
        .insert("stream".to_string(), "planning".to_string());

    let mut beta = WorkItem::new("Beta milestone", "Core");
    beta.assignee = Some("FlowBot".to_string());
    beta.kind = Kind::Feature;
    beta.priority = Priority::Critical;
    beta.start_date = Some(today + Duration::days(3));
    beta.due_date = Some(today + Duration::days(14));
    beta.estimate_hours = 12.0;
    beta.cost_rate = 120.0;
    beta.details = "Public beta package.".to_string();
    beta.milestone = true;
    beta.custom_attrs
        .insert("release".to_string(), "0.1".to_string());

    vec![scope, beta]
}

pub(crate) fn seed_skills() -> Vec<AgentSkill> {
    [
        ("planning", "Break work into sequenced, owned steps."),
        ("research", "Collect findings with stated confidence."),
        ("marketing", "Channel plans, messaging and KPIs."),
    ]
    .into_iter()
    .map(|(name, description)| AgentSkill {
        id: new_id(),
        name: name.to_string(),
        description: description.to_string(),
    })
    .collect()
}

pub(crate) fn seed_projects() -> Vec<Project> {
    vec![Project {
        id: new_id(),
        name: "Hustle Flow Core".to_string(),
        budget: 40_000.0,
        health: Health::Green,
    }]
}
