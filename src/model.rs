//! Workspace entities.
//!
//! Everything here is plain data with serde derives. The JSON field names
//! match the blob written by earlier releases (`camelCase`, `tasks`,
//! `openClaw`, ...) so old browser exports keep loading.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Maximum number of entries kept in an agent run log.
pub const MAX_AGENT_LOG: usize = 60;

/// Date format used for calendar dates everywhere in the workspace.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fresh opaque identifier for a new entity.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Lifecycle stage of a work item. Declaration order is the board order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Backlog,
    #[serde(rename = "In Progress")]
    InProgress,
    Review,
    Done,
}

impl Status {
    pub const FLOW: [Status; 4] = [
        Status::Backlog,
        Status::InProgress,
        Status::Review,
        Status::Done,
    ];

    /// The cyclic successor: `Done` wraps back to `Backlog`.
    pub fn next(self) -> Status {
        let idx = Self::FLOW
            .iter()
            .position(|status| *status == self)
            .unwrap_or(0);
        Self::FLOW[(idx + 1) % Self::FLOW.len()]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Backlog => "Backlog",
            Status::InProgress => "In Progress",
            Status::Review => "Review",
            Status::Done => "Done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let normalized = normalize_token(raw);
        match normalized.as_str() {
            "backlog" => Ok(Status::Backlog),
            "inprogress" => Ok(Status::InProgress),
            "review" => Ok(Status::Review),
            "done" => Ok(Status::Done),
            _ => Err(Error::InvalidArgument(format!("unknown status '{raw}'"))),
        }
    }
}

/// Priority; the derived order puts the most urgent first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "Critical",
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match normalize_token(raw).as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(Error::InvalidArgument(format!("unknown priority '{raw}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kind {
    #[default]
    Task,
    Feature,
    Bug,
    Risk,
}

impl FromStr for Kind {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match normalize_token(raw).as_str() {
            "task" => Ok(Kind::Task),
            "feature" => Ok(Kind::Feature),
            "bug" => Ok(Kind::Bug),
            "risk" => Ok(Kind::Risk),
            _ => Err(Error::InvalidArgument(format!("unknown item type '{raw}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Health {
    #[default]
    Green,
    Amber,
    Red,
}

impl FromStr for Health {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match normalize_token(raw).as_str() {
            "green" => Ok(Health::Green),
            "amber" | "yellow" => Ok(Health::Amber),
            "red" => Ok(Health::Red),
            _ => Err(Error::InvalidArgument(format!("unknown health '{raw}'"))),
        }
    }
}

fn normalize_token(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// A task tracked on a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "or_default")]
    pub board: String,
    #[serde(default, rename = "type", deserialize_with = "or_default")]
    pub kind: Kind,
    #[serde(default, deserialize_with = "or_default")]
    pub status: Status,
    #[serde(default, deserialize_with = "or_default")]
    pub priority: Priority,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub assignee: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "or_default")]
    pub details: String,
    #[serde(default, deserialize_with = "or_default")]
    pub estimate_hours: f64,
    #[serde(default, deserialize_with = "or_default")]
    pub cost_rate: f64,
    #[serde(default, deserialize_with = "or_default")]
    pub milestone: bool,
    #[serde(default, deserialize_with = "or_default")]
    pub custom_attrs: BTreeMap<String, String>,
    #[serde(
        default,
        deserialize_with = "or_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub comments: Vec<String>,
    /// Per-day completion marks, filled by legacy migration.
    #[serde(
        default,
        deserialize_with = "or_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub completions: BTreeMap<NaiveDate, bool>,
    #[serde(default, deserialize_with = "or_default")]
    pub agent: AgentRun,
}

impl WorkItem {
    pub fn new(title: impl Into<String>, board: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            board: board.into(),
            kind: Kind::default(),
            status: Status::default(),
            priority: Priority::default(),
            assignee: None,
            start_date: None,
            due_date: None,
            details: String::new(),
            estimate_hours: 0.0,
            cost_rate: 0.0,
            milestone: false,
            custom_attrs: BTreeMap::new(),
            comments: Vec::new(),
            completions: BTreeMap::new(),
            agent: AgentRun::default(),
        }
    }

    /// Overdue means a due date strictly before `today` and not done.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != Status::Done && self.due_date.is_some_and(|due| due < today)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
}

/// Which skill an agent run uses.
///
/// Skills are referenced by id; the name is cached for display and for the
/// collaborator request. Deleting a skill leaves `Removed` behind so the
/// item shows why it can no longer run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SkillAssignment {
    #[default]
    Unassigned,
    Assigned {
        id: String,
        name: String,
    },
    Removed {
        name: String,
    },
}

impl SkillAssignment {
    pub fn name(&self) -> Option<&str> {
        match self {
            SkillAssignment::Unassigned => None,
            SkillAssignment::Assigned { name, .. } | SkillAssignment::Removed { name } => {
                Some(name)
            }
        }
    }

    pub fn skill_id(&self) -> Option<&str> {
        match self {
            SkillAssignment::Assigned { id, .. } => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub text: String,
}

/// Automation state embedded in every work item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRun {
    #[serde(default, deserialize_with = "or_default")]
    pub skill: SkillAssignment,
    #[serde(default, deserialize_with = "or_default")]
    pub status: RunStatus,
    #[serde(default, deserialize_with = "or_default")]
    pub log: Vec<LogEntry>,
    #[serde(default, deserialize_with = "or_default")]
    pub output: String,
    #[serde(
        default,
        deserialize_with = "or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_run_at: Option<DateTime<Utc>>,
}

impl AgentRun {
    /// Append a log line stamped now, evicting the oldest beyond the cap.
    pub fn push_log(&mut self, text: impl Into<String>) {
        self.push_entry(LogEntry {
            at: Utc::now(),
            text: text.into(),
        });
    }

    pub fn push_entry(&mut self, entry: LogEntry) {
        self.log.push(entry);
        if self.log.len() > MAX_AGENT_LOG {
            let excess = self.log.len() - MAX_AGENT_LOG;
            self.log.drain(..excess);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiPage {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "or_default")]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: String,
    #[serde(rename = "taskId")]
    pub work_item_id: String,
    /// Absent when the stored date was blank or malformed.
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "or_default")]
    pub hours: f64,
    #[serde(default, deserialize_with = "or_default")]
    pub rate: f64,
}

impl TimeEntry {
    pub fn cost(&self) -> f64 {
        self.hours * self.rate
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "or_default")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "or_default")]
    pub budget: f64,
    #[serde(default, deserialize_with = "or_default")]
    pub health: Health,
}

/// Endpoint and bearer token for the agent skill collaborator.
///
/// Stored in plaintext inside the workspace blob.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
}

impl IntegrationConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

impl fmt::Debug for IntegrationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrationConfig")
            .field("url", &self.url)
            .field("token", &if self.token.is_empty() { "" } else { "[redacted]" })
            .finish()
    }
}

/// Parse `key:value, key2:value2` into custom attributes.
///
/// Pairs without a key or without a `:` are skipped; everything after the
/// first `:` is the value, so values may contain colons.
pub fn parse_custom_attrs(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| Error::InvalidArgument(format!("invalid date '{raw}', expected YYYY-MM-DD")))
}

// Stored blobs were written by hand-rolled browser code: NaN numbers come
// back as null, dates may be blank, enums may hold unknown strings. A field
// that does not fit takes its default instead of rejecting the record.

fn or_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(T::deserialize(raw).unwrap_or_default())
}

fn lenient_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(raw
        .as_str()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| NaiveDate::parse_from_str(value, DATE_FORMAT).ok()))
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(raw
        .as_str()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_cycles_through_flow() {
        assert_eq!(Status::Backlog.next(), Status::InProgress);
        assert_eq!(Status::Review.next(), Status::Done);
        assert_eq!(Status::Done.next(), Status::Backlog);
    }

    #[test]
    fn status_parses_loose_spellings() {
        assert_eq!("in progress".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("in_progress".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("DONE".parse::<Status>().unwrap(), Status::Done);
        assert!("shipped".parse::<Status>().is_err());
    }

    #[test]
    fn priority_orders_most_urgent_first() {
        let mut priorities = vec![Priority::Low, Priority::Critical, Priority::Medium, Priority::High];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::Critical, Priority::High, Priority::Medium, Priority::Low]
        );
    }

    #[test]
    fn agent_log_keeps_last_sixty() {
        let mut run = AgentRun::default();
        for idx in 0..75 {
            run.push_log(format!("line {idx}"));
        }
        assert_eq!(run.log.len(), MAX_AGENT_LOG);
        assert_eq!(run.log.first().unwrap().text, "line 15");
        assert_eq!(run.log.last().unwrap().text, "line 74");
    }

    #[test]
    fn custom_attrs_keep_colons_in_values() {
        let attrs = parse_custom_attrs("stream: planning, url:https://x.io, :orphan, junk");
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["stream"], "planning");
        assert_eq!(attrs["url"], "https://x.io");
    }

    #[test]
    fn empty_strings_read_as_absent() {
        let raw = r#"{"id":"a","title":"T","assignee":"","startDate":"","dueDate":"2025-03-04"}"#;
        let item: WorkItem = serde_json::from_str(raw).unwrap();
        assert_eq!(item.assignee, None);
        assert_eq!(item.start_date, None);
        assert_eq!(item.due_date, NaiveDate::from_ymd_opt(2025, 3, 4));
        assert_eq!(item.status, Status::Backlog);
    }

    #[test]
    fn malformed_fields_take_defaults() {
        let raw = r#"{"id":"a","title":"T","status":"Shipped","estimateHours":null,
            "costRate":"n/a","comments":"oops","agent":{"status":"busy","log":7}}"#;
        let item: WorkItem = serde_json::from_str(raw).unwrap();
        assert_eq!(item.status, Status::Backlog);
        assert_eq!(item.estimate_hours, 0.0);
        assert_eq!(item.cost_rate, 0.0);
        assert!(item.comments.is_empty());
        assert_eq!(item.agent.status, RunStatus::Idle);
        assert!(item.agent.log.is_empty());
    }

    #[test]
    fn blank_time_entry_date_keeps_the_hours() {
        let raw = r#"{"id":"e","taskId":"a","date":"","hours":3,"rate":50}"#;
        let entry: TimeEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.date, None);
        assert_eq!(entry.cost(), 150.0);
    }

    #[test]
    fn status_serializes_with_display_name() {
        let json = serde_json::to_string(&Status::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
    }

    #[test]
    fn integration_debug_hides_token() {
        let cfg = IntegrationConfig {
            url: "https://agents.local".to_string(),
            token: "ocw_secret".to_string(),
        };
        let printed = format!("{cfg:?}");
        assert!(!printed.contains("ocw_secret"));
    }
}
