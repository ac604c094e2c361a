//! Client for the AI text-generation collaborator.
//!
//! The collaborator is opaque: we send `{prompt, model, context,
//! projectSnapshot}` and get back `{text}` or `{error}`.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::{non_blank, AssistConfig};
use crate::error::{Error, Result};
use crate::model::Status;
use crate::workspace::Workspace;

/// Maximum open items included in a project snapshot.
const SNAPSHOT_ITEMS: usize = 25;

/// Context tag; anything outside the allow-list means `Planning`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistContext {
    #[default]
    Planning,
    Marketing,
    Scheduling,
    Research,
}

impl AssistContext {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "marketing" => AssistContext::Marketing,
            "scheduling" => AssistContext::Scheduling,
            "research" => AssistContext::Research,
            _ => AssistContext::Planning,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssistContext::Planning => "planning",
            AssistContext::Marketing => "marketing",
            AssistContext::Scheduling => "scheduling",
            AssistContext::Research => "research",
        }
    }
}

impl fmt::Display for AssistContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssistRequest<'a> {
    prompt: &'a str,
    model: &'a str,
    context: AssistContext,
    project_snapshot: &'a Value,
}

#[derive(Debug, Default, Deserialize)]
struct AssistReply {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct AssistClient {
    client: Client,
    endpoint: Option<String>,
    model: String,
}

impl AssistClient {
    pub fn new(config: &AssistConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::OperationFailed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: non_blank(config.endpoint.as_deref()).map(str::to_string),
            model: non_blank(Some(config.model.as_str()))
                .unwrap_or("gemini-2.5-flash")
                .to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the collaborator. An empty prompt never leaves the process.
    pub async fn ask(
        &self,
        prompt: &str,
        context: AssistContext,
        snapshot: &Value,
    ) -> Result<String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(Error::InvalidArgument("prompt is required".to_string()));
        }
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or(Error::ConfigurationMissing("assist endpoint"))?;

        tracing::debug!(%context, model = %self.model, "assist request");
        let response = self
            .client
            .post(endpoint)
            .json(&AssistRequest {
                prompt,
                model: &self.model,
                context,
                project_snapshot: snapshot,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let reply: AssistReply = serde_json::from_str(&body).unwrap_or_default();

        if !status.is_success() {
            return Err(Error::Collaborator {
                status: status.as_u16(),
                message: reply.error.unwrap_or_else(|| body.trim().to_string()),
            });
        }
        match reply.text.map(|text| text.trim().to_string()) {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(Error::Collaborator {
                status: 502,
                message: reply
                    .error
                    .unwrap_or_else(|| "collaborator returned no text".to_string()),
            }),
        }
    }
}

/// Compact view of the workspace sent along with a prompt.
pub fn project_snapshot(ws: &Workspace, today: NaiveDate) -> Value {
    let open: Vec<Value> = ws
        .work_items
        .iter()
        .filter(|item| item.status != Status::Done)
        .take(SNAPSHOT_ITEMS)
        .map(|item| {
            json!({
                "title": item.title,
                "board": item.board,
                "status": item.status,
                "priority": item.priority,
                "assignee": item.assignee,
                "dueDate": item.due_date,
                "overdue": item.is_overdue(today),
            })
        })
        .collect();

    json!({
        "today": today,
        "boards": ws.boards,
        "totals": {
            "items": ws.work_items.len(),
            "done": ws.work_items.iter().filter(|item| item.status == Status::Done).count(),
        },
        "openItems": open,
        "projects": ws.projects.iter().map(|p| json!({"name": p.name, "budget": p.budget})).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_context_falls_back_to_planning() {
        assert_eq!(AssistContext::from_tag("Marketing"), AssistContext::Marketing);
        assert_eq!(AssistContext::from_tag(" research "), AssistContext::Research);
        assert_eq!(AssistContext::from_tag("sales"), AssistContext::Planning);
        assert_eq!(AssistContext::from_tag(""), AssistContext::Planning);
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_configuration() {
        let client = AssistClient::new(&AssistConfig::default()).unwrap();
        let err = client
            .ask("   ", AssistContext::Planning, &Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = client
            .ask("plan the launch", AssistContext::Planning, &Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing("assist endpoint")));
    }

    #[test]
    fn snapshot_lists_open_items_only() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let mut ws = Workspace::seeded(today);
        let first = ws.work_items[0].id.clone();
        ws.move_item(&first, Status::Done).unwrap();

        let snapshot = project_snapshot(&ws, today);
        assert_eq!(snapshot["totals"]["items"], json!(2));
        assert_eq!(snapshot["totals"]["done"], json!(1));
        assert_eq!(snapshot["openItems"].as_array().unwrap().len(), 1);
        assert_eq!(snapshot["openItems"][0]["title"], json!("Beta milestone"));
    }
}
