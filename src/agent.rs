//! Agent runs against work items.
//!
//! A run first tries the skill collaborator configured in the workspace
//! integration. If there is none, or the call fails, it falls back to a
//! local simulation: three steps at fixed offsets from the start of the run.
//!
//! Every state change goes through [`SharedStore::mutate`], so a run whose
//! item was deleted meanwhile ends as [`RunOutcome::Vanished`] without
//! writing anything. Runs are keyed by item id and can be cancelled.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;

use crate::config::AgentConfig;
use crate::error::{Error, Result};
use crate::model::{AgentRun, IntegrationConfig, RunStatus, SkillAssignment, WorkItem};
use crate::store::SharedStore;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Aborted,
    /// The item was deleted while the run was in flight.
    Vanished,
    /// The store could not be written.
    Failed { reason: String },
}

#[derive(Debug, Serialize)]
struct SkillRequest<'a> {
    skill: &'a str,
    task: &'a WorkItem,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SkillReply {
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub logs: Vec<String>,
}

/// External endpoint that executes a skill against a task.
#[async_trait]
pub trait SkillCollaborator: Send + Sync {
    async fn run_skill(
        &self,
        integration: &IntegrationConfig,
        skill: &str,
        task: &WorkItem,
    ) -> Result<SkillReply>;
}

/// POSTs `{skill, task}` to `<integration url>/skills/run`.
pub struct HttpSkillCollaborator {
    client: Client,
}

impl HttpSkillCollaborator {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::OperationFailed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SkillCollaborator for HttpSkillCollaborator {
    async fn run_skill(
        &self,
        integration: &IntegrationConfig,
        skill: &str,
        task: &WorkItem,
    ) -> Result<SkillReply> {
        let url = format!("{}/skills/run", integration.url.trim().trim_end_matches('/'));
        let mut request = self.client.post(&url).json(&SkillRequest { skill, task });
        if !integration.token.trim().is_empty() {
            request = request.bearer_auth(integration.token.trim());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Collaborator {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }
        Ok(response.json().await?)
    }
}

struct ActiveRun {
    run_id: u64,
    abort: AbortHandle,
}

#[derive(Default)]
struct Registry {
    runs: Mutex<HashMap<String, ActiveRun>>,
    next_id: AtomicU64,
}

impl Registry {
    fn contains(&self, item_id: &str) -> bool {
        self.runs
            .lock()
            .map(|runs| runs.contains_key(item_id))
            .unwrap_or(false)
    }

    /// Remove the entry if it still belongs to `run_id`. Whoever removes
    /// the entry first decides how the run ends.
    fn release(&self, item_id: &str, run_id: u64) -> bool {
        let Ok(mut runs) = self.runs.lock() else {
            return false;
        };
        match runs.get(item_id) {
            Some(active) if active.run_id == run_id => {
                runs.remove(item_id);
                true
            }
            _ => false,
        }
    }

    fn take(&self, item_id: &str) -> Option<ActiveRun> {
        self.runs.lock().ok()?.remove(item_id)
    }
}

/// Handle to one spawned run.
#[derive(Debug)]
pub struct RunHandle {
    item_id: String,
    task: JoinHandle<RunOutcome>,
}

impl RunHandle {
    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub async fn wait(self) -> RunOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_cancelled() => RunOutcome::Aborted,
            Err(err) => RunOutcome::Failed {
                reason: err.to_string(),
            },
        }
    }
}

pub struct AgentRunner {
    store: SharedStore,
    collaborator: Option<Arc<dyn SkillCollaborator>>,
    offsets: [Duration; 3],
    registry: Arc<Registry>,
}

impl AgentRunner {
    /// A runner that only simulates.
    pub fn new(store: SharedStore, config: &AgentConfig) -> Self {
        Self {
            store,
            collaborator: None,
            offsets: config.step_offsets(),
            registry: Arc::new(Registry::default()),
        }
    }

    /// A runner that calls the HTTP skill endpoint when one is configured.
    pub fn from_config(store: SharedStore, config: &AgentConfig) -> Result<Self> {
        let collaborator =
            HttpSkillCollaborator::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::new(store, config).with_collaborator(Arc::new(collaborator)))
    }

    pub fn with_collaborator(mut self, collaborator: Arc<dyn SkillCollaborator>) -> Self {
        self.collaborator = Some(collaborator);
        self
    }

    pub fn is_running(&self, item_id: &str) -> bool {
        self.registry.contains(item_id)
    }

    /// Mark the item running and spawn the run. Must be called from within
    /// a tokio runtime.
    pub fn start(&self, item_id: &str) -> Result<RunHandle> {
        // Held from the running check until the new entry is inserted, so
        // two concurrent starts for one item cannot both pass the check.
        // Lock order is registry, then store.
        let mut runs = self
            .registry
            .runs
            .lock()
            .map_err(|_| Error::OperationFailed("agent registry lock poisoned".to_string()))?;
        if runs.contains_key(item_id) {
            return Err(Error::InvalidArgument(format!(
                "an agent is already running for {item_id}"
            )));
        }

        let (skill, integration, task) = self.store.mutate(|ws| {
            let integration = ws.integration.clone();
            let item = ws.item_mut(item_id)?;
            let skill = match &item.agent.skill {
                SkillAssignment::Assigned { name, .. } => name.clone(),
                SkillAssignment::Unassigned => {
                    return Err(Error::InvalidArgument(format!(
                        "no skill assigned to '{}'",
                        item.title
                    )))
                }
                SkillAssignment::Removed { name } => {
                    return Err(Error::InvalidArgument(format!(
                        "skill '{name}' was removed; assign another skill first"
                    )))
                }
            };
            item.agent.status = RunStatus::Running;
            item.agent.push_log(format!("Run started with {skill}"));
            Ok((skill, integration, item.clone()))
        })?;

        let collaborator = self
            .collaborator
            .clone()
            .filter(|_| integration.is_configured());
        let run = Run {
            store: self.store.clone(),
            registry: Arc::clone(&self.registry),
            run_id: self.registry.next_id.fetch_add(1, Ordering::Relaxed),
            item_id: item_id.to_string(),
            skill,
            task,
            integration,
            collaborator,
            offsets: self.offsets,
        };
        tracing::info!(item = %run.item_id, skill = %run.skill, "agent run started");

        let run_id = run.run_id;
        let item_key = run.item_id.clone();
        let task = tokio::spawn(async move {
            let outcome = run.drive().await;
            run.registry.release(&run.item_id, run.run_id);
            tracing::info!(item = %run.item_id, ?outcome, "agent run finished");
            outcome
        });
        runs.insert(
            item_key.clone(),
            ActiveRun {
                run_id,
                abort: task.abort_handle(),
            },
        );

        Ok(RunHandle {
            item_id: item_key,
            task,
        })
    }

    /// Abort the run for `item_id`. Returns `false` if none was active.
    pub fn cancel(&self, item_id: &str) -> Result<bool> {
        let Some(active) = self.registry.take(item_id) else {
            return Ok(false);
        };
        active.abort.abort();

        let result = self.store.mutate(|ws| {
            let agent = &mut ws.item_mut(item_id)?.agent;
            agent.status = RunStatus::Idle;
            agent.push_log("Run aborted");
            Ok(())
        });
        match result {
            Ok(()) | Err(Error::NotFound { .. }) => {
                tracing::info!(item = item_id, "agent run aborted");
                Ok(true)
            }
            Err(err) => Err(err),
        }
    }
}

struct Run {
    store: SharedStore,
    registry: Arc<Registry>,
    run_id: u64,
    item_id: String,
    skill: String,
    task: WorkItem,
    integration: IntegrationConfig,
    collaborator: Option<Arc<dyn SkillCollaborator>>,
    offsets: [Duration; 3],
}

impl Run {
    async fn drive(&self) -> RunOutcome {
        let started = Instant::now();

        if let Some(collaborator) = &self.collaborator {
            match collaborator
                .run_skill(&self.integration, &self.skill, &self.task)
                .await
            {
                Ok(reply) => return self.finish_with_reply(reply),
                Err(err) => {
                    tracing::warn!(item = %self.item_id, error = %err, "skill endpoint failed, simulating");
                    let note = format!("Skill endpoint failed: {err}. Running local simulation.");
                    if let Err(outcome) = self.step(|agent| agent.push_log(note)) {
                        return outcome;
                    }
                }
            }
        }

        let [first, second, third] = self.offsets;

        tokio::time::sleep_until(started + first).await;
        let line = format!(
            "Reviewing '{}' ({}, {} priority)",
            self.task.title, self.task.status, self.task.priority
        );
        if let Err(outcome) = self.step(|agent| agent.push_log(line)) {
            return outcome;
        }

        tokio::time::sleep_until(started + second).await;
        let line = format!("Applying the {} playbook", self.skill);
        if let Err(outcome) = self.step(|agent| agent.push_log(line)) {
            return outcome;
        }

        tokio::time::sleep_until(started + third).await;
        if !self.registry.release(&self.item_id, self.run_id) {
            return RunOutcome::Aborted;
        }
        let output = simulated_output(&self.skill, &self.task);
        match self.step(|agent| {
            agent.output = output;
            agent.push_log("Run completed");
            agent.status = RunStatus::Idle;
            agent.last_run_at = Some(Utc::now());
        }) {
            Ok(()) => RunOutcome::Completed,
            Err(outcome) => outcome,
        }
    }

    fn finish_with_reply(&self, reply: SkillReply) -> RunOutcome {
        if !self.registry.release(&self.item_id, self.run_id) {
            return RunOutcome::Aborted;
        }
        match self.step(|agent| {
            for line in reply.logs {
                agent.push_log(line);
            }
            agent.output = reply.output;
            agent.push_log("Run completed via skill endpoint");
            agent.status = RunStatus::Idle;
            agent.last_run_at = Some(Utc::now());
        }) {
            Ok(()) => RunOutcome::Completed,
            Err(outcome) => outcome,
        }
    }

    /// Apply one change to the item's run state. A deleted item or a failed
    /// write ends the run.
    fn step<F>(&self, f: F) -> std::result::Result<(), RunOutcome>
    where
        F: FnOnce(&mut AgentRun),
    {
        let result = self.store.mutate(|ws| {
            f(&mut ws.item_mut(&self.item_id)?.agent);
            Ok(())
        });
        match result {
            Ok(()) => Ok(()),
            Err(Error::NotFound { .. }) => {
                tracing::debug!(item = %self.item_id, "run target vanished");
                Err(RunOutcome::Vanished)
            }
            Err(err) => {
                tracing::warn!(item = %self.item_id, error = %err, "agent step could not be saved");
                Err(RunOutcome::Failed {
                    reason: err.to_string(),
                })
            }
        }
    }
}

fn simulated_output(skill: &str, task: &WorkItem) -> String {
    let owner = task.assignee.as_deref().unwrap_or("unassigned");
    let due = task
        .due_date
        .map(|date| date.to_string())
        .unwrap_or_else(|| "the next milestone".to_string());
    format!(
        "{skill} brief for \"{title}\"\n\
         1. Confirm scope and owner ({owner}).\n\
         2. Split the work into steps that land before {due}.\n\
         3. Raise blockers at the next review.",
        title = task.title,
    )
}
