mod support;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hustle::agent::{AgentRunner, RunOutcome, SkillCollaborator, SkillReply};
use hustle::config::AgentConfig;
use hustle::error::{Error, Result};
use hustle::model::{IntegrationConfig, RunStatus, WorkItem};
use hustle::store::SharedStore;
use hustle::workspace::WorkItemDraft;

use support::TestDir;

/// Item with the seeded "research" skill assigned.
fn assigned_item(store: &SharedStore, title: &str) -> String {
    store
        .mutate(|ws| {
            let id = ws.add_work_item(WorkItemDraft {
                title: title.to_string(),
                ..WorkItemDraft::default()
            })?;
            let skill = ws.resolve_skill("research")?;
            ws.assign_skill(&id, &skill)?;
            Ok(id)
        })
        .expect("assigned item")
}

fn log_lines(store: &SharedStore, id: &str) -> Vec<String> {
    store
        .read(|ws| {
            ws.find_item(id)
                .map(|item| item.agent.log.iter().map(|entry| entry.text.clone()).collect())
                .unwrap_or_default()
        })
        .expect("read log")
}

struct Unreachable;

#[async_trait]
impl SkillCollaborator for Unreachable {
    async fn run_skill(&self, _: &IntegrationConfig, _: &str, _: &WorkItem) -> Result<SkillReply> {
        Err(Error::Collaborator {
            status: 503,
            message: "down".to_string(),
        })
    }
}

struct Answering;

#[async_trait]
impl SkillCollaborator for Answering {
    async fn run_skill(
        &self,
        _: &IntegrationConfig,
        skill: &str,
        task: &WorkItem,
    ) -> Result<SkillReply> {
        Ok(SkillReply {
            output: format!("{skill} notes for {}", task.title),
            logs: vec!["Fetched sources".to_string()],
        })
    }
}

fn with_integration(store: &SharedStore) {
    store
        .mutate(|ws| {
            ws.set_integration("https://agents.local", "ocw_token");
            Ok(())
        })
        .expect("set integration");
}

#[tokio::test(start_paused = true)]
async fn simulated_run_completes_in_three_steps() {
    let dir = TestDir::new();
    let store = dir.shared_store();
    let id = assigned_item(&store, "Research competitors");
    let runner = AgentRunner::new(store.clone(), &AgentConfig::default());

    let handle = runner.start(&id).expect("start");
    assert!(runner.is_running(&id));
    let status = store
        .read(|ws| ws.find_item(&id).map(|item| item.agent.status))
        .expect("read");
    assert_eq!(status, Some(RunStatus::Running));

    assert_eq!(handle.wait().await, RunOutcome::Completed);
    assert!(!runner.is_running(&id));

    assert_eq!(
        log_lines(&store, &id),
        vec![
            "Run started with research".to_string(),
            "Reviewing 'Research competitors' (In Progress, Medium priority)".to_string(),
            "Applying the research playbook".to_string(),
            "Run completed".to_string(),
        ]
    );
    let agent = store
        .read(|ws| ws.find_item(&id).map(|item| item.agent.clone()))
        .expect("read")
        .expect("item");
    assert_eq!(agent.status, RunStatus::Idle);
    assert!(agent.output.starts_with("research brief for \"Research competitors\""));
    assert!(agent.last_run_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn items_without_a_usable_skill_do_not_start() {
    let dir = TestDir::new();
    let store = dir.shared_store();
    let runner = AgentRunner::new(store.clone(), &AgentConfig::default());

    let bare = store
        .mutate(|ws| {
            ws.add_work_item(WorkItemDraft {
                title: "No skill".to_string(),
                ..WorkItemDraft::default()
            })
        })
        .expect("add");
    assert!(matches!(runner.start(&bare), Err(Error::InvalidArgument(_))));

    let orphan = assigned_item(&store, "Orphaned");
    store
        .mutate(|ws| {
            let skill = ws.resolve_skill("research")?;
            ws.remove_skill(&skill)
        })
        .expect("remove skill");
    assert!(matches!(runner.start(&orphan), Err(Error::InvalidArgument(_))));

    assert!(matches!(runner.start("missing"), Err(Error::NotFound { .. })));
}

#[tokio::test(start_paused = true)]
async fn second_start_is_rejected_while_running() {
    let dir = TestDir::new();
    let store = dir.shared_store();
    let id = assigned_item(&store, "Busy");
    let runner = AgentRunner::new(store.clone(), &AgentConfig::default());

    let handle = runner.start(&id).expect("start");
    assert!(matches!(runner.start(&id), Err(Error::InvalidArgument(_))));
    assert_eq!(handle.wait().await, RunOutcome::Completed);

    // Free again once the first run finished.
    let again = runner.start(&id).expect("restart");
    assert_eq!(again.wait().await, RunOutcome::Completed);
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_the_run_and_logs_abort() {
    let dir = TestDir::new();
    let store = dir.shared_store();
    let id = assigned_item(&store, "Long haul");
    let runner = AgentRunner::new(store.clone(), &AgentConfig::default());

    let handle = runner.start(&id).expect("start");
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(runner.cancel(&id).expect("cancel"));
    assert_eq!(handle.wait().await, RunOutcome::Aborted);

    // Nothing is written after the abort.
    tokio::time::sleep(Duration::from_millis(5000)).await;
    let lines = log_lines(&store, &id);
    assert_eq!(lines.last().map(String::as_str), Some("Run aborted"));
    assert!(!lines.iter().any(|line| line == "Run completed"));
    let agent = store
        .read(|ws| ws.find_item(&id).map(|item| item.agent.clone()))
        .expect("read")
        .expect("item");
    assert_eq!(agent.status, RunStatus::Idle);
    assert!(agent.output.is_empty());

    assert!(!runner.cancel(&id).expect("second cancel"));
}

#[tokio::test(start_paused = true)]
async fn deleting_the_item_ends_the_run_without_resurrecting_it() {
    let dir = TestDir::new();
    let store = dir.shared_store();
    let id = assigned_item(&store, "Short lived");
    let runner = AgentRunner::new(store.clone(), &AgentConfig::default());

    let handle = runner.start(&id).expect("start");
    store
        .mutate(|ws| ws.delete_work_item(&id).map(|_| ()))
        .expect("delete");

    assert_eq!(handle.wait().await, RunOutcome::Vanished);
    assert!(!runner.is_running(&id));
    let exists = store.read(|ws| ws.find_item(&id).is_some()).expect("read");
    assert!(!exists);
}

#[tokio::test(start_paused = true)]
async fn failing_endpoint_falls_back_to_simulation() {
    let dir = TestDir::new();
    let store = dir.shared_store();
    with_integration(&store);
    let id = assigned_item(&store, "Fallback");
    let runner = AgentRunner::new(store.clone(), &AgentConfig::default())
        .with_collaborator(Arc::new(Unreachable));

    assert_eq!(runner.start(&id).expect("start").wait().await, RunOutcome::Completed);
    let lines = log_lines(&store, &id);
    assert!(lines[1].starts_with("Skill endpoint failed:"));
    assert!(lines[1].ends_with("Running local simulation."));
    assert_eq!(lines.last().map(String::as_str), Some("Run completed"));
}

#[tokio::test(start_paused = true)]
async fn endpoint_reply_is_recorded() {
    let dir = TestDir::new();
    let store = dir.shared_store();
    with_integration(&store);
    let id = assigned_item(&store, "Market scan");
    let runner = AgentRunner::new(store.clone(), &AgentConfig::default())
        .with_collaborator(Arc::new(Answering));

    assert_eq!(runner.start(&id).expect("start").wait().await, RunOutcome::Completed);
    let agent = store
        .read(|ws| ws.find_item(&id).map(|item| item.agent.clone()))
        .expect("read")
        .expect("item");
    assert_eq!(agent.output, "research notes for Market scan");
    let lines: Vec<&str> = agent.log.iter().map(|entry| entry.text.as_str()).collect();
    assert_eq!(
        lines,
        vec![
            "Run started with research",
            "Fetched sources",
            "Run completed via skill endpoint"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn collaborator_is_skipped_without_integration() {
    let dir = TestDir::new();
    let store = dir.shared_store();
    let id = assigned_item(&store, "Local only");
    let runner = AgentRunner::new(store.clone(), &AgentConfig::default())
        .with_collaborator(Arc::new(Answering));

    assert_eq!(runner.start(&id).expect("start").wait().await, RunOutcome::Completed);
    assert_eq!(
        log_lines(&store, &id).last().map(String::as_str),
        Some("Run completed")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_admit_one_run() {
    let dir = TestDir::new();
    let store = dir.shared_store();
    let id = assigned_item(&store, "Contended item");
    let runner = Arc::new(AgentRunner::new(store.clone(), &AgentConfig::default()));

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let runner = Arc::clone(&runner);
            let id = id.clone();
            tokio::task::spawn_blocking(move || runner.start(&id))
        })
        .collect();

    let mut started = Vec::new();
    let mut rejected = 0;
    for attempt in attempts {
        match attempt.await.expect("join") {
            Ok(handle) => started.push(handle),
            Err(Error::InvalidArgument(_)) => rejected += 1,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    assert_eq!(started.len(), 1);
    assert_eq!(rejected, 7);

    assert!(runner.cancel(&id).expect("cancel"));
    let handle = started.pop().expect("one run");
    assert_eq!(handle.wait().await, RunOutcome::Aborted);
    let starts = log_lines(&store, &id)
        .iter()
        .filter(|line| line.starts_with("Run started"))
        .count();
    assert_eq!(starts, 1);
}
