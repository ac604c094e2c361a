mod support;

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;

use support::TestDir;

fn add_item(dir: &TestDir, args: &[&str]) -> String {
    let mut full = vec!["item", "add"];
    full.extend_from_slice(args);
    let data = dir.hf_json(&full);
    data["id"].as_str().expect("item id").to_string()
}

fn error_envelope(dir: &TestDir, args: &[&str], code: i32) -> Value {
    let output = dir
        .hf()
        .args(args)
        .arg("--json")
        .assert()
        .code(code)
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("error envelope")
}

#[test]
fn hf_help_works() {
    Command::cargo_bin("hf")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Hustle Flow"));
}

#[test]
fn subcommand_help_works() {
    let subcommands = [
        "init", "item", "board", "doc", "wiki", "time", "project", "report", "skill", "agent",
        "integration", "sync", "template", "export", "ask", "watch",
    ];

    for cmd in subcommands {
        Command::cargo_bin("hf")
            .expect("binary")
            .arg(cmd)
            .arg("--help")
            .assert()
            .success();
    }
}

#[test]
fn init_is_idempotent() {
    let dir = TestDir::new();

    let first = dir.hf_json(&["init"]);
    assert_eq!(first["created"]["config"], true);
    assert_eq!(first["created"]["workspace"], true);
    assert!(dir.path().join("hustle.toml").exists());
    assert!(dir.blob_path().exists());

    let second = dir.hf_json(&["init"]);
    assert_eq!(second["created"]["config"], false);
    assert_eq!(second["created"]["workspace"], false);
}

#[test]
fn item_advances_through_the_flow() {
    let dir = TestDir::new();
    let id = add_item(&dir, &["Draft brief", "--board", "Launch", "--due", "2030-01-15"]);

    dir.hf_json(&["item", "advance", &id]);
    let data = dir.hf_json(&["item", "advance", &id[..8]]);
    assert_eq!(data["status"], "Review");

    let listed = dir.hf_json(&["item", "list", "--status", "review"]);
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["title"], "Draft brief");

    let shown = dir.hf_json(&["item", "show", &id]);
    assert_eq!(shown["board"], "Launch");
    assert_eq!(shown["dueDate"], "2030-01-15");

    let boards = dir.hf_json(&["board", "list"]);
    let names: Vec<&str> = boards["boards"]
        .as_array()
        .expect("boards")
        .iter()
        .filter_map(|board| board["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Core", "Marketing", "Launch"]);
}

#[test]
fn blank_title_is_a_user_error() {
    let dir = TestDir::new();
    let envelope = error_envelope(&dir, &["item", "add", "  "], 2);
    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["command"], "item add");
    assert_eq!(envelope["error"]["kind"], "invalid_argument");
    assert!(!dir.blob_path().exists());
}

#[test]
fn unknown_item_is_not_found() {
    let dir = TestDir::new();
    dir.hf()
        .args(["item", "advance", "does-not-exist"])
        .assert()
        .code(2)
        .stderr(contains("not found"))
        .stderr(contains("hf item list"));
}

#[test]
fn logged_time_feeds_finance_and_is_removed_with_its_item() {
    let dir = TestDir::new();
    let id = add_item(&dir, &["Build landing page", "--estimate", "10", "--rate", "136"]);

    let logged = dir.hf_json(&["time", "log", &id, "--hours", "10", "--rate", "136"]);
    assert_eq!(logged["cost"], 1360.0);

    let finance = dir.hf_json(&["report", "finance"]);
    assert_eq!(finance["total_budget"], 40000.0);
    assert_eq!(finance["total_cost"], 1360.0);
    let pct = finance["consumption_pct"].as_f64().expect("pct");
    assert!((pct - 3.4).abs() < 1e-9);

    let removed = dir.hf_json(&["item", "rm", &id]);
    assert_eq!(removed["time_entries_removed"], 1);
    let finance = dir.hf_json(&["report", "finance"]);
    assert_eq!(finance["total_cost"], 0.0);
}

#[test]
fn project_set_updates_by_name() {
    let dir = TestDir::new();
    dir.hf_json(&["project", "set", "hustle flow core", "--budget", "1000", "--health", "red"]);
    let projects = dir.hf_json(&["project", "list"]);
    let projects = projects.as_array().expect("projects");
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["budget"], 1000.0);
    assert_eq!(projects[0]["health"], "Red");
}

#[test]
fn sync_without_remote_reports_missing_configuration() {
    let dir = TestDir::new();
    let envelope = error_envelope(&dir, &["sync", "push"], 2);
    assert_eq!(envelope["command"], "sync push");
    assert_eq!(envelope["error"]["kind"], "configuration_missing");
    assert!(envelope["next_steps"][0]
        .as_str()
        .expect("hint")
        .contains("HUSTLE_REMOTE_URL"));
}

#[test]
fn ask_without_endpoint_reports_missing_configuration() {
    let dir = TestDir::new();
    let envelope = error_envelope(&dir, &["ask", "What is next?"], 2);
    assert_eq!(envelope["error"]["kind"], "configuration_missing");
}

#[test]
fn corrupt_workspace_loads_defaults_with_a_warning() {
    let dir = TestDir::new();
    fs::write(dir.blob_path(), "{\"tasks\": [").expect("write corrupt blob");

    let output = dir
        .hf()
        .args(["item", "list", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let envelope: Value = serde_json::from_slice(&output).expect("envelope");
    assert_eq!(envelope["data"]["total"], 2);
    assert!(envelope["warnings"][0]
        .as_str()
        .expect("warning")
        .contains("unreadable"));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = TestDir::new();
    dir.write_config("[agent]\nstep_offsets_ms = [300, 200, 100]\n")
        .expect("write config");
    let envelope = error_envelope(&dir, &["item", "list"], 2);
    assert_eq!(envelope["error"]["kind"], "invalid_config");
}

#[test]
fn agent_run_simulates_with_configured_offsets() {
    let dir = TestDir::new();
    dir.write_config("[agent]\nstep_offsets_ms = [10, 20, 30]\n")
        .expect("write config");
    let id = add_item(&dir, &["Competitor scan"]);

    let assigned = dir.hf_json(&["skill", "assign", &id, "Research"]);
    assert_eq!(assigned["item_id"], id.as_str());

    let run = dir.hf_json(&["agent", "run", &id]);
    assert_eq!(run["outcome"], "completed");
    assert_eq!(run["agent"]["status"], "idle");
    let log = run["agent"]["log"].as_array().expect("log");
    assert_eq!(log.len(), 4);
    assert_eq!(log[3]["text"], "Run completed");

    let shown = dir.hf_json(&["item", "show", &id]);
    assert_eq!(shown["status"], "In Progress");
}

#[test]
fn integration_show_never_prints_the_token() {
    let dir = TestDir::new();
    dir.hf_json(&["integration", "set", "https://agents.local", "--token", "ocw_secret"]);

    let shown = dir.hf_json(&["integration", "show"]);
    assert_eq!(shown["url"], "https://agents.local");
    assert_eq!(shown["token_set"], true);

    dir.hf()
        .args(["integration", "show"])
        .assert()
        .success()
        .stdout(contains("ocw_secret").not());
}

#[test]
fn export_writes_the_workspace_document() {
    let dir = TestDir::new();
    let out = dir.path().join("export").join("workspace.json");
    dir.hf_json(&["template"]);
    dir.hf_json(&["export", "--out", out.to_str().expect("utf-8 path")]);

    let exported: Value =
        serde_json::from_str(&fs::read_to_string(&out).expect("export file")).expect("json");
    assert_eq!(exported["tasks"].as_array().expect("tasks").len(), 6);
    assert!(exported["openClaw"].is_object());
}
