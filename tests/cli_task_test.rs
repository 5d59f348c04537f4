//! Integration tests for task commands via the CLI.
//!
//! Covers task CRUD, the completion toggle, priority input validation,
//! and referential consistency between goals and milestones.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn pp(dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pp"));
    cmd.env("PP_DATA_DIR", dir.path());
    cmd
}

fn init_and_login() -> TempDir {
    let temp = TempDir::new().unwrap();
    pp(&temp).args(["system", "init"]).assert().success();
    pp(&temp).args(["login", "u1"]).assert().success();
    temp
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout should be JSON")
}

/// One goal with one milestone; returns (goal_id, milestone_id).
fn seed_parents(temp: &TempDir) -> (String, String) {
    let goal = stdout_json(pp(temp).args(["goal", "add", "Run a marathon"]));
    let goal_id = goal["id"].as_str().unwrap().to_string();
    let milestone = stdout_json(pp(temp).args(["milestone", "add", &goal_id, "Base fitness"]));
    (goal_id, milestone["id"].as_str().unwrap().to_string())
}

#[test]
fn test_task_add_and_list() {
    let temp = init_and_login();
    let (goal_id, milestone_id) = seed_parents(&temp);

    let created = stdout_json(pp(&temp).args([
        "task",
        "add",
        &goal_id,
        &milestone_id,
        "Run 5k",
        "--date",
        "2026-08-26",
    ]));
    let task_id = created["id"].as_str().unwrap();
    assert!(task_id.starts_with("tk-"));

    let list = stdout_json(pp(&temp).args(["task", "list", &goal_id, &milestone_id]));
    let tasks = list["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["date"], "2026-08-26");
    assert_eq!(tasks[0]["completed"], false);
}

#[test]
fn test_task_add_rejects_unknown_milestone() {
    let temp = init_and_login();
    let goal = stdout_json(pp(&temp).args(["goal", "add", "Run a marathon"]));
    let goal_id = goal["id"].as_str().unwrap();

    pp(&temp)
        .args(["task", "add", goal_id, "ms-ffff", "Run 5k"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_task_add_rejects_milestone_of_other_goal() {
    let temp = init_and_login();
    let (_, milestone_id) = seed_parents(&temp);
    let other = stdout_json(pp(&temp).args(["goal", "add", "Learn Rust"]));
    let other_id = other["id"].as_str().unwrap();

    // The milestone lives under the first goal, not `other`.
    pp(&temp)
        .args(["task", "add", other_id, &milestone_id, "Run 5k"])
        .assert()
        .failure();
}

#[test]
fn test_task_done_toggles() {
    let temp = init_and_login();
    let (goal_id, milestone_id) = seed_parents(&temp);
    let created = stdout_json(pp(&temp).args(["task", "add", &goal_id, &milestone_id, "Run 5k"]));
    let task_id = created["id"].as_str().unwrap().to_string();

    let first = stdout_json(pp(&temp).args(["task", "done", &goal_id, &milestone_id, &task_id]));
    assert_eq!(first["completed"], true);
    let second = stdout_json(pp(&temp).args(["task", "done", &goal_id, &milestone_id, &task_id]));
    assert_eq!(second["completed"], false);
}

#[test]
fn test_task_update_priority_inputs() {
    let temp = init_and_login();
    let (goal_id, milestone_id) = seed_parents(&temp);
    let created = stdout_json(pp(&temp).args(["task", "add", &goal_id, &milestone_id, "Run 5k"]));
    let task_id = created["id"].as_str().unwrap().to_string();

    pp(&temp)
        .args([
            "task",
            "update",
            &goal_id,
            &milestone_id,
            &task_id,
            "--simplicity",
            "5",
            "--urgency",
            "5",
            "--importance",
            "3",
        ])
        .assert()
        .success();

    let list = stdout_json(pp(&temp).args(["task", "list", &goal_id, &milestone_id]));
    assert_eq!(list["tasks"][0]["simplicity"], 5);
    assert_eq!(list["tasks"][0]["importance"], 3);
}

#[test]
fn test_priority_input_out_of_range_rejected() {
    let temp = init_and_login();
    let (goal_id, milestone_id) = seed_parents(&temp);

    pp(&temp)
        .args([
            "task",
            "add",
            &goal_id,
            &milestone_id,
            "Run 5k",
            "--urgency",
            "6",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 1 and 5"));
}

#[test]
fn test_task_rm() {
    let temp = init_and_login();
    let (goal_id, milestone_id) = seed_parents(&temp);
    let created = stdout_json(pp(&temp).args(["task", "add", &goal_id, &milestone_id, "Run 5k"]));
    let task_id = created["id"].as_str().unwrap().to_string();

    pp(&temp)
        .args(["task", "rm", &goal_id, &milestone_id, &task_id])
        .assert()
        .success();
    let list = stdout_json(pp(&temp).args(["task", "list", &goal_id, &milestone_id]));
    assert!(list["tasks"].as_array().unwrap().is_empty());
}

#[test]
fn test_task_rm_unknown_fails() {
    let temp = init_and_login();
    let (goal_id, milestone_id) = seed_parents(&temp);
    pp(&temp)
        .args(["task", "rm", &goal_id, &milestone_id, "tk-ffff"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}
