//! Integration tests for the `pp today` view.
//!
//! `today` reads through the sync engine's mirror: tasks scheduled for the
//! current day, pending only, ranked by priority tier.

use assert_cmd::Command;
use chrono::{Days, Local};
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

fn seed_parents(temp: &TempDir) -> (String, String) {
    let goal = stdout_json(pp(temp).args(["goal", "add", "Run a marathon"]));
    let goal_id = goal["id"].as_str().unwrap().to_string();
    let milestone = stdout_json(pp(temp).args(["milestone", "add", &goal_id, "Base fitness"]));
    (goal_id, milestone["id"].as_str().unwrap().to_string())
}

#[test]
fn test_today_empty() {
    let temp = init_and_login();
    let result = stdout_json(pp(&temp).args(["today"]));
    assert!(result["tasks"].as_array().unwrap().is_empty());
}

#[test]
fn test_today_filters_by_date() {
    let temp = init_and_login();
    let (goal_id, milestone_id) = seed_parents(&temp);
    let tomorrow = (Local::now().date_naive() + Days::new(1)).to_string();

    // Default date is today.
    pp(&temp)
        .args(["task", "add", &goal_id, &milestone_id, "Run 5k"])
        .assert()
        .success();
    pp(&temp)
        .args([
            "task",
            "add",
            &goal_id,
            &milestone_id,
            "Long run",
            "--date",
            &tomorrow,
        ])
        .assert()
        .success();

    let result = stdout_json(pp(&temp).args(["today"]));
    let tasks = result["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["name"], "Run 5k");
}

#[test]
fn test_today_ranks_by_priority_tier() {
    let temp = init_and_login();
    let (goal_id, milestone_id) = seed_parents(&temp);

    pp(&temp)
        .args([
            "task", "add", &goal_id, &milestone_id, "Stretch",
            "--simplicity", "2", "--urgency", "2", "--importance", "2",
        ])
        .assert()
        .success();
    pp(&temp)
        .args([
            "task", "add", &goal_id, &milestone_id, "Long run",
            "--simplicity", "5", "--urgency", "5", "--importance", "5",
        ])
        .assert()
        .success();
    pp(&temp)
        .args(["task", "add", &goal_id, &milestone_id, "Unscored"])
        .assert()
        .success();

    let result = stdout_json(pp(&temp).args(["today"]));
    let tasks = result["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks[0]["name"], "Long run");
    assert_eq!(tasks[0]["priority"], "high");
    assert_eq!(tasks[1]["name"], "Stretch");
    assert_eq!(tasks[1]["priority"], "low");
    assert_eq!(tasks[2]["name"], "Unscored");
    assert!(tasks[2]["priority"].is_null());
}

#[test]
fn test_today_excludes_completed_tasks() {
    let temp = init_and_login();
    let (goal_id, milestone_id) = seed_parents(&temp);
    let created = stdout_json(pp(&temp).args(["task", "add", &goal_id, &milestone_id, "Run 5k"]));
    let task_id = created["id"].as_str().unwrap().to_string();

    pp(&temp)
        .args(["task", "done", &goal_id, &milestone_id, &task_id])
        .assert()
        .success();

    let result = stdout_json(pp(&temp).args(["today"]));
    assert!(result["tasks"].as_array().unwrap().is_empty());
}
