//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary data
//! directory, with stdin closed so completion prompts are dismissed.

use std::process::{Command, Stdio};

use serde_json::Value;
use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(dir: &TempDir, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_goaltimer"))
        .args(args)
        .env("GOALTIMER_DATA_DIR", dir.path())
        .env_remove("GOALTIMER_LOG")
        .stdin(Stdio::null())
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);
    (stdout, stderr, code)
}

fn run_ok(dir: &TempDir, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(dir, args);
    assert_eq!(code, 0, "command {args:?} failed: {stderr}");
    stdout
}

/// Every JSON document printed on stdout, in order.
fn json_docs(stdout: &str) -> Vec<Value> {
    serde_json::Deserializer::from_str(stdout)
        .into_iter::<Value>()
        .collect::<Result<_, _>>()
        .expect("stdout is a stream of JSON documents")
}

fn add_goal(dir: &TempDir, date: &str, time: &str) -> String {
    let out = run_ok(
        dir,
        &["goal", "add", "Write chapter", "--date", date, "--time", time, "--reward", "Cake"],
    );
    let doc = &json_docs(&out)[0];
    doc["result"]["id"].as_str().unwrap().to_string()
}

#[test]
fn test_goal_lifecycle() {
    let dir = TempDir::new().unwrap();
    let id = add_goal(&dir, "2099-01-01", "09:00");

    let list = json_docs(&run_ok(&dir, &["goal", "list"]));
    assert_eq!(list[0].as_array().unwrap().len(), 1);
    assert_eq!(list[0][0]["status"], "pending");

    let edited = json_docs(&run_ok(&dir, &["goal", "edit", &id, "--time", "10:30"]));
    assert_eq!(edited[0]["result"]["time"], "10:30");
    assert_eq!(edited[0]["result"]["episode"], 1);

    let done = json_docs(&run_ok(&dir, &["goal", "status", &id, "completed"]));
    assert_eq!(done[0]["result"]["status"], "completed");

    let kept = json_docs(&run_ok(&dir, &["goal", "constraint", &id, "kept"]));
    assert_eq!(kept[0]["result"]["constraintStatus"], "kept");

    run_ok(&dir, &["goal", "delete", &id]);
    let list = json_docs(&run_ok(&dir, &["goal", "list"]));
    assert!(list[0].as_array().unwrap().is_empty());
}

#[test]
fn test_invalid_goal_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(&dir, &["goal", "add", "Nap", "--date", "2099-01-01", "--time", "25:00"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Invalid time"));
}

#[test]
fn test_add_queues_deadline_and_warning() {
    let dir = TempDir::new().unwrap();
    let id = add_goal(&dir, "2099-01-01", "09:00");
    run_ok(&dir, &["goal", "edit", &id, "--time", "11:00"]);

    let pending = json_docs(&run_ok(&dir, &["notify", "pending"]));
    let pending = pending[0].as_array().unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|n| n["goal_id"] == id.as_str()));
    let mut kinds: Vec<_> = pending.iter().map(|n| n["kind"].as_str().unwrap()).collect();
    kinds.sort();
    assert_eq!(kinds, vec!["deadline", "warning"]);
}

#[test]
fn test_catch_up_prompts_once() {
    let dir = TempDir::new().unwrap();
    let id = add_goal(&dir, "2000-01-01", "09:00");

    let first = json_docs(&run_ok(&dir, &["catch-up"]));
    assert_eq!(first[0]["result"]["prompts"], 1);
    assert_eq!(first[1]["goal_id"], id.as_str());
    assert_eq!(first[1]["trigger"], "launch");

    let second = json_docs(&run_ok(&dir, &["catch-up"]));
    assert_eq!(second[0]["result"]["prompts"], 0);

    let show = json_docs(&run_ok(&dir, &["goal", "show", &id]));
    assert_eq!(show[0]["status"], "pending");
    assert_eq!(show[0]["remainingSecs"], 0);
}

#[test]
fn test_timer_watch_once_on_expired_goal() {
    let dir = TempDir::new().unwrap();
    let id = add_goal(&dir, "2000-01-01", "09:00");

    let out = run_ok(&dir, &["timer", "watch", &id, "--once"]);
    assert!(out.contains("\"countdown_completed\""));
    assert!(out.contains("\"prompt_presented\""));
}

#[test]
fn test_config_get_set() {
    let dir = TempDir::new().unwrap();
    assert_eq!(run_ok(&dir, &["config", "get", "notifications.min_lead_secs"]).trim(), "5");
    run_ok(&dir, &["config", "set", "notifications.min_lead_secs", "30"]);
    assert_eq!(run_ok(&dir, &["config", "get", "notifications.min_lead_secs"]).trim(), "30");

    let (_, _, code) = run_cli(&dir, &["config", "set", "timer.unknown", "1"]);
    assert_ne!(code, 0);

    let shown = json_docs(&run_ok(&dir, &["config", "show"]));
    assert_eq!(shown[0]["prompt"]["reprompt_on_launch"], true);
}

#[test]
fn test_focus_and_stats() {
    let dir = TempDir::new().unwrap();
    run_ok(&dir, &["focus", "set", "Run a marathon", "--target", "2099-10-01"]);
    let shown = json_docs(&run_ok(&dir, &["focus", "show"]));
    assert_eq!(shown[0]["focus"]["title"], "Run a marathon");
    assert!(shown[0]["daysRemaining"].as_i64().unwrap() > 0);
    run_ok(&dir, &["focus", "clear"]);
    assert_eq!(run_ok(&dir, &["focus", "show"]).trim(), "null");

    add_goal(&dir, "2099-01-01", "09:00");
    let stats = json_docs(&run_ok(&dir, &["stats"]));
    assert_eq!(stats[0]["total"], 1);
    assert_eq!(stats[0]["pending"], 1);
}

#[test]
fn test_stats_over_last_days() {
    let dir = TempDir::new().unwrap();
    add_goal(&dir, "2000-01-01", "09:00");
    let empty = json_docs(&run_ok(&dir, &["stats", "--days", "7"]));
    assert_eq!(empty[0]["goals"]["counted"], 0);
    let today = empty[0]["to"].as_str().unwrap().to_string();

    let id = add_goal(&dir, &today, "23:59");
    run_ok(&dir, &["goal", "status", &id, "completed"]);
    run_ok(&dir, &["goal", "constraint", &id, "kept"]);

    let month = json_docs(&run_ok(&dir, &["stats", "--days", "30"]));
    assert_eq!(month[0]["goals"]["counted"], 1);
    assert_eq!(month[0]["goals"]["rate"], 100);
    assert_eq!(month[0]["constraints"]["rate"], 100);
    assert_eq!(month[0]["goals"]["weekday_rates"].as_array().unwrap().len(), 7);
    assert_eq!(month[0]["today"]["completed"], 1);

    let (_, _, code) = run_cli(&dir, &["stats", "--days", "0"]);
    assert_ne!(code, 0);
}
