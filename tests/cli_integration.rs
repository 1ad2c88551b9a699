//! Integration tests for the `daymx` CLI.
//!
//! Each test creates a temp data directory, runs `daymx -C <dir>` as a
//! subprocess, and verifies stdout and/or file contents.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Get the path to the built `daymx` binary.
fn daymx_bin() -> PathBuf {
    // cargo test builds to target/debug/
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("daymx");
    path
}

/// Run `daymx` against the given data directory, returning (stdout, stderr, success).
fn run_daymx(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(daymx_bin())
        .arg("-C")
        .arg(dir)
        .args(args)
        .env_remove("DAYMX_DIR")
        .output()
        .expect("failed to run daymx");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Run `daymx` expecting success, return stdout.
fn run_daymx_ok(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_daymx(dir, args);
    if !success {
        panic!("daymx {:?} failed:\nstdout: {}\nstderr: {}", args, stdout, stderr);
    }
    stdout
}

/// A data directory seeded with the example threads.
fn seeded() -> (tempfile::TempDir, PathBuf) {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = tmp.path().join("daymx");
    run_daymx_ok(&dir, &["init"]);
    (tmp, dir)
}

fn lines(out: &str) -> Vec<&str> {
    out.lines().collect()
}

// ---------------------------------------------------------------------------
// Init and threads
// ---------------------------------------------------------------------------

#[test]
fn test_init_seeds_example_threads() {
    let (_tmp, dir) = seeded();
    assert!(dir.join("data.json").is_file());
    assert!(dir.join("daymx.toml").is_file());

    let out = run_daymx_ok(&dir, &["threads"]);
    let l = lines(&out);
    assert!(l[0].starts_with("N-001 Fitness #"));
    assert_eq!(l[1], "  N-002 Strength");
    assert!(l[3].starts_with("N-004 Reading #"));
    assert_eq!(l[6], "  N-007 Exam Study  1q, 1/1 tasks open");
    assert_eq!(l.len(), 8);
}

#[test]
fn test_init_twice_fails() {
    let (_tmp, dir) = seeded();
    let (_stdout, stderr, success) = run_daymx(&dir, &["init"]);
    assert!(!success);
    assert!(stderr.contains("already initialized"));
}

#[test]
fn test_commands_require_init() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (_stdout, stderr, success) = run_daymx(tmp.path(), &["threads"]);
    assert!(!success);
    assert!(stderr.contains("daymx init"));
}

#[test]
fn test_thread_add_rename_move() {
    let tmp = tempfile::TempDir::new().unwrap();
    run_daymx_ok(tmp.path(), &["init", "--empty"]);
    assert!(run_daymx_ok(tmp.path(), &["threads"]).contains("No threads"));

    assert_eq!(run_daymx_ok(tmp.path(), &["thread", "add", "Fitness"]).trim(), "N-001");
    assert_eq!(run_daymx_ok(tmp.path(), &["thread", "add", "Swim", "--parent", "N-001"]).trim(), "N-002");
    run_daymx_ok(tmp.path(), &["thread", "rename", "N-002", "Swimming"]);
    run_daymx_ok(tmp.path(), &["thread", "mv", "N-002"]);

    let out = run_daymx_ok(tmp.path(), &["threads"]);
    let l = lines(&out);
    assert!(l[0].starts_with("N-001 Fitness"));
    assert!(l[1].starts_with("N-002 Swimming #"));
}

#[test]
fn test_thread_add_blank_name_fails() {
    let (_tmp, dir) = seeded();
    let (_stdout, stderr, success) = run_daymx(&dir, &["thread", "add", "   "]);
    assert!(!success);
    assert!(stderr.contains("must not be empty"));
}

#[test]
fn test_thread_rm_cascades_and_records() {
    let (_tmp, dir) = seeded();
    let out = run_daymx_ok(&dir, &["thread", "rm", "N-001"]);
    assert_eq!(out.trim(), "Removed N-001 (3 nodes)");

    let tree = run_daymx_ok(&dir, &["threads"]);
    assert!(!tree.contains("Strength"));
    assert!(!tree.contains("Cardio"));

    let log = run_daymx_ok(&dir, &["recovery"]);
    assert!(log.contains("[delete] threads node N-001 removed"));
    assert!(log.contains("\"Strength\""));

    let json: serde_json::Value = serde_json::from_str(&run_daymx_ok(&dir, &["recovery", "--json"])).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["category"], "delete");
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[test]
fn test_task_add_sorted_by_priority() {
    let (_tmp, dir) = seeded();
    let id = run_daymx_ok(&dir, &["task", "add", "N-002", "Squats", "--priority", "1"]);
    assert_eq!(id.trim(), "T-002");

    let out = run_daymx_ok(&dir, &["tasks"]);
    let l = lines(&out);
    assert_eq!(l[0], "[ ] T-002 p1 Squats");
    assert_eq!(l[1], "      Fitness › Strength");
    assert_eq!(l[2], "[ ] T-001 p3 Read chapter on cardiology");
    assert_eq!(l[3], "      Academic › Exam Study");
}

#[test]
fn test_tasks_availability_gates() {
    let (_tmp, dir) = seeded();
    run_daymx_ok(&dir, &["task", "add", "N-003", "Swim", "--priority", "1", "--context", "pool"]);
    run_daymx_ok(&dir, &["task", "add", "N-003", "Call coach", "--priority", "1", "--waiting-on", "Coach"]);

    let out = run_daymx_ok(&dir, &["tasks"]);
    let l = lines(&out);
    // Available first, regardless of priority
    assert!(l[0].starts_with("[ ] T-001"));
    assert_eq!(l[2], "[ ] T-002 p1 Swim @pool  (Needs context: pool)");
    assert_eq!(l[4], "[ ] T-003 p1 Call coach  (Blocked by Coach)");

    let out = run_daymx_ok(&dir, &["tasks", "--active-context", "pool"]);
    assert_eq!(lines(&out)[0], "[ ] T-002 p1 Swim @pool");

    let out = run_daymx_ok(&dir, &["tasks", "--context", "gym"]);
    assert!(!out.contains("Swim"));
    assert!(out.contains("T-001"));
}

#[test]
fn test_task_available_at_in_future() {
    let (_tmp, dir) = seeded();
    run_daymx_ok(&dir, &["task", "add", "N-004", "Later", "--priority", "1", "--available-at", "2999-01-01T00:00:00Z"]);
    let out = run_daymx_ok(&dir, &["tasks"]);
    let later = out.lines().find(|l| l.contains("Later")).unwrap();
    assert!(later.contains("(Available at 2999-01-01") || later.contains("(Available at 2998-12-31"));

    run_daymx_ok(&dir, &["task", "edit", "T-002", "--clear-available-at"]);
    let out = run_daymx_ok(&dir, &["tasks"]);
    assert_eq!(lines(&out)[0], "[ ] T-002 p1 Later");
}

#[test]
fn test_task_done_and_show_completed() {
    let (_tmp, dir) = seeded();
    run_daymx_ok(&dir, &["task", "done", "T-001"]);
    assert_eq!(run_daymx_ok(&dir, &["tasks"]).trim(), "No tasks.");

    let out = run_daymx_ok(&dir, &["tasks", "--all"]);
    assert!(out.contains("[x] T-001"));

    run_daymx_ok(&dir, &["task", "undo", "T-001"]);
    assert!(run_daymx_ok(&dir, &["tasks"]).contains("[ ] T-001"));
}

#[test]
fn test_disabled_thread_hides_tasks() {
    let (_tmp, dir) = seeded();
    run_daymx_ok(&dir, &["thread", "disable", "N-005"]);
    assert_eq!(run_daymx_ok(&dir, &["tasks"]).trim(), "No tasks.");

    let tree = run_daymx_ok(&dir, &["threads"]);
    assert!(tree.contains("N-005 Academic #"));
    assert!(tree.contains("(disabled)"));
    assert!(tree.contains("  N-007 Exam Study  1q, 1/1 tasks open  (hidden)"));

    run_daymx_ok(&dir, &["thread", "enable", "N-005"]);
    assert!(run_daymx_ok(&dir, &["tasks"]).contains("T-001"));
}

#[test]
fn test_task_rm_and_not_found() {
    let (_tmp, dir) = seeded();
    run_daymx_ok(&dir, &["task", "rm", "T-001"]);
    assert_eq!(run_daymx_ok(&dir, &["tasks"]).trim(), "No tasks.");

    let (_stdout, stderr, success) = run_daymx(&dir, &["task", "done", "T-001"]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_questions() {
    let (_tmp, dir) = seeded();
    let id = run_daymx_ok(&dir, &["question", "add", "N-002", "Which program?"]);
    assert_eq!(id.trim(), "Q-002");
    run_daymx_ok(&dir, &["question", "edit", "N-002", "Q-002", "Which programme?"]);

    let json: serde_json::Value = serde_json::from_str(&run_daymx_ok(&dir, &["threads", "--json"])).unwrap();
    let strength = &json[0]["children"][0];
    assert_eq!(strength["questions"][0]["text"], "Which programme?");

    run_daymx_ok(&dir, &["question", "rm", "N-002", "Q-002"]);
    assert!(run_daymx_ok(&dir, &["threads"]).contains("  N-002 Strength\n"));
}

#[test]
fn test_tasks_json() {
    let (_tmp, dir) = seeded();
    let out = run_daymx_ok(&dir, &["tasks", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    let arr = parsed.as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["id"], "T-001");
    assert_eq!(arr[0]["available"], true);
    assert_eq!(arr[0]["node_id"], "N-007");
    assert_eq!(arr[0]["path"], "Academic › Exam Study");
    assert!(arr[0]["color"].as_str().unwrap().starts_with('#'));
}

#[test]
fn test_mutation_json_prints_id() {
    let (_tmp, dir) = seeded();
    let out = run_daymx_ok(&dir, &["thread", "add", "Music", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["id"], "N-009");
}

// ---------------------------------------------------------------------------
// Pantry
// ---------------------------------------------------------------------------

#[test]
fn test_shopping_list_groups_to_buy_items() {
    let (_tmp, dir) = seeded();
    assert_eq!(run_daymx_ok(&dir, &["pantry", "add", "Dry goods"]).trim(), "C-001");
    assert_eq!(run_daymx_ok(&dir, &["pantry", "add", "Grains", "--parent", "C-001"]).trim(), "C-002");
    assert_eq!(run_daymx_ok(&dir, &["item", "add", "C-002", "Oats"]).trim(), "I-001");
    run_daymx_ok(&dir, &["item", "add", "C-002", "Rice"]);
    run_daymx_ok(&dir, &["item", "status", "I-002", "stocked"]);
    run_daymx_ok(&dir, &["item", "note", "I-001", "rolled"]);

    let out = run_daymx_ok(&dir, &["shop"]);
    assert_eq!(lines(&out), vec!["== Dry goods › Grains ==", "[ ] I-001 Oats (rolled)"]);

    run_daymx_ok(&dir, &["pantry", "disable", "C-001"]);
    assert_eq!(run_daymx_ok(&dir, &["shop"]).trim(), "Nothing to buy.");
}

#[test]
fn test_pantry_tree_and_item_rm() {
    let (_tmp, dir) = seeded();
    run_daymx_ok(&dir, &["pantry", "add", "Fridge"]);
    run_daymx_ok(&dir, &["item", "add", "C-001", "Milk"]);
    let out = run_daymx_ok(&dir, &["pantry"]);
    assert!(out.starts_with("C-001 Fridge #"));
    assert!(out.contains("1 items, 1 to buy"));

    run_daymx_ok(&dir, &["item", "rm", "I-001"]);
    assert!(!run_daymx_ok(&dir, &["pantry"]).contains("items"));
}

#[test]
fn test_bad_item_status_rejected() {
    let (_tmp, dir) = seeded();
    let (_stdout, stderr, success) = run_daymx(&dir, &["item", "status", "I-001", "lost"]);
    assert!(!success);
    assert!(stderr.contains("unknown status"));
}

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

#[test]
fn test_review_walk_and_resume() {
    let (_tmp, dir) = seeded();
    let out = run_daymx_ok(&dir, &["review", "start"]);
    assert_eq!(lines(&out), vec!["[■□□□□□□□] 1/8", "Fitness", "(no questions or tasks)"]);

    let out = run_daymx_ok(&dir, &["review", "next"]);
    assert_eq!(lines(&out)[..2], ["[■■□□□□□□] 2/8", "Fitness › Strength"]);

    // A fresh process picks the review up where it stopped
    let out = run_daymx_ok(&dir, &["review"]);
    assert_eq!(lines(&out)[..2], ["[■■□□□□□□] 2/8", "Fitness › Strength"]);

    let out = run_daymx_ok(&dir, &["review", "prev"]);
    assert_eq!(lines(&out)[1], "Fitness");
}

#[test]
fn test_review_resume_after_tree_change() {
    let (_tmp, dir) = seeded();
    run_daymx_ok(&dir, &["review", "start"]);
    run_daymx_ok(&dir, &["review", "next"]);
    // The saved node (Strength) drops out; the saved index is kept
    run_daymx_ok(&dir, &["thread", "disable", "N-001"]);

    let out = run_daymx_ok(&dir, &["review"]);
    assert_eq!(lines(&out)[..2], ["[■■□□□] 2/5", "Academic"]);
}

#[test]
fn test_read_commands_keep_review_state() {
    let (_tmp, dir) = seeded();
    run_daymx_ok(&dir, &["review", "start"]);
    run_daymx_ok(&dir, &["review", "next"]);
    run_daymx_ok(&dir, &["thread", "disable", "N-001"]);
    let before = fs::read(dir.join(".review.json")).unwrap();

    run_daymx_ok(&dir, &["threads"]);
    run_daymx_ok(&dir, &["tasks"]);
    run_daymx_ok(&dir, &["pantry"]);
    run_daymx_ok(&dir, &["shop"]);
    assert_eq!(fs::read(dir.join(".review.json")).unwrap(), before);

    // The next locked command still resumes at the saved index
    let out = run_daymx_ok(&dir, &["review"]);
    assert_eq!(lines(&out)[..2], ["[■■□□□] 2/5", "Academic"]);
}

#[test]
fn test_review_complete_and_stop() {
    let (_tmp, dir) = seeded();
    run_daymx_ok(&dir, &["review", "start"]);
    for _ in 0..7 {
        run_daymx_ok(&dir, &["review", "next"]);
    }
    let out = run_daymx_ok(&dir, &["review"]);
    assert_eq!(lines(&out)[..2], ["[■■■■■■■■] 8/8", "Academic › Clinical Audit"]);

    assert_eq!(run_daymx_ok(&dir, &["review", "next"]).trim(), "Review complete.");
    assert!(run_daymx_ok(&dir, &["review"]).starts_with("No review in progress"));

    run_daymx_ok(&dir, &["review", "start"]);
    assert_eq!(run_daymx_ok(&dir, &["review", "stop"]).trim(), "Review stopped.");
    assert!(run_daymx_ok(&dir, &["review"]).starts_with("No review in progress"));
}

#[test]
fn test_pantry_review_empty() {
    let (_tmp, dir) = seeded();
    let out = run_daymx_ok(&dir, &["review", "--pantry", "start"]);
    assert_eq!(out.trim(), "Nothing to review: no enabled nodes.");

    let json: serde_json::Value = serde_json::from_str(&run_daymx_ok(&dir, &["review", "--json"])).unwrap();
    assert_eq!(json["forest"], "threads");
    assert_eq!(json["phase"], "idle");
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[test]
fn test_corrupt_document_loads_empty_and_is_logged() {
    let (_tmp, dir) = seeded();
    fs::write(dir.join("data.json"), "{ not json").unwrap();

    assert!(run_daymx_ok(&dir, &["threads"]).contains("No threads"));
    // Reading does not overwrite the broken file
    assert_eq!(fs::read_to_string(dir.join("data.json")).unwrap(), "{ not json");

    let log = run_daymx_ok(&dir, &["recovery"]);
    assert!(log.contains("[parser]"));
    assert!(log.contains("{ not json"));
}

#[test]
fn test_legacy_document_is_normalized() {
    let tmp = tempfile::TempDir::new().unwrap();
    run_daymx_ok(tmp.path(), &["init", "--empty"]);
    fs::write(
        tmp.path().join("data.json"),
        r#"{
  "threads": [
    {
      "id": "",
      "name": "Old",
      "enabled": null,
      "children": null,
      "tasks": [
        { "text": "Ancient", "priority": 9, "contexts": "home, ,home" }
      ]
    }
  ]
}"#,
    )
    .unwrap();

    let out = run_daymx_ok(tmp.path(), &["tasks", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    let task = &parsed[0];
    assert_eq!(task["text"], "Ancient");
    assert_eq!(task["priority"], 5);
    assert_eq!(task["contexts"], serde_json::json!(["home"]));
    assert!(task["id"].as_str().unwrap().starts_with("T-"));
    assert!(task["node_id"].as_str().unwrap().starts_with("N-"));
}
