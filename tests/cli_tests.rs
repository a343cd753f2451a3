//! End-to-end tests for the checkrun binary
//!
//! `sh` stands in for the evaluator: every `*_test.sh` fixture is a script that prints a result document (or
//! fails), and the config points the evaluator at it with `args = ["{file}"]`.

#![cfg(unix)]

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CONFIG: &str = r#"
[runner]
num-threads = 2

[report]
color = "never"

[evaluator]
program = "sh"
args = ["{file}"]

[discovery]
suffix = "_test.sh"
"#;

const MATH_DOCUMENT: &str = r#"{"tests": [{"path": ["math"], "location": "math_test.sh:3", "checks": [
  {"name": "one", "success": true},
  {"name": "two", "success": true},
  {"name": "three", "success": true},
  {"name": "four", "success": false, "error": "Expected: 1\nGot: 2"}
], "success": false}]}"#;

const PASSING_DOCUMENT: &str = r#"{"tests": [{"path": ["strings", "concat"], "checks": [{"name": "ok", "success": true}]}]}"#;

fn checkrun() -> Command {
    let mut cmd = Command::cargo_bin("checkrun").unwrap();
    cmd.env_remove("CHECKRUN_LIB_PATH").env_remove("RUST_LOG");
    cmd
}

/// A project root with a `.git` marker so the config search never leaves it.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join(".git")).unwrap();
    fs::write(dir.path().join(".checkrun.toml"), CONFIG).unwrap();
    dir
}

fn emitting(dir: &Path, name: &str, document: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, format!("cat <<'EOF'\n{document}\nEOF\n")).unwrap();
}

fn script(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).unwrap();
}

// ==================== HUMAN OUTPUT ====================

#[test]
fn test_all_passing() {
    let dir = project();
    emitting(dir.path(), "a_test.sh", PASSING_DOCUMENT);
    emitting(dir.path(), "nested/b_test.sh", PASSING_DOCUMENT);

    checkrun()
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ strings -> concat -> ok"))
        .stdout(predicate::str::contains("All tests passed (2 file(s))"));
}

#[test]
fn test_failing_check_reports_message() {
    let dir = project();
    emitting(dir.path(), "math_test.sh", MATH_DOCUMENT);

    checkrun()
        .current_dir(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("✗ math -> four"))
        .stdout(predicate::str::contains("    Failure:\n      Expected: 1\n      Got: 2\n      at math_test.sh:3"))
        .stdout(predicate::str::contains("FAILED (1 failed)"))
        .stdout(predicate::str::contains("1 file(s): 0 passed, 1 failed, 0 errored"));
}

#[test]
fn test_no_test_files() {
    let dir = project();
    script(dir.path(), "helper.sh", "exit 1\n");

    checkrun()
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout("no test files found\n");
}

#[test]
fn test_evaluation_error_is_reported() {
    let dir = project();
    script(
        dir.path(),
        "broken_test.sh",
        "echo 'trace: loading' >&2\necho \"error: undefined variable 'x'\" >&2\nexit 1\n",
    );
    emitting(dir.path(), "ok_test.sh", PASSING_DOCUMENT);

    checkrun()
        .current_dir(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("ERROR\n    error: undefined variable 'x'"))
        .stdout(predicate::str::contains("trace: loading").not())
        .stdout(predicate::str::contains("2 file(s): 1 passed, 0 failed, 1 errored"));
}

#[test]
fn test_timeout_is_reported() {
    let dir = project();
    script(dir.path(), "slow_test.sh", "sleep 5\n");

    checkrun()
        .current_dir(dir.path())
        .args(["--timeout", "100"])
        .timeout(std::time::Duration::from_secs(4))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("ERROR (timed-out)"))
        .stdout(predicate::str::contains("timed out after 100 ms"));
}

// ==================== JSON OUTPUT ====================

#[test]
fn test_json_lines() {
    let dir = project();
    emitting(dir.path(), "a_test.sh", PASSING_DOCUMENT);
    emitting(dir.path(), "math_test.sh", MATH_DOCUMENT);

    let output = checkrun()
        .current_dir(dir.path())
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let records: Vec<serde_json::Value> = stdout.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["outcome"], "evaluated");
    assert_eq!(records[0]["success"], true);
    assert_eq!(records[1]["success"], false);
    assert_eq!(records[1]["tests"][0]["checks"][3]["error"], "Expected: 1\nGot: 2");
}

#[test]
fn test_json_no_files_emits_nothing() {
    let dir = project();
    checkrun()
        .current_dir(dir.path())
        .args(["--format", "json"])
        .assert()
        .success()
        .stdout("");
}

// ==================== DISCOVERY ====================

#[test]
fn test_non_test_file_argument_warns() {
    let dir = project();
    script(dir.path(), "notes.txt", "hello\n");

    checkrun()
        .current_dir(dir.path())
        .arg("notes.txt")
        .assert()
        .success()
        .stderr(predicate::str::contains("warning: 'notes.txt' is not a test file, skipping"))
        .stdout("no test files found\n");
}

#[test]
fn test_duplicate_roots_run_once() {
    let dir = project();
    emitting(dir.path(), "a_test.sh", PASSING_DOCUMENT);

    checkrun()
        .current_dir(dir.path())
        .args([".", "a_test.sh", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("All tests passed (1 file(s))"));
}

// ==================== CONFIG ====================

#[test]
fn test_show_config_merges_flags() {
    let dir = project();
    checkrun()
        .current_dir(dir.path())
        .args(["--show-config", "-j", "5", "--library", "/opt/checks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("num-threads = 5"))
        .stdout(predicate::str::contains(r#"program = "sh""#))
        .stdout(predicate::str::contains(r#"library = "/opt/checks""#))
        .stdout(predicate::str::contains(r#"suffix = "_test.sh""#));
}

#[test]
fn test_suffix_flag_overrides_file() {
    let dir = project();
    emitting(dir.path(), "a_check.sh", PASSING_DOCUMENT);
    script(dir.path(), "b_test.sh", "exit 1\n");

    checkrun()
        .current_dir(dir.path())
        .args(["--suffix", "_check.sh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a_check.sh"))
        .stdout(predicate::str::contains("b_test.sh").not())
        .stdout(predicate::str::contains("All tests passed (1 file(s))"));
}

#[test]
fn test_show_config_merges_template_flags() {
    let dir = project();
    checkrun()
        .current_dir(dir.path())
        .args(["--show-config", "--attribute", "suite", "--evaluator-arg", "-e", "--evaluator-arg", "{file}"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"attribute = "suite""#))
        .stdout(predicate::str::contains(r#""-e""#))
        .stdout(predicate::str::contains(r#""{file}""#));
}

#[test]
fn test_config_search_stops_at_boundary() {
    let dir = project();
    let inner = dir.path().join("inner");
    fs::create_dir(&inner).unwrap();
    fs::write(inner.join("flake.lock"), "{}").unwrap();

    checkrun()
        .current_dir(&inner)
        .arg("--show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"program = "nix-instantiate""#))
        .stdout(predicate::str::contains("built-in defaults"));
}

#[test]
fn test_unknown_config_key_is_fatal() {
    let dir = project();
    fs::write(dir.path().join(".checkrun.toml"), "[runner]\nnum-thread = 2\n").unwrap();

    checkrun()
        .current_dir(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("num-thread"))
        .stdout("");
}

#[test]
fn test_missing_library_is_fatal() {
    let dir = project();
    fs::write(dir.path().join(".checkrun.toml"), "[runner]\nnum-threads = 1\n").unwrap();

    checkrun()
        .current_dir(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("evaluator arguments reference"));
}

#[test]
fn test_missing_evaluator_is_fatal() {
    let dir = project();
    emitting(dir.path(), "a_test.sh", PASSING_DOCUMENT);

    checkrun()
        .current_dir(dir.path())
        .args(["--evaluator", "definitely-not-a-real-evaluator-binary"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"))
        .stdout("");
}
