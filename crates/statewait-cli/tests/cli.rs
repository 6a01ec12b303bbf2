//! End-to-end tests for the `statewait` binary
//!
//! Probes are small `sh` scripts that keep a call counter in a temp dir, so
//! each test can script a resource moving through its states.

use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use tempfile::TempDir;

/// Script printing `PENDING` for the first `pending_polls` calls, then `final_state`.
fn counting_probe(dir: &Path, pending_polls: u32, final_state: &str) -> String {
    let counter = dir.join("calls");
    format!(
        "n=$(cat {c} 2>/dev/null || echo 0); echo $((n+1)) > {c}; \
         if [ $n -ge {pending_polls} ]; then printf '{final_state}\\nid=42\\n'; else echo PENDING; fi",
        c = counter.display()
    )
}

fn statewait(args: &[&str], probe: &str) -> Output {
    Command::new(env!("CARGO_BIN_EXE_statewait"))
        .args(args)
        .args(["--min-interval-ms", "10", "--max-interval-ms", "10"])
        .args(["--", "sh", "-c", probe])
        .env_remove("STATEWAIT_CONFIG")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run statewait")
}

fn calls(dir: &Path) -> u32 {
    std::fs::read_to_string(dir.join("calls"))
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}

#[test]
fn test_success_prints_payload() {
    let dir = TempDir::new().unwrap();
    let probe = counting_probe(dir.path(), 2, "READY");

    let output = statewait(&["--pending", "PENDING", "--target", "READY"], &probe);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "READY\nid=42\n");
    assert_eq!(calls(dir.path()), 3);
}

#[test]
fn test_unexpected_state_exit_code() {
    let dir = TempDir::new().unwrap();
    let probe = counting_probe(dir.path(), 1, "FAILED");

    let output = statewait(&["--pending", "PENDING", "--target", "READY"], &probe);

    assert_eq!(output.status.code(), Some(3));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("FAILED"));
}

#[test]
fn test_timeout_exit_code() {
    let output = statewait(
        &["--pending", "PENDING", "--target", "READY", "--timeout-secs", "1"],
        "echo PENDING",
    );
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_maximum_timeout_is_accepted() {
    let output = statewait(
        &[
            "--pending",
            "PENDING",
            "--target",
            "READY",
            "--timeout-secs",
            "18446744073709551615",
        ],
        "echo READY",
    );
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "READY\n");
}

#[test]
fn test_interrupt_cancels_wait() {
    let child = Command::new(env!("CARGO_BIN_EXE_statewait"))
        .args(["--pending", "PENDING", "--target", "READY"])
        .args(["--min-interval-ms", "50", "--max-interval-ms", "50"])
        .args(["--", "sh", "-c", "echo PENDING"])
        .env_remove("STATEWAIT_CONFIG")
        .env("RUST_LOG", "warn")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run statewait");

    // Give the binary time to install its Ctrl-C handler and start polling
    std::thread::sleep(Duration::from_secs(1));
    let status = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .expect("failed to run kill");
    assert!(status.success());

    let output = child.wait_with_output().unwrap();
    assert_eq!(output.status.code(), Some(130));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("cancelled"));
}

#[test]
fn test_refresh_error_exit_code() {
    let output = statewait(
        &["--pending", "PENDING", "--target", "READY"],
        "echo denied >&2; exit 7",
    );
    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("denied"));
}

#[test]
fn test_absent_exit_code_exhausts_not_found_checks() {
    let output = statewait(
        &[
            "--pending",
            "PENDING",
            "--target",
            "READY",
            "--absent-exit-code",
            "3",
            "--not-found-checks",
            "2",
        ],
        "exit 3",
    );
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn test_absent_state_reaches_deletion_target() {
    let output = statewait(
        &[
            "--pending",
            "DELETING",
            "--target",
            "GONE",
            "--absent-exit-code",
            "3",
            "--absent-state",
            "GONE",
        ],
        "exit 3",
    );
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_missing_target_is_config_error() {
    let output = statewait(&["--pending", "PENDING"], "echo READY");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid configuration"));
}

#[test]
fn test_dry_run_merges_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("wait.json");
    std::fs::write(
        &config,
        r#"{"name": "standards", "pending": ["INCOMPLETE"], "target": ["READY"], "timeout_secs": 30}"#,
    )
    .unwrap();

    let output = statewait(
        &[
            "--config",
            config.to_str().unwrap(),
            "--timeout-secs",
            "90",
            "--dry-run",
        ],
        "echo READY",
    );

    assert_eq!(output.status.code(), Some(0));
    let merged: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(merged["name"], "standards");
    assert_eq!(merged["target"][0], "READY");
    assert_eq!(merged["timeout_secs"], 90);
    assert_eq!(merged["min_interval_ms"], 10);
    assert_eq!(merged["command"][0], "sh");
}
