use std::fs;
use std::process::Command;
use tempfile::TempDir;

use serial_test::serial;

const BIN: &str = env!("CARGO_BIN_EXE_transcode-pool");

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Test that scan lists pending files and skips the rest
#[test]
#[serial]
fn test_scan_lists_pending_files() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    fs::write(temp_path.join("video1.webm"), "").unwrap();
    fs::write(temp_path.join("video1.vtt"), "").unwrap();
    fs::write(temp_path.join("video2.mkv"), "").unwrap();
    fs::write(temp_path.join("video3.webm"), "").unwrap(); // No .vtt file

    let scan_output = Command::new(BIN)
        .args(["scan", temp_path.to_str().unwrap()])
        .output()
        .expect("Failed to execute scan command");

    assert!(scan_output.status.success(), "Scan command failed");

    let text = combined_output(&scan_output);
    assert!(
        text.contains("Found 2 files to convert"),
        "Expected 2 pending files, got: {text}"
    );
    assert!(
        text.contains("SKIPPING: Missing subtitle file"),
        "Expected video3.webm to be skipped, got: {text}"
    );
}

/// Test help commands work
#[test]
#[serial]
fn test_help_commands() {
    let help_output = Command::new(BIN)
        .arg("--help")
        .output()
        .expect("Failed to execute help command");

    assert!(help_output.status.success(), "Help command failed");

    let help_stdout = String::from_utf8_lossy(&help_output.stdout);
    assert!(
        help_stdout.contains("transcode-pool"),
        "Help should contain program name"
    );
    assert!(help_stdout.contains("scan"), "Help should list scan command");
    assert!(help_stdout.contains("work"), "Help should list work command");

    let work_help = Command::new(BIN)
        .args(["work", "--help"])
        .output()
        .expect("Failed to execute work help");
    let work_stdout = String::from_utf8_lossy(&work_help.stdout);
    assert!(work_stdout.contains("--workers"));
    assert!(work_stdout.contains("--queue-capacity"));
}

/// Test that invalid paths are handled gracefully
#[test]
#[serial]
fn test_invalid_paths() {
    let scan_output = Command::new(BIN)
        .args(["scan", "/non/existent/path"])
        .output()
        .expect("Failed to execute scan command");

    assert!(
        !scan_output.status.success(),
        "Scan should fail with invalid path"
    );

    let work_output = Command::new(BIN)
        .args(["work", "/non/existent/path"])
        .output()
        .expect("Failed to execute work command");

    assert!(
        !work_output.status.success(),
        "Work should fail with invalid path"
    );
}

/// Test that zero workers is rejected before any work starts
#[test]
#[serial]
fn test_work_rejects_zero_workers() {
    let temp_dir = TempDir::new().unwrap();

    let output = Command::new(BIN)
        .args(["work", temp_dir.path().to_str().unwrap(), "--workers", "0"])
        .output()
        .expect("Failed to execute work command");

    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("max_workers must be greater than zero"),
        "Expected config error, got: {text}"
    );
}

/// Test that job failures are reported as events without failing the run
#[test]
#[serial]
fn test_work_emits_json_events_for_failed_jobs() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    // Neither file is real media, so every conversion fails.
    fs::write(temp_path.join("a.mkv"), "fake mkv content").unwrap();
    fs::write(temp_path.join("b.mkv"), "fake mkv content").unwrap();

    let output = Command::new(BIN)
        .args([
            "work",
            temp_path.to_str().unwrap(),
            "--workers",
            "2",
            "--queue-capacity",
            "0",
            "--json-events",
        ])
        .env("RESUBMIT_INTERVAL_MS", "5")
        .output()
        .expect("Failed to execute work command");

    assert!(
        output.status.success(),
        "Work should succeed even when jobs fail: {}",
        combined_output(&output)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("stdout should only carry JSON events"))
        .collect();

    let count = |kind: &str| events.iter().filter(|e| e["event"] == kind).count();
    assert_eq!(count("started"), 2);
    assert_eq!(count("failed"), 2);
    assert_eq!(count("finished"), 0);

    for event in events.iter().filter(|e| e["event"] == "failed") {
        let worker = event["worker_id"].as_u64().expect("failed events carry a worker");
        assert!((1..=2).contains(&worker));
        assert!(event["error"].as_str().is_some());
    }
}
