//! Process-level smoke tests for the gateway binary.

use assert_cmd::prelude::*;
use std::process::Command;

#[test]
fn help_prints_usage_and_exits_zero() {
    let out = Command::cargo_bin("embedded-ui-proxy")
        .expect("binary exists")
        .arg("--help")
        .output()
        .expect("run --help");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("--ui-remote-url"));
    assert!(stdout.contains("--db-path"));
}

#[test]
fn starts_and_binds_with_custom_port_and_db_path() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let db = dir.path().join("smoke.duckdb");

    let mut child = Command::cargo_bin("embedded-ui-proxy")
        .expect("binary exists")
        .args([
            "--host",
            "127.0.0.1",
            "-p",
            "19771",
            "--db-path",
            db.to_str().expect("utf8 path"),
        ])
        .spawn()
        .expect("spawn gateway");

    // Give it a moment to open the store and bind.
    std::thread::sleep(std::time::Duration::from_millis(700));
    assert!(
        child.try_wait().expect("try_wait").is_none(),
        "gateway exited early"
    );
    assert!(db.exists(), "database file was created");
    let _ = child.kill();
    let _ = child.wait();
}
