//! Smoke tests for the `toyvite` binary.

use std::path::Path;
use std::process::{Command, Output};

fn toyvite(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_toyvite"))
        .arg("--cwd")
        .arg(cwd)
        .args(args)
        .output()
        .expect("failed to run toyvite")
}

#[test]
fn test_version_prints_name() {
    let dir = tempfile::tempdir().unwrap();
    let output = toyvite(dir.path(), &["version"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("toyvite "), "unexpected stdout: {stdout}");
}

#[test]
fn test_dev_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("package.json"), "{}").unwrap();
    std::fs::write(dir.path().join("toyvite.config.json"), "{ \"bundle\": true }").unwrap();

    let output = toyvite(dir.path(), &["dev", "--port", "0"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("toyvite.config.json"), "unexpected stderr: {stderr}");
}

#[test]
fn test_dev_rejects_missing_explicit_config() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("package.json"), "{}").unwrap();

    let output = toyvite(dir.path(), &["dev", "--config", "custom.json"]);
    assert!(!output.status.success());
}
