//! Process-level smoke tests against the built `sortomatic` binary, covering
//! the CLI surface (§6): exit codes, `scan all`/`stats`/`reset` end to end.

use std::fs;
use std::process::Command;

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_sortomatic")
}

#[test]
fn scan_all_then_stats_reports_categorized_rows() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"hello").unwrap();
    fs::write(dir.path().join("b.jpg"), b"\xFF\xD8\xFFbytes").unwrap();

    let scan = Command::new(bin())
        .args(["scan", "all", dir.path().to_str().unwrap()])
        .output()
        .unwrap();
    assert!(scan.status.success(), "stderr: {}", String::from_utf8_lossy(&scan.stderr));

    let stats = Command::new(bin())
        .args(["stats", dir.path().to_str().unwrap()])
        .output()
        .unwrap();
    assert!(stats.status.success());
    let stdout = String::from_utf8_lossy(&stats.stdout);
    assert!(stdout.contains("Document"), "stats output: {stdout}");
    assert!(stdout.contains("Image"), "stats output: {stdout}");
}

#[test]
fn scan_index_without_path_fails_with_exit_code_one() {
    let output = Command::new(bin()).args(["scan", "index"]).output().unwrap();
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn unknown_command_fails_with_exit_code_one() {
    let output = Command::new(bin()).args(["bogus"]).output().unwrap();
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn stats_without_a_prior_scan_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(bin())
        .args(["stats", dir.path().to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn reset_declines_without_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"hi").unwrap();

    let scan = Command::new(bin())
        .args(["scan", "index", dir.path().to_str().unwrap()])
        .output()
        .unwrap();
    assert!(scan.status.success());

    let mut child = Command::new(bin())
        .args(["reset", dir.path().to_str().unwrap()])
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .unwrap();
    {
        use std::io::Write;
        child.stdin.take().unwrap().write_all(b"n\n").unwrap();
    }
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "declining reset should exit 0, not error");

    let db_path = dir.path().join(".sortomatic").join("sortomatic.db");
    assert!(db_path.exists(), "catalog should survive a declined reset");
}
