//! Smoke tests for the snippet-motion CLI
//!
//! Nothing here launches Chromium.

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn snippet_motion() -> Command {
    Command::cargo_bin("snippet-motion").expect("snippet-motion binary should exist")
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    snippet_motion()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    snippet_motion()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("preview"))
        .stdout(predicate::str::contains("codecs"));
}

#[test]
fn test_no_args_fails() {
    snippet_motion().assert().failure();
}

#[test]
fn test_export_help_lists_flags() {
    snippet_motion()
        .args(["export", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--duration"))
        .stdout(predicate::str::contains("--breakpoint"))
        .stdout(predicate::str::contains("--no-sandbox"));
}

// ============================================================================
// Argument validation
// ============================================================================

#[test]
fn test_export_rejects_unknown_format() {
    snippet_motion()
        .args(["export", "main.rs", "--format", "avi"])
        .assert()
        .failure();
}

#[test]
fn test_export_missing_file_fails_before_browser() {
    let temp = TempDir::new().unwrap();
    snippet_motion()
        .args(["export", "--color", "never"])
        .arg(temp.path().join("missing.rs"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_export_blank_source_rejected() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("blank.rs");
    fs::write(&input, "\n\n").unwrap();
    snippet_motion()
        .arg("export")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no code to animate"));
}

// ============================================================================
// Preview
// ============================================================================

#[test]
fn test_preview_writes_html() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("main.rs");
    let output = temp.path().join("preview.html");
    fs::write(&input, "fn main() {\n    println!(\"hi\");\n}\n").unwrap();

    snippet_motion()
        .args(["--quiet", "preview"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["--breakpoint", "1", "--title", "main.rs"])
        .assert()
        .success();

    let html = fs::read_to_string(&output).unwrap();
    assert!(html.contains("snippet-motion-preview"));
    assert!(html.contains("window.snippetMotion"));
    assert!(html.contains("main.rs"));
}

#[test]
fn test_preview_reads_stdin() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("stdin.html");

    snippet_motion()
        .args(["-q", "preview", "-", "-o"])
        .arg(&output)
        .write_stdin("let x = 1;")
        .assert()
        .success();

    assert!(fs::read_to_string(&output).unwrap().contains("let x = 1;"));
}

#[test]
fn test_preview_rejects_line_zero() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("main.rs");
    fs::write(&input, "x").unwrap();

    snippet_motion()
        .arg("preview")
        .arg(&input)
        .args(["--breakpoint", "0", "-o"])
        .arg(temp.path().join("out.html"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("start at 1"));
}

// ============================================================================
// Codecs
// ============================================================================

#[test]
fn test_codecs_lists_builtin_encoder() {
    snippet_motion()
        .args(["--color", "never", "codecs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mjpeg-mp4"))
        .stdout(predicate::str::contains("built-in"));
}

#[test]
fn test_codecs_json() {
    let output = snippet_motion()
        .args(["-q", "codecs", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 4);
}
