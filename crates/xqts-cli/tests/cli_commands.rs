// crates/xqts-cli/tests/cli_commands.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Integration tests for `xqts run` and `xqts config validate`.
// Purpose: Ensure runs report non-passing cases and exit codes fail closed.
// Dependencies: xqts binary, tempfile
// ============================================================================

//! ## Overview
//! Runs the CLI binary against temporary catalogs, recordings and configs.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Path of the compiled `xqts` binary.
fn xqts_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_xqts"))
}

/// Catalog covering a fixture case, an error case and alternatives.
const CATALOG: &str = r#"
[[case]]
name = "tree-1"
query = "fn:count(//center/child::*)"
context = "TreeTrunc.xml"
expect = { eq = "0" }

[[case]]
name = "ebv-1"
query = "current-date() or 0"
expect = { error_code = "FORG0006" }

[[case]]
name = "static-1"
query = "let $element as element(foo) := <foo/> return count($element/self::bar)"
expect = { or = [{ eq = "0" }, { error_code = "XPST0005" }] }
"#;

/// Recordings making every catalog case pass.
const RECORDINGS: &str = r#"{
    "fn:count(//center/child::*)": {"items": [{"type": "xs:integer", "value": "0"}]},
    "current-date() or 0": {"error": "err:FORG0006"},
    "let $element as element(foo) := <foo/> return count($element/self::bar)": {"error": "XPST0005"}
}"#;

/// Writes catalog, recordings, fixtures and config into `root`.
fn write_workspace(root: &Path, recordings: &str) {
    fs::create_dir_all(root.join("fixtures")).expect("create fixtures dir");
    fs::write(root.join("fixtures/TreeTrunc.xml"), "<tree><center/></tree>").expect("write fixture");
    fs::write(root.join("cases.toml"), CATALOG).expect("write catalog");
    fs::write(root.join("recorded.json"), recordings).expect("write recordings");
    fs::write(root.join("xqts.toml"), "[run]\nworkers = 2\n\n[fixtures]\nroot = \"fixtures\"\n")
        .expect("write config");
}

/// Runs `xqts run` in `root` with the workspace catalog and recordings.
fn run_in(root: &Path, extra: &[&str]) -> Output {
    Command::new(xqts_bin())
        .current_dir(root)
        .env_remove("XQTS_CONFIG")
        .args(["run", "--catalog", "cases.toml", "--recorded", "recorded.json"])
        .args(extra)
        .output()
        .expect("run xqts")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Verifies a clean run prints only the summary and succeeds.
#[test]
fn cli_run_succeeds_when_every_case_passes() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_workspace(dir.path(), RECORDINGS);

    let output = run_in(dir.path(), &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "unexpected stdout: {stdout}");
    assert_eq!(stdout.lines().count(), 1, "unexpected stdout: {stdout}");
    assert!(stdout.contains("3 cases: 3 passed, 0 failed, 0 faults"), "unexpected stdout: {stdout}");
}

/// Verifies failures and faults are listed and fail the run.
#[test]
fn cli_run_reports_failures_and_faults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let recordings = r#"{
        "fn:count(//center/child::*)": {"items": [{"type": "xs:integer", "value": "1"}]},
        "current-date() or 0": {"fault": "engine crashed"}
    }"#;
    write_workspace(dir.path(), recordings);

    let output = run_in(dir.path(), &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!output.status.success());
    assert!(stdout.contains("FAIL tree-1: eq: expected 0, got 1"), "unexpected stdout: {stdout}");
    assert!(stdout.contains("HARNESS_FAULT ebv-1: engine fault: engine crashed"), "unexpected stdout: {stdout}");
    assert!(stdout.contains("HARNESS_FAULT static-1"), "unexpected stdout: {stdout}");
    assert!(stdout.contains("3 cases: 0 passed, 1 failed, 2 faults"), "unexpected stdout: {stdout}");
}

/// Verifies the filter flag narrows the catalog.
#[test]
fn cli_run_filter_limits_cases() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_workspace(dir.path(), RECORDINGS);

    let output = run_in(dir.path(), &["--filter", "ebv", "--workers", "1"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "unexpected stdout: {stdout}");
    assert!(stdout.contains("1 cases: 1 passed"), "unexpected stdout: {stdout}");
}

/// Verifies invalid run options fail closed.
#[test]
fn cli_run_rejects_invalid_worker_count() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_workspace(dir.path(), RECORDINGS);

    let output = run_in(dir.path(), &["--workers", "0"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid run options"), "unexpected stderr: {stderr}");
}

/// Verifies config validation succeeds for a valid file.
#[test]
fn cli_config_validate_accepts_valid_config() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config_path = dir.path().join("xqts.toml");
    fs::write(&config_path, "[run]\nworkers = 4\n\n[report]\nsink = \"stderr\"\n")
        .expect("write config");

    let output = Command::new(xqts_bin())
        .args(["config", "validate", "--config", config_path.to_string_lossy().as_ref()])
        .output()
        .expect("config validate");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Config valid"), "unexpected stdout: {stdout}");
}

/// Verifies config validation fails closed on invalid values.
#[test]
fn cli_config_validate_rejects_invalid_config() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config_path = dir.path().join("xqts.toml");
    fs::write(&config_path, "[report]\nsink = \"file\"\n").expect("write config");

    let output = Command::new(xqts_bin())
        .args(["config", "validate", "--config", config_path.to_string_lossy().as_ref()])
        .output()
        .expect("config validate");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load config"), "unexpected stderr: {stderr}");
}
