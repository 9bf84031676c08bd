// crates/xqts-runner/tests/config.rs
// ============================================================================
// Module: Configuration Tests
// Description: Parsing, defaults and fail-closed validation of harness config.
// ============================================================================
//! ## Overview
//! Integration tests for `HarnessConfig` loading and validation.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions are permitted."
)]

mod support;

use std::fs;

use support::TestResult;
use support::ensure;
use xqts_runner::ConfigError;
use xqts_runner::HarnessConfig;
use xqts_runner::LanguageVersion;
use xqts_runner::ReportSinkKind;

/// Checks a condition and returns a test error instead of panicking.
macro_rules! check {
    ($cond:expr $(,)?) => {{
        ensure($cond, concat!("Assertion failed: ", stringify!($cond)))?;
    }};
    ($cond:expr, $($arg:tt)+) => {{
        ensure($cond, format!($($arg)+))?;
    }};
}

/// Checks equality and returns a test error instead of panicking.
macro_rules! check_eq {
    ($left:expr, $right:expr $(,)?) => {{
        let left_val = &$left;
        let right_val = &$right;
        ensure(
            left_val == right_val,
            format!("Expected {left_val:?} == {right_val:?}"),
        )?;
    }};
}

/// Returns true when parsing fails as invalid configuration.
fn is_invalid(content: &str) -> bool {
    matches!(HarnessConfig::from_toml(content), Err(ConfigError::Invalid(_)))
}

#[test]
fn empty_file_yields_defaults() -> TestResult {
    let config = HarnessConfig::from_toml("")?;
    check_eq!(config.run.workers, 1);
    check_eq!(config.run.max_expectation_depth, 32);
    check!(!config.run.lenient_error_codes);
    check_eq!(config.report.sink, ReportSinkKind::None);
    check_eq!(config.defaults.language_version, LanguageVersion::V3_1);
    Ok(())
}

#[test]
fn full_file_maps_onto_options() -> TestResult {
    let config = HarnessConfig::from_toml(
        r#"
[run]
workers = 8
filter = "fn-count"
lenient_error_codes = true
max_expectation_depth = 12

[fixtures]
root = "fixtures"
max_document_bytes = 4096

[defaults]
language_version = "1.0"
default_collation = "http://www.w3.org/2005/xpath-functions/collation/codepoint"

[report]
sink = "file"
path = "run.jsonl"
"#,
    )?;
    check_eq!(config.run.workers, 8);
    check!(config.run.eval_options().lenient_error_codes);
    check_eq!(config.run.validation().max_depth, 12);
    check_eq!(config.fixtures.max_document_bytes, 4096);
    let options = config.defaults.query_options();
    check_eq!(options.language_version, LanguageVersion::V1_0);
    check!(options.default_collation.is_some());
    check_eq!(config.report.sink, ReportSinkKind::File);
    Ok(())
}

#[test]
fn out_of_range_values_fail_closed() -> TestResult {
    check!(is_invalid("[run]\nworkers = 0\n"));
    check!(is_invalid("[run]\nworkers = 257\n"));
    check!(is_invalid("[run]\nmax_expectation_depth = 65\n"));
    check!(is_invalid("[run]\nfilter = \"  \"\n"));
    check!(is_invalid("[fixtures]\nmax_document_bytes = 0\n"));
    check!(is_invalid("[defaults]\nbase_uri = \"has space\"\n"));
    check!(is_invalid("[report]\nsink = \"file\"\n"));
    Ok(())
}

#[test]
fn unknown_keys_are_parse_errors() -> TestResult {
    let result = HarnessConfig::from_toml("[run]\nthreads = 4\n");
    check!(matches!(result, Err(ConfigError::Parse(_))));
    let result = HarnessConfig::from_toml("[report]\nsink = \"syslog\"\n");
    check!(matches!(result, Err(ConfigError::Parse(_))));
    Ok(())
}

#[test]
fn explicit_path_is_loaded_and_validated() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("xqts.toml");
    fs::write(&path, "[run]\nworkers = 3\n")?;
    check_eq!(HarnessConfig::load(Some(&path))?.run.workers, 3);

    fs::write(&path, "[run]\nworkers = 0\n")?;
    check!(matches!(HarnessConfig::load(Some(&path)), Err(ConfigError::Invalid(_))));

    let missing = dir.path().join("absent.toml");
    check!(matches!(HarnessConfig::load(Some(&missing)), Err(ConfigError::Io(_))));
    Ok(())
}

#[test]
fn oversized_and_non_utf8_files_are_rejected() -> TestResult {
    let dir = tempfile::tempdir()?;
    let big = dir.path().join("big.toml");
    fs::write(&big, vec![b'#'; 1024 * 1024 + 1])?;
    check!(matches!(HarnessConfig::load(Some(&big)), Err(ConfigError::Invalid(_))));

    let binary = dir.path().join("binary.toml");
    fs::write(&binary, [0xff_u8, 0xfe, 0x00])?;
    check!(matches!(HarnessConfig::load(Some(&binary)), Err(ConfigError::Invalid(_))));

    let long = dir.path().join("a".repeat(300));
    check!(matches!(HarnessConfig::load(Some(&long)), Err(ConfigError::Invalid(_))));
    Ok(())
}
