// crates/xqts-assert/tests/support/mod.rs
// ============================================================================
// Module: Test Support
// Description: Shared result helpers and fixtures for assertion tests.
// ============================================================================
//! ## Overview
//! Shared test helpers for consistent Result-based assertions.

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
    dead_code,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use xqts_assert::DerivedQueryEval;
use xqts_assert::ErrorCode;
use xqts_assert::HarnessFault;
use xqts_assert::Outcome;
use xqts_assert::ResultItem;

// ========================================================================
// Test Result Helpers
// ========================================================================

/// Standard result type used across assertion integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

/// Lightweight error type for test assertions.
#[derive(Debug)]
struct TestError {
    /// Human-readable failure message.
    message: String,
}

impl TestError {
    /// Creates a new test error with the provided message.
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message)
    }
}

impl Error for TestError {}

/// Returns an error when a test condition fails.
///
/// # Errors
/// Returns a `TestError` when the condition is false.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition { Ok(()) } else { Err(Box::new(TestError::new(message))) }
}

// ========================================================================
// Outcome Fixtures
// ========================================================================

/// Success outcome over the given items.
pub fn success(items: Vec<ResultItem>) -> Outcome {
    Outcome::success(items)
}

/// Failure outcome with the given code.
pub fn failure(code: &str) -> TestResult<Outcome> {
    Ok(Outcome::failure(ErrorCode::new(code)?))
}

// ========================================================================
// Derived Query Stub
// ========================================================================

/// Answers derived queries from a fixed table and records every call.
#[derive(Debug, Default)]
pub struct TableDerived {
    /// Outcomes keyed by expression.
    pub answers: BTreeMap<String, Result<Outcome, HarnessFault>>,
    /// Expressions evaluated, in order.
    pub calls: RefCell<Vec<String>>,
}

impl TableDerived {
    /// Adds an answer for `expr`.
    pub fn with(mut self, expr: &str, answer: Result<Outcome, HarnessFault>) -> Self {
        self.answers.insert(expr.to_string(), answer);
        self
    }
}

impl DerivedQueryEval for TableDerived {
    fn eval_derived(&self, expr: &str, _result: &[ResultItem]) -> Result<Outcome, HarnessFault> {
        self.calls.borrow_mut().push(expr.to_string());
        self.answers
            .get(expr)
            .cloned()
            .unwrap_or_else(|| Err(HarnessFault::Engine(format!("no answer for {expr}"))))
    }
}
