// crates/xqts-runner/src/runner.rs
// ============================================================================
// Module: Case Runner
// Description: Runs one test case end to end and reports its status.
// Purpose: Tie request, execution, outcome and evaluation together once.
// Dependencies: serde, xqts-assert, crate::{interfaces, request}
// ============================================================================

//! ## Overview
//! A case is validated, its fixture is loaded, the query runs once in a
//! scoped session and the expectation is evaluated once. Derived queries run
//! through the same engine with the result bound as context and as
//! `$result`; expected values of deep-equality checks run with no context.
//! Faults from any step become [`CaseStatus::HarnessFault`]; they are never
//! folded into a pass or a fail.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Instant;

use xqts_assert::DerivedQueryEval;
use xqts_assert::Diagnostic;
use xqts_assert::EvalOptions;
use xqts_assert::Evaluator;
use xqts_assert::Expectation;
use xqts_assert::ExpectationValidator;
use xqts_assert::HarnessFault;
use xqts_assert::Outcome;
use xqts_assert::ResultItem;
use xqts_assert::ValidationConfig;
use xqts_assert::Verdict;

use crate::interfaces::FixtureLoader;
use crate::interfaces::QueryEngine;
use crate::interfaces::execute_scoped;
use crate::request::QueryOptions;
use crate::request::QueryRequest;

// ============================================================================
// SECTION: Cases and Reports
// ============================================================================

/// Name of the external variable bound to the result in derived queries.
pub const RESULT_VARIABLE: &str = "result";

/// One test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Unique case name.
    pub name: String,
    /// Query text.
    pub query: String,
    /// Fixture path used as context document.
    pub context: Option<String>,
    /// Resolved engine options.
    pub options: QueryOptions,
    /// Pass condition.
    pub expectation: Expectation,
}

impl TestCase {
    /// Creates a case with no fixture and default options.
    pub fn new(name: impl Into<String>, query: impl Into<String>, expectation: Expectation) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            context: None,
            options: QueryOptions::default(),
            expectation,
        }
    }

    /// Sets the fixture path.
    #[must_use]
    pub fn with_context(mut self, path: impl Into<String>) -> Self {
        self.context = Some(path.into());
        self
    }

    /// Sets the engine options.
    #[must_use]
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

/// Reported status of a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseStatus {
    /// The expectation held.
    Pass,
    /// The expectation was rejected.
    Fail {
        /// Rejected assertions.
        diagnostics: Vec<Diagnostic>,
    },
    /// Execution or fixture loading faulted.
    HarnessFault {
        /// Fault cause.
        cause: HarnessFault,
    },
}

impl CaseStatus {
    /// Returns a stable status label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail {
                ..
            } => "FAIL",
            Self::HarnessFault {
                ..
            } => "HARNESS_FAULT",
        }
    }

    /// Returns true for a pass.
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl From<Verdict> for CaseStatus {
    fn from(verdict: Verdict) -> Self {
        if verdict.passed {
            Self::Pass
        } else {
            Self::Fail {
                diagnostics: verdict.diagnostics,
            }
        }
    }
}

/// Result of running one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseReport {
    /// Case name.
    pub name: String,
    /// Reported status.
    pub status: CaseStatus,
    /// Projection of the main outcome when execution completed.
    pub outcome: Option<String>,
    /// Wall-clock time spent on the case.
    pub elapsed_ms: u128,
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Runs cases against an engine.
pub struct CaseRunner<'a, E: QueryEngine + ?Sized> {
    /// Engine under test.
    engine: &'a E,
    /// Fixture loader for context documents.
    fixtures: &'a dyn FixtureLoader,
    /// Evaluation switches.
    options: EvalOptions,
    /// Structural checks applied before execution.
    validator: ExpectationValidator,
}

impl<'a, E: QueryEngine + ?Sized> CaseRunner<'a, E> {
    /// Creates a runner with default evaluation options.
    pub fn new(engine: &'a E, fixtures: &'a dyn FixtureLoader) -> Self {
        Self {
            engine,
            fixtures,
            options: EvalOptions::default(),
            validator: ExpectationValidator::default(),
        }
    }

    /// Sets the evaluation options.
    #[must_use]
    pub const fn with_eval_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the structural limits checked before execution.
    #[must_use]
    pub const fn with_validation(mut self, config: ValidationConfig) -> Self {
        self.validator = ExpectationValidator::new(config);
        self
    }

    /// Runs one case exactly once.
    #[must_use]
    pub fn run(&self, case: &TestCase) -> CaseReport {
        let started = Instant::now();
        let mut outcome_summary = None;
        let status = match self.run_inner(case, &mut outcome_summary) {
            Ok(verdict) => CaseStatus::from(verdict),
            Err(cause) => CaseStatus::HarnessFault {
                cause,
            },
        };
        CaseReport {
            name: case.name.clone(),
            status,
            outcome: outcome_summary,
            elapsed_ms: started.elapsed().as_millis(),
        }
    }

    /// Validate, load, execute and evaluate.
    fn run_inner(
        &self,
        case: &TestCase,
        outcome_summary: &mut Option<String>,
    ) -> Result<Verdict, HarnessFault> {
        self.validator
            .validate(&case.expectation)
            .map_err(|err| HarnessFault::InvalidCase(format!("{}: {err}", case.name)))?;

        let mut request = QueryRequest::new(case.query.as_str()).with_options(case.options.clone());
        if let Some(path) = &case.context {
            request = request.with_document(self.fixtures.load_document(path)?);
        }

        let outcome = execute_scoped(self.engine, &request)?;
        *outcome_summary = Some(outcome.summary());

        let derived = EngineDerived {
            engine: self.engine,
            options: &case.options,
        };
        Evaluator::new(&derived, self.options).evaluate(&case.expectation, &outcome)
    }
}

// ============================================================================
// SECTION: Derived Queries
// ============================================================================

/// Derived-query boundary backed by the engine under test.
struct EngineDerived<'a, E: QueryEngine + ?Sized> {
    /// Engine under test.
    engine: &'a E,
    /// Options of the owning case.
    options: &'a QueryOptions,
}

impl<E: QueryEngine + ?Sized> DerivedQueryEval for EngineDerived<'_, E> {
    fn eval_derived(&self, expr: &str, result: &[ResultItem]) -> Result<Outcome, HarnessFault> {
        let request = QueryRequest::new(expr)
            .with_options(self.options.clone())
            .with_items(result.to_vec())
            .with_binding(RESULT_VARIABLE, result.to_vec());
        execute_scoped(self.engine, &request)
    }

    fn eval_expected(&self, expr: &str) -> Result<Outcome, HarnessFault> {
        let request = QueryRequest::new(expr).with_options(self.options.clone());
        execute_scoped(self.engine, &request)
    }
}
