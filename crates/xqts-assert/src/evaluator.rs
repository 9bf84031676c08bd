// crates/xqts-assert/src/evaluator.rs
// ============================================================================
// Module: Expectation Evaluator
// Description: Decides pass or fail of an expectation against an outcome.
// Purpose: One exhaustive tree walk producing a verdict with diagnostics.
// Dependencies: crate::{expectation, item, outcome, serializer, types, validate}
// ============================================================================

//! ## Overview
//! `And` stops at the first failing child and reports that child. `Or` stops
//! at the first passing child; when every child fails it reports all of them.
//! Value-shaped leaves never hold against a failure outcome and `ErrorCode`
//! never holds against a success outcome. `SerializationError` holds for a
//! matching failure or for a result whose serialization fails. Leaf
//! mismatches become diagnostics; only a [`HarnessFault`] from a derived
//! query escapes as an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use crate::expectation::Expectation;
use crate::item::AtomicType;
use crate::item::ItemKind;
use crate::item::ResultItem;
use crate::item::effective_boolean_value;
use crate::markup::is_markup_space;
use crate::outcome::ErrorCode;
use crate::outcome::HarnessFault;
use crate::outcome::Outcome;
use crate::outcome::project_items;
use crate::serializer::SerializeOptions;
use crate::serializer::canonicalize;
use crate::serializer::serialize_items;
use crate::serializer::serialize_node;
use crate::types::describe_types;
use crate::validate::build_pattern;

// ============================================================================
// SECTION: Derived Query Boundary
// ============================================================================

/// Runs secondary queries for `DerivedQuery` leaves.
pub trait DerivedQueryEval {
    /// Evaluates `expr` with `result` bound as its context.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessFault`] when the execution boundary faults.
    fn eval_derived(&self, expr: &str, result: &[ResultItem]) -> Result<Outcome, HarnessFault>;

    /// Evaluates `expr` with no context, for expected values of `DeepEq`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessFault`] when the execution boundary faults.
    fn eval_expected(&self, expr: &str) -> Result<Outcome, HarnessFault> {
        self.eval_derived(expr, &[])
    }
}

/// Boundary for trees without derived queries; any use is a fault.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDerivedQueries;

impl DerivedQueryEval for NoDerivedQueries {
    fn eval_derived(&self, expr: &str, _result: &[ResultItem]) -> Result<Outcome, HarnessFault> {
        Err(HarnessFault::InvalidCase(format!("derived query without an engine: {expr}")))
    }
}

// ============================================================================
// SECTION: Options, Diagnostics and Verdicts
// ============================================================================

/// Evaluation switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalOptions {
    /// Accept any classified failure for every `ErrorCode` leaf.
    pub lenient_error_codes: bool,
}

/// Why one assertion was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Label of the rejected node.
    pub assertion: &'static str,
    /// Expected side.
    pub expected: String,
    /// Actual side.
    pub actual: String,
}

impl Diagnostic {
    /// Creates a diagnostic.
    pub fn new(
        assertion: &'static str,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            assertion,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: expected {}, got {}", self.assertion, self.expected, self.actual)
    }
}

/// Result of evaluating one expectation.
///
/// # Invariants
/// - A passing verdict carries no diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Whether the expectation holds.
    pub passed: bool,
    /// Rejected assertions, in evaluation order.
    pub diagnostics: Vec<Diagnostic>,
}

impl Verdict {
    /// A passing verdict.
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            passed: true,
            diagnostics: Vec::new(),
        }
    }

    /// A failing verdict with one diagnostic.
    #[must_use]
    pub fn fail(diagnostic: Diagnostic) -> Self {
        Self {
            passed: false,
            diagnostics: vec![diagnostic],
        }
    }

    /// Builds a verdict from a leaf check.
    fn check(passed: bool, diagnostic: impl FnOnce() -> Diagnostic) -> Self {
        if passed { Self::pass() } else { Self::fail(diagnostic()) }
    }
}

// ============================================================================
// SECTION: Trace Hook
// ============================================================================

/// Observer for leaf results.
pub trait EvaluationTrace {
    /// Called after every evaluated leaf.
    fn on_leaf(&mut self, leaf: &Expectation, passed: bool);
}

/// Trace that records nothing.
#[derive(Debug, Default)]
pub struct NoopTrace;

impl EvaluationTrace for NoopTrace {
    fn on_leaf(&mut self, _leaf: &Expectation, _passed: bool) {}
}

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Walks expectation trees against outcomes.
#[derive(Debug)]
pub struct Evaluator<'a, D: ?Sized> {
    /// Boundary for derived queries.
    derived: &'a D,
    /// Evaluation switches.
    options: EvalOptions,
}

impl<'a, D: DerivedQueryEval + ?Sized> Evaluator<'a, D> {
    /// Creates an evaluator.
    pub const fn new(derived: &'a D, options: EvalOptions) -> Self {
        Self {
            derived,
            options,
        }
    }

    /// Evaluates `expectation` against `outcome`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessFault`] when a derived query faults.
    pub fn evaluate(
        &self,
        expectation: &Expectation,
        outcome: &Outcome,
    ) -> Result<Verdict, HarnessFault> {
        self.evaluate_with_trace(expectation, outcome, &mut NoopTrace)
    }

    /// Evaluates `expectation` against `outcome`, reporting leaves to `trace`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessFault`] when a derived query faults.
    pub fn evaluate_with_trace<T: EvaluationTrace + ?Sized>(
        &self,
        expectation: &Expectation,
        outcome: &Outcome,
        trace: &mut T,
    ) -> Result<Verdict, HarnessFault> {
        let verdict = match expectation {
            Expectation::And(children) => return self.all_of(children, outcome, trace),
            Expectation::Or(children) => return self.any_of(children, outcome, trace),
            Expectation::Not(child) => return self.negation(child, outcome, trace),
            Expectation::ErrorCode(expected) => self.error_code_verdict(expected, outcome),
            Expectation::SerializationError(expected) => {
                self.serialization_error_verdict(expected, outcome)
            }
            Expectation::DerivedQuery(expr) => {
                try_on_items(expectation, outcome, |items| self.derived_verdict(expr, items))?
            }
            Expectation::DeepEq(expr) => {
                try_on_items(expectation, outcome, |items| self.deep_eq_verdict(expr, items))?
            }
            Expectation::Eq(expected) => {
                on_items(expectation, outcome, |items| eq_verdict(expected, items))
            }
            Expectation::StringValue {
                expected,
                normalize_whitespace,
            } => on_items(expectation, outcome, |items| {
                string_value_verdict(expected, *normalize_whitespace, items)
            }),
            Expectation::Count(expected) => on_items(expectation, outcome, |items| {
                Verdict::check(items.len() == *expected, || {
                    Diagnostic::new("count", expected.to_string(), items.len().to_string())
                })
            }),
            Expectation::Boolean(expected) => on_items(expectation, outcome, |items| {
                let holds = matches!(items, [only] if only.as_boolean() == Some(*expected));
                Verdict::check(holds, || {
                    Diagnostic::new("boolean", expected.to_string(), project_items(items))
                })
            }),
            Expectation::Empty => on_items(expectation, outcome, |items| {
                Verdict::check(items.is_empty(), || {
                    Diagnostic::new("empty", "()", project_items(items))
                })
            }),
            Expectation::Type(descriptor) => on_items(expectation, outcome, |items| {
                Verdict::check(descriptor.matches(items), || {
                    Diagnostic::new("type", descriptor.to_string(), describe_types(items))
                })
            }),
            Expectation::Serialization {
                expected,
                normalize_namespaces,
                normalize_whitespace,
            } => on_items(expectation, outcome, |items| {
                serialization_verdict(items, expected, *normalize_namespaces, *normalize_whitespace)
            }),
            Expectation::SerializationMatches {
                pattern,
                flags,
            } => on_items(expectation, outcome, |items| pattern_verdict(items, pattern, flags)),
            Expectation::Permutation(expected) => on_items(expectation, outcome, |items| {
                let actual: BTreeSet<&str> = items.iter().map(ResultItem::value).collect();
                let wanted: BTreeSet<&str> = expected.iter().map(String::as_str).collect();
                Verdict::check(actual == wanted, || {
                    Diagnostic::new("permutation", permutation_text(expected), project_items(items))
                })
            }),
        };
        trace.on_leaf(expectation, verdict.passed);
        Ok(verdict)
    }

    /// Every child holds; stops at the first rejected child.
    fn all_of<T: EvaluationTrace + ?Sized>(
        &self,
        children: &[Box<Expectation>],
        outcome: &Outcome,
        trace: &mut T,
    ) -> Result<Verdict, HarnessFault> {
        for child in children {
            let verdict = self.evaluate_with_trace(child, outcome, trace)?;
            if !verdict.passed {
                return Ok(verdict);
            }
        }
        Ok(Verdict::pass())
    }

    /// Some child holds; stops at the first passing child.
    fn any_of<T: EvaluationTrace + ?Sized>(
        &self,
        children: &[Box<Expectation>],
        outcome: &Outcome,
        trace: &mut T,
    ) -> Result<Verdict, HarnessFault> {
        let mut diagnostics = Vec::new();
        for child in children {
            let verdict = self.evaluate_with_trace(child, outcome, trace)?;
            if verdict.passed {
                return Ok(Verdict::pass());
            }
            diagnostics.extend(verdict.diagnostics);
        }
        if diagnostics.is_empty() {
            diagnostics.push(Diagnostic::new("or", "at least one alternative", "none"));
        }
        Ok(Verdict {
            passed: false,
            diagnostics,
        })
    }

    /// The child is rejected.
    fn negation<T: EvaluationTrace + ?Sized>(
        &self,
        child: &Expectation,
        outcome: &Outcome,
        trace: &mut T,
    ) -> Result<Verdict, HarnessFault> {
        let verdict = self.evaluate_with_trace(child, outcome, trace)?;
        Ok(Verdict::check(!verdict.passed, || {
            Diagnostic::new("not", format!("{} to fail", child.label()), "it held")
        }))
    }

    /// Returns true when `expected` accepts the reported `actual` code.
    fn accepts_code(&self, expected: &ErrorCode, actual: &ErrorCode) -> bool {
        self.options.lenient_error_codes || expected.matches(actual)
    }

    /// Checks the code of a classified failure.
    fn error_code_verdict(&self, expected: &ErrorCode, outcome: &Outcome) -> Verdict {
        let actual = match outcome {
            Outcome::Failure {
                code,
            } => {
                return Verdict::check(self.accepts_code(expected, code), || {
                    Diagnostic::new("error_code", format!("error {expected}"), format!("error {code}"))
                });
            }
            Outcome::Success {
                items,
            } => project_items(items),
        };
        Verdict::fail(Diagnostic::new("error_code", format!("error {expected}"), actual))
    }

    /// Accepts a matching failure or a result that cannot be serialized.
    fn serialization_error_verdict(&self, expected: &ErrorCode, outcome: &Outcome) -> Verdict {
        let label = "serialization_error";
        let items = match outcome {
            Outcome::Failure {
                code,
            } => {
                return Verdict::check(self.accepts_code(expected, code), || {
                    Diagnostic::new(label, format!("error {expected}"), format!("error {code}"))
                });
            }
            Outcome::Success {
                items,
            } => items,
        };
        match serialize_items(items, SerializeOptions::default()) {
            Ok(serialized) => {
                Verdict::fail(Diagnostic::new(label, format!("error {expected}"), serialized))
            }
            Err(err) => {
                let accepted = self.options.lenient_error_codes
                    || expected.is_wildcard()
                    || err
                        .code()
                        .and_then(|code| ErrorCode::new(code).ok())
                        .is_some_and(|code| expected.matches(&code));
                Verdict::check(accepted, || {
                    Diagnostic::new(label, format!("error {expected}"), err.to_string())
                })
            }
        }
    }

    /// Runs a derived query and checks its effective boolean value.
    fn derived_verdict(&self, expr: &str, items: &[ResultItem]) -> Result<Verdict, HarnessFault> {
        let verdict = match self.derived.eval_derived(expr, items)? {
            Outcome::Success {
                items: derived,
            } => Verdict::check(effective_boolean_value(&derived) == Some(true), || {
                Diagnostic::new("derived_query", format!("{expr} to be true"), project_items(&derived))
            }),
            Outcome::Failure {
                code,
            } => Verdict::fail(Diagnostic::new(
                "derived_query",
                format!("{expr} to be true"),
                format!("error {code}"),
            )),
        };
        Ok(verdict)
    }

    /// Evaluates the expected sequence and compares it item by item.
    fn deep_eq_verdict(&self, expr: &str, items: &[ResultItem]) -> Result<Verdict, HarnessFault> {
        let verdict = match self.derived.eval_expected(expr)? {
            Outcome::Success {
                items: expected,
            } => Verdict::check(deep_equal(&expected, items), || {
                Diagnostic::new("deep_eq", project_items(&expected), project_items(items))
            }),
            Outcome::Failure {
                code,
            } => Verdict::fail(Diagnostic::new(
                "deep_eq",
                format!("value of {expr}"),
                format!("error {code}"),
            )),
        };
        Ok(verdict)
    }
}

// ============================================================================
// SECTION: Value Leaves
// ============================================================================

/// Applies a value-shaped check; a classified failure always rejects it.
fn on_items(
    leaf: &Expectation,
    outcome: &Outcome,
    check: impl FnOnce(&[ResultItem]) -> Verdict,
) -> Verdict {
    match outcome {
        Outcome::Success {
            items,
        } => check(items),
        Outcome::Failure {
            code,
        } => Verdict::fail(Diagnostic::new(leaf.label(), expected_text(leaf), format!("error {code}"))),
    }
}

/// Fallible form of [`on_items`] for leaves that run secondary queries.
fn try_on_items(
    leaf: &Expectation,
    outcome: &Outcome,
    check: impl FnOnce(&[ResultItem]) -> Result<Verdict, HarnessFault>,
) -> Result<Verdict, HarnessFault> {
    match outcome {
        Outcome::Success {
            items,
        } => check(items),
        Outcome::Failure {
            ..
        } => Ok(on_items(leaf, outcome, |_| Verdict::pass())),
    }
}

/// Exactly one item whose projection equals `expected`.
fn eq_verdict(expected: &str, items: &[ResultItem]) -> Verdict {
    let holds = matches!(items, [only] if only.value() == expected);
    Verdict::check(holds, || Diagnostic::new("eq", expected, project_items(items)))
}

/// Space-joined projection equals `expected`.
fn string_value_verdict(expected: &str, normalize: bool, items: &[ResultItem]) -> Verdict {
    let joined = items.iter().map(ResultItem::value).collect::<Vec<_>>().join(" ");
    let holds = if normalize {
        normalize_space(&joined) == normalize_space(expected)
    } else {
        joined == expected
    };
    Verdict::check(holds, || Diagnostic::new("string_value", expected, joined))
}

/// Compares the canonical serialization with an expected literal.
fn serialization_verdict(
    items: &[ResultItem],
    expected: &str,
    normalize_namespaces: bool,
    normalize_whitespace: bool,
) -> Verdict {
    let options = SerializeOptions::with_normalized_namespaces(normalize_namespaces);
    let actual = match serialize_items(items, options) {
        Ok(actual) => actual,
        Err(err) => return Verdict::fail(Diagnostic::new("serialization", expected, err.to_string())),
    };
    let wanted = if normalize_namespaces {
        canonicalize(expected, options).unwrap_or_else(|_| expected.to_string())
    } else {
        expected.to_string()
    };
    let holds = if normalize_whitespace {
        normalize_markup_space(&actual) == normalize_markup_space(&wanted)
    } else {
        actual == wanted
    };
    Verdict::check(holds, || Diagnostic::new("serialization", expected, actual))
}

/// Matches the canonical serialization against a pattern.
fn pattern_verdict(items: &[ResultItem], pattern: &str, flags: &str) -> Verdict {
    let label = "serialization_matches";
    let regex = match build_pattern(pattern, flags) {
        Ok(regex) => regex,
        Err(err) => return Verdict::fail(Diagnostic::new(label, pattern, err.to_string())),
    };
    match serialize_items(items, SerializeOptions::default()) {
        Ok(actual) => {
            Verdict::check(regex.is_match(&actual), || Diagnostic::new(label, pattern, actual))
        }
        Err(err) => Verdict::fail(Diagnostic::new(label, pattern, err.to_string())),
    }
}

// ============================================================================
// SECTION: Deep Equality
// ============================================================================

/// Returns true when both sequences are deep-equal item by item.
#[must_use]
pub fn deep_equal(left: &[ResultItem], right: &[ResultItem]) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(l, r)| items_deep_equal(l, r))
}

/// Deep equality of two items.
fn items_deep_equal(left: &ResultItem, right: &ResultItem) -> bool {
    match (left.kind(), right.kind()) {
        (ItemKind::Atomic(left_type), ItemKind::Atomic(right_type)) => {
            atomics_equal(left_type, left.value(), right_type, right.value())
        }
        (left_kind, right_kind) if left_kind != right_kind => false,
        (kind, _) if kind.is_node() => match (left.markup(), right.markup()) {
            (Some(left_node), Some(right_node)) => {
                let options = SerializeOptions::with_normalized_namespaces(true);
                match (serialize_node(left_node, options), serialize_node(right_node, options)) {
                    (Ok(l), Ok(r)) => l == r,
                    _ => left_node == right_node,
                }
            }
            _ => left.value() == right.value(),
        },
        _ => left.value() == right.value(),
    }
}

/// Deep equality of two atomic values.
#[allow(clippy::float_cmp, reason = "Deep equality compares numeric values exactly.")]
fn atomics_equal(left_type: AtomicType, left: &str, right_type: AtomicType, right: &str) -> bool {
    if left_type.is_numeric() && right_type.is_numeric() {
        return match (left.trim().parse::<f64>(), right.trim().parse::<f64>()) {
            (Ok(l), Ok(r)) => l == r || (l.is_nan() && r.is_nan()),
            _ => left == right,
        };
    }
    if left_type.is_string_like() && right_type.is_string_like() {
        return left == right;
    }
    (left_type.is_subtype_of(right_type) || right_type.is_subtype_of(left_type)) && left == right
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Collapses runs of `#x20 #x9 #xA #xD` to one space and trims both ends.
fn normalize_space(value: &str) -> String {
    value.split(is_markup_space).filter(|part| !part.is_empty()).collect::<Vec<_>>().join(" ")
}

/// [`normalize_space`] that also drops a lone space between two tags.
fn normalize_markup_space(value: &str) -> String {
    normalize_space(value).replace("> <", "><")
}

/// Describes an expected permutation.
fn permutation_text(expected: &[String]) -> String {
    format!("permutation of ({})", expected.join(", "))
}

/// Expected side of a value-shaped leaf for diagnostics.
fn expected_text(leaf: &Expectation) -> String {
    match leaf {
        Expectation::Eq(expected)
        | Expectation::StringValue {
            expected, ..
        }
        | Expectation::Serialization {
            expected, ..
        } => expected.clone(),
        Expectation::Count(n) => format!("{n} items"),
        Expectation::Boolean(b) => b.to_string(),
        Expectation::Empty => "()".to_string(),
        Expectation::Type(descriptor) => descriptor.to_string(),
        Expectation::SerializationMatches {
            pattern, ..
        } => pattern.clone(),
        Expectation::Permutation(expected) => permutation_text(expected),
        Expectation::DerivedQuery(expr) => format!("{expr} to be true"),
        Expectation::DeepEq(expr) => format!("value of {expr}"),
        other => other.label().to_string(),
    }
}
