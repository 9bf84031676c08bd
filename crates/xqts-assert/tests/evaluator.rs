// crates/xqts-assert/tests/evaluator.rs
// ============================================================================
// Module: Evaluator Tests
// Description: Leaf, combinator and exclusivity behaviour of the evaluator.
// ============================================================================
//! ## Overview
//! Integration tests for expectation evaluation against captured outcomes.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions are permitted."
)]

mod support;

use support::TableDerived;
use support::TestResult;
use support::ensure;
use support::failure;
use support::success;
use xqts_assert::AtomicType;
use xqts_assert::Element;
use xqts_assert::EvalOptions;
use xqts_assert::EvaluationTrace;
use xqts_assert::Evaluator;
use xqts_assert::Expectation;
use xqts_assert::HarnessFault;
use xqts_assert::NoDerivedQueries;
use xqts_assert::Node;
use xqts_assert::Outcome;
use xqts_assert::ResultItem;
use xqts_assert::Verdict;
use xqts_assert::convenience as c;

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

/// Evaluates without derived queries.
fn eval(expectation: &Expectation, outcome: &Outcome) -> Result<Verdict, HarnessFault> {
    Evaluator::new(&NoDerivedQueries, EvalOptions::default()).evaluate(expectation, outcome)
}

// ========================================================================
// SECTION: Conformance Scenarios
// ========================================================================

#[test]
fn count_of_children_equals_zero() -> TestResult {
    let verdict = eval(&c::eq("0"), &success(vec![ResultItem::integer(0)]))?;
    check!(verdict.passed);
    Ok(())
}

#[test]
fn classified_error_matches_expected_code() -> TestResult {
    let verdict = eval(&c::error("FORG0006")?, &failure("FORG0006")?)?;
    check!(verdict.passed);
    Ok(())
}

#[test]
fn boolean_true_and_false_results() -> TestResult {
    check!(eval(&c::boolean(true), &success(vec![ResultItem::boolean(true)]))?.passed);
    check!(eval(&c::boolean(false), &success(vec![ResultItem::boolean(false)]))?.passed);
    check!(!eval(&c::boolean(true), &success(vec![ResultItem::boolean(false)]))?.passed);
    Ok(())
}

#[test]
fn either_legal_outcome_is_accepted() -> TestResult {
    let expectation = c::any(vec![c::eq("0"), c::error("XPST0005")?]);
    check!(eval(&expectation, &success(vec![ResultItem::integer(0)]))?.passed);
    check!(eval(&expectation, &failure("XPST0005")?)?.passed);
    check!(!eval(&expectation, &failure("XPTY0004")?)?.passed);
    Ok(())
}

#[test]
fn serialization_is_byte_exact() -> TestResult {
    let element = Element::new("root")
        .with_child(Node::Element(Element::new("Customers").with_attribute("id", "a&b")));
    let items = vec![ResultItem::node(Node::Element(element))];
    let expected = r#"<root><Customers id="a&amp;b"/></root>"#;
    check!(eval(&c::serialization(expected, false), &success(items.clone()))?.passed);
    let reordered = r#"<root><Customers id='a&amp;b'/></root>"#;
    check!(!eval(&c::serialization(reordered, false), &success(items))?.passed);
    Ok(())
}

// ========================================================================
// SECTION: Leaves Against Success
// ========================================================================

#[test]
fn eq_requires_exactly_one_item() -> TestResult {
    let two = success(vec![ResultItem::integer(0), ResultItem::integer(0)]);
    check!(!eval(&c::eq("0"), &two)?.passed);
    check!(!eval(&c::eq("0"), &success(vec![]))?.passed);
    check!(!eval(&c::eq("0 "), &success(vec![ResultItem::integer(0)]))?.passed);
    Ok(())
}

#[test]
fn string_value_joins_with_spaces() -> TestResult {
    let items = success(vec![ResultItem::string("a"), ResultItem::string(" b\n")]);
    check!(eval(&c::string_value("a  b\n", false), &items)?.passed);
    check!(eval(&c::string_value("a b", true), &items)?.passed);
    check!(!eval(&c::string_value("a b", false), &items)?.passed);
    Ok(())
}

#[test]
fn whitespace_normalization_keeps_non_breaking_space() -> TestResult {
    let items = success(vec![ResultItem::string("a\u{a0}b")]);
    check!(!eval(&c::string_value("a b", true), &items)?.passed);
    check!(eval(&c::string_value("a\u{a0}b", true), &items)?.passed);
    let spaced = success(vec![ResultItem::string("\t a\r\n b ")]);
    check!(eval(&c::string_value("a b", true), &spaced)?.passed);
    Ok(())
}

#[test]
fn count_and_empty() -> TestResult {
    let three = success(vec![ResultItem::integer(1), ResultItem::integer(2), ResultItem::integer(3)]);
    check!(eval(&c::count(3), &three)?.passed);
    check!(!eval(&c::count(2), &three)?.passed);
    check!(eval(&c::empty(), &success(vec![]))?.passed);
    check!(eval(&c::count(0), &success(vec![]))?.passed);
    check!(!eval(&c::empty(), &three)?.passed);
    Ok(())
}

#[test]
fn boolean_rejects_non_boolean_items() -> TestResult {
    check!(!eval(&c::boolean(true), &success(vec![ResultItem::string("true")]))?.passed);
    check!(!eval(&c::boolean(false), &success(vec![ResultItem::integer(0)]))?.passed);
    Ok(())
}

#[test]
fn type_descriptor_checks_cardinality_and_items() -> TestResult {
    let ints = success(vec![ResultItem::integer(1), ResultItem::integer(2)]);
    check!(eval(&c::type_of("xs:integer+")?, &ints)?.passed);
    check!(eval(&c::type_of("xs:decimal*")?, &ints)?.passed);
    check!(!eval(&c::type_of("xs:integer")?, &ints)?.passed);
    check!(!eval(&c::type_of("xs:string+")?, &ints)?.passed);
    let map = success(vec![ResultItem::new(xqts_assert::ItemKind::Map, "map{}")]);
    check!(eval(&c::type_of("map(*)")?, &map)?.passed);
    check!(eval(&c::type_of("function(*)")?, &map)?.passed);
    check!(eval(&c::type_of("empty-sequence()")?, &success(vec![]))?.passed);
    Ok(())
}

#[test]
fn permutation_ignores_order() -> TestResult {
    let items = success(vec![
        ResultItem::integer(3),
        ResultItem::integer(1),
        ResultItem::integer(2),
    ]);
    check!(eval(&c::permutation(["1", "2", "3"]), &items)?.passed);
    check!(!eval(&c::permutation(["1", "2"]), &items)?.passed);
    Ok(())
}

#[test]
fn serialization_matches_uses_flags() -> TestResult {
    let items = success(vec![ResultItem::node(Node::Element(Element::new("Out")))]);
    check!(eval(&c::serialization_matches("^<out/>$", "i"), &items)?.passed);
    check!(!eval(&c::serialization_matches("^<out/>$", ""), &items)?.passed);
    Ok(())
}

#[test]
fn unserializable_items_fail_the_leaf() -> TestResult {
    let items = success(vec![ResultItem::new(xqts_assert::ItemKind::Map, "map{}")]);
    let verdict = eval(&c::serialization("map{}", false), &items)?;
    check!(!verdict.passed);
    check_eq!(verdict.diagnostics.len(), 1);
    Ok(())
}

#[test]
fn namespace_normalization_drops_redundant_declarations() -> TestResult {
    let inner = Element::new("p:b").with_namespace("p", "urn:p");
    let outer = Element::new("a").with_namespace("p", "urn:p").with_child(Node::Element(inner));
    let items = success(vec![ResultItem::node(Node::Element(outer))]);
    let literal = r#"<a xmlns:p="urn:p"><p:b/></a>"#;
    check!(eval(&c::serialization(literal, true), &items)?.passed);
    check!(!eval(&c::serialization(literal, false), &items)?.passed);
    Ok(())
}

#[test]
fn namespace_normalization_accepts_moved_declarations() -> TestResult {
    let inner = Element::new("p:b").with_namespace("p", "urn:p");
    let outer = Element::new("a").with_child(Node::Element(inner));
    let items = success(vec![ResultItem::node(Node::Element(outer))]);
    let literal = r#"<a xmlns:p="urn:p"><p:b/></a>"#;
    check!(eval(&c::serialization(literal, true), &items)?.passed);
    check!(!eval(&c::serialization(literal, false), &items)?.passed);
    let other_uri = r#"<a xmlns:p="urn:q"><p:b/></a>"#;
    check!(!eval(&c::serialization(other_uri, true), &items)?.passed);
    Ok(())
}

#[test]
fn namespace_normalization_keeps_default_namespace_in_place() -> TestResult {
    let inner = Element::new("b").with_namespace("", "urn:d");
    let outer = Element::new("a").with_child(Node::Element(inner));
    let items = success(vec![ResultItem::node(Node::Element(outer))]);
    check!(eval(&c::serialization(r#"<a><b xmlns="urn:d"/></a>"#, true), &items)?.passed);
    check!(!eval(&c::serialization(r#"<a xmlns="urn:d"><b/></a>"#, true), &items)?.passed);
    Ok(())
}

#[test]
fn serialization_can_ignore_whitespace_runs() -> TestResult {
    let element = Element::new("a").with_child(Node::Element(Element::new("b")));
    let items = success(vec![ResultItem::node(Node::Element(element))]);
    let indented = "<a>\n  <b/>\n</a>\n";
    check!(eval(&c::serialization_normalized_space(indented, false), &items)?.passed);
    check!(!eval(&c::serialization(indented, false), &items)?.passed);
    Ok(())
}

// ========================================================================
// SECTION: Error Codes
// ========================================================================

#[test]
fn error_code_forms_are_equivalent() -> TestResult {
    let outcome = failure("FORG0006")?;
    check!(eval(&c::error("err:FORG0006")?, &outcome)?.passed);
    check!(eval(&c::error("Q{http://www.w3.org/2005/xqt-errors}FORG0006")?, &outcome)?.passed);
    check!(!eval(&c::error("Q{urn:other}FORG0006")?, &outcome)?.passed);
    check!(eval(&c::error("*")?, &outcome)?.passed);
    Ok(())
}

#[test]
fn lenient_error_codes_accept_any_failure() -> TestResult {
    let options = EvalOptions {
        lenient_error_codes: true,
    };
    let evaluator = Evaluator::new(&NoDerivedQueries, options);
    check!(evaluator.evaluate(&c::error("XPTY0004")?, &failure("FOAR0001")?)?.passed);
    check!(!evaluator.evaluate(&c::error("XPTY0004")?, &success(vec![]))?.passed);
    Ok(())
}

#[test]
fn value_leaves_never_hold_against_failure() -> TestResult {
    let outcome = failure("XPTY0004")?;
    let leaves = vec![
        c::eq("XPTY0004"),
        c::string_value("", false),
        c::count(0),
        c::boolean(false),
        c::empty(),
        c::type_of("item()*")?,
        c::serialization("", false),
        c::serialization_matches(".*", ""),
        c::permutation(Vec::<String>::new()),
        c::derived("true()"),
        c::deep_eq("()"),
    ];
    for leaf in &leaves {
        let verdict = eval(leaf, &outcome)?;
        check!(!verdict.passed, "{} held against a failure", leaf.label());
        check_eq!(verdict.diagnostics[0].actual, "error XPTY0004".to_string());
    }
    Ok(())
}

#[test]
fn serialization_error_accepts_failure_or_unserializable_result() -> TestResult {
    let expectation = c::serialization_error("SENR0001")?;
    check!(eval(&expectation, &failure("err:SENR0001")?)?.passed);
    check!(!eval(&expectation, &failure("SEPM0004")?)?.passed);

    let attribute = success(vec![ResultItem::new(xqts_assert::ItemKind::Attribute, "x")]);
    check!(eval(&expectation, &attribute)?.passed);
    check!(!eval(&c::serialization_error("SEPM0004")?, &attribute)?.passed);
    check!(eval(&c::serialization_error("*")?, &attribute)?.passed);

    let verdict = eval(&expectation, &success(vec![ResultItem::integer(1)]))?;
    check!(!verdict.passed);
    check_eq!(verdict.diagnostics[0].actual, "1".to_string());
    Ok(())
}

#[test]
fn error_code_never_holds_against_success() -> TestResult {
    check!(!eval(&c::error("*")?, &success(vec![]))?.passed);
    check!(!eval(&c::error("FORG0006")?, &success(vec![ResultItem::boolean(false)]))?.passed);
    Ok(())
}

// ========================================================================
// SECTION: Combinators
// ========================================================================

#[test]
fn and_short_circuits_on_first_failure() -> TestResult {
    let derived = TableDerived::default().with("true()", Ok(success(vec![ResultItem::boolean(true)])));
    let evaluator = Evaluator::new(&derived, EvalOptions::default());
    let expectation = c::all(vec![c::count(5), c::derived("true()")]);
    let verdict = evaluator.evaluate(&expectation, &success(vec![]))?;
    check!(!verdict.passed);
    check_eq!(verdict.diagnostics.len(), 1);
    check_eq!(verdict.diagnostics[0].assertion, "count");
    check!(derived.calls.borrow().is_empty());
    Ok(())
}

#[test]
fn or_reports_every_rejected_alternative() -> TestResult {
    let expectation = c::any(vec![c::eq("1"), c::count(4), c::error("FOER0000")?]);
    let verdict = eval(&expectation, &success(vec![ResultItem::integer(0)]))?;
    check!(!verdict.passed);
    let labels: Vec<&str> = verdict.diagnostics.iter().map(|d| d.assertion).collect();
    check_eq!(labels, vec!["eq", "count", "error_code"]);
    Ok(())
}

#[test]
fn or_short_circuits_on_first_success() -> TestResult {
    let derived = TableDerived::default();
    let evaluator = Evaluator::new(&derived, EvalOptions::default());
    let expectation = c::any(vec![c::empty(), c::derived("unanswered")]);
    check!(evaluator.evaluate(&expectation, &success(vec![]))?.passed);
    check!(derived.calls.borrow().is_empty());
    Ok(())
}

#[test]
fn not_inverts_its_child() -> TestResult {
    let items = success(vec![ResultItem::integer(1)]);
    check!(eval(&!c::empty(), &items)?.passed);
    let verdict = eval(&!c::count(1), &items)?;
    check!(!verdict.passed);
    check_eq!(verdict.diagnostics[0].assertion, "not");
    Ok(())
}

#[test]
fn operators_build_flat_combinators() -> TestResult {
    let expectation = c::eq("1") | c::eq("2") | c::error("FOAR0001")?;
    let Expectation::Or(children) = &expectation else {
        return Err("expected an or combinator".into());
    };
    check_eq!(children.len(), 3);
    check!(eval(&expectation, &success(vec![ResultItem::integer(2)]))?.passed);
    let both = c::count(1) & c::type_of("xs:integer")?;
    check!(eval(&both, &success(vec![ResultItem::integer(2)]))?.passed);
    Ok(())
}

// ========================================================================
// SECTION: Derived Queries
// ========================================================================

#[test]
fn derived_query_uses_effective_boolean_value() -> TestResult {
    let derived = TableDerived::default()
        .with("yes", Ok(success(vec![ResultItem::string("x")])))
        .with("no", Ok(success(vec![ResultItem::atomic(AtomicType::Double, "0")])))
        .with("err", Ok(failure("FORG0006")?));
    let evaluator = Evaluator::new(&derived, EvalOptions::default());
    let items = success(vec![ResultItem::integer(1)]);
    check!(evaluator.evaluate(&c::derived("yes"), &items)?.passed);
    check!(!evaluator.evaluate(&c::derived("no"), &items)?.passed);
    let verdict = evaluator.evaluate(&c::derived("err"), &items)?;
    check!(!verdict.passed);
    check_eq!(verdict.diagnostics[0].actual, "error FORG0006".to_string());
    Ok(())
}

#[test]
fn deep_eq_compares_items_against_expected_sequence() -> TestResult {
    let derived = TableDerived::default()
        .with("(1, 'a')", Ok(success(vec![ResultItem::integer(1), ResultItem::string("a")])))
        .with("(1.0, 'a')", Ok(success(vec![
            ResultItem::atomic(AtomicType::Decimal, "1.0"),
            ResultItem::atomic(AtomicType::UntypedAtomic, "a"),
        ])))
        .with("('a', 1)", Ok(success(vec![ResultItem::string("a"), ResultItem::integer(1)])))
        .with("1 div 0", Ok(failure("FOAR0001")?));
    let evaluator = Evaluator::new(&derived, EvalOptions::default());
    let items = success(vec![ResultItem::integer(1), ResultItem::string("a")]);
    check!(evaluator.evaluate(&c::deep_eq("(1, 'a')"), &items)?.passed);
    check!(evaluator.evaluate(&c::deep_eq("(1.0, 'a')"), &items)?.passed);
    check!(!evaluator.evaluate(&c::deep_eq("('a', 1)"), &items)?.passed);
    let verdict = evaluator.evaluate(&c::deep_eq("1 div 0"), &items)?;
    check!(!verdict.passed);
    check_eq!(verdict.diagnostics[0].actual, "error FOAR0001".to_string());
    Ok(())
}

#[test]
fn deep_eq_compares_nodes_by_tree() -> TestResult {
    let nested = |declared_on_root: bool| {
        let mut inner = Element::new("p:b");
        let mut outer = Element::new("a");
        if declared_on_root {
            outer = outer.with_namespace("p", "urn:p");
        } else {
            inner = inner.with_namespace("p", "urn:p");
        }
        ResultItem::node(Node::Element(outer.with_child(Node::Element(inner))))
    };
    let derived = TableDerived::default().with("<a xmlns:p='urn:p'><p:b/></a>", Ok(success(vec![nested(true)])));
    let evaluator = Evaluator::new(&derived, EvalOptions::default());
    let expectation = c::deep_eq("<a xmlns:p='urn:p'><p:b/></a>");
    check!(evaluator.evaluate(&expectation, &success(vec![nested(false)]))?.passed);
    let other = ResultItem::node(Node::Element(Element::new("a")));
    check!(!evaluator.evaluate(&expectation, &success(vec![other]))?.passed);
    Ok(())
}

#[test]
fn derived_fault_aborts_evaluation() -> TestResult {
    let derived = TableDerived::default()
        .with("boom", Err(HarnessFault::Engine("lost connection".to_string())));
    let evaluator = Evaluator::new(&derived, EvalOptions::default());
    let expectation = c::any(vec![c::derived("boom"), c::empty()]);
    let result = evaluator.evaluate(&expectation, &success(vec![]));
    check!(matches!(result, Err(HarnessFault::Engine(_))));
    Ok(())
}

#[test]
fn derived_without_engine_is_a_fault() -> TestResult {
    let result = eval(&c::derived("true()"), &success(vec![]));
    check!(matches!(result, Err(HarnessFault::InvalidCase(_))));
    Ok(())
}

// ========================================================================
// SECTION: Tracing
// ========================================================================

/// Records leaf labels in evaluation order.
#[derive(Default)]
struct LabelTrace(Vec<(&'static str, bool)>);

impl EvaluationTrace for LabelTrace {
    fn on_leaf(&mut self, leaf: &Expectation, passed: bool) {
        self.0.push((leaf.label(), passed));
    }
}

#[test]
fn trace_sees_each_evaluated_leaf() -> TestResult {
    let mut trace = LabelTrace::default();
    let expectation = c::any(vec![c::eq("9"), c::all(vec![c::count(1), c::eq("1")])]);
    let evaluator = Evaluator::new(&NoDerivedQueries, EvalOptions::default());
    let verdict =
        evaluator.evaluate_with_trace(&expectation, &success(vec![ResultItem::integer(1)]), &mut trace)?;
    check!(verdict.passed);
    check_eq!(trace.0, vec![("eq", false), ("count", true), ("eq", true)]);
    Ok(())
}
