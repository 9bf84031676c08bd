// crates/xqts-assert/src/lib.rs
// ============================================================================
// Module: Assertion Engine Root
// Description: Public API surface for outcome capture and verification.
// Purpose: Wire together the outcome, item, markup, serializer, expectation
//          and evaluator modules.
// Dependencies: crate::{evaluator, expectation, item, markup, outcome,
//              serializer, types, validate}
// ============================================================================

//! ## Overview
//! A query run yields an [`Outcome`]: a typed item sequence or a classified
//! [`ErrorCode`]. An [`Expectation`] tree describes what counts as correct and
//! the [`Evaluator`] decides pass or fail with diagnostics. Anything outside
//! the classified vocabulary is a [`HarnessFault`] and is never matched.

// ============================================================================
// SECTION: Core Modules
// ============================================================================

pub mod evaluator;
pub mod expectation;
pub mod item;
pub mod markup;
pub mod outcome;
pub mod serializer;
pub mod types;
pub mod validate;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use evaluator::DerivedQueryEval;
pub use evaluator::Diagnostic;
pub use evaluator::EvalOptions;
pub use evaluator::EvaluationTrace;
pub use evaluator::Evaluator;
pub use evaluator::NoDerivedQueries;
pub use evaluator::NoopTrace;
pub use evaluator::Verdict;
pub use evaluator::deep_equal;
pub use expectation::Expectation;
pub use expectation::convenience;
pub use item::AtomicType;
pub use item::ItemKind;
pub use item::ItemKindError;
pub use item::ResultItem;
pub use item::effective_boolean_value;
pub use markup::Attribute;
pub use markup::Element;
pub use markup::MarkupError;
pub use markup::NamespaceDecl;
pub use markup::Node;
pub use markup::parse_document;
pub use markup::parse_fragment;
pub use outcome::ERROR_NAMESPACE;
pub use outcome::ErrorCode;
pub use outcome::ErrorCodeError;
pub use outcome::HarnessFault;
pub use outcome::Outcome;
pub use outcome::project_items;
pub use serializer::NO_PROJECTION_CODE;
pub use serializer::SerializeError;
pub use serializer::SerializeOptions;
pub use serializer::canonicalize;
pub use serializer::serialize_items;
pub use serializer::serialize_node;
pub use types::ItemTest;
pub use types::Occurrence;
pub use types::TypeDescriptor;
pub use types::TypeDescriptorError;
pub use validate::ExpectationError;
pub use validate::ExpectationSerializer;
pub use validate::ExpectationValidator;
pub use validate::ValidationConfig;
