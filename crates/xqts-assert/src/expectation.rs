// crates/xqts-assert/src/expectation.rs
// ============================================================================
// Module: Expectation Model
// Description: Closed tree of leaf assertions and logical combinators.
// Purpose: Describe what counts as a correct outcome for one test case.
// Dependencies: serde, smallvec, crate::{outcome, types}
// ============================================================================

//! ## Overview
//! An [`Expectation`] is built once per case and never mutated. Leaves are
//! terminal; `And` and `Or` hold a non-empty ordered child list and `Not`
//! wraps exactly one child. Structural limits are checked by
//! [`crate::validate::ExpectationValidator`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use smallvec::SmallVec;

use crate::outcome::ErrorCode;
use crate::types::TypeDescriptor;

// ============================================================================
// SECTION: Expectation Definition
// ============================================================================

/// Pass condition of a test case.
///
/// # Invariants
/// - Combinators hold at least one child once validated.
/// - The tree is finite and acyclic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// Exactly one item whose projection equals the literal byte for byte.
    Eq(String),

    /// The space-joined projection of all items equals the literal.
    StringValue {
        /// Expected string.
        expected: String,
        /// Collapse whitespace runs and trim both sides before comparing.
        #[serde(default)]
        normalize_whitespace: bool,
    },

    /// The sequence has exactly this many items.
    Count(usize),

    /// Exactly one `xs:boolean` item with this value.
    Boolean(bool),

    /// The sequence is empty.
    Empty,

    /// The dynamic types match the descriptor.
    Type(TypeDescriptor),

    /// The canonical serialization equals the literal.
    Serialization {
        /// Expected markup.
        expected: String,
        /// Normalize namespace declarations on both sides first.
        #[serde(default)]
        normalize_namespaces: bool,
        /// Collapse whitespace runs and trim both sides before comparing.
        #[serde(default)]
        normalize_whitespace: bool,
    },

    /// The canonical serialization matches a regular expression.
    SerializationMatches {
        /// Pattern text.
        pattern: String,
        /// Flag letters from `i`, `m`, `s`, `x`.
        #[serde(default)]
        flags: String,
    },

    /// The set of item projections equals the expected set.
    Permutation(Vec<String>),

    /// The outcome is a classified failure with this code.
    ErrorCode(ErrorCode),

    /// The outcome fails with this code, or serializing the result does.
    SerializationError(ErrorCode),

    /// A secondary query yields a sequence deep-equal to the result.
    DeepEq(String),

    /// A secondary query over the result must yield true.
    DerivedQuery(String),

    /// Every child holds; evaluation stops at the first failure.
    And(SmallVec<[Box<Self>; 4]>),

    /// At least one child holds; evaluation stops at the first success.
    Or(SmallVec<[Box<Self>; 4]>),

    /// The child does not hold.
    Not(Box<Self>),
}

impl Expectation {
    /// Creates an `And` combinator.
    #[must_use]
    pub fn and(children: Vec<Self>) -> Self {
        Self::And(children.into_iter().map(Box::new).collect())
    }

    /// Creates an `Or` combinator.
    #[must_use]
    pub fn or(children: Vec<Self>) -> Self {
        Self::Or(children.into_iter().map(Box::new).collect())
    }

    /// Creates a `Not` combinator.
    #[must_use]
    pub fn negate(child: Self) -> Self {
        Self::Not(Box::new(child))
    }

    /// Returns a stable label for the node kind.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Eq(_) => "eq",
            Self::StringValue {
                ..
            } => "string_value",
            Self::Count(_) => "count",
            Self::Boolean(_) => "boolean",
            Self::Empty => "empty",
            Self::Type(_) => "type",
            Self::Serialization {
                ..
            } => "serialization",
            Self::SerializationMatches {
                ..
            } => "serialization_matches",
            Self::Permutation(_) => "permutation",
            Self::ErrorCode(_) => "error_code",
            Self::SerializationError(_) => "serialization_error",
            Self::DeepEq(_) => "deep_eq",
            Self::DerivedQuery(_) => "derived_query",
            Self::And(_) => "and",
            Self::Or(_) => "or",
            Self::Not(_) => "not",
        }
    }

    /// Returns true for leaf assertions.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        !matches!(self, Self::And(_) | Self::Or(_) | Self::Not(_))
    }

    /// Returns true for leaves that inspect a produced value sequence.
    #[must_use]
    pub const fn is_value_shaped(&self) -> bool {
        self.is_leaf() && !matches!(self, Self::ErrorCode(_) | Self::SerializationError(_))
    }

    /// Returns the depth of the tree; a leaf has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::And(children) | Self::Or(children) => {
                1 + children.iter().map(|child| child.depth()).max().unwrap_or(0)
            }
            Self::Not(child) => 1 + child.depth(),
            _ => 0,
        }
    }

    /// Returns the number of nodes in the tree.
    #[must_use]
    pub fn complexity(&self) -> usize {
        match self {
            Self::And(children) | Self::Or(children) => {
                1 + children.iter().map(|child| child.complexity()).sum::<usize>()
            }
            Self::Not(child) => 1 + child.complexity(),
            _ => 1,
        }
    }

    /// Returns true when any node in the tree needs the execution boundary.
    #[must_use]
    pub fn uses_derived_queries(&self) -> bool {
        match self {
            Self::DerivedQuery(_) | Self::DeepEq(_) => true,
            Self::And(children) | Self::Or(children) => {
                children.iter().any(|child| child.uses_derived_queries())
            }
            Self::Not(child) => child.uses_derived_queries(),
            _ => false,
        }
    }
}

impl std::ops::Not for Expectation {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::negate(self)
    }
}

impl std::ops::BitAnd for Expectation {
    type Output = Self;

    /// Flattens into an existing `And` on the left.
    fn bitand(self, rhs: Self) -> Self::Output {
        match self {
            Self::And(mut children) => {
                children.push(Box::new(rhs));
                Self::And(children)
            }
            other => Self::and(vec![other, rhs]),
        }
    }
}

impl std::ops::BitOr for Expectation {
    type Output = Self;

    /// Flattens into an existing `Or` on the left.
    fn bitor(self, rhs: Self) -> Self::Output {
        match self {
            Self::Or(mut children) => {
                children.push(Box::new(rhs));
                Self::Or(children)
            }
            other => Self::or(vec![other, rhs]),
        }
    }
}

// ============================================================================
// SECTION: Convenience Constructors
// ============================================================================

/// Short constructors for hand-built expectation trees.
pub mod convenience {
    use super::Expectation;
    use crate::outcome::ErrorCode;
    use crate::outcome::ErrorCodeError;
    use crate::types::TypeDescriptor;
    use crate::types::TypeDescriptorError;

    /// `Eq(expected)`
    pub fn eq(expected: impl Into<String>) -> Expectation {
        Expectation::Eq(expected.into())
    }

    /// `StringValue(expected, normalize_whitespace)`
    pub fn string_value(expected: impl Into<String>, normalize_whitespace: bool) -> Expectation {
        Expectation::StringValue {
            expected: expected.into(),
            normalize_whitespace,
        }
    }

    /// `Count(n)`
    #[must_use]
    pub const fn count(n: usize) -> Expectation {
        Expectation::Count(n)
    }

    /// `Boolean(b)`
    #[must_use]
    pub const fn boolean(b: bool) -> Expectation {
        Expectation::Boolean(b)
    }

    /// `Empty`
    #[must_use]
    pub const fn empty() -> Expectation {
        Expectation::Empty
    }

    /// `Type(descriptor)` from its textual form.
    ///
    /// # Errors
    ///
    /// Returns [`TypeDescriptorError`] when the descriptor does not parse.
    pub fn type_of(descriptor: &str) -> Result<Expectation, TypeDescriptorError> {
        Ok(Expectation::Type(TypeDescriptor::parse(descriptor)?))
    }

    /// `Serialization(expected, normalize_namespaces)`
    pub fn serialization(expected: impl Into<String>, normalize_namespaces: bool) -> Expectation {
        Expectation::Serialization {
            expected: expected.into(),
            normalize_namespaces,
            normalize_whitespace: false,
        }
    }

    /// `Serialization(expected, normalize_namespaces)` with whitespace runs
    /// collapsed on both sides.
    pub fn serialization_normalized_space(
        expected: impl Into<String>,
        normalize_namespaces: bool,
    ) -> Expectation {
        Expectation::Serialization {
            expected: expected.into(),
            normalize_namespaces,
            normalize_whitespace: true,
        }
    }

    /// `SerializationMatches(pattern, flags)`
    pub fn serialization_matches(
        pattern: impl Into<String>,
        flags: impl Into<String>,
    ) -> Expectation {
        Expectation::SerializationMatches {
            pattern: pattern.into(),
            flags: flags.into(),
        }
    }

    /// `Permutation(expected)`
    pub fn permutation<I, S>(expected: I) -> Expectation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expectation::Permutation(expected.into_iter().map(Into::into).collect())
    }

    /// `ErrorCode(code)`
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCodeError`] when the code literal is malformed.
    pub fn error(code: &str) -> Result<Expectation, ErrorCodeError> {
        Ok(Expectation::ErrorCode(ErrorCode::new(code)?))
    }

    /// `SerializationError(code)`
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCodeError`] when the code literal is malformed.
    pub fn serialization_error(code: &str) -> Result<Expectation, ErrorCodeError> {
        Ok(Expectation::SerializationError(ErrorCode::new(code)?))
    }

    /// `DeepEq(expr)`
    pub fn deep_eq(expr: impl Into<String>) -> Expectation {
        Expectation::DeepEq(expr.into())
    }

    /// `DerivedQuery(expr)`
    pub fn derived(expr: impl Into<String>) -> Expectation {
        Expectation::DerivedQuery(expr.into())
    }

    /// `And(children)`
    #[must_use]
    pub fn all(children: Vec<Expectation>) -> Expectation {
        Expectation::and(children)
    }

    /// `Or(children)`
    #[must_use]
    pub fn any(children: Vec<Expectation>) -> Expectation {
        Expectation::or(children)
    }
}
