// crates/xqts-assert/src/outcome.rs
// ============================================================================
// Module: Evaluation Outcomes
// Description: Two-case result of one query evaluation plus the fault type.
// Purpose: Separate expected failures from infrastructure faults.
// Dependencies: serde, thiserror, crate::item
// ============================================================================

//! ## Overview
//! An [`Outcome`] is either a produced value sequence or a classified
//! failure carrying an [`ErrorCode`]. Anything the engine raises outside its
//! classified vocabulary is a [`HarnessFault`]; faults propagate and are
//! never matched by an expectation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::item::ResultItem;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Namespace of the standard error codes.
pub const ERROR_NAMESPACE: &str = "http://www.w3.org/2005/xqt-errors";
/// Prefix bound to [`ERROR_NAMESPACE`] in error-code literals.
const ERROR_PREFIX: &str = "err";
/// Maximum length of an error-code literal.
const MAX_ERROR_CODE_LENGTH: usize = 512;
/// Maximum characters of a result projection kept in summaries.
const MAX_SUMMARY_CHARS: usize = 2_000;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// Errors raised when constructing an [`ErrorCode`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorCodeError {
    /// The literal was empty.
    #[error("error code must be non-empty")]
    Empty,
    /// The literal exceeded the length limit.
    #[error("error code exceeds {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The literal was not a valid code or EQName.
    #[error("malformed error code: {0}")]
    Malformed(String),
}

/// Symbolic identifier of a classified evaluation failure.
///
/// Accepts `FORG0006`, `err:FORG0006` and `Q{uri}FORG0006`; unprefixed codes
/// live in [`ERROR_NAMESPACE`]. The literal `*` is a wildcard.
///
/// # Invariants
/// - The literal is non-empty, has no whitespace and a non-empty local name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ErrorCode(String);

impl ErrorCode {
    /// Literal that matches every classified failure.
    pub const WILDCARD: &'static str = "*";

    /// Creates an error code from a literal.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCodeError`] when the literal is empty, too long or malformed.
    pub fn new(code: impl Into<String>) -> Result<Self, ErrorCodeError> {
        let code = code.into();
        if code.is_empty() {
            return Err(ErrorCodeError::Empty);
        }
        if code.len() > MAX_ERROR_CODE_LENGTH {
            return Err(ErrorCodeError::TooLong {
                max: MAX_ERROR_CODE_LENGTH,
            });
        }
        if code.chars().any(char::is_whitespace) {
            return Err(ErrorCodeError::Malformed(code));
        }
        if code != Self::WILDCARD {
            let (_, local) = split_code(&code).ok_or_else(|| ErrorCodeError::Malformed(code.clone()))?;
            if local.is_empty() {
                return Err(ErrorCodeError::Malformed(code));
            }
        }
        Ok(Self(code))
    }

    /// Returns the wildcard code.
    #[must_use]
    pub fn wildcard() -> Self {
        Self(Self::WILDCARD.to_string())
    }

    /// Returns the literal as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the wildcard literal.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.0 == Self::WILDCARD
    }

    /// Returns the local part of the code.
    #[must_use]
    pub fn local_name(&self) -> &str {
        split_code(&self.0).map_or(self.0.as_str(), |(_, local)| local)
    }

    /// Returns true when this expected code accepts the `actual` code.
    #[must_use]
    pub fn matches(&self, actual: &Self) -> bool {
        if self.is_wildcard() {
            return true;
        }
        match (split_code(&self.0), split_code(&actual.0)) {
            (Some(expected), Some(found)) => expected == found,
            _ => false,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = ErrorCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ErrorCode {
    type Error = ErrorCodeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.0
    }
}

/// Splits a code literal into `(namespace key, local name)`.
///
/// Unknown prefixes are kept as the namespace key so that `a:X` and `b:X`
/// never compare equal.
fn split_code(code: &str) -> Option<(&str, &str)> {
    if let Some(rest) = code.strip_prefix("Q{") {
        let close = rest.find('}')?;
        return Some((&rest[.. close], &rest[close + 1 ..]));
    }
    match code.split_once(':') {
        Some((ERROR_PREFIX, local)) => Some((ERROR_NAMESPACE, local)),
        Some((prefix, local)) if !prefix.is_empty() => Some((prefix, local)),
        Some(_) => None,
        None => Some((ERROR_NAMESPACE, code)),
    }
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Result of one evaluation attempt.
///
/// # Invariants
/// - Exactly one variant is populated.
/// - `Success` with zero items is distinct from `Failure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The engine produced a value sequence.
    Success {
        /// Items in evaluation order.
        items: Vec<ResultItem>,
    },
    /// The engine signalled a classified error.
    Failure {
        /// Reported error code.
        code: ErrorCode,
    },
}

impl Outcome {
    /// Creates a success outcome.
    #[must_use]
    pub const fn success(items: Vec<ResultItem>) -> Self {
        Self::Success {
            items,
        }
    }

    /// Creates a failure outcome.
    #[must_use]
    pub const fn failure(code: ErrorCode) -> Self {
        Self::Failure {
            code,
        }
    }

    /// Returns the items of a success outcome.
    #[must_use]
    pub fn items(&self) -> Option<&[ResultItem]> {
        match self {
            Self::Success {
                items,
            } => Some(items),
            Self::Failure {
                ..
            } => None,
        }
    }

    /// Returns the code of a failure outcome.
    #[must_use]
    pub const fn error_code(&self) -> Option<&ErrorCode> {
        match self {
            Self::Failure {
                code,
            } => Some(code),
            Self::Success {
                ..
            } => None,
        }
    }

    /// Returns a short projection used in diagnostics.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Success {
                items,
            } => project_items(items),
            Self::Failure {
                code,
            } => format!("error {code}"),
        }
    }
}

/// Space-joined projection of items, truncated for reports.
#[must_use]
pub fn project_items(items: &[ResultItem]) -> String {
    if items.is_empty() {
        return "()".to_string();
    }
    let joined = items.iter().map(ResultItem::value).collect::<Vec<_>>().join(" ");
    if joined.chars().count() > MAX_SUMMARY_CHARS {
        let mut truncated: String = joined.chars().take(MAX_SUMMARY_CHARS).collect();
        truncated.push_str("...");
        truncated
    } else {
        joined
    }
}

// ============================================================================
// SECTION: Harness Faults
// ============================================================================

/// Unclassified failure in the execution boundary or fixture loading.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - A fault is never a pass or a fail of a specific assertion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessFault {
    /// The engine raised something outside its classified vocabulary.
    #[error("engine fault: {0}")]
    Engine(String),
    /// Session acquisition or release failed.
    #[error("session fault: {0}")]
    Session(String),
    /// A fixture document could not be loaded.
    #[error("fixture fault: {path}: {reason}")]
    Fixture {
        /// Fixture path as requested.
        path: String,
        /// Failure description.
        reason: String,
    },
    /// The case definition itself is unusable.
    #[error("invalid case: {0}")]
    InvalidCase(String),
    /// The case panicked while running.
    #[error("case panicked: {0}")]
    Panicked(String),
}

impl HarnessFault {
    /// Returns a stable label for the fault kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Engine(_) => "engine",
            Self::Session(_) => "session",
            Self::Fixture {
                ..
            } => "fixture",
            Self::InvalidCase(_) => "invalid_case",
            Self::Panicked(_) => "panicked",
        }
    }
}
