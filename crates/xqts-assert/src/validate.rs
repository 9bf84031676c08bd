// crates/xqts-assert/src/validate.rs
// ============================================================================
// Module: Expectation Validation
// Description: Structural checks and authoring formats for expectation trees.
// Purpose: Reject malformed trees before any case runs.
// Dependencies: regex, ron, serde_json, thiserror, crate::expectation
// ============================================================================

//! ## Overview
//! Expectation trees come from catalog files and are untrusted. The validator
//! enforces non-empty combinators, a depth limit and well-formed regular
//! expressions. [`ExpectationSerializer`] reads and writes the RON and JSON
//! authoring formats and validates on both paths.

// ============================================================================
// SECTION: Imports
// ============================================================================

use regex::RegexBuilder;
use thiserror::Error;

use crate::expectation::Expectation;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Structural errors in an expectation tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpectationError {
    /// A combinator has no children.
    #[error("empty {combinator} combinator not allowed")]
    EmptyCombinator {
        /// Combinator label.
        combinator: &'static str,
    },
    /// The tree is deeper than allowed.
    #[error("expectation tree too deep: {actual_depth} levels (max {max_depth})")]
    TooDeep {
        /// Maximum supported depth.
        max_depth: usize,
        /// Depth encountered.
        actual_depth: usize,
    },
    /// A leaf carries an unusable value.
    #[error("invalid value for field '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Offending field.
        field: &'static str,
        /// Value that failed validation.
        value: String,
        /// Expected description.
        expected: &'static str,
    },
    /// The authoring text could not be read or written.
    #[error("expectation format error: {0}")]
    Format(String),
}

// ============================================================================
// SECTION: Validation Configuration
// ============================================================================

/// Limits applied by [`ExpectationValidator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Maximum depth of combinator nesting.
    pub max_depth: usize,
    /// Whether combinators may be empty.
    pub allow_empty_logical: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            allow_empty_logical: false,
        }
    }
}

/// Flag letters accepted by `SerializationMatches`.
const REGEX_FLAGS: &str = "imsx";

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Validator for expectation trees.
#[derive(Debug, Clone, Default)]
pub struct ExpectationValidator {
    /// Limits in force.
    config: ValidationConfig,
}

impl ExpectationValidator {
    /// Creates a validator with the given limits.
    #[must_use]
    pub const fn new(config: ValidationConfig) -> Self {
        Self {
            config,
        }
    }

    /// Returns the limits in force.
    #[must_use]
    pub const fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validates a tree.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError`] for the first structural violation found.
    pub fn validate(&self, expectation: &Expectation) -> Result<(), ExpectationError> {
        self.validate_node(expectation, 0)
    }

    /// Validates one node at `depth`.
    fn validate_node(&self, expectation: &Expectation, depth: usize) -> Result<(), ExpectationError> {
        if depth > self.config.max_depth {
            return Err(ExpectationError::TooDeep {
                max_depth: self.config.max_depth,
                actual_depth: depth,
            });
        }
        match expectation {
            Expectation::And(children) | Expectation::Or(children) => {
                if children.is_empty() && !self.config.allow_empty_logical {
                    return Err(ExpectationError::EmptyCombinator {
                        combinator: expectation.label(),
                    });
                }
                for child in children {
                    self.validate_node(child, depth + 1)?;
                }
            }
            Expectation::Not(child) => self.validate_node(child, depth + 1)?,
            Expectation::SerializationMatches {
                pattern,
                flags,
            } => {
                build_pattern(pattern, flags)?;
            }
            Expectation::DerivedQuery(expr) | Expectation::DeepEq(expr)
                if expr.trim().is_empty() =>
            {
                return Err(ExpectationError::InvalidValue {
                    field: expectation.label(),
                    value: expr.clone(),
                    expected: "a non-empty query",
                });
            }
            _ => {}
        }
        Ok(())
    }
}

/// Compiles a serialization pattern with its flag letters.
///
/// # Errors
///
/// Returns [`ExpectationError::InvalidValue`] for unknown flags or a pattern
/// that does not compile.
pub fn build_pattern(pattern: &str, flags: &str) -> Result<regex::Regex, ExpectationError> {
    if let Some(bad) = flags.chars().find(|flag| !REGEX_FLAGS.contains(*flag)) {
        return Err(ExpectationError::InvalidValue {
            field: "flags",
            value: bad.to_string(),
            expected: "flag letters from `imsx`",
        });
    }
    RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .build()
        .map_err(|err| ExpectationError::InvalidValue {
            field: "pattern",
            value: err.to_string(),
            expected: "a valid regular expression",
        })
}

// ============================================================================
// SECTION: Authoring Formats
// ============================================================================

/// Reads and writes expectation trees with validation.
#[derive(Debug, Clone, Default)]
pub struct ExpectationSerializer {
    /// Validator applied on both paths.
    validator: ExpectationValidator,
}

impl ExpectationSerializer {
    /// Creates a serializer with the given limits.
    #[must_use]
    pub const fn new(config: ValidationConfig) -> Self {
        Self {
            validator: ExpectationValidator::new(config),
        }
    }

    /// Writes a tree as pretty RON.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError`] when validation or encoding fails.
    pub fn to_ron(&self, expectation: &Expectation) -> Result<String, ExpectationError> {
        self.validator.validate(expectation)?;
        ron::ser::to_string_pretty(expectation, ron::ser::PrettyConfig::default())
            .map_err(|err| ExpectationError::Format(err.to_string()))
    }

    /// Reads a tree from RON.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError`] when decoding or validation fails.
    pub fn from_ron(&self, text: &str) -> Result<Expectation, ExpectationError> {
        let expectation: Expectation =
            ron::from_str(text).map_err(|err| ExpectationError::Format(err.to_string()))?;
        self.validator.validate(&expectation)?;
        Ok(expectation)
    }

    /// Writes a tree as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError`] when validation or encoding fails.
    pub fn to_json(&self, expectation: &Expectation) -> Result<String, ExpectationError> {
        self.validator.validate(expectation)?;
        serde_json::to_string_pretty(expectation)
            .map_err(|err| ExpectationError::Format(err.to_string()))
    }

    /// Reads a tree from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError`] when decoding or validation fails.
    pub fn from_json(&self, text: &str) -> Result<Expectation, ExpectationError> {
        let expectation: Expectation =
            serde_json::from_str(text).map_err(|err| ExpectationError::Format(err.to_string()))?;
        self.validator.validate(&expectation)?;
        Ok(expectation)
    }
}
