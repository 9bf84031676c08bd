// crates/xqts-runner/src/request.rs
// ============================================================================
// Module: Query Requests
// Description: Immutable description of one evaluation attempt.
// Purpose: Carry query text, context and per-case options to the engine.
// Dependencies: serde, xqts-assert
// ============================================================================

//! ## Overview
//! A [`QueryRequest`] is built per case and consumed by exactly one
//! execution. Options travel with the request so no engine default set by
//! one case can leak into the next.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use xqts_assert::Node;
use xqts_assert::ResultItem;

// ============================================================================
// SECTION: Options
// ============================================================================

/// Query language version requested by a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LanguageVersion {
    /// Version 1.0.
    #[serde(rename = "1.0")]
    V1_0,
    /// Version 3.0.
    #[serde(rename = "3.0")]
    V3_0,
    /// Version 3.1.
    #[default]
    #[serde(rename = "3.1")]
    V3_1,
}

impl LanguageVersion {
    /// Returns the version label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1_0 => "1.0",
            Self::V3_0 => "3.0",
            Self::V3_1 => "3.1",
        }
    }
}

impl fmt::Display for LanguageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request engine options.
///
/// # Invariants
/// - Applies to one request only; engines must not retain it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Language version flag.
    #[serde(default)]
    pub language_version: LanguageVersion,
    /// Default collation URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_collation: Option<String>,
    /// Static context overrides by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub static_context: BTreeMap<String, String>,
    /// Namespace bindings, prefix to URI.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub namespaces: BTreeMap<String, String>,
    /// Static base URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_uri: Option<String>,
}

// ============================================================================
// SECTION: Context
// ============================================================================

/// Parsed fixture document shared read-only between cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHandle {
    /// Fixture path the document was loaded from.
    pub uri: String,
    /// Document node.
    pub root: Arc<Node>,
}

/// Evaluation context of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryContext {
    /// A fixture document.
    Document(DocumentHandle),
    /// An item sequence, used for derived queries.
    Items(Vec<ResultItem>),
}

// ============================================================================
// SECTION: Request
// ============================================================================

/// One evaluation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Query text.
    pub query: String,
    /// Optional evaluation context.
    pub context: Option<QueryContext>,
    /// Engine options.
    pub options: QueryOptions,
    /// External variable bindings by name, without `$`.
    pub bindings: BTreeMap<String, Vec<ResultItem>>,
}

impl QueryRequest {
    /// Creates a request with no context and default options.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            context: None,
            options: QueryOptions::default(),
            bindings: BTreeMap::new(),
        }
    }

    /// Sets the options.
    #[must_use]
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets a fixture document as context.
    #[must_use]
    pub fn with_document(mut self, document: DocumentHandle) -> Self {
        self.context = Some(QueryContext::Document(document));
        self
    }

    /// Sets an item sequence as context.
    #[must_use]
    pub fn with_items(mut self, items: Vec<ResultItem>) -> Self {
        self.context = Some(QueryContext::Items(items));
        self
    }

    /// Binds an external variable.
    #[must_use]
    pub fn with_binding(mut self, name: impl Into<String>, items: Vec<ResultItem>) -> Self {
        self.bindings.insert(name.into(), items);
        self
    }
}
