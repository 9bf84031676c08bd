// crates/xqts-runner/src/catalog.rs
// ============================================================================
// Module: Test Catalogs
// Description: TOML and JSON files listing test cases.
// Purpose: Turn authored case lists into resolved test cases.
// Dependencies: serde, serde_json, thiserror, toml, xqts-assert,
//              crate::{request, runner}
// ============================================================================

//! ## Overview
//! A catalog is a list of `case` entries, each with a name, query, optional
//! fixture path, optional option overrides and an `expect` tree. Overrides
//! are merged onto the configured defaults when the catalog loads.
//! Security posture: catalogs are untrusted; size is bounded and names must
//! be unique.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use xqts_assert::Expectation;

use crate::request::LanguageVersion;
use crate::request::QueryOptions;
use crate::runner::TestCase;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum catalog file size in bytes.
pub const MAX_CATALOG_FILE_SIZE: usize = 8 * 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Catalog loading errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// I/O failure while reading the catalog.
    #[error("catalog io error: {0}")]
    Io(String),
    /// The catalog text could not be decoded.
    #[error("catalog parse error: {0}")]
    Parse(String),
    /// The catalog content is inconsistent.
    #[error("invalid catalog: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Authored Form
// ============================================================================

/// Catalog file layout.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    /// Authored cases.
    #[serde(rename = "case", alias = "cases", default)]
    cases: Vec<CatalogEntry>,
}

/// One authored case.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogEntry {
    /// Unique case name.
    name: String,
    /// Query text.
    query: String,
    /// Fixture path.
    #[serde(default)]
    context: Option<String>,
    /// Language version override.
    #[serde(default)]
    language_version: Option<LanguageVersion>,
    /// Default collation override.
    #[serde(default)]
    default_collation: Option<String>,
    /// Base URI override.
    #[serde(default)]
    base_uri: Option<String>,
    /// Additional namespace bindings.
    #[serde(default)]
    namespaces: BTreeMap<String, String>,
    /// Static context overrides.
    #[serde(default)]
    static_context: BTreeMap<String, String>,
    /// Pass condition.
    expect: Expectation,
}

impl CatalogEntry {
    /// Resolves the entry against default options.
    fn into_case(self, defaults: &QueryOptions) -> TestCase {
        let mut options = defaults.clone();
        if let Some(version) = self.language_version {
            options.language_version = version;
        }
        if self.default_collation.is_some() {
            options.default_collation = self.default_collation;
        }
        if self.base_uri.is_some() {
            options.base_uri = self.base_uri;
        }
        options.namespaces.extend(self.namespaces);
        options.static_context.extend(self.static_context);
        TestCase {
            name: self.name,
            query: self.query,
            context: self.context,
            options,
            expectation: self.expect,
        }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Ordered, validated list of test cases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestCatalog {
    /// Cases in authored order.
    cases: Vec<TestCase>,
}

impl TestCatalog {
    /// Loads a catalog, choosing JSON for `.json` files and TOML otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when reading, decoding or validation fails.
    pub fn load(path: &Path, defaults: &QueryOptions) -> Result<Self, CatalogError> {
        let bytes = fs::read(path).map_err(|err| CatalogError::Io(err.to_string()))?;
        if bytes.len() > MAX_CATALOG_FILE_SIZE {
            return Err(CatalogError::Invalid("catalog file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| CatalogError::Invalid("catalog file must be utf-8".to_string()))?;
        let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json { Self::from_json(content, defaults) } else { Self::from_toml(content, defaults) }
    }

    /// Decodes a TOML catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when decoding or validation fails.
    pub fn from_toml(content: &str, defaults: &QueryOptions) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|err| CatalogError::Parse(err.to_string()))?;
        Self::from_entries(file.cases, defaults)
    }

    /// Decodes a JSON catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when decoding or validation fails.
    pub fn from_json(content: &str, defaults: &QueryOptions) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            serde_json::from_str(content).map_err(|err| CatalogError::Parse(err.to_string()))?;
        Self::from_entries(file.cases, defaults)
    }

    /// Validates entries and resolves their options.
    fn from_entries(
        entries: Vec<CatalogEntry>,
        defaults: &QueryOptions,
    ) -> Result<Self, CatalogError> {
        let mut seen = BTreeSet::new();
        let mut cases = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.name.trim().is_empty() {
                return Err(CatalogError::Invalid("case name must be non-empty".to_string()));
            }
            if entry.query.trim().is_empty() {
                return Err(CatalogError::Invalid(format!("case {} has an empty query", entry.name)));
            }
            if !seen.insert(entry.name.clone()) {
                return Err(CatalogError::Invalid(format!("duplicate case name: {}", entry.name)));
            }
            cases.push(entry.into_case(defaults));
        }
        Ok(Self {
            cases,
        })
    }

    /// Cases in authored order.
    #[must_use]
    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Number of cases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Returns true when the catalog has no cases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Keeps only cases whose name starts with `prefix`.
    #[must_use]
    pub fn filtered(mut self, prefix: &str) -> Self {
        self.cases.retain(|case| case.name.starts_with(prefix));
        self
    }
}
