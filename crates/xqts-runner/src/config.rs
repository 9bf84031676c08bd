// crates/xqts-runner/src/config.rs
// ============================================================================
// Module: Harness Configuration
// Description: Configuration loading and validation for harness runs.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, thiserror, toml, xqts-assert, crate::request
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The path comes from the caller, then `XQTS_CONFIG`, then `xqts.toml`.
//! Every section validates itself; invalid values fail the load.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use xqts_assert::EvalOptions;
use xqts_assert::ValidationConfig;

use crate::request::LanguageVersion;
use crate::request::QueryOptions;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "xqts.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "XQTS_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of worker threads.
const MAX_WORKERS: usize = 256;
/// Maximum expectation depth a config may allow.
const MAX_EXPECTATION_DEPTH: usize = 64;
/// Default fixture document size limit in bytes.
const DEFAULT_MAX_DOCUMENT_BYTES: usize = 16 * 1024 * 1024;
/// Hard ceiling for the fixture document size limit.
const MAX_DOCUMENT_BYTES_CEILING: usize = 64 * 1024 * 1024;

// ============================================================================
// SECTION: Configuration Root
// ============================================================================

/// Harness configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    /// Run scheduling and evaluation switches.
    #[serde(default)]
    pub run: RunConfig,
    /// Fixture document loading.
    #[serde(default)]
    pub fixtures: FixturesConfig,
    /// Default engine options for every case.
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// Event reporting.
    #[serde(default)]
    pub report: ReportConfig,
}

impl HarnessConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Loads configuration like [`HarnessConfig::load`], falling back to
    /// defaults when no path is given, `XQTS_CONFIG` is unset and no
    /// `xqts.toml` exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a resolved file fails to load.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if path.is_none()
            && env::var_os(CONFIG_ENV_VAR).is_none()
            && !Path::new(DEFAULT_CONFIG_NAME).exists()
        {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.run.validate()?;
        self.fixtures.validate()?;
        self.defaults.validate()?;
        self.report.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// Run scheduling and evaluation switches.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Worker thread count.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Only run cases whose name starts with this prefix.
    #[serde(default)]
    pub filter: Option<String>,
    /// Accept any classified failure for every error-code assertion.
    #[serde(default)]
    pub lenient_error_codes: bool,
    /// Maximum expectation nesting depth.
    #[serde(default = "default_max_expectation_depth")]
    pub max_expectation_depth: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            filter: None,
            lenient_error_codes: false,
            max_expectation_depth: default_max_expectation_depth(),
        }
    }
}

impl RunConfig {
    /// Validates run configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "run.workers must be between 1 and {MAX_WORKERS}"
            )));
        }
        if self.max_expectation_depth == 0 || self.max_expectation_depth > MAX_EXPECTATION_DEPTH {
            return Err(ConfigError::Invalid(format!(
                "run.max_expectation_depth must be between 1 and {MAX_EXPECTATION_DEPTH}"
            )));
        }
        if let Some(filter) = &self.filter
            && filter.trim().is_empty()
        {
            return Err(ConfigError::Invalid("run.filter must be non-empty".to_string()));
        }
        Ok(())
    }

    /// Evaluation options derived from this section.
    #[must_use]
    pub const fn eval_options(&self) -> EvalOptions {
        EvalOptions {
            lenient_error_codes: self.lenient_error_codes,
        }
    }

    /// Expectation limits derived from this section.
    #[must_use]
    pub const fn validation(&self) -> ValidationConfig {
        ValidationConfig {
            max_depth: self.max_expectation_depth,
            allow_empty_logical: false,
        }
    }
}

/// Fixture document loading.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixturesConfig {
    /// Directory fixture paths are resolved against.
    #[serde(default = "default_fixture_root")]
    pub root: PathBuf,
    /// Maximum fixture document size in bytes.
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: usize,
}

impl Default for FixturesConfig {
    fn default() -> Self {
        Self {
            root: default_fixture_root(),
            max_document_bytes: default_max_document_bytes(),
        }
    }
}

impl FixturesConfig {
    /// Validates fixture configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("fixtures.root", &self.root.to_string_lossy())?;
        if self.max_document_bytes == 0 || self.max_document_bytes > MAX_DOCUMENT_BYTES_CEILING {
            return Err(ConfigError::Invalid(format!(
                "fixtures.max_document_bytes must be between 1 and {MAX_DOCUMENT_BYTES_CEILING}"
            )));
        }
        Ok(())
    }
}

/// Default engine options applied to every case.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Language version flag.
    #[serde(default)]
    pub language_version: LanguageVersion,
    /// Default collation URI.
    #[serde(default)]
    pub default_collation: Option<String>,
    /// Static base URI.
    #[serde(default)]
    pub base_uri: Option<String>,
}

impl DefaultsConfig {
    /// Validates default options.
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("defaults.default_collation", &self.default_collation),
            ("defaults.base_uri", &self.base_uri),
        ] {
            if let Some(value) = value
                && (value.trim().is_empty() || value.chars().any(char::is_whitespace))
            {
                return Err(ConfigError::Invalid(format!(
                    "{field} must be a non-empty URI without whitespace"
                )));
            }
        }
        Ok(())
    }

    /// Query options carrying these defaults.
    #[must_use]
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            language_version: self.language_version,
            default_collation: self.default_collation.clone(),
            base_uri: self.base_uri.clone(),
            ..QueryOptions::default()
        }
    }
}

/// Report sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSinkKind {
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// No events.
    #[default]
    None,
}

/// Event reporting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// Sink kind.
    #[serde(default)]
    pub sink: ReportSinkKind,
    /// Report file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl ReportConfig {
    /// Validates report configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (ReportSinkKind::File, None) => {
                Err(ConfigError::Invalid("report.path is required when report.sink = \"file\"".to_string()))
            }
            (_, Some(path)) => validate_path_string("report.path", &path.to_string_lossy()),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default worker count.
const fn default_workers() -> usize {
    1
}

/// Default expectation depth limit.
const fn default_max_expectation_depth() -> usize {
    32
}

/// Default fixture root.
fn default_fixture_root() -> PathBuf {
    PathBuf::from(".")
}

/// Default fixture size limit.
const fn default_max_document_bytes() -> usize {
    DEFAULT_MAX_DOCUMENT_BYTES
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}
