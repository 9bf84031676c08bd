// crates/xqts-runner/src/lib.rs
// ============================================================================
// Module: Runner Root
// Description: Public API surface for running conformance cases.
// Purpose: Wire together the engine boundary, case runner, pool, catalogs,
//          replay engine, fixtures, reports and configuration.
// Dependencies: crate::{catalog, config, fixtures, interfaces, pool, replay,
//              report, request, runner}
// ============================================================================

//! ## Overview
//! The runner drives an engine behind [`QueryEngine`]: each [`TestCase`]
//! runs once in a scoped session, its outcome is checked by the assertion
//! engine and a [`CaseReport`] is produced. [`run_cases`] spreads a catalog
//! over worker threads and [`ReportSink`] receives structured events.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod catalog;
pub mod config;
pub mod fixtures;
pub mod interfaces;
pub mod pool;
pub mod replay;
pub mod report;
pub mod request;
pub mod runner;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::CatalogError;
pub use catalog::TestCatalog;
pub use config::CONFIG_ENV_VAR;
pub use config::ConfigError;
pub use config::DefaultsConfig;
pub use config::FixturesConfig;
pub use config::HarnessConfig;
pub use config::ReportConfig;
pub use config::ReportSinkKind;
pub use config::RunConfig;
pub use fixtures::DirectoryFixtureLoader;
pub use interfaces::EngineError;
pub use interfaces::EngineSession;
pub use interfaces::FixtureLoader;
pub use interfaces::QueryEngine;
pub use interfaces::ScopedSession;
pub use interfaces::classify;
pub use interfaces::execute_scoped;
pub use pool::run_cases;
pub use pool::run_cases_with_sink;
pub use replay::ReplayEngine;
pub use replay::ReplayError;
pub use replay::ReplaySession;
pub use report::CaseEvent;
pub use report::FileReportSink;
pub use report::NoopReportSink;
pub use report::ReportSink;
pub use report::RunSummary;
pub use report::StderrReportSink;
pub use report::SummaryEvent;
pub use report::sink_from_config;
pub use request::DocumentHandle;
pub use request::LanguageVersion;
pub use request::QueryContext;
pub use request::QueryOptions;
pub use request::QueryRequest;
pub use runner::CaseReport;
pub use runner::CaseRunner;
pub use runner::CaseStatus;
pub use runner::RESULT_VARIABLE;
pub use runner::TestCase;
