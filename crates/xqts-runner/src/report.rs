// crates/xqts-runner/src/report.rs
// ============================================================================
// Module: Run Reporting
// Description: Structured case events, run summaries and JSON-line sinks.
// Purpose: Emit one event per case and one per run without a logging stack.
// Dependencies: serde, serde_json, crate::{config, runner}
// ============================================================================

//! ## Overview
//! Sinks receive a [`CaseEvent`] per finished case and a [`SummaryEvent`] per
//! run. Events are JSON lines so they can be routed to any log pipeline.
//! Write failures are dropped; reporting never changes a verdict.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::config::ReportConfig;
use crate::config::ReportSinkKind;
use crate::runner::CaseReport;
use crate::runner::CaseStatus;

// ============================================================================
// SECTION: Run Summary
// ============================================================================

/// Counts of case statuses for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Cases run.
    pub total: u64,
    /// Cases that passed.
    pub passed: u64,
    /// Cases whose expectation was rejected.
    pub failed: u64,
    /// Cases that faulted.
    pub faults: u64,
}

impl RunSummary {
    /// Tallies a set of reports.
    #[must_use]
    pub fn from_reports(reports: &[CaseReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            summary.record(&report.status);
        }
        summary
    }

    /// Adds one status.
    pub const fn record(&mut self, status: &CaseStatus) {
        self.total += 1;
        match status {
            CaseStatus::Pass => self.passed += 1,
            CaseStatus::Fail {
                ..
            } => self.failed += 1,
            CaseStatus::HarnessFault {
                ..
            } => self.faults += 1,
        }
    }

    /// Percentage of passed cases with two decimals; 100 for an empty run.
    #[must_use]
    #[allow(clippy::cast_precision_loss, reason = "Case counts stay far below 2^52.")]
    pub fn pass_rate_percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        let basis_points = self.passed * 10_000 / self.total;
        basis_points as f64 / 100.0
    }

    /// Returns true when nothing failed or faulted.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed == 0 && self.faults == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cases: {} passed, {} failed, {} faults ({:.2}%)",
            self.total,
            self.passed,
            self.failed,
            self.faults,
            self.pass_rate_percent()
        )
    }
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Milliseconds since the epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

/// Event emitted for every finished case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Case name.
    pub case: String,
    /// Status label.
    pub status: &'static str,
    /// Rejected assertions for failures.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
    /// Fault kind for harness faults.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault_kind: Option<&'static str>,
    /// Fault cause for harness faults.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Projection of the main outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    /// Wall-clock time spent on the case.
    pub elapsed_ms: u128,
}

impl CaseEvent {
    /// Builds the event for a report.
    #[must_use]
    pub fn from_report(report: &CaseReport) -> Self {
        let (diagnostics, fault_kind, cause) = match &report.status {
            CaseStatus::Pass => (Vec::new(), None, None),
            CaseStatus::Fail {
                diagnostics,
            } => (diagnostics.iter().map(ToString::to_string).collect(), None, None),
            CaseStatus::HarnessFault {
                cause,
            } => (Vec::new(), Some(cause.kind()), Some(cause.to_string())),
        };
        Self {
            event: "case_result",
            timestamp_ms: now_ms(),
            case: report.name.clone(),
            status: report.status.label(),
            diagnostics,
            fault_kind,
            cause,
            outcome: report.outcome.clone(),
            elapsed_ms: report.elapsed_ms,
        }
    }
}

/// Event emitted once per run.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Status counts.
    #[serde(flatten)]
    pub summary: RunSummary,
    /// Pass rate with two decimals.
    pub pass_rate_percent: f64,
}

impl SummaryEvent {
    /// Builds the event for a summary.
    #[must_use]
    pub fn new(summary: RunSummary) -> Self {
        Self {
            event: "run_summary",
            timestamp_ms: now_ms(),
            summary,
            pass_rate_percent: summary.pass_rate_percent(),
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Destination for run events.
pub trait ReportSink: Send + Sync {
    /// Records a finished case.
    fn record_case(&self, event: &CaseEvent);

    /// Records the run summary.
    fn record_summary(&self, _event: &SummaryEvent) {}
}

/// Sink that writes JSON lines to stderr.
pub struct StderrReportSink;

impl ReportSink for StderrReportSink {
    fn record_case(&self, event: &CaseEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_summary(&self, event: &SummaryEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Sink that appends JSON lines to a file.
pub struct FileReportSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileReportSink {
    /// Opens the report file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Writes one serialized line.
    fn write_line<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl ReportSink for FileReportSink {
    fn record_case(&self, event: &CaseEvent) {
        self.write_line(event);
    }

    fn record_summary(&self, event: &SummaryEvent) {
        self.write_line(event);
    }
}

/// Sink that drops every event.
pub struct NoopReportSink;

impl ReportSink for NoopReportSink {
    fn record_case(&self, _event: &CaseEvent) {}
}

/// Builds the sink selected by the report configuration.
///
/// # Errors
///
/// Returns an error when a file sink cannot be opened.
pub fn sink_from_config(config: &ReportConfig) -> io::Result<Box<dyn ReportSink>> {
    match (config.sink, &config.path) {
        (ReportSinkKind::Stderr, _) => Ok(Box::new(StderrReportSink)),
        (ReportSinkKind::None, _) => Ok(Box::new(NoopReportSink)),
        (ReportSinkKind::File, Some(path)) => Ok(Box::new(FileReportSink::new(path)?)),
        (ReportSinkKind::File, None) => {
            Err(io::Error::new(io::ErrorKind::InvalidInput, "report.path is required for file sink"))
        }
    }
}
