// crates/xqts-runner/src/pool.rs
// ============================================================================
// Module: Worker Pool
// Description: Runs a list of cases across scoped worker threads.
// Purpose: Parallelise independent cases while keeping catalog order.
// Dependencies: xqts-assert, crate::{interfaces, report, runner}
// ============================================================================

//! ## Overview
//! Workers pull the next case index from a shared cursor and store each
//! report in its own slot, so results come back in catalog order whatever
//! order they finish in. A panic while running a case is caught and reported
//! as that case's [`HarnessFault::Panicked`]; the other cases keep running.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Instant;

use xqts_assert::HarnessFault;

use crate::interfaces::QueryEngine;
use crate::report::CaseEvent;
use crate::report::NoopReportSink;
use crate::report::ReportSink;
use crate::report::RunSummary;
use crate::report::SummaryEvent;
use crate::runner::CaseReport;
use crate::runner::CaseRunner;
use crate::runner::CaseStatus;
use crate::runner::TestCase;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound on worker threads.
pub const MAX_WORKERS: usize = 256;

// ============================================================================
// SECTION: Pool
// ============================================================================

/// Runs `cases` on up to `workers` threads and returns reports in order.
#[must_use]
pub fn run_cases<E>(runner: &CaseRunner<'_, E>, cases: &[TestCase], workers: usize) -> Vec<CaseReport>
where
    E: QueryEngine + ?Sized,
{
    run_cases_with_sink(runner, cases, workers, &NoopReportSink)
}

/// Runs `cases` like [`run_cases`], recording every case and the summary.
#[must_use]
pub fn run_cases_with_sink<E>(
    runner: &CaseRunner<'_, E>,
    cases: &[TestCase],
    workers: usize,
    sink: &dyn ReportSink,
) -> Vec<CaseReport>
where
    E: QueryEngine + ?Sized,
{
    let slots: Vec<Mutex<Option<CaseReport>>> = cases.iter().map(|_| Mutex::new(None)).collect();
    let cursor = AtomicUsize::new(0);
    let threads = workers.clamp(1, MAX_WORKERS).min(cases.len().max(1));

    thread::scope(|scope| {
        for _ in 0 .. threads {
            scope.spawn(|| {
                loop {
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(case) = cases.get(index) else {
                        break;
                    };
                    let report = run_guarded(runner, case);
                    sink.record_case(&CaseEvent::from_report(&report));
                    if let Some(slot) = slots.get(index) {
                        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(report);
                    }
                }
            });
        }
    });

    let reports: Vec<CaseReport> = slots
        .into_iter()
        .zip(cases)
        .map(|(slot, case)| {
            slot.into_inner().unwrap_or_else(PoisonError::into_inner).unwrap_or_else(|| {
                fault_report(case, HarnessFault::Panicked("case produced no report".to_string()), 0)
            })
        })
        .collect();
    sink.record_summary(&SummaryEvent::new(RunSummary::from_reports(&reports)));
    reports
}

/// Runs one case, converting a panic into a fault report.
fn run_guarded<E>(runner: &CaseRunner<'_, E>, case: &TestCase) -> CaseReport
where
    E: QueryEngine + ?Sized,
{
    let started = Instant::now();
    match catch_unwind(AssertUnwindSafe(|| runner.run(case))) {
        Ok(report) => report,
        Err(payload) => fault_report(
            case,
            HarnessFault::Panicked(panic_message(payload.as_ref())),
            started.elapsed().as_millis(),
        ),
    }
}

/// Builds a fault report for `case`.
fn fault_report(case: &TestCase, cause: HarnessFault, elapsed_ms: u128) -> CaseReport {
    CaseReport {
        name: case.name.clone(),
        status: CaseStatus::HarnessFault {
            cause,
        },
        outcome: None,
        elapsed_ms,
    }
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
