// crates/xqts-runner/tests/support/mod.rs
// ============================================================================
// Module: Test Support
// Description: Result helpers, scripted engine and in-memory fixtures.
// ============================================================================
//! ## Overview
//! Shared test helpers for runner integration tests. The scripted engine
//! answers by query text, records every request and counts open sessions.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    dead_code,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use xqts_assert::HarnessFault;
use xqts_assert::Node;
use xqts_assert::ResultItem;
use xqts_assert::parse_document;
use xqts_runner::DocumentHandle;
use xqts_runner::EngineError;
use xqts_runner::EngineSession;
use xqts_runner::FixtureLoader;
use xqts_runner::QueryEngine;
use xqts_runner::QueryOptions;
use xqts_runner::QueryRequest;

// ========================================================================
// Test Result Helpers
// ========================================================================

/// Standard result type used across runner integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

/// Lightweight error type for test assertions.
#[derive(Debug)]
struct TestError {
    /// Human-readable failure message.
    message: String,
}

impl fmt::Display for TestError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message)
    }
}

impl Error for TestError {}

/// Returns an error when a test condition fails.
///
/// # Errors
/// Returns a `TestError` when the condition is false.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition {
        Ok(())
    } else {
        Err(Box::new(TestError {
            message: message.into(),
        }))
    }
}

// ========================================================================
// Scripted Engine
// ========================================================================

/// Scripted reply for one query.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Return these items.
    Items(Vec<ResultItem>),
    /// Raise this engine error.
    Error(EngineError),
    /// Panic with this message.
    Panic(String),
}

/// Engine answering from a script keyed by query text.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    /// Replies by query text.
    script: Arc<BTreeMap<String, Reply>>,
    /// Sessions opened and not yet released.
    open: Arc<AtomicUsize>,
    /// Releases observed.
    releases: Arc<AtomicUsize>,
    /// Requests seen, in order.
    requests: Arc<Mutex<Vec<QueryRequest>>>,
    /// Refuse every session when set.
    refuse_sessions: bool,
}

impl ScriptedEngine {
    /// Creates an engine from `(query, reply)` pairs.
    pub fn new(script: impl IntoIterator<Item = (&'static str, Reply)>) -> Self {
        Self {
            script: Arc::new(
                script.into_iter().map(|(query, reply)| (query.to_string(), reply)).collect(),
            ),
            ..Self::default()
        }
    }

    /// Makes every session acquisition fail.
    pub fn refusing_sessions(mut self) -> Self {
        self.refuse_sessions = true;
        self
    }

    /// Sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Releases observed.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
    }
}

impl QueryEngine for ScriptedEngine {
    type Session = ScriptedSession;

    fn open_session(&self, _options: &QueryOptions) -> Result<Self::Session, HarnessFault> {
        if self.refuse_sessions {
            return Err(HarnessFault::Session("pool exhausted".to_string()));
        }
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedSession {
            script: Arc::clone(&self.script),
            open: Arc::clone(&self.open),
            releases: Arc::clone(&self.releases),
            requests: Arc::clone(&self.requests),
        })
    }
}

/// Session handed out by [`ScriptedEngine`].
#[derive(Debug)]
pub struct ScriptedSession {
    /// Shared script.
    script: Arc<BTreeMap<String, Reply>>,
    /// Open-session counter.
    open: Arc<AtomicUsize>,
    /// Release counter.
    releases: Arc<AtomicUsize>,
    /// Request log.
    requests: Arc<Mutex<Vec<QueryRequest>>>,
}

impl EngineSession for ScriptedSession {
    fn execute(&mut self, request: &QueryRequest) -> Result<Vec<ResultItem>, EngineError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        match self.script.get(&request.query) {
            Some(Reply::Items(items)) => Ok(items.clone()),
            Some(Reply::Error(err)) => Err(err.clone()),
            Some(Reply::Panic(message)) => panic!("{message}"),
            None => Err(EngineError::Unclassified(format!("unscripted query: {}", request.query))),
        }
    }

    fn release(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

// ========================================================================
// In-Memory Fixtures
// ========================================================================

/// Fixture loader backed by a map of parsed documents.
#[derive(Debug, Default)]
pub struct MemoryFixtures {
    /// Documents by path.
    documents: BTreeMap<String, Arc<Node>>,
}

impl MemoryFixtures {
    /// Adds a document parsed from `markup`.
    pub fn with(mut self, path: &str, markup: &str) -> TestResult<Self> {
        self.documents.insert(path.to_string(), Arc::new(parse_document(markup)?));
        Ok(self)
    }
}

impl FixtureLoader for MemoryFixtures {
    fn load_document(&self, relative_path: &str) -> Result<DocumentHandle, HarnessFault> {
        self.documents
            .get(relative_path)
            .map(|root| DocumentHandle {
                uri: relative_path.to_string(),
                root: Arc::clone(root),
            })
            .ok_or_else(|| HarnessFault::Fixture {
                path: relative_path.to_string(),
                reason: "not found".to_string(),
            })
    }
}
