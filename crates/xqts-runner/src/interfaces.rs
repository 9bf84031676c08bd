// crates/xqts-runner/src/interfaces.rs
// ============================================================================
// Module: Execution Boundary
// Description: Engine, session and fixture-loading contracts.
// Purpose: Classify engine results into outcomes with scoped session release.
// Dependencies: thiserror, xqts-assert, crate::request
// ============================================================================

//! ## Overview
//! The engine under test sits behind [`QueryEngine`]. Each execution opens a
//! session, runs one request and releases the session on every exit path,
//! including classified failures, faults and panics. Engine errors inside the
//! classified vocabulary become [`Outcome::Failure`]; everything else is a
//! [`HarnessFault`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use xqts_assert::ErrorCode;
use xqts_assert::HarnessFault;
use xqts_assert::Outcome;
use xqts_assert::ResultItem;

use crate::request::DocumentHandle;
use crate::request::QueryOptions;
use crate::request::QueryRequest;

// ============================================================================
// SECTION: Engine Errors
// ============================================================================

/// Error raised by an engine session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A recognised error condition with its symbolic code.
    #[error("engine error {code}: {message}")]
    Classified {
        /// Reported code literal.
        code: String,
        /// Engine message.
        message: String,
    },
    /// A host fault, resource exhaustion or engine bug.
    #[error("engine fault: {0}")]
    Unclassified(String),
}

impl EngineError {
    /// Creates a classified error.
    pub fn classified(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Classified {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// SECTION: Engine Contracts
// ============================================================================

/// Per-evaluation engine state.
pub trait EngineSession {
    /// Performs exactly one evaluation attempt.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the engine signals an error.
    fn execute(&mut self, request: &QueryRequest) -> Result<Vec<ResultItem>, EngineError>;

    /// Releases the session; called once on every exit path.
    fn release(&mut self);
}

/// Engine under test.
pub trait QueryEngine: Sync {
    /// Session type opened per evaluation.
    type Session: EngineSession;

    /// Opens a session configured with `options`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessFault`] when no session can be acquired.
    fn open_session(&self, options: &QueryOptions) -> Result<Self::Session, HarnessFault>;
}

/// Loads fixture documents by relative path.
pub trait FixtureLoader: Send + Sync {
    /// Loads and parses the fixture at `relative_path`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessFault::Fixture`] when the document is unavailable.
    fn load_document(&self, relative_path: &str) -> Result<DocumentHandle, HarnessFault>;
}

// ============================================================================
// SECTION: Scoped Sessions
// ============================================================================

/// Session guard that releases on drop.
#[derive(Debug)]
pub struct ScopedSession<S: EngineSession> {
    /// Open session.
    session: S,
}

impl<S: EngineSession> ScopedSession<S> {
    /// Opens a session from `engine`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessFault`] when the engine cannot open a session.
    pub fn open<E>(engine: &E, options: &QueryOptions) -> Result<Self, HarnessFault>
    where
        E: QueryEngine<Session = S> + ?Sized,
    {
        Ok(Self {
            session: engine.open_session(options)?,
        })
    }

    /// Runs one request on the held session.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the engine signals an error.
    pub fn execute(&mut self, request: &QueryRequest) -> Result<Vec<ResultItem>, EngineError> {
        self.session.execute(request)
    }
}

impl<S: EngineSession> Drop for ScopedSession<S> {
    fn drop(&mut self) {
        self.session.release();
    }
}

// ============================================================================
// SECTION: Execution
// ============================================================================

/// Executes one request in a fresh scoped session and classifies the result.
///
/// # Errors
///
/// Returns [`HarnessFault`] when the session cannot be opened or the engine
/// raises something outside its classified vocabulary.
pub fn execute_scoped<E>(engine: &E, request: &QueryRequest) -> Result<Outcome, HarnessFault>
where
    E: QueryEngine + ?Sized,
{
    let raw = {
        let mut session = ScopedSession::open(engine, &request.options)?;
        session.execute(request)
    };
    classify(raw)
}

/// Maps a raw engine result onto an outcome.
///
/// # Errors
///
/// Returns [`HarnessFault::Engine`] for unclassified errors and for classified
/// errors whose code is not a valid code literal.
pub fn classify(raw: Result<Vec<ResultItem>, EngineError>) -> Result<Outcome, HarnessFault> {
    match raw {
        Ok(items) => Ok(Outcome::success(items)),
        Err(EngineError::Classified {
            code,
            message,
        }) => match ErrorCode::new(code.as_str()) {
            Ok(parsed) if !parsed.is_wildcard() => Ok(Outcome::failure(parsed)),
            Ok(_) => Err(HarnessFault::Engine(format!("wildcard error code reported: {message}"))),
            Err(err) => Err(HarnessFault::Engine(format!(
                "unclassifiable error code `{code}` ({err}): {message}"
            ))),
        },
        Err(EngineError::Unclassified(message)) => Err(HarnessFault::Engine(message)),
    }
}
